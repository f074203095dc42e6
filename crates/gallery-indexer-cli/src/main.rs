mod commands;
mod logging;
mod progress;

use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use gallery_indexer_core::storage::models::{HistoryFilter, Page, SortOrder};
use gallery_indexer_core::{
    CronTrigger, Database, IndexEngine, IndexQuery, IndexerConfig, RunOutcome, Scheduler,
};
use progress::CliReporter;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match gallery_indexer_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve) => run_serve(&config),
        Some(Commands::Run) => run_single(&config),
        Some(Commands::Status) => run_status(&config),
        Some(Commands::History {
            status,
            page,
            limit,
        }) => run_history(&config, &status, page, limit),
        Some(Commands::Search {
            query,
            page,
            limit,
            sort,
        }) => run_search(&config, &query, page, limit, &sort),
        Some(Commands::Count) => run_count(&config),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn open_database(config: &IndexerConfig) -> Result<Arc<Database>> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path))?;
    Ok(Arc::new(db))
}

fn build_engine(config: &IndexerConfig, db: Arc<Database>) -> IndexEngine {
    IndexEngine::new(config, db).with_reporter(Arc::new(CliReporter::new()))
}

fn run_serve(config: &IndexerConfig) -> Result<()> {
    let db = open_database(config)?;
    let engine = Arc::new(build_engine(config, db));
    let trigger = CronTrigger::new(&config.cron_schedule)?;
    info!(
        "Indexing {} on schedule '{}'",
        config.start_path,
        trigger.expression()
    );

    let summary = Scheduler::new(engine, Box::new(trigger))
        .spawn()?
        .join()
        .map_err(|_| anyhow!("scheduler thread panicked"))??;
    info!(
        "{} completed, {} failed, {} skipped runs",
        summary.completed, summary.failed, summary.skipped
    );
    Ok(())
}

fn run_single(config: &IndexerConfig) -> Result<()> {
    let db = open_database(config)?;
    let engine = build_engine(config, db);
    engine.recover()?;

    match engine.run_once()? {
        RunOutcome::Skipped => {
            info!("Indexing already in progress. Skipping this run.");
        }
        RunOutcome::Completed(report) => {
            info!(
                "Job {}: {} files indexed ({} new, {} updated, {} skipped) in {}",
                report.job_id,
                format!("{}", report.tally.processed).green(),
                format!("{}", report.tally.inserted).green(),
                format!("{}", report.tally.updated).cyan(),
                format!("{}", report.tally.skipped).yellow(),
                format!("{:.2}s", report.duration.as_secs_f64()).green(),
            );
            info!(
                "{} files indexed under {}",
                format!("{}", report.total_files).green(),
                engine.root().display()
            );
        }
        RunOutcome::Failed(report) => {
            return Err(anyhow!(
                "job {} failed: {}",
                report.job_id,
                report.error.unwrap_or_default()
            ));
        }
    }
    Ok(())
}

fn run_status(config: &IndexerConfig) -> Result<()> {
    let query = IndexQuery::new(open_database(config)?);
    let state = query.indexer_state()?;
    let status = if state.is_indexing {
        "indexing".yellow()
    } else {
        "idle".green()
    };
    let last = state
        .last_indexed
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!("Status: {}  Last indexed: {}", status, last);
    Ok(())
}

fn run_history(config: &IndexerConfig, status: &str, page: u32, limit: u32) -> Result<()> {
    let filter: HistoryFilter = status.parse().map_err(|e: String| anyhow!(e))?;
    let query = IndexQuery::new(open_database(config)?);
    let jobs = query.job_history(filter, Page::new(page, limit))?;
    if jobs.is_empty() {
        println!("No indexing jobs found");
    }
    for job in jobs {
        let status = match job.status.as_str() {
            "completed" => job.status.as_str().green(),
            "failed" => job.status.as_str().red(),
            other => other.yellow(),
        };
        println!(
            "#{:<6} {:<10} started {}  ended {}  total {}  new {}{}",
            job.id,
            status,
            job.started_at.to_rfc3339(),
            job.ended_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
            job.total_files,
            job.new_files,
            job.error
                .map(|e| format!("  error: {}", e))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

fn run_search(
    config: &IndexerConfig,
    text: &str,
    page: u32,
    limit: u32,
    sort: &str,
) -> Result<()> {
    let order: SortOrder = sort.parse().map_err(|e: String| anyhow!(e))?;
    let query = IndexQuery::new(open_database(config)?);
    let results = query.search_by_name(text, Page::new(page, limit), order)?;
    println!(
        "{} matches (page {}, {} per page)",
        format!("{}", results.total).cyan(),
        results.page,
        results.limit
    );
    for file in results.results {
        println!(
            "{:>10}  {}/{}",
            file.record.size,
            file.record.directory,
            file.record.filename
        );
    }
    Ok(())
}

fn run_count(config: &IndexerConfig) -> Result<()> {
    let query = IndexQuery::new(open_database(config)?);
    println!("{}", query.total_files()?);
    Ok(())
}
