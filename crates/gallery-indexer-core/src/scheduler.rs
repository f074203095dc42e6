use crate::cancel::CancellationToken;
use crate::config::parse_schedule;
use crate::engine::{IndexEngine, RunOutcome};
use crate::error::Error;
use chrono::{DateTime, Utc};
use croner::Cron;
use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Scheduled,
    Manual,
}

/// Source of run triggers. Returns `None` once no more triggers will come
/// or `cancel` has fired.
pub trait TriggerSource: Send {
    fn wait_next(&mut self, cancel: &CancellationToken) -> Option<Trigger>;

    /// Drops triggers fired at or after `since` and returns how many were
    /// dropped. The scheduler calls it when a run ends, so a trigger that
    /// arrives while indexing is in progress never starts a run of its own.
    fn discard_fired_since(&mut self, _since: Instant) -> usize {
        0
    }
}

/// Fires on a cron expression, evaluated in UTC.
pub struct CronTrigger {
    expression: String,
    schedule: Cron,
    poll: Duration,
}

impl CronTrigger {
    pub fn new(expression: &str) -> Result<Self, Error> {
        Ok(Self {
            expression: expression.to_string(),
            schedule: parse_schedule(expression)?,
            poll: POLL_INTERVAL,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.find_next_occurrence(after, false).ok()
    }
}

impl TriggerSource for CronTrigger {
    fn wait_next(&mut self, cancel: &CancellationToken) -> Option<Trigger> {
        let Some(next) = self.next_after(&Utc::now()) else {
            warn!("Schedule '{}' has no further occurrences", self.expression);
            return None;
        };
        info!("Next scheduled indexing run at {}", next.to_rfc3339());
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            let remaining = match (next - Utc::now()).to_std() {
                Ok(remaining) if !remaining.is_zero() => remaining,
                _ => return Some(Trigger::Scheduled),
            };
            thread::sleep(remaining.min(self.poll));
        }
    }
}

/// Trigger source driven by hand, through a [`TriggerHandle`].
pub struct ManualTrigger {
    rx: Receiver<(Trigger, Instant)>,
    /// Triggers fired before the last run started, still owed a run.
    backlog: VecDeque<Trigger>,
    poll: Duration,
}

/// Fires triggers into a [`ManualTrigger`]. Dropping every handle ends the
/// scheduler loop once queued triggers are consumed.
#[derive(Clone)]
pub struct TriggerHandle {
    tx: Sender<(Trigger, Instant)>,
}

impl ManualTrigger {
    pub fn new() -> (Self, TriggerHandle) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                rx,
                backlog: VecDeque::new(),
                poll: Duration::from_millis(50),
            },
            TriggerHandle { tx },
        )
    }
}

impl TriggerHandle {
    /// Returns false if the scheduler has gone away.
    pub fn fire(&self) -> bool {
        self.tx.send((Trigger::Manual, Instant::now())).is_ok()
    }
}

impl TriggerSource for ManualTrigger {
    fn wait_next(&mut self, cancel: &CancellationToken) -> Option<Trigger> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(trigger) = self.backlog.pop_front() {
                return Some(trigger);
            }
            match self.rx.recv_timeout(self.poll) {
                Ok((trigger, _)) => return Some(trigger),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn discard_fired_since(&mut self, since: Instant) -> usize {
        let mut dropped = 0;
        while let Ok((trigger, fired_at)) = self.rx.try_recv() {
            if fired_at >= since {
                dropped += 1;
            } else {
                self.backlog.push_back(trigger);
            }
        }
        dropped
    }
}

/// Counts of what the scheduler loop did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Routes the startup trigger and every later trigger through
/// [`IndexEngine::run_once`].
pub struct Scheduler {
    engine: Arc<IndexEngine>,
    trigger: Box<dyn TriggerSource>,
    run_on_startup: bool,
}

impl Scheduler {
    pub fn new(engine: Arc<IndexEngine>, trigger: Box<dyn TriggerSource>) -> Self {
        Self {
            engine,
            trigger,
            run_on_startup: true,
        }
    }

    pub fn without_startup_run(mut self) -> Self {
        self.run_on_startup = false;
        self
    }

    /// Runs recovery, then the startup run, then one run per trigger until
    /// the trigger source ends or the engine's token is cancelled.
    pub fn run(mut self) -> Result<SchedulerSummary, Error> {
        self.engine.recover()?;

        let cancel = self.engine.cancellation().clone();
        let mut summary = SchedulerSummary::default();

        if self.run_on_startup {
            self.dispatch(Trigger::Startup, &mut summary);
        }
        while let Some(trigger) = self.trigger.wait_next(&cancel) {
            self.dispatch(trigger, &mut summary);
            if cancel.is_cancelled() {
                break;
            }
        }

        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            "Scheduler stopped"
        );
        Ok(summary)
    }

    pub fn spawn(self) -> io::Result<JoinHandle<Result<SchedulerSummary, Error>>> {
        thread::Builder::new()
            .name("indexer-scheduler".to_string())
            .spawn(move || self.run())
    }

    fn dispatch(&mut self, trigger: Trigger, summary: &mut SchedulerSummary) {
        let started = Instant::now();
        info!(
            "Running {:?} indexing job at {}",
            trigger,
            Utc::now().to_rfc3339()
        );
        match self.engine.run_once() {
            Ok(RunOutcome::Completed(_)) => summary.completed += 1,
            Ok(RunOutcome::Failed(_)) => summary.failed += 1,
            Ok(RunOutcome::Skipped) => summary.skipped += 1,
            Err(err) => {
                error!("Indexing run could not be recorded: {}", err);
                summary.errors += 1;
            }
        }

        let dropped = self.trigger.discard_fired_since(started);
        if dropped > 0 {
            info!(
                dropped,
                "Indexing already in progress. Skipping triggers fired during the run."
            );
            summary.skipped += dropped as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_trigger_computes_next_hour() {
        let trigger = CronTrigger::new("0 * * * *").unwrap();
        let after = DateTime::parse_from_rfc3339("2024-05-01T10:15:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let next = trigger.next_after(&after).unwrap();
        assert_eq!(next.to_rfc3339(), "2024-05-01T11:00:00+00:00");
    }

    #[test]
    fn cron_trigger_rejects_garbage() {
        assert!(CronTrigger::new("not a schedule").is_err());
    }

    #[test]
    fn manual_trigger_delivers_and_ends() {
        let (mut source, handle) = ManualTrigger::new();
        assert!(handle.fire());
        drop(handle);
        let cancel = CancellationToken::never();
        assert_eq!(source.wait_next(&cancel), Some(Trigger::Manual));
        assert_eq!(source.wait_next(&cancel), None);
    }

    #[test]
    fn manual_trigger_keeps_earlier_fires_and_drops_later_ones() {
        let (mut source, handle) = ManualTrigger::new();
        assert!(handle.fire());
        thread::sleep(Duration::from_millis(5));
        let run_started = Instant::now();
        assert!(handle.fire());
        assert!(handle.fire());
        drop(handle);

        assert_eq!(source.discard_fired_since(run_started), 2);
        let cancel = CancellationToken::never();
        assert_eq!(source.wait_next(&cancel), Some(Trigger::Manual));
        assert_eq!(source.wait_next(&cancel), None);
    }

    #[test]
    fn manual_trigger_stops_on_cancel() {
        let (mut source, _handle) = ManualTrigger::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(source.wait_next(&cancel), None);
    }
}
