pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod jobs;
pub mod progress;
pub mod query;
pub mod scanner;
pub mod scheduler;
pub mod storage;
pub mod throttle;
pub mod writer;

pub use cancel::CancellationToken;
pub use config::IndexerConfig;
pub use engine::{IndexEngine, RecoveryReport, RunOutcome, RunReport};
pub use error::Error;
pub use guard::IndexGuard;
pub use jobs::JobTracker;
pub use progress::{ProgressReporter, SilentReporter};
pub use query::{IndexQuery, SearchPage};
pub use scheduler::{CronTrigger, ManualTrigger, Scheduler, Trigger, TriggerHandle};
pub use storage::Database;
