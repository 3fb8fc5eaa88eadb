pub mod checker;
pub mod config;
pub mod engine;
pub mod error;
pub mod journal;
pub mod maintenance;
pub mod plan;
pub mod progress;
pub mod safety;
pub mod scanner;

pub use config::AppConfig;
pub use engine::{MigrationEngine, MigrationPlan, MigrationResult};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
