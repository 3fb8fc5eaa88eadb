mod backup;
mod executor;
mod operation;
mod planner;
mod report;

pub use backup::{backup_path_for, create_backup, BACKUP_EXTENSION};
pub use executor::{ExecutionSummary, Executor};
pub use operation::{ArchiveOperation, OperationKind, OperationStatus, Safety};
pub use planner::{annotate, filter_operations, plan, FilterOptions};
pub use report::write_report;
