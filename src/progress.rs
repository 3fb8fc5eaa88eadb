use crate::plan::ArchiveOperation;
use std::path::Path;

/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars. All methods have default
/// no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &Path) {}
    fn on_scan_complete(&self, _root: &Path, _archives: usize, _bytes: u64, _duration_secs: f64) {}
    fn on_check_start(&self, _total: usize) {}
    fn on_check_progress(&self, _done: usize, _total: usize, _path: &Path, _valid: bool) {}
    fn on_check_complete(&self, _valid: usize, _invalid: usize, _cancelled: usize, _duration_secs: f64) {}
    fn on_execute_start(&self, _total: usize) {}
    fn on_execute_progress(&self, _done: usize, _total: usize, _operation: &ArchiveOperation) {}
    fn on_execute_complete(&self, _success: usize, _errors: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
