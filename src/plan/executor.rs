use super::backup::create_backup;
use super::operation::{ArchiveOperation, OperationKind, OperationStatus};
use crate::progress::ProgressReporter;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub success: usize,
    pub errors: usize,
    pub duration: Duration,
}

/// Applies operations one at a time. A failure never stops the batch, and
/// a target that was backed up is put back when its operation fails.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    backup_dir: Option<PathBuf>,
}

impl Executor {
    pub fn new(backup_dir: Option<PathBuf>) -> Self {
        Self { backup_dir }
    }

    pub fn execute(
        &self,
        operations: &mut [ArchiveOperation],
        reporter: &dyn ProgressReporter,
    ) -> ExecutionSummary {
        let start = Instant::now();
        let total = operations.len();
        let mut summary = ExecutionSummary::default();
        reporter.on_execute_start(total);

        for (index, operation) in operations.iter_mut().enumerate() {
            let target_existed = operation.target.exists();
            match self.execute_one(operation) {
                Ok(()) => {
                    operation.status = OperationStatus::Success;
                    summary.success += 1;
                    debug!(
                        "{} {} -> {}",
                        operation.kind,
                        operation.source.display(),
                        operation.target.display()
                    );
                }
                Err(e) => {
                    error!(
                        "Failed to {} {} -> {}: {}",
                        operation.kind,
                        operation.source.display(),
                        operation.target.display(),
                        e
                    );
                    operation.status = OperationStatus::Error;
                    operation.error = Some(e.to_string());
                    rollback(operation, target_existed);
                    summary.errors += 1;
                }
            }
            reporter.on_execute_progress(index + 1, total, operation);
        }

        summary.duration = start.elapsed();
        info!(
            "Executed {} operations: {} succeeded, {} failed in {:.2}s",
            total,
            summary.success,
            summary.errors,
            summary.duration.as_secs_f64()
        );
        reporter.on_execute_complete(
            summary.success,
            summary.errors,
            summary.duration.as_secs_f64(),
        );
        summary
    }

    fn execute_one(&self, operation: &mut ArchiveOperation) -> io::Result<()> {
        if operation.target.exists() {
            let backup = create_backup(&operation.target, self.backup_dir.as_deref())?;
            operation.backup_path = Some(backup);
        }

        if let Some(parent) = operation.target.parent() {
            fs::create_dir_all(parent)?;
        }

        match operation.kind {
            OperationKind::Copy => {
                fs::copy(&operation.source, &operation.target)?;
                Ok(())
            }
            OperationKind::Move => move_file(&operation.source, &operation.target),
        }
    }
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            debug!(
                "Rename {} failed ({}), copying instead",
                source.display(),
                e
            );
            fs::copy(source, target)?;
            fs::remove_file(source)
        }
    }
}

fn rollback(operation: &ArchiveOperation, target_existed: bool) {
    match &operation.backup_path {
        Some(backup) => match fs::copy(backup, &operation.target) {
            Ok(_) => info!(
                "Restored {} from {}",
                operation.target.display(),
                backup.display()
            ),
            Err(e) => error!(
                "Could not restore {} from {}: {}",
                operation.target.display(),
                backup.display(),
                e
            ),
        },
        None if !target_existed && operation.target.is_file() => {
            if let Err(e) = fs::remove_file(&operation.target) {
                warn!(
                    "Could not remove partial target {}: {}",
                    operation.target.display(),
                    e
                );
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rollback_restores_overwritten_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a.zip");
        fs::write(&target, b"precious original").unwrap();

        let mut operation =
            ArchiveOperation::new(&dir.path().join("in/a.zip"), &target, OperationKind::Move);
        operation.backup_path = Some(create_backup(&target, None).unwrap());
        fs::write(&target, b"half written").unwrap();

        rollback(&operation, true);

        assert_eq!(fs::read(&target).unwrap(), b"precious original");
    }

    #[test]
    fn test_rollback_removes_partial_new_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a.zip");
        fs::write(&target, b"half written").unwrap();

        let operation =
            ArchiveOperation::new(&dir.path().join("in/a.zip"), &target, OperationKind::Copy);
        rollback(&operation, false);

        assert!(!target.exists());
    }
}
