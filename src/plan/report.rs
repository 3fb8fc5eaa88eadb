use super::operation::ArchiveOperation;
use crate::error::Error;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct OperationRow {
    source: String,
    target: String,
    operation: String,
    safety: String,
    reason: String,
    source_size: Option<u64>,
    target_size: Option<u64>,
    status: String,
    backup: String,
    error: String,
}

impl From<&ArchiveOperation> for OperationRow {
    fn from(op: &ArchiveOperation) -> Self {
        Self {
            source: op.source.display().to_string(),
            target: op.target.display().to_string(),
            operation: op.kind.to_string(),
            safety: op.safety.to_string(),
            reason: op.reason_text(),
            source_size: op.source_info.map(|s| s.size),
            target_size: op.target_info.map(|s| s.size),
            status: op.status.to_string(),
            backup: op
                .backup_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            error: op.error.clone().unwrap_or_default(),
        }
    }
}

/// Write one CSV row per operation.
pub fn write_report(path: &Path, operations: &[ArchiveOperation]) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for op in operations {
        writer.serialize(OperationRow::from(op))?;
    }
    writer.flush()?;
    info!("Wrote {} operations to {}", operations.len(), path.display());
    Ok(())
}
