use super::operation::{ArchiveOperation, OperationKind, Safety};
use crate::safety::SafetyThresholds;
use crate::scanner::DirectoryNode;
use std::path::Path;
use tracing::debug;

/// Emit one operation per archive under `source`, mapped onto the same
/// relative location under `target`. Directories missing from the target
/// tree are treated as empty. Files come before subdirectories, depth first.
pub fn plan(source: &DirectoryNode, target: &DirectoryNode, kind: OperationKind) -> Vec<ArchiveOperation> {
    let mut operations = Vec::with_capacity(source.archive_count());
    plan_node(
        source,
        target,
        source.path(),
        target.path(),
        kind,
        &mut operations,
    );
    debug!(
        "Planned {} {} operations from {} to {}",
        operations.len(),
        kind,
        source.path().display(),
        target.path().display()
    );
    operations
}

fn plan_node(
    source: &DirectoryNode,
    target: &DirectoryNode,
    source_base: &Path,
    target_base: &Path,
    kind: OperationKind,
    out: &mut Vec<ArchiveOperation>,
) {
    for file in source.files().iter().filter(|f| f.is_archive) {
        let target_path = match file.path.strip_prefix(source_base) {
            Ok(relative) => target_base.join(relative),
            Err(_) => target.path().join(&file.name),
        };
        out.push(ArchiveOperation::new(&file.path, &target_path, kind));
    }

    for child in source.children() {
        match target.child(child.name()) {
            Some(target_child) => {
                plan_node(child, target_child, source_base, target_base, kind, out)
            }
            None => {
                let missing = DirectoryNode::empty(&target.path().join(child.name()));
                plan_node(child, &missing, source_base, target_base, kind, out)
            }
        }
    }
}

/// Run the safety comparator over every operation.
pub fn annotate(operations: &mut [ArchiveOperation], thresholds: &SafetyThresholds) {
    for operation in operations.iter_mut() {
        operation.analyze(thresholds);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    pub only_safe: bool,
    pub skip_existing: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            only_safe: true,
            skip_existing: false,
        }
    }
}

/// Keep the operations that should run. Operations without a verdict are
/// evaluated first.
pub fn filter_operations(
    operations: Vec<ArchiveOperation>,
    options: FilterOptions,
    thresholds: &SafetyThresholds,
) -> Vec<ArchiveOperation> {
    operations
        .into_iter()
        .map(|mut op| {
            if op.safety == Safety::Unknown {
                op.analyze(thresholds);
            }
            op
        })
        .filter(|op| !options.only_safe || op.is_safe())
        .filter(|op| !options.skip_existing || !op.target.exists())
        .collect()
}
