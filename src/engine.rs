use crate::checker::{ArchiveChecker, BatchOptions, BatchReport};
use crate::config::{self, AppConfig};
use crate::error::Error;
use crate::journal::CheckJournal;
use crate::maintenance;
use crate::plan::{self, ArchiveOperation, ExecutionSummary, Executor, FilterOptions, OperationKind};
use crate::progress::ProgressReporter;
use crate::scanner::{self, DirectoryNode};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives the migration and verification pipelines for one configuration.
pub struct MigrationEngine {
    config: AppConfig,
    checker: ArchiveChecker,
}

/// Operations computed for one source/target pair, already annotated with
/// safety verdicts but not yet filtered.
#[derive(Debug)]
pub struct MigrationPlan {
    pub source_root: PathBuf,
    pub source_base: PathBuf,
    pub target_base: PathBuf,
    pub kind: OperationKind,
    /// False when only a subdirectory of the source root was planned.
    pub whole_root: bool,
    pub operations: Vec<ArchiveOperation>,
    pub scan_errors: Vec<(PathBuf, String)>,
}

impl MigrationPlan {
    pub fn safe_count(&self) -> usize {
        self.operations.iter().filter(|op| op.is_safe()).count()
    }

    pub fn unsafe_count(&self) -> usize {
        self.operations.len() - self.safe_count()
    }
}

#[derive(Debug)]
pub struct MigrationResult {
    pub operations: Vec<ArchiveOperation>,
    pub summary: ExecutionSummary,
    pub removed_dirs: usize,
}

impl MigrationEngine {
    pub fn new(config: AppConfig) -> Self {
        let checker = ArchiveChecker::from_config(&config);
        Self { config, checker }
    }

    pub fn with_checker(mut self, checker: ArchiveChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn checker(&self) -> &ArchiveChecker {
        &self.checker
    }

    /// Scan both sides, plan one operation per source archive and evaluate
    /// each against its target.
    pub fn prepare(
        &self,
        source: &Path,
        target: &Path,
        kind: OperationKind,
        subdir: Option<&Path>,
        reporter: &dyn ProgressReporter,
    ) -> Result<MigrationPlan, Error> {
        if !source.is_dir() {
            return Err(Error::InvalidPath {
                path: source.to_path_buf(),
                reason: "source is not a directory".to_string(),
            });
        }
        if config::paths_overlap(source, target) {
            return Err(Error::InvalidPath {
                path: target.to_path_buf(),
                reason: format!("overlaps with source {}", source.display()),
            });
        }

        let (source_base, target_base) = match subdir {
            Some(rel) => {
                if rel.as_os_str().is_empty()
                    || !rel.components().all(|c| matches!(c, Component::Normal(_)))
                {
                    return Err(Error::InvalidPath {
                        path: rel.to_path_buf(),
                        reason: "subdirectory must be a plain relative path".to_string(),
                    });
                }
                let base = source.join(rel);
                if !base.is_dir() {
                    return Err(Error::InvalidPath {
                        path: base,
                        reason: "subdirectory not found in source".to_string(),
                    });
                }
                (base, target.join(rel))
            }
            None => (source.to_path_buf(), target.to_path_buf()),
        };

        let source_tree = self.scan_tree(&source_base, reporter);
        let target_tree = if target_base.is_dir() {
            self.scan_tree(&target_base, reporter)
        } else {
            debug!("Target {} does not exist yet", target_base.display());
            DirectoryNode::empty(&target_base)
        };

        let scan_errors: Vec<(PathBuf, String)> = source_tree
            .scan_errors()
            .into_iter()
            .chain(target_tree.scan_errors())
            .map(|(path, err)| (path.to_path_buf(), err.to_string()))
            .collect();
        for (path, err) in &scan_errors {
            warn!("Could not scan {}: {}", path.display(), err);
        }

        let start = Instant::now();
        let mut operations = plan::plan(&source_tree, &target_tree, kind);
        plan::annotate(&mut operations, &self.config.safety_thresholds());
        debug!(
            "Planned and evaluated {} operations in {:.2}s",
            operations.len(),
            start.elapsed().as_secs_f64()
        );

        let prepared = MigrationPlan {
            source_root: source.to_path_buf(),
            source_base,
            target_base,
            kind,
            whole_root: subdir.is_none(),
            operations,
            scan_errors,
        };
        info!(
            "{} operations planned: {} safe, {} unsafe",
            prepared.operations.len(),
            prepared.safe_count(),
            prepared.unsafe_count()
        );
        Ok(prepared)
    }

    /// Filter the plan, run what remains, then prune empty source
    /// directories after a whole-root move.
    pub fn execute(
        &self,
        prepared: MigrationPlan,
        options: FilterOptions,
        reporter: &dyn ProgressReporter,
    ) -> MigrationResult {
        let planned = prepared.operations.len();
        let mut operations = plan::filter_operations(
            prepared.operations,
            options,
            &self.config.safety_thresholds(),
        );
        if operations.len() < planned {
            info!(
                "Filtered out {} of {} operations",
                planned - operations.len(),
                planned
            );
        }

        let executor = Executor::new(self.config.file_operations.backup_dir.clone());
        let summary = executor.execute(&mut operations, reporter);

        let removed_dirs = if prepared.kind == OperationKind::Move
            && prepared.whole_root
            && self.config.processing.remove_empty_dirs
        {
            maintenance::remove_empty_directories(&prepared.source_root)
        } else {
            0
        };

        MigrationResult {
            operations,
            summary,
            removed_dirs,
        }
    }

    /// Test every archive under `dir`, journaling into the directory's
    /// history file. `force` re-checks archives already recorded as valid.
    pub fn verify(
        &self,
        dir: &Path,
        force: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<BatchReport, Error> {
        if !dir.is_dir() {
            return Err(Error::InvalidPath {
                path: dir.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        let tree = self.scan_tree(dir, reporter);
        let archives: Vec<PathBuf> = tree.archives().into_iter().map(|f| f.path.clone()).collect();

        let mut journal = CheckJournal::open(&self.config.history_path(dir))?;
        let mut options = BatchOptions::from_config(&self.config);
        options.skip_already_checked = options.skip_already_checked && !force;

        self.checker.check_all(archives, &mut journal, &options, reporter)
    }

    fn scan_tree(&self, root: &Path, reporter: &dyn ProgressReporter) -> DirectoryNode {
        reporter.on_scan_start(root);
        let start = Instant::now();
        let tree = scanner::scan(root, &self.config.scan_options());
        let elapsed = start.elapsed().as_secs_f64();
        debug!(
            "Scanned {} in {:.2}s: {} archives, {} bytes",
            root.display(),
            elapsed,
            tree.archive_count(),
            tree.total_size()
        );
        reporter.on_scan_complete(root, tree.archive_count(), tree.total_size(), elapsed);
        tree
    }
}
