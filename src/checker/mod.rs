mod tester;
mod timeout;

pub use tester::{ArchiveTester, SevenZipTester, TestOutcome};
pub use timeout::{TimeoutPolicy, BYTES_PER_STEP};

use crate::config::AppConfig;
use crate::error::Error;
use crate::journal::CheckJournal;
use crate::progress::ProgressReporter;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Why an archive was not confirmed valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckFailure {
    /// The tester ran and rejected the archive.
    Corrupt(String),
    Timeout,
    Cancelled,
    TesterUnavailable(String),
    Error(String),
}

impl CheckFailure {
    /// Only a tester verdict counts as proof of corruption.
    pub fn is_confirmed_corrupt(&self) -> bool {
        matches!(self, CheckFailure::Corrupt(_))
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::Corrupt(diag) if diag.is_empty() => write!(f, "corrupt"),
            CheckFailure::Corrupt(diag) => write!(f, "corrupt: {diag}"),
            CheckFailure::Timeout => write!(f, "timeout"),
            CheckFailure::Cancelled => write!(f, "cancelled"),
            CheckFailure::TesterUnavailable(reason) => write!(f, "tester unavailable: {reason}"),
            CheckFailure::Error(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub path: PathBuf,
    pub failure: Option<CheckFailure>,
}

impl CheckOutcome {
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_workers: usize,
    pub overall_timeout: Option<Duration>,
    pub skip_already_checked: bool,
}

impl BatchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_workers: config.check.max_workers,
            overall_timeout: config.overall_timeout(),
            skip_already_checked: config.check.skip_checked,
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Paths excluded because the journal already marks them valid.
    pub skipped: usize,
    pub valid: Vec<PathBuf>,
    /// Completed checks that did not pass, in completion order.
    pub invalid: Vec<CheckOutcome>,
    /// Tasks abandoned when the batch deadline passed.
    pub cancelled: Vec<PathBuf>,
    /// Set once when the tester could not be run at all.
    pub environment_error: Option<String>,
    pub journal_failures: usize,
    pub duration: Duration,
}

impl BatchReport {
    pub fn invalid_count(&self) -> usize {
        self.invalid.len() + self.cancelled.len()
    }

    /// Archives the tester positively rejected; candidates for tombstoning.
    pub fn corrupt(&self) -> impl Iterator<Item = &Path> {
        self.invalid
            .iter()
            .filter(|o| o.failure.as_ref().is_some_and(CheckFailure::is_confirmed_corrupt))
            .map(|o| o.path.as_path())
    }
}

/// Tests archives through an [`ArchiveTester`] with size-scaled timeouts.
#[derive(Clone)]
pub struct ArchiveChecker {
    tester: Arc<dyn ArchiveTester>,
    timeouts: TimeoutPolicy,
}

impl ArchiveChecker {
    pub fn new(tester: Arc<dyn ArchiveTester>, timeouts: TimeoutPolicy) -> Self {
        Self { tester, timeouts }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(SevenZipTester::new(&config.check.tester_program)),
            config.timeout_policy(),
        )
    }

    pub fn preflight(&self) -> Result<(), Error> {
        self.tester.probe()
    }

    pub fn timeout_for(&self, path: &Path) -> Duration {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        self.timeouts.for_size(size)
    }

    /// Test one archive. Never fails: every problem becomes a [`CheckFailure`].
    pub fn check_archive(&self, path: &Path) -> CheckOutcome {
        let timeout = self.timeout_for(path);
        self.check_archive_with_timeout(path, timeout)
    }

    pub fn check_archive_with_timeout(&self, path: &Path, timeout: Duration) -> CheckOutcome {
        debug!("Checking {} (timeout {:?})", path.display(), timeout);
        let failure = match self.tester.test(path, timeout) {
            TestOutcome::Passed => None,
            TestOutcome::Failed { diagnostics } => {
                error!("Corrupt archive {}: {}", path.display(), diagnostics);
                Some(CheckFailure::Corrupt(diagnostics))
            }
            TestOutcome::TimedOut => {
                warn!("Timed out after {:?} checking {}", timeout, path.display());
                Some(CheckFailure::Timeout)
            }
            TestOutcome::Unavailable { reason } => Some(CheckFailure::TesterUnavailable(reason)),
            TestOutcome::Error(e) => {
                error!("Error checking {}: {}", path.display(), e);
                Some(CheckFailure::Error(e))
            }
        };
        CheckOutcome {
            path: path.to_path_buf(),
            failure,
        }
    }

    /// Check a batch of archives on a bounded worker pool.
    ///
    /// Workers only run the tester; this thread is the sole journal writer
    /// and appends each result before reporting it. When the overall
    /// deadline passes, tasks not yet finished are journaled as cancelled
    /// and abandoned. Results that already arrived are kept.
    pub fn check_all(
        &self,
        paths: Vec<PathBuf>,
        journal: &mut CheckJournal,
        options: &BatchOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<BatchReport, Error> {
        let started = Instant::now();
        let mut report = BatchReport::default();

        let pending: Vec<PathBuf> = if options.skip_already_checked {
            let (done, todo): (Vec<PathBuf>, Vec<PathBuf>) = paths
                .into_iter()
                .partition(|p| journal.history().is_verified(p));
            report.skipped = done.len();
            todo
        } else {
            paths
        };
        if report.skipped > 0 {
            info!("Skipping {} archives already verified", report.skipped);
        }

        let total = pending.len();
        reporter.on_check_start(total);
        if total == 0 {
            report.duration = started.elapsed();
            reporter.on_check_complete(0, 0, 0, report.duration.as_secs_f64());
            return Ok(report);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.max_workers.max(1))
            .thread_name(|i| format!("archive-check-{i}"))
            .build()?;
        let cancel = Arc::new(AtomicBool::new(false));
        let tester_missing = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<(usize, CheckOutcome)>();

        for (index, path) in pending.iter().cloned().enumerate() {
            let tx = tx.clone();
            let cancel = Arc::clone(&cancel);
            let tester_missing = Arc::clone(&tester_missing);
            let checker = self.clone();
            pool.spawn(move || {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                let outcome = if tester_missing.load(Ordering::Relaxed) {
                    CheckOutcome {
                        path,
                        failure: Some(CheckFailure::TesterUnavailable(
                            "skipped after tester failed to start".to_string(),
                        )),
                    }
                } else {
                    checker.check_archive(&path)
                };
                if matches!(outcome.failure, Some(CheckFailure::TesterUnavailable(_))) {
                    tester_missing.store(true, Ordering::Relaxed);
                }
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);

        let deadline = options.overall_timeout.map(|t| started + t);
        let mut outstanding = vec![true; total];
        let mut done = 0usize;
        let mut draining = false;

        while done < total {
            // Past the deadline, only results already queued are taken.
            let received = if draining {
                rx.try_recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                match deadline {
                    Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                        Some(left) => rx.recv_timeout(left),
                        None => Err(RecvTimeoutError::Timeout),
                    },
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                }
            };

            let (index, outcome) = match received {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => {
                    cancel.store(true, Ordering::Relaxed);
                    error!(
                        "Check batch exceeded {:?}; cancelling unfinished tasks",
                        options.overall_timeout.unwrap_or_default()
                    );
                    draining = true;
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            outstanding[index] = false;
            done += 1;

            if let Some(CheckFailure::TesterUnavailable(reason)) = &outcome.failure {
                if report.environment_error.is_none() {
                    error!(
                        "Archive tester could not be run, all remaining checks will fail: {}",
                        reason
                    );
                    report.environment_error = Some(reason.clone());
                }
            }

            let error_text = outcome.failure.as_ref().map(ToString::to_string);
            if let Err(e) = journal.record(&outcome.path, outcome.is_valid(), error_text) {
                error!(
                    "Failed to journal result for {}: {}",
                    outcome.path.display(),
                    e
                );
                report.journal_failures += 1;
            }

            reporter.on_check_progress(done, total, &outcome.path, outcome.is_valid());
            if outcome.is_valid() {
                report.valid.push(outcome.path);
            } else {
                report.invalid.push(outcome);
            }
        }

        for (index, path) in pending.into_iter().enumerate() {
            if !outstanding[index] {
                continue;
            }
            warn!("Cancelled check of {}", path.display());
            if let Err(e) = journal.record(&path, false, Some(CheckFailure::Cancelled.to_string())) {
                error!("Failed to journal cancellation for {}: {}", path.display(), e);
                report.journal_failures += 1;
            }
            report.cancelled.push(path);
        }

        report.duration = started.elapsed();
        info!(
            "Checked {} archives in {:.2}s: {} valid, {} invalid, {} cancelled",
            done,
            report.duration.as_secs_f64(),
            report.valid.len(),
            report.invalid.len(),
            report.cancelled.len()
        );
        reporter.on_check_complete(
            report.valid.len(),
            report.invalid.len(),
            report.cancelled.len(),
            report.duration.as_secs_f64(),
        );
        Ok(report)
    }
}
