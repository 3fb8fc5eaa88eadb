use archive_bus::plan::{ArchiveOperation, OperationStatus};
use archive_bus::ProgressReporter;
use colored::*;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Scan phase: spinner
/// - Check and execute phases: bar sized to the known total
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.lock();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.lock().take() {
            pb.finish_and_clear();
        }
    }

    fn start_bar(&self, total: usize, label: &str) {
        let template = format!(
            "  {{spinner:.cyan}} {label} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining) {{msg}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS);
        let pb = ProgressBar::new(total as u64);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn advance(&self, done: usize, message: String) {
        if let Some(pb) = self.lock().as_ref() {
            pb.set_position(done as u64);
            pb.set_message(message);
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, root: &Path) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars(TICK_CHARS),
        );
        pb.set_message(format!("Scanning {}...", root.display()));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_complete(&self, root: &Path, archives: usize, bytes: u64, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Scanned {}: {} archives, {} in {:.2}s",
            "✓".green(),
            root.display(),
            archives,
            HumanBytes(bytes),
            duration_secs
        );
    }

    fn on_check_start(&self, total: usize) {
        self.start_bar(total, "Checking");
    }

    fn on_check_progress(&self, done: usize, _total: usize, path: &Path, valid: bool) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !valid {
            if let Some(pb) = self.lock().as_ref() {
                pb.println(format!("  {} {}", "✗".red(), path.display()));
            }
        }
        self.advance(done, name);
    }

    fn on_check_complete(&self, valid: usize, invalid: usize, cancelled: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Check complete: {} valid, {} invalid, {} cancelled in {:.2}s",
            "✓".green(),
            valid.to_string().green(),
            invalid.to_string().red(),
            cancelled.to_string().yellow(),
            duration_secs
        );
    }

    fn on_execute_start(&self, total: usize) {
        self.start_bar(total, "Executing");
    }

    fn on_execute_progress(&self, done: usize, _total: usize, operation: &ArchiveOperation) {
        if operation.status == OperationStatus::Error {
            if let Some(pb) = self.lock().as_ref() {
                pb.println(format!(
                    "  {} {}: {}",
                    "✗".red(),
                    operation.source.display(),
                    operation.error.as_deref().unwrap_or("failed")
                ));
            }
        }
        let name = operation
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.advance(done, name);
    }

    fn on_execute_complete(&self, success: usize, errors: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Execution complete: {} succeeded, {} failed in {:.2}s",
            "✓".green(),
            success.to_string().green(),
            errors.to_string().red(),
            duration_secs
        );
    }
}
