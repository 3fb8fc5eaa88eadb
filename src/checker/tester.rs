use crate::error::Error;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DIAGNOSTIC_LINES: usize = 5;

/// Result of a single external archive test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed { diagnostics: String },
    TimedOut,
    /// The tester itself could not be run.
    Unavailable { reason: String },
    Error(String),
}

/// Boundary to whatever actually opens and tests archives.
pub trait ArchiveTester: Send + Sync {
    fn test(&self, path: &Path, timeout: Duration) -> TestOutcome;

    /// Check that the tester can run at all, before starting a batch.
    fn probe(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Runs `<program> t <path>`; exit status 0 means the archive is intact.
#[derive(Debug, Clone)]
pub struct SevenZipTester {
    program: PathBuf,
}

impl SevenZipTester {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn unavailable(&self, reason: String) -> Error {
        Error::TesterUnavailable {
            program: self.program.display().to_string(),
            reason,
        }
    }
}

impl ArchiveTester for SevenZipTester {
    fn test(&self, path: &Path, timeout: Duration) -> TestOutcome {
        let mut child = match Command::new(&self.program)
            .arg("t")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return TestOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                return TestOutcome::Error(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            }
        };

        // Drain both pipes so a chatty tester can't block on a full buffer.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= timeout => {
                    stop(&mut child);
                    trace!("Tester timed out after {:?} on {}", timeout, path.display());
                    return TestOutcome::TimedOut;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    stop(&mut child);
                    return TestOutcome::Error(format!("failed waiting for tester: {e}"));
                }
            }
        };

        if status.success() {
            return TestOutcome::Passed;
        }

        let stderr = stderr.map(join_output).unwrap_or_default();
        let output = if stderr.trim().is_empty() {
            stdout.map(join_output).unwrap_or_default()
        } else {
            stderr
        };
        TestOutcome::Failed {
            diagnostics: summarize(&output, status.code()),
        }
    }

    fn probe(&self) -> Result<(), Error> {
        match Command::new(&self.program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(self.unavailable("executable not found on PATH".to_string()))
            }
            Err(e) => Err(self.unavailable(e.to_string())),
        }
    }
}

/// Kill and reap, so no zombie is left behind.
fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Keep the tail of the tester output; that's where 7z reports the error.
fn summarize(output: &str, code: Option<i32>) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let tail = lines[lines.len().saturating_sub(DIAGNOSTIC_LINES)..].join(" | ");
    match (code, tail.is_empty()) {
        (Some(code), true) => format!("exit code {code}"),
        (Some(code), false) => format!("exit code {code}: {tail}"),
        (None, true) => "terminated by signal".to_string(),
        (None, false) => tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_unavailable() {
        let tester = SevenZipTester::new("archive-bus-no-such-tester-7f3a");
        let outcome = tester.test(Path::new("whatever.zip"), Duration::from_secs(1));
        assert!(matches!(outcome, TestOutcome::Unavailable { .. }));
        assert!(matches!(
            tester.probe(),
            Err(Error::TesterUnavailable { .. })
        ));
    }

    #[test]
    fn test_summarize_keeps_tail() {
        let out = "a\n\nb\nc\nd\ne\nf\n";
        assert_eq!(summarize(out, Some(2)), "exit code 2: b | c | d | e | f");
        assert_eq!(summarize("", Some(1)), "exit code 1");
        assert_eq!(summarize("", None), "terminated by signal");
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::tempdir;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-7z");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_exit_status_decides_validity() {
            let dir = tempdir().unwrap();
            let ok = SevenZipTester::new(script(dir.path(), "exit 0"));
            assert_eq!(
                ok.test(Path::new("a.zip"), Duration::from_secs(5)),
                TestOutcome::Passed
            );

            let dir = tempdir().unwrap();
            let bad = SevenZipTester::new(script(
                dir.path(),
                "echo \"ERROR: $2 : Data Error\" >&2\nexit 2",
            ));
            match bad.test(Path::new("b.zip"), Duration::from_secs(5)) {
                TestOutcome::Failed { diagnostics } => {
                    assert!(diagnostics.contains("exit code 2"));
                    assert!(diagnostics.contains("b.zip : Data Error"));
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        #[test]
        fn test_slow_tester_times_out() {
            let dir = tempdir().unwrap();
            let slow = SevenZipTester::new(script(dir.path(), "exec sleep 5"));
            let started = Instant::now();
            let outcome = slow.test(Path::new("c.zip"), Duration::from_millis(200));
            assert_eq!(outcome, TestOutcome::TimedOut);
            assert!(started.elapsed() < Duration::from_secs(4));
        }

        #[test]
        fn test_stopped_child_is_reaped() {
            let mut child = Command::new("sleep").arg("5").spawn().unwrap();
            let started = Instant::now();
            stop(&mut child);
            assert!(started.elapsed() < Duration::from_secs(4));
            assert!(matches!(child.try_wait(), Ok(Some(_))));
        }
    }
}
