use crate::error::Error;
use ahash::AHashMap;
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One verification attempt as stored in the journal file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckHistoryEntry {
    pub path: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub valid: bool,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl CheckHistoryEntry {
    pub fn new(path: &Path, valid: bool, error: Option<String>) -> Self {
        Self {
            path: path_key(path),
            valid,
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            error,
        }
    }
}

/// Latest known outcome per path.
#[derive(Debug, Default, Clone)]
pub struct CheckHistory {
    entries: AHashMap<String, CheckHistoryEntry>,
}

impl CheckHistory {
    /// Read newline-delimited records, keeping the last one per path.
    /// Unreadable lines are skipped.
    pub fn parse<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut history = Self::default();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<CheckHistoryEntry>(line) {
                Ok(entry) if !entry.path.is_empty() => history.record(entry),
                Ok(_) => warn!("Skipping journal line {} without a path", line_no + 1),
                Err(e) => warn!("Skipping invalid journal line {}: {}", line_no + 1, e),
            }
        }
        Ok(history)
    }

    /// Last write wins, unless both timestamps are readable and the new one is older.
    pub fn record(&mut self, entry: CheckHistoryEntry) {
        if let Some(existing) = self.entries.get(&entry.path) {
            if let (Some(old), Some(new)) = (
                parse_timestamp(&existing.timestamp),
                parse_timestamp(&entry.timestamp),
            ) {
                if new < old {
                    return;
                }
            }
        }
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn get(&self, path: &Path) -> Option<&CheckHistoryEntry> {
        self.entries.get(&path_key(path))
    }

    /// Whether the latest record for `path` says it is valid.
    pub fn is_verified(&self, path: &Path) -> bool {
        self.get(path).is_some_and(|e| e.valid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckHistoryEntry> {
        self.entries.values()
    }
}

/// Append-only journal file plus its in-memory view.
///
/// The file is never rewritten; a crash during `append` can at worst leave
/// one truncated trailing line, which the next load skips.
#[derive(Debug)]
pub struct CheckJournal {
    path: PathBuf,
    history: CheckHistory,
}

impl CheckJournal {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let history = if path.exists() {
            let file = fs::File::open(path)?;
            CheckHistory::parse(BufReader::new(file))?
        } else {
            CheckHistory::default()
        };
        debug!(
            "Loaded {} journal records from {}",
            history.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            history,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn history(&self) -> &CheckHistory {
        &self.history
    }

    pub fn append(&mut self, entry: CheckHistoryEntry) -> Result<(), Error> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        self.history.record(entry);
        Ok(())
    }

    pub fn record(
        &mut self,
        path: &Path,
        valid: bool,
        error: Option<String>,
    ) -> Result<(), Error> {
        self.append(CheckHistoryEntry::new(path, valid, error))
    }
}

pub(crate) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Instants are compared in UTC. Legacy stamps without an offset were
/// written in local time.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()?
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
