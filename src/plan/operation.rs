use crate::safety::{self, FileSnapshot, SafetyReason, SafetyThresholds, SafetyVerdict};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Copy,
    Move,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Copy => write!(f, "copy"),
            OperationKind::Move => write!(f, "move"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Safety {
    #[default]
    Unknown,
    Safe,
    Unsafe,
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Safety::Unknown => write!(f, "unknown"),
            Safety::Safe => write!(f, "safe"),
            Safety::Unsafe => write!(f, "unsafe"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperationStatus {
    #[default]
    Pending,
    Success,
    Error,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Success => write!(f, "success"),
            OperationStatus::Error => write!(f, "error"),
        }
    }
}

/// One planned file transfer. The planner creates it, the safety pass
/// fills in the verdict and the executor fills in the outcome.
#[derive(Debug, Clone)]
pub struct ArchiveOperation {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: OperationKind,
    pub safety: Safety,
    pub reason: Option<SafetyReason>,
    pub source_info: Option<FileSnapshot>,
    pub target_info: Option<FileSnapshot>,
    pub status: OperationStatus,
    pub backup_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl ArchiveOperation {
    pub fn new(source: &Path, target: &Path, kind: OperationKind) -> Self {
        Self {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            kind,
            safety: Safety::Unknown,
            reason: None,
            source_info: None,
            target_info: None,
            status: OperationStatus::Pending,
            backup_path: None,
            error: None,
        }
    }

    pub fn analyze(&mut self, thresholds: &SafetyThresholds) {
        let verdict = safety::evaluate(&self.source, &self.target, thresholds);
        self.apply_verdict(verdict);
    }

    pub fn apply_verdict(&mut self, verdict: SafetyVerdict) {
        self.safety = if verdict.is_safe() {
            Safety::Safe
        } else {
            Safety::Unsafe
        };
        self.reason = Some(verdict.reason);
        self.source_info = verdict.source;
        self.target_info = verdict.target;
    }

    pub fn is_safe(&self) -> bool {
        self.safety == Safety::Safe
    }

    pub fn reason_text(&self) -> String {
        self.reason
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}
