mod content;

pub use content::{archive_content, ArchiveContent};

use crate::config::normalize_extension;
use indicatif::HumanBytes;
use std::fmt;
use std::fs;
use std::path::Path;

/// Limits that gate whether a target may be overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyThresholds {
    pub min_valid_size: u64,
    pub size_difference_threshold: f64,
    pub file_count_difference_threshold: f64,
    pub archive_extensions: Vec<String>,
    pub ignored_extensions: Vec<String>,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        crate::config::AppConfig::default().safety_thresholds()
    }
}

impl SafetyThresholds {
    pub fn is_archive(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.archive_extensions
            .iter()
            .any(|ext| name.ends_with(&normalize_extension(ext)))
    }
}

/// Metadata captured for one side of a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    pub size: u64,
    /// Present only when both sides are archives and got opened.
    pub content: Option<ArchiveContent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SafetyReason {
    SourceMissing,
    SourceTooSmall { size: u64, min: u64 },
    TargetMissing,
    SourceSmallerThanTarget { source: u64, target: u64 },
    FewerEntries { source: usize, target: usize },
    LessContent { source: u64, target: u64 },
    Passed,
}

impl SafetyReason {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyReason::TargetMissing | SafetyReason::Passed)
    }
}

impl fmt::Display for SafetyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyReason::SourceMissing => write!(f, "source missing"),
            SafetyReason::SourceTooSmall { size, min } => write!(
                f,
                "source too small ({} < {})",
                HumanBytes(*size),
                HumanBytes(*min)
            ),
            SafetyReason::TargetMissing => write!(f, "target does not exist, safe to copy"),
            SafetyReason::SourceSmallerThanTarget { source, target } => write!(
                f,
                "source smaller than target ({} vs {}, size ratio {:.2})",
                HumanBytes(*source),
                HumanBytes(*target),
                ratio(*source as f64, *target as f64)
            ),
            SafetyReason::FewerEntries { source, target } => write!(
                f,
                "source archive has fewer entries ({} vs {}, count ratio {:.2})",
                source,
                target,
                ratio(*source as f64, *target as f64)
            ),
            SafetyReason::LessContent { source, target } => write!(
                f,
                "source archive content smaller ({} vs {}, content ratio {:.2})",
                HumanBytes(*source),
                HumanBytes(*target),
                ratio(*source as f64, *target as f64)
            ),
            SafetyReason::Passed => write!(f, "checks passed, safe to overwrite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyVerdict {
    pub reason: SafetyReason,
    pub source: Option<FileSnapshot>,
    pub target: Option<FileSnapshot>,
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        self.reason.is_safe()
    }
}

/// Decide whether `source` may replace `target`, reading only metadata and
/// archive directories. The first failing rule wins.
pub fn evaluate(source: &Path, target: &Path, thresholds: &SafetyThresholds) -> SafetyVerdict {
    let mut source_snapshot = match fs::metadata(source) {
        Ok(meta) if meta.is_file() => FileSnapshot {
            size: meta.len(),
            content: None,
        },
        _ => {
            return SafetyVerdict {
                reason: SafetyReason::SourceMissing,
                source: None,
                target: None,
            }
        }
    };
    let mut target_snapshot = fs::metadata(target).ok().map(|meta| FileSnapshot {
        size: meta.len(),
        content: None,
    });

    let mut reason = decide(&source_snapshot, target_snapshot.as_ref(), thresholds);

    // Content is only worth reading once the cheap size rules pass.
    if let Some(target_snapshot) = target_snapshot.as_mut() {
        if reason == SafetyReason::Passed
            && thresholds.is_archive(source)
            && thresholds.is_archive(target)
        {
            source_snapshot.content =
                Some(archive_content(source, &thresholds.ignored_extensions));
            target_snapshot.content =
                Some(archive_content(target, &thresholds.ignored_extensions));
            reason = decide(&source_snapshot, Some(&*target_snapshot), thresholds);
        }
    }

    SafetyVerdict {
        reason,
        source: Some(source_snapshot),
        target: target_snapshot,
    }
}

/// The pure decision over captured snapshots. Archive content rules apply
/// only when both snapshots carry content.
pub fn decide(
    source: &FileSnapshot,
    target: Option<&FileSnapshot>,
    thresholds: &SafetyThresholds,
) -> SafetyReason {
    if source.size < thresholds.min_valid_size {
        return SafetyReason::SourceTooSmall {
            size: source.size,
            min: thresholds.min_valid_size,
        };
    }

    let Some(target) = target else {
        return SafetyReason::TargetMissing;
    };

    if (source.size as f64) < target.size as f64 * thresholds.size_difference_threshold {
        return SafetyReason::SourceSmallerThanTarget {
            source: source.size,
            target: target.size,
        };
    }

    if let (Some(src), Some(tgt)) = (source.content, target.content) {
        let min_entries = tgt.entries as f64 * (1.0 - thresholds.file_count_difference_threshold);
        if (src.entries as f64) < min_entries {
            return SafetyReason::FewerEntries {
                source: src.entries,
                target: tgt.entries,
            };
        }
        if (src.content_size as f64) < tgt.content_size as f64 * thresholds.size_difference_threshold
        {
            return SafetyReason::LessContent {
                source: src.content_size,
                target: tgt.content_size,
            };
        }
    }

    SafetyReason::Passed
}

fn ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}
