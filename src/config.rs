use crate::checker::TimeoutPolicy;
use crate::error::Error;
use crate::plan::OperationKind;
use crate::safety::SafetyThresholds;
use crate::scanner::ScanOptions;
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Base name of the optional configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "Config";

const ENV_PREFIX: &str = "ARCHIVE_BUS";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub default_mode: OperationKind,
    pub file_operations: FileOperationsConfig,
    pub check: CheckConfig,
    pub scan: ScanConfig,
    pub processing: ProcessingConfig,
    pub directory_pairs: Vec<DirectoryPair>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileOperationsConfig {
    pub min_valid_file_size: u64,
    pub size_difference_threshold: f64,
    pub file_count_difference_threshold: f64,
    pub archive_extensions: Vec<String>,
    pub ignored_extensions: Vec<String>,
    pub temp_extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckConfig {
    pub tester_program: String,
    pub base_timeout_secs: u64,
    pub min_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub timeout_per_100mb_secs: u64,
    /// Deadline for a whole verification batch. Zero disables it.
    pub overall_timeout_secs: u64,
    pub max_workers: usize,
    pub skip_checked: bool,
    pub history_file_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScanConfig {
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    pub remove_empty_dirs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DirectoryPair {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_mode: OperationKind::Move,
            file_operations: FileOperationsConfig::default(),
            check: CheckConfig::default(),
            scan: ScanConfig::default(),
            processing: ProcessingConfig::default(),
            directory_pairs: Vec::new(),
        }
    }
}

impl Default for FileOperationsConfig {
    fn default() -> Self {
        Self {
            min_valid_file_size: 1024 * 1024,
            size_difference_threshold: 0.5,
            file_count_difference_threshold: 0.0,
            archive_extensions: to_strings(&[".zip", ".cbz", ".rar", ".7z"]),
            ignored_extensions: to_strings(&[
                ".md", ".yaml", ".yml", ".txt", ".json", ".db", ".ini",
            ]),
            temp_extensions: to_strings(&[".tdel", ".bak", ".upbak"]),
            backup_dir: None,
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            tester_program: "7z".to_string(),
            base_timeout_secs: 300,
            min_timeout_secs: 60,
            max_timeout_secs: 1800,
            timeout_per_100mb_secs: 60,
            overall_timeout_secs: 4 * 60 * 60,
            max_workers: 4,
            skip_checked: true,
            history_file_name: "archive_check_history.json".to_string(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            remove_empty_dirs: true,
        }
    }
}

impl AppConfig {
    pub fn safety_thresholds(&self) -> SafetyThresholds {
        let ops = &self.file_operations;
        SafetyThresholds {
            min_valid_size: ops.min_valid_file_size,
            size_difference_threshold: ops.size_difference_threshold,
            file_count_difference_threshold: ops.file_count_difference_threshold,
            archive_extensions: ops.archive_extensions.clone(),
            ignored_extensions: ops.ignored_extensions.clone(),
        }
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            base: Duration::from_secs(self.check.base_timeout_secs),
            min: Duration::from_secs(self.check.min_timeout_secs),
            max: Duration::from_secs(self.check.max_timeout_secs),
            per_100mb: Duration::from_secs(self.check.timeout_per_100mb_secs),
        }
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        match self.check.overall_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::new(
            &self.file_operations.archive_extensions,
            &self.scan.ignore_patterns,
        )
    }

    /// Location of the check journal for a verified root directory.
    pub fn history_path(&self, root: &Path) -> PathBuf {
        root.join(&self.check.history_file_name)
    }

    fn normalize(&mut self) {
        let ops = &mut self.file_operations;
        for list in [
            &mut ops.archive_extensions,
            &mut ops.ignored_extensions,
            &mut ops.temp_extensions,
        ] {
            for ext in list.iter_mut() {
                *ext = normalize_extension(ext);
            }
            list.retain(|ext| ext.len() > 1);
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let ops = &self.file_operations;
        for (key, value) in [
            (
                "file_operations.size_difference_threshold",
                ops.size_difference_threshold,
            ),
            (
                "file_operations.file_count_difference_threshold",
                ops.file_count_difference_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{key} must be within [0, 1], got {value}")));
            }
        }
        if self.check.min_timeout_secs > self.check.max_timeout_secs {
            return Err(invalid(format!(
                "check.min_timeout_secs ({}) exceeds check.max_timeout_secs ({})",
                self.check.min_timeout_secs, self.check.max_timeout_secs
            )));
        }
        if self.check.max_workers == 0 {
            return Err(invalid("check.max_workers must be at least 1".to_string()));
        }
        if ops.archive_extensions.is_empty() {
            return Err(invalid(
                "file_operations.archive_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration with defaults first, then the config file, then
/// `ARCHIVE_BUS__SECTION__KEY` environment variables. Each layer only
/// overrides the keys it sets.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, Error> {
    let file_source = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let builder = Config::builder()
        .add_source(Config::try_from(&AppConfig::default())?)
        .add_source(file_source)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config = builder.try_deserialize::<AppConfig>()?;
    config.normalize();
    config.validate()?;
    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

/// Write the default configuration as TOML, refusing to replace an existing file.
pub fn write_default_config(path: &Path) -> Result<(), Error> {
    if path.exists() {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "configuration file already exists".to_string(),
        });
    }
    let rendered = render_config(&AppConfig::default())?;
    fs::write(path, rendered)?;
    Ok(())
}

pub fn render_config(config: &AppConfig) -> Result<String, Error> {
    toml::to_string_pretty(config).map_err(|e| Error::Other(format!("TOML encode error: {e}")))
}

/// True when one path is the other or lies beneath it.
pub fn paths_overlap(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

pub(crate) fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

fn invalid(message: String) -> Error {
    Error::Config(config::ConfigError::Message(message))
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
