use archive_bus::plan::OperationKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "archive-bus")]
#[command(about = "Move and verify archive libraries without losing data", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to Config.toml in the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Copy or move archives from a source tree into a target tree
    Migrate(MigrateArgs),
    /// Test every archive under a directory with the external tester
    Check {
        dir: PathBuf,
        /// Re-test archives already recorded as valid
        #[arg(long)]
        force: bool,
        /// Tombstone corrupt archives without asking
        #[arg(long)]
        yes: bool,
    },
    /// Delete leftover temporary files (.tdel, .bak, .upbak)
    Clean {
        dir: PathBuf,
        #[arg(long)]
        yes: bool,
    },
    /// Rename .cbz archives to .zip
    RenameCbz { dir: PathBuf },
    /// Remove empty directories below a directory
    RemoveEmpty { dir: PathBuf },
    /// Undo tombstoning for a file or every tombstone under a directory
    Restore { path: PathBuf },
    /// Print the effective configuration
    PrintConfig,
    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = "Config.toml")]
        path: PathBuf,
    },
}

#[derive(Debug, clap::Args)]
pub struct MigrateArgs {
    /// Source root; omit when using --pair
    pub source: Option<PathBuf>,
    /// Target root; omit when using --pair
    pub target: Option<PathBuf>,
    /// Use the Nth configured directory pair (1-based)
    #[arg(long, conflicts_with_all = ["source", "target"])]
    pub pair: Option<usize>,
    /// Defaults to the configured mode
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,
    /// Only migrate this subdirectory of the source root
    #[arg(long)]
    pub subdir: Option<PathBuf>,
    /// Leave targets that already exist alone
    #[arg(long)]
    pub skip_existing: bool,
    /// Also run operations the safety check rejected
    #[arg(long)]
    pub include_unsafe: bool,
    /// Answer yes to every confirmation
    #[arg(long)]
    pub yes: bool,
    /// Plan and print without touching any file
    #[arg(long)]
    pub dry_run: bool,
    /// Write the operations and their outcome to a CSV file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    Copy,
    Move,
}

impl From<Mode> for OperationKind {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Copy => OperationKind::Copy,
            Mode::Move => OperationKind::Move,
        }
    }
}
