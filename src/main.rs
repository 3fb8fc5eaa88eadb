mod cli;
mod logging;
mod reporter;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, bail, Context};
use archive_bus::config::{self, AppConfig};
use archive_bus::maintenance;
use archive_bus::plan::{self, FilterOptions, OperationKind};
use archive_bus::{MigrationEngine, MigrationPlan};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, MigrateArgs};
use colored::*;
use dotenv::dotenv;
use indicatif::HumanBytes;
use reporter::CliReporter;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match config::load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let result = match args.command {
        Some(Commands::Migrate(migrate)) => run_migrate(&config, migrate),
        Some(Commands::Check { dir, force, yes }) => run_check(&config, &dir, force, yes),
        Some(Commands::Clean { dir, yes }) => run_clean(&config, &dir, yes),
        Some(Commands::RenameCbz { dir }) => {
            let renamed = maintenance::rename_cbz_to_zip(&dir);
            println!("Renamed {} files", renamed.len());
            Ok(())
        }
        Some(Commands::RemoveEmpty { dir }) => {
            let removed = maintenance::remove_empty_directories(&dir);
            println!("Removed {} empty directories", removed);
            Ok(())
        }
        Some(Commands::Restore { path }) => run_restore(&path),
        Some(Commands::PrintConfig) => config::render_config(&config)
            .map(|rendered| println!("{}", rendered))
            .map_err(anyhow::Error::from),
        Some(Commands::InitConfig { path }) => config::write_default_config(&path)
            .map(|()| println!("Wrote default configuration to {}", path.display()))
            .map_err(anyhow::Error::from),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
    Ok(())
}

fn run_migrate(config: &AppConfig, args: MigrateArgs) -> anyhow::Result<()> {
    let (source, target) = resolve_pair(config, &args)?;
    let kind: OperationKind = args.mode.map(Into::into).unwrap_or(config.default_mode);

    let engine = MigrationEngine::new(config.clone());
    let reporter = CliReporter::new();
    let prepared = engine.prepare(&source, &target, kind, args.subdir.as_deref(), &reporter)?;

    if prepared.operations.is_empty() {
        info!("No archives to {} under {}", kind, prepared.source_base.display());
        return Ok(());
    }
    print_preview(&prepared);

    let mut options = FilterOptions {
        only_safe: true,
        skip_existing: args.skip_existing,
    };
    let unsafe_count = prepared.unsafe_count();
    if args.include_unsafe && unsafe_count > 0 {
        options.only_safe = !(args.yes
            || prompt_confirm(
                &format!("Include {} UNSAFE operations?", unsafe_count),
                Some(false),
            )?);
    }

    if args.dry_run {
        if let Some(report) = &args.report {
            plan::write_report(report, &prepared.operations)?;
        }
        info!("Dry run, nothing changed");
        return Ok(());
    }

    let runnable = if options.only_safe {
        prepared.safe_count()
    } else {
        prepared.operations.len()
    };
    if runnable == 0 {
        warn!("No operations passed the safety check");
        return Ok(());
    }
    if !args.yes
        && !prompt_confirm(
            &format!("{} up to {} archives?", capitalize(&kind.to_string()), runnable),
            Some(false),
        )?
    {
        info!("Aborted");
        return Ok(());
    }

    let result = engine.execute(prepared, options, &reporter);
    if result.removed_dirs > 0 {
        info!("Removed {} empty source directories", result.removed_dirs);
    }
    if let Some(report) = &args.report {
        plan::write_report(report, &result.operations)?;
    }

    info!(
        "{} succeeded, {} failed in {:.2}s",
        result.summary.success.to_string().green(),
        result.summary.errors.to_string().red(),
        result.summary.duration.as_secs_f64()
    );
    if result.summary.errors > 0 {
        bail!("{} operations failed", result.summary.errors);
    }
    Ok(())
}

fn resolve_pair(config: &AppConfig, args: &MigrateArgs) -> anyhow::Result<(PathBuf, PathBuf)> {
    if let Some(index) = args.pair {
        let pair = index
            .checked_sub(1)
            .and_then(|i| config.directory_pairs.get(i))
            .ok_or_else(|| {
                anyhow!(
                    "no directory pair {} ({} configured)",
                    index,
                    config.directory_pairs.len()
                )
            })?;
        return Ok((pair.source.clone(), pair.target.clone()));
    }
    match (&args.source, &args.target) {
        (Some(source), Some(target)) => Ok((source.clone(), target.clone())),
        _ => bail!("give SOURCE and TARGET, or --pair N"),
    }
}

fn print_preview(prepared: &MigrationPlan) {
    println!(
        "\n{} {} -> {}",
        prepared.kind.to_string().bold(),
        prepared.source_base.display(),
        prepared.target_base.display()
    );
    for op in &prepared.operations {
        let verdict = if op.is_safe() {
            "SAFE  ".green()
        } else {
            "UNSAFE".red()
        };
        let size = op.source_info.map(|s| HumanBytes(s.size).to_string()).unwrap_or_default();
        let relative = op
            .source
            .strip_prefix(&prepared.source_base)
            .unwrap_or(&op.source);
        println!(
            "  {} {} ({}) {}",
            verdict,
            relative.display(),
            size,
            op.reason_text().dimmed()
        );
    }
    for (path, err) in &prepared.scan_errors {
        println!("  {} {}: {}", "SKIPPED".yellow(), path.display(), err);
    }
    println!(
        "{} safe, {} unsafe\n",
        prepared.safe_count().to_string().green(),
        prepared.unsafe_count().to_string().red()
    );
}

fn run_check(config: &AppConfig, dir: &Path, force: bool, yes: bool) -> anyhow::Result<()> {
    let engine = MigrationEngine::new(config.clone());
    engine
        .checker()
        .preflight()
        .context("archive tester is not usable")?;

    let reporter = CliReporter::new();
    let report = engine.verify(dir, force, &reporter)?;

    for outcome in &report.invalid {
        if let Some(failure) = &outcome.failure {
            println!("  {} {}: {}", "INVALID".red(), outcome.path.display(), failure);
        }
    }
    for path in &report.cancelled {
        println!("  {} {}", "CANCELLED".yellow(), path.display());
    }
    if report.skipped > 0 {
        info!("{} archives were already verified", report.skipped);
    }

    let corrupt: Vec<PathBuf> = report.corrupt().map(Path::to_path_buf).collect();
    if corrupt.is_empty() {
        return Ok(());
    }
    if yes
        || prompt_confirm(
            &format!("Tombstone {} corrupt archives?", corrupt.len()),
            Some(false),
        )?
    {
        let mut failed = 0;
        for path in &corrupt {
            if let Err(e) = maintenance::tombstone(path) {
                error!("Could not tombstone {}: {}", path.display(), e);
                failed += 1;
            }
        }
        info!("Tombstoned {} archives", corrupt.len() - failed);
    }
    Ok(())
}

fn run_clean(config: &AppConfig, dir: &Path, yes: bool) -> anyhow::Result<()> {
    let extensions = &config.file_operations.temp_extensions;
    if !yes
        && !prompt_confirm(
            &format!(
                "Delete every {} file under {}?",
                extensions.join(", "),
                dir.display()
            ),
            Some(false),
        )?
    {
        return Ok(());
    }
    let removed = maintenance::remove_temp_files(dir, extensions);
    println!("Removed {} files", removed.len());
    Ok(())
}

fn run_restore(path: &Path) -> anyhow::Result<()> {
    if path.is_dir() {
        let restored = maintenance::restore_tombstones(path);
        println!("Restored {} files", restored.len());
    } else {
        let restored = maintenance::restore_tombstone(path)?;
        println!("Restored {}", restored.display());
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
