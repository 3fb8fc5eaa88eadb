use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BACKUP_EXTENSION: &str = "upbak";

const MAX_BACKUP_ATTEMPTS: u32 = 1000;

/// `<name>.<YYYYMMDD_HHMMSS>.upbak`, beside the file or inside `backup_dir`.
pub fn backup_path_for(file: &Path, backup_dir: Option<&Path>, at: DateTime<Local>) -> Option<PathBuf> {
    let name = file.file_name()?.to_string_lossy();
    let backup_name = format!(
        "{}.{}.{}",
        name,
        at.format("%Y%m%d_%H%M%S"),
        BACKUP_EXTENSION
    );
    let dir = match backup_dir {
        Some(dir) => dir.to_path_buf(),
        None => file.parent()?.to_path_buf(),
    };
    Some(dir.join(backup_name))
}

/// Copy `file` to a timestamped backup and return the backup's path.
/// An existing backup is never replaced; a counter is added instead.
pub fn create_backup(file: &Path, backup_dir: Option<&Path>) -> io::Result<PathBuf> {
    let first = backup_path_for(file, backup_dir, Local::now()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot derive a backup name for {}", file.display()),
        )
    })?;
    if let Some(dir) = backup_dir {
        fs::create_dir_all(dir)?;
    }

    let mut source = File::open(file)?;
    let (mut dest, backup) = create_unique(&first)?;
    if let Err(e) = io::copy(&mut source, &mut dest) {
        drop(dest);
        let _ = fs::remove_file(&backup);
        return Err(e);
    }
    info!("Created backup {}", backup.display());
    Ok(backup)
}

fn create_unique(first: &Path) -> io::Result<(File, PathBuf)> {
    for attempt in 0..MAX_BACKUP_ATTEMPTS {
        let candidate = if attempt == 0 {
            first.to_path_buf()
        } else {
            numbered(first, attempt)
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free backup name next to {}", first.display()),
    ))
}

/// `<name>.<stamp>.upbak` becomes `<name>.<stamp>.<n>.upbak`.
fn numbered(path: &Path, n: u32) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = format!(".{BACKUP_EXTENSION}");
    let stem = name.strip_suffix(&suffix).unwrap_or(&name);
    path.with_file_name(format!("{stem}.{n}{suffix}"))
}
