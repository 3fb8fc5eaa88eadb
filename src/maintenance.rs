//! Housekeeping over a library tree: tombstones, leftover temp files,
//! `.cbz` renames and empty directory pruning.

use crate::config::normalize_extension;
use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const TOMBSTONE_EXTENSION: &str = "tdel";

/// Rename `path` to `<path>.tdel`, replacing any tombstone already there.
pub fn tombstone(path: &Path) -> Result<PathBuf, Error> {
    let mut name = path
        .file_name()
        .ok_or_else(|| Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "no file name".to_string(),
        })?
        .to_os_string();
    name.push(".");
    name.push(TOMBSTONE_EXTENSION);
    let tombstoned = path.with_file_name(name);

    if tombstoned.exists() {
        fs::remove_file(&tombstoned)?;
    }
    fs::rename(path, &tombstoned)?;
    info!("Tombstoned {} -> {}", path.display(), tombstoned.display());
    Ok(tombstoned)
}

/// Strip the `.tdel` suffix again. Refuses to replace an existing file.
pub fn restore_tombstone(path: &Path) -> Result<PathBuf, Error> {
    let is_tombstone = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(TOMBSTONE_EXTENSION));
    if !is_tombstone {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "not a tombstoned file".to_string(),
        });
    }
    let original = path.with_extension("");
    if original.exists() {
        return Err(Error::InvalidPath {
            path: original,
            reason: "already exists".to_string(),
        });
    }
    fs::rename(path, &original)?;
    info!("Restored {} -> {}", path.display(), original.display());
    Ok(original)
}

/// Restore every tombstone under `dir`. Failures are logged and skipped.
pub fn restore_tombstones(dir: &Path) -> Vec<PathBuf> {
    files_with_extension(dir, TOMBSTONE_EXTENSION)
        .into_iter()
        .filter_map(|path| match restore_tombstone(&path) {
            Ok(restored) => Some(restored),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Delete files under `dir` whose names end in one of `extensions`.
pub fn remove_temp_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let extensions: Vec<String> = extensions.iter().map(|e| normalize_extension(e)).collect();
    let mut removed = Vec::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Removed {}", entry.path().display());
                removed.push(entry.into_path());
            }
            Err(e) => warn!("Could not remove {}: {}", entry.path().display(), e),
        }
    }

    info!("Removed {} temporary files under {}", removed.len(), dir.display());
    removed
}

/// Rename `*.cbz` to `*.zip` unless the `.zip` already exists.
pub fn rename_cbz_to_zip(dir: &Path) -> Vec<PathBuf> {
    let mut renamed = Vec::new();
    for path in files_with_extension(dir, "cbz") {
        let zip = path.with_extension("zip");
        if zip.exists() {
            warn!("Skipping {}: {} already exists", path.display(), zip.display());
            continue;
        }
        match fs::rename(&path, &zip) {
            Ok(()) => {
                debug!("Renamed {} -> {}", path.display(), zip.display());
                renamed.push(zip);
            }
            Err(e) => warn!("Could not rename {}: {}", path.display(), e),
        }
    }
    info!("Renamed {} .cbz files under {}", renamed.len(), dir.display());
    renamed
}

/// Remove empty directories below `dir`, deepest first. `dir` itself stays.
pub fn remove_empty_directories(dir: &Path) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        let is_empty = fs::read_dir(entry.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            continue;
        }
        match fs::remove_dir(entry.path()) {
            Ok(()) => {
                debug!("Removed empty directory {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("Could not remove {}: {}", entry.path().display(), e),
        }
    }
    if removed > 0 {
        info!("Removed {} empty directories under {}", removed, dir.display());
    }
    removed
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .map(|e| e.into_path())
        .collect()
}
