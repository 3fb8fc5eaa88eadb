use super::tree::{DirectoryNode, FileEntry};
use crate::config::normalize_extension;
use glob::Pattern;
use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    archive_extensions: Vec<String>,
    ignore_patterns: Vec<Pattern>,
}

impl ScanOptions {
    pub fn new(archive_extensions: &[String], ignore_globs: &[String]) -> Self {
        let ignore_patterns = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            archive_extensions: archive_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            ignore_patterns,
        }
    }

    /// Case-insensitive extension membership test.
    pub fn is_archive(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.archive_extensions.iter().any(|ext| lower.ends_with(ext))
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|p| p.matches(name))
    }
}

/// Build the directory model for `root`.
///
/// Never fails: a directory that cannot be listed is logged and returned
/// as an empty node carrying the error. Symlinked directories are not
/// followed, so the walk cannot loop.
pub fn scan(root: &Path, options: &ScanOptions) -> DirectoryNode {
    let node = visit_dir(root, options);
    debug!(
        "Scanned {}: {} archives, {} bytes",
        root.display(),
        node.archive_count(),
        node.total_size()
    );
    node
}

fn visit_dir(dir: &Path, options: &ScanOptions) -> DirectoryNode {
    let read_dir = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            error!("Error reading directory {}: {}", dir.display(), err);
            return DirectoryNode::failed(dir, err.to_string());
        }
    };

    let mut entries: Vec<DirEntry> = read_dir
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Error reading entry in directory {}: {}", dir.display(), err);
                None
            }
        })
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut sub_dirs: Vec<PathBuf> = Vec::new();
    let mut files: Vec<FileEntry> = Vec::new();

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if options.is_ignored(&name) {
            trace!("Ignoring {}", entry.path().display());
            continue;
        }

        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(err) => {
                warn!("Error getting file type for {}: {}", path.display(), err);
                continue;
            }
        };

        let size = if file_type.is_dir() {
            sub_dirs.push(path);
            continue;
        } else if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => meta.len(),
                Ok(_) => {
                    debug!("Not following symlinked directory {}", path.display());
                    continue;
                }
                Err(err) => {
                    warn!("Dangling symlink {}: {}", path.display(), err);
                    continue;
                }
            }
        } else {
            match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(err) => {
                    warn!("Error getting metadata for {}: {}", path.display(), err);
                    continue;
                }
            }
        };

        files.push(FileEntry {
            is_archive: options.is_archive(&name),
            name,
            path,
            size,
        });
    }

    let children = sub_dirs
        .iter()
        .map(|sub_dir| visit_dir(sub_dir, options))
        .collect();

    DirectoryNode::new(dir, children, files)
}
