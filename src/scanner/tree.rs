use std::path::{Component, Path, PathBuf};

/// A single file found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub is_archive: bool,
}

/// One scanned directory.
///
/// Aggregates are computed once, bottom-up, when the node is built and the
/// node is read-only afterwards. A directory that could not be listed has no
/// children or files and contributes zero to its ancestors.
#[derive(Debug, Clone)]
pub struct DirectoryNode {
    path: PathBuf,
    name: String,
    children: Vec<DirectoryNode>,
    files: Vec<FileEntry>,
    archive_count: usize,
    total_size: u64,
    error: Option<String>,
}

impl DirectoryNode {
    pub(crate) fn new(path: &Path, children: Vec<DirectoryNode>, files: Vec<FileEntry>) -> Self {
        let own_archives = files.iter().filter(|f| f.is_archive).count();
        let own_size: u64 = files.iter().map(|f| f.size).sum();

        let archive_count = own_archives + children.iter().map(|c| c.archive_count).sum::<usize>();
        let total_size = own_size + children.iter().map(|c| c.total_size).sum::<u64>();

        Self {
            path: path.to_path_buf(),
            name: display_name(path),
            children,
            files,
            archive_count,
            total_size,
            error: None,
        }
    }

    pub(crate) fn failed(path: &Path, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(path)
        }
    }

    /// Node describing a directory that has not been scanned or does not exist.
    pub fn empty(path: &Path) -> Self {
        Self::new(path, Vec::new(), Vec::new())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[DirectoryNode] {
        &self.children
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn archive_count(&self) -> usize {
        self.archive_count
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn child(&self, name: &str) -> Option<&DirectoryNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Look up a descendant by a path relative to this node.
    pub fn find(&self, relative: &Path) -> Option<&DirectoryNode> {
        let mut node = self;
        for component in relative.components() {
            match component {
                Component::CurDir => continue,
                Component::Normal(name) => node = node.child(&name.to_string_lossy())?,
                _ => return None,
            }
        }
        Some(node)
    }

    /// All archives in this subtree, own files before descendants.
    pub fn archives(&self) -> Vec<&FileEntry> {
        let mut out = Vec::with_capacity(self.archive_count);
        self.collect_archives(&mut out);
        out
    }

    fn collect_archives<'a>(&'a self, out: &mut Vec<&'a FileEntry>) {
        out.extend(self.files.iter().filter(|f| f.is_archive));
        for child in &self.children {
            child.collect_archives(out);
        }
    }

    /// Directories in this subtree that failed to list, with their errors.
    pub fn scan_errors(&self) -> Vec<(&Path, &str)> {
        let mut out = Vec::new();
        self.collect_errors(&mut out);
        out
    }

    fn collect_errors<'a>(&'a self, out: &mut Vec<(&'a Path, &'a str)>) {
        if let Some(err) = &self.error {
            out.push((&self.path, err));
        }
        for child in &self.children {
            child.collect_errors(out);
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
