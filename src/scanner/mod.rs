mod tree;
mod walk;

pub use tree::{DirectoryNode, FileEntry};
pub use walk::{scan, ScanOptions};
