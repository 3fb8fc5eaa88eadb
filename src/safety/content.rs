use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::warn;
use zip::result::ZipResult;
use zip::ZipArchive;

/// What an archive actually holds, ignoring metadata files, directory
/// entries and empty entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveContent {
    pub entries: usize,
    pub content_size: u64,
}

/// Count qualifying entries. An archive that can't be opened counts as empty.
pub fn archive_content(path: &Path, ignored_extensions: &[String]) -> ArchiveContent {
    match read_content(path, ignored_extensions) {
        Ok(content) => content,
        Err(e) => {
            warn!("Could not read archive {}: {}", path.display(), e);
            ArchiveContent::default()
        }
    }
}

fn read_content(path: &Path, ignored_extensions: &[String]) -> ZipResult<ArchiveContent> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut content = ArchiveContent::default();

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.is_dir() || entry.size() == 0 {
            continue;
        }
        let name = entry.name().to_lowercase();
        if ignored_extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            continue;
        }
        content.entries += 1;
        content.content_size += entry.size();
    }

    Ok(content)
}
