use archive_bus::scanner::{scan, ScanOptions};
use archive_bus::AppConfig;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn options(ignore: &[&str]) -> ScanOptions {
    let config = AppConfig::default();
    let ignore: Vec<String> = ignore.iter().map(|s| s.to_string()).collect();
    ScanOptions::new(&config.file_operations.archive_extensions, &ignore)
}

fn write(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![0u8; len]).unwrap();
}

#[test]
fn test_scan_aggregates_bottom_up() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(&root.join("a.zip"), 10);
    write(&root.join("notes.txt"), 5);
    write(&root.join("sub/b.CBZ"), 20);
    write(&root.join("sub/deep/c.7z"), 30);
    write(&root.join("sub/deep/cover.jpg"), 7);
    fs::create_dir_all(root.join("empty")).unwrap();

    let tree = scan(root, &options(&[]));

    assert_eq!(tree.archive_count(), 3);
    assert_eq!(tree.total_size(), 72);
    assert!(tree.error().is_none());

    let names: Vec<&str> = tree.children().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["empty", "sub"]);

    let sub = tree.child("sub").unwrap();
    assert_eq!(sub.archive_count(), 2);
    assert_eq!(sub.total_size(), 57);

    let deep = tree.find(Path::new("sub/deep")).unwrap();
    assert_eq!(deep.archive_count(), 1);
    assert_eq!(deep.files().len(), 2);

    let empty = tree.child("empty").unwrap();
    assert_eq!(empty.archive_count(), 0);
    assert_eq!(empty.total_size(), 0);

    let archives: Vec<&str> = tree.archives().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(archives, vec!["a.zip", "b.CBZ", "c.7z"]);
}

#[test]
fn test_scan_respects_ignore_patterns() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(&root.join("keep.zip"), 10);
    write(&root.join("skip.zip.part"), 10);
    write(&root.join("@eaDir/thumb.zip"), 10);

    let tree = scan(root, &options(&["*.part", "@eaDir"]));

    assert_eq!(tree.archive_count(), 1);
    assert_eq!(tree.total_size(), 10);
    assert!(tree.child("@eaDir").is_none());
}

#[test]
fn test_missing_root_yields_failed_node() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope");

    let tree = scan(&missing, &options(&[]));

    assert!(tree.error().is_some());
    assert_eq!(tree.archive_count(), 0);
    assert_eq!(tree.scan_errors().len(), 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_does_not_abort_scan() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = dir.path();
    write(&root.join("ok/a.zip"), 10);
    write(&root.join("locked/b.zip"), 10);
    let locked = root.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can list it anyway; nothing to observe then.
    let readable = fs::read_dir(&locked).is_ok();
    let tree = scan(root, &options(&[]));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    if readable {
        return;
    }

    assert_eq!(tree.archive_count(), 1);
    let locked_node = tree.child("locked").unwrap();
    assert!(locked_node.error().is_some());
    assert_eq!(locked_node.archive_count(), 0);
    assert_eq!(tree.child("ok").unwrap().archive_count(), 1);
}

#[cfg(unix)]
#[test]
fn test_symlinked_directories_are_not_followed() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(&root.join("real/a.zip"), 10);
    std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();
    std::os::unix::fs::symlink(root, root.join("real/loop")).unwrap();

    let tree = scan(root, &options(&[]));

    assert_eq!(tree.archive_count(), 1);
    assert!(tree.child("link").is_none());
}
