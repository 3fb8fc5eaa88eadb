use archive_bus::plan::{ArchiveOperation, Executor, OperationKind, OperationStatus};
use archive_bus::SilentReporter;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn backups_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".upbak"))
        .collect();
    names.sort();
    names
}

#[test]
fn test_copy_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src/a.zip");
    let target = dir.path().join("dst/deep/a.zip");
    write(&source, b"new archive");

    let mut ops = vec![ArchiveOperation::new(&source, &target, OperationKind::Copy)];
    let summary = Executor::default().execute(&mut ops, &SilentReporter);

    assert_eq!(summary.success, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(ops[0].status, OperationStatus::Success);
    assert_eq!(ops[0].backup_path, None);
    assert_eq!(fs::read(&target).unwrap(), b"new archive");
    assert!(source.exists());
}

#[test]
fn test_move_over_existing_target_keeps_backup() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src/a.zip");
    let target = dir.path().join("dst/a.zip");
    write(&source, b"new archive");
    write(&target, b"old archive");

    let mut ops = vec![ArchiveOperation::new(&source, &target, OperationKind::Move)];
    let summary = Executor::default().execute(&mut ops, &SilentReporter);

    assert_eq!(summary.success, 1);
    assert!(!source.exists());
    assert_eq!(fs::read(&target).unwrap(), b"new archive");

    let backup = ops[0].backup_path.clone().unwrap();
    assert_eq!(fs::read(&backup).unwrap(), b"old archive");
    let backups = backups_in(&dir.path().join("dst"));
    assert_eq!(backups.len(), 1);
    assert!(backups[0].starts_with("a.zip."));
    // a.zip.YYYYMMDD_HHMMSS.upbak
    assert_eq!(backups[0].len(), "a.zip.".len() + 15 + ".upbak".len());
}

#[test]
fn test_failed_operation_restores_target_and_batch_continues() {
    let dir = tempdir().unwrap();
    let vanished = dir.path().join("src/vanished.zip");
    let target = dir.path().join("dst/vanished.zip");
    let other_source = dir.path().join("src/other.zip");
    let other_target = dir.path().join("dst/other.zip");
    write(&vanished, b"planned");
    write(&target, b"precious original");
    write(&other_source, b"other");

    let mut ops = vec![
        ArchiveOperation::new(&vanished, &target, OperationKind::Move),
        ArchiveOperation::new(&other_source, &other_target, OperationKind::Move),
    ];
    // The source disappears between planning and execution.
    fs::remove_file(&vanished).unwrap();

    let summary = Executor::default().execute(&mut ops, &SilentReporter);

    assert_eq!(summary.success, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(ops[0].status, OperationStatus::Error);
    assert!(ops[0].error.is_some());
    assert_eq!(fs::read(&target).unwrap(), b"precious original");
    assert!(ops[0].backup_path.as_ref().unwrap().exists());

    assert_eq!(ops[1].status, OperationStatus::Success);
    assert_eq!(fs::read(&other_target).unwrap(), b"other");
}

#[test]
fn test_backups_go_to_configured_directory() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src/a.zip");
    let target = dir.path().join("dst/a.zip");
    let backup_dir = dir.path().join("backups");
    write(&source, b"new");
    write(&target, b"old");

    let mut ops = vec![ArchiveOperation::new(&source, &target, OperationKind::Copy)];
    Executor::new(Some(backup_dir.clone())).execute(&mut ops, &SilentReporter);

    assert_eq!(ops[0].status, OperationStatus::Success);
    assert_eq!(backups_in(&backup_dir).len(), 1);
    assert!(backups_in(&dir.path().join("dst")).is_empty());
}

#[test]
fn test_same_named_targets_keep_separate_backups() {
    let dir = tempdir().unwrap();
    let backup_dir = dir.path().join("backups");
    let source_a = dir.path().join("src/a/Vol.zip");
    let source_b = dir.path().join("src/b/Vol.zip");
    let target_a = dir.path().join("dst/a/Vol.zip");
    let target_b = dir.path().join("dst/b/Vol.zip");
    write(&source_a, b"NEW-A");
    write(&source_b, b"NEW-B");
    write(&target_a, b"OLD-A");
    write(&target_b, b"OLD-B");

    let mut ops = vec![
        ArchiveOperation::new(&source_a, &target_a, OperationKind::Copy),
        ArchiveOperation::new(&source_b, &target_b, OperationKind::Copy),
    ];
    let summary = Executor::new(Some(backup_dir.clone())).execute(&mut ops, &SilentReporter);

    assert_eq!(summary.success, 2);
    let backup_a = ops[0].backup_path.clone().unwrap();
    let backup_b = ops[1].backup_path.clone().unwrap();
    assert_ne!(backup_a, backup_b);
    assert_eq!(fs::read(&backup_a).unwrap(), b"OLD-A");
    assert_eq!(fs::read(&backup_b).unwrap(), b"OLD-B");
    assert_eq!(backups_in(&backup_dir).len(), 2);
}

#[cfg(unix)]
#[test]
fn test_target_overwritten_then_failed_move_is_restored() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let source_dir = dir.path().join("src");
    let source = source_dir.join("a.zip");
    let target = dir.path().join("dst/a.zip");
    write(&source, b"new archive");
    write(&target, b"precious original");

    // A read-only source directory makes the rename fail, the fallback copy
    // overwrite the target, and the source removal fail afterwards.
    fs::set_permissions(&source_dir, fs::Permissions::from_mode(0o555)).unwrap();
    let write_check = source_dir.join(".write-check");
    if fs::write(&write_check, b"").is_ok() {
        // Permissions are not enforced for this user.
        let _ = fs::remove_file(&write_check);
        fs::set_permissions(&source_dir, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let mut ops = vec![ArchiveOperation::new(&source, &target, OperationKind::Move)];
    let summary = Executor::default().execute(&mut ops, &SilentReporter);
    fs::set_permissions(&source_dir, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(summary.errors, 1);
    assert_eq!(ops[0].status, OperationStatus::Error);
    assert_eq!(fs::read(&target).unwrap(), b"precious original");
    assert_eq!(fs::read(&source).unwrap(), b"new archive");
    let backup = ops[0].backup_path.clone().unwrap();
    assert_eq!(fs::read(&backup).unwrap(), b"precious original");
}

#[test]
fn test_failed_backup_leaves_target_untouched() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src/a.zip");
    let target = dir.path().join("dst/a.zip");
    let blocker = dir.path().join("not-a-dir");
    write(&source, b"new");
    write(&target, b"old");
    write(&blocker, b"file in the way");

    let mut ops = vec![ArchiveOperation::new(&source, &target, OperationKind::Move)];
    let summary = Executor::new(Some(blocker.join("backups"))).execute(&mut ops, &SilentReporter);

    assert_eq!(summary.errors, 1);
    assert_eq!(ops[0].status, OperationStatus::Error);
    assert_eq!(ops[0].backup_path, None);
    assert_eq!(fs::read(&target).unwrap(), b"old");
    assert!(source.exists());
}
