use archive_bus::safety::{evaluate, SafetyReason, SafetyThresholds};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn write_zip(path: &Path, entries: &[(&str, usize)]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, size) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(&vec![b'x'; *size]).unwrap();
    }
    zip.finish().unwrap();
}

fn thresholds() -> SafetyThresholds {
    SafetyThresholds {
        min_valid_size: 1024,
        ..SafetyThresholds::default()
    }
}

#[test]
fn test_more_complete_source_is_safe() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.zip");
    let target = dir.path().join("target.cbz");
    write_zip(&source, &[("01.jpg", 4000), ("02.jpg", 4000), ("03.jpg", 4000)]);
    write_zip(&target, &[("01.jpg", 4000), ("02.jpg", 4000)]);

    let verdict = evaluate(&source, &target, &thresholds());

    assert_eq!(verdict.reason, SafetyReason::Passed);
    assert!(verdict.is_safe());
    let source_content = verdict.source.unwrap().content.unwrap();
    assert_eq!(source_content.entries, 3);
    assert_eq!(source_content.content_size, 12000);
    assert_eq!(verdict.target.unwrap().content.unwrap().entries, 2);
}

#[test]
fn test_source_with_fewer_entries_is_unsafe() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.zip");
    let target = dir.path().join("target.zip");
    write_zip(&source, &[("01.jpg", 3000), ("02.jpg", 3000), ("03.jpg", 3000)]);
    write_zip(
        &target,
        &[("01.jpg", 2500), ("02.jpg", 2500), ("03.jpg", 2500), ("04.jpg", 2500)],
    );

    let verdict = evaluate(&source, &target, &thresholds());

    assert_eq!(
        verdict.reason,
        SafetyReason::FewerEntries {
            source: 3,
            target: 4
        }
    );
    assert!(!verdict.is_safe());
}

#[test]
fn test_metadata_and_empty_entries_are_not_counted() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.zip");
    let target = dir.path().join("target.zip");
    write_zip(
        &source,
        &[
            ("ComicInfo.TXT", 500),
            ("info.json", 500),
            ("empty.jpg", 0),
            ("01.jpg", 3000),
            ("02.jpg", 3000),
        ],
    );
    write_zip(&target, &[("01.jpg", 3000), ("02.jpg", 3000)]);

    let verdict = evaluate(&source, &target, &thresholds());

    assert_eq!(verdict.reason, SafetyReason::Passed);
    assert_eq!(verdict.source.unwrap().content.unwrap().entries, 2);
}

#[test]
fn test_corrupt_source_archive_is_unsafe() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.zip");
    let target = dir.path().join("target.zip");
    fs::write(&source, vec![0xAB; 9000]).unwrap();
    write_zip(&target, &[("01.jpg", 3000), ("02.jpg", 3000)]);

    let verdict = evaluate(&source, &target, &thresholds());

    assert!(matches!(
        verdict.reason,
        SafetyReason::FewerEntries { source: 0, target: 2 }
    ));
}

#[test]
fn test_much_smaller_source_is_rejected_before_reading_contents() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.zip");
    let target = dir.path().join("target.zip");
    write_zip(&source, &[("01.jpg", 2000)]);
    write_zip(&target, &[("01.jpg", 10000)]);

    let verdict = evaluate(&source, &target, &thresholds());

    assert!(matches!(
        verdict.reason,
        SafetyReason::SourceSmallerThanTarget { .. }
    ));
    assert!(verdict.source.unwrap().content.is_none());
}

#[test]
fn test_missing_sides() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.zip");
    let target = dir.path().join("target.zip");

    let verdict = evaluate(&source, &target, &thresholds());
    assert_eq!(verdict.reason, SafetyReason::SourceMissing);
    assert!(!verdict.is_safe());

    write_zip(&source, &[("01.jpg", 3000)]);
    let verdict = evaluate(&source, &target, &thresholds());
    assert_eq!(verdict.reason, SafetyReason::TargetMissing);
    assert!(verdict.is_safe());
    assert!(verdict.target.is_none());
}

#[test]
fn test_tiny_source_is_unsafe_even_without_target() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.zip");
    fs::write(&source, b"tiny").unwrap();

    let verdict = evaluate(&source, &dir.path().join("target.zip"), &thresholds());

    assert!(matches!(
        verdict.reason,
        SafetyReason::SourceTooSmall { size: 4, min: 1024 }
    ));
}

#[test]
fn test_unreadable_formats_fall_back_to_size_rules() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.rar");
    let target = dir.path().join("target.rar");
    fs::write(&source, vec![1u8; 5000]).unwrap();
    fs::write(&target, vec![1u8; 6000]).unwrap();

    let verdict = evaluate(&source, &target, &thresholds());

    assert_eq!(verdict.reason, SafetyReason::Passed);
}

#[test]
fn test_evaluation_is_deterministic_and_read_only() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.zip");
    let target = dir.path().join("target.zip");
    write_zip(&source, &[("01.jpg", 3000), ("02.jpg", 3000)]);
    write_zip(&target, &[("01.jpg", 3000)]);
    let source_bytes = fs::read(&source).unwrap();
    let target_bytes = fs::read(&target).unwrap();

    let first = evaluate(&source, &target, &thresholds());
    let second = evaluate(&source, &target, &thresholds());

    assert_eq!(first, second);
    assert_eq!(fs::read(&source).unwrap(), source_bytes);
    assert_eq!(fs::read(&target).unwrap(), target_bytes);
}
