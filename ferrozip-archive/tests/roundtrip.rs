//! Write-then-reparse coverage for the whole container: entry kinds,
//! codecs, metadata, replacement semantics, and verbatim copies between
//! archives.

mod common;

use common::SharedSink;
use ferrozip_archive::extra::{ExtraField, UnixOwnership};
use ferrozip_archive::{Archive, Compression, Entry, EntryKind};
use ferrozip_core::{Crc32, DosDateTime};
use std::io::Cursor;

fn repetitive(len: usize) -> Vec<u8> {
    b"the answer "
        .iter()
        .cycle()
        .take(len)
        .copied()
        .collect()
}

#[test]
fn test_multi_entry_roundtrip() {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink.clone());

    let mut stored = Entry::file_bytes("data.bin", b"data".to_vec()).unwrap();
    stored.set_compression(Compression::Stored);
    archive.add(stored).unwrap();

    let big = repetitive(50_000);
    archive
        .add(Entry::file_bytes("big.txt", big.clone()).unwrap())
        .unwrap();
    archive.close().unwrap();

    let mut reread = Archive::read(Cursor::new(sink.bytes())).unwrap();
    assert_eq!(reread.len(), 2);
    assert_eq!(
        reread.paths().collect::<Vec<_>>(),
        vec!["data.bin", "big.txt"]
    );

    let entry = reread.get("data.bin").unwrap();
    assert_eq!(entry.crc32(), Some(0xADF3_F363));
    assert_eq!(entry.size(), Some(4));
    assert_eq!(entry.compressed_size(), Some(4));

    let deflated = reread.get("big.txt").unwrap();
    assert_eq!(deflated.size(), Some(big.len() as u64));
    assert!(deflated.compressed_size().unwrap() < big.len() as u64);
    assert_eq!(deflated.crc32(), Some(Crc32::compute(&big)));

    assert_eq!(reread.read_entry("data.bin", None).unwrap(), b"data");
    assert_eq!(reread.read_entry("big.txt", None).unwrap(), big);
}

#[test]
fn test_directory_and_symlink_kinds_survive() {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink.clone());
    archive.add(Entry::directory("docs").unwrap()).unwrap();
    archive
        .add(Entry::symlink("docs/latest", "v2/readme.md").unwrap())
        .unwrap();
    archive.close().unwrap();

    let mut reread = Archive::read(Cursor::new(sink.bytes())).unwrap();
    let dir = reread.get("docs/").unwrap();
    assert_eq!(dir.kind(), EntryKind::Directory);
    assert_eq!(dir.size(), Some(0));

    let link = reread.get("docs/latest").unwrap();
    assert_eq!(link.kind(), EntryKind::Symlink);
    assert_eq!(
        reread.read_entry("docs/latest", None).unwrap(),
        b"v2/readme.md"
    );
}

#[test]
fn test_comments_roundtrip() {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink.clone());
    archive.set_comment("season archive");
    let mut entry = Entry::file_bytes("notes.txt", b"n".to_vec()).unwrap();
    entry.set_comment("scratch notes");
    archive.add(entry).unwrap();
    archive.close().unwrap();

    let reread = Archive::read(Cursor::new(sink.bytes())).unwrap();
    assert_eq!(reread.comment(), "season archive");
    assert_eq!(reread.get("notes.txt").unwrap().comment(), "scratch notes");
}

#[test]
fn test_same_path_last_write_wins() {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink.clone());
    archive
        .add(Entry::file_bytes("config.toml", b"old".to_vec()).unwrap())
        .unwrap();
    archive
        .add(Entry::file_bytes("tail.txt", b"t".to_vec()).unwrap())
        .unwrap();
    let replaced = archive
        .add(Entry::file_bytes("config.toml", b"new".to_vec()).unwrap())
        .unwrap();
    assert!(replaced.is_some());
    archive.close().unwrap();

    let mut reread = Archive::read(Cursor::new(sink.bytes())).unwrap();
    assert_eq!(reread.len(), 2);
    // Replacement keeps the original position.
    assert_eq!(
        reread.paths().collect::<Vec<_>>(),
        vec!["config.toml", "tail.txt"]
    );
    assert_eq!(reread.read_entry("config.toml", None).unwrap(), b"new");
}

#[test]
fn test_open_copies_payloads_verbatim() {
    let first = SharedSink::new();
    let mut archive = Archive::create(first.clone());
    let big = repetitive(40_000);
    archive
        .add(Entry::file_bytes("kept.txt", big.clone()).unwrap())
        .unwrap();
    archive
        .add(Entry::file_bytes("dropped.txt", b"bye".to_vec()).unwrap())
        .unwrap();
    archive.close().unwrap();

    let second = SharedSink::new();
    let mut rewrite =
        Archive::open(Cursor::new(first.bytes()), second.clone()).unwrap();
    assert!(rewrite.remove("dropped.txt").unwrap().is_some());
    rewrite
        .add(Entry::file_bytes("added.txt", b"hi".to_vec()).unwrap())
        .unwrap();
    rewrite.close().unwrap();

    let mut reread = Archive::read(Cursor::new(second.bytes())).unwrap();
    assert_eq!(
        reread.paths().collect::<Vec<_>>(),
        vec!["kept.txt", "added.txt"]
    );
    assert_eq!(reread.read_entry("kept.txt", None).unwrap(), big);
    assert_eq!(reread.read_entry("added.txt", None).unwrap(), b"hi");
}

#[test]
fn test_metadata_roundtrip() {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink.clone());

    let mut entry = Entry::file_bytes("tool.sh", b"#!/bin/sh\n".to_vec()).unwrap();
    entry.set_mode(0o100_755);
    let stamp = DosDateTime::from_datetime(
        chrono::NaiveDate::from_ymd_opt(2024, 3, 2)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap(),
    );
    entry.set_mtime(stamp);
    entry.add_extra_field(ExtraField::UnixOwnership(UnixOwnership {
        atime: 1_709_000_000,
        mtime: 0,
        uid: 1000,
        gid: 100,
        tail: Vec::new(),
    }));
    archive.add(entry).unwrap();
    archive.close().unwrap();

    let reread = Archive::read(Cursor::new(sink.bytes())).unwrap();
    let entry = reread.get("tool.sh").unwrap();
    assert_eq!(entry.mode(), 0o100_755);
    assert_eq!(entry.mtime(), stamp);
    assert_eq!(entry.ownership(), (1000, 100));
    assert_eq!(entry.atime(), Some(1_709_000_000));
}

#[test]
fn test_closed_archive_rejects_reuse() {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink);
    archive.close().unwrap();
    assert!(archive.close().is_err());
    assert!(archive
        .add(Entry::file_bytes("late.txt", b"x".to_vec()).unwrap())
        .is_err());
    assert!(archive.read_entry("late.txt", None).is_err());
}

#[test]
fn test_empty_archive_roundtrip() {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink.clone());
    archive.close().unwrap();
    assert_eq!(sink.bytes().len(), 22);
    let reread = Archive::read(Cursor::new(sink.bytes())).unwrap();
    assert!(reread.is_empty());
}
