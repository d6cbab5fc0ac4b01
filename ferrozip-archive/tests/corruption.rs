//! Hostile-input coverage: hand-built and binary-patched archives that the
//! parser must reject with precise errors, plus the per-entry containment
//! of unsupported methods.

mod common;

use common::SharedSink;
use ferrozip_archive::records::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, CENTRAL_SIG,
    VERSION_MADE_BY,
};
use ferrozip_archive::{Archive, Compression, Entry};
use ferrozip_core::{Crc32, DataDescriptor, DosDateTime, FerroZipError, GeneralPurposeFlags};
use std::io::Cursor;

/// Build a two-entry archive by hand: one entry with an out-of-registry
/// method id, one ordinary stored entry.
fn archive_with_unsupported_method() -> Vec<u8> {
    let mut buf = Vec::new();
    let mtime = DosDateTime::MIN;

    let exotic_payload = b"\x01\x02\x03\x04";
    let exotic_local = LocalFileHeader {
        version_needed: 20,
        flags: GeneralPurposeFlags::default(),
        method: 99,
        mtime,
        descriptor: DataDescriptor::new(0xDEAD_BEEF, 4, 10),
        path: "exotic.bin".to_string(),
        extra: Vec::new(),
    };
    let exotic_offset = buf.len() as u32;
    exotic_local.write(&mut buf, false).unwrap();
    buf.extend_from_slice(exotic_payload);

    let plain_payload = b"ok";
    let plain_local = LocalFileHeader {
        version_needed: 10,
        flags: GeneralPurposeFlags::default(),
        method: 0,
        mtime,
        descriptor: DataDescriptor::new(Crc32::compute(plain_payload), 2, 2),
        path: "plain.txt".to_string(),
        extra: Vec::new(),
    };
    let plain_offset = buf.len() as u32;
    plain_local.write(&mut buf, false).unwrap();
    buf.extend_from_slice(plain_payload);

    let cd_offset = buf.len() as u32;
    for (local, offset) in [(&exotic_local, exotic_offset), (&plain_local, plain_offset)] {
        CentralDirectoryHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed: local.version_needed,
            flags: local.flags,
            method: local.method,
            mtime: local.mtime,
            descriptor: local.descriptor,
            path: local.path.clone(),
            extra: Vec::new(),
            comment: String::new(),
            internal_attrs: 0,
            external_attrs: 0,
            local_offset: offset,
        }
        .write(&mut buf)
        .unwrap();
    }
    EndOfCentralDirectory {
        entry_count: 2,
        cd_size: buf.len() as u32 - cd_offset,
        cd_offset,
        comment: String::new(),
    }
    .write(&mut buf)
    .unwrap();
    buf
}

#[test]
fn test_unsupported_method_is_contained_to_its_entry() {
    let mut archive = Archive::read(Cursor::new(archive_with_unsupported_method())).unwrap();
    assert_eq!(archive.len(), 2);

    let err = archive.read_entry("exotic.bin", None).unwrap_err();
    assert!(matches!(
        err,
        FerroZipError::UnsupportedMethod { method: 99 }
    ));
    // The sibling entry is unaffected.
    assert_eq!(archive.read_entry("plain.txt", None).unwrap(), b"ok");
}

fn simple_archive() -> Vec<u8> {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink.clone());
    let mut entry = Entry::file_bytes("a.txt", b"payload".to_vec()).unwrap();
    entry.set_compression(Compression::Stored);
    archive.add(entry).unwrap();
    archive.close().unwrap();
    sink.bytes()
}

fn find_sig(buf: &[u8], sig: u32) -> usize {
    let bytes = sig.to_le_bytes();
    buf.windows(4).position(|w| w == bytes).unwrap()
}

#[test]
fn test_cross_check_mismatch_names_field_and_path() {
    let mut bytes = simple_archive();
    // Method field sits 10 bytes into the central record.
    let central_at = find_sig(&bytes, CENTRAL_SIG);
    bytes[central_at + 10] = 8;
    let err = Archive::read(Cursor::new(bytes)).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("compression method"), "{}", msg);
    assert!(msg.contains("a.txt"), "{}", msg);
}

#[test]
fn test_payload_corruption_is_a_crc_mismatch() {
    let mut bytes = simple_archive();
    // Payload of a stored entry follows its 30+5 byte local header.
    let payload_at = 30 + "a.txt".len();
    bytes[payload_at] ^= 0xFF;
    let mut archive = Archive::read(Cursor::new(bytes)).unwrap();
    let err = archive.read_entry("a.txt", None).unwrap_err();
    assert!(matches!(err, FerroZipError::CrcMismatch { .. }), "{}", err);
}

#[test]
fn test_truncated_central_directory_is_structural() {
    let bytes = simple_archive();
    // Keep the end record but point it past the truncation.
    let mut cut = bytes.clone();
    let central_at = find_sig(&bytes, CENTRAL_SIG);
    cut.drain(central_at..central_at + 4);
    let err = Archive::read(Cursor::new(cut)).unwrap_err();
    assert!(matches!(err, FerroZipError::Structural { .. }), "{}", err);
}

#[test]
fn test_archive_comment_with_embedded_magic_parses() {
    let sink = SharedSink::new();
    let mut archive = Archive::create(sink.clone());
    // A comment that contains a byte-exact fake end record.
    let mut fake = Vec::new();
    EndOfCentralDirectory::default().write(&mut fake).unwrap();
    fake.extend_from_slice(b" and more comment after it");
    archive.set_comment(String::from_utf8(fake).unwrap());
    archive
        .add(Entry::file_bytes("real.txt", b"real".to_vec()).unwrap())
        .unwrap();
    archive.close().unwrap();

    let mut reread = Archive::read(Cursor::new(sink.bytes())).unwrap();
    assert_eq!(reread.len(), 1);
    assert_eq!(reread.read_entry("real.txt", None).unwrap(), b"real");
}

#[test]
fn test_not_an_archive() {
    let err = Archive::read(Cursor::new(b"plain text file".to_vec())).unwrap_err();
    assert!(matches!(err, FerroZipError::Structural { .. }));
}
