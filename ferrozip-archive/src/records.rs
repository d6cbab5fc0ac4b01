//! Wire records of the container: local file header, central directory
//! header, and the end-of-central-directory record.
//!
//! Parsing is two-phase: fixed-width fields are read raw first, then
//! validated into typed values (DOS times, flags), so a half-read record
//! never leaks into the entry model. Serialization always writes the
//! record's leading signature; `read_body` methods expect the caller to have
//! consumed and checked it, which lets the central-directory walk use the
//! signature itself as its loop terminator.

use ferrozip_core::binary::{read_u16, read_u32, read_vec, write_u16, write_u32};
use ferrozip_core::{
    DataDescriptor, DosDateTime, FerroZipError, GeneralPurposeFlags, Result,
};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Local file header signature (PK\x03\x04).
pub const LOCAL_SIG: u32 = 0x04034B50;
/// Central directory header signature (PK\x01\x02).
pub const CENTRAL_SIG: u32 = 0x02014B50;
/// End-of-central-directory signature (PK\x05\x06).
pub const EOCD_SIG: u32 = 0x06054B50;

/// Fixed bytes of a local header including its signature.
pub const LOCAL_FIXED_LEN: u64 = 30;
/// Fixed bytes of the end record including its signature.
const EOCD_FIXED_LEN: u64 = 22;

/// "Version made by": Unix attribute convention, spec 3.0.
pub const VERSION_MADE_BY: u16 = 0x031E;

/// The record preceding each entry payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Minimum extraction version.
    pub version_needed: u16,
    /// General-purpose flags.
    pub flags: GeneralPurposeFlags,
    /// Compression method id.
    pub method: u16,
    /// Modification time.
    pub mtime: DosDateTime,
    /// CRC and sizes. All zero on the wire when the descriptor bit is set;
    /// the parser reconciles from the trailing descriptor afterwards.
    pub descriptor: DataDescriptor,
    /// Entry path, forward-slash separated.
    pub path: String,
    /// Raw extra-field blob.
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Parse the record body. The 4-byte signature must already be consumed.
    pub fn read_body<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let version_needed = read_u16(reader)?;
        let raw_flags = read_u16(reader)?;
        let method = read_u16(reader)?;
        let time = read_u16(reader)?;
        let date = read_u16(reader)?;
        let crc32 = read_u32(reader)?;
        let compressed_size = read_u32(reader)?;
        let uncompressed_size = read_u32(reader)?;
        let path_len = read_u16(reader)? as usize;
        let extra_len = read_u16(reader)? as usize;
        let path = String::from_utf8_lossy(&read_vec(reader, path_len)?).into_owned();
        let extra = read_vec(reader, extra_len)?;

        let mtime = DosDateTime::from_packed(((date as u32) << 16) | time as u32)
            .map_err(|e| at_path(e, &path))?;
        Ok(Self {
            version_needed,
            flags: GeneralPurposeFlags::from_u16(raw_flags),
            method,
            mtime,
            descriptor: DataDescriptor::new(crc32, compressed_size, uncompressed_size),
            path,
            extra,
        })
    }

    /// Serialize the record, signature included. When `defer_sizes` is set
    /// the CRC/size triple is written as zeros for a later patch or a
    /// trailing descriptor.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W, defer_sizes: bool) -> Result<()> {
        let path_len = len_u16(self.path.len(), "entry path")?;
        let extra_len = len_u16(self.extra.len(), "extra-field blob")?;
        write_u32(writer, LOCAL_SIG)?;
        write_u16(writer, self.version_needed)?;
        write_u16(writer, self.flags.to_u16())?;
        write_u16(writer, self.method)?;
        write_u16(writer, self.mtime.time_word())?;
        write_u16(writer, self.mtime.date_word())?;
        let triple = if defer_sizes {
            DataDescriptor::default()
        } else {
            self.descriptor
        };
        write_u32(writer, triple.crc32)?;
        write_u32(writer, triple.compressed_size)?;
        write_u32(writer, triple.uncompressed_size)?;
        write_u16(writer, path_len)?;
        write_u16(writer, extra_len)?;
        writer.write_all(self.path.as_bytes())?;
        writer.write_all(&self.extra)?;
        Ok(())
    }

    /// Total serialized length, signature included.
    pub fn len(&self) -> u64 {
        LOCAL_FIXED_LEN + self.path.len() as u64 + self.extra.len() as u64
    }

    /// Byte offset of the CRC/size triple relative to the record start,
    /// used when patching a seekable sink.
    pub const DESCRIPTOR_OFFSET: u64 = 14;
}

/// One record of the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    /// Producing system and spec version.
    pub version_made_by: u16,
    /// Minimum extraction version.
    pub version_needed: u16,
    /// General-purpose flags.
    pub flags: GeneralPurposeFlags,
    /// Compression method id.
    pub method: u16,
    /// Modification time.
    pub mtime: DosDateTime,
    /// CRC and sizes. Authoritative even for descriptor-mode entries.
    pub descriptor: DataDescriptor,
    /// Entry path.
    pub path: String,
    /// Raw extra-field blob.
    pub extra: Vec<u8>,
    /// Per-entry comment.
    pub comment: String,
    /// Internal file attributes.
    pub internal_attrs: u16,
    /// External file attributes; Unix mode lives in the high 16 bits.
    pub external_attrs: u32,
    /// Absolute offset of the entry's local header.
    pub local_offset: u32,
}

impl CentralDirectoryHeader {
    /// Parse the record body. The 4-byte signature must already be consumed.
    pub fn read_body<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let version_made_by = read_u16(reader)?;
        let version_needed = read_u16(reader)?;
        let raw_flags = read_u16(reader)?;
        let method = read_u16(reader)?;
        let time = read_u16(reader)?;
        let date = read_u16(reader)?;
        let crc32 = read_u32(reader)?;
        let compressed_size = read_u32(reader)?;
        let uncompressed_size = read_u32(reader)?;
        let path_len = read_u16(reader)? as usize;
        let extra_len = read_u16(reader)? as usize;
        let comment_len = read_u16(reader)? as usize;
        let _disk_number = read_u16(reader)?;
        let internal_attrs = read_u16(reader)?;
        let external_attrs = read_u32(reader)?;
        let local_offset = read_u32(reader)?;
        let path = String::from_utf8_lossy(&read_vec(reader, path_len)?).into_owned();
        let extra = read_vec(reader, extra_len)?;
        let comment = String::from_utf8_lossy(&read_vec(reader, comment_len)?).into_owned();

        let mtime = DosDateTime::from_packed(((date as u32) << 16) | time as u32)
            .map_err(|e| at_path(e, &path))?;
        Ok(Self {
            version_made_by,
            version_needed,
            flags: GeneralPurposeFlags::from_u16(raw_flags),
            method,
            mtime,
            descriptor: DataDescriptor::new(crc32, compressed_size, uncompressed_size),
            path,
            extra,
            comment,
            internal_attrs,
            external_attrs,
            local_offset,
        })
    }

    /// Serialize the record, signature included.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let path_len = len_u16(self.path.len(), "entry path")?;
        let extra_len = len_u16(self.extra.len(), "extra-field blob")?;
        let comment_len = len_u16(self.comment.len(), "entry comment")?;
        write_u32(writer, CENTRAL_SIG)?;
        write_u16(writer, self.version_made_by)?;
        write_u16(writer, self.version_needed)?;
        write_u16(writer, self.flags.to_u16())?;
        write_u16(writer, self.method)?;
        write_u16(writer, self.mtime.time_word())?;
        write_u16(writer, self.mtime.date_word())?;
        write_u32(writer, self.descriptor.crc32)?;
        write_u32(writer, self.descriptor.compressed_size)?;
        write_u32(writer, self.descriptor.uncompressed_size)?;
        write_u16(writer, path_len)?;
        write_u16(writer, extra_len)?;
        write_u16(writer, comment_len)?;
        write_u16(writer, 0)?; // disk number
        write_u16(writer, self.internal_attrs)?;
        write_u32(writer, self.external_attrs)?;
        write_u32(writer, self.local_offset)?;
        writer.write_all(self.path.as_bytes())?;
        writer.write_all(&self.extra)?;
        writer.write_all(self.comment.as_bytes())?;
        Ok(())
    }

    /// Unix mode bits from the external attributes.
    pub fn unix_mode(&self) -> u32 {
        self.external_attrs >> 16
    }

    /// Verify that the local header of this entry agrees with the central
    /// record. Extra fields are exempt; the two copies legitimately differ.
    pub fn cross_check(&self, local: &LocalFileHeader) -> Result<()> {
        let mismatch = |field: &str| {
            Err(FerroZipError::structural_at(
                format!("local and central headers disagree on {}", field),
                self.path.clone(),
            ))
        };
        if self.path != local.path {
            return mismatch("path");
        }
        if self.version_needed != local.version_needed {
            return mismatch("extraction version");
        }
        if self.flags != local.flags {
            return mismatch("flags");
        }
        if self.method != local.method {
            return mismatch("compression method");
        }
        if self.mtime != local.mtime {
            return mismatch("modification time");
        }
        if self.descriptor != local.descriptor {
            return mismatch("CRC or sizes");
        }
        Ok(())
    }
}

/// The record closing the archive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndOfCentralDirectory {
    /// Number of entries in the central directory.
    pub entry_count: u16,
    /// Byte length of the central directory.
    pub cd_size: u32,
    /// Absolute offset of the first central directory record.
    pub cd_offset: u32,
    /// Archive comment.
    pub comment: String,
}

impl EndOfCentralDirectory {
    /// Locate and parse the record by scanning backwards from the end.
    ///
    /// A candidate position only counts when the signature matches *and*
    /// its comment-length field equals the bytes that actually remain after
    /// the fixed record, which rejects signature look-alikes inside archive
    /// comments. Returns the record and its absolute offset.
    pub fn locate<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<(Self, u64)> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        if file_size < EOCD_FIXED_LEN {
            return Err(FerroZipError::structural(
                "file too small for an end-of-central-directory record",
            ));
        }
        let tail_len = file_size.min(EOCD_FIXED_LEN + u16::MAX as u64);
        reader.seek(SeekFrom::Start(file_size - tail_len))?;
        let tail = read_vec(reader, tail_len as usize)?;

        let sig_bytes = EOCD_SIG.to_le_bytes();
        let mut i = (tail_len - EOCD_FIXED_LEN) as usize;
        loop {
            if tail[i..i + 4] == sig_bytes {
                let comment_len =
                    u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as u64;
                if comment_len == tail_len - (i as u64 + EOCD_FIXED_LEN) {
                    let offset = file_size - tail_len + i as u64;
                    let record = Self::parse_body(&tail[i + 4..])?;
                    debug!(
                        offset,
                        entries = record.entry_count,
                        "located end of central directory"
                    );
                    return Ok((record, offset));
                }
            }
            if i == 0 {
                return Err(FerroZipError::structural(
                    "no end-of-central-directory record found",
                ));
            }
            i -= 1;
        }
    }

    fn parse_body(body: &[u8]) -> Result<Self> {
        let mut reader = std::io::Cursor::new(body);
        let _disk_number = read_u16(&mut reader)?;
        let _cd_start_disk = read_u16(&mut reader)?;
        let entries_this_disk = read_u16(&mut reader)?;
        let entry_count = read_u16(&mut reader)?;
        let cd_size = read_u32(&mut reader)?;
        let cd_offset = read_u32(&mut reader)?;
        let comment_len = read_u16(&mut reader)? as usize;
        if entries_this_disk != entry_count {
            return Err(FerroZipError::structural(
                "multi-disk archives are not supported",
            ));
        }
        let comment =
            String::from_utf8_lossy(&read_vec(&mut reader, comment_len)?).into_owned();
        Ok(Self {
            entry_count,
            cd_size,
            cd_offset,
            comment,
        })
    }

    /// Serialize the record, signature included.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let comment_len = len_u16(self.comment.len(), "archive comment")?;
        write_u32(writer, EOCD_SIG)?;
        write_u16(writer, 0)?; // this disk
        write_u16(writer, 0)?; // central directory start disk
        write_u16(writer, self.entry_count)?;
        write_u16(writer, self.entry_count)?;
        write_u32(writer, self.cd_size)?;
        write_u32(writer, self.cd_offset)?;
        write_u16(writer, comment_len)?;
        writer.write_all(self.comment.as_bytes())?;
        Ok(())
    }
}

/// Every variable-length part of a record carries a 16-bit length. A longer
/// value must fail up front; a wrapped length field would corrupt the
/// offsets of everything written after it.
fn len_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        FerroZipError::usage(format!(
            "{} of {} bytes does not fit a 16-bit length field",
            what, len
        ))
    })
}

fn at_path(err: FerroZipError, path: &str) -> FerroZipError {
    match err {
        FerroZipError::Structural { message, .. } => {
            FerroZipError::structural_at(message, path)
        }
        other => other,
    }
}
