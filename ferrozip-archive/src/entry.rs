//! The entry model: one archived file, directory, or symlink, plus the
//! password type used when an entry is encrypted.

use crate::codec::{Compression, Encryption};
use crate::extra::{ExtraField, ExtraFields};
use crate::records::CentralDirectoryHeader;
use crate::stream::ReadSeek;
use ferrozip_core::{
    normalize_path, DataDescriptor, DosDateTime, FerroZipError, GeneralPurposeFlags, Result,
};
use std::fmt;
use std::io::Cursor;

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

const DEFAULT_FILE_MODE: u32 = 0o100_644;
const DEFAULT_DIR_MODE: u32 = 0o040_755;
const DEFAULT_SYMLINK_MODE: u32 = 0o120_777;

/// MS-DOS directory attribute bit, kept in the low byte of the external
/// attributes for tools that only look there.
const DOS_DIRECTORY_ATTR: u32 = 0x10;

/// What an entry is. Closed set; classification happens once at parse time
/// from the path shape and the Unix mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory; its archive path carries a trailing slash.
    Directory,
    /// Symbolic link; the payload is the link target.
    Symlink,
}

/// Password source for encrypted entries.
pub enum Password {
    /// One password for every entry it applies to.
    Fixed(String),
    /// Resolved per entry path at the moment the payload is ciphered.
    Callback(Box<dyn Fn(&str) -> String + Send + Sync>),
}

impl Password {
    /// Resolve the password for an entry path.
    pub fn resolve(&self, path: &str) -> String {
        match self {
            Self::Fixed(pw) => pw.clone(),
            Self::Callback(f) => f(path),
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(_) => f.write_str("Password::Fixed(..)"),
            Self::Callback(_) => f.write_str("Password::Callback(..)"),
        }
    }
}

impl From<&str> for Password {
    fn from(pw: &str) -> Self {
        Self::Fixed(pw.to_string())
    }
}

impl From<String> for Password {
    fn from(pw: String) -> Self {
        Self::Fixed(pw)
    }
}

/// Where an entry's payload currently lives.
pub(crate) enum EntryData {
    /// No payload (directories).
    None,
    /// Plaintext bytes held in memory (small files, symlink targets).
    Bytes(Vec<u8>),
    /// Plaintext streamed from a caller-supplied source at close time.
    /// The entry owns the source; rewinding it is the codec's business.
    Reader(Box<dyn ReadSeek>),
    /// Already-encoded payload inside the archive this entry was parsed
    /// from, copied verbatim unless the caller replaces it.
    Archived(ArchivedData),
}

/// Location and wire form of a parsed entry's payload.
#[derive(Debug, Clone)]
pub(crate) struct ArchivedData {
    /// Absolute offset of the first payload byte (after the local header).
    pub data_offset: u64,
    /// Authoritative CRC and sizes from the central directory.
    pub descriptor: DataDescriptor,
    /// Raw method id; resolved against the registry only when decoded.
    pub method: u16,
    /// Flags the entry was stored with.
    pub flags: GeneralPurposeFlags,
}

impl fmt::Debug for EntryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::Reader(_) => f.write_str("Reader(..)"),
            Self::Archived(a) => a.fmt(f),
        }
    }
}

/// One archive entry.
#[derive(Debug)]
pub struct Entry {
    path: String,
    kind: EntryKind,
    mtime: DosDateTime,
    atime: Option<i32>,
    comment: String,
    mode: u32,
    uid: u16,
    gid: u16,
    compression: Compression,
    encryption: Encryption,
    password: Option<Password>,
    extra: ExtraFields,
    pub(crate) data: EntryData,
}

impl Entry {
    fn base(path: &str, kind: EntryKind, mode: u32, data: EntryData) -> Result<Self> {
        let mut normalized = normalize_path(path);
        if normalized.is_empty() {
            return Err(FerroZipError::usage(format!(
                "'{}' normalizes to an empty entry path",
                path
            )));
        }
        if kind == EntryKind::Directory {
            normalized.push('/');
        }
        Ok(Self {
            path: normalized,
            kind,
            mtime: DosDateTime::MIN,
            atime: None,
            comment: String::new(),
            mode,
            uid: 0,
            gid: 0,
            compression: match kind {
                EntryKind::File => Compression::DEFAULT_DEFLATE,
                _ => Compression::Stored,
            },
            encryption: Encryption::None,
            password: None,
            extra: ExtraFields::new(),
            data,
        })
    }

    /// A file entry whose payload streams from `reader` when the archive is
    /// written. The reader must support rewinding to its start.
    pub fn file<R: ReadSeek + 'static>(path: &str, reader: R) -> Result<Self> {
        Self::base(
            path,
            EntryKind::File,
            DEFAULT_FILE_MODE,
            EntryData::Reader(Box::new(reader)),
        )
    }

    /// A file entry with an in-memory payload.
    pub fn file_bytes(path: &str, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::base(
            path,
            EntryKind::File,
            DEFAULT_FILE_MODE,
            EntryData::Bytes(bytes.into()),
        )
    }

    /// A directory entry.
    pub fn directory(path: &str) -> Result<Self> {
        Self::base(path, EntryKind::Directory, DEFAULT_DIR_MODE, EntryData::None)
    }

    /// A symlink entry pointing at `target`. The target string is the
    /// payload; it is not resolved or validated.
    pub fn symlink(path: &str, target: &str) -> Result<Self> {
        Self::base(
            path,
            EntryKind::Symlink,
            DEFAULT_SYMLINK_MODE,
            EntryData::Bytes(target.as_bytes().to_vec()),
        )
    }

    /// Rebuild an entry from its central record, the local extra blob, and
    /// the payload location.
    pub(crate) fn from_central(
        central: &CentralDirectoryHeader,
        local_extra: &[u8],
        data_offset: u64,
    ) -> Result<Self> {
        let unix_mode = central.unix_mode();
        let kind = if central.path.ends_with('/') {
            EntryKind::Directory
        } else if unix_mode & S_IFMT == S_IFLNK {
            EntryKind::Symlink
        } else {
            EntryKind::File
        };
        let mut extra = ExtraFields::parse(local_extra).map_err(|e| at(e, &central.path))?;
        extra.merge(&ExtraFields::parse(&central.extra).map_err(|e| at(e, &central.path))?);

        let mut entry = Self {
            path: central.path.clone(),
            kind,
            mtime: central.mtime,
            atime: None,
            comment: central.comment.clone(),
            mode: match (unix_mode, kind) {
                (0, EntryKind::File) => DEFAULT_FILE_MODE,
                (0, EntryKind::Directory) => DEFAULT_DIR_MODE,
                (0, EntryKind::Symlink) => DEFAULT_SYMLINK_MODE,
                (m, _) => m,
            },
            uid: 0,
            gid: 0,
            compression: Compression::from_method(central.method)
                .unwrap_or(Compression::Stored),
            encryption: if central.flags.encrypted() {
                Encryption::Traditional
            } else {
                Encryption::None
            },
            password: None,
            extra,
            data: EntryData::Archived(ArchivedData {
                data_offset,
                descriptor: central.descriptor,
                method: central.method,
                flags: central.flags,
            }),
        };
        entry.apply_extra_metadata();
        Ok(entry)
    }

    /// Fold understood extra fields into the entry metadata: Unix ownership
    /// ids, and a Unix mtime overriding the 2-second DOS stamp.
    fn apply_extra_metadata(&mut self) {
        if let Some(own) = self.extra.unix_ownership() {
            self.uid = own.uid;
            self.gid = own.gid;
        }
        let unix_atime = self
            .extra
            .extended_timestamp()
            .and_then(|ts| ts.atime)
            .or_else(|| self.extra.unix_ownership().map(|own| own.atime))
            .filter(|&secs| secs != 0);
        if unix_atime.is_some() {
            self.atime = unix_atime;
        }
        let unix_mtime = self
            .extra
            .extended_timestamp()
            .and_then(|ts| ts.mtime)
            .or_else(|| self.extra.unix_ownership().map(|own| own.mtime))
            .filter(|&secs| secs != 0);
        if let Some(secs) = unix_mtime {
            if let Some(utc) = chrono::DateTime::from_timestamp(secs as i64, 0) {
                self.mtime = DosDateTime::from_datetime(utc.naive_utc());
            }
        }
    }

    /// The archive path: normalized, forward-slash separated, trailing
    /// slash on directories.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// What the entry is.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Whether this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Whether this is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Whether this is a symlink.
    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    /// Modification time.
    pub fn mtime(&self) -> DosDateTime {
        self.mtime
    }

    /// Set the modification time.
    pub fn set_mtime(&mut self, mtime: DosDateTime) {
        self.mtime = mtime;
    }

    /// Access time in Unix seconds, known only when an extra field carried
    /// one. The base format has no slot for it.
    pub fn atime(&self) -> Option<i32> {
        self.atime
    }

    /// Per-entry comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Set the per-entry comment.
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Unix mode bits, file type included.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Set the Unix mode bits.
    pub fn set_mode(&mut self, mode: u32) {
        self.mode = mode;
    }

    /// Owner user and group ids.
    pub fn ownership(&self) -> (u16, u16) {
        (self.uid, self.gid)
    }

    /// Set the owner user and group ids.
    pub fn set_ownership(&mut self, uid: u16, gid: u16) {
        self.uid = uid;
        self.gid = gid;
    }

    /// Compression method used when the archive is written.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Choose the compression method. Takes effect the next time the
    /// payload is encoded; a verbatim copy of an archived payload keeps its
    /// original method.
    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    /// Encryption scheme.
    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    /// Encrypt this entry's payload with the traditional cipher.
    pub fn encrypt(&mut self, password: impl Into<Password>) {
        self.encryption = Encryption::Traditional;
        self.password = Some(password.into());
    }

    /// The password source, when one is attached.
    pub(crate) fn password(&self) -> Option<&Password> {
        self.password.as_ref()
    }

    /// Extra fields attached to this entry.
    pub fn extra_fields(&self) -> &ExtraFields {
        &self.extra
    }

    /// Attach or merge one extra field, folding understood metadata into
    /// the entry.
    pub fn add_extra_field(&mut self, field: ExtraField) {
        self.extra.insert(field);
        self.apply_extra_metadata();
    }

    /// Uncompressed payload size, known only for entries parsed from an
    /// archive or held in memory.
    pub fn size(&self) -> Option<u64> {
        match &self.data {
            EntryData::None => Some(0),
            EntryData::Bytes(bytes) => Some(bytes.len() as u64),
            EntryData::Reader(_) => None,
            EntryData::Archived(a) => Some(a.descriptor.uncompressed_size as u64),
        }
    }

    /// Stored (compressed, possibly encrypted) payload size of a parsed
    /// entry.
    pub fn compressed_size(&self) -> Option<u64> {
        match &self.data {
            EntryData::Archived(a) => Some(a.descriptor.compressed_size as u64),
            _ => None,
        }
    }

    /// Archived CRC-32 of a parsed entry's payload.
    pub fn crc32(&self) -> Option<u32> {
        match &self.data {
            EntryData::Archived(a) => Some(a.descriptor.crc32),
            _ => None,
        }
    }

    /// The symlink target. Caller-built links hold it in memory; for a
    /// parsed link a target carried in the Unix ownership field's tail is
    /// used, and entries without one need extraction.
    pub fn symlink_target(&self) -> Option<&str> {
        if self.kind != EntryKind::Symlink {
            return None;
        }
        match &self.data {
            EntryData::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => self
                .extra
                .unix_ownership()
                .filter(|own| !own.tail.is_empty())
                .and_then(|own| std::str::from_utf8(&own.tail).ok()),
        }
    }

    /// Replace the payload with an in-memory buffer, detaching any archived
    /// payload.
    pub fn set_content(&mut self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        if self.kind == EntryKind::Directory {
            return Err(FerroZipError::usage("directories carry no payload"));
        }
        self.data = EntryData::Bytes(bytes.into());
        Ok(())
    }

    /// Minimum "version needed to extract" for the write-side codec choice.
    pub(crate) fn version_needed(&self) -> u16 {
        self.compression
            .version_needed()
            .max(self.encryption.version_needed())
    }

    /// External attributes for the central record.
    pub(crate) fn external_attrs(&self) -> u32 {
        let mut attrs = self.mode << 16;
        if self.kind == EntryKind::Directory {
            attrs |= DOS_DIRECTORY_ATTR;
        }
        attrs
    }

    /// Whether this entry's payload must be re-encoded at write time, as
    /// opposed to copied verbatim from the source archive.
    pub(crate) fn needs_encoding(&self) -> bool {
        !matches!(self.data, EntryData::Archived(_))
    }

    /// Take the plaintext source out of the entry for encoding.
    pub(crate) fn take_plaintext(&mut self) -> Option<Box<dyn ReadSeek>> {
        match std::mem::replace(&mut self.data, EntryData::None) {
            EntryData::Bytes(bytes) => Some(Box::new(Cursor::new(bytes))),
            EntryData::Reader(reader) => Some(reader),
            other => {
                self.data = other;
                None
            }
        }
    }
}

fn at(err: FerroZipError, path: &str) -> FerroZipError {
    match err {
        FerroZipError::Structural { message, .. } => FerroZipError::structural_at(message, path),
        other => other,
    }
}
