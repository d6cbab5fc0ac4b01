//! The archive orchestrator: parses existing archives, holds the ordered
//! entry set, and serializes everything back out.
//!
//! An archive keeps at most one read source and one write sink. Entries
//! parsed from the source keep their payloads in place and copy them
//! verbatim at close time; entries added or replaced by the caller are
//! encoded through the codec pipeline. On a seekable sink the local header's
//! CRC/size triple is patched in place after the payload; on a stream sink
//! a trailing data descriptor carries the triple instead. Entries written
//! with traditional encryption always get the trailing descriptor, because
//! several mainstream extractors refuse encrypted entries without one.

use crate::codec::{CipherReader, CipherWriter, Compression, Encryption, PayloadReader, PayloadWriter};
use crate::entry::{ArchivedData, Entry, EntryData, Password};
use crate::records::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, CENTRAL_SIG,
    LOCAL_FIXED_LEN, LOCAL_SIG, VERSION_MADE_BY,
};
use crate::stream::{ReadSeek, Window, WriteSeek};
use ferrozip_core::binary::read_u32;
use ferrozip_core::{DataDescriptor, DosDateTime, FerroZipError, Result};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, trace, warn};

enum Sink {
    Seekable(Box<dyn WriteSeek>),
    Stream(Box<dyn Write>),
}

/// A ZIP archive: an insertion-ordered set of entries plus optional read
/// source and write sink.
pub struct Archive {
    entries: Vec<Entry>,
    comment: String,
    input: Option<Box<dyn ReadSeek>>,
    output: Option<Sink>,
    default_password: Option<Password>,
    dirty: bool,
    closed: bool,
}

impl Archive {
    /// An empty archive with no source or sink attached.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            comment: String::new(),
            input: None,
            output: None,
            default_password: None,
            // Fresh archives are dirty so an entry-less close still writes
            // a valid empty container.
            dirty: true,
            closed: false,
        }
    }

    /// Parse an archive from a seekable source, keeping the source attached
    /// for payload extraction.
    pub fn read<R: Read + Seek + 'static>(source: R) -> Result<Self> {
        let mut input: Box<dyn ReadSeek> = Box::new(source);
        let (entries, comment) = parse(&mut *input)?;
        Ok(Self {
            entries,
            comment,
            input: Some(input),
            output: None,
            default_password: None,
            dirty: false,
            closed: false,
        })
    }

    /// A new archive that will be written to a seekable sink on close.
    pub fn create<W: Write + Seek + 'static>(sink: W) -> Self {
        let mut archive = Self::new();
        archive.output = Some(Sink::Seekable(Box::new(sink)));
        archive
    }

    /// A new archive that will be written to a forward-only sink on close.
    /// Every encoded entry gets a trailing data descriptor.
    pub fn create_streaming<W: Write + 'static>(sink: W) -> Self {
        let mut archive = Self::new();
        archive.output = Some(Sink::Stream(Box::new(sink)));
        archive
    }

    /// Parse `source` and arrange for the (possibly modified) archive to be
    /// written to `sink` on close.
    pub fn open<R, W>(source: R, sink: W) -> Result<Self>
    where
        R: Read + Seek + 'static,
        W: Write + Seek + 'static,
    {
        let mut archive = Self::read(source)?;
        archive.output = Some(Sink::Seekable(Box::new(sink)));
        Ok(archive)
    }

    /// Password tried for every encrypted entry that has none of its own.
    pub fn set_default_password(&mut self, password: impl Into<Password>) {
        self.default_password = Some(password.into());
    }

    /// The archive comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Set the archive comment.
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
        self.dirty = true;
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Iterate entry paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Entry::path)
    }

    /// Look up an entry by its archive path.
    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path() == path)
    }

    /// Look up an entry mutably. Marks the archive dirty, since the caller
    /// can change anything through the returned reference.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Entry> {
        let entry = self.entries.iter_mut().find(|e| e.path() == path);
        if entry.is_some() {
            self.dirty = true;
        }
        entry
    }

    /// Add an entry. An existing entry at the same path is replaced in its
    /// original position and returned; a new path appends.
    pub fn add(&mut self, entry: Entry) -> Result<Option<Entry>> {
        self.check_open()?;
        if let Some(slot) = self.entries.iter_mut().find(|e| e.path() == entry.path()) {
            self.dirty = true;
            return Ok(Some(std::mem::replace(slot, entry)));
        }
        // The end record's entry count is 16 bits.
        if self.entries.len() >= u16::MAX as usize {
            return Err(FerroZipError::usage(
                "archive is full: the entry count field caps out at 65535",
            ));
        }
        self.dirty = true;
        self.entries.push(entry);
        Ok(None)
    }

    /// Remove and return the entry at `path`.
    pub fn remove(&mut self, path: &str) -> Result<Option<Entry>> {
        self.check_open()?;
        match self.entries.iter().position(|e| e.path() == path) {
            Some(i) => {
                self.dirty = true;
                Ok(Some(self.entries.remove(i)))
            }
            None => Ok(None),
        }
    }

    /// Extract one entry's payload into memory.
    pub fn read_entry(&mut self, path: &str, password: Option<&str>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.extract_to(path, &mut out, password)?;
        Ok(out)
    }

    /// Stream one entry's payload into `out`, verifying CRC and size
    /// against the archived descriptor. Returns the byte count produced.
    pub fn extract_to<W: Write>(
        &mut self,
        path: &str,
        out: &mut W,
        password: Option<&str>,
    ) -> Result<u64> {
        self.check_open()?;
        let index = self
            .entries
            .iter()
            .position(|e| e.path() == path)
            .ok_or_else(|| FerroZipError::usage(format!("no entry at '{}'", path)))?;
        let entry = &mut self.entries[index];
        match &mut entry.data {
            EntryData::None => Ok(0),
            EntryData::Bytes(bytes) => {
                out.write_all(bytes)?;
                Ok(bytes.len() as u64)
            }
            EntryData::Reader(reader) => {
                reader.seek(SeekFrom::Start(0))?;
                Ok(io::copy(reader, out)?)
            }
            EntryData::Archived(archived) => {
                let archived = archived.clone();
                let password = resolve_password(
                    &archived,
                    entry.password(),
                    password,
                    self.default_password.as_ref(),
                    path,
                )?;
                let input = self
                    .input
                    .as_mut()
                    .ok_or_else(|| FerroZipError::usage("archive has no read source"))?;
                decode_archived(&mut **input, &archived, password.as_deref(), out)
            }
        }
    }

    /// Serialize the archive to its sink if anything changed since it was
    /// opened, then detach both source and sink.
    ///
    /// A second call is a usage error. Archives without a sink just close.
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        self.closed = true;
        if !self.dirty {
            self.input = None;
            self.output = None;
            return Ok(());
        }
        let Some(sink) = self.output.take() else {
            self.input = None;
            return Ok(());
        };
        let result = match sink {
            Sink::Seekable(mut w) => {
                let mut sink_ref = SinkRef::Seekable(&mut *w);
                self.write_records(&mut sink_ref)
            }
            Sink::Stream(mut w) => {
                let mut sink_ref = SinkRef::Stream(&mut *w);
                self.write_records(&mut sink_ref)
            }
        };
        self.input = None;
        result
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(FerroZipError::usage("archive is closed"))
        } else {
            Ok(())
        }
    }

    fn write_records(&mut self, sink: &mut SinkRef<'_>) -> Result<()> {
        let mut offset: u64 = 0;
        let mut centrals: Vec<CentralDirectoryHeader> = Vec::new();

        for index in 0..self.entries.len() {
            let central = if self.entries[index].needs_encoding() {
                write_encoded_entry(&mut self.entries[index], sink, &mut offset)?
            } else {
                let entry = &mut self.entries[index];
                let input = self.input.as_mut().ok_or_else(|| {
                    FerroZipError::usage(format!(
                        "entry '{}' references a detached source archive",
                        entry.path()
                    ))
                })?;
                write_copied_entry(entry, &mut **input, sink, &mut offset)?
            };
            trace!(path = %central.path, offset = central.local_offset, "wrote entry");
            centrals.push(central);
        }

        let cd_offset = offset;
        for central in &centrals {
            central.write(sink)?;
        }
        let cd_size = centrals
            .iter()
            .map(|c| 46 + c.path.len() as u64 + c.extra.len() as u64 + c.comment.len() as u64)
            .sum::<u64>();
        // `add` enforces the cap; a parsed archive can still exceed it when
        // its central directory holds more records than the end record can
        // count.
        let entry_count = u16::try_from(centrals.len()).map_err(|_| {
            FerroZipError::usage("archive is full: the entry count field caps out at 65535")
        })?;
        EndOfCentralDirectory {
            entry_count,
            cd_size: cd_size as u32,
            cd_offset: cd_offset as u32,
            comment: self.comment.clone(),
        }
        .write(sink)?;
        sink.flush()?;
        debug!(
            entries = centrals.len(),
            cd_offset,
            cd_size,
            "archive written"
        );
        Ok(())
    }
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        if !self.closed && self.output.is_some() {
            if let Err(e) = self.close() {
                warn!(error = %e, "archive close failed during drop");
            }
        }
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.entries.len())
            .field("comment", &self.comment)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Write sink with optional random access for header patching.
enum SinkRef<'a> {
    Seekable(&'a mut dyn WriteSeek),
    Stream(&'a mut dyn Write),
}

impl SinkRef<'_> {
    fn is_seekable(&self) -> bool {
        matches!(self, Self::Seekable(_))
    }

    /// Overwrite `bytes` at an absolute offset, returning to the sink end.
    fn patch(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        match self {
            Self::Seekable(w) => {
                w.seek(SeekFrom::Start(offset))?;
                w.write_all(bytes)?;
                w.seek(SeekFrom::End(0))?;
                Ok(())
            }
            Self::Stream(_) => Err(FerroZipError::usage(
                "cannot patch a forward-only sink",
            )),
        }
    }
}

impl Write for SinkRef<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Seekable(w) => w.write(buf),
            Self::Stream(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Seekable(w) => w.flush(),
            Self::Stream(w) => w.flush(),
        }
    }
}

/// Parse the whole container: end record, central directory, then each
/// local header with its cross-check against the central copy.
fn parse(input: &mut dyn ReadSeek) -> Result<(Vec<Entry>, String)> {
    let (eocd, _) = EndOfCentralDirectory::locate(input)?;
    input.seek(SeekFrom::Start(eocd.cd_offset as u64))?;
    let mut centrals = Vec::with_capacity(eocd.entry_count as usize);
    // The first non-matching signature terminates the directory; normally
    // that is the end record itself.
    loop {
        let sig = read_u32(input)?;
        if sig != CENTRAL_SIG {
            break;
        }
        centrals.push(CentralDirectoryHeader::read_body(input)?);
    }
    if centrals.len() != eocd.entry_count as usize {
        debug!(
            declared = eocd.entry_count,
            found = centrals.len(),
            "end record entry count differs from central directory"
        );
    }
    debug!(entries = centrals.len(), "parsed central directory");

    let mut entries: Vec<Entry> = Vec::with_capacity(centrals.len());
    for central in &centrals {
        input.seek(SeekFrom::Start(central.local_offset as u64))?;
        let sig = read_u32(input)?;
        if sig != LOCAL_SIG {
            return Err(FerroZipError::structural_at(
                format!("local header has signature {:#010x}", sig),
                central.path.clone(),
            ));
        }
        let mut local = LocalFileHeader::read_body(input)?;
        let data_offset = central.local_offset as u64
            + LOCAL_FIXED_LEN
            + local.path.len() as u64
            + local.extra.len() as u64;
        if local.flags.data_descriptor_follows() {
            // The local triple is zeroed on the wire; reconcile it from the
            // trailing descriptor so the cross-check compares real values.
            input.seek(SeekFrom::Start(
                data_offset + central.descriptor.compressed_size as u64,
            ))?;
            local.descriptor = DataDescriptor::read_trailing(input)?;
        }
        central.cross_check(&local)?;
        trace!(path = %central.path, data_offset, "parsed entry");

        let entry = Entry::from_central(central, &local.extra, data_offset)?;
        // Duplicate paths: the later central record wins, in place.
        match entries.iter().position(|e| e.path() == entry.path()) {
            Some(i) => entries[i] = entry,
            None => entries.push(entry),
        }
    }
    Ok((entries, eocd.comment))
}

fn resolve_password(
    archived: &ArchivedData,
    own: Option<&Password>,
    explicit: Option<&str>,
    default: Option<&Password>,
    path: &str,
) -> Result<Option<String>> {
    if !archived.flags.encrypted() {
        return Ok(None);
    }
    if let Some(pw) = explicit {
        return Ok(Some(pw.to_string()));
    }
    if let Some(pw) = own.or(default) {
        return Ok(Some(pw.resolve(path)));
    }
    Err(FerroZipError::usage(format!(
        "entry '{}' is encrypted and no password was supplied",
        path
    )))
}

/// Decode one archived payload through the cipher and codec stages,
/// verifying the result against the stored descriptor. A wrong password is
/// not detectable up front; it surfaces here as a CRC mismatch.
fn decode_archived<W: Write>(
    input: &mut dyn ReadSeek,
    archived: &ArchivedData,
    password: Option<&str>,
    out: &mut W,
) -> Result<u64> {
    let method = Compression::from_method(archived.method)?;
    let encryption = if archived.flags.encrypted() {
        Encryption::Traditional
    } else {
        Encryption::None
    };
    let window = Window::new(
        input,
        archived.data_offset,
        archived.descriptor.compressed_size as u64,
    )?;
    let cipher = CipherReader::new(
        encryption,
        window,
        password.unwrap_or_default().as_bytes(),
    );
    let mut payload = PayloadReader::new(method, cipher);
    let produced = io::copy(&mut payload, out)?;
    let got = payload.descriptor();
    if produced != archived.descriptor.uncompressed_size as u64 {
        return Err(FerroZipError::size_mismatch(
            archived.descriptor.uncompressed_size as u64,
            produced,
        ));
    }
    if got.crc32 != archived.descriptor.crc32 {
        return Err(FerroZipError::crc_mismatch(
            archived.descriptor.crc32,
            got.crc32,
        ));
    }
    Ok(produced)
}

/// Encode one caller-supplied entry: local header, payload through the
/// codec pipeline, then either a header patch or a trailing descriptor.
fn write_encoded_entry(
    entry: &mut Entry,
    sink: &mut SinkRef<'_>,
    offset: &mut u64,
) -> Result<CentralDirectoryHeader> {
    let local_offset = *offset;
    let method = entry.compression();
    let encryption = entry.encryption();
    let is_directory = entry.is_directory();

    let mut flags = method.flags();
    flags.merge(encryption.flags());
    // Directories have a known empty payload, so the triple is final at
    // header time regardless of sink kind.
    let use_descriptor =
        !is_directory && (!sink.is_seekable() || encryption == Encryption::Traditional);
    flags.set_data_descriptor_follows(use_descriptor);

    let mut local = LocalFileHeader {
        version_needed: entry.version_needed(),
        flags,
        method: method.method_id(),
        mtime: entry.mtime(),
        descriptor: DataDescriptor::default(),
        path: entry.path().to_string(),
        extra: entry.extra_fields().dump(),
    };
    local.write(sink, !is_directory)?;
    *offset += local.len();

    let descriptor = if is_directory {
        DataDescriptor::default()
    } else {
        let password = match encryption {
            Encryption::None => None,
            Encryption::Traditional => Some(
                entry
                    .password()
                    .map(|p| p.resolve(entry.path()))
                    .ok_or_else(|| {
                        FerroZipError::usage(format!(
                            "entry '{}' is encrypted and no password was supplied",
                            entry.path()
                        ))
                    })?,
            ),
        };
        let source = entry.take_plaintext().ok_or_else(|| {
            FerroZipError::usage(format!("entry '{}' has no payload source", entry.path()))
        })?;
        encode_payload(sink, source, method, encryption, password, entry.mtime())?
    };
    local.descriptor = descriptor;
    *offset += descriptor.compressed_size as u64;

    if use_descriptor {
        descriptor.write_trailing(sink, true)?;
        *offset += 16;
    } else if !is_directory {
        let mut triple = Vec::with_capacity(12);
        triple.extend_from_slice(&descriptor.crc32.to_le_bytes());
        triple.extend_from_slice(&descriptor.compressed_size.to_le_bytes());
        triple.extend_from_slice(&descriptor.uncompressed_size.to_le_bytes());
        sink.patch(local_offset + LocalFileHeader::DESCRIPTOR_OFFSET, &triple)?;
    }

    Ok(central_for(entry, &local, descriptor, local_offset))
}

/// Copy one parsed entry verbatim: the payload bytes are already encoded,
/// so the triple is known up front and no re-compression happens.
fn write_copied_entry(
    entry: &Entry,
    input: &mut dyn ReadSeek,
    sink: &mut SinkRef<'_>,
    offset: &mut u64,
) -> Result<CentralDirectoryHeader> {
    let EntryData::Archived(archived) = &entry.data else {
        return Err(FerroZipError::usage("entry payload is not archived"));
    };
    let local_offset = *offset;
    let mut flags = archived.flags;
    // Known sizes make the descriptor unnecessary, except for the
    // encrypted-entry interop quirk.
    let use_descriptor = flags.encrypted();
    flags.set_data_descriptor_follows(use_descriptor);

    let local = LocalFileHeader {
        version_needed: entry.version_needed(),
        flags,
        method: archived.method,
        mtime: entry.mtime(),
        descriptor: archived.descriptor,
        path: entry.path().to_string(),
        extra: entry.extra_fields().dump(),
    };
    local.write(sink, use_descriptor)?;
    *offset += local.len();

    let mut window = Window::new(
        input,
        archived.data_offset,
        archived.descriptor.compressed_size as u64,
    )?;
    io::copy(&mut window, sink)?;
    if window.remaining() != 0 {
        return Err(FerroZipError::structural_at(
            "payload truncated in source archive",
            entry.path(),
        ));
    }
    *offset += archived.descriptor.compressed_size as u64;

    if use_descriptor {
        archived.descriptor.write_trailing(sink, true)?;
        *offset += 16;
    }

    Ok(central_for(entry, &local, archived.descriptor, local_offset))
}

fn central_for(
    entry: &Entry,
    local: &LocalFileHeader,
    descriptor: DataDescriptor,
    local_offset: u64,
) -> CentralDirectoryHeader {
    CentralDirectoryHeader {
        version_made_by: VERSION_MADE_BY,
        version_needed: local.version_needed,
        flags: local.flags,
        method: local.method,
        mtime: local.mtime,
        descriptor,
        path: local.path.clone(),
        extra: local.extra.clone(),
        comment: entry.comment().to_string(),
        internal_attrs: 0,
        external_attrs: entry.external_attrs(),
        local_offset: local_offset as u32,
    }
}

/// Run plaintext through compression then encryption into the sink.
/// The returned compressed size includes the encryption header.
fn encode_payload(
    sink: &mut SinkRef<'_>,
    mut source: Box<dyn ReadSeek>,
    method: Compression,
    encryption: Encryption,
    password: Option<String>,
    mtime: DosDateTime,
) -> Result<DataDescriptor> {
    source.seek(SeekFrom::Start(0))?;
    let cipher = CipherWriter::new(
        encryption,
        &mut *sink,
        password.unwrap_or_default().as_bytes(),
        mtime,
    );
    let mut payload = PayloadWriter::new(method, cipher);
    io::copy(&mut source, &mut payload)?;
    payload.finish()?;
    let inner = payload.descriptor();
    payload.into_inner().finish()?;
    Ok(DataDescriptor::new(
        inner.crc32,
        inner.compressed_size + encryption.header_len() as u32,
        inner.uncompressed_size,
    ))
}
