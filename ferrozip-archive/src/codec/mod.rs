//! Codec layer: compression methods, encryption schemes, and the composed
//! payload pipelines the archive pushes entry bytes through.
//!
//! Both registries are closed enums. A method id outside the registry is an
//! `UnsupportedMethod` error at the point of use, which is fatal to the
//! affected entry but never to the archive as a whole.

pub mod crypto;
pub mod deflate;
pub mod store;

use crate::codec::crypto::{CryptoReader, CryptoWriter};
use crate::codec::deflate::{DeflateReader, DeflateWriter};
use crate::codec::store::{StoreReader, StoreWriter};
use ferrozip_core::{DataDescriptor, DosDateTime, FerroZipError, GeneralPurposeFlags, Result};
use std::io::{self, Read, Write};

/// Method id for stored (uncompressed) entries.
pub const METHOD_STORED: u16 = 0;
/// Method id for deflated entries.
pub const METHOD_DEFLATED: u16 = 8;

/// A supported compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression; bytes are stored verbatim.
    Stored,
    /// Raw deflate at the given level (0-9).
    Deflated {
        /// Compression level handed to the encoder.
        level: u32,
    },
}

impl Compression {
    /// Deflate at the default level.
    pub const DEFAULT_DEFLATE: Compression = Compression::Deflated { level: 6 };

    /// Resolve a header method id, failing on anything outside the registry.
    pub fn from_method(method: u16) -> Result<Self> {
        match method {
            METHOD_STORED => Ok(Self::Stored),
            METHOD_DEFLATED => Ok(Self::DEFAULT_DEFLATE),
            other => Err(FerroZipError::unsupported_method(other)),
        }
    }

    /// The wire method id.
    pub fn method_id(self) -> u16 {
        match self {
            Self::Stored => METHOD_STORED,
            Self::Deflated { .. } => METHOD_DEFLATED,
        }
    }

    /// Minimum "version needed to extract" for this method.
    pub fn version_needed(self) -> u16 {
        match self {
            Self::Stored => 10,
            Self::Deflated { .. } => 20,
        }
    }

    /// Flags this method contributes: the 2-bit level hint for deflate.
    ///
    /// The hint is coarse by design; distinct levels can share a slot and
    /// a parsed archive cannot recover the exact level from it.
    pub fn flags(self) -> GeneralPurposeFlags {
        let mut flags = GeneralPurposeFlags::default();
        if let Self::Deflated { level } = self {
            let hint = match level {
                8 | 9 => 1,
                2 => 2,
                1 => 3,
                _ => 0,
            };
            flags.set_compression_level(hint);
        }
        flags
    }
}

/// A supported encryption scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Payload is not encrypted.
    #[default]
    None,
    /// Traditional PKWARE stream cipher.
    Traditional,
}

impl Encryption {
    /// Bytes of encryption header preceding the payload.
    pub fn header_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Traditional => crypto::HEADER_LEN,
        }
    }

    /// Flags this scheme contributes: the encrypted bit.
    pub fn flags(self) -> GeneralPurposeFlags {
        let mut flags = GeneralPurposeFlags::default();
        if self == Self::Traditional {
            flags.set_encrypted(true);
        }
        flags
    }

    /// Minimum "version needed to extract" for this scheme.
    pub fn version_needed(self) -> u16 {
        match self {
            Self::None => 10,
            Self::Traditional => 20,
        }
    }
}

/// Encryption stage of the write pipeline. Sits between the compressor and
/// the raw sink.
pub enum CipherWriter<W: Write> {
    /// No encryption; bytes pass straight through.
    Plain(W),
    /// Traditional stream cipher.
    Traditional(CryptoWriter<W>),
}

impl<W: Write> CipherWriter<W> {
    /// Build the stage for `scheme`. Traditional encryption requires the
    /// password bytes and the entry mtime for its header.
    pub fn new(scheme: Encryption, inner: W, password: &[u8], mtime: DosDateTime) -> Self {
        match scheme {
            Encryption::None => Self::Plain(inner),
            Encryption::Traditional => Self::Traditional(CryptoWriter::new(inner, password, mtime)),
        }
    }

    /// Drain any buffered ciphertext and return the sink.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(inner) => Ok(inner),
            Self::Traditional(writer) => writer.finish(),
        }
    }
}

impl<W: Write> Write for CipherWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.write(buf),
            Self::Traditional(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(inner) => inner.flush(),
            Self::Traditional(writer) => writer.flush(),
        }
    }
}

/// Compression stage of the write pipeline.
pub enum PayloadWriter<W: Write> {
    /// Stored passthrough.
    Stored(StoreWriter<W>),
    /// Deflate encoder.
    Deflated(DeflateWriter<W>),
}

impl<W: Write> PayloadWriter<W> {
    /// Build the stage for `method` over `inner`.
    pub fn new(method: Compression, inner: W) -> Self {
        match method {
            Compression::Stored => Self::Stored(StoreWriter::new(inner)),
            Compression::Deflated { level } => Self::Deflated(DeflateWriter::new(inner, level)),
        }
    }

    /// Descriptor of everything passed through. Note the compressed size
    /// excludes any encryption header below this stage.
    pub fn descriptor(&self) -> DataDescriptor {
        match self {
            Self::Stored(writer) => writer.descriptor(),
            Self::Deflated(writer) => writer.descriptor(),
        }
    }

    /// Flush the codec to completion. Retryable on `WouldBlock`.
    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            Self::Stored(writer) => writer.finish(),
            Self::Deflated(writer) => writer.finish(),
        }
    }

    /// Return the delegate. Call after [`finish`](PayloadWriter::finish).
    pub fn into_inner(self) -> W {
        match self {
            Self::Stored(writer) => writer.into_inner(),
            Self::Deflated(writer) => writer.into_inner(),
        }
    }
}

impl<W: Write> Write for PayloadWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stored(writer) => writer.write(buf),
            Self::Deflated(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stored(writer) => writer.flush(),
            Self::Deflated(writer) => writer.flush(),
        }
    }
}

/// Decryption stage of the read pipeline.
pub enum CipherReader<R> {
    /// No encryption.
    Plain(R),
    /// Traditional stream cipher.
    Traditional(CryptoReader<R>),
}

impl<R: Read> CipherReader<R> {
    /// Build the stage for `scheme` over `inner`.
    pub fn new(scheme: Encryption, inner: R, password: &[u8]) -> Self {
        match scheme {
            Encryption::None => Self::Plain(inner),
            Encryption::Traditional => Self::Traditional(CryptoReader::new(inner, password)),
        }
    }
}

impl<R: Read> Read for CipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.read(buf),
            Self::Traditional(reader) => reader.read(buf),
        }
    }
}

/// Decompression stage of the read pipeline.
pub enum PayloadReader<R> {
    /// Stored passthrough.
    Stored(StoreReader<R>),
    /// Deflate decoder.
    Deflated(DeflateReader<R>),
}

impl<R: Read> PayloadReader<R> {
    /// Build the stage for `method` over `inner`.
    pub fn new(method: Compression, inner: R) -> Self {
        match method {
            Compression::Stored => Self::Stored(StoreReader::new(inner)),
            Compression::Deflated { .. } => Self::Deflated(DeflateReader::new(inner)),
        }
    }

    /// Descriptor of everything inflated so far.
    pub fn descriptor(&self) -> DataDescriptor {
        match self {
            Self::Stored(reader) => reader.descriptor(),
            Self::Deflated(reader) => reader.descriptor(),
        }
    }
}

impl<R: Read> Read for PayloadReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stored(reader) => reader.read(buf),
            Self::Deflated(reader) => reader.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_registry_is_closed() {
        assert_eq!(Compression::from_method(0).unwrap(), Compression::Stored);
        assert_eq!(
            Compression::from_method(8).unwrap(),
            Compression::DEFAULT_DEFLATE
        );
        for unsupported in [1u16, 6, 9, 12, 14, 99] {
            let err = Compression::from_method(unsupported).unwrap_err();
            assert!(matches!(
                err,
                FerroZipError::UnsupportedMethod { method } if method == unsupported
            ));
        }
    }

    #[test]
    fn test_level_hint_mapping() {
        let cases = [
            (9, 1u8),
            (8, 1),
            (2, 2),
            (1, 3),
            (6, 0),
            (5, 0),
        ];
        for (level, hint) in cases {
            let flags = Compression::Deflated { level }.flags();
            assert_eq!(flags.compression_level(), hint, "level {}", level);
        }
        assert_eq!(Compression::Stored.flags().compression_level(), 0);
    }

    #[test]
    fn test_level_hint_is_lossy() {
        let eight = Compression::Deflated { level: 8 }.flags();
        let nine = Compression::Deflated { level: 9 }.flags();
        assert_eq!(eight, nine);
    }

    #[test]
    fn test_encryption_contributions() {
        assert_eq!(Encryption::None.header_len(), 0);
        assert_eq!(Encryption::Traditional.header_len(), 12);
        assert!(Encryption::Traditional.flags().encrypted());
        assert!(!Encryption::None.flags().encrypted());
    }

    #[test]
    fn test_version_needed() {
        assert_eq!(Compression::Stored.version_needed(), 10);
        assert_eq!(Compression::DEFAULT_DEFLATE.version_needed(), 20);
        assert_eq!(Encryption::Traditional.version_needed(), 20);
    }
}
