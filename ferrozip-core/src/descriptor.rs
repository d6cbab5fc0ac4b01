//! The per-entry data descriptor: (CRC-32, compressed size, uncompressed
//! size).
//!
//! The triple appears in three places for any entry: the local header, the
//! central header, and recomputed while the payload streams through a codec
//! wrapper. The three must agree; any disagreement is corruption.

use crate::binary::{read_u32, write_u32};
use crate::error::Result;
use std::io::{Read, Write};

/// Trailing data descriptor signature (PK\x07\x08). Optional on the wire:
/// some producers write the triple bare.
pub const DATA_DESCRIPTOR_SIG: u32 = 0x08074B50;

/// An immutable (CRC-32, compressed-size, uncompressed-size) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDescriptor {
    /// CRC-32 of the uncompressed payload.
    pub crc32: u32,
    /// Size of the payload as stored (after compression and encryption).
    pub compressed_size: u32,
    /// Size of the payload after decompression.
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    /// Build a descriptor from its three fields.
    pub fn new(crc32: u32, compressed_size: u32, uncompressed_size: u32) -> Self {
        Self {
            crc32,
            compressed_size,
            uncompressed_size,
        }
    }

    /// Read a trailing descriptor.
    ///
    /// Tries the optional 4-byte signature first; if the first word is not
    /// the signature it is taken as the CRC directly, since known producers
    /// omit the magic.
    pub fn read_trailing<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let first = read_u32(reader)?;
        let crc32 = if first == DATA_DESCRIPTOR_SIG {
            read_u32(reader)?
        } else {
            first
        };
        let compressed_size = read_u32(reader)?;
        let uncompressed_size = read_u32(reader)?;
        Ok(Self {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }

    /// Write a trailing descriptor, with or without the leading signature.
    pub fn write_trailing<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        with_signature: bool,
    ) -> Result<()> {
        if with_signature {
            write_u32(writer, DATA_DESCRIPTOR_SIG)?;
        }
        write_u32(writer, self.crc32)?;
        write_u32(writer, self.compressed_size)?;
        write_u32(writer, self.uncompressed_size)?;
        Ok(())
    }
}
