//! Little-endian fixed-width integer primitives.
//!
//! ZIP stores every multi-byte field little-endian: 16-bit "shorts" and
//! 32-bit "longs". These helpers read and write them over the `std::io`
//! traits; a short read surfaces as a structural error rather than a bare
//! `UnexpectedEof`, since truncation mid-field always means a truncated
//! archive.

use crate::error::{FerroZipError, Result};
use std::io::{self, Read, Write};

/// Read a little-endian u16.
pub fn read_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_exact_retrying(reader, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian u32.
pub fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact_retrying(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read exactly `len` bytes into a fresh buffer.
pub fn read_vec<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_exact_retrying(reader, &mut buf)?;
    Ok(buf)
}

/// Write a little-endian u16.
pub fn write_u16<W: Write + ?Sized>(writer: &mut W, value: u16) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32<W: Write + ?Sized>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// `read_exact` that retries `Interrupted` and maps a clean EOF mid-field to
/// a structural truncation error. `WouldBlock` propagates unchanged.
pub fn read_exact_retrying<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(FerroZipError::structural(format!(
                    "truncated field: expected {} more bytes",
                    buf.len() - filled
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
