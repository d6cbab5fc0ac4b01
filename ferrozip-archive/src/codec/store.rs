//! The stored (uncompressed) codec: a passthrough that still tracks the
//! CRC-32 and byte counts, so stored entries verify exactly like deflated
//! ones.

use crate::stream::{classify_seek, read_retrying, SeekOp};
use ferrozip_core::{Crc32, DataDescriptor};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Reader passthrough with descriptor tracking.
pub struct StoreReader<R> {
    inner: R,
    crc: Crc32,
    bytes: u64,
}

impl<R: Read> StoreReader<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            crc: Crc32::new(),
            bytes: 0,
        }
    }

    /// Descriptor of everything read so far. Stored entries have equal
    /// compressed and uncompressed sizes.
    pub fn descriptor(&self) -> DataDescriptor {
        DataDescriptor::new(self.crc.value(), self.bytes as u32, self.bytes as u32)
    }
}

impl<R: Read> Read for StoreReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = read_retrying(&mut self.inner, buf)?;
        self.crc.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for StoreReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match classify_seek(pos)? {
            SeekOp::Position => Ok(self.bytes),
            SeekOp::Rewind => {
                self.inner.seek(SeekFrom::Start(0))?;
                self.crc.reset();
                self.bytes = 0;
                Ok(0)
            }
        }
    }
}

/// Writer passthrough with descriptor tracking.
pub struct StoreWriter<W: Write> {
    inner: W,
    crc: Crc32,
    bytes: u64,
}

impl<W: Write> StoreWriter<W> {
    /// Wrap `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            crc: Crc32::new(),
            bytes: 0,
        }
    }

    /// Descriptor of everything written so far.
    pub fn descriptor(&self) -> DataDescriptor {
        DataDescriptor::new(self.crc.value(), self.bytes as u32, self.bytes as u32)
    }

    /// Flush the delegate and return it.
    pub fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Return the delegate.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for StoreWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.inner.write(buf) {
                Ok(n) => {
                    self.crc.update(&buf[..n]);
                    self.bytes += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_tracks_descriptor() {
        let mut reader = StoreReader::new(Cursor::new(b"data".to_vec()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        let desc = reader.descriptor();
        assert_eq!(desc.crc32, 0xADF3_F363);
        assert_eq!(desc.compressed_size, 4);
        assert_eq!(desc.uncompressed_size, 4);
    }

    #[test]
    fn test_writer_tracks_descriptor() {
        let mut writer = StoreWriter::new(Vec::new());
        writer.write_all(b"data").unwrap();
        let desc = writer.descriptor();
        assert_eq!(desc.crc32, 0xADF3_F363);
        assert_eq!(desc.compressed_size, 4);
        assert_eq!(writer.into_inner(), b"data");
    }

    #[test]
    fn test_reader_rewind_resets_tracking() {
        let mut reader = StoreReader::new(Cursor::new(b"abc".to_vec()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        reader.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(reader.descriptor(), DataDescriptor::default());
        let mut again = Vec::new();
        reader.read_to_end(&mut again).unwrap();
        assert_eq!(again, b"abc");
        assert_eq!(reader.descriptor().uncompressed_size, 3);
    }

    #[test]
    fn test_mid_stream_descriptor_is_prefix_checksum() {
        let mut reader = StoreReader::new(Cursor::new(b"data".to_vec()));
        let mut half = [0u8; 2];
        reader.read_exact(&mut half).unwrap();
        assert_eq!(reader.descriptor().crc32, Crc32::compute(b"da"));
        assert_ne!(reader.descriptor().crc32, Crc32::compute(b"data"));
    }
}
