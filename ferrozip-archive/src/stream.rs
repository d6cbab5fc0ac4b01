//! Stream plumbing shared by the codec layer and the archive orchestrator.
//!
//! Two rules hold for every wrapper in this crate:
//!
//! - `ErrorKind::Interrupted` is retried at the lowest layer that sees it,
//!   so it never reaches a caller.
//! - `ErrorKind::WouldBlock` propagates unchanged through every layer. A
//!   wrapper that has already advanced its internal state buffers the
//!   affected bytes so the caller can repeat the operation without loss.
//!
//! Seeking on a wrapper is deliberately narrow: `Current(0)` queries the
//! logical position and `Start(0)` rewinds to the beginning. Everything
//! else, including any `SeekFrom::End`, is refused, because the wrapped
//! streams have no meaningful end to measure from.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Combined `Read + Seek` bound for boxed archive sources.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Combined `Write + Seek` bound for boxed archive sinks.
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// The two seek operations wrappers honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeekOp {
    /// `Current(0)`: report the logical position without moving.
    Position,
    /// `Start(0)`: rewind to the beginning of the stream.
    Rewind,
}

/// Map a `SeekFrom` onto the supported operations, refusing the rest.
pub(crate) fn classify_seek(pos: SeekFrom) -> io::Result<SeekOp> {
    match pos {
        SeekFrom::Current(0) => Ok(SeekOp::Position),
        SeekFrom::Start(0) => Ok(SeekOp::Rewind),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported seek {:?}: only Current(0) and Start(0)", other),
        )),
    }
}

/// `read` that retries `Interrupted`. `WouldBlock` and every other error
/// pass through.
pub(crate) fn read_retrying<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// A bounded read-only view over a region of a seekable source.
///
/// Reads past the region end report EOF; rewinding seeks the source back to
/// the region start. The window borrows the source for its lifetime, so the
/// region cannot move underneath it.
#[derive(Debug)]
pub struct Window<R> {
    inner: R,
    start: u64,
    len: u64,
    pos: u64,
}

impl<R: Read + Seek> Window<R> {
    /// Open a window over `len` bytes starting at absolute offset `start`,
    /// positioning the source there.
    pub fn new(mut inner: R, start: u64, len: u64) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(start))?;
        Ok(Self {
            inner,
            start,
            len,
            pos: 0,
        })
    }

    /// Bytes remaining before the region end.
    pub fn remaining(&self) -> u64 {
        self.len - self.pos
    }
}

impl<R: Read + Seek> Read for Window<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let cap = remaining.min(buf.len() as u64) as usize;
        let n = read_retrying(&mut self.inner, &mut buf[..cap])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for Window<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match classify_seek(pos)? {
            SeekOp::Position => Ok(self.pos),
            SeekOp::Rewind => {
                self.inner.seek(SeekFrom::Start(self.start))?;
                self.pos = 0;
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_window_bounds_reads() {
        let data = b"0123456789";
        let mut window = Window::new(Cursor::new(data), 2, 5).unwrap();
        let mut out = Vec::new();
        window.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"23456");
        assert_eq!(window.remaining(), 0);
    }

    #[test]
    fn test_window_rewind() {
        let data = b"0123456789";
        let mut window = Window::new(Cursor::new(data), 4, 3).unwrap();
        let mut out = [0u8; 3];
        window.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"456");
        window.seek(SeekFrom::Start(0)).unwrap();
        let mut again = Vec::new();
        window.read_to_end(&mut again).unwrap();
        assert_eq!(again, b"456");
    }

    #[test]
    fn test_window_position_query() {
        let mut window = Window::new(Cursor::new(b"abcdef"), 0, 6).unwrap();
        let mut out = [0u8; 2];
        window.read_exact(&mut out).unwrap();
        assert_eq!(window.seek(SeekFrom::Current(0)).unwrap(), 2);
    }

    #[test]
    fn test_window_refuses_other_seeks() {
        let mut window = Window::new(Cursor::new(b"abcdef"), 0, 6).unwrap();
        for bad in [
            SeekFrom::End(0),
            SeekFrom::End(-3),
            SeekFrom::Start(2),
            SeekFrom::Current(1),
        ] {
            let err = window.seek(bad).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{:?}", bad);
        }
    }

    struct Interrupting<R> {
        inner: R,
        interrupt_next: bool,
    }

    impl<R: Read> Read for Interrupting<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
            }
            self.interrupt_next = true;
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_read_retrying_swallows_interrupted() {
        let mut reader = Interrupting {
            inner: Cursor::new(b"xy".to_vec()),
            interrupt_next: true,
        };
        let mut buf = [0u8; 2];
        assert_eq!(read_retrying(&mut reader, &mut buf).unwrap(), 2);
        assert_eq!(&buf, b"xy");
    }

    #[test]
    fn test_read_retrying_passes_would_block() {
        struct Blocked;
        impl Read for Blocked {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "not ready"))
            }
        }
        let err = read_retrying(&mut Blocked, &mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
