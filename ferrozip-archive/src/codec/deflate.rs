//! Streaming raw-deflate compression and decompression.
//!
//! Both wrappers drive the low-level `flate2` state machines chunk by chunk
//! instead of using the convenience adapters, because the archive layer needs
//! exact control over would-block handling: encoded output a non-blocking
//! delegate refuses stays buffered, and a retried call resumes where the
//! previous one stopped.

use crate::stream::{classify_seek, read_retrying, SeekOp};
use ferrozip_core::{Crc32, DataDescriptor};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::io::{self, Read, Seek, SeekFrom, Write};

const READ_CHUNK: usize = 8192;
const WRITE_CHUNK: usize = 4096;

fn codec_error(what: &str, detail: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("{}: {}", what, detail))
}

/// Reader that inflates a raw-deflate stream from its delegate.
///
/// Tracks the CRC-32 and byte counts of the inflated output, so the caller
/// can compare against the entry's data descriptor once the stream is fully
/// consumed.
pub struct DeflateReader<R> {
    inner: R,
    decoder: Decompress,
    in_buf: Vec<u8>,
    in_pos: usize,
    input_eof: bool,
    done: bool,
    crc: Crc32,
    compressed: u64,
    uncompressed: u64,
}

impl<R: Read> DeflateReader<R> {
    /// Wrap `inner`, which must yield a raw deflate stream (no zlib header).
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: Decompress::new(false),
            in_buf: Vec::new(),
            in_pos: 0,
            input_eof: false,
            done: false,
            crc: Crc32::new(),
            compressed: 0,
            uncompressed: 0,
        }
    }

    /// Descriptor of everything inflated so far. Matches the entry values
    /// only after the stream has been read to EOF.
    pub fn descriptor(&self) -> DataDescriptor {
        DataDescriptor::new(
            self.crc.value(),
            self.compressed as u32,
            self.uncompressed as u32,
        )
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut chunk = vec![0u8; READ_CHUNK];
        let n = read_retrying(&mut self.inner, &mut chunk)?;
        chunk.truncate(n);
        self.in_buf = chunk;
        self.in_pos = 0;
        if n == 0 {
            self.input_eof = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for DeflateReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.done {
            return Ok(0);
        }
        loop {
            if self.in_pos == self.in_buf.len() && !self.input_eof {
                self.refill()?;
            }
            let flush = if self.input_eof {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            let before_in = self.decoder.total_in();
            let before_out = self.decoder.total_out();
            let status = self
                .decoder
                .decompress(&self.in_buf[self.in_pos..], buf, flush)
                .map_err(|e| codec_error("deflate stream", e))?;
            let consumed = (self.decoder.total_in() - before_in) as usize;
            let produced = (self.decoder.total_out() - before_out) as usize;
            self.in_pos += consumed;
            self.compressed += consumed as u64;
            self.crc.update(&buf[..produced]);
            self.uncompressed += produced as u64;
            match status {
                Status::StreamEnd => {
                    self.done = true;
                    return Ok(produced);
                }
                _ if produced > 0 => return Ok(produced),
                _ if self.input_eof && consumed == 0 => {
                    return Err(codec_error("deflate stream", "truncated before stream end"));
                }
                _ => continue,
            }
        }
    }
}

impl<R: Read + Seek> Seek for DeflateReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match classify_seek(pos)? {
            SeekOp::Position => Ok(self.uncompressed),
            SeekOp::Rewind => {
                self.inner.seek(SeekFrom::Start(0))?;
                self.decoder.reset(false);
                self.in_buf.clear();
                self.in_pos = 0;
                self.input_eof = false;
                self.done = false;
                self.crc.reset();
                self.compressed = 0;
                self.uncompressed = 0;
                Ok(0)
            }
        }
    }
}

/// Writer that deflates everything passed through it.
///
/// Input bytes are accepted in full once the compressor has consumed them;
/// encoded output the delegate refuses with `WouldBlock` stays in an
/// internal buffer and drains ahead of the next operation. [`finish`] must
/// run before the delegate is reclaimed and may itself be retried on
/// `WouldBlock`.
///
/// [`finish`]: DeflateWriter::finish
pub struct DeflateWriter<W: Write> {
    inner: W,
    encoder: Compress,
    pending: Vec<u8>,
    finished: bool,
    crc: Crc32,
    compressed: u64,
    uncompressed: u64,
}

impl<W: Write> DeflateWriter<W> {
    /// Wrap `inner`, producing a raw deflate stream at `level` (0-9).
    pub fn new(inner: W, level: u32) -> Self {
        Self {
            inner,
            encoder: Compress::new(Compression::new(level), false),
            pending: Vec::new(),
            finished: false,
            crc: Crc32::new(),
            compressed: 0,
            uncompressed: 0,
        }
    }

    /// Descriptor of everything deflated so far. The compressed size is
    /// final only after [`finish`](DeflateWriter::finish) returns `Ok`.
    pub fn descriptor(&self) -> DataDescriptor {
        DataDescriptor::new(
            self.crc.value(),
            self.compressed as u32,
            self.uncompressed as u32,
        )
    }

    fn flush_pending(&mut self) -> io::Result<()> {
        while !self.pending.is_empty() {
            match self.inner.write(&self.pending) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "delegate accepted no bytes",
                    ))
                }
                Ok(n) => {
                    self.pending.drain(..n);
                    self.compressed += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Run the compressor over `input` with the given flush mode, moving
    /// every produced byte into the pending buffer. Returns bytes consumed
    /// and the final status.
    fn drive(&mut self, input: &[u8], flush: FlushCompress) -> io::Result<(usize, Status)> {
        let mut out = [0u8; WRITE_CHUNK];
        let before_in = self.encoder.total_in();
        let before_out = self.encoder.total_out();
        let status = self
            .encoder
            .compress(input, &mut out, flush)
            .map_err(|e| codec_error("deflate encoder", e))?;
        let consumed = (self.encoder.total_in() - before_in) as usize;
        let produced = (self.encoder.total_out() - before_out) as usize;
        self.pending.extend_from_slice(&out[..produced]);
        Ok((consumed, status))
    }

    /// Flush the compressor to stream end and drain everything buffered.
    ///
    /// Safe to call again after a `WouldBlock`; the second call resumes with
    /// the buffered remainder.
    pub fn finish(&mut self) -> io::Result<()> {
        while !self.finished {
            self.flush_pending()?;
            let (_, status) = self.drive(&[], FlushCompress::Finish)?;
            if status == Status::StreamEnd {
                self.finished = true;
            }
        }
        self.flush_pending()?;
        self.inner.flush()
    }

    /// Return the delegate. Call after [`finish`](DeflateWriter::finish).
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for DeflateWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write after finish",
            ));
        }
        // Surface delegate backpressure before accepting new input.
        self.flush_pending()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let mut consumed_total = 0;
        while consumed_total < buf.len() {
            let (consumed, _) = self.drive(&buf[consumed_total..], FlushCompress::None)?;
            consumed_total += consumed;
            if self.pending.len() >= WRITE_CHUNK {
                match self.flush_pending() {
                    Ok(()) => {}
                    // Already-compressed bytes are safe in the buffer.
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e),
                }
            }
        }
        self.crc.update(buf);
        self.uncompressed += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending()?;
        self.inner.flush()
    }
}
