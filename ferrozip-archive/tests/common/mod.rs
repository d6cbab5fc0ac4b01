//! Shared sinks for archive tests: archives own their sinks, so tests that
//! need the written bytes back hand in a handle they keep a clone of.

use std::cell::RefCell;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::rc::Rc;

/// Seekable in-memory sink whose bytes stay reachable after the archive
/// consumes it.
#[derive(Clone, Default)]
pub struct SharedSink(Rc<RefCell<Cursor<Vec<u8>>>>);

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().get_ref().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

impl Seek for SharedSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.borrow_mut().seek(pos)
    }
}

/// Forward-only sink that accepts a single byte per call, exercising every
/// partial-write path without ever erroring.
#[derive(Clone, Default)]
pub struct TrickleSink(Rc<RefCell<Vec<u8>>>);

impl TrickleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

impl Write for TrickleSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.0.borrow_mut().push(buf[0]);
        Ok(1)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
