//! Traditional PKWARE ("ZipCrypto") stream encryption.
//!
//! The cipher keeps three 32-bit keys seeded from the password. Each
//! plaintext byte both produces one keystream byte and advances the keys, so
//! the keystream depends on everything encrypted so far. A 12-byte encrypted
//! header precedes the payload: 10 random bytes followed by the low-order two
//! bytes of the entry's DOS modification time. Decryption consumes the header
//! without verifying it; a wrong password surfaces later as a CRC mismatch on
//! the decrypted payload.

use crate::stream::{classify_seek, read_retrying, SeekOp};
use ferrozip_core::DosDateTime;
use rand::RngCore;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Length of the encrypted header preceding every encrypted payload.
pub const HEADER_LEN: usize = 12;

/// The key-fold uses the raw CRC-32 recurrence on un-finalized key state,
/// which the payload-checksum API does not expose, so the cipher carries its
/// own table.
const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

fn crc_fold(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// The three-register cipher state.
#[derive(Debug, Clone)]
struct Keys {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl Keys {
    fn from_password(password: &[u8]) -> Self {
        let mut keys = Self {
            key0: 0x1234_5678,
            key1: 0x2345_6789,
            key2: 0x3456_7890,
        };
        for &byte in password {
            keys.advance(byte);
        }
        keys
    }

    /// Advance the key state by one plaintext byte.
    fn advance(&mut self, plain: u8) {
        self.key0 = crc_fold(self.key0, plain);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.key2 = crc_fold(self.key2, (self.key1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let temp = self.key2 | 2;
        ((temp.wrapping_mul(temp ^ 1)) >> 8) as u8
    }

    fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.stream_byte();
        self.advance(plain);
        cipher
    }

    fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.stream_byte();
        self.advance(plain);
        plain
    }
}

/// Writer that encrypts everything passed through it.
///
/// The 12-byte header is staged on construction and drained ahead of the
/// first payload byte. Ciphertext a non-blocking delegate refuses is kept in
/// an internal buffer, so a short write never loses key state.
pub struct CryptoWriter<W: Write> {
    inner: W,
    keys: Keys,
    pending: Vec<u8>,
}

impl<W: Write> CryptoWriter<W> {
    /// Wrap `inner`, deriving keys from `password` and staging the header.
    pub fn new(inner: W, password: &[u8], mtime: DosDateTime) -> Self {
        let mut keys = Keys::from_password(password);
        let mut header = [0u8; HEADER_LEN];
        rand::thread_rng().fill_bytes(&mut header[..HEADER_LEN - 2]);
        header[HEADER_LEN - 2..].copy_from_slice(&mtime.time_word().to_le_bytes());
        let pending = header.iter().map(|&b| keys.encrypt_byte(b)).collect();
        Self {
            inner,
            keys,
            pending,
        }
    }

    /// Drain buffered ciphertext (header and short-write remainders) into
    /// the delegate. `WouldBlock` leaves the rest buffered.
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
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Flush everything buffered and return the delegate.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_pending()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for CryptoWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.flush_pending()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let cipher: Vec<u8> = buf.iter().map(|&b| self.keys.encrypt_byte(b)).collect();
        let mut written = 0;
        while written < cipher.len() {
            match self.inner.write(&cipher[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "delegate accepted no bytes",
                    ))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    // Keys already advanced past these bytes; keep the
                    // ciphertext so the caller can treat the write as done.
                    self.pending.extend_from_slice(&cipher[written..]);
                    return Ok(buf.len());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending()?;
        self.inner.flush()
    }
}

/// Reader that decrypts everything passed through it.
///
/// The first [`HEADER_LEN`] bytes of the delegate are the encrypted header;
/// they are consumed and discarded before any payload byte is produced.
pub struct CryptoReader<R> {
    inner: R,
    keys: Keys,
    password: Vec<u8>,
    header_remaining: usize,
    plain_pos: u64,
}

impl<R: Read> CryptoReader<R> {
    /// Wrap `inner`, deriving keys from `password`.
    pub fn new(inner: R, password: &[u8]) -> Self {
        Self {
            inner,
            keys: Keys::from_password(password),
            password: password.to_vec(),
            header_remaining: HEADER_LEN,
            plain_pos: 0,
        }
    }

    fn consume_header(&mut self) -> io::Result<()> {
        let mut buf = [0u8; HEADER_LEN];
        while self.header_remaining > 0 {
            let n = read_retrying(&mut self.inner, &mut buf[..self.header_remaining])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated encryption header",
                ));
            }
            for &byte in &buf[..n] {
                self.keys.decrypt_byte(byte);
            }
            self.header_remaining -= n;
        }
        Ok(())
    }
}

impl<R: Read> Read for CryptoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.consume_header()?;
        let n = read_retrying(&mut self.inner, buf)?;
        for byte in &mut buf[..n] {
            *byte = self.keys.decrypt_byte(*byte);
        }
        self.plain_pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for CryptoReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match classify_seek(pos)? {
            SeekOp::Position => Ok(self.plain_pos),
            SeekOp::Rewind => {
                self.inner.seek(SeekFrom::Start(0))?;
                self.keys = Keys::from_password(&self.password);
                self.header_remaining = HEADER_LEN;
                self.plain_pos = 0;
                Ok(0)
            }
        }
    }
}
