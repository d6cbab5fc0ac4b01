//! Error types for ferrozip operations.
//!
//! One enum covers every failure class in the library: I/O failures from the
//! underlying transport, structural corruption in the archive layout,
//! unsupported features, payload integrity failures, and caller misuse.
//!
//! Would-block and interrupted conditions are *not* errors of their own kind:
//! they travel as [`std::io::ErrorKind::WouldBlock`] and
//! [`std::io::ErrorKind::Interrupted`] inside the `Io` variant. Every stream
//! wrapper in this workspace propagates `WouldBlock` unchanged and retries
//! `Interrupted` internally, so callers only ever see `WouldBlock` when the
//! transport itself is non-blocking.

use std::io;
use thiserror::Error;

/// The main error type for ferrozip operations.
#[derive(Debug, Error)]
pub enum FerroZipError {
    /// I/O error from underlying reader/writer.
    ///
    /// `ErrorKind::WouldBlock` inside this variant is a retryable control
    /// signal, not a failure; the operation that returned it can be repeated
    /// verbatim without losing data.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed archive structure: bad signature, truncated header,
    /// local/central mismatch, or an invalid DOS time field.
    #[error("structural error{}: {message}", path_suffix(.path))]
    Structural {
        /// Description of what is malformed.
        message: String,
        /// Entry path the corruption belongs to, when known.
        path: Option<String>,
    },

    /// Compression method this implementation does not handle.
    ///
    /// Fatal only to the affected entry; archive parsing continues past it.
    #[error("unsupported compression method: {method}")]
    UnsupportedMethod {
        /// Raw method identifier from the header.
        method: u16,
    },

    /// CRC-32 of the extracted data does not match the archived value.
    #[error("CRC mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// CRC recorded in the archive.
        expected: u32,
        /// CRC recomputed from the extracted bytes.
        computed: u32,
    },

    /// Byte count of the extracted data does not match the archived value.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Size recorded in the archive.
        expected: u64,
        /// Size actually produced.
        actual: u64,
    },

    /// Caller misuse: closed-archive reuse, empty entry path, invalid seek.
    #[error("usage error: {message}")]
    Usage {
        /// Description of the misuse.
        message: String,
    },
}

fn path_suffix(path: &Option<String>) -> String {
    match path {
        Some(p) => format!(" in entry '{}'", p),
        None => String::new(),
    }
}

/// Result type alias for ferrozip operations.
pub type Result<T> = std::result::Result<T, FerroZipError>;

impl FerroZipError {
    /// Create a structural error with no associated entry.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
            path: None,
        }
    }

    /// Create a structural error tied to an entry path.
    pub fn structural_at(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create an unsupported method error.
    pub fn unsupported_method(method: u16) -> Self {
        Self::UnsupportedMethod { method }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u32, computed: u32) -> Self {
        Self::CrcMismatch { expected, computed }
    }

    /// Create a size mismatch error.
    pub fn size_mismatch(expected: u64, actual: u64) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// True when this error carries a would-block signal from a
    /// non-blocking transport and the operation should be retried later.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FerroZipError::structural_at("method differs", "a/b.txt");
        assert!(err.to_string().contains("a/b.txt"));
        assert!(err.to_string().contains("method differs"));

        let err = FerroZipError::crc_mismatch(0x12345678, 0xDEADBEEF);
        assert!(err.to_string().contains("CRC mismatch"));

        let err = FerroZipError::unsupported_method(12);
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: FerroZipError = io_err.into();
        assert!(matches!(err, FerroZipError::Io(_)));
        assert!(!err.is_would_block());
    }

    #[test]
    fn test_would_block_is_distinguished() {
        let err: FerroZipError =
            io::Error::new(io::ErrorKind::WouldBlock, "try again").into();
        assert!(err.is_would_block());
    }
}
