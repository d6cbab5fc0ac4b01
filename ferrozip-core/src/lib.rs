//! # ferrozip core
//!
//! Core components for the ferrozip ZIP library.
//!
//! This crate provides the fundamental building blocks the container layer
//! is assembled from:
//!
//! - [`binary`]: little-endian fixed-width integer primitives
//! - [`crc`]: streaming CRC-32 accumulation
//! - [`dostime`]: the packed 32-bit DOS date-time format
//! - [`flags`]: the general-purpose bit flag field
//! - [`descriptor`]: the per-entry (CRC, sizes) data descriptor
//! - [`path`]: archive path normalization
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ferrozip is layered:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Container (ferrozip-archive)                        │
//! │     local/central records, entries, archive I/O         │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec pipeline (ferrozip-archive)                   │
//! │     Store/Deflate, traditional encryption, wrappers     │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Primitives (this crate)                             │
//! │     LE integers, CRC-32, DOS time, flags, descriptors   │
//! └─────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod binary;
pub mod crc;
pub mod descriptor;
pub mod dostime;
pub mod error;
pub mod flags;
pub mod path;

// Re-exports for convenience
pub use crc::Crc32;
pub use descriptor::DataDescriptor;
pub use dostime::DosDateTime;
pub use error::{FerroZipError, Result};
pub use flags::GeneralPurposeFlags;
pub use path::normalize_path;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::crc::Crc32;
    pub use crate::descriptor::DataDescriptor;
    pub use crate::dostime::DosDateTime;
    pub use crate::error::{FerroZipError, Result};
    pub use crate::flags::GeneralPurposeFlags;
    pub use crate::path::normalize_path;
}
