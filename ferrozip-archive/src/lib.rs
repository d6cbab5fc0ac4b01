//! # ferrozip archive
//!
//! The container layer of ferrozip: ZIP records, the entry model, the
//! codec pipeline, and the [`Archive`] orchestrator.
//!
//! ## Reading
//!
//! ```no_run
//! use ferrozip_archive::Archive;
//! use std::fs::File;
//!
//! # fn main() -> ferrozip_core::Result<()> {
//! let mut archive = Archive::read(File::open("bundle.zip")?)?;
//! for path in archive.paths().map(String::from).collect::<Vec<_>>() {
//!     let bytes = archive.read_entry(&path, None)?;
//!     println!("{}: {} bytes", path, bytes.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Writing
//!
//! ```no_run
//! use ferrozip_archive::{Archive, Entry};
//! use std::fs::File;
//!
//! # fn main() -> ferrozip_core::Result<()> {
//! let mut archive = Archive::create(File::create("bundle.zip")?);
//! archive.add(Entry::file_bytes("hello.txt", b"hello\n".to_vec())?)?;
//! archive.add(Entry::directory("docs")?)?;
//! archive.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Scope notes: 32-bit offsets and sizes only (no Zip64), single-disk
//! archives, and the traditional stream cipher as the only encryption
//! scheme.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod codec;
pub mod entry;
pub mod extra;
pub mod records;
pub mod stream;

pub use archive::Archive;
pub use codec::{Compression, Encryption};
pub use entry::{Entry, EntryKind, Password};
pub use extra::{ExtendedTimestamp, ExtraField, ExtraFields, UnixOwnership};
pub use stream::Window;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::archive::Archive;
    pub use crate::codec::{Compression, Encryption};
    pub use crate::entry::{Entry, EntryKind, Password};
    pub use ferrozip_core::prelude::*;
}
