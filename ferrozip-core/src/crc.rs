//! Streaming CRC-32 accumulation (ISO 3309, as used by ZIP).
//!
//! Every stream wrapper in the workspace feeds each chunk of payload through
//! a [`Crc32`] as it passes by. The accumulated value only equals the entry
//! checksum once *all* bytes have traversed the wrapper; reading a prefix and
//! calling [`Crc32::value`] yields the checksum of that prefix, nothing more.

/// Incremental CRC-32 calculator.
///
/// # Example
///
/// ```
/// use ferrozip_core::crc::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"Hello, ");
/// crc.update(b"World!");
/// assert_eq!(crc.value(), 0xEC4AC3D0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the accumulator to its initial state.
    pub fn reset(&mut self) {
        self.hasher.reset();
    }

    /// Feed more data through the accumulator.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Current checksum of everything fed so far.
    ///
    /// Non-destructive; updating after this call continues the same stream.
    #[inline]
    pub fn value(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Compute the CRC-32 of a slice in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.value()
    }
}
