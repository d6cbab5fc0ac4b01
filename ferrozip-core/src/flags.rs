//! Typed accessor over the 16-bit general-purpose bit flag field.
//!
//! Only three regions of the field have meaning for this implementation:
//! bit 0 (entry is encrypted), bits 1-2 (deflate compression-level hint),
//! and bit 3 (a trailing data descriptor follows the payload). All 16 bits
//! round-trip losslessly regardless.

/// Bit 0: the entry payload is encrypted.
const ENCRYPTED: u16 = 0x0001;
/// Bit 3: sizes/CRC live in a trailing data descriptor, not the local header.
const DATA_DESCRIPTOR: u16 = 0x0008;
/// Bits 1-2: coarse compression-level hint.
const LEVEL_MASK: u16 = 0x0006;
const LEVEL_SHIFT: u16 = 1;

/// The general-purpose flags word from a local or central header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneralPurposeFlags(u16);

impl GeneralPurposeFlags {
    /// Wrap a raw flags word. Never fails; unknown bits are preserved.
    pub fn from_u16(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw 16-bit value for serialization.
    pub fn to_u16(self) -> u16 {
        self.0
    }

    /// Whether the encrypted bit is set.
    pub fn encrypted(self) -> bool {
        self.0 & ENCRYPTED != 0
    }

    /// Set or clear the encrypted bit.
    pub fn set_encrypted(&mut self, on: bool) {
        self.set(ENCRYPTED, on);
    }

    /// Whether a trailing data descriptor follows the payload.
    pub fn data_descriptor_follows(self) -> bool {
        self.0 & DATA_DESCRIPTOR != 0
    }

    /// Set or clear the trailing-descriptor bit.
    pub fn set_data_descriptor_follows(&mut self, on: bool) {
        self.set(DATA_DESCRIPTOR, on);
    }

    /// The 2-bit compression-level hint (0 normal, 1 maximum, 2 fast,
    /// 3 super-fast).
    pub fn compression_level(self) -> u8 {
        ((self.0 & LEVEL_MASK) >> LEVEL_SHIFT) as u8
    }

    /// Store a 2-bit compression-level hint. Values above 3 are masked.
    pub fn set_compression_level(&mut self, level: u8) {
        self.0 = (self.0 & !LEVEL_MASK) | (((level as u16) << LEVEL_SHIFT) & LEVEL_MASK);
    }

    /// In-place bitwise OR with another flags word.
    ///
    /// Used when a codec's own flags must combine with an orchestrator-level
    /// requirement such as "the sink is not seekable".
    pub fn merge(&mut self, other: GeneralPurposeFlags) {
        self.0 |= other.0;
    }

    fn set(&mut self, bit: u16, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}
