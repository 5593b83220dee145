//! Bit-packed boolean helpers for byte-oriented frames.
//!
//! Fieldbus frames pack up to eight digital channels into one byte. A
//! boolean point is addressed by its byte offset and a single-bit mask.
//!
//! ## Invariant
//!
//! [`write_bit`] is a read-modify-write on exactly one byte: the seven
//! sibling bits sharing that byte are never touched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a single bit inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitLocation {
    /// Byte offset from the start of the frame.
    pub byte_offset: usize,
    /// Bit index inside that byte (0 = LSB).
    pub bit_index: u8,
}

impl BitLocation {
    /// Create a location. Returns `None` if `bit_index > 7`.
    pub const fn new(byte_offset: usize, bit_index: u8) -> Option<Self> {
        if bit_index < 8 {
            Some(Self {
                byte_offset,
                bit_index,
            })
        } else {
            None
        }
    }

    /// One-of-eight selector mask for this bit.
    #[inline]
    pub const fn mask(&self) -> u8 {
        1u8 << self.bit_index
    }

    /// Absolute bit position (`byte_offset * 8 + bit_index`).
    pub const fn absolute(&self) -> usize {
        self.byte_offset * 8 + self.bit_index as usize
    }
}

impl fmt::Display for BitLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.byte_offset, self.bit_index)
    }
}

/// Read a masked bit from a byte.
#[inline]
pub const fn read_bit(byte: u8, mask: u8) -> bool {
    byte & mask != 0
}

/// Set or clear the masked bit in `byte`, leaving all other bits as they were.
#[inline]
pub fn write_bit(byte: &mut u8, mask: u8, value: bool) {
    if value {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_location_bounds() {
        assert!(BitLocation::new(0, 7).is_some());
        assert!(BitLocation::new(0, 8).is_none());
        let loc = BitLocation::new(2, 4).unwrap();
        assert_eq!(loc.mask(), 0b0001_0000);
        assert_eq!(loc.absolute(), 20);
        assert_eq!(loc.to_string(), "2.4");
    }

    #[test]
    fn set_then_read_back() {
        let mut byte = 0u8;
        write_bit(&mut byte, 0b0000_1000, true);
        assert!(read_bit(byte, 0b0000_1000));
        assert_eq!(byte, 0b0000_1000);
    }

    #[test]
    fn siblings_survive_toggle() {
        // All bits except bit 5 set; toggling bit 5 twice must leave the rest alone.
        let mask = 1u8 << 5;
        let mut byte = !mask;
        write_bit(&mut byte, mask, true);
        assert_eq!(byte, 0xFF);
        write_bit(&mut byte, mask, false);
        assert_eq!(byte, !mask);
    }

    #[test]
    fn every_bit_independent() {
        for bit in 0..8u8 {
            let mask = 1u8 << bit;
            let mut byte = 0xFFu8;
            write_bit(&mut byte, mask, false);
            assert_eq!(byte, 0xFF ^ mask, "bit {bit}");
            assert!(!read_bit(byte, mask));
        }
    }
}
