//! # Word and Byte Order
//!
//! How two consecutive 16-bit registers combine into one 32-bit value.
//!
//! Uses ABCD notation, A being the most significant byte. For `0x12345678`
//! held in registers `[r0, r1]`:
//!
//! | Order | r0 | r1 |
//! |-------|----|----|
//! | `BigEndian` (ABCD) | 0x1234 | 0x5678 |
//! | `LittleEndian` (DCBA) | 0x7856 | 0x3412 |
//! | `BigEndianSwap` (CDAB) | 0x5678 | 0x1234 |
//! | `LittleEndianSwap` (BADC) | 0x3412 | 0x7856 |
//!
//! The motion controllers this crate targets store floats and counters as
//! ABCD: the register at the lower address carries the high half.

use std::fmt;
use std::str::FromStr;

use crate::error::MotionError;

/// Layout of a 32-bit value across two registers.
///
/// # Example
///
/// ```rust
/// use voltage_motion::ByteOrder;
///
/// let order: ByteOrder = "CDAB".parse().unwrap();
/// assert_eq!(order, ByteOrder::BigEndianSwap);
/// assert!(order.has_word_swap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// ABCD, lower register holds the high word.
    #[default]
    BigEndian,
    /// DCBA, fully byte-reversed.
    LittleEndian,
    /// CDAB, lower register holds the low word.
    BigEndianSwap,
    /// BADC, bytes swapped inside each word.
    LittleEndianSwap,
}

impl ByteOrder {
    /// Get descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD (Big-Endian)",
            Self::LittleEndian => "DCBA (Little-Endian)",
            Self::BigEndianSwap => "CDAB (Big-Endian Swap)",
            Self::LittleEndianSwap => "BADC (Little-Endian Swap)",
        }
    }

    /// Check if words are swapped relative to their natural position.
    #[inline]
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::BigEndianSwap | Self::LittleEndianSwap)
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ByteOrder {
    type Err = MotionError;

    /// Accepts "ABCD", "AB-CD", "BE", "DCBA", "LE", "CDAB", "BADC" and the
    /// spelled-out `BIG_ENDIAN[_SWAP]` / `LITTLE_ENDIAN[_SWAP]` forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "ABCD" | "BE" | "BIGENDIAN" => Ok(Self::BigEndian),
            "DCBA" | "LE" | "LITTLEENDIAN" => Ok(Self::LittleEndian),
            "CDAB" | "BIGENDIANSWAP" => Ok(Self::BigEndianSwap),
            "BADC" | "LITTLEENDIANSWAP" => Ok(Self::LittleEndianSwap),
            _ => Err(MotionError::invalid_config(format!(
                "unknown byte order: {}",
                s
            ))),
        }
    }
}

/// Lay two registers out as the big-endian byte image of the 32-bit value.
#[inline]
pub fn words_to_bytes(words: [u16; 2], order: ByteOrder) -> [u8; 4] {
    let [a, b] = [words[0].to_be_bytes(), words[1].to_be_bytes()];
    match order {
        ByteOrder::BigEndian => [a[0], a[1], b[0], b[1]],
        ByteOrder::LittleEndian => [b[1], b[0], a[1], a[0]],
        ByteOrder::BigEndianSwap => [b[0], b[1], a[0], a[1]],
        ByteOrder::LittleEndianSwap => [a[1], a[0], b[1], b[0]],
    }
}

/// Inverse of [`words_to_bytes`].
#[inline]
pub fn bytes_to_words(bytes: [u8; 4], order: ByteOrder) -> [u16; 2] {
    let [a, b, c, d] = bytes;
    match order {
        ByteOrder::BigEndian => [u16::from_be_bytes([a, b]), u16::from_be_bytes([c, d])],
        ByteOrder::LittleEndian => [u16::from_be_bytes([d, c]), u16::from_be_bytes([b, a])],
        ByteOrder::BigEndianSwap => [u16::from_be_bytes([c, d]), u16::from_be_bytes([a, b])],
        ByteOrder::LittleEndianSwap => [u16::from_be_bytes([b, a]), u16::from_be_bytes([d, c])],
    }
}
