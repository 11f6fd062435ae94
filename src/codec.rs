//! # Register Codec
//!
//! Conversion between raw 16-bit register words and typed values.
//!
//! | Value | Words | Functions |
//! |-------|-------|-----------|
//! | bit flag | 1 | [`decode_bit`], [`encode_bit`] |
//! | f32 | 2 | [`decode_f32`], [`encode_f32`] |
//! | u32 | 2 | [`decode_u32`], [`encode_u32`] |
//! | packed integer | k | [`PackedLayout::unpack`], [`PackedLayout::pack`] |
//!
//! Everything here is pure; transport access lives in [`crate::register`].

use crate::bytes::{bytes_to_words, words_to_bytes, ByteOrder};
use crate::error::{MotionError, MotionResult};

/// Highest bit index within a register.
pub const MAX_BIT_INDEX: u8 = 15;

/// Read one flag out of a word. Bits past 15 read as clear.
#[inline]
pub fn decode_bit(word: u16, bit: u8) -> bool {
    word.checked_shr(u32::from(bit))
        .map_or(false, |shifted| shifted & 1 != 0)
}

/// Produce the word to write back after setting or clearing one flag.
///
/// The other fifteen bits are carried over unchanged. This is only the
/// "modify" step of a read-modify-write; callers must hold the link lock
/// across the whole sequence. Bits past 15 leave the word unchanged.
#[inline]
pub fn encode_bit(word: u16, bit: u8, state: bool) -> u16 {
    let Some(mask) = 1u16.checked_shl(u32::from(bit)) else {
        return word;
    };
    let cleared = word & !mask;
    if state {
        cleared | mask
    } else {
        cleared
    }
}

#[inline]
pub fn decode_f32(words: [u16; 2], order: ByteOrder) -> f32 {
    f32::from_be_bytes(words_to_bytes(words, order))
}

#[inline]
pub fn encode_f32(value: f32, order: ByteOrder) -> [u16; 2] {
    bytes_to_words(value.to_be_bytes(), order)
}

#[inline]
pub fn decode_u32(words: [u16; 2], order: ByteOrder) -> u32 {
    u32::from_be_bytes(words_to_bytes(words, order))
}

#[inline]
pub fn encode_u32(value: u32, order: ByteOrder) -> [u16; 2] {
    bytes_to_words(value.to_be_bytes(), order)
}

/// Geometry of a packed multi-word integer: `words` registers, each
/// contributing `width` bits, least significant word first.
///
/// The decoded value is `sum(part_i << (i * width))`.
///
/// # Example
///
/// ```rust
/// use voltage_motion::codec::PackedLayout;
///
/// let layout = PackedLayout::new(2, 16).unwrap();
/// assert_eq!(layout.pack(0x0003_0004).unwrap(), vec![0x0004, 0x0003]);
/// assert_eq!(layout.unpack(&[0x0004, 0x0003]).unwrap(), 0x0003_0004);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedLayout {
    words: usize,
    width: u8,
}

impl PackedLayout {
    /// Validate a layout. Width must be 1..=16 and the total must fit in 64 bits.
    pub fn new(words: usize, width: u8) -> MotionResult<Self> {
        if words == 0 {
            return Err(MotionError::invalid_config(
                "packed layout needs at least one word",
            ));
        }
        if width == 0 || width > 16 {
            return Err(MotionError::invalid_config(format!(
                "packed word width {} outside 1..=16",
                width
            )));
        }
        if words
            .checked_mul(usize::from(width))
            .map_or(true, |bits| bits > 64)
        {
            return Err(MotionError::invalid_config(format!(
                "{} words of {} bits exceed 64 bits",
                words, width
            )));
        }
        Ok(Self { words, width })
    }

    pub fn words(&self) -> usize {
        self.words
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Total number of value bits.
    pub fn total_bits(&self) -> u32 {
        self.words as u32 * u32::from(self.width)
    }

    /// Largest value the layout can represent.
    pub fn max_value(&self) -> u64 {
        match self.total_bits() {
            64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        }
    }

    #[inline]
    fn part_mask(&self) -> u16 {
        match self.width {
            16 => u16::MAX,
            width => (1u16 << width) - 1,
        }
    }

    /// Split a value into its words, least significant first.
    ///
    /// Fails with [`MotionError::PackedOverflow`] when bits would be left over
    /// after the last word.
    pub fn pack(&self, value: u64) -> MotionResult<Vec<u16>> {
        if value > self.max_value() {
            return Err(MotionError::PackedOverflow {
                value,
                words: self.words,
                width: self.width,
            });
        }
        let mask = u64::from(self.part_mask());
        let mut remaining = value;
        let mut parts = Vec::with_capacity(self.words);
        for _ in 0..self.words {
            parts.push((remaining & mask) as u16);
            remaining = remaining.checked_shr(u32::from(self.width)).unwrap_or(0);
        }
        debug_assert_eq!(remaining, 0);
        Ok(parts)
    }

    /// Reassemble words read from `addresses`.
    ///
    /// A word carrying bits above the configured width is rejected with
    /// [`MotionError::ValueTooWide`] naming the offending register.
    pub fn unpack_at(&self, addresses: &[u16], parts: &[u16]) -> MotionResult<u64> {
        if parts.len() != self.words {
            return Err(MotionError::invalid_config(format!(
                "packed layout expects {} words, got {}",
                self.words,
                parts.len()
            )));
        }
        let mask = self.part_mask();
        let mut value = 0u64;
        for (i, &part) in parts.iter().enumerate() {
            if part & mask != part {
                return Err(MotionError::ValueTooWide {
                    address: addresses.get(i).copied().unwrap_or(i as u16),
                    value: part,
                    width: self.width,
                });
            }
            value |= u64::from(part) << (i as u32 * u32::from(self.width));
        }
        Ok(value)
    }

    /// Reassemble words that are not tied to register addresses.
    pub fn unpack(&self, parts: &[u16]) -> MotionResult<u64> {
        self.unpack_at(&[], parts)
    }
}
