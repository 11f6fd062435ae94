//! Register and bit addressing.
//!
//! Hardware manuals list holding registers with the conventional `4xxxx`
//! prefix. Transports only ever see zero-based indices, so documented
//! addresses go through [`documented`] first.

use std::fmt;

use crate::codec::MAX_BIT_INDEX;
use crate::error::{MotionError, MotionResult};

/// Base of the documented holding-register numbering.
pub const DOCUMENTED_BASE: u32 = 40000;

/// Convert a documented `4xxxx` address to a zero-based register index.
///
/// ```rust
/// use voltage_motion::address::documented;
///
/// assert_eq!(documented(42002).unwrap(), 2002);
/// assert!(documented(39999).is_err());
/// ```
pub fn documented(address: u32) -> MotionResult<u16> {
    let offset = address.checked_sub(DOCUMENTED_BASE).ok_or_else(|| {
        MotionError::invalid_address(format!(
            "{} is below the documented base {}",
            address, DOCUMENTED_BASE
        ))
    })?;
    u16::try_from(offset).map_err(|_| {
        MotionError::invalid_address(format!("{} is beyond the register space", address))
    })
}

/// Addresses of `count` consecutive registers starting at `start`.
///
/// Rejects spans that would run past register 65535.
pub fn span(start: u16, count: usize) -> MotionResult<Vec<u16>> {
    (0..count)
        .map(|i| {
            u16::try_from(i)
                .ok()
                .and_then(|i| start.checked_add(i))
                .ok_or_else(|| {
                    MotionError::invalid_address(format!(
                        "{} registers from {} run past the register space",
                        count, start
                    ))
                })
        })
        .collect()
}

/// A single flag: bit `bit` of holding register `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitAddress {
    register: u16,
    bit: u8,
}

impl BitAddress {
    pub fn new(register: u16, bit: u8) -> MotionResult<Self> {
        if bit > MAX_BIT_INDEX {
            return Err(MotionError::invalid_address(format!(
                "bit {} of register {} (must be 0-15)",
                bit, register
            )));
        }
        Ok(Self { register, bit })
    }

    pub fn register(&self) -> u16 {
        self.register
    }

    pub fn bit(&self) -> u8 {
        self.bit
    }

    /// Mask selecting this flag within its word.
    #[inline]
    pub fn mask(&self) -> u16 {
        1 << self.bit
    }
}

impl fmt::Display for BitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.register, self.bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented() {
        assert_eq!(documented(40000).unwrap(), 0);
        assert_eq!(documented(42073).unwrap(), 2073);
        assert_eq!(documented(40000 + 65535).unwrap(), 65535);
        assert!(documented(40000 + 65536).is_err());
        assert!(documented(0).is_err());
    }

    #[test]
    fn test_span() {
        assert_eq!(span(10, 2).unwrap(), vec![10, 11]);
        assert_eq!(span(65534, 2).unwrap(), vec![65534, 65535]);
        assert!(span(65535, 2).is_err());
        assert!(span(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_bit_address() {
        let flag = BitAddress::new(2000, 8).unwrap();
        assert_eq!(flag.mask(), 0x0100);
        assert_eq!(flag.to_string(), "2000.8");
        assert_eq!(flag.register(), 2000);
        assert_eq!(flag.bit(), 8);
        assert!(BitAddress::new(2000, 16).is_err());
        assert!(BitAddress::new(2000, u8::MAX).is_err());
    }
}
