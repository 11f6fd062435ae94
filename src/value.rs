//! # Register Value Types
//!
//! Typed values carried by one or more holding registers, and the outcome of a
//! verified write.

use std::fmt;

use tracing::warn;

use crate::error::{MotionError, MotionResult};

/// Typed value stored in holding registers.
///
/// # Register Mapping
///
/// | Type | Registers | Description |
/// |------|-----------|-------------|
/// | Bool | 1 (one bit) | Flag within a word |
/// | U16 | 1 | Plain word |
/// | U32/F32 | 2 | Two consecutive registers |
/// | Packed | k | k words of a configurable bit width |
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterValue {
    /// Single bit within a word
    Bool(bool),
    /// Unsigned 16-bit integer (1 register)
    U16(u16),
    /// Unsigned 32-bit integer (2 registers)
    U32(u32),
    /// 32-bit floating point (2 registers)
    F32(f32),
    /// Multi-word packed integer
    Packed(u64),
}

impl RegisterValue {
    /// Bitwise equality, so that a NaN written and read back counts as verified.
    pub fn same_bits(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    /// Returns the type name as a string for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::F32(_) => "f32",
            Self::Packed(_) => "packed",
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::U16(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::Packed(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for RegisterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u16> for RegisterValue {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<u32> for RegisterValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<f32> for RegisterValue {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<u64> for RegisterValue {
    fn from(v: u64) -> Self {
        Self::Packed(v)
    }
}

/// Outcome of a write: what was asked for and what the hardware reported back.
///
/// A mismatch is not an error by itself. It is logged when observed and the
/// caller decides whether to care, either by inspecting [`Readback::actual`]
/// or by calling [`Readback::into_verified`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readback<T> {
    address: u16,
    requested: T,
    actual: T,
}

impl<T> Readback<T>
where
    T: Copy + Into<RegisterValue>,
{
    /// Record a write result, warning when the hardware disagrees.
    pub fn check(address: u16, requested: T, actual: T) -> Self {
        let readback = Self {
            address,
            requested,
            actual,
        };
        if !readback.is_verified() {
            let (requested, actual): (RegisterValue, RegisterValue) =
                (requested.into(), actual.into());
            warn!(
                address,
                %requested,
                %actual,
                kind = requested.type_name(),
                "write readback mismatch"
            );
        }
        readback
    }

    /// First register the value was written to.
    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn requested(&self) -> T {
        self.requested
    }

    /// Value the hardware reported after the write.
    pub fn actual(&self) -> T {
        self.actual
    }

    pub fn is_verified(&self) -> bool {
        let requested: RegisterValue = self.requested.into();
        requested.same_bits(&self.actual.into())
    }

    /// Strict form: a mismatch becomes [`MotionError::ReadbackMismatch`].
    pub fn into_verified(self) -> MotionResult<T> {
        if self.is_verified() {
            Ok(self.actual)
        } else {
            Err(MotionError::ReadbackMismatch {
                address: self.address,
                requested: self.requested.into(),
                actual: self.actual.into(),
            })
        }
    }
}
