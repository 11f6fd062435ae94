//! # Error Types
//!
//! Every failure the register layer and the controllers can produce.
//!
//! | Condition | Variant | Raised by |
//! |-----------|---------|-----------|
//! | Connect failed | `Connection` | TCP link |
//! | Round trip failed or timed out | `Transport` | any transport |
//! | Device answered with an exception | `Exception` | TCP link |
//! | Address outside the register space | `InvalidAddress` | address helpers, register constructors |
//! | Bad geometry or controller layout | `InvalidConfig` | constructors |
//! | Packed part wider than its word width | `ValueTooWide` | packed decode |
//! | Packed value does not fit its words | `PackedOverflow` | packed encode |
//! | Write readback differs (strict mode only) | `ReadbackMismatch` | `Readback::into_verified` |
//! | Completion signal never arrived | `WaitTimeout` | polling loops |

use std::time::Duration;

use thiserror::Error;

use crate::value::RegisterValue;

/// Result alias used across the crate.
pub type MotionResult<T> = Result<T, MotionError>;

/// Errors produced by register access and device control.
#[derive(Debug, Clone, Error)]
pub enum MotionError {
    /// The transport could not establish its connection.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A single read or write round trip failed.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The device rejected the request with a Modbus exception.
    #[error("Device exception: {message}")]
    Exception { message: String },

    /// Address cannot be mapped onto the 16-bit register space.
    #[error("Invalid address: {message}")]
    InvalidAddress { message: String },

    /// Register geometry or controller layout is inconsistent.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A packed word reported more bits than the layout allows.
    #[error("Register {address} holds {value:#06x}, too wide for {width} bits")]
    ValueTooWide { address: u16, value: u16, width: u8 },

    /// A value needs more words than the packed layout provides.
    #[error("Value {value:#x} does not fit in {words} words of {width} bits")]
    PackedOverflow { value: u64, words: usize, width: u8 },

    /// Hardware readback after a write differs from the requested value.
    #[error("Readback mismatch at register {address}: wrote {requested}, read {actual}")]
    ReadbackMismatch {
        address: u16,
        requested: RegisterValue,
        actual: RegisterValue,
    },

    /// A polling wait exceeded its bound.
    #[error("Timed out after {waited:?} waiting for {operation}")]
    WaitTimeout {
        operation: &'static str,
        waited: Duration,
    },
}

impl MotionError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self::Exception {
            message: message.into(),
        }
    }

    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// True for failures of the underlying round trip.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Transport { .. } | Self::Exception { .. }
        )
    }

    /// True when a wait loop gave up.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(MotionError::transport("reset by peer").is_transport());
        assert!(MotionError::connection("refused").is_transport());
        assert!(!MotionError::invalid_config("bad").is_transport());

        let timeout = MotionError::WaitTimeout {
            operation: "homing",
            waited: Duration::from_secs(2),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_transport());
    }

    #[test]
    fn test_display() {
        let err = MotionError::ValueTooWide {
            address: 12,
            value: 0x1FF,
            width: 8,
        };
        assert_eq!(err.to_string(), "Register 12 holds 0x01ff, too wide for 8 bits");

        let err = MotionError::ReadbackMismatch {
            address: 7,
            requested: RegisterValue::U16(5),
            actual: RegisterValue::U16(4),
        };
        assert_eq!(
            err.to_string(),
            "Readback mismatch at register 7: wrote 5, read 4"
        );
    }
}
