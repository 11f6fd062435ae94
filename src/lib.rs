//! # Voltage Motion - Modbus Register Layer for Motion Hardware
//!
//! Typed register access and device controllers for motion and counting
//! hardware reached over Modbus TCP.
//!
//! ## Features
//!
//! - **Register Codec**: bits, 32-bit floats and integers over two words, packed N-word integers
//! - **Register Abstractions**: typed read/write with write readback verification
//! - **Device Controllers**: motors (homing and moves), counter banks, relays, analog inputs
//! - **Shared Link**: one locked transport per connection, atomic read-modify-write of flags
//! - **Bounded Waits**: polling with configurable interval and timeout
//! - **Testable**: in-memory transport with operation journal and device simulation hook
//!
//! ## Layers
//!
//! | Layer | Modules |
//! |-------|---------|
//! | Controllers | [`motor`], [`counter`], [`relay`], [`analog`], [`station`] |
//! | Registers | [`register`], [`poll`] |
//! | Codec | [`codec`], [`bytes`], [`value`], [`address`] |
//! | Transport | [`transport`], [`memory`], `link` (feature `tcp`) |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_motion::link::LinkConfig;
//! use voltage_motion::{MotionResult, PollConfig, Station};
//!
//! #[tokio::main]
//! async fn main() -> MotionResult<()> {
//!     let station = Station::connect("192.168.0.50:502", LinkConfig::new(), PollConfig::new()).await?;
//!
//!     station.relays[0].enable().await?;
//!
//!     station.ys.home().await?;
//!     station.ys.move_to(25.0).await?;
//!
//!     let counts = station.counter.measure(std::time::Duration::from_millis(500)).await?;
//!     println!("Counts: {:?}", counts);
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Typed register values and write readback
pub mod value;

/// Byte order handling for two-register values
pub mod bytes;

/// Register codec: bits, two-word values, packed integers
pub mod codec;

/// Register and bit addresses
pub mod address;

// ============================================================================
// Transport
// ============================================================================

/// Register transport contract and shared link
pub mod transport;

/// In-memory register bank transport
pub mod memory;

/// Modbus TCP transport
#[cfg(feature = "tcp")]
pub mod link;

// ============================================================================
// Registers and controllers
// ============================================================================

/// Typed register handles
pub mod register;

/// Timeout-bounded polling
pub mod poll;

pub mod analog;
pub mod counter;
pub mod motor;
pub mod relay;

/// Reference station address map and controller set
pub mod station;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use voltage_motion::tokio) ===
pub use tokio;

// === Error handling ===
pub use error::{MotionError, MotionResult};

// === Core types ===
pub use address::BitAddress;
pub use bytes::ByteOrder;
pub use codec::PackedLayout;
pub use value::{Readback, RegisterValue};

// === Transport ===
pub use memory::MemoryTransport;
pub use transport::{RegisterTransport, SharedLink, TransportStats};

#[cfg(feature = "tcp")]
pub use link::{LinkConfig, ModbusTcpLink};

// === Registers ===
pub use poll::PollConfig;
pub use register::{
    DwordRegister, FloatRegister, IntegerRegister, PackedRegister, SignalLevel, Toggle,
};

// === Controllers ===
pub use analog::Analog;
pub use counter::{Counter, CounterConfig, Measurement};
pub use motor::{AxisState, Motor, MotorAddresses};
pub use relay::Relay;
pub use station::{Station, StationMap};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "Voltage Motion v{} - Modbus register layer for motion hardware",
        VERSION
    )
}
