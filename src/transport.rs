//! Register transport contract and the shared, locked link.
//!
//! A transport moves single 16-bit words to and from zero-based register
//! indices. It knows nothing about types, bits or devices. Implementations:
//!
//! - [`crate::link::ModbusTcpLink`] - Modbus TCP via `tokio-modbus` (feature `tcp`)
//! - [`crate::memory::MemoryTransport`] - in-process register bank
//!
//! Register abstractions never own a transport directly. They hold a clone of
//! [`SharedLink`], which serializes every round trip so that controllers
//! sharing one connection cannot interleave partial writes.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::MotionResult;

/// Raw single-register access.
pub trait RegisterTransport: Send {
    /// Read one holding register.
    fn read(&mut self, address: u16) -> impl Future<Output = MotionResult<u16>> + Send;

    /// Write one holding register and return the value the device reported.
    fn write(
        &mut self,
        address: u16,
        value: u16,
    ) -> impl Future<Output = MotionResult<u16>> + Send;

    /// Get transport statistics.
    fn stats(&self) -> TransportStats;
}

/// Transport layer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub reads: u64,
    pub writes: u64,
    pub errors: u64,
    pub timeouts: u64,
}

impl TransportStats {
    /// Total round trips attempted.
    pub fn requests(&self) -> u64 {
        self.reads + self.writes
    }
}

/// Transport handle shared by every register on one connection.
///
/// Cloning is cheap; all clones lock the same transport.
#[derive(Debug)]
pub struct SharedLink<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for SharedLink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RegisterTransport> SharedLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
        }
    }

    /// Exclusive access for a multi-step sequence.
    ///
    /// Nothing else reaches the transport until the guard is dropped.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    pub async fn read(&self, address: u16) -> MotionResult<u16> {
        self.lock().await.read(address).await
    }

    pub async fn write(&self, address: u16, value: u16) -> MotionResult<u16> {
        self.lock().await.write(address, value).await
    }

    /// Atomic read-modify-write of one register.
    ///
    /// Returns the word the device reported for the write.
    pub async fn update<F>(&self, address: u16, modify: F) -> MotionResult<u16>
    where
        F: FnOnce(u16) -> u16,
    {
        let mut transport = self.lock().await;
        let word = transport.read(address).await?;
        transport.write(address, modify(word)).await
    }

    pub async fn stats(&self) -> TransportStats {
        self.lock().await.stats()
    }
}
