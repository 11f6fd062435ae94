//! # In-Memory Transport
//!
//! A register bank that stands in for real hardware. Every operation is
//! appended to a journal so tests can assert the exact order of reads and
//! writes, and an optional hook runs after each operation to emulate device
//! behaviour (flags that flip after a number of polls, moves that complete,
//! and so on).
//!
//! ```rust
//! use voltage_motion::memory::{MemoryTransport, Operation};
//! use voltage_motion::transport::RegisterTransport;
//!
//! # tokio_test::block_on(async {
//! let mut bank = MemoryTransport::new();
//! bank.write(3, 0x0102).await.unwrap();
//! assert_eq!(bank.read(3).await.unwrap(), 0x0102);
//! assert_eq!(bank.journal(), vec![Operation::Write(3, 0x0102), Operation::Read(3)]);
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::trace;

use crate::address::BitAddress;
use crate::codec::{decode_bit, encode_bit};
use crate::error::{MotionError, MotionResult};
use crate::transport::{RegisterTransport, TransportStats};

/// One transport round trip as seen by the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read(u16),
    /// Address and the word the caller asked to write.
    Write(u16, u16),
}

impl Operation {
    pub fn address(&self) -> u16 {
        match self {
            Self::Read(address) | Self::Write(address, _) => *address,
        }
    }
}

/// Register storage. Unwritten registers read as zero.
#[derive(Debug, Clone, Default)]
pub struct RegisterBank {
    words: HashMap<u16, u16>,
    pinned: HashSet<u16>,
}

impl RegisterBank {
    pub fn get(&self, address: u16) -> u16 {
        self.words.get(&address).copied().unwrap_or(0)
    }

    /// Store a word, bypassing the pinned check (device-side update).
    pub fn set(&mut self, address: u16, value: u16) {
        self.words.insert(address, value);
    }

    pub fn flag(&self, flag: BitAddress) -> bool {
        decode_bit(self.get(flag.register()), flag.bit())
    }

    pub fn set_flag(&mut self, flag: BitAddress, state: bool) {
        let word = encode_bit(self.get(flag.register()), flag.bit(), state);
        self.set(flag.register(), word);
    }

    fn write_from_client(&mut self, address: u16, value: u16) -> u16 {
        if !self.pinned.contains(&address) {
            self.words.insert(address, value);
        }
        self.get(address)
    }
}

type Hook = Box<dyn FnMut(&Operation, &mut RegisterBank) + Send>;

/// Register transport backed by a [`RegisterBank`].
#[derive(Default)]
pub struct MemoryTransport {
    bank: RegisterBank,
    journal: Vec<Operation>,
    hook: Option<Hook>,
    offline: bool,
    faulty: HashSet<u16>,
    stats: TransportStats,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a register before the run starts.
    pub fn with_register(mut self, address: u16, value: u16) -> Self {
        self.bank.set(address, value);
        self
    }

    /// Freeze a register at `value`; client writes are acknowledged but ignored.
    pub fn with_pinned(mut self, address: u16, value: u16) -> Self {
        self.bank.set(address, value);
        self.bank.pinned.insert(address);
        self
    }

    /// Install a device simulation hook, run after every successful operation.
    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Operation, &mut RegisterBank) + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Fail every round trip to `address` with a transport error.
    pub fn with_faulty(mut self, address: u16) -> Self {
        self.faulty.insert(address);
        self
    }

    /// When offline every round trip fails with a transport error.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut RegisterBank {
        &mut self.bank
    }

    /// Every operation performed so far, oldest first.
    pub fn journal(&self) -> Vec<Operation> {
        self.journal.clone()
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    fn record(&mut self, operation: Operation) -> MotionResult<()> {
        let address = operation.address();
        if self.offline || self.faulty.contains(&address) {
            self.stats.errors += 1;
            let reason = if self.offline {
                "transport offline"
            } else {
                "faulty register"
            };
            return Err(MotionError::transport(format!(
                "register {} unreachable: {}",
                address, reason
            )));
        }
        self.journal.push(operation);
        Ok(())
    }

    fn run_hook(&mut self, operation: &Operation) {
        if let Some(hook) = self.hook.as_mut() {
            hook(operation, &mut self.bank);
        }
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("bank", &self.bank)
            .field("operations", &self.journal.len())
            .field("hook", &self.hook.is_some())
            .field("offline", &self.offline)
            .field("faulty", &self.faulty)
            .finish()
    }
}

impl RegisterTransport for MemoryTransport {
    async fn read(&mut self, address: u16) -> MotionResult<u16> {
        self.stats.reads += 1;
        let operation = Operation::Read(address);
        self.record(operation)?;
        let value = self.bank.get(address);
        trace!(address, value, "memory read");
        self.run_hook(&operation);
        Ok(value)
    }

    async fn write(&mut self, address: u16, value: u16) -> MotionResult<u16> {
        self.stats.writes += 1;
        let operation = Operation::Write(address, value);
        self.record(operation)?;
        let echoed = self.bank.write_from_client(address, value);
        trace!(address, value, echoed, "memory write");
        self.run_hook(&operation);
        Ok(echoed)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unwritten_registers_read_zero() {
        let mut bank = MemoryTransport::new();
        assert_eq!(bank.read(1234).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pinned_register_ignores_writes() {
        let mut bank = MemoryTransport::new().with_pinned(9, 0x00AA);
        let echoed = bank.write(9, 0x0055).await.unwrap();
        assert_eq!(echoed, 0x00AA);
        assert_eq!(bank.read(9).await.unwrap(), 0x00AA);
    }

    #[tokio::test]
    async fn test_faulty_register_fails_alone() {
        let mut bank = MemoryTransport::new().with_faulty(5);
        assert!(bank.read(5).await.is_err());
        assert!(bank.write(5, 1).await.is_err());
        assert_eq!(bank.write(6, 1).await.unwrap(), 1);
        assert_eq!(bank.journal(), vec![Operation::Write(6, 1)]);
        assert_eq!(bank.stats().errors, 2);
    }

    #[tokio::test]
    async fn test_hook_sees_operations() {
        let flag = BitAddress::new(4, 2).unwrap();
        let mut polls = 0;
        let mut bank = MemoryTransport::new().with_hook(move |op, regs| {
            if *op == Operation::Read(4) {
                polls += 1;
                if polls == 2 {
                    regs.set_flag(flag, true);
                }
            }
        });

        assert_eq!(bank.read(4).await.unwrap(), 0);
        assert_eq!(bank.read(4).await.unwrap(), 0);
        assert_eq!(bank.read(4).await.unwrap(), 0b100);
        assert!(bank.bank().flag(flag));
    }

    #[tokio::test]
    async fn test_offline_fails_and_counts() {
        let mut bank = MemoryTransport::new();
        bank.set_offline(true);
        let err = bank.read(1).await.unwrap_err();
        assert!(err.is_transport());
        assert!(bank.journal().is_empty());
        assert_eq!(bank.stats().errors, 1);

        bank.set_offline(false);
        assert!(bank.write(1, 1).await.is_ok());
    }
}
