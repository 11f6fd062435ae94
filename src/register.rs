//! # Register Abstractions
//!
//! Typed handles bound to one or more register addresses on a [`SharedLink`].
//!
//! | Type | Registers | Write discipline |
//! |------|-----------|------------------|
//! | [`Toggle`] | 1 bit | read-modify-write under the link lock |
//! | [`IntegerRegister`] | 1 | single write, device echo returned |
//! | [`FloatRegister`] | 2 | write both words, re-read, compare |
//! | [`DwordRegister`] | 2 | write both words, re-read, compare |
//! | [`PackedRegister`] | k | write every word, re-read, compare |
//!
//! Handles carry only their geometry. All state lives in the device, so the
//! same register may be wrapped more than once without coordination.
//!
//! Every write returns a [`Readback`] with the value the hardware reported.
//! A mismatch is logged and handed back, not raised.
//!
//! ```rust
//! use voltage_motion::memory::MemoryTransport;
//! use voltage_motion::register::{FloatRegister, Toggle};
//! use voltage_motion::transport::SharedLink;
//! use voltage_motion::address::BitAddress;
//!
//! # tokio_test::block_on(async {
//! let link = SharedLink::new(MemoryTransport::new());
//!
//! let position = FloatRegister::new(link.clone(), 2037).unwrap();
//! let written = position.write(12.5).await.unwrap();
//! assert!(written.is_verified());
//!
//! let enable = Toggle::new(link.clone(), BitAddress::new(2002, 0).unwrap());
//! enable.write(true).await.unwrap();
//! assert!(enable.read().await.unwrap());
//! # });
//! ```

use tracing::debug;

use crate::address::{span, BitAddress};
use crate::bytes::ByteOrder;
use crate::codec::{
    decode_bit, decode_f32, decode_u32, encode_bit, encode_f32, encode_u32, PackedLayout,
};
use crate::error::MotionResult;
use crate::transport::{RegisterTransport, SharedLink};
use crate::value::Readback;

/// Which flag state means "asserted" for a status signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalLevel {
    #[default]
    ActiveHigh,
    /// Asserted when the bit reads 0.
    ActiveLow,
}

impl SignalLevel {
    pub fn is_asserted(&self, bit: bool) -> bool {
        match self {
            Self::ActiveHigh => bit,
            Self::ActiveLow => !bit,
        }
    }
}

/// Single boolean flag within a word.
#[derive(Debug)]
pub struct Toggle<T> {
    link: SharedLink<T>,
    flag: BitAddress,
}

impl<T> Clone for Toggle<T> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            flag: self.flag,
        }
    }
}

impl<T: RegisterTransport> Toggle<T> {
    pub fn new(link: SharedLink<T>, flag: BitAddress) -> Self {
        Self { link, flag }
    }

    pub fn address(&self) -> BitAddress {
        self.flag
    }

    pub async fn read(&self) -> MotionResult<bool> {
        let word = self.link.read(self.flag.register()).await?;
        Ok(decode_bit(word, self.flag.bit()))
    }

    /// Set or clear the flag, leaving the other fifteen bits untouched.
    ///
    /// The read and the write happen under one link lock, so concurrent
    /// toggles on the same word cannot lose each other's updates.
    pub async fn write(&self, state: bool) -> MotionResult<Readback<bool>> {
        let (register, bit) = (self.flag.register(), self.flag.bit());
        let echoed = self
            .link
            .update(register, |word| encode_bit(word, bit, state))
            .await?;
        Ok(Readback::check(register, state, decode_bit(echoed, bit)))
    }

    /// Read the flag through a polarity.
    pub async fn is_asserted(&self, level: SignalLevel) -> MotionResult<bool> {
        Ok(level.is_asserted(self.read().await?))
    }
}

/// Plain 16-bit register, no transformation.
#[derive(Debug, Clone)]
pub struct IntegerRegister<T> {
    link: SharedLink<T>,
    address: u16,
}

impl<T: RegisterTransport> IntegerRegister<T> {
    pub fn new(link: SharedLink<T>, address: u16) -> Self {
        Self { link, address }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub async fn read(&self) -> MotionResult<u16> {
        self.link.read(self.address).await
    }

    pub async fn write(&self, value: u16) -> MotionResult<Readback<u16>> {
        let echoed = self.link.write(self.address, value).await?;
        Ok(Readback::check(self.address, value, echoed))
    }
}

/// Two consecutive registers, shared by the f32 and u32 views.
#[derive(Debug)]
struct WordPair<T> {
    link: SharedLink<T>,
    address: u16,
    order: ByteOrder,
}

impl<T> Clone for WordPair<T> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            address: self.address,
            order: self.order,
        }
    }
}

impl<T: RegisterTransport> WordPair<T> {
    fn new(link: SharedLink<T>, address: u16, order: ByteOrder) -> MotionResult<Self> {
        span(address, 2)?;
        Ok(Self {
            link,
            address,
            order,
        })
    }

    async fn read(&self) -> MotionResult<[u16; 2]> {
        let mut transport = self.link.lock().await;
        let first = transport.read(self.address).await?;
        let second = transport.read(self.address + 1).await?;
        Ok([first, second])
    }

    /// Write the first register, then the second, then read both back.
    async fn write(&self, words: [u16; 2]) -> MotionResult<[u16; 2]> {
        let mut transport = self.link.lock().await;
        transport.write(self.address, words[0]).await?;
        transport.write(self.address + 1, words[1]).await?;
        let first = transport.read(self.address).await?;
        let second = transport.read(self.address + 1).await?;
        Ok([first, second])
    }
}

/// IEEE-754 single-precision float over two registers.
#[derive(Debug)]
pub struct FloatRegister<T> {
    pair: WordPair<T>,
}

impl<T> Clone for FloatRegister<T> {
    fn clone(&self) -> Self {
        Self {
            pair: self.pair.clone(),
        }
    }
}

impl<T: RegisterTransport> FloatRegister<T> {
    /// ABCD layout: the register at `address` holds the high half.
    pub fn new(link: SharedLink<T>, address: u16) -> MotionResult<Self> {
        Self::with_order(link, address, ByteOrder::BigEndian)
    }

    pub fn with_order(link: SharedLink<T>, address: u16, order: ByteOrder) -> MotionResult<Self> {
        Ok(Self {
            pair: WordPair::new(link, address, order)?,
        })
    }

    pub fn address(&self) -> u16 {
        self.pair.address
    }

    pub async fn read(&self) -> MotionResult<f32> {
        let words = self.pair.read().await?;
        Ok(decode_f32(words, self.pair.order))
    }

    pub async fn write(&self, value: f32) -> MotionResult<Readback<f32>> {
        let words = encode_f32(value, self.pair.order);
        let readback = self.pair.write(words).await?;
        let actual = decode_f32(readback, self.pair.order);
        debug!(address = self.pair.address, value, actual, "float written");
        Ok(Readback::check(self.pair.address, value, actual))
    }
}

/// Unsigned 32-bit integer over two registers.
#[derive(Debug, Clone)]
pub struct DwordRegister<T> {
    pair: WordPair<T>,
}

impl<T: RegisterTransport> DwordRegister<T> {
    /// ABCD layout: the register at `address` holds the high half.
    pub fn new(link: SharedLink<T>, address: u16) -> MotionResult<Self> {
        Self::with_order(link, address, ByteOrder::BigEndian)
    }

    pub fn with_order(link: SharedLink<T>, address: u16, order: ByteOrder) -> MotionResult<Self> {
        Ok(Self {
            pair: WordPair::new(link, address, order)?,
        })
    }

    pub fn address(&self) -> u16 {
        self.pair.address
    }

    pub async fn read(&self) -> MotionResult<u32> {
        let words = self.pair.read().await?;
        Ok(decode_u32(words, self.pair.order))
    }

    pub async fn write(&self, value: u32) -> MotionResult<Readback<u32>> {
        let words = encode_u32(value, self.pair.order);
        let readback = self.pair.write(words).await?;
        let actual = decode_u32(readback, self.pair.order);
        debug!(address = self.pair.address, value, actual, "dword written");
        Ok(Readback::check(self.pair.address, value, actual))
    }
}

/// Integer packed across arbitrary registers, least significant word first.
///
/// Addresses need not be consecutive; word `i` of the layout lives at
/// `addresses[i]`.
#[derive(Debug, Clone)]
pub struct PackedRegister<T> {
    link: SharedLink<T>,
    addresses: Vec<u16>,
    layout: PackedLayout,
}

impl<T: RegisterTransport> PackedRegister<T> {
    pub fn new(link: SharedLink<T>, addresses: Vec<u16>, width: u8) -> MotionResult<Self> {
        let layout = PackedLayout::new(addresses.len(), width)?;
        Ok(Self {
            link,
            addresses,
            layout,
        })
    }

    /// `words` consecutive registers starting at `start`.
    pub fn contiguous(
        link: SharedLink<T>,
        start: u16,
        words: usize,
        width: u8,
    ) -> MotionResult<Self> {
        Self::new(link, span(start, words)?, width)
    }

    pub fn addresses(&self) -> &[u16] {
        &self.addresses
    }

    pub fn layout(&self) -> PackedLayout {
        self.layout
    }

    async fn read_parts(transport: &mut T, addresses: &[u16]) -> MotionResult<Vec<u16>> {
        let mut parts = Vec::with_capacity(addresses.len());
        for &address in addresses {
            parts.push(transport.read(address).await?);
        }
        Ok(parts)
    }

    /// Fails with `ValueTooWide` if any word exceeds the layout width.
    pub async fn read(&self) -> MotionResult<u64> {
        let parts = {
            let mut transport = self.link.lock().await;
            Self::read_parts(&mut transport, &self.addresses).await?
        };
        self.layout.unpack_at(&self.addresses, &parts)
    }

    /// Fails with `PackedOverflow` before touching the device if `value`
    /// does not fit the layout.
    ///
    /// A readback word wider than the layout fails with `ValueTooWide`
    /// instead of producing a [`Readback`], since the stored value cannot
    /// be decoded. Other mismatches come back as an unverified readback.
    pub async fn write(&self, value: u64) -> MotionResult<Readback<u64>> {
        let parts = self.layout.pack(value)?;
        let readback = {
            let mut transport = self.link.lock().await;
            for (&address, &part) in self.addresses.iter().zip(&parts) {
                transport.write(address, part).await?;
            }
            Self::read_parts(&mut transport, &self.addresses).await?
        };
        let actual = self.layout.unpack_at(&self.addresses, &readback)?;
        let first = self.addresses.first().copied().unwrap_or_default();
        Ok(Readback::check(first, value, actual))
    }
}
