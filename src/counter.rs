//! # Event Counter
//!
//! A bank of hardware counters sharing one start flag. A measurement programs
//! the count time, starts the bank, waits for the completion signal and reads
//! every channel.
//!
//! Hardware revisions differ in how the bank is laid out, so the layout is a
//! single [`CounterConfig`]:
//!
//! | Aspect | Options |
//! |--------|---------|
//! | Completion | one flag or one per channel, all must assert; either polarity |
//! | Count time | one shared float register or one per channel, milliseconds |
//! | Values | 16-bit or 32-bit per channel |
//!
//! ```rust
//! use voltage_motion::address::BitAddress;
//! use voltage_motion::counter::{CounterConfig, CountWidth, TimeRegisters};
//!
//! let config = CounterConfig::new(
//!     BitAddress::new(2000, 8).unwrap(),
//!     vec![BitAddress::new(2000, 9).unwrap(), BitAddress::new(2000, 10).unwrap()],
//!     TimeRegisters::PerChannel(vec![2073, 2075]),
//!     vec![2029, 2031],
//! )
//! .with_width(CountWidth::Dword);
//!
//! assert_eq!(config.channels(), 2);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::address::{span, BitAddress};
use crate::bytes::ByteOrder;
use crate::error::{MotionError, MotionResult};
use crate::poll::{wait_until, PollConfig};
use crate::register::{DwordRegister, FloatRegister, IntegerRegister, SignalLevel, Toggle};
use crate::transport::{RegisterTransport, SharedLink};

/// Where the count time is programmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeRegisters {
    /// One float register for the whole bank.
    Shared(u16),
    /// One float register per channel, in channel order.
    PerChannel(Vec<u16>),
}

impl TimeRegisters {
    fn addresses(&self) -> Vec<u16> {
        match self {
            Self::Shared(address) => vec![*address],
            Self::PerChannel(addresses) => addresses.clone(),
        }
    }
}

/// Width of each channel's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountWidth {
    /// One register.
    Word,
    /// Two registers.
    #[default]
    Dword,
}

/// Register layout of a counter bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    pub start: BitAddress,
    /// Flags that must all assert before the bank counts as finished.
    pub done: Vec<BitAddress>,
    pub done_level: SignalLevel,
    pub times: TimeRegisters,
    /// First register of each channel value.
    pub values: Vec<u16>,
    pub width: CountWidth,
    pub order: ByteOrder,
}

impl CounterConfig {
    pub fn new(
        start: BitAddress,
        done: Vec<BitAddress>,
        times: TimeRegisters,
        values: Vec<u16>,
    ) -> Self {
        Self {
            start,
            done,
            done_level: SignalLevel::ActiveHigh,
            times,
            values,
            width: CountWidth::Dword,
            order: ByteOrder::BigEndian,
        }
    }

    /// Completion reported as a "busy" flag that drops when counting ends.
    pub fn with_busy_flag(mut self, busy: BitAddress) -> Self {
        self.done = vec![busy];
        self.done_level = SignalLevel::ActiveLow;
        self
    }

    pub fn with_done_level(mut self, level: SignalLevel) -> Self {
        self.done_level = level;
        self
    }

    pub fn with_width(mut self, width: CountWidth) -> Self {
        self.width = width;
        self
    }

    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn channels(&self) -> usize {
        self.values.len()
    }

    pub fn validate(&self) -> MotionResult<()> {
        if self.values.is_empty() {
            return Err(MotionError::invalid_config("counter has no value registers"));
        }
        if self.done.is_empty() {
            return Err(MotionError::invalid_config("counter has no completion flag"));
        }
        if let TimeRegisters::PerChannel(times) = &self.times {
            if times.len() != self.values.len() {
                return Err(MotionError::invalid_config(format!(
                    "{} time registers for {} channels",
                    times.len(),
                    self.values.len()
                )));
            }
        }
        let words = match self.width {
            CountWidth::Word => 1,
            CountWidth::Dword => 2,
        };
        for &address in &self.values {
            span(address, words)?;
        }
        Ok(())
    }
}

/// Result of one measurement with timing diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub counts: Vec<u32>,
    /// Requested count time.
    pub duration: Duration,
    /// Wall clock at the start command.
    pub started_at: DateTime<Utc>,
    /// Start command to completion signal.
    pub elapsed: Duration,
    /// Completion samples taken.
    pub polls: u32,
}

#[derive(Debug, Clone)]
enum CountRegister<T> {
    Word(IntegerRegister<T>),
    Dword(DwordRegister<T>),
}

impl<T: RegisterTransport> CountRegister<T> {
    async fn read(&self) -> MotionResult<u32> {
        match self {
            Self::Word(register) => Ok(u32::from(register.read().await?)),
            Self::Dword(register) => register.read().await,
        }
    }
}

/// Counter bank controller.
#[derive(Debug, Clone)]
pub struct Counter<T> {
    start: Toggle<T>,
    done: Vec<Toggle<T>>,
    done_level: SignalLevel,
    times: Vec<FloatRegister<T>>,
    values: Vec<CountRegister<T>>,
    poll: PollConfig,
}

impl<T: RegisterTransport> Counter<T> {
    pub fn new(
        link: SharedLink<T>,
        config: CounterConfig,
        poll: PollConfig,
    ) -> MotionResult<Self> {
        config.validate()?;
        debug!(
            start = %config.start,
            channels = config.channels(),
            width = ?config.width,
            "counter configured"
        );

        let times = config
            .times
            .addresses()
            .into_iter()
            .map(|address| FloatRegister::with_order(link.clone(), address, config.order))
            .collect::<MotionResult<Vec<_>>>()?;
        let values = config
            .values
            .iter()
            .map(|&address| match config.width {
                CountWidth::Word => Ok(CountRegister::Word(IntegerRegister::new(
                    link.clone(),
                    address,
                ))),
                CountWidth::Dword => DwordRegister::with_order(link.clone(), address, config.order)
                    .map(CountRegister::Dword),
            })
            .collect::<MotionResult<Vec<_>>>()?;

        Ok(Self {
            start: Toggle::new(link.clone(), config.start),
            done: config
                .done
                .iter()
                .map(|&flag| Toggle::new(link.clone(), flag))
                .collect(),
            done_level: config.done_level,
            times,
            values,
            poll,
        })
    }

    pub fn channels(&self) -> usize {
        self.values.len()
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub async fn stop(&self) -> MotionResult<()> {
        debug!("counter stop");
        self.start.write(false).await?;
        Ok(())
    }

    pub async fn start(&self) -> MotionResult<()> {
        debug!("counter start");
        self.start.write(true).await?;
        Ok(())
    }

    /// True once every completion flag asserts.
    pub async fn is_done(&self) -> MotionResult<bool> {
        for flag in &self.done {
            if !flag.is_asserted(self.done_level).await? {
                debug!(flag = %flag.address(), "counter busy");
                return Ok(false);
            }
        }
        debug!("counter done");
        Ok(true)
    }

    /// Program the count time on every time register, whole milliseconds.
    pub async fn set_time(&self, duration: Duration) -> MotionResult<()> {
        let millis = duration.as_millis() as f32;
        debug!(millis, "counter set time");
        for register in &self.times {
            register.write(millis).await?;
        }
        Ok(())
    }

    pub async fn counts(&self) -> MotionResult<Vec<u32>> {
        let mut counts = Vec::with_capacity(self.values.len());
        for register in &self.values {
            counts.push(register.read().await?);
        }
        debug!(?counts, "counter values");
        Ok(counts)
    }

    /// Count for `duration` and return one value per channel.
    pub async fn measure(&self, duration: Duration) -> MotionResult<Vec<u32>> {
        Ok(self.measure_detailed(duration).await?.counts)
    }

    /// Count for `duration`, with timing diagnostics.
    ///
    /// The bank is stopped before programming and again after readout, and
    /// the time registers are left at zero. That cleanup also runs when the
    /// wait or the readout fails; its own errors are then only logged. The
    /// wait is bounded by the poll timeout plus `duration`.
    pub async fn measure_detailed(&self, duration: Duration) -> MotionResult<Measurement> {
        debug!(?duration, "counter measure");
        self.stop().await?;
        self.set_time(duration).await?;

        let started_at = Utc::now();
        let (counts, elapsed, polls) = match self.run(duration).await {
            Ok(run) => run,
            Err(e) => {
                if let Err(cleanup) = self.quiesce().await {
                    warn!(error = %cleanup, "counter cleanup after failed measurement");
                }
                return Err(e);
            }
        };
        self.quiesce().await?;

        Ok(Measurement {
            counts,
            duration,
            started_at,
            elapsed,
            polls,
        })
    }

    /// Start, wait for completion and read the values.
    async fn run(&self, duration: Duration) -> MotionResult<(Vec<u32>, Duration, u32)> {
        let started = Instant::now();
        self.start().await?;

        let wait = self.poll.extended_by(duration);
        let polls = wait_until("counter completion", &wait, move || self.is_done()).await?;
        let elapsed = started.elapsed();
        info!(
            requested_ms = duration.as_millis() as u64,
            taken_ms = elapsed.as_millis() as u64,
            polls,
            "counter measurement complete"
        );

        Ok((self.counts().await?, elapsed, polls))
    }

    /// Stop the bank and zero the time registers.
    async fn quiesce(&self) -> MotionResult<()> {
        self.stop().await?;
        self.set_time(Duration::ZERO).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_u32;
    use crate::memory::MemoryTransport;

    fn flag(register: u16, bit: u8) -> BitAddress {
        BitAddress::new(register, bit).unwrap()
    }

    fn two_channel() -> CounterConfig {
        CounterConfig::new(
            flag(10, 0),
            vec![flag(10, 1), flag(10, 2)],
            TimeRegisters::Shared(20),
            vec![30, 32],
        )
    }

    #[test]
    fn test_validate() {
        assert!(two_channel().validate().is_ok());

        let mut config = two_channel();
        config.values.clear();
        assert!(config.validate().is_err());

        let mut config = two_channel();
        config.done.clear();
        assert!(config.validate().is_err());

        let config = CounterConfig {
            times: TimeRegisters::PerChannel(vec![20]),
            ..two_channel()
        };
        assert!(matches!(
            config.validate(),
            Err(MotionError::InvalidConfig { .. })
        ));

        let config = CounterConfig {
            values: vec![u16::MAX],
            ..two_channel()
        };
        assert!(config.validate().is_err());
        assert!(config.with_width(CountWidth::Word).validate().is_ok());
    }

    #[tokio::test]
    async fn test_is_done_requires_every_flag() {
        let link = SharedLink::new(MemoryTransport::new().with_register(10, 0b010));
        let counter = Counter::new(link.clone(), two_channel(), PollConfig::new()).unwrap();
        assert!(!counter.is_done().await.unwrap());

        link.write(10, 0b110).await.unwrap();
        assert!(counter.is_done().await.unwrap());
    }

    #[tokio::test]
    async fn test_busy_flag_polarity() {
        let config = two_channel().with_busy_flag(flag(10, 5));
        let link = SharedLink::new(MemoryTransport::new().with_register(10, 1 << 5));
        let counter = Counter::new(link.clone(), config, PollConfig::new()).unwrap();
        assert!(!counter.is_done().await.unwrap());

        link.write(10, 0).await.unwrap();
        assert!(counter.is_done().await.unwrap());
    }

    #[tokio::test]
    async fn test_counts_word_and_dword() {
        let [high, low] = encode_u32(70_000, ByteOrder::BigEndian);
        let transport = MemoryTransport::new()
            .with_register(30, high)
            .with_register(31, low)
            .with_register(32, 0)
            .with_register(33, 9);
        let link = SharedLink::new(transport);

        let counter = Counter::new(link.clone(), two_channel(), PollConfig::new()).unwrap();
        assert_eq!(counter.counts().await.unwrap(), vec![70_000, 9]);

        let words = Counter::new(
            link,
            two_channel().with_width(CountWidth::Word),
            PollConfig::new(),
        )
        .unwrap();
        assert_eq!(words.counts().await.unwrap(), vec![u32::from(high), 0]);
    }

    #[tokio::test]
    async fn test_set_time_writes_every_register() {
        let config = CounterConfig {
            times: TimeRegisters::PerChannel(vec![20, 22]),
            ..two_channel()
        };
        let link = SharedLink::new(MemoryTransport::new());
        let counter = Counter::new(link.clone(), config, PollConfig::new()).unwrap();
        counter.set_time(Duration::from_millis(1500)).await.unwrap();

        let time = FloatRegister::new(link.clone(), 22).unwrap();
        assert_eq!(time.read().await.unwrap(), 1500.0);
        let time = FloatRegister::new(link, 20).unwrap();
        assert_eq!(time.read().await.unwrap(), 1500.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_timeout_stops_bank() {
        let link = SharedLink::new(MemoryTransport::new());
        let poll = PollConfig::new().with_timeout(Duration::from_millis(300));
        let counter = Counter::new(link.clone(), two_channel(), poll).unwrap();

        let err = counter
            .measure(Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!link.lock().await.bank().flag(flag(10, 0)));
        let time = FloatRegister::new(link, 20).unwrap();
        assert_eq!(time.read().await.unwrap(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_readout_failure_still_quiesces() {
        // done flags already up, first value register unreachable
        let transport = MemoryTransport::new()
            .with_register(10, 0b110)
            .with_faulty(30);
        let link = SharedLink::new(transport);
        let counter = Counter::new(link.clone(), two_channel(), PollConfig::new()).unwrap();

        let err = counter
            .measure(Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, MotionError::Transport { .. }));
        assert!(!link.lock().await.bank().flag(flag(10, 0)));
        let time = FloatRegister::new(link, 20).unwrap();
        assert_eq!(time.read().await.unwrap(), 0.0);
    }
}
