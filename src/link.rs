//! Modbus TCP transport.
//!
//! Framing, transaction IDs and function codes are handled by `tokio-modbus`;
//! this module only adapts its client to [`RegisterTransport`], adds a
//! per-request timeout and keeps statistics.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use voltage_motion::link::{LinkConfig, ModbusTcpLink};
//! use voltage_motion::transport::SharedLink;
//!
//! # async fn example() -> voltage_motion::MotionResult<()> {
//! let config = LinkConfig::new().with_timeout(Duration::from_secs(2));
//! let link = ModbusTcpLink::connect("192.168.0.50:502", config).await?;
//! let shared = SharedLink::new(link);
//! let word = shared.read(2000).await?;
//! # let _ = word;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::lookup_host;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Client, Context, Reader, Writer};
use tokio_modbus::Slave;
use tracing::{debug, info, warn};

use crate::error::{MotionError, MotionResult};
use crate::transport::{RegisterTransport, TransportStats};

/// Modbus TCP default port
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Default timeout for a single round trip (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Function code used for register reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFunction {
    /// 0x03 Read Holding Registers
    #[default]
    Holding,
    /// 0x04 Read Input Registers; some controllers only answer reads this way
    Input,
}

/// Connection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Modbus unit identifier.
    pub unit_id: u8,
    /// Bound on connect and on every single round trip.
    pub timeout: Duration,
    pub read_function: ReadFunction,
}

impl LinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_function(mut self, read_function: ReadFunction) -> Self {
        self.read_function = read_function;
        self
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            unit_id: 1,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            read_function: ReadFunction::Holding,
        }
    }
}

/// Register transport over a `tokio-modbus` TCP client context.
pub struct ModbusTcpLink {
    ctx: Context,
    address: SocketAddr,
    config: LinkConfig,
    stats: TransportStats,
}

impl ModbusTcpLink {
    /// Connect to `host:port`. A bare host gets the default Modbus port and
    /// host names are resolved, first address wins.
    pub async fn connect(address: &str, config: LinkConfig) -> MotionResult<Self> {
        let address = resolve_address(address).await?;
        let ctx = timeout(
            config.timeout,
            tcp::connect_slave(address, Slave(config.unit_id)),
        )
        .await
        .map_err(|_| {
            MotionError::connection(format!(
                "connect to {} timed out after {:?}",
                address, config.timeout
            ))
        })?
        .map_err(|e| MotionError::connection(format!("failed to connect to {}: {}", address, e)))?;

        info!(%address, unit_id = config.unit_id, "modbus link connected");
        Ok(Self {
            ctx,
            address,
            config,
            stats: TransportStats::default(),
        })
    }

    pub fn server_address(&self) -> SocketAddr {
        self.address
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub async fn close(&mut self) -> MotionResult<()> {
        self.ctx
            .disconnect()
            .await
            .map_err(|e| MotionError::transport(format!("disconnect failed: {}", e)))?;
        info!(address = %self.address, "modbus link closed");
        Ok(())
    }
}

impl fmt::Debug for ModbusTcpLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusTcpLink")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}

async fn resolve_address(address: &str) -> MotionResult<SocketAddr> {
    if let Ok(parsed) = address.parse::<SocketAddr>() {
        return Ok(parsed);
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_TCP_PORT));
    }
    let target = match address.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => address.to_string(),
        _ => format!("{}:{}", address, DEFAULT_TCP_PORT),
    };
    let mut resolved = lookup_host(&target).await.map_err(|e| {
        MotionError::connection(format!("cannot resolve {}: {}", address, e))
    })?;
    let first = resolved
        .next()
        .ok_or_else(|| MotionError::connection(format!("{} resolved to no address", address)))?;
    debug!(%address, resolved = %first, "server address resolved");
    Ok(first)
}

impl RegisterTransport for ModbusTcpLink {
    async fn read(&mut self, address: u16) -> MotionResult<u16> {
        self.stats.reads += 1;
        let words = match self.config.read_function {
            ReadFunction::Holding => {
                let request = self.ctx.read_holding_registers(address, 1);
                timeout(self.config.timeout, request).await
            }
            ReadFunction::Input => {
                let request = self.ctx.read_input_registers(address, 1);
                timeout(self.config.timeout, request).await
            }
        };
        let words = self.settle("read", address, words)?;
        let value = words.first().copied().ok_or_else(|| {
            self.stats.errors += 1;
            MotionError::transport(format!("empty response reading register {}", address))
        })?;
        debug!(address, value, "register read");
        Ok(value)
    }

    async fn write(&mut self, address: u16, value: u16) -> MotionResult<u16> {
        self.stats.writes += 1;
        let request = self.ctx.write_single_register(address, value);
        let outcome = timeout(self.config.timeout, request).await;
        self.settle("write", address, outcome)?;
        debug!(address, value, "register written");
        // tokio-modbus validates the echo before reporting success
        Ok(value)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}

impl ModbusTcpLink {
    /// Flatten timeout, transport and exception layers into one result.
    fn settle<R>(
        &mut self,
        what: &str,
        address: u16,
        outcome: Result<tokio_modbus::Result<R>, tokio::time::error::Elapsed>,
    ) -> MotionResult<R> {
        let result = match outcome {
            Err(_) => {
                self.stats.timeouts += 1;
                Err(MotionError::transport(format!(
                    "{} of register {} timed out after {:?}",
                    what, address, self.config.timeout
                )))
            }
            Ok(Err(e)) => Err(MotionError::transport(format!(
                "{} of register {} failed: {}",
                what, address, e
            ))),
            Ok(Ok(Err(code))) => Err(MotionError::exception(format!(
                "{} of register {} rejected: {:?}",
                what, address, code
            ))),
            Ok(Ok(Ok(value))) => Ok(value),
        };
        if let Err(ref e) = result {
            self.stats.errors += 1;
            warn!(address, error = %e, "modbus request failed");
        }
        result
    }
}
