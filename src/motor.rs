//! # Motor Axis
//!
//! One axis driven through command flags and watched through status flags.
//!
//! ```text
//! Idle --start_home--> Homing --homed--> Homed --start_move--> Moving --in position--> Idle
//! ```
//!
//! Two ways to drive it:
//!
//! - Blocking: [`Motor::home`] and [`Motor::move_to`] issue the command and
//!   poll until the axis reports completion.
//! - Split: [`Motor::start_home`] / [`Motor::start_move`] return right after
//!   the command, [`Motor::is_homing`] / [`Motor::is_moving`] query progress,
//!   [`Motor::wait_home`] / [`Motor::wait_move`] finish the operation.
//!
//! Every command clears both command flags before raising its own, so a
//! home and a move are never requested together. Waits clear the command
//! flag once the axis reports completion. A wait that times out leaves the
//! command flag set.
//!
//! The homed status stays up on real drives, so [`Motor::state`] reports
//! `Homed` only until the next move is started through this handle (or any
//! clone of it). After that a settled axis is `Idle`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::address::BitAddress;
use crate::bytes::ByteOrder;
use crate::error::{MotionError, MotionResult};
use crate::poll::{wait_until, PollConfig};
use crate::register::{FloatRegister, SignalLevel, Toggle};
use crate::transport::{RegisterTransport, SharedLink};
use crate::value::Readback;

/// Register layout of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorAddresses {
    /// Drive enable.
    pub enable: BitAddress,
    /// Home command.
    pub home: BitAddress,
    /// Homed status.
    pub homed: BitAddress,
    /// Move command.
    pub move_cmd: BitAddress,
    /// Moving status.
    pub moving: BitAddress,
    pub moving_level: SignalLevel,
    /// Target position, float over two registers.
    pub position: u16,
    pub order: ByteOrder,
}

impl MotorAddresses {
    pub fn new(
        enable: BitAddress,
        home: BitAddress,
        homed: BitAddress,
        move_cmd: BitAddress,
        moving: BitAddress,
        position: u16,
    ) -> Self {
        Self {
            enable,
            home,
            homed,
            move_cmd,
            moving,
            moving_level: SignalLevel::ActiveHigh,
            position,
            order: ByteOrder::BigEndian,
        }
    }

    /// Polarity of the moving status. Drives that report "in position"
    /// instead of "moving" use [`SignalLevel::ActiveLow`].
    pub fn with_moving_level(mut self, level: SignalLevel) -> Self {
        self.moving_level = level;
        self
    }

    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }
}

/// Axis state derived from the hardware flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisState {
    Idle,
    Homing,
    Homed,
    Moving,
}

impl fmt::Display for AxisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Homing => "homing",
            Self::Homed => "homed",
            Self::Moving => "moving",
        };
        f.write_str(name)
    }
}

/// Motor axis controller.
#[derive(Debug)]
pub struct Motor<T> {
    enable: Toggle<T>,
    home: Toggle<T>,
    homed: Toggle<T>,
    move_cmd: Toggle<T>,
    moving: Toggle<T>,
    moving_level: SignalLevel,
    position: FloatRegister<T>,
    poll: PollConfig,
    /// A move was started since the last home command.
    moved: Arc<AtomicBool>,
}

impl<T> Clone for Motor<T> {
    fn clone(&self) -> Self {
        Self {
            enable: self.enable.clone(),
            home: self.home.clone(),
            homed: self.homed.clone(),
            move_cmd: self.move_cmd.clone(),
            moving: self.moving.clone(),
            moving_level: self.moving_level,
            position: self.position.clone(),
            poll: self.poll,
            moved: Arc::clone(&self.moved),
        }
    }
}

impl<T: RegisterTransport> Motor<T> {
    pub fn new(
        link: SharedLink<T>,
        addresses: MotorAddresses,
        poll: PollConfig,
    ) -> MotionResult<Self> {
        debug!(
            enable = %addresses.enable,
            home = %addresses.home,
            homed = %addresses.homed,
            move_cmd = %addresses.move_cmd,
            moving = %addresses.moving,
            position = addresses.position,
            "motor configured"
        );
        Ok(Self {
            position: FloatRegister::with_order(
                link.clone(),
                addresses.position,
                addresses.order,
            )?,
            enable: Toggle::new(link.clone(), addresses.enable),
            home: Toggle::new(link.clone(), addresses.home),
            homed: Toggle::new(link.clone(), addresses.homed),
            move_cmd: Toggle::new(link.clone(), addresses.move_cmd),
            moving: Toggle::new(link, addresses.moving),
            moving_level: addresses.moving_level,
            poll,
            moved: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub async fn enable(&self) -> MotionResult<()> {
        self.enable.write(true).await?;
        Ok(())
    }

    pub async fn disable(&self) -> MotionResult<()> {
        self.enable.write(false).await?;
        Ok(())
    }

    pub async fn is_enabled(&self) -> MotionResult<bool> {
        self.enable.read().await
    }

    /// Enable the drive and drop any pending command.
    async fn prepare(&self) -> MotionResult<()> {
        self.enable.write(true).await?;
        self.home.write(false).await?;
        self.move_cmd.write(false).await?;
        Ok(())
    }

    // Homing

    /// Home and wait until the axis reports homed.
    pub async fn home(&self) -> MotionResult<()> {
        self.start_home().await?;
        self.wait_home().await
    }

    /// Raise the home command without waiting.
    pub async fn start_home(&self) -> MotionResult<()> {
        debug!(home = %self.home.address(), "motor start home");
        self.prepare().await?;
        self.moved.store(false, Ordering::Release);
        self.home.write(true).await?;
        Ok(())
    }

    pub async fn is_homed(&self) -> MotionResult<bool> {
        let homed = self.homed.read().await?;
        debug!(homed, "motor homed status");
        Ok(homed)
    }

    /// Home command raised and the axis not yet homed.
    pub async fn is_homing(&self) -> MotionResult<bool> {
        Ok(self.home.read().await? && !self.is_homed().await?)
    }

    pub async fn wait_home(&self) -> MotionResult<()> {
        let homed = &self.homed;
        let samples = wait_until("homing", &self.poll, move || homed.read()).await?;
        self.home.write(false).await?;
        debug!(samples, "motor homed");
        Ok(())
    }

    // Moving

    /// Move to `position` and wait until the axis is in position.
    ///
    /// Returns the position readback from the set point register.
    pub async fn move_to(&self, position: f32) -> MotionResult<Readback<f32>> {
        let readback = self.start_move(position).await?;
        self.wait_move().await?;
        Ok(readback)
    }

    /// Program the set point and raise the move command without waiting.
    pub async fn start_move(&self, position: f32) -> MotionResult<Readback<f32>> {
        debug!(position, "motor start move");
        self.prepare().await?;
        let readback = self.position.write(position).await?;
        self.moved.store(true, Ordering::Release);
        self.move_cmd.write(true).await?;
        Ok(readback)
    }

    pub async fn is_moving(&self) -> MotionResult<bool> {
        let moving = self.moving.is_asserted(self.moving_level).await?;
        debug!(moving, "motor moving status");
        Ok(moving)
    }

    pub async fn wait_move(&self) -> MotionResult<()> {
        let samples = wait_until("move", &self.poll, move || async move {
            Ok::<_, MotionError>(!self.is_moving().await?)
        })
        .await?;
        self.move_cmd.write(false).await?;
        debug!(samples, "motor in position");
        Ok(())
    }

    /// Current set point.
    pub async fn target(&self) -> MotionResult<f32> {
        self.position.read().await
    }

    /// Derive the axis state from the command and status flags.
    ///
    /// `Homed` holds from homing completion until a move is started.
    pub async fn state(&self) -> MotionResult<AxisState> {
        let state = if self.is_moving().await? {
            AxisState::Moving
        } else if self.is_homed().await? && !self.moved.load(Ordering::Acquire) {
            AxisState::Homed
        } else if self.home.read().await? {
            AxisState::Homing
        } else {
            AxisState::Idle
        };
        debug!(%state, "motor state");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryTransport, Operation};

    const CONTROL: u16 = 2002;

    fn addresses() -> MotorAddresses {
        let bit = |b| BitAddress::new(CONTROL, b).unwrap();
        MotorAddresses::new(bit(0), bit(3), bit(5), bit(1), bit(4), 2037)
    }

    fn motor(
        transport: MemoryTransport,
    ) -> (SharedLink<MemoryTransport>, Motor<MemoryTransport>) {
        let link = SharedLink::new(transport);
        let motor = Motor::new(link.clone(), addresses(), PollConfig::new()).unwrap();
        (link, motor)
    }

    #[tokio::test]
    async fn test_start_home_clears_move_command() {
        let (link, motor) = motor(MemoryTransport::new().with_register(CONTROL, 0b0000_0010));
        motor.start_home().await.unwrap();

        // enable set, move cleared, home set
        assert_eq!(link.read(CONTROL).await.unwrap(), 0b0000_1001);
        assert!(motor.is_homing().await.unwrap());
        assert_eq!(motor.state().await.unwrap(), AxisState::Homing);
    }

    #[tokio::test]
    async fn test_start_move_writes_position_before_command() {
        let (link, motor) = motor(MemoryTransport::new());
        let readback = motor.start_move(12.5).await.unwrap();
        assert!(readback.is_verified());
        assert_eq!(motor.target().await.unwrap(), 12.5);

        let journal = link.lock().await.journal();
        let position_write = journal
            .iter()
            .position(|op| matches!(op, Operation::Write(2037, _)))
            .unwrap();
        let command_write = journal
            .iter()
            .rposition(|op| *op == Operation::Write(CONTROL, 0b0000_0011))
            .unwrap();
        assert!(position_write < command_write);
    }

    #[tokio::test]
    async fn test_state_from_flags() {
        let (link, motor) = motor(MemoryTransport::new());
        assert_eq!(motor.state().await.unwrap(), AxisState::Idle);

        link.write(CONTROL, 1 << 5).await.unwrap();
        assert_eq!(motor.state().await.unwrap(), AxisState::Homed);

        link.write(CONTROL, 1 << 4).await.unwrap();
        assert_eq!(motor.state().await.unwrap(), AxisState::Moving);
    }

    #[tokio::test]
    async fn test_active_low_moving() {
        let link = SharedLink::new(MemoryTransport::new());
        let motor = Motor::new(
            link.clone(),
            addresses().with_moving_level(SignalLevel::ActiveLow),
            PollConfig::new(),
        )
        .unwrap();

        assert!(motor.is_moving().await.unwrap());
        link.write(CONTROL, 1 << 4).await.unwrap();
        assert!(!motor.is_moving().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_home_timeout_keeps_command() {
        let link = SharedLink::new(MemoryTransport::new());
        let poll = PollConfig::new().with_timeout(std::time::Duration::from_millis(500));
        let motor = Motor::new(link.clone(), addresses(), poll).unwrap();

        let err = motor.home().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(motor.state().await.unwrap(), AxisState::Homing);
    }

    #[tokio::test]
    async fn test_homed_gives_way_to_idle_after_move() {
        let (link, motor) = motor(MemoryTransport::new());
        // homed and in position
        link.write(CONTROL, 1 << 5).await.unwrap();
        assert_eq!(motor.state().await.unwrap(), AxisState::Homed);

        motor.start_move(3.0).await.unwrap();
        link.update(CONTROL, |word| word & !0b10).await.unwrap();
        assert_eq!(motor.state().await.unwrap(), AxisState::Idle);

        // a clone shares the history, a new home resets it
        let clone = motor.clone();
        assert_eq!(clone.state().await.unwrap(), AxisState::Idle);
        motor.start_home().await.unwrap();
        assert_eq!(clone.state().await.unwrap(), AxisState::Homed);
    }

    #[test]
    fn test_axis_state_display() {
        assert_eq!(AxisState::Homing.to_string(), "homing");
        assert_eq!(AxisState::Idle.to_string(), "idle");
    }
}
