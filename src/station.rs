//! # Station Topology
//!
//! Address table and controller set of the reference motion station: eight
//! relays, four analog inputs, a four-channel counter bank and five motor
//! axes on one Modbus unit.
//!
//! Addresses below are the documented ones (40000 based). They are resolved
//! to register indices with [`documented`] when the map is built.
//!
//! | Item | Documented address | Layout |
//! |------|--------------------|--------|
//! | Relays | 42000 | bits 0..7 |
//! | Counter start | 42000 | bit 8 |
//! | Counter done | 42000 | bits 9..12, one per channel |
//! | Motor control words | 42002..42006 | enable 0, move 1, home 3, in position 4, homed 5 |
//! | Analog inputs | 42013, 42017, 42021, 42025 | float |
//! | Counter values | 42029..42035 | dword, one per channel |
//! | Motor positions | 42037..42061 | float, every 6 registers |
//! | Counter times | 42073..42079 | float ms, one per channel |

use tracing::info;

use crate::address::{documented, BitAddress};
use crate::analog::Analog;
use crate::counter::{CountWidth, Counter, CounterConfig, TimeRegisters};
use crate::error::MotionResult;
use crate::motor::{Motor, MotorAddresses};
use crate::poll::PollConfig;
use crate::register::SignalLevel;
use crate::relay::Relay;
use crate::transport::{RegisterTransport, SharedLink};

/// Relay and counter control word.
pub const CONTROL_WORD: u32 = 42000;

pub const RELAY_COUNT: u8 = 8;
pub const COUNTER_START_BIT: u8 = 8;
pub const COUNTER_DONE_BITS: [u8; 4] = [9, 10, 11, 12];

pub const ANALOG_INPUTS: [u32; 4] = [42013, 42017, 42021, 42025];
pub const COUNTER_VALUES: [u32; 4] = [42029, 42031, 42033, 42035];
pub const COUNTER_TIMES: [u32; 4] = [42073, 42075, 42077, 42079];

/// Axis names in table order.
pub const AXIS_NAMES: [&str; 5] = ["ys", "ya", "zs", "th1", "th2"];

/// Control word and position register per axis, in [`AXIS_NAMES`] order.
pub const MOTORS: [(u32, u32); 5] = [
    (42002, 42037),
    (42003, 42043),
    (42004, 42049),
    (42005, 42055),
    (42006, 42061),
];

const MOTOR_ENABLE_BIT: u8 = 0;
const MOTOR_MOVE_BIT: u8 = 1;
const MOTOR_HOME_BIT: u8 = 3;
const MOTOR_IN_POSITION_BIT: u8 = 4;
const MOTOR_HOMED_BIT: u8 = 5;

/// Resolved register map of a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationMap {
    pub relays: Vec<BitAddress>,
    pub analogs: Vec<u16>,
    pub counter: CounterConfig,
    /// In [`AXIS_NAMES`] order.
    pub motors: [MotorAddresses; 5],
}

impl StationMap {
    /// The table of the reference station.
    pub fn reference() -> MotionResult<Self> {
        let control = documented(CONTROL_WORD)?;

        let relays = (0..RELAY_COUNT)
            .map(|bit| BitAddress::new(control, bit))
            .collect::<MotionResult<Vec<_>>>()?;
        let analogs = resolve(&ANALOG_INPUTS)?;

        let done = COUNTER_DONE_BITS
            .iter()
            .map(|&bit| BitAddress::new(control, bit))
            .collect::<MotionResult<Vec<_>>>()?;
        let counter = CounterConfig::new(
            BitAddress::new(control, COUNTER_START_BIT)?,
            done,
            TimeRegisters::PerChannel(resolve(&COUNTER_TIMES)?),
            resolve(&COUNTER_VALUES)?,
        )
        .with_width(CountWidth::Dword);

        Ok(Self {
            relays,
            analogs,
            counter,
            motors: [
                axis(MOTORS[0])?,
                axis(MOTORS[1])?,
                axis(MOTORS[2])?,
                axis(MOTORS[3])?,
                axis(MOTORS[4])?,
            ],
        })
    }
}

fn axis((control, position): (u32, u32)) -> MotionResult<MotorAddresses> {
    let word = documented(control)?;
    let bit = |b| BitAddress::new(word, b);
    Ok(MotorAddresses::new(
        bit(MOTOR_ENABLE_BIT)?,
        bit(MOTOR_HOME_BIT)?,
        bit(MOTOR_HOMED_BIT)?,
        bit(MOTOR_MOVE_BIT)?,
        bit(MOTOR_IN_POSITION_BIT)?,
        documented(position)?,
    )
    .with_moving_level(SignalLevel::ActiveLow))
}

fn resolve(addresses: &[u32]) -> MotionResult<Vec<u16>> {
    addresses.iter().map(|&a| documented(a)).collect()
}

/// All controllers of one station, sharing a single link.
#[derive(Debug, Clone)]
pub struct Station<T> {
    link: SharedLink<T>,
    pub relays: Vec<Relay<T>>,
    pub analogs: Vec<Analog<T>>,
    pub counter: Counter<T>,
    pub ys: Motor<T>,
    pub ya: Motor<T>,
    pub zs: Motor<T>,
    pub th1: Motor<T>,
    pub th2: Motor<T>,
}

impl<T: RegisterTransport> Station<T> {
    pub fn new(link: SharedLink<T>, map: &StationMap, poll: PollConfig) -> MotionResult<Self> {
        let relays = map
            .relays
            .iter()
            .map(|&flag| Relay::new(link.clone(), flag))
            .collect();
        let analogs = map
            .analogs
            .iter()
            .map(|&address| Analog::new(link.clone(), address))
            .collect::<MotionResult<Vec<_>>>()?;
        let counter = Counter::new(link.clone(), map.counter.clone(), poll)?;
        let [ys, ya, zs, th1, th2] = map.motors;
        let motor = |addresses| Motor::new(link.clone(), addresses, poll);

        let station = Self {
            ys: motor(ys)?,
            ya: motor(ya)?,
            zs: motor(zs)?,
            th1: motor(th1)?,
            th2: motor(th2)?,
            relays,
            analogs,
            counter,
            link: link.clone(),
        };
        info!(
            relays = station.relays.len(),
            analogs = station.analogs.len(),
            channels = station.counter.channels(),
            "station ready"
        );
        Ok(station)
    }

    pub fn link(&self) -> &SharedLink<T> {
        &self.link
    }

    /// Axes paired with their names, in table order.
    pub fn motors(&self) -> [(&'static str, &Motor<T>); 5] {
        [
            (AXIS_NAMES[0], &self.ys),
            (AXIS_NAMES[1], &self.ya),
            (AXIS_NAMES[2], &self.zs),
            (AXIS_NAMES[3], &self.th1),
            (AXIS_NAMES[4], &self.th2),
        ]
    }

    pub fn motor(&self, name: &str) -> Option<&Motor<T>> {
        self.motors()
            .into_iter()
            .find(|(axis, _)| *axis == name)
            .map(|(_, motor)| motor)
    }
}

#[cfg(feature = "tcp")]
impl Station<crate::link::ModbusTcpLink> {
    /// Connect to a station over Modbus TCP using the reference map.
    pub async fn connect(
        address: &str,
        config: crate::link::LinkConfig,
        poll: PollConfig,
    ) -> MotionResult<Self> {
        let link = crate::link::ModbusTcpLink::connect(address, config).await?;
        Self::new(SharedLink::new(link), &StationMap::reference()?, poll)
    }
}
