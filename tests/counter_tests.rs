//! Counter bank against a simulated device.

use std::time::Duration;

use tokio_test::assert_ok;
use voltage_motion::counter::{CountWidth, TimeRegisters};
use voltage_motion::memory::{Operation, RegisterBank};
use voltage_motion::{
    BitAddress, Counter, CounterConfig, FloatRegister, MemoryTransport, PollConfig, SharedLink,
};

const CONTROL: u16 = 10;
const STATUS: u16 = 11;
const TIME: u16 = 20;

fn bit(register: u16, bit: u8) -> BitAddress {
    BitAddress::new(register, bit).unwrap()
}

fn config() -> CounterConfig {
    CounterConfig::new(
        bit(CONTROL, 0),
        vec![bit(STATUS, 0), bit(STATUS, 1)],
        TimeRegisters::Shared(TIME),
        vec![30, 32],
    )
}

/// Device that raises every done flag after `busy_polls` status reads and
/// loads `counts` into the value registers at that moment.
fn device(
    busy_polls: u32,
    counts: Vec<(u16, u16)>,
) -> impl FnMut(&Operation, &mut RegisterBank) + Send + 'static {
    let mut reads = None::<u32>;
    move |op, bank| match *op {
        Operation::Write(CONTROL, word) => {
            if word & 1 != 0 {
                reads.get_or_insert(0);
            } else {
                reads = None;
                bank.set(STATUS, 0);
            }
        }
        Operation::Read(STATUS) => {
            if let Some(count) = reads.as_mut() {
                *count += 1;
                if *count == busy_polls {
                    bank.set(STATUS, 0b11);
                    for &(address, value) in &counts {
                        bank.set(address, value);
                    }
                }
            }
        }
        _ => {}
    }
}

#[tokio::test(start_paused = true)]
async fn test_measure_sequence() {
    let transport = MemoryTransport::new().with_hook(device(2, vec![(31, 7), (32, 1), (33, 2)]));
    let link = SharedLink::new(transport);
    let counter = Counter::new(link.clone(), config(), PollConfig::new()).unwrap();

    let measurement = counter
        .measure_detailed(Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(measurement.counts, vec![7, 0x0001_0002]);
    assert_eq!(measurement.polls, 3);
    assert_eq!(measurement.duration, Duration::from_millis(500));

    // 500.0 = 0x43FA0000
    let expected = vec![
        // stop
        Operation::Read(CONTROL),
        Operation::Write(CONTROL, 0),
        // program time, verify
        Operation::Write(TIME, 0x43FA),
        Operation::Write(TIME + 1, 0x0000),
        Operation::Read(TIME),
        Operation::Read(TIME + 1),
        // start
        Operation::Read(CONTROL),
        Operation::Write(CONTROL, 1),
        // three completion samples, the last one reads both flags
        Operation::Read(STATUS),
        Operation::Read(STATUS),
        Operation::Read(STATUS),
        Operation::Read(STATUS),
        // readout
        Operation::Read(30),
        Operation::Read(31),
        Operation::Read(32),
        Operation::Read(33),
        // stop, zero time
        Operation::Read(CONTROL),
        Operation::Write(CONTROL, 0),
        Operation::Write(TIME, 0),
        Operation::Write(TIME + 1, 0),
        Operation::Read(TIME),
        Operation::Read(TIME + 1),
    ];
    assert_eq!(link.lock().await.journal(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_measure_leaves_bank_quiescent() {
    let transport = MemoryTransport::new().with_hook(device(1, vec![(31, 5)]));
    let link = SharedLink::new(transport);
    let counter = Counter::new(link.clone(), config(), PollConfig::new()).unwrap();

    let counts = assert_ok!(counter.measure(Duration::from_millis(100)).await);
    assert_eq!(counts, vec![5, 0]);

    let bank = link.lock().await.bank().clone();
    assert!(!bank.flag(bit(CONTROL, 0)));
    let time = FloatRegister::new(link, TIME).unwrap();
    assert_eq!(time.read().await.unwrap(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_busy_flag_word_counts() {
    // single busy flag that drops when counting ends, 16-bit values
    let busy = bit(STATUS, 4);
    let config = config()
        .with_busy_flag(busy)
        .with_width(CountWidth::Word);
    let mut polls = 0;
    let transport = MemoryTransport::new()
        .with_register(STATUS, 1 << 4)
        .with_hook(move |op, bank| {
            if *op == Operation::Read(STATUS) {
                polls += 1;
                if polls == 3 {
                    bank.set_flag(busy, false);
                    bank.set(30, 11);
                    bank.set(32, 22);
                }
            }
        });
    let counter = Counter::new(SharedLink::new(transport), config, PollConfig::new()).unwrap();

    let measurement = counter
        .measure_detailed(Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(measurement.counts, vec![11, 22]);
    assert_eq!(measurement.polls, 4);
}

#[tokio::test(start_paused = true)]
async fn test_wait_bound_includes_count_time() {
    // done arrives after 30 polls (about 3 s); bound is 1 s plus a 5 s count
    let transport = MemoryTransport::new().with_hook(device(30, vec![]));
    let poll = PollConfig::new().with_timeout(Duration::from_secs(1));
    let counter = Counter::new(SharedLink::new(transport), config(), poll).unwrap();

    assert_ok!(counter.measure(Duration::from_secs(5)).await);
}
