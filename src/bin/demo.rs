//! Voltage Motion Demo
//!
//! Demonstrates the voltage_motion library features including:
//! - Register codec (bits, floats over two words, packed integers)
//! - A simulated station on the in-memory transport (relays, homing, moves, counting)
//! - Optionally, a real station over Modbus TCP
//!
//! Usage: cargo run --bin demo [server_address]
//! Example: cargo run --bin demo 192.168.0.50:502

use std::time::Duration;

use voltage_motion::codec::{decode_f32, encode_f32};
use voltage_motion::memory::{Operation, RegisterBank};
use voltage_motion::station::COUNTER_DONE_BITS;
use voltage_motion::{
    ByteOrder, LinkConfig, MemoryTransport, PackedLayout, PollConfig, SharedLink, Station,
    StationMap,
};

const CONTROL: u16 = 2000;
const MOTOR_CONTROLS: std::ops::RangeInclusive<u16> = 2002..=2006;

fn done_mask() -> u16 {
    COUNTER_DONE_BITS.iter().fold(0, |mask, bit| mask | 1 << bit)
}

/// Device behaviour for the reference station: homing and moves finish on the
/// next status poll, counting finishes after three polls.
fn station_simulator() -> impl FnMut(&Operation, &mut RegisterBank) + Send + 'static {
    let mut counting_polls = None::<u32>;
    move |op, bank| match *op {
        Operation::Write(address, word) if MOTOR_CONTROLS.contains(&address) => {
            if word & (1 << 1) != 0 {
                // move command drops "in position"
                bank.set(address, word & !(1 << 4));
            }
        }
        Operation::Read(address) if MOTOR_CONTROLS.contains(&address) => {
            let word = bank.get(address);
            let mut next = word;
            if word & (1 << 3) != 0 {
                next |= 1 << 5;
            }
            if word & (1 << 1) != 0 {
                next |= 1 << 4;
            }
            bank.set(address, next);
        }
        Operation::Write(CONTROL, word) => {
            let running = word & (1 << 8) != 0;
            if running && counting_polls.is_none() {
                counting_polls = Some(0);
            }
            if !running {
                counting_polls = None;
                bank.set(CONTROL, bank.get(CONTROL) & !done_mask());
            }
        }
        Operation::Read(CONTROL) => {
            if let Some(polls) = counting_polls.as_mut() {
                *polls += 1;
                if *polls == 3 {
                    bank.set(CONTROL, bank.get(CONTROL) | done_mask());
                    for channel in 0..COUNTER_DONE_BITS.len() as u16 {
                        bank.set(2030 + 2 * channel, 100 * (channel + 1));
                    }
                }
            }
        }
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Voltage Motion v{} Demo", voltage_motion::VERSION);
    println!("========================\n");

    // =========================================================================
    // Part 1: Register codec (no connection required)
    // =========================================================================
    println!("Part 1: Register Codec");
    println!("----------------------");

    let words = encode_f32(25.0, ByteOrder::BigEndian);
    println!("  25.0 -> {:04X} {:04X}", words[0], words[1]);
    for order in [ByteOrder::BigEndian, ByteOrder::BigEndianSwap] {
        println!("    {} -> {:.2}", order, decode_f32(words, order));
    }

    let layout = PackedLayout::new(2, 16)?;
    let parts = layout.pack(0x0003_0004)?;
    println!("  0x00030004 packed low word first -> {:04X?}", parts);
    println!("  unpacked -> {:#010X}", layout.unpack(&parts)?);

    // =========================================================================
    // Part 2: Simulated station
    // =========================================================================
    println!("\nPart 2: Simulated Station");
    println!("-------------------------");

    let link = SharedLink::new(MemoryTransport::new().with_hook(station_simulator()));
    let poll = PollConfig::new().with_interval(Duration::from_millis(20));
    let station = Station::new(link.clone(), &StationMap::reference()?, poll)?;

    station.relays[0].enable().await?;
    println!("  relay 0 enabled: {}", station.relays[0].is_enabled().await?);

    station.ys.home().await?;
    println!("  ys state after home: {}", station.ys.state().await?);

    let readback = station.ys.move_to(12.5).await?;
    println!(
        "  ys moved to {} (verified: {})",
        readback.actual(),
        readback.is_verified()
    );

    let measurement = station
        .counter
        .measure_detailed(Duration::from_millis(50))
        .await?;
    println!(
        "  counts {:?} after {} polls, {:?}",
        measurement.counts, measurement.polls, measurement.elapsed
    );

    let stats = link.stats().await;
    println!(
        "  transport: {} reads, {} writes, {} errors",
        stats.reads, stats.writes, stats.errors
    );

    // =========================================================================
    // Part 3: Real station (optional)
    // =========================================================================
    let Some(address) = std::env::args().nth(1) else {
        println!("\nPass a server address to talk to a real station.");
        return Ok(());
    };

    println!("\nPart 3: Station at {}", address);
    println!("----------------------");

    let config = LinkConfig::new().with_timeout(Duration::from_secs(2));
    match Station::connect(&address, config, PollConfig::new()).await {
        Ok(station) => {
            for (channel, analog) in station.analogs.iter().enumerate() {
                println!("  analog {}: {:.3}", channel, analog.read().await?);
            }
            for (name, motor) in station.motors() {
                println!("  {}: {}", name, motor.state().await?);
            }
        }
        Err(e) => println!("  connection failed: {}", e),
    }

    Ok(())
}
