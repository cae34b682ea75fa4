// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A board support package with no board: composes `hal-core`'s generic
//! types over the simulated chip and runs them, the way a real board's
//! `main` composes the same types over a `drv-<chip>` crate.
//!
//! Run with `cargo run -p demo-board --features chip-sim`.

use hal_chip_sim::{
    Channel, Domain, Line, Pad, Port, SimClocks, SimGpio, SimInterrupts, SimUart, UartConfig,
};
use hal_core::chip::ClockDomainQuery;
use hal_core::freq::Hertz;
use hal_core::gpio::{Bus, Config, Output};
use hal_core::jtag::{JtagAdapter, State};
use hal_core::shared_ledger;
use hal_core::uart::UartFrontend;

shared_ledger!(PADS: Pad, 32);

struct StdoutLogger;

impl log::Log for StdoutLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }
    fn log(&self, record: &log::Record<'_>) {
        std::println!("[{}] {}", record.level(), record.args());
    }
    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

fn main() {
    log::set_logger(&LOGGER).expect("logger installed exactly once");
    log::set_max_level(log::LevelFilter::Info);

    log::info!(
        "ahb clock: {}",
        Hertz(<SimClocks as ClockDomainQuery<Domain>>::frequency_hz(Domain::Ahb))
    );

    let leds: Bus<SimGpio, 4, Output> = Bus::init(
        [
            Pad::new(Port::A, 4),
            Pad::new(Port::A, 5),
            Pad::new(Port::A, 6),
            Pad::new(Port::A, 7),
        ],
        Config {
            slew: hal_chip_sim::SlewRate,
            drive: hal_chip_sim::DriveMode,
            termination: hal_chip_sim::TerminationMode,
        },
        "leds",
        &PADS,
    );
    leds.modify(0b0101);
    log::info!("leds: {:#06b}", leds.get());

    SimInterrupts::set_enabled(Line::Dma(Channel(0)), true);
    log::info!("dma0 interrupt enabled: {}", SimInterrupts::is_pending(Line::Dma(Channel(0))));

    let mut uart = UartFrontend::new(SimUart);
    uart.init(UartConfig { baud_rate: 115_200 });
    uart.start();
    for byte in b"hi" {
        SimUart::push_rx(*byte);
    }
    let mut buf = [0u8; 2];
    match uart.read_blocking(&mut buf) {
        Ok(n) => log::info!("uart received {} byte(s): {:?}", n, &buf[..n]),
        Err(e) => log::warn!("uart read error: {e:?}"),
    }

    let mut jtag: JtagAdapter<SimGpio, SimClocks, 1_000_000, 1_000, 1_000_000, 1> = JtagAdapter::init(
        Pad::new(Port::B, 0),
        Pad::new(Port::B, 1),
        Pad::new(Port::B, 2),
        Pad::new(Port::B, 3),
        hal_chip_sim::SlewRate,
        hal_chip_sim::DriveMode,
        [4],
        "jtag",
        &PADS,
    );
    jtag.change_state(State::Idle);
    log::info!("tap state after reset walk: {:?}", jtag.state());

    leds.deinit("leds", &PADS);
    jtag.deinit("jtag", &PADS);
}
