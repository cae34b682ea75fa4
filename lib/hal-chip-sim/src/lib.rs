// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated chip implementing every `hal_core::chip` trait over plain
//! atomics, in place of real silicon.
//!
//! Where a `drv-<chip>` crate backs `hal_core`'s traits with register
//! writes, this crate backs them with in-memory state a test or demo can
//! poke and inspect directly. It is the stand-in [`hal_core::chip`]'s module
//! docs point to: a board crate that links this instead of a real `drv`
//! crate runs its whole peripheral-composition layer (bus, UART front-end,
//! JTAG adapter) against simulated pins with no hardware attached.
//!
//! Two ports (`A` and `B`) of 16 pads each are provided, which is enough to
//! exercise multi-port GPIO buses and the JTAG pad set at once.

#![no_std]

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, Ordering};

use hal_core::chip::{
    Channel as ChannelTrait, Clocks, ClockDomainQuery, DriveMode as DriveModeTrait, Gpio, Interrupts,
    PadId, SlewRate as SlewRateTrait, TerminationMode as TerminationModeTrait, UartImpl, UartReadError,
};
use hal_core::uart::{GetReadError, Peek, RxAvailability, RxByte, TxByte};

const PADS_PER_PORT: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Port {
    A,
    B,
}

/// A pad on the simulated chip, e.g. `Pad::new(Port::A, 0)` ("PA0").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pad {
    port: Port,
    index: u8,
}

impl Pad {
    pub const fn new(port: Port, index: u8) -> Self {
        assert!((index as usize) < PADS_PER_PORT, "pad index out of range");
        Self { port, index }
    }
}

const TAGS_A: [&str; PADS_PER_PORT] = [
    "PA0", "PA1", "PA2", "PA3", "PA4", "PA5", "PA6", "PA7", "PA8", "PA9", "PA10", "PA11", "PA12", "PA13",
    "PA14", "PA15",
];
const TAGS_B: [&str; PADS_PER_PORT] = [
    "PB0", "PB1", "PB2", "PB3", "PB4", "PB5", "PB6", "PB7", "PB8", "PB9", "PB10", "PB11", "PB12", "PB13",
    "PB14", "PB15",
];

impl PadId for Pad {
    fn tag(&self) -> &'static str {
        match self.port {
            Port::A => TAGS_A[self.index as usize],
            Port::B => TAGS_B[self.index as usize],
        }
    }
}

/// A simulated DMA channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Channel(pub u8);
impl ChannelTrait for Channel {}

/// No electrical characteristics are actually simulated; these exist only
/// so code written against `hal_core::chip::Gpio` type-checks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlewRate;
impl SlewRateTrait for SlewRate {}
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DriveMode;
impl DriveModeTrait for DriveMode {}
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TerminationMode;
impl TerminationModeTrait for TerminationMode {}

struct PortState {
    /// Bit `n` set means pad `n` is currently configured as an output.
    direction: AtomicU32,
    output: AtomicU32,
    /// Bits driven onto the port from outside (e.g. a test harness acting
    /// as the far end of a wire). `read_input` on an input pad reads this;
    /// on an output pad it reads the driven `output` level, as real GPIO
    /// hardware does.
    external: AtomicU32,
}

impl PortState {
    const fn new() -> Self {
        Self {
            direction: AtomicU32::new(0),
            output: AtomicU32::new(0),
            external: AtomicU32::new(0),
        }
    }
}

static PORT_A: PortState = PortState::new();
static PORT_B: PortState = PortState::new();

fn port_state(port: Port) -> &'static PortState {
    match port {
        Port::A => &PORT_A,
        Port::B => &PORT_B,
    }
}

/// The simulated GPIO peripheral. Zero-sized; all state lives in statics,
/// matching how a real chip crate's `Gpio` impl addresses fixed hardware
/// registers rather than owning them as fields.
pub struct SimGpio;

impl SimGpio {
    /// Drives `level` onto `pad` from outside the simulated chip, e.g. to
    /// model a button press or a peer device's TX line arriving on RX.
    /// Only observable by a read of an *input*-configured pad.
    pub fn drive_external(pad: Pad, level: bool) {
        let mask = 1u32 << pad.index;
        let state = port_state(pad.port);
        if level {
            state.external.fetch_or(mask, Ordering::SeqCst);
        } else {
            state.external.fetch_and(!mask, Ordering::SeqCst);
        }
    }
}

impl Gpio for SimGpio {
    type PadId = Pad;
    type Port = Port;
    type PortDataType = u32;
    type SlewRate = SlewRate;
    type DriveMode = DriveMode;
    type TerminationMode = TerminationMode;

    const PORT_DATA_ONE: u32 = 1;
    const FLOAT_TERMINATION: TerminationMode = TerminationMode;

    fn ensure_ports_enabled(_pads: &[Pad]) {}

    fn configure_as_input(pad: Pad) {
        port_state(pad.port).direction.fetch_and(!(1 << pad.index), Ordering::SeqCst);
    }

    fn configure_as_output(pad: Pad) {
        port_state(pad.port).direction.fetch_or(1 << pad.index, Ordering::SeqCst);
    }

    fn configure_as_unused(pad: Pad) {
        Self::configure_as_input(pad);
    }

    fn configure_slew_rate(_pad: Pad, _slew: SlewRate) {}
    fn configure_drive_mode(_pad: Pad, _drive: DriveMode) {}
    fn configure_termination(_pad: Pad, _termination: TerminationMode) {}

    fn read_input(pad: Pad) -> bool {
        let state = port_state(pad.port);
        let mask = 1u32 << pad.index;
        let source = if state.direction.load(Ordering::SeqCst) & mask != 0 {
            state.output.load(Ordering::SeqCst)
        } else {
            state.external.load(Ordering::SeqCst)
        };
        source & mask != 0
    }

    fn write_output(pad: Pad, level: bool) {
        let mask = 1u32 << pad.index;
        let state = port_state(pad.port);
        if level {
            state.output.fetch_or(mask, Ordering::SeqCst);
        } else {
            state.output.fetch_and(!mask, Ordering::SeqCst);
        }
    }

    fn is_output(pad: Pad) -> bool {
        port_state(pad.port).direction.load(Ordering::SeqCst) & (1 << pad.index) != 0
    }

    fn get_io_port(pad: Pad) -> Port {
        pad.port
    }

    fn get_offset(pad: Pad) -> u32 {
        pad.index as u32
    }

    fn read_input_port(port: Port) -> u32 {
        let state = port_state(port);
        let dir = state.direction.load(Ordering::SeqCst);
        (state.output.load(Ordering::SeqCst) & dir) | (state.external.load(Ordering::SeqCst) & !dir)
    }

    fn read_output_port(port: Port) -> u32 {
        port_state(port).output.load(Ordering::SeqCst)
    }

    fn modify_output_port(port: Port, clear: u32, set: u32) {
        port_state(port).output.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some((v & !clear) | set)).ok();
    }
}

static TICK: AtomicI32 = AtomicI32::new(0);
static MICROTICK: AtomicI64 = AtomicI64::new(0);

/// The simulated clock tree. There is no real oscillator behind this
/// simulation, so [`Clocks::current_microtick`] advances the free-running
/// counter by one on every read -- enough to let [`Self::block_until_tick`]/
/// [`Self::block_until_microtick`] (and anything built on them, like the
/// JTAG adapter's clock pulse) make forward progress and terminate the way
/// they would against a real, continuously-advancing hardware counter.
/// [`Self::advance_ticks`]/[`advance_microticks`] additionally let a test
/// jump the counters by a specific amount, e.g. to simulate a deadline
/// already having passed.
pub struct SimClocks;

impl SimClocks {
    pub fn advance_ticks(n: i32) {
        TICK.fetch_add(n, Ordering::SeqCst);
    }
    pub fn advance_microticks(n: i64) {
        MICROTICK.fetch_add(n, Ordering::SeqCst);
    }
}

/// Nothing to configure: the simulated clock tree runs at a single fixed
/// set of frequencies regardless of what's asked for. A real chip's
/// equivalent instead picks a crystal source, PLL multipliers, and so on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClockUserConfig;

/// The simulated chip's resolved clock-tree configuration: one
/// `<domain>_frequency_hz` field per [`Domain`], the same shape every
/// chip crate's `ParsedConfig` takes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockParsedConfig {
    pub ahb_frequency_hz: u64,
    pub apb1_frequency_hz: u64,
    pub apb2_frequency_hz: u64,
}

impl<const TICK_FREQ_HZ: u64, const MICROTICK_FREQ_HZ: u64> Clocks<TICK_FREQ_HZ, MICROTICK_FREQ_HZ> for SimClocks {
    type UserConfig = ClockUserConfig;
    type ParsedConfig = ClockParsedConfig;

    fn reset_config() {
        // The simulated tree has exactly one configuration; resetting it
        // to power-on defaults is a no-op.
    }

    fn parse_config(_user_config: ClockUserConfig) -> ClockParsedConfig {
        ClockParsedConfig {
            ahb_frequency_hz: <Self as ClockDomainQuery<Domain>>::frequency_hz(Domain::Ahb),
            apb1_frequency_hz: <Self as ClockDomainQuery<Domain>>::frequency_hz(Domain::Apb1),
            apb2_frequency_hz: <Self as ClockDomainQuery<Domain>>::frequency_hz(Domain::Apb2),
        }
    }

    fn current_tick() -> hal_core::tick::Tick<TICK_FREQ_HZ> {
        hal_core::tick::Tick::from_raw(TICK.fetch_add(1, Ordering::SeqCst) + 1)
    }
    fn current_microtick() -> hal_core::tick::Microtick<MICROTICK_FREQ_HZ> {
        hal_core::tick::Microtick::from_raw(MICROTICK.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// A clock domain on the simulated chip, e.g. the bus an addressed
/// peripheral's functional clock is derived from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Domain {
    Ahb,
    Apb1,
    Apb2,
}

impl ClockDomainQuery<Domain> for SimClocks {
    fn frequency_hz(domain: Domain) -> u64 {
        match domain {
            Domain::Ahb => 48_000_000,
            Domain::Apb1 => 24_000_000,
            Domain::Apb2 => 48_000_000,
        }
    }
}

/// An interrupt line on the simulated chip.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Uart0,
    Dma(Channel),
    GpioEdge(Pad),
}

fn line_bit(line: Line) -> u32 {
    match line {
        Line::Uart0 => 0,
        Line::Dma(Channel(n)) => 1 + n as u32,
        Line::GpioEdge(pad) => {
            16 + match pad.port {
                Port::A => 0,
                Port::B => PADS_PER_PORT as u32,
            } + pad.index as u32
        }
    }
}

static ENABLED: AtomicU32 = AtomicU32::new(0);
static PENDING: AtomicU32 = AtomicU32::new(0);
static GLOBAL_ENABLE: AtomicBool = AtomicBool::new(true);

/// The simulated interrupt controller.
pub struct SimInterrupts;

impl Interrupts for SimInterrupts {
    type Kind = Line;

    fn set_enabled(kind: Line, enabled: bool) {
        let mask = 1u32 << line_bit(kind);
        if enabled {
            ENABLED.fetch_or(mask, Ordering::SeqCst);
        } else {
            ENABLED.fetch_and(!mask, Ordering::SeqCst);
        }
    }

    fn set_priority(_kind: Line, _priority: u8) {}

    fn are_globally_enabled() -> bool {
        GLOBAL_ENABLE.load(Ordering::SeqCst)
    }

    fn set_globally_enabled(enabled: bool) {
        GLOBAL_ENABLE.store(enabled, Ordering::SeqCst);
    }

    fn set_pending(kind: Line) {
        PENDING.fetch_or(1 << line_bit(kind), Ordering::SeqCst);
    }

    fn is_pending(kind: Line) -> bool {
        PENDING.load(Ordering::SeqCst) & (1 << line_bit(kind)) != 0
    }
}

const UART_RX_CAPACITY: usize = 64;

struct RxRing {
    bytes: [Cell<u8>; UART_RX_CAPACITY],
    head: Cell<usize>,
    len: Cell<usize>,
}

// SAFETY: the simulated chip is single-threaded (interior mutability via
// `Cell`, not an atomic); this unblocks use as a `static` the same way the
// port/tick statics above do with real atomics.
unsafe impl Sync for RxRing {}

impl RxRing {
    const fn new() -> Self {
        const ZERO: Cell<u8> = Cell::new(0);
        Self {
            bytes: [ZERO; UART_RX_CAPACITY],
            head: Cell::new(0),
            len: Cell::new(0),
        }
    }

    fn push(&self, byte: u8) -> bool {
        if self.len.get() == UART_RX_CAPACITY {
            return false;
        }
        let tail = (self.head.get() + self.len.get()) % UART_RX_CAPACITY;
        self.bytes[tail].set(byte);
        self.len.set(self.len.get() + 1);
        true
    }

    fn pop(&self) -> Option<u8> {
        if self.len.get() == 0 {
            return None;
        }
        let byte = self.bytes[self.head.get()].get();
        self.head.set((self.head.get() + 1) % UART_RX_CAPACITY);
        self.len.set(self.len.get() - 1);
        Some(byte)
    }

    fn peek_front(&self) -> Option<u8> {
        if self.len.get() == 0 {
            None
        } else {
            Some(self.bytes[self.head.get()].get())
        }
    }

    fn len(&self) -> usize {
        self.len.get()
    }
}

struct StickyError(Cell<Option<UartReadError>>);
// SAFETY: same single-threaded simulated-chip assumption as `RxRing`.
unsafe impl Sync for StickyError {}

static UART_RX: RxRing = RxRing::new();
static UART_STICKY_ERROR: StickyError = StickyError(Cell::new(None));
static UART_STARTED: AtomicBool = AtomicBool::new(false);
static UART_TX_COUNT: AtomicU32 = AtomicU32::new(0);

/// The simulated UART, implementing only the blocking primitives plus RX
/// availability and peek -- a board whose chip genuinely lacks non-blocking
/// TX can still be modelled faithfully by simply not wiring `TxAvailability`
/// up to anything (it's absent here on purpose, to exercise the capability
/// gating in [`hal_core::uart`]).
pub struct SimUart;

impl SimUart {
    /// Injects a byte as if it arrived over the wire. Fails (returns
    /// `false`) if the simulated receive buffer is full.
    pub fn push_rx(byte: u8) -> bool {
        UART_RX.push(byte)
    }

    /// Latches a read error, to be observed (and cleared) through
    /// [`GetReadError`] the same way a real chip's status register would
    /// report a framing or parity fault.
    pub fn inject_read_error(error: UartReadError) {
        UART_STICKY_ERROR.0.set(Some(error));
    }

    /// Number of bytes transmitted since start, for test assertions.
    pub fn tx_count() -> u32 {
        UART_TX_COUNT.load(Ordering::SeqCst)
    }
}

/// Configuration for [`SimUart`]. The simulation doesn't actually shift
/// bits at a baud rate, so `init` only records this; it exists so board
/// code exercises the same `Config`-construction-then-`init` sequence it
/// would against a real chip crate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UartConfig {
    pub baud_rate: u32,
}

impl UartImpl for SimUart {
    type Config = UartConfig;

    fn init(&mut self, _config: UartConfig) {}
    fn start(&mut self) {
        UART_STARTED.store(true, Ordering::SeqCst);
    }
    fn stop(&mut self) {
        UART_STARTED.store(false, Ordering::SeqCst);
    }
    fn deinit(&mut self) {
        UART_STARTED.store(false, Ordering::SeqCst);
    }
}

impl RxByte for SimUart {
    fn rx(&mut self) -> Result<u8, UartReadError> {
        if let Some(err) = UART_STICKY_ERROR.0.get() {
            return Err(err);
        }
        UART_RX.pop().ok_or(UartReadError::FramingError)
    }
}

impl GetReadError for SimUart {
    fn get_read_error(&self) -> Option<UartReadError> {
        UART_STICKY_ERROR.0.get()
    }
    fn clear_read_error(&mut self, error: UartReadError) {
        if UART_STICKY_ERROR.0.get() == Some(error) {
            UART_STICKY_ERROR.0.set(None);
        }
    }
}

impl RxAvailability for SimUart {
    fn get_rx_bytes_available(&self) -> usize {
        UART_RX.len()
    }
}

impl TxByte for SimUart {
    fn tx(&mut self, _byte: u8) {
        UART_TX_COUNT.fetch_add(1, Ordering::SeqCst);
    }
}

impl Peek for SimUart {
    fn peek(&self) -> Result<u8, UartReadError> {
        if let Some(err) = UART_STICKY_ERROR.0.get() {
            return Err(err);
        }
        UART_RX.peek_front().ok_or(UartReadError::FramingError)
    }
}
