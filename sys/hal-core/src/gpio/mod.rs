// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type-parameterised multi-pin GPIO buses.
//!
//! A [`Bus`] projects a fixed-order tuple of pads onto a single logical
//! state word: bit *i* of the word is pad *i* in declaration order,
//! regardless of which physical port that pad actually lives on. Mode
//! (`input`/`output`/`bidirectional`) is a type parameter rather than a
//! runtime field, so e.g. calling [`Bus::modify`] on an input-mode bus is
//! a compile error instead of a wrong-mode panic.
//!
//! Port groupings (which of the `LEN` pads share a physical port, and at
//! what bit offset) are computed once in [`Bus::init`] and cached in the
//! bus, rather than recomputed on every access -- the chip's
//! `get_io_port`/`get_offset` are ordinary trait methods, not `const fn`,
//! so folding them at compile time isn't available on stable Rust. This
//! still keeps every access a single cached-index lookup rather than a
//! search.

use crate::chip::{Direction, Gpio};
use crate::ledger::SharedLedger;

mod sealed {
    pub trait Sealed {}
}

/// Bus is configured for input only.
pub struct Input;
/// Bus is configured for output only.
pub struct Output;
/// Bus direction is runtime-switchable between input and output.
pub struct Bidirectional;

impl sealed::Sealed for Input {}
impl sealed::Sealed for Output {}
impl sealed::Sealed for Bidirectional {}

/// A bus mode, fixed at the type level. See the module docs.
pub trait Mode: sealed::Sealed {
    /// The electrical direction pads are configured to on [`Bus::init`].
    const INITIAL_DIRECTION: Direction;
}

impl Mode for Input {
    const INITIAL_DIRECTION: Direction = Direction::Input;
}
impl Mode for Output {
    const INITIAL_DIRECTION: Direction = Direction::Output;
}
impl Mode for Bidirectional {
    const INITIAL_DIRECTION: Direction = Direction::Input;
}

/// Marker for modes that support [`Bus::read`].
pub trait CanRead: Mode {}
impl CanRead for Input {}
impl CanRead for Bidirectional {}

/// Marker for modes that support [`Bus::get`], [`Bus::modify`],
/// [`Bus::set_bits`], [`Bus::clear_bits`].
pub trait CanWrite: Mode {}
impl CanWrite for Output {}
impl CanWrite for Bidirectional {}

/// Electrical configuration shared by every pad in a bus.
#[derive(Copy, Clone)]
pub struct Config<G: Gpio> {
    pub slew: G::SlewRate,
    pub drive: G::DriveMode,
    pub termination: G::TerminationMode,
}

/// A fixed-order tuple of `LEN` pads composed into a single logical state
/// word, configured all at once and owned exclusively by whoever called
/// [`Bus::init`].
pub struct Bus<G: Gpio, const LEN: usize, M: Mode> {
    pads: [G::PadId; LEN],
    config: Config<G>,
    pad_port: [G::Port; LEN],
    pad_mask: [G::PortDataType; LEN],
    _mode: core::marker::PhantomData<M>,
}

impl<G: Gpio, const LEN: usize, M: Mode> Bus<G, LEN, M> {
    /// Reserves `pads` in `ledger`, brings up their ports, and configures
    /// them for this bus's mode. Runs inside a critical section.
    ///
    /// The state word is a `u32`; a bus wider than that has no bit to
    /// assign pad 32 onward, so `LEN` is checked against it here, once per
    /// monomorphization, rather than as a runtime assertion.
    ///
    /// # Panics
    /// Panics (via the ledger) if any pad is already reserved.
    pub fn init<const CAP: usize>(
        pads: [G::PadId; LEN],
        config: Config<G>,
        owner: &'static str,
        ledger: &SharedLedger<G::PadId, CAP>,
    ) -> Self {
        static_assertions::const_assert!(LEN <= 32);
        let pad_port = G::get_io_ports(pads);
        let pad_mask = pads.map(|p| G::PORT_DATA_ONE << G::get_offset(p));

        crate::critical_section::with(|| {
            ledger.reserve(&pads, owner);
            G::ensure_ports_enabled(&pads);
            for &pad in &pads {
                G::configure_termination(pad, config.termination);
            }
            match M::INITIAL_DIRECTION {
                Direction::Input => {
                    for &pad in &pads {
                        G::configure_as_input(pad);
                    }
                }
                Direction::Output => {
                    for &pad in &pads {
                        G::configure_as_output(pad);
                        G::configure_slew_rate(pad, config.slew);
                        G::configure_drive_mode(pad, config.drive);
                    }
                }
            }
        });

        Self {
            pads,
            config,
            pad_port,
            pad_mask,
            _mode: core::marker::PhantomData,
        }
    }

    /// Restores every pad to floating/unused and releases them from
    /// `ledger`. Runs inside a critical section.
    ///
    /// # Panics
    /// Panics (via the ledger) if a pad in this bus isn't currently
    /// reserved by `owner`.
    pub fn deinit<const CAP: usize>(self, owner: &'static str, ledger: &SharedLedger<G::PadId, CAP>) {
        crate::critical_section::with(|| {
            for &pad in &self.pads {
                G::configure_termination(pad, G::FLOAT_TERMINATION);
                G::configure_as_unused(pad);
            }
            ledger.release(&self.pads, owner);
        });
    }

    fn word_mask() -> u32 {
        if LEN >= 32 {
            u32::MAX
        } else {
            (1u32 << LEN) - 1
        }
    }

    /// Reads each distinct physical port covered by this bus exactly
    /// once, then folds the result into a single logical state word.
    fn scatter_gather(&self, read_port: impl Fn(G::Port) -> G::PortDataType) -> u32 {
        let mut cache: [Option<(G::Port, G::PortDataType)>; LEN] = [None; LEN];
        let mut result = 0u32;
        for i in 0..LEN {
            let port = self.pad_port[i];
            let word = match cache.iter().flatten().find(|(p, _)| *p == port) {
                Some((_, w)) => *w,
                None => {
                    let w = read_port(port);
                    cache[i] = Some((port, w));
                    w
                }
            };
            if (word & self.pad_mask[i]) != G::PortDataType::default() {
                result |= 1 << i;
            }
        }
        result
    }

    /// Builds and applies per-port `(clear, set)` masks from two logical
    /// bit sets, calling `modify_output_port` exactly once per distinct
    /// port.
    fn apply(&self, to_set: u32, to_clear: u32) {
        let mut handled: [Option<G::Port>; LEN] = [None; LEN];
        for i in 0..LEN {
            let port = self.pad_port[i];
            if handled[..i].iter().flatten().any(|p| *p == port) {
                continue;
            }
            let mut set_mask = G::PortDataType::default();
            let mut clear_mask = G::PortDataType::default();
            for j in i..LEN {
                if self.pad_port[j] != port {
                    continue;
                }
                if (to_set & (1 << j)) != 0 {
                    set_mask = set_mask | self.pad_mask[j];
                }
                if (to_clear & (1 << j)) != 0 {
                    clear_mask = clear_mask | self.pad_mask[j];
                }
            }
            G::modify_output_port(port, clear_mask, set_mask);
            handled[i] = Some(port);
        }
    }
}

impl<G: Gpio, const LEN: usize, M: CanRead> Bus<G, LEN, M> {
    /// Reads the bus's input state word.
    pub fn read(&self) -> u32 {
        self.scatter_gather(G::read_input_port)
    }
}

impl<G: Gpio, const LEN: usize, M: CanWrite> Bus<G, LEN, M> {
    /// Reads back the bus's output register (last value written).
    pub fn get(&self) -> u32 {
        self.scatter_gather(G::read_output_port)
    }

    /// Sets exactly the bits present in `word` and clears the rest.
    #[inline(always)]
    pub fn modify(&self, word: u32) {
        let mask = Self::word_mask();
        self.apply(word & mask, !word & mask);
    }

    /// Sets the bits present in `word`, leaving all others untouched.
    #[inline(always)]
    pub fn set_bits(&self, word: u32) {
        self.apply(word & Self::word_mask(), 0);
    }

    /// Clears the bits present in `word`, leaving all others untouched.
    #[inline(always)]
    pub fn clear_bits(&self, word: u32) {
        self.apply(0, word & Self::word_mask());
    }
}

impl<G: Gpio, const LEN: usize> Bus<G, LEN, Bidirectional> {
    /// Reconfigures every pad in the bus as input or output en masse.
    pub fn set_direction(&self, direction: Direction) {
        crate::critical_section::with(|| match direction {
            Direction::Input => {
                for &pad in &self.pads {
                    G::configure_as_input(pad);
                }
            }
            Direction::Output => {
                for &pad in &self.pads {
                    G::configure_as_output(pad);
                    G::configure_slew_rate(pad, self.config.slew);
                    G::configure_drive_mode(pad, self.config.drive);
                }
            }
        });
    }

    /// The bus's current direction, as queried from pad 0 (authoritative
    /// for every pad -- all pads move together).
    pub fn get_direction(&self) -> Direction {
        if G::is_output(self.pads[0]) {
            Direction::Output
        } else {
            Direction::Input
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use std::cell::Cell;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Port {
        A,
        B,
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct Pad {
        port: Port,
        offset: u8,
    }

    impl crate::chip::PadId for Pad {
        fn tag(&self) -> &'static str {
            "PAD"
        }
    }

    fn pad_a(offset: u8) -> Pad {
        Pad { port: Port::A, offset }
    }
    fn pad_b(offset: u8) -> Pad {
        Pad { port: Port::B, offset }
    }

    std::thread_local! {
        static DIR: [Cell<u32>; 2] = [Cell::new(0), Cell::new(0)];
        static OUT: [Cell<u32>; 2] = [Cell::new(0), Cell::new(0)];
        static EXT: [Cell<u32>; 2] = [Cell::new(0), Cell::new(0)];
    }

    fn port_index(port: Port) -> usize {
        match port {
            Port::A => 0,
            Port::B => 1,
        }
    }

    fn reset_fake() {
        DIR.with(|d| d.iter().for_each(|c| c.set(0)));
        OUT.with(|d| d.iter().for_each(|c| c.set(0)));
        EXT.with(|d| d.iter().for_each(|c| c.set(0)));
    }

    fn drive_external(pad: Pad, level: bool) {
        let mask = 1u32 << pad.offset;
        EXT.with(|e| {
            let cell = &e[port_index(pad.port)];
            cell.set(if level { cell.get() | mask } else { cell.get() & !mask });
        });
    }

    struct FakeGpio;

    impl Gpio for FakeGpio {
        type PadId = Pad;
        type Port = Port;
        type PortDataType = u32;
        type SlewRate = ();
        type DriveMode = ();
        type TerminationMode = ();

        const PORT_DATA_ONE: u32 = 1;
        const FLOAT_TERMINATION: () = ();

        fn ensure_ports_enabled(_pads: &[Pad]) {}

        fn configure_as_input(pad: Pad) {
            DIR.with(|d| {
                let cell = &d[port_index(pad.port)];
                cell.set(cell.get() & !(1 << pad.offset));
            });
        }
        fn configure_as_output(pad: Pad) {
            DIR.with(|d| {
                let cell = &d[port_index(pad.port)];
                cell.set(cell.get() | (1 << pad.offset));
            });
        }
        fn configure_as_unused(pad: Pad) {
            Self::configure_as_input(pad);
        }
        fn configure_slew_rate(_pad: Pad, _slew: ()) {}
        fn configure_drive_mode(_pad: Pad, _drive: ()) {}
        fn configure_termination(_pad: Pad, _termination: ()) {}

        fn read_input(pad: Pad) -> bool {
            let mask = 1u32 << pad.offset;
            let idx = port_index(pad.port);
            let is_output = DIR.with(|d| d[idx].get() & mask != 0);
            let source = if is_output {
                OUT.with(|o| o[idx].get())
            } else {
                EXT.with(|e| e[idx].get())
            };
            source & mask != 0
        }
        fn write_output(pad: Pad, level: bool) {
            let mask = 1u32 << pad.offset;
            OUT.with(|o| {
                let cell = &o[port_index(pad.port)];
                cell.set(if level { cell.get() | mask } else { cell.get() & !mask });
            });
        }
        fn is_output(pad: Pad) -> bool {
            let mask = 1u32 << pad.offset;
            DIR.with(|d| d[port_index(pad.port)].get() & mask != 0)
        }

        fn get_io_port(pad: Pad) -> Port {
            pad.port
        }
        fn get_offset(pad: Pad) -> u32 {
            pad.offset as u32
        }

        fn read_input_port(port: Port) -> u32 {
            let idx = port_index(port);
            let dir = DIR.with(|d| d[idx].get());
            (OUT.with(|o| o[idx].get()) & dir) | (EXT.with(|e| e[idx].get()) & !dir)
        }
        fn read_output_port(port: Port) -> u32 {
            OUT.with(|o| o[port_index(port)].get())
        }
        fn modify_output_port(port: Port, clear: u32, set: u32) {
            OUT.with(|o| {
                let cell = &o[port_index(port)];
                cell.set((cell.get() & !clear) | set);
            });
        }
    }

    fn config() -> Config<FakeGpio> {
        Config {
            slew: (),
            drive: (),
            termination: (),
        }
    }

    fn ledger() -> SharedLedger<Pad, 8> {
        SharedLedger::new()
    }

    #[test]
    fn modify_then_get_round_trips() {
        reset_fake();
        let ledger = ledger();
        let bus: Bus<FakeGpio, 2, Output> = Bus::init([pad_a(0), pad_a(1)], config(), "bus", &ledger);
        bus.modify(0b10);
        assert_eq!(bus.get(), 0b10);
        bus.modify(0b01);
        assert_eq!(bus.get(), 0b01);
    }

    #[test]
    fn scatter_gather_composes_bits_across_distinct_ports() {
        reset_fake();
        let ledger = ledger();
        let bus: Bus<FakeGpio, 3, Output> =
            Bus::init([pad_a(0), pad_b(3), pad_a(1)], config(), "bus", &ledger);
        bus.modify(0b101);
        assert_eq!(bus.get(), 0b101);
        assert_eq!(OUT.with(|o| o[0].get()) & 0b11, 0b11, "both port-A pads should be set");
        assert_eq!(OUT.with(|o| o[1].get()) & (1 << 3), 0, "port-B pad should be clear");
    }

    #[test]
    fn set_bits_and_clear_bits_leave_other_bits_untouched() {
        reset_fake();
        let ledger = ledger();
        let bus: Bus<FakeGpio, 3, Output> = Bus::init([pad_a(0), pad_a(1), pad_a(2)], config(), "bus", &ledger);
        bus.modify(0b010);
        bus.set_bits(0b100);
        assert_eq!(bus.get(), 0b110);
        bus.clear_bits(0b010);
        assert_eq!(bus.get(), 0b100);
    }

    #[test]
    fn read_reflects_externally_driven_levels() {
        reset_fake();
        let ledger = ledger();
        let bus: Bus<FakeGpio, 2, Input> = Bus::init([pad_a(0), pad_a(1)], config(), "bus", &ledger);
        drive_external(pad_a(0), true);
        drive_external(pad_a(1), false);
        assert_eq!(bus.read(), 0b01);
    }

    #[test]
    fn bidirectional_bus_switches_direction_and_reports_it() {
        reset_fake();
        let ledger = ledger();
        let bus: Bus<FakeGpio, 1, Bidirectional> = Bus::init([pad_a(0)], config(), "bus", &ledger);
        assert_eq!(bus.get_direction(), Direction::Input);
        bus.set_direction(Direction::Output);
        assert_eq!(bus.get_direction(), Direction::Output);
        bus.modify(1);
        assert_eq!(bus.get(), 1);
    }

    #[test]
    #[should_panic(expected = "double reservation")]
    fn init_panics_on_conflicting_pad_reservation() {
        reset_fake();
        let ledger = ledger();
        let _bus: Bus<FakeGpio, 1, Output> = Bus::init([pad_a(0)], config(), "first", &ledger);
        let _conflict: Bus<FakeGpio, 1, Output> = Bus::init([pad_a(0)], config(), "second", &ledger);
    }
}
