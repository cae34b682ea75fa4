// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A bit-banged IEEE 1149.1 TAP state-machine driver over GPIO.
//!
//! [`JtagAdapter`] owns four pads (TCK, TMS, TDO, TDI) and walks the
//! standard 16-state TAP finite state machine, plus five `Unknown*`
//! pseudo-states used only during start-of-day synchronisation: the real
//! TAP's state is unknown to software at power-on, so [`JtagAdapter::init`]
//! asserts TMS for five clocks to force it into `Reset` regardless of
//! where it started.
//!
//! This is the most intricate state machine in the crate. The transition
//! table in [`step`] is written out explicitly rather than derived, since
//! an explicit table is easiest to audit against the IEEE 1149.1 diagram
//! state by state.

use crate::chip::{Clocks, Gpio};
use crate::ledger::SharedLedger;
use crate::tick::Tick;

/// A postmortem-traceable event recording the `DrExit2`/`IrExit2`
/// best-effort extra-bit shift (see [`step`]'s doc comment): the caller
/// asked to revisit `Exit1`/`Pause` from `Exit2`, which shifts one
/// unintended bit. Recorded rather than silently swallowed so a board that
/// hits this can tell from a postmortem trace that it happened.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    None,
    BestEffortExtraBitShift,
}

crate::ringbuf!(TRACE: Event, 8, Event::None);

fn trace_desync() {
    crate::ringbuf_entry!(TRACE, Event::BestEffortExtraBitShift);
    log::warn!("jtag: best-effort extra-bit shift while revisiting exit1/pause from exit2");
}

/// A TAP controller state: the 16 states of the IEEE 1149.1 FSM plus five
/// `Unknown*` pseudo-states walked through once at start-of-day.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Unknown1,
    Unknown2,
    Unknown3,
    Unknown4,
    Unknown5,
    Reset,
    Idle,
    DrSelect,
    DrCapture,
    DrShift,
    DrExit1,
    DrPause,
    DrExit2,
    DrUpdate,
    IrSelect,
    IrCapture,
    IrShift,
    IrExit1,
    IrPause,
    IrExit2,
    IrUpdate,
}

fn is_dr_target(target: State) -> bool {
    matches!(
        target,
        State::DrSelect
            | State::DrCapture
            | State::DrShift
            | State::DrExit1
            | State::DrPause
            | State::DrExit2
            | State::DrUpdate
    )
}

fn is_ir_target(target: State) -> bool {
    matches!(
        target,
        State::IrSelect
            | State::IrCapture
            | State::IrShift
            | State::IrExit1
            | State::IrPause
            | State::IrExit2
            | State::IrUpdate
    )
}

/// One step of the TAP FSM: given the current state and the ultimate
/// target, returns the TMS level to drive for the next clock and the
/// state that edge lands on.
///
/// `DrExit2`/`IrExit2` shift one extra bit on a best-effort basis when the
/// target asks to revisit `Exit1`/`Pause` from there; `IrExit1`'s
/// "otherwise" branch returns to `IrPause`, mirroring `DrExit1`'s
/// `DrPause` branch exactly (note that falling through to the *other*
/// scan chain's pause state would strand the TAP outside the requested
/// chain).
fn step(state: State, target: State) -> (bool, State) {
    use State::*;
    match state {
        Unknown1 => (true, Unknown2),
        Unknown2 => (true, Unknown3),
        Unknown3 => (true, Unknown4),
        Unknown4 => (true, Unknown5),
        Unknown5 => (true, Reset),
        Reset => (false, Idle),
        Idle => (true, DrSelect),
        DrSelect => {
            if is_dr_target(target) {
                (false, DrCapture)
            } else {
                (true, IrSelect)
            }
        }
        DrCapture => {
            if target == DrShift {
                (false, DrShift)
            } else {
                (true, DrExit1)
            }
        }
        DrShift => (true, DrExit1),
        DrExit1 => {
            if matches!(target, DrPause | DrExit2 | DrShift) {
                (false, DrPause)
            } else {
                (true, DrUpdate)
            }
        }
        DrPause => (true, DrExit2),
        DrExit2 => {
            if matches!(target, DrShift | DrExit1 | DrPause) {
                if matches!(target, DrExit1 | DrPause) {
                    trace_desync();
                }
                (false, DrShift)
            } else {
                (true, DrUpdate)
            }
        }
        DrUpdate => {
            if target == Idle {
                (false, Idle)
            } else {
                (true, DrSelect)
            }
        }
        IrSelect => {
            if is_ir_target(target) {
                (false, IrCapture)
            } else {
                (true, Reset)
            }
        }
        IrCapture => {
            if target == IrShift {
                (false, IrShift)
            } else {
                (true, IrExit1)
            }
        }
        IrShift => (true, IrExit1),
        IrExit1 => {
            if matches!(target, IrPause | IrExit2 | IrShift) {
                (false, IrPause)
            } else {
                (true, IrPause)
            }
        }
        IrPause => (true, IrExit2),
        IrExit2 => {
            if matches!(target, IrShift | IrExit1 | IrPause) {
                if matches!(target, IrExit1 | IrPause) {
                    trace_desync();
                }
                (false, IrShift)
            } else {
                (true, IrUpdate)
            }
        }
        IrUpdate => {
            if target == Idle {
                (false, Idle)
            } else {
                (true, DrSelect)
            }
        }
    }
}

const fn div_ceil(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator - 1) / denominator
}

const fn mask64(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// A bit-banged JTAG adapter over four GPIO pads, clocked at a
/// compile-time-fixed frequency no higher than `MAX_FREQUENCY_HZ`.
///
/// `CHAIN_LEN` is the number of TAPs in the scan chain this adapter talks
/// to; [`JtagAdapter::tap`] projects the adapter onto one of them. A
/// single-TAP chain is simply `CHAIN_LEN = 1`.
pub struct JtagAdapter<
    G: Gpio,
    C,
    const MAX_FREQUENCY_HZ: u64,
    const TICK_FREQ_HZ: u64,
    const MICROTICK_FREQ_HZ: u64,
    const CHAIN_LEN: usize,
> {
    tck: G::PadId,
    tms: G::PadId,
    tdo: G::PadId,
    tdi: G::PadId,
    state: State,
    /// Instruction-register width, in bits, of each TAP in the chain, in
    /// scan-chain order (index 0 nearest TDI).
    ir_widths: [u32; CHAIN_LEN],
    _clocks: core::marker::PhantomData<C>,
}

impl<
        G: Gpio,
        C: Clocks<TICK_FREQ_HZ, MICROTICK_FREQ_HZ>,
        const MAX_FREQUENCY_HZ: u64,
        const TICK_FREQ_HZ: u64,
        const MICROTICK_FREQ_HZ: u64,
        const CHAIN_LEN: usize,
    > JtagAdapter<G, C, MAX_FREQUENCY_HZ, TICK_FREQ_HZ, MICROTICK_FREQ_HZ, CHAIN_LEN>
{
    /// Half the TCK period, in microticks, rounded up so the realised
    /// frequency never exceeds `MAX_FREQUENCY_HZ`.
    pub const HALF_PERIOD_MICROTICKS: u64 = div_ceil(MICROTICK_FREQ_HZ, 2 * MAX_FREQUENCY_HZ);

    /// Reserves the four pads, configures TCK/TMS/TDI as push-pull
    /// outputs with slow slew and TDO as an input, and sets the adapter's
    /// initial state to the first `Unknown` pseudo-state (the real TAP's
    /// state is not yet known). Runs inside a critical section.
    ///
    /// # Panics
    /// Panics (via the ledger) if any of the four pads is already
    /// reserved.
    pub fn init<const CAP: usize>(
        tck: G::PadId,
        tms: G::PadId,
        tdo: G::PadId,
        tdi: G::PadId,
        slew: G::SlewRate,
        drive: G::DriveMode,
        ir_widths: [u32; CHAIN_LEN],
        owner: &'static str,
        ledger: &SharedLedger<G::PadId, CAP>,
    ) -> Self {
        let pads = [tck, tms, tdo, tdi];
        crate::critical_section::with(|| {
            ledger.reserve(&pads, owner);
            G::ensure_ports_enabled(&pads);
            for pad in [tck, tms, tdi] {
                G::configure_as_output(pad);
                G::configure_slew_rate(pad, slew);
                G::configure_drive_mode(pad, drive);
            }
            G::configure_as_input(tdo);
        });
        Self {
            tck,
            tms,
            tdo,
            tdi,
            state: State::Unknown1,
            ir_widths,
            _clocks: core::marker::PhantomData,
        }
    }

    /// Returns the four pads to unused and releases them. Runs inside a
    /// critical section.
    pub fn deinit<const CAP: usize>(self, owner: &'static str, ledger: &SharedLedger<G::PadId, CAP>) {
        crate::critical_section::with(|| {
            for pad in [self.tck, self.tms, self.tdo, self.tdi] {
                G::configure_as_unused(pad);
            }
            ledger.release(&[self.tck, self.tms, self.tdo, self.tdi], owner);
        });
    }

    /// The adapter's last-known TAP state.
    pub fn state(&self) -> State {
        self.state
    }

    fn half_period_deadline() -> crate::tick::Microtick<MICROTICK_FREQ_HZ> {
        C::current_microtick().plus(crate::duration!(ticks: Self::HALF_PERIOD_MICROTICKS as i64))
    }

    /// Drives one TCK cycle: TCK low, wait a half period, sample TDO, TCK
    /// high, wait another half period. TMS and TDI must already be driven
    /// to the levels this edge should latch before calling this.
    fn clock_pulse(&self) -> bool {
        G::write_output(self.tck, false);
        C::block_until_microtick(Self::half_period_deadline());
        let tdo = G::read_input(self.tdo);
        G::write_output(self.tck, true);
        C::block_until_microtick(Self::half_period_deadline());
        tdo
    }

    /// Drives TMS and strobes TCK, following [`step`], until the adapter
    /// reaches `target`. Guaranteed to terminate within a handful of
    /// transitions from any reachable state.
    pub fn change_state(&mut self, target: State) {
        while self.state != target {
            let (tms, next) = step(self.state, target);
            G::write_output(self.tms, tms);
            self.clock_pulse();
            self.state = next;
        }
    }

    /// Strobes TCK `n` times with TMS held low. The adapter must already
    /// be in [`State::Idle`].
    pub fn idle(&mut self, n: u32) {
        debug_assert_eq!(self.state, State::Idle, "idle() requires the adapter to already be in Idle");
        G::write_output(self.tms, false);
        for _ in 0..n {
            self.clock_pulse();
        }
    }

    /// Strobes TCK with TMS held low until `deadline` has passed, then
    /// continues until at least `min_clocks` pulses have been emitted in
    /// total. The adapter must already be in [`State::Idle`].
    ///
    /// The pulse counter is incremented exactly once per strobe.
    pub fn idle_until(&mut self, deadline: Tick<TICK_FREQ_HZ>, min_clocks: u32) {
        debug_assert_eq!(self.state, State::Idle, "idle_until() requires the adapter to already be in Idle");
        G::write_output(self.tms, false);
        let mut pulses = 0u32;
        while !C::current_tick().is_after(deadline) || pulses < min_clocks {
            self.clock_pulse();
            pulses += 1;
        }
    }

    /// Moves to `shift_state`, then shifts `value`'s low `bits` bits out
    /// on TDI (LSB first) while capturing TDO into the returned word (also
    /// LSB first: the first bit sampled ends up in bit 0). On the final
    /// bit, TMS is raised, which moves the adapter to `exit_state` on that
    /// same edge. A `bits == 0` call is a no-op that touches neither the
    /// pads nor the adapter's state.
    pub fn shift(&mut self, bits: u32, value: u64, shift_state: State, exit_state: State) -> u64 {
        if bits == 0 {
            return 0;
        }
        self.change_state(shift_state);

        let mut result: u64 = 0;
        for i in 0..bits {
            let last = i == bits - 1;
            G::write_output(self.tdi, (value >> i) & 1 != 0);
            G::write_output(self.tms, last);
            let tdo = self.clock_pulse();
            result >>= 1;
            if tdo {
                result |= 1 << (bits - 1);
            }
        }
        self.state = exit_state;
        result
    }

    /// Shifts `value` through the current TAP's instruction register, then
    /// moves on to `end`. Convenience wrapper around [`Self::shift`].
    pub fn shift_ir(&mut self, bits: u32, value: u64, end: State) -> u64 {
        let result = self.shift(bits, value, State::IrShift, State::IrExit1);
        self.change_state(end);
        result
    }

    /// Shifts `value` through the current TAP's data register, then moves
    /// on to `end`. Convenience wrapper around [`Self::shift`].
    pub fn shift_dr(&mut self, bits: u32, value: u64, end: State) -> u64 {
        let result = self.shift(bits, value, State::DrShift, State::DrExit1);
        self.change_state(end);
        result
    }

    /// Projects this adapter onto TAP `index` of the scan chain, padding
    /// every other TAP's instruction or data register with BYPASS so it's
    /// transparent to the shift.
    ///
    /// # Panics
    /// Panics if `index >= CHAIN_LEN`.
    pub fn tap(
        &mut self,
        index: usize,
    ) -> Tap<'_, G, C, MAX_FREQUENCY_HZ, TICK_FREQ_HZ, MICROTICK_FREQ_HZ, CHAIN_LEN> {
        assert!(index < CHAIN_LEN, "jtag: tap index out of range for this scan chain");
        Tap { adapter: self, index }
    }
}

/// A view of one TAP in a multi-TAP scan chain. See
/// [`JtagAdapter::tap`].
pub struct Tap<
    'a,
    G: Gpio,
    C,
    const MAX_FREQUENCY_HZ: u64,
    const TICK_FREQ_HZ: u64,
    const MICROTICK_FREQ_HZ: u64,
    const CHAIN_LEN: usize,
> {
    adapter: &'a mut JtagAdapter<G, C, MAX_FREQUENCY_HZ, TICK_FREQ_HZ, MICROTICK_FREQ_HZ, CHAIN_LEN>,
    index: usize,
}

impl<
        'a,
        G: Gpio,
        C: Clocks<TICK_FREQ_HZ, MICROTICK_FREQ_HZ>,
        const MAX_FREQUENCY_HZ: u64,
        const TICK_FREQ_HZ: u64,
        const MICROTICK_FREQ_HZ: u64,
        const CHAIN_LEN: usize,
    > Tap<'a, G, C, MAX_FREQUENCY_HZ, TICK_FREQ_HZ, MICROTICK_FREQ_HZ, CHAIN_LEN>
{
    /// Shifts `insn` into this TAP's instruction register while shifting
    /// all-ones (BYPASS) through every other TAP's IR, then moves on to
    /// `end`.
    pub fn instruction(&mut self, insn: u64, end: State) {
        let mut total_bits = 0u32;
        let mut value = 0u64;
        for (i, &width) in self.adapter.ir_widths.iter().enumerate() {
            let field = if i == self.index { insn & mask64(width) } else { mask64(width) };
            value |= field << total_bits;
            total_bits += width;
        }
        self.adapter.shift_ir(total_bits, value, end);
    }

    /// Shifts `value`'s low `bits` bits into this TAP's data register,
    /// padded with `index` BYPASS bits before and `CHAIN_LEN - index - 1`
    /// after, then moves on to `end`. Returns the captured bits belonging
    /// to this TAP only (the BYPASS padding is discarded).
    pub fn data(&mut self, bits: u32, value: u64, end: State) -> u64 {
        let before = self.index as u32;
        let after = (CHAIN_LEN - self.index - 1) as u32;
        let total_bits = before + bits + after;
        let composed = (value & mask64(bits)) << before;
        let captured = self.adapter.shift_dr(total_bits, composed, end);
        (captured >> before) & mask64(bits)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use std::cell::RefCell;
    use std::vec::Vec;

    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    struct Pad(u8);
    impl crate::chip::PadId for Pad {
        fn tag(&self) -> &'static str {
            match self.0 {
                0 => "TCK",
                1 => "TMS",
                2 => "TDO",
                3 => "TDI",
                _ => "?",
            }
        }
    }

    #[derive(Copy, Clone, PartialEq, Eq)]
    struct Port;

    struct FakeGpio;

    // A minimal, host-only `Gpio` fake exercising only direct pin-level
    // access (no ports/buses): `Port`/`PortDataType` are trivial
    // stand-ins, and per-test state lives in thread-locals so tests can
    // run concurrently without a shared mutable fixture.
    std::thread_local! {
        static OUTPUTS: RefCell<[bool; 4]> = const { RefCell::new([false; 4]) };
        static TDO_QUEUE: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
        static PULSE_COUNT: RefCell<u32> = const { RefCell::new(0) };
    }

    impl crate::chip::Gpio for FakeGpio {
        type PadId = Pad;
        type Port = Port;
        type PortDataType = u32;
        type SlewRate = ();
        type DriveMode = ();
        type TerminationMode = ();

        const PORT_DATA_ONE: u32 = 1;
        const FLOAT_TERMINATION: () = ();

        fn ensure_ports_enabled(_pads: &[Pad]) {}
        fn configure_as_input(_pad: Pad) {}
        fn configure_as_output(_pad: Pad) {}
        fn configure_as_unused(_pad: Pad) {}
        fn configure_slew_rate(_pad: Pad, _slew: ()) {}
        fn configure_drive_mode(_pad: Pad, _drive: ()) {}
        fn configure_termination(_pad: Pad, _termination: ()) {}

        fn read_input(pad: Pad) -> bool {
            if pad.0 == 2 {
                // TDO: pop the next scripted bit. `clock_pulse` samples
                // TDO exactly once per cycle, so this also counts pulses.
                PULSE_COUNT.with(|c| *c.borrow_mut() += 1);
                TDO_QUEUE.with(|q| {
                    let mut q = q.borrow_mut();
                    if q.is_empty() {
                        false
                    } else {
                        q.remove(0)
                    }
                })
            } else {
                false
            }
        }
        fn write_output(pad: Pad, level: bool) {
            OUTPUTS.with(|o| o.borrow_mut()[pad.0 as usize] = level);
        }
        fn is_output(_pad: Pad) -> bool {
            true
        }

        fn get_io_port(_pad: Pad) -> Port {
            Port
        }
        fn get_offset(_pad: Pad) -> u32 {
            0
        }

        fn read_input_port(_port: Port) -> u32 {
            0
        }
        fn read_output_port(_port: Port) -> u32 {
            0
        }
        fn modify_output_port(_port: Port, _clear: u32, _set: u32) {}
    }

    struct FakeClocks;
    impl crate::chip::Clocks<1_000, 1_000_000> for FakeClocks {
        type UserConfig = ();
        type ParsedConfig = ();

        fn reset_config() {}
        fn parse_config(_user_config: ()) {}

        fn current_tick() -> crate::tick::Tick<1_000> {
            crate::tick::Tick::from_raw(0)
        }
        fn current_microtick() -> crate::tick::Microtick<1_000_000> {
            crate::tick::Microtick::from_raw(0)
        }
        // Time never advances in this fake, so the default busy-wait
        // would spin forever; these tests only care about bit sequencing,
        // not timing, so both waits are no-ops here.
        fn block_until_tick(_deadline: crate::tick::Tick<1_000>) {}
        fn block_until_microtick(_deadline: crate::tick::Microtick<1_000_000>) {}
    }

    fn set_tdo_queue(bits: &[bool]) {
        TDO_QUEUE.with(|q| *q.borrow_mut() = bits.to_vec());
    }
    fn pulse_count() -> u32 {
        PULSE_COUNT.with(|c| *c.borrow())
    }
    fn reset_outputs() {
        OUTPUTS.with(|o| *o.borrow_mut() = [false; 4]);
        TDO_QUEUE.with(|q| q.borrow_mut().clear());
        PULSE_COUNT.with(|c| *c.borrow_mut() = 0);
    }

    type TestAdapter = JtagAdapter<FakeGpio, FakeClocks, 1_000_000, 1_000, 1_000_000, 1>;

    fn adapter() -> TestAdapter {
        reset_outputs();
        let ledger: SharedLedger<Pad, 4> = SharedLedger::new();
        TestAdapter::init(Pad(0), Pad(1), Pad(2), Pad(3), (), (), [4], "JTAG", &ledger)
    }

    #[test]
    fn reset_walk_from_unknown_strobes_five_times_with_tms_high() {
        let mut jtag = adapter();
        assert_eq!(jtag.state(), State::Unknown1);
        let before = pulse_count();
        jtag.change_state(State::Reset);
        assert_eq!(jtag.state(), State::Reset);
        assert_eq!(pulse_count() - before, 5);
        // Every transition on the unknown->reset chain holds TMS high.
        assert!(OUTPUTS.with(|o| o.borrow()[1]));
    }

    #[test]
    fn change_state_reaches_every_state_from_idle() {
        for target in [
            State::DrShift,
            State::DrPause,
            State::DrUpdate,
            State::IrShift,
            State::IrPause,
            State::IrUpdate,
            State::Idle,
        ] {
            let mut jtag = adapter();
            jtag.change_state(State::Idle);
            jtag.change_state(target);
            assert_eq!(jtag.state(), target);
        }
    }

    #[test]
    fn ir_exit1_falls_through_to_ir_pause_not_dr_pause() {
        let mut jtag = adapter();
        jtag.change_state(State::IrExit1);
        jtag.change_state(State::IrUpdate);
        assert_eq!(jtag.state(), State::IrUpdate);
    }

    #[test]
    fn shift_dr_captures_lsb_first_and_lands_in_exit1() {
        let mut jtag = adapter();
        jtag.change_state(State::Idle);
        set_tdo_queue(&[false, true, true, false]);
        let captured = jtag.shift(4, 0b1011, State::DrShift, State::DrExit1);
        assert_eq!(captured, 0b0110);
        assert_eq!(jtag.state(), State::DrExit1);
    }

    #[test]
    fn shift_emits_exactly_n_pulses_with_tms_high_on_the_last() {
        let mut jtag = adapter();
        jtag.change_state(State::Idle);
        set_tdo_queue(&[false, false, false, false]);
        let before = pulse_count();
        jtag.shift(4, 0, State::DrShift, State::DrExit1);
        assert_eq!(pulse_count() - before, 4);
        assert!(OUTPUTS.with(|o| o.borrow()[1]), "tms must be high on the final bit");
    }

    #[test]
    fn zero_width_shift_is_a_no_op() {
        let mut jtag = adapter();
        jtag.change_state(State::DrShift);
        let before = pulse_count();
        let captured = jtag.shift(0, 0xFF, State::DrShift, State::DrExit1);
        assert_eq!(captured, 0);
        assert_eq!(jtag.state(), State::DrShift);
        assert_eq!(pulse_count(), before);
    }

    #[test]
    fn tap_instruction_pads_other_taps_with_bypass_ones() {
        // A two-TAP chain, widths [4, 3]; addressing TAP 1 shifts
        // all-ones through TAP 0's 4-bit IR ahead of the real insn.
        reset_outputs();
        let ledger: SharedLedger<Pad, 4> = SharedLedger::new();
        let mut jtag: JtagAdapter<FakeGpio, FakeClocks, 1_000_000, 1_000, 1_000_000, 2> =
            JtagAdapter::init(Pad(0), Pad(1), Pad(2), Pad(3), (), (), [4, 3], "JTAG", &ledger);
        jtag.change_state(State::Idle);
        set_tdo_queue(&[false; 7]);
        jtag.tap(1).instruction(0b101, State::Idle);
        assert_eq!(jtag.state(), State::Idle);
    }

    #[test]
    fn tap_data_pads_with_zero_bypass_bits_and_strips_them_on_capture() {
        reset_outputs();
        let ledger: SharedLedger<Pad, 4> = SharedLedger::new();
        let mut jtag: JtagAdapter<FakeGpio, FakeClocks, 1_000_000, 1_000, 1_000_000, 3> =
            JtagAdapter::init(Pad(0), Pad(1), Pad(2), Pad(3), (), (), [1, 1, 1], "JTAG", &ledger);
        jtag.change_state(State::Idle);
        // Index 1 of 3: one bypass bit before, one after. The middle two
        // captured bits (from the addressed TAP) are the ones that matter.
        set_tdo_queue(&[false, true, false, false]);
        let captured = jtag.tap(1).data(2, 0b10, State::Idle);
        assert_eq!(captured, 0b01);
    }

    #[test]
    fn idle_strobes_tck_exactly_n_times() {
        let mut jtag = adapter();
        jtag.change_state(State::Idle);
        set_tdo_queue(&[false; 10]);
        let before = pulse_count();
        jtag.idle(5);
        assert_eq!(pulse_count() - before, 5);
    }

    #[test]
    fn idle_until_increments_once_per_strobe_in_the_tail_loop() {
        let mut jtag = adapter();
        jtag.change_state(State::Idle);
        set_tdo_queue(&[false; 20]);
        // `current_tick` is pinned at 0 in this fake and never advances, so
        // a deadline already behind it is the only way to make the
        // "deadline passed" disjunct true from the first check -- this
        // isolates the "continue until min_clocks" tail, one pulse per
        // iteration.
        let before = pulse_count();
        jtag.idle_until(crate::tick::Tick::from_raw(-1), 6);
        assert_eq!(pulse_count() - before, 6);
    }
}
