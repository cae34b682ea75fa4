// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traits a chip crate implements to plug into the core.
//!
//! Everything in this module is an *inbound* interface: hal-core consumes
//! it, a separate `drv-<chip>` crate (out of scope for this crate, see
//! `hal-chip-sim` for the test/demo stand-in) implements it over that
//! chip's actual registers. None of these traits are object-safe on
//! purpose -- every chip is known at build time, so dispatch is always
//! static/monomorphic, never a `dyn`.

/// A single named GPIO pin, supplied by the chip crate as a finite
/// enumeration of every pin that physically exists on the package.
///
/// Equality for membership tests (`is_in_set`) is defined on the pad's
/// *name*, not its enum discriminant: chip-family-generic driver code may
/// probe for pads that don't exist in this particular chip's `PadId`
/// enumeration at all, so name comparison is the only check that's always
/// meaningful across differently-sized packages of the same family.
pub trait PadId: Copy + Eq + 'static {
    /// The pad's symbolic name, e.g. `"PA0"`.
    fn tag(&self) -> &'static str;

    /// `true` iff this pad's tag appears in `names`.
    fn is_in_set(&self, names: &[&str]) -> bool {
        names.iter().any(|n| *n == self.tag())
    }
}

/// A DMA channel, supplied by the chip crate. Ordinary (discriminant)
/// equality is sufficient here -- unlike pads, generic code never needs to
/// probe for channels by name.
pub trait Channel: Copy + Eq + 'static {}

/// GPIO pin electrical characteristics the chip crate must support
/// configuring. Chips that don't support a particular slew rate or
/// termination option simply give their enum fewer variants; requesting
/// one that doesn't exist is then a compile error at the call site.
pub trait SlewRate: Copy + 'static {}
pub trait DriveMode: Copy + 'static {}
pub trait TerminationMode: Copy + 'static {}

/// Direction a pad (or a whole bus) is currently configured for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Low-level GPIO register access, implemented once per chip.
///
/// `PortDataType` is the chip's native port-word width (`u16` for a
/// 16-pin STM32 port, `u32` for a 32-pin one, ...); [`crate::gpio`]
/// operates generically over it.
pub trait Gpio {
    type PadId: PadId;
    type Port: Copy + Eq;
    type PortDataType: Copy
        + Eq
        + Default
        + core::ops::BitAnd<Output = Self::PortDataType>
        + core::ops::BitOr<Output = Self::PortDataType>
        + core::ops::Not<Output = Self::PortDataType>
        + core::ops::Shl<u32, Output = Self::PortDataType>;
    type SlewRate: SlewRate;
    type DriveMode: DriveMode;
    type TerminationMode: TerminationMode;

    /// The value of a single set bit in [`Self::PortDataType`]; shifted
    /// left by a pad's offset to build that pad's mask within its port.
    const PORT_DATA_ONE: Self::PortDataType;
    /// The "floating" termination variant, applied when a bus is torn
    /// down and its pads returned to an unconfigured state.
    const FLOAT_TERMINATION: Self::TerminationMode;

    fn ensure_ports_enabled(pads: &[Self::PadId]);
    fn configure_as_input(pad: Self::PadId);
    fn configure_as_output(pad: Self::PadId);
    fn configure_as_unused(pad: Self::PadId);
    fn configure_slew_rate(pad: Self::PadId, slew: Self::SlewRate);
    fn configure_drive_mode(pad: Self::PadId, drive: Self::DriveMode);
    fn configure_termination(pad: Self::PadId, termination: Self::TerminationMode);

    fn read_input(pad: Self::PadId) -> bool;
    fn write_output(pad: Self::PadId, level: bool);
    fn is_output(pad: Self::PadId) -> bool;

    fn get_io_port(pad: Self::PadId) -> Self::Port;
    fn get_offset(pad: Self::PadId) -> u32;

    /// Batch form of [`Self::get_io_port`], one lookup per pad in `pads`.
    /// [`crate::gpio::Bus`] calls this once at bus construction time
    /// instead of looping the single-pad form, so a chip crate whose port
    /// lookup touches shared state (a lock, a lazily-initialised table)
    /// only has to pay for that once per bus, not once per pad. The
    /// default just maps [`Self::get_io_port`] over `pads`; override it
    /// when batching genuinely saves work.
    fn get_io_ports<const N: usize>(pads: [Self::PadId; N]) -> [Self::Port; N] {
        pads.map(Self::get_io_port)
    }

    fn read_input_port(port: Self::Port) -> Self::PortDataType;
    fn read_output_port(port: Self::Port) -> Self::PortDataType;
    fn modify_output_port(port: Self::Port, clear: Self::PortDataType, set: Self::PortDataType);
}

/// Clock-tree queries, parametrised by the same tick and microtick
/// frequencies as the [`crate::tick::Tick`]/[`crate::tick::Microtick`]
/// values it hands back. A chip crate picks concrete frequencies with
/// `impl Clocks<1_000, 48_000_000> for Stm32h7Clocks`; a board built
/// against the wrong chip's clock assumptions then fails to type-check
/// (the const generics on the `Tick`/`Microtick` it constructs won't
/// match what the rest of the board expects) rather than misbehaving at
/// runtime.
pub trait Clocks<const TICK_FREQ_HZ: u64, const MICROTICK_FREQ_HZ: u64> {
    /// The chip crate's user-facing clock-tree configuration (crystal
    /// source, PLL multipliers/dividers, and the like).
    type UserConfig;
    /// The resolved, chip-specific frequency table [`Self::parse_config`]
    /// folds a [`Self::UserConfig`] down to: one `<domain>_frequency_hz`
    /// field per clock domain the chip exposes.
    type ParsedConfig;

    /// Resets the clock tree to its power-on default configuration. The
    /// framework's startup routine calls this before any peripheral is
    /// brought up, undoing whatever state a debugger-attached reset (or a
    /// prior run) left behind.
    fn reset_config();

    /// Validates and resolves `user_config` into a concrete per-domain
    /// frequency table. Chip crates are expected to implement this so it
    /// can be called from a `const` binding; an unsatisfiable
    /// configuration (a PLL input that doesn't divide evenly, a domain
    /// above its maximum frequency, ...) then becomes a compile-time
    /// diagnostic rather than a runtime one, per the tiering in this
    /// crate's error-handling design.
    fn parse_config(user_config: Self::UserConfig) -> Self::ParsedConfig;

    fn current_tick() -> crate::tick::Tick<TICK_FREQ_HZ>;
    fn current_microtick() -> crate::tick::Microtick<MICROTICK_FREQ_HZ>;

    /// A compile-time-known peripheral clock frequency, keyed by a
    /// chip-supplied domain enum (e.g. `Domain::Apb1`, `Domain::Usart2`).
    fn get_frequency<D: Copy>(domain: D) -> u64
    where
        Self: ClockDomainQuery<D>,
    {
        <Self as ClockDomainQuery<D>>::frequency_hz(domain)
    }

    /// Busy-waits until [`Self::current_tick`] is at or past `deadline`.
    /// The only coarse-tick timeout primitive the framework offers --
    /// there is no scheduler to park on.
    fn block_until_tick(deadline: crate::tick::Tick<TICK_FREQ_HZ>) {
        while !Self::current_tick().is_after(deadline) {}
    }

    /// As [`Self::block_until_tick`], against the fine-grained counter.
    /// JTAG clock-pulse half periods are timed with this.
    fn block_until_microtick(deadline: crate::tick::Microtick<MICROTICK_FREQ_HZ>) {
        while !Self::current_microtick().is_after(deadline) {}
    }
}

/// Per-domain frequency lookup; a chip crate implements this once per
/// clock-domain enum it exposes. Split out from [`Clocks`] so the domain
/// type can vary chip-to-chip without infecting `Clocks` itself with a
/// type parameter every caller has to repeat.
pub trait ClockDomainQuery<D> {
    fn frequency_hz(domain: D) -> u64;
}

/// Interrupt controller access.
pub trait Interrupts {
    type Kind: Copy + Eq + 'static;

    fn set_enabled(kind: Self::Kind, enabled: bool);
    fn set_priority(kind: Self::Kind, priority: u8);

    fn are_globally_enabled() -> bool {
        true
    }
    fn set_globally_enabled(_enabled: bool) {}

    fn set_pending(_kind: Self::Kind) {}
    fn is_pending(_kind: Self::Kind) -> bool {
        false
    }

    fn wait_for_interrupt() {}
}

/// A read error observable on the simplified (single-byte) UART read
/// path. A subset of these also apply to the buffered interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UartReadError {
    Overrun,
    ParityError,
    FramingError,
    BreakInterrupt,
    NoiseError,
}

/// The narrowest possible chip UART primitive: byte-at-a-time,
/// blocking-only. [`crate::uart`] synthesizes every richer capability
/// (slices, non-blocking, capacity queries) from whatever subset of
/// `rx`/`tx`/`can_read`/`can_write`/etc. the chip crate actually
/// implements, via the marker traits in that module.
pub trait UartImpl {
    /// Baud rate, parity, stop bits, and whatever else this chip's UART
    /// takes to bring a port up. Chip crates typically make this a plain
    /// struct of fields rather than a builder -- the whole thing is
    /// expected to be a `const` value at most call sites.
    type Config;

    /// Applies `config` to the underlying hardware. Implementations
    /// reprogram the baud-rate divisor and frame format every call, so
    /// calling this again with a different `Config` reconfigures a
    /// running port rather than requiring `stop`/`deinit` first.
    fn init(&mut self, config: Self::Config);
    fn start(&mut self);
    fn stop(&mut self);
    fn deinit(&mut self);
}
