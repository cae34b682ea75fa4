// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Peripheral composition and protocol layer for bare-metal MCU firmware.
//!
//! This crate is the chip-agnostic "core" of the framework: it turns
//! chip-specific register descriptions (supplied by a separate chip crate
//! implementing the traits in [`chip`]) into safe, compile-time-validated
//! peripheral objects. It owns no interrupt vector table and no memory
//! layout; the program-entry trampoline that runs chip init, this crate's
//! own init, and then a board's `main` is a board-crate concern, outside
//! this crate's scope.
//!
//! Four subsystems make up the core:
//!
//! - [`jtag`] — a bit-banged IEEE 1149.1 TAP state-machine driver.
//! - [`gpio`] — type-parameterised multi-pin bus composition.
//! - [`uart`] — a capability-discovering front-end over heterogeneous chip
//!   UART implementations.
//! - [`ledger`] — compile-time-shaped, runtime-checked ownership registries
//!   for pads and DMA channels.
//!
//! Tests in this crate run on the host against [`hal_chip_sim`], a fake chip
//! implementing [`chip`]'s traits purely in memory.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod chip;
pub mod critical_section;
pub mod freq;
pub mod gpio;
pub mod jtag;
pub mod ledger;
pub mod mmio;
pub mod panic;
pub mod ringbuf;
pub mod tick;
pub mod uart;

pub use critical_section::Guard as CriticalSection;
pub use tick::{Duration, Microtick, Tick};
