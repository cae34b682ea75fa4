// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed, volatile access to a single memory-mapped register.
//!
//! A [`Reg`] wraps a fixed address and an access class (`ReadWrite`,
//! `ReadOnly`, `WriteOnly`); the access class gates which methods are
//! available at compile time, so e.g. writing a `ReadOnly` register simply
//! does not type-check. `modify` and `toggle` are non-atomic
//! read-modify-write sequences: callers sharing a register with an ISR
//! must wrap them in [`crate::critical_section`].

use core::marker::PhantomData;
use core::ops::{BitAnd, BitOr, BitXor, Not};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// A register width supported by this MMIO layer (8/16/32/64 bits). Sealed:
/// attempting to instantiate [`Reg`] over any other width is a compile
/// error rather than a runtime one.
pub trait RegisterWidth:
    sealed::Sealed
    + Copy
    + PartialEq
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
{
}

impl RegisterWidth for u8 {}
impl RegisterWidth for u16 {}
impl RegisterWidth for u32 {}
impl RegisterWidth for u64 {}

/// Marker: the register may be read.
pub struct ReadOnly;
/// Marker: the register may be written.
pub struct WriteOnly;
/// Marker: the register may be both read and written.
pub struct ReadWrite;

pub trait Readable {}
impl Readable for ReadOnly {}
impl Readable for ReadWrite {}

pub trait Writable {}
impl Writable for WriteOnly {}
impl Writable for ReadWrite {}

/// A set of named bit-fields within a register of width `T`. Implemented by
/// `bitflags!`-generated types; `MASK` covers every bit this field set
/// knows about, so `modify` touches exactly those bits and leaves all
/// others untouched.
pub trait FieldSet<T: RegisterWidth> {
    const MASK: T;
    fn bits(self) -> T;
}

/// A single memory-mapped register at a fixed address.
///
/// # Safety
/// The caller constructing a `Reg` asserts that `addr` is a valid,
/// correctly aligned address for a register of type `T`, for the lifetime
/// of the `Reg` value, and that no other live `Reg`/`&mut T` aliases it
/// except where the chip's register block intentionally exposes shared
/// access (e.g. GPIO output registers also readable as read-back).
pub struct Reg<T, A> {
    addr: *mut T,
    _width: PhantomData<T>,
    _access: PhantomData<A>,
}

// Registers are accessed through volatile loads/stores only; the pointer
// itself carries no thread-affinity, so it's fine to hand a `Reg` across
// an interrupt boundary as long as actual accesses go through a critical
// section where required.
unsafe impl<T, A> Send for Reg<T, A> {}
unsafe impl<T, A> Sync for Reg<T, A> {}

impl<T: RegisterWidth, A> Reg<T, A> {
    /// Constructs a register handle at a fixed address.
    ///
    /// # Safety
    /// See the struct-level safety comment.
    pub const unsafe fn new(addr: *mut T) -> Self {
        Self {
            addr,
            _width: PhantomData,
            _access: PhantomData,
        }
    }
}

impl<T: RegisterWidth, A: Readable> Reg<T, A> {
    /// Performs a single volatile read of the register.
    pub fn read(&self) -> T {
        // SAFETY: `addr` was asserted valid and aligned at construction.
        unsafe { self.addr.read_volatile() }
    }
}

impl<T: RegisterWidth, A: Writable> Reg<T, A> {
    /// Performs a single volatile write of the register.
    pub fn write(&self, value: T) {
        // SAFETY: `addr` was asserted valid and aligned at construction.
        unsafe { self.addr.write_volatile(value) };
    }
}

impl<T: RegisterWidth, A: Readable + Writable> Reg<T, A> {
    /// Reads the register, overwrites only the bits covered by `fields`,
    /// and writes the result back. Non-atomic: two bits belonging to
    /// different field sets can race if modified from foreground and an
    /// ISR without a critical section.
    pub fn modify<F: FieldSet<T>>(&self, fields: F) {
        let current = self.read();
        self.write((current & !F::MASK) | fields.bits());
    }

    /// Reads the register and writes back with each bit in `fields`
    /// inverted. Non-atomic for the same reason as [`modify`].
    pub fn toggle<F: FieldSet<T>>(&self, fields: F) {
        let current = self.read();
        self.write(current ^ fields.bits());
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::cell::Cell;
    use std::boxed::Box;

    bitflags::bitflags! {
        #[derive(Copy, Clone)]
        struct Ctrl: u32 {
            const ENABLE = 1 << 0;
            const RUN    = 1 << 1;
            const RESET  = 1 << 2;
        }
    }

    impl FieldSet<u32> for Ctrl {
        const MASK: u32 = Self::all().bits();
        fn bits(self) -> u32 {
            bitflags::Flags::bits(&self)
        }
    }

    fn fake_reg() -> (&'static Cell<u32>, Reg<u32, ReadWrite>) {
        // A register-shaped memory cell, leaked so its address is 'static
        // for the duration of the test.
        let cell = Box::leak(Box::new(Cell::new(0u32)));
        let reg = unsafe { Reg::new(cell.as_ptr()) };
        (cell, reg)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_cell, reg) = fake_reg();
        reg.write(0xDEAD_BEEF);
        assert_eq!(reg.read(), 0xDEAD_BEEF);
    }

    #[test]
    fn modify_touches_only_named_fields() {
        let (cell, reg) = fake_reg();
        cell.set(0xFFFF_FFF8); // all bits set except ENABLE/RUN/RESET
        reg.modify(Ctrl::ENABLE | Ctrl::RUN);
        assert_eq!(reg.read(), 0xFFFF_FFFB);
    }

    #[test]
    fn toggle_inverts_named_fields_only() {
        let (cell, reg) = fake_reg();
        cell.set(Ctrl::ENABLE.bits());
        reg.toggle(Ctrl::ENABLE | Ctrl::RESET);
        assert_eq!(reg.read(), Ctrl::RESET.bits());
    }
}
