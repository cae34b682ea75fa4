// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compile-time-shaped, runtime-checked ownership ledgers for pads and DMA
//! channels.
//!
//! Bare-metal code has no dynamic negotiation protocol for shared
//! peripherals, so conflicting configuration is instead caught as early
//! and as loudly as possible: reserving an already-owned key, or releasing
//! one you don't own, is a fatal panic rather than a recoverable error.
//!
//! In a `debug_assertions` build each slot additionally remembers the
//! owner's name, so a conflict panic can name both the prior and the
//! attempted owner. Release builds track only which keys are reserved,
//! trading that diagnostic for a couple of bytes per slot.

/// A postmortem-traceable ledger conflict, recorded into [`TRACE`] just
/// before the matching fatal panic. The panic message itself is present in
/// a crash dump, but a ring buffer entry survives even when the binary was
/// built to elide panic message strings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    None,
    DoubleReservation,
    ReleaseByNonOwner,
    ReleaseUnreserved,
}

crate::ringbuf!(TRACE: Event, 8, Event::None);

/// A fixed-capacity map from `K` to "reserved, and by whom". `N` is the
/// ledger's capacity, fixed at the call site (typically the chip's total
/// pad or DMA channel count).
pub struct Ledger<K, const N: usize> {
    slots: [Slot<K>; N],
}

#[derive(Copy, Clone)]
struct Slot<K> {
    key: Option<K>,
    #[cfg(debug_assertions)]
    owner: &'static str,
}

impl<K: Copy> Slot<K> {
    const fn empty() -> Self {
        Slot {
            key: None,
            #[cfg(debug_assertions)]
            owner: "",
        }
    }
}

impl<K: Copy + PartialEq, const N: usize> Ledger<K, N> {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::empty(); N],
        }
    }

    fn index_of(&self, key: K) -> Option<usize> {
        self.slots.iter().position(|s| matches!(s.key, Some(k) if k == key))
    }

    pub fn is_reserved(&self, key: K) -> bool {
        self.index_of(key).is_some()
    }

    /// Reserves every key in `keys` for `owner`. Checks all keys are free
    /// before reserving any of them, so a conflict never leaves a partial
    /// reservation behind.
    ///
    /// # Panics
    /// Panics if any key in `keys` is already reserved, or if the ledger
    /// has no free slot left.
    pub fn reserve(&mut self, keys: &[K], owner: &'static str) {
        for &key in keys {
            if let Some(idx) = self.index_of(key) {
                crate::ringbuf_entry!(TRACE, Event::DoubleReservation);
                #[cfg(debug_assertions)]
                crate::panic_fatal!(
                    "ledger: double reservation (owned by {:?}, attempted by {:?})",
                    self.slots[idx].owner, owner
                );
                #[cfg(not(debug_assertions))]
                {
                    let _ = idx;
                    crate::panic_fatal!("ledger: double reservation");
                }
            }
        }
        for &key in keys {
            let slot = self
                .slots
                .iter_mut()
                .find(|s| s.key.is_none())
                .expect("ledger: capacity exceeded");
            slot.key = Some(key);
            #[cfg(debug_assertions)]
            {
                slot.owner = owner;
            }
        }
    }

    /// Releases every key in `keys`, previously reserved by `owner`.
    ///
    /// In a `debug_assertions` build, releasing a key reserved by a
    /// different owner is a fatal panic naming both owners. In a release
    /// build the ledger has no owner names to compare, so it only checks
    /// that each key is currently reserved at all.
    ///
    /// # Panics
    /// Panics if any key in `keys` is not currently reserved (or, in a
    /// debug build, is reserved by a different owner).
    pub fn release(&mut self, keys: &[K], owner: &'static str) {
        for &key in keys {
            match self.index_of(key) {
                Some(idx) => {
                    #[cfg(debug_assertions)]
                    if self.slots[idx].owner != owner {
                        crate::ringbuf_entry!(TRACE, Event::ReleaseByNonOwner);
                        crate::panic_fatal!(
                            "ledger: release by non-owner (owned by {:?}, released by {:?})",
                            self.slots[idx].owner, owner
                        );
                    }
                    self.slots[idx].key = None;
                }
                None => {
                    crate::ringbuf_entry!(TRACE, Event::ReleaseUnreserved);
                    crate::panic_fatal!("ledger: release of unreserved key");
                }
            }
        }
    }
}

impl<K: Copy + PartialEq, const N: usize> Default for Ledger<K, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Ledger`] wrapped for safe access as process-wide singleton state,
/// with every mutation funnelled through a critical section so foreground
/// code and interrupts never observe a torn update.
pub struct SharedLedger<K, const N: usize> {
    inner: core::cell::UnsafeCell<Ledger<K, N>>,
}

// SAFETY: every access to `inner` goes through `with_mut`, which holds a
// critical section (interrupts globally disabled) for its duration, so
// there is never more than one live reference to the inner `Ledger`.
unsafe impl<K: Send, const N: usize> Sync for SharedLedger<K, N> {}

impl<K: Copy + PartialEq, const N: usize> SharedLedger<K, N> {
    pub const fn new() -> Self {
        Self {
            inner: core::cell::UnsafeCell::new(Ledger::new()),
        }
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut Ledger<K, N>) -> R) -> R {
        crate::critical_section::with(|| {
            // SAFETY: the critical section guarantees exclusive access.
            f(unsafe { &mut *self.inner.get() })
        })
    }

    pub fn reserve(&self, keys: &[K], owner: &'static str) {
        self.with_mut(|ledger| ledger.reserve(keys, owner));
    }

    pub fn release(&self, keys: &[K], owner: &'static str) {
        self.with_mut(|ledger| ledger.release(keys, owner));
    }

    pub fn is_reserved(&self, key: K) -> bool {
        self.with_mut(|ledger| ledger.is_reserved(key))
    }
}

impl<K: Copy + PartialEq, const N: usize> Default for SharedLedger<K, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Declares a `'static` process-wide [`SharedLedger`], e.g. for a chip
/// crate's pad or DMA channel registry:
///
/// ```
/// # use hal_core::shared_ledger;
/// # #[derive(Copy, Clone, PartialEq)] struct PadId(u8);
/// shared_ledger!(PAD_LEDGER: PadId, 64);
/// assert!(!PAD_LEDGER.is_reserved(PadId(0)));
/// ```
#[macro_export]
macro_rules! shared_ledger {
    ($name:ident : $key:ty, $capacity:expr) => {
        pub static $name: $crate::ledger::SharedLedger<$key, $capacity> =
            $crate::ledger::SharedLedger::new();
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, PartialEq, Debug)]
    struct Pad(u8);

    #[test]
    fn reserve_then_release_is_a_no_op() {
        let mut ledger: Ledger<Pad, 4> = Ledger::new();
        ledger.reserve(&[Pad(0), Pad(1)], "JTAG");
        assert!(ledger.is_reserved(Pad(0)));
        ledger.release(&[Pad(0), Pad(1)], "JTAG");
        assert!(!ledger.is_reserved(Pad(0)));
        assert!(!ledger.is_reserved(Pad(1)));
    }

    #[test]
    #[should_panic(expected = "double reservation")]
    fn double_reservation_is_fatal() {
        let mut ledger: Ledger<Pad, 4> = Ledger::new();
        ledger.reserve(&[Pad(0)], "JTAG");
        ledger.reserve(&[Pad(0)], "Bus leds");
    }

    #[test]
    #[should_panic(expected = "release")]
    fn release_of_unreserved_is_fatal() {
        let mut ledger: Ledger<Pad, 4> = Ledger::new();
        ledger.release(&[Pad(0)], "JTAG");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "non-owner")]
    fn release_by_wrong_owner_is_fatal_in_debug() {
        let mut ledger: Ledger<Pad, 4> = Ledger::new();
        ledger.reserve(&[Pad(0)], "JTAG");
        ledger.release(&[Pad(0)], "Bus leds");
    }

    #[test]
    fn shared_ledger_serializes_through_critical_section() {
        shared_ledger!(TEST_LEDGER: Pad, 4);
        TEST_LEDGER.reserve(&[Pad(2)], "test");
        assert!(TEST_LEDGER.is_reserved(Pad(2)));
        TEST_LEDGER.release(&[Pad(2)], "test");
        assert!(!TEST_LEDGER.is_reserved(Pad(2)));
    }
}
