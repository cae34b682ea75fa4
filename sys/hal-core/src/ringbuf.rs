// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-capacity ring buffers for postmortem diagnostic tracing.
//!
//! Distinct from the application-facing `log` hook ([`crate::panic`]), this
//! is the internal trace a debug probe (or a JTAG adapter built from this
//! very crate, on some other board) reads out of memory after a panic or a
//! crash with no live logger attached. Entries are `Copy` values recorded
//! into a fixed-size array; once full, the oldest entry is overwritten.
//! Consecutive identical entries are coalesced into a repeat count rather
//! than each taking a fresh slot, so a tight error loop doesn't evict
//! earlier history.
//!
//! Declare one with [`ringbuf!`] and push to it with [`ringbuf_entry!`].
//! This crate uses it to trace ledger conflicts, JTAG best-effort
//! resynchronisation, and UART read errors -- see `ledger.rs`, `jtag.rs`,
//! and `uart/mod.rs`.

/// One recorded occurrence of `T`, plus how many consecutive times in a row
/// it was recorded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Entry<T> {
    pub value: T,
    pub count: u32,
}

struct Inner<T, const N: usize> {
    entries: [Entry<T>; N],
    /// Index the *next* fresh entry will be written to.
    head: usize,
    /// Number of occupied slots, capped at `N`.
    len: usize,
}

/// A fixed-capacity, de-duplicating ring buffer of `N` entries of type `T`,
/// safe to declare as `'static` singleton state and written from both
/// foreground code and interrupt handlers.
pub struct RingBuffer<T, const N: usize> {
    inner: core::cell::UnsafeCell<Inner<T, N>>,
}

// SAFETY: every access to `inner` goes through `record`, which holds a
// critical section for its duration, so there is never more than one live
// reference to the inner array.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T: Copy + PartialEq, const N: usize> RingBuffer<T, N> {
    /// Builds a ring buffer with every slot pre-filled with `seed` at a
    /// repeat count of zero (the seed is never itself reported as a
    /// recorded occurrence; it only exists so every slot has a valid `T`
    /// to start with).
    pub const fn new(seed: T) -> Self {
        Self {
            inner: core::cell::UnsafeCell::new(Inner {
                entries: [Entry { value: seed, count: 0 }; N],
                head: 0,
                len: 0,
            }),
        }
    }

    /// Records `value`. If it's equal to the most recently recorded entry,
    /// that entry's count is incremented in place; otherwise a new entry is
    /// written (overwriting the oldest one if the buffer is full).
    pub fn record(&self, value: T) {
        crate::critical_section::with(|| {
            // SAFETY: the critical section guarantees exclusive access.
            let inner = unsafe { &mut *self.inner.get() };
            if inner.len > 0 {
                let last = (inner.head + N - 1) % N;
                if inner.entries[last].value == value {
                    inner.entries[last].count = inner.entries[last].count.saturating_add(1);
                    return;
                }
            }
            inner.entries[inner.head] = Entry { value, count: 1 };
            inner.head = (inner.head + 1) % N;
            inner.len = (inner.len + 1).min(N);
        });
    }

    /// Returns up to `N` entries in chronological order (oldest first),
    /// for a test or postmortem reader to inspect. Copies out of the
    /// buffer under a critical section rather than exposing a live
    /// reference, since nothing prevents a concurrent `record`.
    pub fn snapshot(&self, out: &mut [Entry<T>; N]) -> usize {
        crate::critical_section::with(|| {
            // SAFETY: as in `record`.
            let inner = unsafe { &*self.inner.get() };
            let start = if inner.len == N { inner.head } else { 0 };
            for i in 0..inner.len {
                out[i] = inner.entries[(start + i) % N];
            }
            inner.len
        })
    }
}

/// Declares a `'static` [`RingBuffer`], e.g.:
///
/// ```
/// # use hal_core::ringbuf;
/// ringbuf!(MY_TRACE: u32, 8, 0);
/// ```
#[macro_export]
macro_rules! ringbuf {
    ($name:ident : $ty:ty, $capacity:expr, $seed:expr) => {
        pub static $name: $crate::ringbuf::RingBuffer<$ty, $capacity> = $crate::ringbuf::RingBuffer::new($seed);
    };
}

/// Records `value` into a ring buffer declared with [`ringbuf!`].
#[macro_export]
macro_rules! ringbuf_entry {
    ($name:expr, $value:expr) => {
        $name.record($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_fill_in_order_and_wrap() {
        ringbuf!(TRACE: u32, 3, 0);
        TRACE.record(1);
        TRACE.record(2);
        TRACE.record(3);
        TRACE.record(4);
        let mut out = [Entry { value: 0, count: 0 }; 3];
        let n = TRACE.snapshot(&mut out);
        assert_eq!(n, 3);
        assert_eq!(out.map(|e| e.value), [2, 3, 4]);
    }

    #[test]
    fn consecutive_duplicates_coalesce_into_a_repeat_count() {
        ringbuf!(TRACE2: u32, 4, 0);
        TRACE2.record(7);
        TRACE2.record(7);
        TRACE2.record(7);
        TRACE2.record(9);
        let mut out = [Entry { value: 0, count: 0 }; 4];
        let n = TRACE2.snapshot(&mut out);
        assert_eq!(n, 2);
        assert_eq!(out[0], Entry { value: 7, count: 3 });
        assert_eq!(out[1], Entry { value: 9, count: 1 });
    }
}
