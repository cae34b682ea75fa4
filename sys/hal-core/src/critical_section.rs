// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scoped global-interrupt disable, and the backing implementation of the
//! `critical-section` crate for this target.
//!
//! Unlike a hosted task running under an OS, there is nothing between this
//! code and the hardware: a critical section here must actually clear
//! `PRIMASK`. [`enter`] samples whether interrupts were already globally
//! disabled, disables them, and returns a [`Guard`] that restores exactly
//! the sampled state when it is left or dropped.
//!
//! Host builds (this crate's own tests, and the host-runnable demo board)
//! run on a target with no `PRIMASK` to manipulate. There, this module
//! falls back to a software guard that tracks the same "was it enabled"
//! state in a plain `static`, purely so code written against this API can
//! exercise init/deinit sequences that wrap themselves in a critical
//! section the same way on host and on target. The split is on
//! `target_arch`, not `cfg(test)`: a host-run binary linking this crate as
//! an ordinary (non-test) dependency -- e.g. `demo-board` -- must get the
//! software guard too, or it would try to assemble Cortex-M-only
//! instructions for the host's architecture.

#[cfg(target_arch = "arm")]
mod backend {
    use cortex_m::register::primask;

    pub fn acquire() -> bool {
        primask::read().is_active()
    }

    pub fn release(was_enabled: bool) {
        if was_enabled {
            // SAFETY: restoring the exact global-interrupt-enable state
            // that was sampled at the matching `acquire`; this cannot
            // enable interrupts the caller didn't already have enabled.
            unsafe { cortex_m::interrupt::enable() };
        } else {
            cortex_m::interrupt::disable();
        }
    }

    pub fn disable() {
        cortex_m::interrupt::disable();
    }
}

#[cfg(not(target_arch = "arm"))]
mod backend {
    use core::sync::atomic::{AtomicBool, Ordering};

    static ENABLED: AtomicBool = AtomicBool::new(true);

    pub fn acquire() -> bool {
        ENABLED.load(Ordering::SeqCst)
    }

    pub fn release(was_enabled: bool) {
        ENABLED.store(was_enabled, Ordering::SeqCst);
    }

    pub fn disable() {
        ENABLED.store(false, Ordering::SeqCst);
    }
}

/// A held critical section. Restores the interrupt-enable state sampled at
/// [`enter`] when dropped (or when [`Guard::leave`] is called explicitly).
///
/// Guards are strictly LIFO: nesting is fine (the inner guard restores to
/// "disabled", the outer guard then restores to whatever was sampled before
/// either was entered), but a guard must not outlive the scope it was taken
/// in, and must not be held across long-running operations.
#[must_use = "dropping a critical section guard immediately releases it"]
pub struct Guard {
    was_enabled: bool,
}

impl Guard {
    /// Leaves the critical section, restoring the sampled interrupt-enable
    /// state. Equivalent to dropping the guard; spelled out for callers
    /// that want the release to read explicitly at the call site.
    pub fn leave(self) {}
}

impl Drop for Guard {
    fn drop(&mut self) {
        backend::release(self.was_enabled);
    }
}

/// Samples the current global-interrupt-enable state, disables interrupts,
/// and returns a guard that will restore it.
pub fn enter() -> Guard {
    let was_enabled = backend::acquire();
    backend::disable();
    Guard { was_enabled }
}

/// Runs `f` inside a critical section, restoring the prior interrupt-enable
/// state afterward regardless of how `f` returns.
pub fn with<R>(f: impl FnOnce() -> R) -> R {
    let guard = enter();
    let result = f();
    guard.leave();
    result
}

struct HalCriticalSection;
critical_section::set_impl!(HalCriticalSection);

unsafe impl critical_section::Impl for HalCriticalSection {
    #[inline(always)]
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let was_enabled = backend::acquire();
        backend::disable();
        was_enabled as _
    }

    #[inline(always)]
    unsafe fn release(was_enabled: critical_section::RawRestoreState) {
        backend::release(was_enabled != 0);
    }
}
