// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registration point for the application's optional panic hook.
//!
//! Fatal invariant violations (double-reservation of a pad or DMA
//! channel, release by a non-owner, `main` returning an error) are raised
//! with an ordinary `panic!()`. The single `#[panic_handler]` linked into
//! the final binary (a board crate's concern, built on `panic-halt` or
//! `panic-semihosting`) is the chokepoint that formats the message, calls
//! the hook installed here if the application installed one, and then
//! traps. Keeping this as a hook rather than a generic parameter threaded
//! through every peripheral type means board code can swap panic behavior
//! (log to a UART, blink an LED, reset) without hal-core knowing about it.

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicPtr, Ordering};

/// Application-supplied panic hook. Called with the `PanicInfo` of the
/// panic that triggered it; must not return (the `#[panic_handler]` traps
/// unconditionally after calling it regardless).
pub type Hook = fn(&PanicInfo);

static HOOK: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Installs the application's panic hook. Last writer wins; typically
/// called once from the application's `init`.
pub fn set_hook(hook: Hook) {
    HOOK.store(hook as *mut (), Ordering::SeqCst);
}

/// Invokes the installed hook, if any, logging the panic regardless.
/// Called by the board crate's `#[panic_handler]`; not normally called
/// directly by application or driver code.
pub fn invoke_hook(info: &PanicInfo) {
    log::error!("panic: {}", info);
    let raw = HOOK.load(Ordering::SeqCst);
    if !raw.is_null() {
        // SAFETY: the only value ever stored is a `Hook` passed to
        // `set_hook`, cast back to its original type.
        let hook: Hook = unsafe { core::mem::transmute(raw) };
        hook(info);
    }
}

/// Raises a fatal internal-invariant violation -- a pad or DMA channel
/// double-reserved, released by a non-owner, or released while never
/// reserved. Every such site in this crate (see [`crate::ledger`]) goes
/// through this function rather than calling `panic!()` directly, so
/// there is exactly one place deciding what "fatal" actually does.
///
/// `args` is logged here (so it reaches `log` even if the linked
/// `#[panic_handler]` doesn't bother formatting its `PanicInfo`), and
/// then handed to an ordinary `panic!()`. On a real board that unwinds
/// into `panic-halt`/`panic-semihosting`, which calls [`invoke_hook`] and
/// then spins behind a compiler fence forever; a host test instead gets
/// the usual unwind, so `#[should_panic]` still works against this path.
#[cold]
pub fn fatal(args: core::fmt::Arguments<'_>) -> ! {
    log::error!("fatal: {}", args);
    panic!("{}", args);
}

/// Formats its arguments and calls [`fatal`]. The one entry point
/// [`crate::ledger`] raises its invariant violations through.
#[macro_export]
macro_rules! panic_fatal {
    ($($arg:tt)*) => {
        $crate::panic::fatal(core::format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hook(_info: &PanicInfo) {}

    #[test]
    fn set_hook_stores_a_callable_pointer() {
        set_hook(test_hook);
        let raw = HOOK.load(Ordering::SeqCst);
        assert!(!raw.is_null());
        // SAFETY: `raw` was just stored by `set_hook(test_hook)` above.
        let hook: Hook = unsafe { core::mem::transmute(raw) };
        assert_eq!(hook as usize, test_hook as usize);
    }
}
