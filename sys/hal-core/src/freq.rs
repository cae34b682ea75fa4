// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Human-readable rendering of a clock frequency.
//!
//! Used wherever a board's `init` logs the frequency table it resolved
//! from [`crate::chip::Clocks`] -- seeing `48 MHz` in a boot log is a lot
//! less error-prone to eyeball than `48000000`.

use core::fmt;

/// Renders `hz` as MHz/kHz/Hz with up to six/three fractional digits,
/// trailing zeros and a trailing `.` trimmed. Implements `Display` so it
/// can be used directly in a `log::info!("clock: {}", Hertz(hz))` call
/// without an intermediate allocation.
pub struct Hertz(pub u64);

impl fmt::Display for Hertz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MHZ: u64 = 1_000_000;
        const KHZ: u64 = 1_000;

        if self.0 == 0 {
            return write!(f, "0 Hz");
        }
        if self.0 >= MHZ {
            write_scaled(f, self.0, MHZ, 6, "MHz")
        } else if self.0 >= KHZ {
            write_scaled(f, self.0, KHZ, 3, "kHz")
        } else {
            write!(f, "{} Hz", self.0)
        }
    }
}

/// Writes `value / scale` with up to `max_frac_digits` fractional digits,
/// trimming trailing zeros (and a now-bare trailing `.`), then `unit`.
fn write_scaled(f: &mut fmt::Formatter<'_>, value: u64, scale: u64, max_frac_digits: u32, unit: &str) -> fmt::Result {
    let whole = value / scale;
    let remainder = value % scale;

    write!(f, "{whole}")?;
    if remainder == 0 {
        return write!(f, " {unit}");
    }

    // `remainder` is out of `scale` total divisions; scale it up to exactly
    // `max_frac_digits` decimal digits, then trim trailing zeros.
    let digit_scale = 10u64.pow(max_frac_digits);
    let mut frac = remainder * digit_scale / scale;
    let mut digits = max_frac_digits;
    while frac % 10 == 0 {
        frac /= 10;
        digits -= 1;
    }

    write!(f, ".{frac:0digits$} {unit}", digits = digits as usize)
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use std::format;

    #[test]
    fn formats_whole_and_fractional_units() {
        assert_eq!(format!("{}", Hertz(12_000_000)), "12 MHz");
        assert_eq!(format!("{}", Hertz(12_345_000)), "12.345 MHz");
        assert_eq!(format!("{}", Hertz(1_234)), "1.234 kHz");
        assert_eq!(format!("{}", Hertz(999)), "999 Hz");
        assert_eq!(format!("{}", Hertz(0)), "0 Hz");
    }

    #[test]
    fn trims_a_lone_trailing_digit_cleanly() {
        assert_eq!(format!("{}", Hertz(1_500_000)), "1.5 MHz");
        assert_eq!(format!("{}", Hertz(48_000_000)), "48 MHz");
    }

    #[test]
    fn six_fractional_digits_for_mhz_three_for_khz() {
        assert_eq!(format!("{}", Hertz(1_000_001)), "1.000001 MHz");
        assert_eq!(format!("{}", Hertz(1_001)), "1.001 kHz");
    }
}
