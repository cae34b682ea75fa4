// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A capability-discovering front-end over heterogeneous chip UART
//! implementations.
//!
//! A chip crate implements only the byte-at-a-time primitives its
//! hardware actually supports (`RxByte`/`TxByte`/`GetReadError`, plus
//! whichever of `RxAvailability`/`TxAvailability` it can report). The
//! marker traits below (`HasBlockingRead` and friends) are blanket-impl'd
//! from those primitives, and [`UartFrontend`] exposes a method only when
//! the wrapped chip type satisfies the matching marker -- calling
//! `read_non_blocking` on a chip that can't report RX availability is a
//! missing-method compile error, not a runtime failure.

use crate::chip::{UartImpl, UartReadError};

crate::ringbuf!(TRACE: Option<UartReadError>, 8, None);

/// Traces a read error into [`TRACE`] and, if the application has
/// installed a logger, reports it through the `log` facade too.
fn trace_read_error(err: UartReadError) {
    crate::ringbuf_entry!(TRACE, Some(err));
    log::warn!("uart read error: {err:?}");
}

/// Byte-at-a-time blocking receive.
pub trait RxByte {
    /// Receives one byte, blocking until one is available or an error is
    /// latched.
    fn rx(&mut self) -> Result<u8, UartReadError>;
}

/// Byte-at-a-time blocking transmit.
pub trait TxByte {
    /// Transmits one byte, blocking until room is available.
    fn tx(&mut self, byte: u8);
}

/// Sticky read-error reporting. Implementations must keep reporting the
/// same error from both `rx` and `get_read_error` until `clear_read_error`
/// acknowledges it -- this is what lets [`UartFrontend`] defer error
/// handling until previously-buffered good data has been consumed.
pub trait GetReadError {
    fn get_read_error(&self) -> Option<UartReadError>;
    fn clear_read_error(&mut self, error: UartReadError);
}

/// RX availability, in either of two equivalent forms. A chip crate
/// implements at least one method; the other is derived from it. Leaving
/// both at their defaults is not a compile error, but each default calls
/// the other, so it recurses forever at runtime -- implementors must
/// override at least one.
pub trait RxAvailability {
    fn can_read(&self) -> bool {
        self.get_rx_bytes_available() > 0
    }
    fn get_rx_bytes_available(&self) -> usize {
        usize::from(self.can_read())
    }
}

/// TX availability; see [`RxAvailability`] for the same override contract.
pub trait TxAvailability {
    fn can_write(&self) -> bool {
        self.get_tx_bytes_available() > 0
    }
    fn get_tx_bytes_available(&self) -> usize {
        usize::from(self.can_write())
    }
}

/// A chip that can report a byte without consuming it.
pub trait Peek {
    fn peek(&self) -> Result<u8, UartReadError>;
}

/// Blanket marker: this chip type supports `read_blocking`.
pub trait HasBlockingRead: RxByte + GetReadError {}
impl<T: RxByte + GetReadError> HasBlockingRead for T {}

/// Blanket marker: this chip type supports `read_non_blocking`.
pub trait HasNonBlockingRead: RxByte + GetReadError + RxAvailability {}
impl<T: RxByte + GetReadError + RxAvailability> HasNonBlockingRead for T {}

/// Blanket marker: this chip type supports `write_blocking`.
pub trait HasBlockingWrite: TxByte {}
impl<T: TxByte> HasBlockingWrite for T {}

/// Blanket marker: this chip type supports `write_non_blocking`.
pub trait HasNonBlockingWrite: TxByte + TxAvailability {}
impl<T: TxByte + TxAvailability> HasNonBlockingWrite for T {}

/// Blanket marker: this chip type supports `peek`.
pub trait HasPeek: Peek {}
impl<T: Peek> HasPeek for T {}

/// Blanket marker: this chip type can report RX buffer occupancy.
pub trait HasRxAvailable: RxAvailability {}
impl<T: RxAvailability> HasRxAvailable for T {}

/// Blanket marker: this chip type can report TX buffer headroom.
pub trait HasTxAvailable: TxAvailability {}
impl<T: TxAvailability> HasTxAvailable for T {}

/// Error from a non-blocking read: either the simplified read errors, or
/// "no data yet".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NonBlockingReadError {
    WouldBlock,
    Read(UartReadError),
}

/// "No room yet" -- the only way a non-blocking write can fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WouldBlock;

/// The uniform front-end over a chip-specific UART implementation `U`.
/// Every method beyond the plain lifecycle is gated on `U` implementing
/// the matching `Has*` marker trait.
pub struct UartFrontend<U> {
    inner: U,
}

impl<U: UartImpl> UartFrontend<U> {
    pub fn new(inner: U) -> Self {
        Self { inner }
    }

    pub fn init(&mut self, config: U::Config) {
        self.inner.init(config);
    }

    pub fn start(&mut self) {
        self.inner.start();
    }

    pub fn stop(&mut self) {
        self.inner.stop();
    }

    pub fn deinit(mut self) {
        self.inner.deinit();
    }
}

impl<U: HasBlockingRead> UartFrontend<U> {
    /// Fills `buf` with received bytes, blocking until all are received
    /// or an error interrupts the run.
    ///
    /// Returns the number of bytes placed into `buf` before an error (if
    /// any); an error encountered after at least one good byte is *not*
    /// returned here, so it surfaces on the next call instead of
    /// discarding already-received data.
    pub fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, UartReadError> {
        if let Some(err) = self.inner.get_read_error() {
            self.inner.clear_read_error(err);
            trace_read_error(err);
            return Err(err);
        }
        for (i, slot) in buf.iter_mut().enumerate() {
            match self.inner.rx() {
                Ok(byte) => *slot = byte,
                Err(err) => {
                    if i == 0 {
                        self.inner.clear_read_error(err);
                        trace_read_error(err);
                        return Err(err);
                    }
                    return Ok(i);
                }
            }
        }
        Ok(buf.len())
    }
}

impl<U: HasNonBlockingRead> UartFrontend<U> {
    /// As [`Self::read_blocking`], but returns `WouldBlock` instead of
    /// blocking when no data is available and nothing has been read yet.
    pub fn read_non_blocking(&mut self, buf: &mut [u8]) -> Result<usize, NonBlockingReadError> {
        if let Some(err) = self.inner.get_read_error() {
            self.inner.clear_read_error(err);
            trace_read_error(err);
            return Err(NonBlockingReadError::Read(err));
        }
        for (i, slot) in buf.iter_mut().enumerate() {
            if !self.inner.can_read() {
                if i == 0 {
                    return Err(NonBlockingReadError::WouldBlock);
                }
                return Ok(i);
            }
            match self.inner.rx() {
                Ok(byte) => *slot = byte,
                Err(err) => {
                    if i == 0 {
                        self.inner.clear_read_error(err);
                        trace_read_error(err);
                        return Err(NonBlockingReadError::Read(err));
                    }
                    return Ok(i);
                }
            }
        }
        Ok(buf.len())
    }
}

impl<U: HasBlockingWrite> UartFrontend<U> {
    /// Transmits every byte in `buf`, blocking as needed.
    pub fn write_blocking(&mut self, buf: &[u8]) {
        for &byte in buf {
            self.inner.tx(byte);
        }
    }
}

impl<U: HasNonBlockingWrite> UartFrontend<U> {
    /// Transmits as many bytes of `buf` as currently fit, returning
    /// `WouldBlock` instead of blocking when none fit and nothing has
    /// been written yet.
    pub fn write_non_blocking(&mut self, buf: &[u8]) -> Result<usize, WouldBlock> {
        for (i, &byte) in buf.iter().enumerate() {
            if !self.inner.can_write() {
                if i == 0 {
                    return Err(WouldBlock);
                }
                return Ok(i);
            }
            self.inner.tx(byte);
        }
        Ok(buf.len())
    }
}

impl<U: HasPeek> UartFrontend<U> {
    /// Reports the next byte without consuming it.
    pub fn peek(&self) -> Result<u8, UartReadError> {
        self.inner.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use std::vec::Vec;

    struct FakeUart {
        queue: Vec<Result<u8, UartReadError>>,
        sticky: Option<UartReadError>,
        tx_log: Vec<u8>,
        rx_budget: usize,
    }

    impl FakeUart {
        fn new(queue: Vec<Result<u8, UartReadError>>) -> Self {
            Self {
                queue,
                sticky: None,
                tx_log: Vec::new(),
                rx_budget: usize::MAX,
            }
        }
    }

    impl UartImpl for FakeUart {
        type Config = ();

        fn init(&mut self, _config: ()) {}
        fn start(&mut self) {}
        fn stop(&mut self) {}
        fn deinit(&mut self) {}
    }

    impl RxByte for FakeUart {
        fn rx(&mut self) -> Result<u8, UartReadError> {
            if let Some(err) = self.sticky {
                return Err(err);
            }
            match self.queue.first().copied() {
                None => Err(UartReadError::FramingError),
                Some(Ok(byte)) => {
                    self.queue.remove(0);
                    Ok(byte)
                }
                Some(Err(err)) => {
                    self.queue.remove(0);
                    self.sticky = Some(err);
                    Err(err)
                }
            }
        }
    }

    impl GetReadError for FakeUart {
        fn get_read_error(&self) -> Option<UartReadError> {
            self.sticky
        }
        fn clear_read_error(&mut self, error: UartReadError) {
            if self.sticky == Some(error) {
                self.sticky = None;
            }
        }
    }

    impl RxAvailability for FakeUart {
        fn can_read(&self) -> bool {
            self.rx_budget > 0 && (self.sticky.is_some() || !self.queue.is_empty())
        }
    }

    impl TxByte for FakeUart {
        fn tx(&mut self, byte: u8) {
            self.tx_log.push(byte);
        }
    }

    #[test]
    fn read_blocking_returns_good_bytes_then_stops_at_error() {
        let mut fe = UartFrontend::new(FakeUart::new(
            [Ok(0x41), Err(UartReadError::Overrun), Ok(0x42)].into(),
        ));
        let mut buf = [0u8; 3];
        assert_eq!(fe.read_blocking(&mut buf), Ok(1));
        assert_eq!(buf[0], 0x41);

        assert_eq!(fe.read_blocking(&mut buf), Err(UartReadError::Overrun));

        assert_eq!(fe.read_blocking(&mut buf), Ok(1));
        assert_eq!(buf[0], 0x42);
    }

    #[test]
    fn read_blocking_reports_error_immediately_when_it_is_the_first_byte() {
        let mut fe = UartFrontend::new(FakeUart::new([Err(UartReadError::ParityError)].into()));
        let mut buf = [0u8; 1];
        assert_eq!(fe.read_blocking(&mut buf), Err(UartReadError::ParityError));
    }

    #[test]
    fn read_non_blocking_reports_would_block_with_no_data() {
        let mut fe = UartFrontend::new(FakeUart::new(Vec::new()));
        fe.inner.rx_budget = 0;
        let mut buf = [0u8; 4];
        assert_eq!(
            fe.read_non_blocking(&mut buf),
            Err(NonBlockingReadError::WouldBlock)
        );
    }

    #[test]
    fn write_blocking_transmits_every_byte_in_order() {
        let mut fe = UartFrontend::new(FakeUart::new(Vec::new()));
        fe.write_blocking(&[1, 2, 3]);
        assert_eq!(fe.inner.tx_log.as_slice(), &[1, 2, 3]);
    }
}
