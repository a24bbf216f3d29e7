//! USB serial (CDC-ACM) transport traits.

use core::future::Future;

/// Host-to-device side of the USB serial port.
///
/// Read synchronously from the data-received notification context.
pub trait UsbReceiver {
    /// Copy the bytes received from the host into `buf`.
    ///
    /// Returns the number of bytes copied, zero if nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// Device-to-host side of the USB serial port.
pub trait UsbTransmitter {
    /// Number of bytes the transmit buffer can accept right now.
    fn write_available(&self) -> usize;

    /// Queue `data` for transmission.
    ///
    /// Returns the number of bytes accepted, which may be less than
    /// `data.len()` and may be zero.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Push everything buffered so far out to the host.
    fn flush(&mut self) -> impl Future<Output = ()>;
}
