//! UART driver events, errors and traits.

use core::future::Future;

/// Event reported by the UART driver to the receive relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartEvent {
    /// This many received bytes are ready to be read.
    DataAvailable(usize),
    /// The hardware receive FIFO overflowed.
    FifoOverflow,
    /// The driver's receive buffer is full.
    BufferFull,
    /// A break condition was detected on the RX line.
    LineBreak,
    /// Parity error.
    ParityError,
    /// Framing error.
    FramingError,
    /// Any other driver-specific event code.
    Other(u8),
}

/// Error type for UART operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartError {
    /// Receive overrun.
    Overrun,
    /// Break condition.
    Break,
    /// Parity error.
    Parity,
    /// Framing error.
    Framing,
    /// Baud rate rejected by the driver.
    InvalidBaudRate,
    /// Driver is not configured.
    NotConfigured,
    /// Any other I/O error.
    Io,
}

impl From<UartError> for UartEvent {
    /// Line errors surfaced by a read map onto the matching driver event.
    fn from(err: UartError) -> Self {
        match err {
            UartError::Overrun => UartEvent::FifoOverflow,
            UartError::Break => UartEvent::LineBreak,
            UartError::Parity => UartEvent::ParityError,
            UartError::Framing => UartEvent::FramingError,
            UartError::InvalidBaudRate | UartError::NotConfigured | UartError::Io => {
                UartEvent::Other(0)
            }
        }
    }
}

/// Receive half of the UART driver, owned by the UART receive relay.
pub trait UartReceiver {
    /// Wait for the next driver event.
    fn next_event(&mut self) -> impl Future<Output = UartEvent>;

    /// Read received bytes into `buf`.
    ///
    /// Returns the number of bytes read, at most `buf.len()`.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, UartError>>;

    /// Drop everything in the driver's input buffer.
    fn flush_input(&mut self);

    /// Drop driver events that were queued but not yet delivered.
    fn discard_events(&mut self);
}

/// Transmit half of the UART driver.
pub trait UartTransmitter {
    /// Write `bytes`, blocking until the driver accepted them.
    ///
    /// Returns the number of bytes actually written.
    fn write(&mut self, bytes: &[u8]) -> usize;
}

/// Runtime baud rate changes.
pub trait BaudRateControl {
    /// Reconfigure the UART to `baud` bits per second.
    fn set_baudrate(&mut self, baud: u32) -> Result<(), UartError>;
}
