//! Buffered UART adapters.

use core::task::Poll;

use bridge_core::{BaudRateControl, UartError, UartEvent, UartReceiver, UartTransmitter};
use defmt::{debug, warn};
use embassy_futures::poll_once;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx, Error as RpUartError};
use embedded_io_async::{BufRead, Read};

use crate::MAX_BAUDRATE;

/// Upper bound on ring buffer refills drained by one input flush.
const FLUSH_ROUNDS: usize = 8;

/// UART receiver fed by the interrupt-driven ring buffer.
///
/// The driver keeps no event queue: an event is derived from the state of
/// the ring buffer each time the relay asks for one.
///
/// # Pins
///
/// Uses UART1 by default:
/// - GPIO 8: TX
/// - GPIO 9: RX
pub struct UartRxPort {
    rx: BufferedUartRx,
}

impl UartRxPort {
    /// Wrap the receive half of a buffered UART.
    pub fn new(rx: BufferedUartRx) -> Self {
        Self { rx }
    }
}

impl UartReceiver for UartRxPort {
    async fn next_event(&mut self) -> UartEvent {
        match self.rx.fill_buf().await {
            Ok(buf) => UartEvent::DataAvailable(buf.len()),
            Err(e) => UartEvent::from(uart_error(e)),
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, UartError> {
        Read::read(&mut self.rx, buf).await.map_err(uart_error)
    }

    fn flush_input(&mut self) {
        let mut dropped = 0;
        for _ in 0..FLUSH_ROUNDS {
            let len = match poll_once(self.rx.fill_buf()) {
                Poll::Ready(Ok(buf)) => buf.len(),
                Poll::Ready(Err(_)) => continue,
                Poll::Pending => break,
            };
            self.rx.consume(len);
            dropped += len;
        }
        debug!("UART input flushed ({} bytes)", dropped);
    }

    fn discard_events(&mut self) {
        // Nothing is queued, see the type docs.
    }
}

/// UART transmitter writing through the driver's ring buffer.
pub struct UartTxPort {
    tx: BufferedUartTx,
}

impl UartTxPort {
    /// Wrap the transmit half of a buffered UART.
    pub fn new(tx: BufferedUartTx) -> Self {
        Self { tx }
    }
}

impl UartTransmitter for UartTxPort {
    fn write(&mut self, bytes: &[u8]) -> usize {
        let mut written = 0;
        while written < bytes.len() {
            match self.tx.blocking_write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) => {
                    warn!("UART write failed: {:?}", e);
                    break;
                }
            }
        }
        written
    }
}

impl BaudRateControl for UartTxPort {
    fn set_baudrate(&mut self, baud: u32) -> Result<(), UartError> {
        if baud > MAX_BAUDRATE {
            return Err(UartError::InvalidBaudRate);
        }
        // RX and TX share the divisor registers.
        self.tx.set_baudrate(baud);
        Ok(())
    }
}

/// Convert RP2040 UART errors to the bridge error type.
fn uart_error(e: RpUartError) -> UartError {
    match e {
        RpUartError::Overrun => UartError::Overrun,
        RpUartError::Break => UartError::Break,
        RpUartError::Parity => UartError::Parity,
        RpUartError::Framing => UartError::Framing,
        _ => UartError::Io,
    }
}
