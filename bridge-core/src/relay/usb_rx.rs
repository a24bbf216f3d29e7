use crate::config::USB_RX_CHUNK_SIZE;
use crate::stats::BridgeStats;
use crate::uart::UartTransmitter;
use crate::usb::UsbReceiver;

/// Copy the bytes the host just sent straight to the UART.
///
/// Called from the USB data-received notification. Reads at most
/// [`USB_RX_CHUNK_SIZE`] bytes and writes them synchronously; a short UART
/// write is logged and counted but not retried, so the USB side is never
/// held up. Returns the number of bytes written to the UART.
pub fn relay_usb_to_uart<U, T>(usb: &mut U, uart: &mut T, stats: &BridgeStats) -> usize
where
    U: UsbReceiver,
    T: UartTransmitter,
{
    let mut buf = [0u8; USB_RX_CHUNK_SIZE];
    let received = usb.read(&mut buf);
    if received == 0 {
        warn!("USB receive notification without data");
        return 0;
    }

    debug!("USB -> UART ({} bytes)", received);
    let transferred = uart.write(&buf[..received]);
    if transferred != received {
        warn!(
            "UART write transferred {} of {} bytes only!",
            transferred,
            received
        );
        stats.record_uart_short_write();
    }
    transferred
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::relay::mocks::{MockUartTx, MockUsbRx};

    #[test]
    fn test_packet_is_written_to_uart() {
        let stats = BridgeStats::new();
        let mut usb = MockUsbRx::default();
        usb.pending.extend(b"AT\r\n".iter().copied());
        let mut uart = MockUartTx::new();

        assert_eq!(relay_usb_to_uart(&mut usb, &mut uart, &stats), 4);
        assert_eq!(*uart.written.lock().unwrap(), b"AT\r\n");
        assert_eq!(stats.snapshot().uart_tx_short_writes, 0);
    }

    #[test]
    fn test_read_is_bounded_per_notification() {
        let stats = BridgeStats::new();
        let mut usb = MockUsbRx::default();
        usb.pending.extend(core::iter::repeat(7u8).take(100));
        let mut uart = MockUartTx::new();

        assert_eq!(
            relay_usb_to_uart(&mut usb, &mut uart, &stats),
            USB_RX_CHUNK_SIZE
        );
        assert_eq!(usb.pending.len(), 100 - USB_RX_CHUNK_SIZE);
    }

    #[test]
    fn test_short_uart_write_is_counted_not_retried() {
        let stats = BridgeStats::new();
        let mut usb = MockUsbRx::default();
        usb.pending.extend(b"0123456789".iter().copied());
        let mut uart = MockUartTx::new();
        uart.limit = 6;

        assert_eq!(relay_usb_to_uart(&mut usb, &mut uart, &stats), 6);
        assert_eq!(*uart.written.lock().unwrap(), b"012345");
        assert!(usb.pending.is_empty());
        assert_eq!(stats.snapshot().uart_tx_short_writes, 1);
    }

    #[test]
    fn test_empty_notification_is_ignored() {
        let stats = BridgeStats::new();
        let mut usb = MockUsbRx::default();
        let mut uart = MockUartTx::new();

        assert_eq!(relay_usb_to_uart(&mut usb, &mut uart, &stats), 0);
        assert!(uart.written.lock().unwrap().is_empty());
    }
}
