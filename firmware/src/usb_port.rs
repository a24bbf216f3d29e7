//! USB CDC-ACM serial port adapters.

use bridge_core::{UsbReceiver, UsbTransmitter};
use defmt::{trace, warn};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_time::{with_timeout, Duration};
use embassy_usb::class::cdc_acm::{CdcAcmClass, Sender, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::Builder;
use heapless::Vec;

use crate::{USB_MAX_PACKET_SIZE, USB_TX_BUFFER_SIZE};

type UsbDriver<'d> = Driver<'d, USB>;

/// One packet received from the host, handed to the bridge synchronously.
pub struct UsbRxPacket<'a> {
    data: &'a [u8],
}

impl<'a> UsbRxPacket<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl UsbReceiver for UsbRxPacket<'_> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        n
    }
}

/// USB serial transmitter.
///
/// Writes land in a local buffer; [`flush`](UsbTransmitter::flush) sends it
/// packet by packet. A packet the host does not take within the flush
/// timeout stays buffered, so a port nobody reads fills up and pushes back
/// on the send relay instead of blocking it.
pub struct UsbTxPort<'d> {
    sender: Sender<'d, UsbDriver<'d>>,
    buffer: Vec<u8, USB_TX_BUFFER_SIZE>,
    flush_timeout: Duration,
}

impl<'d> UsbTxPort<'d> {
    /// Create a transmitter on the CDC-ACM sender.
    pub fn new(sender: Sender<'d, UsbDriver<'d>>, flush_timeout: Duration) -> Self {
        Self {
            sender,
            buffer: Vec::new(),
            flush_timeout,
        }
    }

    /// Drop the first `sent` buffered bytes.
    fn consume(&mut self, sent: usize) {
        let len = self.buffer.len();
        self.buffer.rotate_left(sent);
        self.buffer.truncate(len - sent);
    }
}

impl UsbTransmitter for UsbTxPort<'_> {
    fn write_available(&self) -> usize {
        self.buffer.capacity() - self.buffer.len()
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.write_available());
        if self.buffer.extend_from_slice(&data[..n]).is_err() {
            return 0;
        }
        n
    }

    async fn flush(&mut self) {
        let len = self.buffer.len();
        let max = usize::from(self.sender.max_packet_size());
        let mut sent = 0;

        while sent < len {
            let end = (sent + max).min(len);
            let packet = &self.buffer[sent..end];
            match with_timeout(self.flush_timeout, self.sender.write_packet(packet)).await {
                Ok(Ok(())) => sent = end,
                Ok(Err(EndpointError::Disabled)) => {
                    warn!("USB disconnected, dropping {} bytes", len - sent);
                    sent = len;
                }
                Ok(Err(EndpointError::BufferOverflow)) => {
                    warn!("USB packet too large, dropping {} bytes", end - sent);
                    sent = end;
                }
                Err(_) => {
                    trace!("USB host not reading");
                    break;
                }
            }
        }

        // A transfer ending on a packet boundary needs a zero-length packet.
        if sent == len && sent > 0 && sent % max == 0 {
            let _ = with_timeout(self.flush_timeout, self.sender.write_packet(&[])).await;
        }
        self.consume(sent);
    }
}

/// Configure the CDC-ACM class in the USB builder.
///
/// Returns the class for the application to split into sender and receiver.
pub fn configure_usb_serial<'d>(
    builder: &mut Builder<'d, UsbDriver<'d>>,
    state: &'d mut State<'d>,
) -> CdcAcmClass<'d, UsbDriver<'d>> {
    CdcAcmClass::new(builder, state, USB_MAX_PACKET_SIZE)
}
