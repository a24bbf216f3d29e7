use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};

use crate::config::{BridgeConfig, USB_TX_CHUNK_SIZE};
use crate::relay::DataPath;
use crate::usb::UsbTransmitter;

/// Drains the byte queue into the USB serial port.
///
/// Runs in its own task. Each round takes up to [`USB_TX_CHUNK_SIZE`] bytes
/// out of the queue into a local buffer and hands them to the endpoint.
///
/// # Back-pressure
///
/// When the endpoint cannot take the rest of the chunk, the relay flushes,
/// waits briefly and asks again. After `tx_retry_limit` consecutive misses it
/// writes whatever fits, so a port nobody reads on the host side cannot hang
/// the bridge. Every write that moves at least one byte resets the count.
/// If even that best-effort write moves nothing, the rest of the chunk is
/// dropped.
pub struct UsbSendRelay<'a, M: RawMutex, W, const N: usize> {
    path: &'a DataPath<M, N>,
    usb: W,
    pop_timeout: Duration,
    idle_delay: Duration,
    retry_limit: u32,
    retry_delay: Duration,
    chunk: [u8; USB_TX_CHUNK_SIZE],
}

impl<'a, M: RawMutex, W: UsbTransmitter, const N: usize> UsbSendRelay<'a, M, W, N> {
    /// Create a relay draining `path` into `usb`.
    pub fn new(path: &'a DataPath<M, N>, usb: W, config: &BridgeConfig) -> Self {
        Self {
            path,
            usb,
            pop_timeout: config.pop_timeout,
            idle_delay: config.idle_delay,
            retry_limit: config.tx_retry_limit,
            retry_delay: config.tx_retry_delay,
            chunk: [0; USB_TX_CHUNK_SIZE],
        }
    }

    /// Relay queued bytes forever.
    pub async fn run(&mut self) -> ! {
        loop {
            self.poll_once().await;
        }
    }

    /// Take one chunk from the queue and transmit it.
    ///
    /// Sleeps for the idle delay if the queue stayed empty. Returns the
    /// number of bytes handed to the endpoint.
    pub async fn poll_once(&mut self) -> usize {
        let len = self
            .path
            .queue()
            .pop_up_to(&mut self.chunk, self.pop_timeout)
            .await;

        if len == 0 {
            trace!("USB sender: nothing to send");
            Timer::after(self.idle_delay).await;
            return 0;
        }

        self.transmit(len).await
    }

    /// Get a reference to the USB transmitter.
    pub fn usb(&self) -> &W {
        &self.usb
    }

    async fn transmit(&mut self, len: usize) -> usize {
        let mut sent = 0;
        let mut misses = 0u32;

        while sent < len {
            let remaining = len - sent;
            if self.usb.write_available() < remaining {
                misses += 1;
                if misses < self.retry_limit {
                    self.usb.flush().await;
                    Timer::after(self.retry_delay).await;
                    continue;
                }
            }

            let written = self.usb.write(&self.chunk[sent..len]);
            debug!("queue -> USB ({} bytes)", written);
            if written == 0 {
                warn!("USB endpoint not draining, dropping {} bytes", remaining);
                self.path.stats().record_usb_dropped(remaining);
                break;
            }
            sent += written;
            misses = 0;
        }

        self.usb.flush().await;
        sent
    }
}
