use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};

use crate::config::{BridgeConfig, UART_CHUNK_SIZE};
use crate::relay::DataPath;
use crate::uart::{UartEvent, UartReceiver};

/// Moves bytes received on the UART into the byte queue.
///
/// Runs in its own task and waits on the UART driver's events. Received
/// bytes are read in [`UART_CHUNK_SIZE`] pieces and queued with a short
/// timeout. When the queue stays full the piece is dropped and the relay
/// backs off, so the driver keeps being drained even if the USB side stalls.
///
/// While the bridge is disabled, received bytes are read and discarded.
pub struct UartReceiveRelay<'a, M: RawMutex, U, const N: usize> {
    path: &'a DataPath<M, N>,
    uart: U,
    push_timeout: Duration,
    push_backoff: Duration,
    scratch: [u8; UART_CHUNK_SIZE],
}

impl<'a, M: RawMutex, U: UartReceiver, const N: usize> UartReceiveRelay<'a, M, U, N> {
    /// Create a relay feeding `path` from `uart`.
    pub fn new(path: &'a DataPath<M, N>, uart: U, config: &BridgeConfig) -> Self {
        Self {
            path,
            uart,
            push_timeout: config.push_timeout,
            push_backoff: config.push_backoff,
            scratch: [0; UART_CHUNK_SIZE],
        }
    }

    /// Relay UART events forever.
    pub async fn run(&mut self) -> ! {
        loop {
            let event = self.uart.next_event().await;
            self.handle_event(event).await;
            yield_now().await;
        }
    }

    /// Handle a single driver event.
    pub async fn handle_event(&mut self, event: UartEvent) {
        match event {
            UartEvent::DataAvailable(size) => self.forward(size).await,
            UartEvent::FifoOverflow => {
                warn!("UART FIFO overflow");
                self.discard_input();
            }
            UartEvent::BufferFull => {
                warn!("UART ring buffer full");
                self.discard_input();
            }
            UartEvent::LineBreak => {
                warn!("UART RX break");
                self.path.stats().record_uart_line_error();
            }
            UartEvent::ParityError => {
                warn!("UART parity error");
                self.path.stats().record_uart_line_error();
            }
            UartEvent::FramingError => {
                warn!("UART frame error");
                self.path.stats().record_uart_line_error();
            }
            UartEvent::Other(code) => {
                warn!("UART event type: {}", code);
            }
        }
    }

    /// Get a reference to the UART receiver.
    pub fn uart(&self) -> &U {
        &self.uart
    }

    /// Read `size` bytes from the driver and queue them if enabled.
    async fn forward(&mut self, size: usize) {
        let enabled = self.path.is_enabled();
        let mut remaining = size;

        while remaining > 0 {
            let want = remaining.min(self.scratch.len()).min(N);
            let read = match self.uart.read(&mut self.scratch[..want]).await {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) => {
                    warn!("UART read failed: {:?}", e);
                    break;
                }
            };
            remaining -= read.min(remaining);

            if !enabled {
                continue;
            }

            debug!("UART -> queue ({} bytes)", read);
            let queue = self.path.queue();
            if !queue.push(&self.scratch[..read], self.push_timeout).await {
                warn!(
                    "Cannot write to queue (free {} of {})!",
                    queue.free_space(),
                    queue.capacity()
                );
                self.path.stats().record_uart_dropped(read);
                Timer::after(self.push_backoff).await;
            }
        }
    }

    /// Throw away everything the driver holds after an overrun.
    fn discard_input(&mut self) {
        self.uart.flush_input();
        self.uart.discard_events();
        self.path.stats().record_uart_overrun();
    }
}
