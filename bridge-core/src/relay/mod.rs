//! Byte relays between the UART and the USB serial port.
//!
//! - [`UartReceiveRelay`]: UART events → [`ByteQueue`]
//! - [`UsbSendRelay`]: [`ByteQueue`] → USB
//! - [`relay_usb_to_uart`]: USB → UART, synchronous, no buffering

mod uart_rx;
mod usb_rx;
mod usb_tx;

pub use uart_rx::UartReceiveRelay;
pub use usb_rx::relay_usb_to_uart;
pub use usb_tx::UsbSendRelay;

use embassy_sync::blocking_mutex::raw::RawMutex;
use portable_atomic::{AtomicBool, Ordering};

use crate::queue::ByteQueue;
use crate::stats::BridgeStats;

/// State shared by the UART-to-USB relays: the queue between them, the
/// enable flag gating the UART side, and the diagnostic counters.
pub struct DataPath<M: RawMutex, const N: usize> {
    queue: ByteQueue<M, N>,
    enabled: AtomicBool,
    stats: BridgeStats,
}

impl<M: RawMutex, const N: usize> DataPath<M, N> {
    /// Create a disabled data path with an empty queue.
    pub const fn new() -> Self {
        Self {
            queue: ByteQueue::new(),
            enabled: AtomicBool::new(false),
            stats: BridgeStats::new(),
        }
    }

    /// Queue between the UART receive and USB send relays.
    #[inline]
    pub fn queue(&self) -> &ByteQueue<M, N> {
        &self.queue
    }

    /// Diagnostic counters.
    #[inline]
    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Whether UART bytes are forwarded to USB.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Start or stop forwarding UART bytes to USB.
    #[inline]
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

impl<M: RawMutex, const N: usize> Default for DataPath<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    //! Scripted UART and USB drivers shared by the relay tests.

    extern crate std;

    use crate::uart::{BaudRateControl, UartError, UartEvent, UartReceiver, UartTransmitter};
    use crate::usb::{UsbReceiver, UsbTransmitter};
    use core::future::Future;
    use embassy_time::{Duration, Timer};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::vec::Vec;

    /// What the UART receiver sees, in order.
    #[derive(Default)]
    pub struct UartScript {
        pub events: VecDeque<UartEvent>,
        pub rx: VecDeque<u8>,
        pub flushes: usize,
        pub discards: usize,
    }

    impl UartScript {
        /// Make `bytes` readable and announce them with one event.
        pub fn receive(&mut self, bytes: &[u8]) {
            self.rx.extend(bytes.iter().copied());
            self.events.push_back(UartEvent::DataAvailable(bytes.len()));
        }
    }

    #[derive(Clone, Default)]
    pub struct MockUartRx {
        pub script: Arc<Mutex<UartScript>>,
    }

    impl UartReceiver for MockUartRx {
        fn next_event(&mut self) -> impl Future<Output = UartEvent> {
            let script = self.script.clone();
            async move {
                loop {
                    if let Some(event) = script.lock().unwrap().events.pop_front() {
                        return event;
                    }
                    Timer::after(Duration::from_millis(1)).await;
                }
            }
        }

        fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, UartError>> {
            let mut script = self.script.lock().unwrap();
            let mut count = 0;
            while count < buf.len() {
                match script.rx.pop_front() {
                    Some(byte) => {
                        buf[count] = byte;
                        count += 1;
                    }
                    None => break,
                }
            }
            core::future::ready(Ok(count))
        }

        fn flush_input(&mut self) {
            let mut script = self.script.lock().unwrap();
            script.rx.clear();
            script.flushes += 1;
        }

        fn discard_events(&mut self) {
            let mut script = self.script.lock().unwrap();
            script.events.clear();
            script.discards += 1;
        }
    }

    /// UART transmitter accepting at most `limit` bytes per write.
    #[derive(Clone)]
    pub struct MockUartTx {
        pub written: Arc<Mutex<Vec<u8>>>,
        pub limit: usize,
        pub baud: Arc<Mutex<Result<u32, UartError>>>,
    }

    impl MockUartTx {
        pub fn new() -> Self {
            Self {
                written: Arc::default(),
                limit: usize::MAX,
                baud: Arc::new(Mutex::new(Ok(115_200))),
            }
        }
    }

    impl UartTransmitter for MockUartTx {
        fn write(&mut self, bytes: &[u8]) -> usize {
            let n = bytes.len().min(self.limit);
            self.written.lock().unwrap().extend_from_slice(&bytes[..n]);
            n
        }
    }

    impl BaudRateControl for MockUartTx {
        fn set_baudrate(&mut self, baud: u32) -> Result<(), UartError> {
            let mut current = self.baud.lock().unwrap();
            match *current {
                Ok(_) => {
                    *current = Ok(baud);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
    }

    /// USB receiver handing out one pending host packet.
    #[derive(Default)]
    pub struct MockUsbRx {
        pub pending: VecDeque<u8>,
    }

    impl UsbReceiver for MockUsbRx {
        fn read(&mut self, buf: &mut [u8]) -> usize {
            let mut count = 0;
            while count < buf.len() {
                match self.pending.pop_front() {
                    Some(byte) => {
                        buf[count] = byte;
                        count += 1;
                    }
                    None => break,
                }
            }
            count
        }
    }

    /// USB endpoint with a bounded transmit buffer.
    ///
    /// A flush moves the buffered bytes to `host` only while the host is
    /// draining, otherwise they stay buffered.
    #[derive(Default)]
    pub struct UsbLink {
        pub buffered: Vec<u8>,
        pub host: Vec<u8>,
        pub capacity: usize,
        pub draining: bool,
        pub flushes: usize,
    }

    #[derive(Clone)]
    pub struct MockUsbTx {
        pub link: Arc<Mutex<UsbLink>>,
    }

    impl MockUsbTx {
        pub fn new(capacity: usize, draining: bool) -> Self {
            Self {
                link: Arc::new(Mutex::new(UsbLink {
                    capacity,
                    draining,
                    ..UsbLink::default()
                })),
            }
        }

        pub fn host_bytes(&self) -> Vec<u8> {
            self.link.lock().unwrap().host.clone()
        }
    }

    impl UsbTransmitter for MockUsbTx {
        fn write_available(&self) -> usize {
            let link = self.link.lock().unwrap();
            link.capacity - link.buffered.len()
        }

        fn write(&mut self, data: &[u8]) -> usize {
            let mut link = self.link.lock().unwrap();
            let n = data.len().min(link.capacity - link.buffered.len());
            link.buffered.extend_from_slice(&data[..n]);
            n
        }

        fn flush(&mut self) -> impl Future<Output = ()> {
            let mut link = self.link.lock().unwrap();
            link.flushes += 1;
            if link.draining {
                let sent: Vec<u8> = link.buffered.drain(..).collect();
                link.host.extend(sent);
            }
            core::future::ready(())
        }
    }
}
