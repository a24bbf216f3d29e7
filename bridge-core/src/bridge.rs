//! Bridge: the context object tying the relays and the control lines together.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::digital::OutputPin;
use portable_atomic::{AtomicBool, Ordering};

use crate::config::BridgeConfig;
use crate::control::ControlLines;
use crate::queue::ByteQueue;
use crate::relay::{relay_usb_to_uart, DataPath, UartReceiveRelay, UsbSendRelay};
use crate::stats::BridgeStats;
use crate::uart::{BaudRateControl, UartReceiver, UartTransmitter};
use crate::usb::{UsbReceiver, UsbTransmitter};

/// USB-to-UART bridge state.
///
/// Owns the byte queue between the UART receive and USB send relays, the
/// UART transmitter used by the USB receive path, and the BOOT/RESET lines.
/// Everything is reachable through `&self`, so one instance placed in a
/// `static` serves every task.
///
/// The bridge does nothing until [`start`](Self::start) is called: USB data
/// and line-state notifications are ignored and UART bytes are discarded.
pub struct Bridge<M: RawMutex, T, B, R, const N: usize> {
    config: BridgeConfig,
    path: DataPath<M, N>,
    ready: AtomicBool,
    uart_tx: Mutex<M, RefCell<T>>,
    control: ControlLines<M, B, R>,
}

impl<M, T, B, R, const N: usize> Bridge<M, T, B, R, N>
where
    M: RawMutex,
    T: UartTransmitter,
    B: OutputPin,
    R: OutputPin,
{
    /// Create the bridge and release the target's BOOT and RESET lines.
    pub fn new(config: BridgeConfig, uart_tx: T, boot: B, reset: R) -> Result<Self, BridgeError> {
        if N == 0 {
            error!("Byte queue has no capacity");
            return Err(BridgeError::QueueAllocation);
        }
        let control = ControlLines::new(boot, reset, config.debounce).map_err(|e| {
            error!("Cannot release BOOT/RST lines");
            e
        })?;

        Ok(Self {
            config,
            path: DataPath::new(),
            ready: AtomicBool::new(false),
            uart_tx: Mutex::new(RefCell::new(uart_tx)),
            control,
        })
    }

    /// Enable forwarding and start accepting USB notifications.
    pub fn start(&self) {
        self.path.set_enabled(true);
        self.ready.store(true, Ordering::Release);
        info!("USB-UART bridge started ({} byte queue)", N);
    }

    /// Whether [`start`](Self::start) has been called.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Start or stop forwarding UART bytes to USB.
    ///
    /// Host-to-target traffic is not affected.
    pub fn enable(&self, enabled: bool) {
        debug!("UART -> USB forwarding enabled: {}", enabled);
        self.path.set_enabled(enabled);
    }

    /// Whether UART bytes are forwarded to USB.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.path.is_enabled()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn queue(&self) -> &ByteQueue<M, N> {
        self.path.queue()
    }

    pub fn stats(&self) -> &BridgeStats {
        self.path.stats()
    }

    pub fn path(&self) -> &DataPath<M, N> {
        &self.path
    }

    pub fn control(&self) -> &ControlLines<M, B, R> {
        &self.control
    }

    /// Build the relay moving bytes from `uart` into the queue.
    pub fn uart_receive_relay<U: UartReceiver>(&self, uart: U) -> UartReceiveRelay<'_, M, U, N> {
        UartReceiveRelay::new(&self.path, uart, &self.config)
    }

    /// Build the relay draining the queue into `usb`.
    pub fn usb_send_relay<W: UsbTransmitter>(&self, usb: W) -> UsbSendRelay<'_, M, W, N> {
        UsbSendRelay::new(&self.path, usb, &self.config)
    }

    /// Handle a USB data-received notification.
    ///
    /// Returns the number of bytes written to the UART.
    pub fn on_usb_data<U: UsbReceiver>(&self, usb: &mut U) -> usize {
        if !self.is_ready() {
            warn!("USB data received before the bridge is ready");
            return 0;
        }
        self.uart_tx.lock(|tx| {
            let mut tx = tx.borrow_mut();
            relay_usb_to_uart(usb, &mut *tx, self.path.stats())
        })
    }

    /// Handle a DTR/RTS change reported by the host.
    pub fn on_line_state(&self, dtr: bool, rts: bool) {
        if !self.is_ready() {
            warn!("Line state change before the bridge is ready");
            return;
        }
        self.control.on_signal_change(dtr, rts);
    }

    /// Debounce timer service for the control lines. Never returns.
    pub async fn run_debounce_timer(&self) -> ! {
        self.control.run_debounce_timer().await
    }
}

impl<M, T, B, R, const N: usize> Bridge<M, T, B, R, N>
where
    M: RawMutex,
    T: UartTransmitter + BaudRateControl,
    B: OutputPin,
    R: OutputPin,
{
    /// Change the UART baud rate.
    ///
    /// Returns `false` if `baud` is zero or the driver rejects it.
    pub fn set_baudrate(&self, baud: u32) -> bool {
        if baud == 0 {
            warn!("Invalid baud rate 0");
            return false;
        }
        let result = self.uart_tx.lock(|tx| tx.borrow_mut().set_baudrate(baud));
        match result {
            Ok(()) => {
                info!("UART baud rate set to {}", baud);
                true
            }
            Err(e) => {
                warn!("Failed to set baud rate {}: {:?}", baud, e);
                false
            }
        }
    }
}

/// Error type for bridge initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeError {
    /// A BOOT or RESET line could not be driven.
    Gpio,
    /// The byte queue has no capacity.
    QueueAllocation,
}
