//! Diagnostic counters.

use portable_atomic::{AtomicU32, Ordering};

/// Counters for every condition where the bridge degrades instead of failing.
///
/// All counters wrap on overflow.
pub struct BridgeStats {
    uart_bytes_dropped: AtomicU32,
    uart_overruns: AtomicU32,
    uart_line_errors: AtomicU32,
    usb_bytes_dropped: AtomicU32,
    uart_tx_short_writes: AtomicU32,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// UART bytes read but not queued because the queue stayed full.
    pub uart_bytes_dropped: u32,
    /// FIFO overflow and buffer full events.
    pub uart_overruns: u32,
    /// Break, parity and framing events.
    pub uart_line_errors: u32,
    /// Queued bytes the USB side gave up on.
    pub usb_bytes_dropped: u32,
    /// USB-to-UART writes that transferred fewer bytes than received.
    pub uart_tx_short_writes: u32,
}

impl BridgeStats {
    /// Create zeroed counters.
    pub const fn new() -> Self {
        Self {
            uart_bytes_dropped: AtomicU32::new(0),
            uart_overruns: AtomicU32::new(0),
            uart_line_errors: AtomicU32::new(0),
            usb_bytes_dropped: AtomicU32::new(0),
            uart_tx_short_writes: AtomicU32::new(0),
        }
    }

    pub(crate) fn record_uart_dropped(&self, bytes: usize) {
        self.uart_bytes_dropped
            .fetch_add(bytes as u32, Ordering::Relaxed);
    }

    pub(crate) fn record_uart_overrun(&self) {
        self.uart_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_uart_line_error(&self) {
        self.uart_line_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_usb_dropped(&self, bytes: usize) {
        self.usb_bytes_dropped
            .fetch_add(bytes as u32, Ordering::Relaxed);
    }

    pub(crate) fn record_uart_short_write(&self) {
        self.uart_tx_short_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uart_bytes_dropped: self.uart_bytes_dropped.load(Ordering::Relaxed),
            uart_overruns: self.uart_overruns.load(Ordering::Relaxed),
            uart_line_errors: self.uart_line_errors.load(Ordering::Relaxed),
            usb_bytes_dropped: self.usb_bytes_dropped.load(Ordering::Relaxed),
            uart_tx_short_writes: self.uart_tx_short_writes.load(Ordering::Relaxed),
        }
    }
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}
