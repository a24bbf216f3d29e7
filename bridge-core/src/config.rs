//! Bridge configuration and buffer sizes.

use embassy_time::Duration;

/// Byte queue capacity. Must hold at least one UART receive chunk.
pub const QUEUE_CAPACITY: usize = 2 * 1024;

/// Scratch buffer used by the UART receive relay per read.
pub const UART_CHUNK_SIZE: usize = 512;

/// Largest transfer the USB send relay takes from the queue at once.
pub const USB_TX_CHUNK_SIZE: usize = 256;

/// Largest read the USB receive relay performs per notification
/// (one full-speed bulk packet).
pub const USB_RX_CHUNK_SIZE: usize = 64;

/// UART baud rate used until the host asks for another one.
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Timeouts, retry limits and delays used by the relays and the
/// control-signal state machine.
///
/// The defaults are the values the bridge ships with. They bound the
/// worst-case stall of every loop; tests inject shorter ones.
///
/// # Example
///
/// ```
/// use bridge_core::{BridgeConfig, DEFAULT_CONFIG};
/// use embassy_time::Duration;
///
/// let config = DEFAULT_CONFIG
///     .with_debounce(Duration::from_millis(20))
///     .with_tx_retry_limit(4);
/// assert_eq!(config.tx_retry_limit, 4);
/// assert_eq!(config.pop_timeout, BridgeConfig::default().pop_timeout);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// How long the UART relay waits for queue space per chunk.
    pub push_timeout: Duration,
    /// Back-off after a chunk could not be queued.
    pub push_backoff: Duration,
    /// How long the USB relay waits for queued data.
    pub pop_timeout: Duration,
    /// Sleep after the USB relay found the queue empty.
    pub idle_delay: Duration,
    /// Consecutive "not enough USB buffer space" occurrences tolerated
    /// before writing whatever fits.
    pub tx_retry_limit: u32,
    /// Wait between USB transmit retries.
    pub tx_retry_delay: Duration,
    /// How long DTR=1/RTS=1 must persist before it is applied.
    pub debounce: Duration,
    /// Initial UART baud rate.
    pub baudrate: u32,
}

/// Default bridge configuration.
pub const DEFAULT_CONFIG: BridgeConfig = BridgeConfig {
    push_timeout: Duration::from_millis(10),
    push_backoff: Duration::from_millis(10),
    pop_timeout: Duration::from_millis(100),
    idle_delay: Duration::from_millis(100),
    tx_retry_limit: 10,
    tx_retry_delay: Duration::from_micros(100),
    debounce: Duration::from_millis(10),
    baudrate: DEFAULT_BAUDRATE,
};

impl BridgeConfig {
    /// Set the queue push timeout and the back-off after a failed push.
    #[must_use]
    pub const fn with_push_timing(mut self, timeout: Duration, backoff: Duration) -> Self {
        self.push_timeout = timeout;
        self.push_backoff = backoff;
        self
    }

    /// Set the queue pop timeout and the idle sleep after an empty pop.
    #[must_use]
    pub const fn with_pop_timing(mut self, timeout: Duration, idle: Duration) -> Self {
        self.pop_timeout = timeout;
        self.idle_delay = idle;
        self
    }

    /// Set the USB transmit retry limit.
    #[must_use]
    pub const fn with_tx_retry_limit(mut self, limit: u32) -> Self {
        self.tx_retry_limit = limit;
        self
    }

    /// Set the wait between USB transmit retries.
    #[must_use]
    pub const fn with_tx_retry_delay(mut self, delay: Duration) -> Self {
        self.tx_retry_delay = delay;
        self
    }

    /// Set the DTR/RTS debounce interval.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the initial UART baud rate.
    #[must_use]
    pub const fn with_baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = baudrate;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}
