//! Platform-agnostic USB-CDC to UART bridge.
//!
//! This crate holds everything between the drivers: the byte queue, the
//! relays moving bytes in both directions, and the state machine turning the
//! host's DTR/RTS lines into BOOT/RESET levels for the target chip. It has no
//! platform-specific dependencies and runs both on the target and on host
//! for testing.
//!
//! # Overview
//!
//! - [`queue`]: Fixed-capacity byte stream ([`ByteQueue`])
//! - [`relay`]: UART → queue → USB relays and the direct USB → UART path
//! - [`control`]: DTR/RTS → BOOT/RESET with debounce ([`ControlLines`])
//! - [`bridge`]: Context object owning all of the above ([`Bridge`])
//! - [`uart`], [`usb`]: Driver traits implemented by the firmware
//! - [`config`]: Timeouts, retry limits and buffer sizes ([`BridgeConfig`])
//! - [`stats`]: Drop and error counters ([`BridgeStats`])
//!
//! # Data flow
//!
//! ```text
//! target UART ──► UartReceiveRelay ──► ByteQueue ──► UsbSendRelay ──► host
//! host ──► relay_usb_to_uart ──► target UART
//! host DTR/RTS ──► ControlLines ──► BOOT/RESET
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt (for embedded logging)
//! - **`log`**: Log through the `log` facade
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

// Must come first so the logging macros are visible in every module.
mod fmt;

pub mod bridge;
pub mod config;
pub mod control;
pub mod queue;
pub mod relay;
pub mod stats;
pub mod uart;
pub mod usb;

// Re-export main types at crate root
pub use bridge::{Bridge, BridgeError};
pub use config::{
    BridgeConfig, DEFAULT_BAUDRATE, DEFAULT_CONFIG, QUEUE_CAPACITY, UART_CHUNK_SIZE,
    USB_RX_CHUNK_SIZE, USB_TX_CHUNK_SIZE,
};
pub use control::{decode, ControlLines, TargetLines, Transition};
pub use queue::ByteQueue;
pub use relay::{relay_usb_to_uart, DataPath, UartReceiveRelay, UsbSendRelay};
pub use stats::{BridgeStats, StatsSnapshot};
pub use uart::{BaudRateControl, UartError, UartEvent, UartReceiver, UartTransmitter};
pub use usb::{UsbReceiver, UsbTransmitter};
