//! USB-CDC to UART bridge for RP2040.
//!
//! This crate provides the embedded side of the bridge: adapters from the
//! embassy-rp buffered UART and the embassy-usb CDC-ACM class to the driver
//! traits of `bridge-core`.
//!
//! # Pins
//!
//! | Signal | GPIO | Direction |
//! |--------|------|-----------|
//! | UART1 TX | 8 | to target RX |
//! | UART1 RX | 9 | from target TX |
//! | BOOT | 14 | to target boot-select, active low |
//! | RESET | 15 | to target reset, active low |

#![no_std]

// Re-export core types for convenience
pub use bridge_core::{
    Bridge, BridgeConfig, BridgeError, BridgeStats, ByteQueue, StatsSnapshot, TargetLines,
    UartError, UartEvent, DEFAULT_BAUDRATE, DEFAULT_CONFIG, QUEUE_CAPACITY,
};

pub mod uart_port;
pub mod usb_port;

pub use uart_port::{UartRxPort, UartTxPort};
pub use usb_port::{configure_usb_serial, UsbRxPacket, UsbTxPort};

/// Receive ring buffer inside the UART driver.
pub const UART_RX_BUFFER_SIZE: usize = 1024;

/// Transmit ring buffer inside the UART driver.
pub const UART_TX_BUFFER_SIZE: usize = 256;

/// Bulk endpoint packet size (full speed).
pub const USB_MAX_PACKET_SIZE: u16 = 64;

/// Bytes the USB transmitter buffers between flushes.
pub const USB_TX_BUFFER_SIZE: usize = 256;

/// How long a flush waits for the host to take one packet.
pub const USB_FLUSH_TIMEOUT_MS: u64 = 5;

/// Highest baud rate the UART accepts (`clk_peri / 16` at 125 MHz).
pub const MAX_BAUDRATE: u32 = 7_812_500;
