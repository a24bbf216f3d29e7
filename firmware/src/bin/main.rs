#![no_std]
#![no_main]

use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{UART1, USB};
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUart, Config as UartConfig};
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Duration;
use embassy_usb::class::cdc_acm::{ControlChanged, Receiver, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Config as UsbConfig};
use static_cell::StaticCell;
use usb_uart_bridge::{
    configure_usb_serial, Bridge, UartRxPort, UartTxPort, UsbRxPacket, UsbTxPort,
    DEFAULT_CONFIG, QUEUE_CAPACITY, UART_RX_BUFFER_SIZE, UART_TX_BUFFER_SIZE,
    USB_FLUSH_TIMEOUT_MS, USB_MAX_PACKET_SIZE,
};

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART1_IRQ => BufferedInterruptHandler<UART1>;
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

/// Every user runs on the thread-mode executor, and the blocking UART write
/// must not run inside a critical section.
type UartBridge =
    Bridge<NoopRawMutex, UartTxPort, Output<'static>, Output<'static>, QUEUE_CAPACITY>;

static BRIDGE: StaticCell<UartBridge> = StaticCell::new();

/// UART driver ring buffers.
static UART_TX_BUF: StaticCell<[u8; UART_TX_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUF: StaticCell<[u8; UART_RX_BUFFER_SIZE]> = StaticCell::new();

/// USB device configuration buffer.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// CDC-ACM state.
static CDC_STATE: StaticCell<State> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("USB-UART bridge starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());
    let config = DEFAULT_CONFIG;

    // --- Target control lines (released) ---
    let boot = Output::new(p.PIN_14, Level::High);
    let reset = Output::new(p.PIN_15, Level::High);

    // --- UART Setup ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config.baudrate;

    let uart = BufferedUart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        UART_TX_BUF.init([0; UART_TX_BUFFER_SIZE]),
        UART_RX_BUF.init([0; UART_RX_BUFFER_SIZE]),
        uart_config,
    );
    let (uart_tx, uart_rx) = uart.split();

    let bridge = match UartBridge::new(config, UartTxPort::new(uart_tx), boot, reset) {
        Ok(bridge) => BRIDGE.init(bridge),
        Err(e) => defmt::panic!("Bridge initialization failed: {:?}", e),
    };

    // --- USB Setup ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let mut usb_config = UsbConfig::new(0x1209, 0x0001); // pid.codes test VID/PID
    usb_config.manufacturer = Some("Rust USB-UART");
    usb_config.product = Some("USB-UART Bridge");
    usb_config.serial_number = Some("001");
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let config_descriptor = CONFIG_DESCRIPTOR.init([0; 256]);
    let bos_descriptor = BOS_DESCRIPTOR.init([0; 256]);
    let msos_descriptor = MSOS_DESCRIPTOR.init([0; 256]);
    let control_buf = CONTROL_BUF.init([0; 64]);

    let mut builder = Builder::new(
        usb_driver,
        usb_config,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    );

    // Configure CDC-ACM class
    let cdc_state = CDC_STATE.init(State::new());
    let serial = configure_usb_serial(&mut builder, cdc_state);
    let (sender, receiver, control) = serial.split_with_control();

    // Build the USB device
    let usb_device = builder.build();

    let usb_tx = UsbTxPort::new(sender, Duration::from_millis(USB_FLUSH_TIMEOUT_MS));

    // Spawn tasks (unwrap the SpawnToken, then spawn)
    spawner.spawn(usb_task(usb_device).unwrap());
    spawner.spawn(debounce_task(bridge).unwrap());
    spawner.spawn(uart_rx_task(bridge, UartRxPort::new(uart_rx)).unwrap());
    spawner.spawn(usb_tx_task(bridge, usb_tx).unwrap());
    spawner.spawn(usb_rx_task(bridge, receiver, control).unwrap());

    bridge.start();
    info!("USB-UART bridge initialized, waiting for host...");
}

/// USB device task - runs the USB stack.
#[embassy_executor::task]
async fn usb_task(mut device: embassy_usb::UsbDevice<'static, Driver<'static, USB>>) {
    device.run().await;
}

/// Debounce timer service for the BOOT/RESET lines.
#[embassy_executor::task]
async fn debounce_task(bridge: &'static UartBridge) {
    bridge.run_debounce_timer().await
}

/// UART -> queue.
#[embassy_executor::task]
async fn uart_rx_task(bridge: &'static UartBridge, uart: UartRxPort) {
    bridge.uart_receive_relay(uart).run().await
}

/// Queue -> USB.
#[embassy_executor::task]
async fn usb_tx_task(bridge: &'static UartBridge, usb: UsbTxPort<'static>) {
    bridge.usb_send_relay(usb).run().await
}

/// Host -> UART, plus DTR/RTS and line coding changes.
#[embassy_executor::task]
async fn usb_rx_task(
    bridge: &'static UartBridge,
    mut receiver: Receiver<'static, Driver<'static, USB>>,
    control: ControlChanged<'static>,
) {
    let mut packet = [0u8; USB_MAX_PACKET_SIZE as usize];
    let mut baudrate = bridge.config().baudrate;

    loop {
        receiver.wait_connection().await;
        info!("USB serial connected");

        loop {
            let event = select(receiver.read_packet(&mut packet), control.control_changed()).await;
            match event {
                Either::First(Ok(n)) => {
                    bridge.on_usb_data(&mut UsbRxPacket::new(&packet[..n]));
                }
                Either::First(Err(EndpointError::Disabled)) => break,
                Either::First(Err(EndpointError::BufferOverflow)) => {
                    warn!("USB packet larger than {} bytes", packet.len());
                }
                Either::Second(()) => {
                    bridge.on_line_state(receiver.dtr(), receiver.rts());

                    let requested = receiver.line_coding().data_rate();
                    if requested != baudrate && bridge.set_baudrate(requested) {
                        baudrate = requested;
                    }
                }
            }
        }

        info!("USB serial disconnected");
    }
}
