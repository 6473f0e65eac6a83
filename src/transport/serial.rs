//! Serial port discovery and opening.
//!
//! The FPGA UART runs at 9600 baud, 8 data bits, no parity, one stop bit.
//! After the port opens the board needs a settle delay before it accepts
//! frames; [`open`] waits it out so callers can send immediately.
//!
//! # Example
//!
//! ```ignore
//! use alu_uart::transport::{open, SerialSettings};
//!
//! let settings = SerialSettings::new("/dev/ttyUSB1");
//! let port = open(&settings).await?;
//! ```

use std::time::Duration;

use serde::Serialize;
use tokio_serial::{
    DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialPortType, SerialStream,
    StopBits,
};

use crate::error::{AluError, Result};
use crate::protocol::FrameVariant;

/// Line speed of the ALU UART.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Delay between opening the port and the first frame.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// How to open the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Device path (`/dev/ttyUSB1`, `COM3`).
    pub path: String,
    pub baud_rate: u32,
    /// Wait after open before the link is usable.
    pub settle: Duration,
    /// Drive DTR and RTS low before any traffic.
    pub deassert_control_lines: bool,
}

impl SerialSettings {
    /// 9600 8N1 with the default settle delay.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            settle: DEFAULT_SETTLE_DELAY,
            deassert_control_lines: false,
        }
    }

    /// Settings matching a frame layout's deployment profile.
    ///
    /// The header-delimited board resets on DTR/RTS, so those lines are
    /// driven low for that layout.
    pub fn for_variant(path: impl Into<String>, variant: FrameVariant) -> Self {
        Self {
            deassert_control_lines: variant == FrameVariant::HeaderDelimited,
            ..Self::new(path)
        }
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn deassert_control_lines(mut self, enabled: bool) -> Self {
        self.deassert_control_lines = enabled;
        self
    }
}

/// One entry from port enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSummary {
    pub name: String,
    pub description: String,
}

/// Enumerate serial ports on this machine.
pub fn list_ports() -> Result<Vec<PortSummary>> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| PortSummary {
            description: describe(&p.port_type),
            name: p.port_name,
        })
        .collect())
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            match usb.manufacturer.as_deref() {
                Some(m) => format!("{} ({}) [{:04x}:{:04x}]", product, m, usb.vid, usb.pid),
                None => format!("{} [{:04x}:{:04x}]", product, usb.vid, usb.pid),
            }
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}

/// First enumerated port, for when no path was given.
pub fn first_port() -> Result<String> {
    list_ports()?
        .into_iter()
        .next()
        .map(|p| p.name)
        .ok_or(AluError::NoPorts)
}

/// Open and prepare the port. Must be called inside a Tokio runtime.
pub async fn open(settings: &SerialSettings) -> Result<SerialStream> {
    tracing::debug!(
        "Opening {} at {} baud, 8N1",
        settings.path,
        settings.baud_rate
    );

    let mut port = tokio_serial::new(&settings.path, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()?;

    if settings.deassert_control_lines {
        port.write_data_terminal_ready(false)?;
        port.write_request_to_send(false)?;
        tracing::debug!("DTR/RTS deasserted on {}", settings.path);
    }

    if !settings.settle.is_zero() {
        tracing::info!("Waiting {:?} for {} to settle", settings.settle, settings.path);
        tokio::time::sleep(settings.settle).await;
    }

    Ok(port)
}
