//! PrinterTransport middleware for monitoring transport traffic
//!
//! Wraps any Transport implementation and prints every report written to or
//! read from the device.
//!
//! # Example
//!
//! ```ignore
//! use g6_transport::{HidDiscovery, PrinterConfig, DeviceSelector};
//!
//! let discovery = HidDiscovery::new(DeviceSelector::default())?
//!     .with_printer_config(PrinterConfig::default().with_hex(true));
//! let transport = discovery.open()?; // all traffic is now printed
//! ```

use std::time::Duration;

use colored::Colorize;

use crate::protocol::{self, opcode, CLASS_MARKER, REPORT_ID};
use crate::{Transport, TransportDeviceInfo, TransportError};

/// Configuration for the PrinterTransport
#[derive(Debug, Clone, Default)]
pub struct PrinterConfig {
    /// Show the full report in hex instead of the significant prefix
    pub show_hex: bool,
}

impl PrinterConfig {
    /// Create config with hex output setting
    pub fn with_hex(mut self, show: bool) -> Self {
        self.show_hex = show;
        self
    }
}

/// Transport middleware that prints all reports
pub struct PrinterTransport {
    inner: Box<dyn Transport>,
    config: PrinterConfig,
}

impl PrinterTransport {
    /// Wrap a transport with printing middleware
    pub fn wrap(transport: Box<dyn Transport>, config: PrinterConfig) -> Box<dyn Transport> {
        Box::new(Self {
            inner: transport,
            config,
        })
    }

    fn describe(&self, payload: &[u8]) -> String {
        let name = match payload {
            [CLASS_MARKER, op, ..] => format!("0x{op:02x} {}", opcode::name(*op)),
            _ => "-".to_string(),
        };
        let shown = if self.config.show_hex {
            payload
        } else {
            let significant = payload.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            &payload[..significant.max(2).min(payload.len())]
        };
        format!("{} {}", name.yellow(), protocol::hex(shown))
    }

    fn print_write(&self, data: &[u8]) {
        let payload = match data.split_first() {
            Some((&REPORT_ID, rest)) => rest,
            _ => data,
        };
        eprintln!("{} {}  {}", ">>>".cyan(), "OUT".cyan().bold(), self.describe(payload));
    }

    fn print_read(&self, data: &[u8]) {
        eprintln!("{} {}  {}", "<<<".green(), "IN ".green().bold(), self.describe(data));
    }
}

impl Transport for PrinterTransport {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        self.print_write(data);
        self.inner.write(data)
    }

    fn read(&self, max_len: usize, timeout: Option<Duration>) -> Result<Vec<u8>, TransportError> {
        match self.inner.read(max_len, timeout) {
            Ok(data) => {
                self.print_read(&data);
                Ok(data)
            }
            Err(e) => {
                eprintln!("{} {}  {}", "<<<".red(), "ERR".red().bold(), e);
                Err(e)
            }
        }
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        self.inner.device_info()
    }
}
