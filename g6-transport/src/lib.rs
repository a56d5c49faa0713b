//! Transport layer for the Sound BlasterX G6 vendor HID interface
//!
//! The G6 exposes several USB interfaces; vendor commands are only accepted
//! on one HID interface, selected by VID, PID and interface number. Reports
//! are 64 bytes, written with a leading report ID of 0.

pub mod error;
pub mod printer;
pub mod protocol;
pub mod types;

mod discovery;
mod hid_interface;

pub use discovery::{DeviceDiscovery, HidDiscovery};
pub use error::TransportError;
pub use hid_interface::HidInterfaceTransport;
pub use printer::{PrinterConfig, PrinterTransport};
pub use types::{DeviceSelector, HidReport, InterfaceInfo, TransportDeviceInfo};

use std::time::Duration;

/// The core transport trait
///
/// One implementation per backend. No retries happen at this layer; retry
/// policy belongs to the caller.
pub trait Transport {
    /// Write a report-ID-prefixed buffer, returning the number of bytes written
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read one report of at most `max_len` bytes
    ///
    /// Blocks until a report arrives or `timeout` elapses (`None` blocks
    /// indefinitely). An elapsed timeout is `TransportError::Timeout`.
    fn read(&self, max_len: usize, timeout: Option<Duration>) -> Result<Vec<u8>, TransportError>;

    /// Get device information
    fn device_info(&self) -> &TransportDeviceInfo;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write(data)
    }

    fn read(&self, max_len: usize, timeout: Option<Duration>) -> Result<Vec<u8>, TransportError> {
        (**self).read(max_len, timeout)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        (**self).device_info()
    }
}
