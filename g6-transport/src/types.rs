//! Common types for transport layer

use std::fmt;

use crate::error::TransportError;
use crate::protocol::{self, REPORT_SIZE};

/// One 64-byte vendor report (payload only, no report ID)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HidReport([u8; REPORT_SIZE]);

impl HidReport {
    /// Build a report from up to 64 bytes, zero-padding the remainder
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TransportError> {
        if bytes.len() > REPORT_SIZE {
            return Err(TransportError::InvalidReport(format!(
                "{} bytes exceeds report size {}",
                bytes.len(),
                REPORT_SIZE
            )));
        }
        let mut buf = [0u8; REPORT_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Command-class marker (byte 0)
    pub fn marker(&self) -> u8 {
        self.0[0]
    }

    /// Opcode (byte 1)
    pub fn opcode(&self) -> u8 {
        self.0[1]
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.0
    }

    /// Bytes as written to the device, with the report ID prepended
    pub fn to_wire(&self) -> Vec<u8> {
        protocol::frame_report(&self.0)
    }

    /// Length of the report with trailing zero padding removed
    pub fn significant_len(&self) -> usize {
        self.0.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1)
    }
}

impl fmt::Debug for HidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HidReport[{}]", protocol::hex(&self.0[..self.significant_len()]))
    }
}

/// Which HID interface to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSelector {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Logical interface number among those exposed by the device
    pub interface: i32,
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self {
            vid: protocol::device::VENDOR_ID,
            pid: protocol::device::PRODUCT_ID,
            interface: protocol::device::INTERFACE,
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VID={:04x} PID={:04x} interface={}",
            self.vid, self.pid, self.interface
        )
    }
}

/// Device identification information
#[derive(Debug, Clone)]
pub struct TransportDeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Interface number the handle was opened on
    pub interface: i32,
    /// Device path
    pub device_path: String,
    /// Product name if available
    pub product_name: Option<String>,
}

/// One HID interface exposed by a device, as seen during enumeration
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub interface: i32,
    pub usage_page: u16,
    pub usage: u16,
    pub path: String,
    pub product_name: Option<String>,
}
