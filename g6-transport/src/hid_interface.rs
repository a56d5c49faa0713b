//! HID transport over the G6 vendor interface (interrupt endpoints)

use std::time::Duration;

use hidapi::HidDevice;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol;
use crate::types::TransportDeviceInfo;
use crate::Transport;

/// HID transport for the G6 control interface
///
/// The handle is exclusively owned; dropping the transport closes it.
pub struct HidInterfaceTransport {
    device: HidDevice,
    info: TransportDeviceInfo,
}

impl HidInterfaceTransport {
    pub fn new(device: HidDevice, info: TransportDeviceInfo) -> Self {
        Self { device, info }
    }
}

impl Transport for HidInterfaceTransport {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let written = self.device.write(data)?;
        debug!("Wrote {} bytes: {}", written, protocol::hex(&data[..data.len().min(9)]));
        Ok(written)
    }

    fn read(&self, max_len: usize, timeout: Option<Duration>) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; max_len];
        let n = match timeout {
            Some(t) => {
                let ms = i32::try_from(t.as_millis()).unwrap_or(i32::MAX);
                self.device.read_timeout(&mut buf, ms)?
            }
            None => self.device.read(&mut buf)?,
        };
        if n == 0 {
            return Err(TransportError::Timeout);
        }
        buf.truncate(n);
        debug!("Read {} bytes: {}", n, protocol::hex(&buf[..n.min(16)]));
        Ok(buf)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }
}

impl Drop for HidInterfaceTransport {
    fn drop(&mut self) {
        debug!("Closing HID handle {}", self.info.device_path);
    }
}
