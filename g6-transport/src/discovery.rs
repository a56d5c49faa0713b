//! Device discovery for the G6 control interface

use hidapi::HidApi;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::hid_interface::HidInterfaceTransport;
use crate::printer::{PrinterConfig, PrinterTransport};
use crate::types::{DeviceSelector, InterfaceInfo, TransportDeviceInfo};
use crate::Transport;

/// Device discovery abstraction
///
/// Every call to `open` must return a fresh handle; callers rely on this to
/// discard responses still queued on a previous connection.
pub trait DeviceDiscovery {
    /// Open the selected interface
    fn open(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// The interface this discovery targets
    fn selector(&self) -> DeviceSelector;
}

/// hidapi-backed discovery matching VID, PID and interface number
pub struct HidDiscovery {
    api: Mutex<HidApi>,
    selector: DeviceSelector,
    /// Optional printer config for monitoring mode - wraps transports automatically
    printer_config: Option<PrinterConfig>,
}

impl HidDiscovery {
    /// Create a new HID discovery instance for the given interface
    pub fn new(selector: DeviceSelector) -> Result<Self, TransportError> {
        let api = HidApi::new()?;
        Ok(Self {
            api: Mutex::new(api),
            selector,
            printer_config: None,
        })
    }

    /// Wrap every transport opened by this discovery with a PrinterTransport
    pub fn with_printer_config(mut self, config: PrinterConfig) -> Self {
        self.printer_config = Some(config);
        self
    }

    /// List every HID interface exposed by the selected VID/PID
    pub fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>, TransportError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;

        let mut interfaces: Vec<InterfaceInfo> = api
            .device_list()
            .filter(|d| d.vendor_id() == self.selector.vid && d.product_id() == self.selector.pid)
            .map(|d| InterfaceInfo {
                interface: d.interface_number(),
                usage_page: d.usage_page(),
                usage: d.usage(),
                path: d.path().to_string_lossy().into_owned(),
                product_name: d.product_string().map(str::to_owned),
            })
            .collect();
        interfaces.sort_by_key(|i| i.interface);
        Ok(interfaces)
    }
}

impl DeviceDiscovery for HidDiscovery {
    fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;

        let sel = self.selector;
        let mut device_present = false;
        let mut target = None;

        for d in api.device_list() {
            if d.vendor_id() != sel.vid || d.product_id() != sel.pid {
                continue;
            }
            device_present = true;
            debug!("Candidate interface {} at {:?}", d.interface_number(), d.path());
            if d.interface_number() == sel.interface {
                target = Some(d.clone());
                break;
            }
        }

        let Some(device_info) = target else {
            let reason = if device_present {
                format!("{sel}: device present but interface missing")
            } else {
                format!("{sel}: no matching device")
            };
            return Err(TransportError::DeviceNotFound(reason));
        };

        // Open by path; opening by VID/PID would pick interface 0
        let device = api.open_path(device_info.path())?;
        let info = TransportDeviceInfo {
            vid: sel.vid,
            pid: sel.pid,
            interface: sel.interface,
            device_path: device_info.path().to_string_lossy().into_owned(),
            product_name: device_info.product_string().map(str::to_owned),
        };
        info!(
            "Opened {} ({})",
            sel,
            info.product_name.as_deref().unwrap_or("unknown product")
        );

        let transport: Box<dyn Transport> = Box::new(HidInterfaceTransport::new(device, info));
        Ok(match &self.printer_config {
            Some(config) => PrinterTransport::wrap(transport, config.clone()),
            None => transport,
        })
    }

    fn selector(&self) -> DeviceSelector {
        self.selector
    }
}
