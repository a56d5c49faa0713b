//! Command handlers for the CLI application.
//!
//! - `device`: live device commands (discover, read, switch, list)
//! - `analyze`: offline capture analysis
//! - `tables`: protocol table inspection

pub mod analyze;
pub mod device;
pub mod tables;

use std::path::Path;

use anyhow::Context;
use g6_probe::error::ProbeError;
use g6_probe::tables::ProtocolTables;
use g6_transport::{DeviceSelector, HidDiscovery, PrinterConfig, TransportError};

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Load the built-in protocol tables, or the ones in `path`
pub fn load_tables(path: Option<&Path>) -> anyhow::Result<ProtocolTables> {
    match path {
        Some(path) => ProtocolTables::load(path)
            .with_context(|| format!("loading protocol tables from {}", path.display())),
        None => ProtocolTables::builtin().context("loading built-in protocol tables"),
    }
}

/// Create the HID discovery for `selector`.
/// If `printer_config` is Some, every opened transport is wrapped for monitoring.
pub fn open_discovery(
    selector: DeviceSelector,
    printer_config: Option<PrinterConfig>,
) -> anyhow::Result<HidDiscovery> {
    let discovery = HidDiscovery::new(selector).context("initializing HID API")?;
    Ok(match printer_config {
        Some(config) => discovery.with_printer_config(config),
        None => discovery,
    })
}

/// Create printer config from CLI flags
pub fn create_printer_config(monitor: bool, hex: bool) -> Option<PrinterConfig> {
    monitor.then(|| PrinterConfig::default().with_hex(hex))
}

/// Wrap a probe failure, with a hint for the usual setup problems
pub fn probe_failure(err: ProbeError, what: &str) -> anyhow::Error {
    let hint = match err.transport_error() {
        Some(e) if e.is_not_found() => " (is the G6 plugged in? see `g6_probe list`)",
        Some(TransportError::HidPermissionDenied(_)) => " (no access to hidraw; check udev rules)",
        _ => "",
    };
    anyhow::Error::new(err).context(format!("{what}{hint}"))
}
