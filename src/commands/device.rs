//! Live device command handlers.

use super::{open_discovery, probe_failure, CommandResult};
use anyhow::bail;
use g6_probe::probe::OutputProbe;
use g6_probe::tables::ProtocolTables;
use g6_transport::PrinterConfig;

/// Run the full output discovery and print the report
pub fn discover(tables: &ProtocolTables, printer_config: Option<PrinterConfig>) -> CommandResult {
    let discovery = open_discovery(tables.selector, printer_config)?;
    let mut probe = OutputProbe::new(&discovery, tables);

    eprintln!(
        "Discovering output state ({} then {}); the device relay will click",
        tables.mode_a, tables.mode_b
    );
    let report = probe
        .run_discovery()
        .map_err(|e| probe_failure(e, "output discovery failed"))?;
    print!("{report}");
    Ok(())
}

/// Read one snapshot and print it
pub fn read(tables: &ProtocolTables, printer_config: Option<PrinterConfig>) -> CommandResult {
    let discovery = open_discovery(tables.selector, printer_config)?;
    let mut probe = OutputProbe::new(&discovery, tables);

    let snapshot = probe
        .snapshot("current")
        .map_err(|e| probe_failure(e, "state read failed"))?;
    print!("{snapshot}");
    Ok(())
}

/// Switch the active output
pub fn switch(
    tables: &ProtocolTables,
    output: &str,
    printer_config: Option<PrinterConfig>,
) -> CommandResult {
    if tables.sequence(output).is_none() {
        let known: Vec<&str> = tables.sequences.iter().map(|s| s.name.as_str()).collect();
        bail!(
            "unknown output '{}' (protocol tables define: {})",
            output,
            known.join(", ")
        );
    }

    let discovery = open_discovery(tables.selector, printer_config)?;
    let mut probe = OutputProbe::new(&discovery, tables);

    let report = probe
        .switch_output(output)
        .map_err(|e| probe_failure(e, &format!("switching output to {output}")))?;
    println!(
        "Switched to {}: {} reports sent, drain {} after {} read(s)",
        output,
        report.sequence.writes,
        if report.drain.is_confirmed() {
            "confirmed"
        } else {
            "unconfirmed"
        },
        report.drain.attempts()
    );
    Ok(())
}

/// List HID interfaces of the selected device
pub fn list(tables: &ProtocolTables) -> CommandResult {
    let discovery = open_discovery(tables.selector, None)?;
    let interfaces = discovery.list_interfaces()?;

    println!("HID interfaces for {}:", tables.selector);
    if interfaces.is_empty() {
        println!("  (none - is the device connected?)");
    }
    for i in interfaces {
        let marker = if i.interface == tables.selector.interface {
            "*"
        } else {
            " "
        };
        println!(
            "{} if={} usage={:04x} page={:04x} {} path={}",
            marker,
            i.interface,
            i.usage,
            i.usage_page,
            i.product_name.as_deref().unwrap_or("?"),
            i.path
        );
    }
    Ok(())
}
