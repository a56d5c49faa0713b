//! Protocol table inspection.

use super::CommandResult;
use g6_probe::tables::ProtocolTables;
use g6_transport::protocol::{self, opcode};
use g6_transport::HidReport;

fn report_hex(report: &HidReport) -> String {
    protocol::hex(&report.as_bytes()[..report.significant_len()])
}

/// Print the loaded tables
pub fn tables(tables: &ProtocolTables) -> CommandResult {
    let t = &tables.timings;
    println!("Protocol tables v{} for {}", tables.version, tables.selector);
    println!("Status command: {}", report_hex(&tables.status));
    println!(
        "Timings: inter-read {:?}, post-switch {:?}, reconnect {:?}, release {:?}, read timeout {:?}, drain {} attempts",
        t.inter_read, t.post_switch_settle, t.reconnect_settle, t.release_pause, t.read_timeout, t.drain_attempts
    );

    println!("\nRead catalog ({} commands):", tables.catalog.len());
    for cmd in tables.catalog.iter() {
        println!(
            "  {:16} {:14} {}",
            cmd.name,
            opcode::name(cmd.report.opcode()),
            report_hex(&cmd.report)
        );
    }

    for seq in &tables.sequences {
        let discovery = if seq.name == tables.mode_a {
            " (discovery mode A)"
        } else if seq.name == tables.mode_b {
            " (discovery mode B)"
        } else {
            ""
        };
        println!("\nSequence '{}': {} reports{}", seq.name, seq.len(), discovery);
        for (i, report) in seq.reports.iter().enumerate() {
            println!("  {:2}. {}", i + 1, report_hex(report));
        }
    }
    Ok(())
}
