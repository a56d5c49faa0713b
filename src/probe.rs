//! Discovery orchestrator
//!
//! Drives the live device through a baseline read and two output switches,
//! reading a fresh snapshot after each switch, then diffs the snapshots to
//! locate the response bytes that encode the selected output.
//!
//! Every phase opens its own handle and drops it before the next phase
//! connects. The G6 only reports the new output state on a fresh connection.

use std::fmt;
use std::thread;
use std::time::Duration;

use g6_transport::{DeviceDiscovery, Transport};
use tracing::{info, warn};

use crate::diff::{diff_snapshots, DiffResult};
use crate::error::ProbeError;
use crate::reader::{read_snapshot, Snapshot};
use crate::sequencer::{drain_buffer, send_sequence, DrainOutcome, SequenceReport};
use crate::tables::ProtocolTables;

/// Connection state of the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Disconnected,
    Connected,
    /// Sequence being written
    Switching,
    /// Waiting for the output relay
    Settling,
    SnapshotTaken,
}

/// Result of one output switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    pub sequence: SequenceReport,
    pub drain: DrainOutcome,
}

/// Everything captured by a discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub baseline: Snapshot,
    pub mode_a: Snapshot,
    pub mode_b: Snapshot,
    pub switches: Vec<SwitchReport>,
    /// baseline x A, A x B, baseline x B
    pub diffs: [DiffResult; 3],
}

impl DiscoveryReport {
    /// The comparison between the two switched outputs
    pub fn mode_diff(&self) -> &DiffResult {
        &self.diffs[1]
    }
}

/// Orchestrates connections, switches and reads against one device
pub struct OutputProbe<'a, D: DeviceDiscovery + ?Sized> {
    discovery: &'a D,
    tables: &'a ProtocolTables,
    state: ProbeState,
}

impl<'a, D: DeviceDiscovery + ?Sized> OutputProbe<'a, D> {
    pub fn new(discovery: &'a D, tables: &'a ProtocolTables) -> Self {
        Self {
            discovery,
            tables,
            state: ProbeState::Disconnected,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    fn transition(&mut self, next: ProbeState) {
        info!("State: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Open a fresh handle for `phase`
    pub fn connect(&mut self, phase: &str) -> Result<Box<dyn Transport>, ProbeError> {
        let transport = self
            .discovery
            .open()
            .map_err(|source| ProbeError::Connect {
                phase: phase.to_string(),
                source,
            })?;
        info!(
            "{}: connected to {}",
            phase,
            transport.device_info().device_path
        );
        self.transition(ProbeState::Connected);
        Ok(transport)
    }

    /// Close the handle
    pub fn disconnect(&mut self, transport: Box<dyn Transport>) {
        drop(transport);
        self.transition(ProbeState::Disconnected);
    }

    /// Close the handle of a failed phase
    fn abort(
        &mut self,
        transport: Box<dyn Transport>,
        phase: &str,
        err: ProbeError,
    ) -> ProbeError {
        warn!("{}: failed, closing handle", phase);
        self.disconnect(transport);
        err.in_phase(phase)
    }

    /// Connect, read the whole catalog, disconnect
    ///
    /// The handle is closed on failure too.
    pub fn snapshot(&mut self, label: &str) -> Result<Snapshot, ProbeError> {
        let phase = format!("read {label}");
        let transport = self.connect(&phase)?;

        let snapshot = match read_snapshot(&transport, self.tables, label) {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.abort(transport, &phase, e)),
        };
        self.transition(ProbeState::SnapshotTaken);

        self.disconnect(transport);
        Ok(snapshot)
    }

    /// Connect, send the named output sequence, drain, settle, disconnect
    pub fn switch_output(&mut self, mode: &str) -> Result<SwitchReport, ProbeError> {
        let phase = format!("switch {mode}");
        let tables = self.tables;
        let sequence = tables
            .sequence(mode)
            .ok_or_else(|| ProbeError::UnknownSequence(mode.to_string()))?;

        let transport = self.connect(&phase)?;
        self.transition(ProbeState::Switching);

        let sent = send_sequence(&transport, sequence).and_then(|sequence| {
            drain_buffer(&transport, &tables.status, &tables.timings)
                .map(|drain| (sequence, drain))
        });
        let (sequence, drain) = match sent {
            Ok(sent) => sent,
            Err(e) => return Err(self.abort(transport, &phase, e)),
        };

        self.transition(ProbeState::Settling);
        pause("post-switch settle", tables.timings.post_switch_settle);

        self.disconnect(transport);
        Ok(SwitchReport { sequence, drain })
    }

    /// Switch to `mode`, wait for the device to settle, read a fresh snapshot
    fn switch_and_read(&mut self, mode: &str) -> Result<(SwitchReport, Snapshot), ProbeError> {
        let report = self.switch_output(mode)?;
        if !report.drain.is_confirmed() {
            warn!("Switch to '{}' drained without echo", mode);
        }
        pause("reconnect settle", self.tables.timings.reconnect_settle);
        let snapshot = self.snapshot(mode)?;
        Ok((report, snapshot))
    }

    /// Full discovery: baseline, mode A, mode B, three diffs
    ///
    /// The first failure aborts the run.
    pub fn run_discovery(&mut self) -> Result<DiscoveryReport, ProbeError> {
        let tables = self.tables;
        let (mode_a, mode_b) = (tables.mode_a.as_str(), tables.mode_b.as_str());
        info!("Starting discovery: baseline, {}, {}", mode_a, mode_b);

        let baseline = self.snapshot("baseline")?;
        pause("release", tables.timings.release_pause);

        let (switch_a, snap_a) = self.switch_and_read(mode_a)?;
        pause("release", tables.timings.release_pause);

        let (switch_b, snap_b) = self.switch_and_read(mode_b)?;

        let diffs = [
            diff_snapshots(&baseline, &snap_a),
            diff_snapshots(&snap_a, &snap_b),
            diff_snapshots(&baseline, &snap_b),
        ];
        info!(
            "Discovery complete: {} command(s) differ between {} and {}",
            diffs[1].changed().count(),
            mode_a,
            mode_b
        );

        Ok(DiscoveryReport {
            baseline,
            mode_a: snap_a,
            mode_b: snap_b,
            switches: vec![switch_a, switch_b],
            diffs,
        })
    }
}

fn pause(what: &str, duration: Duration) {
    if duration.is_zero() {
        return;
    }
    info!("Waiting {:?} ({})", duration, what);
    thread::sleep(duration);
}

impl fmt::Display for DiscoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(80);
        writeln!(f, "{rule}")?;
        writeln!(f, "OUTPUT STATE DISCOVERY")?;
        writeln!(f, "{rule}")?;

        for snap in [&self.baseline, &self.mode_a, &self.mode_b] {
            writeln!(f)?;
            write!(f, "{snap}")?;
        }

        writeln!(f)?;
        for switch in &self.switches {
            writeln!(
                f,
                "Switch '{}': {} writes, drain {} after {} read(s)",
                switch.sequence.name,
                switch.sequence.writes,
                if switch.drain.is_confirmed() {
                    "confirmed"
                } else {
                    "unconfirmed"
                },
                switch.drain.attempts()
            )?;
        }

        for (i, diff) in self.diffs.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "{}. {} vs {}", i + 1, diff.left_label, diff.right_label)?;
            writeln!(f, "{}", "-".repeat(80))?;
            write!(f, "{diff}")?;
        }

        writeln!(f)?;
        writeln!(f, "{rule}")?;
        let mode_diff = self.mode_diff();
        let candidates: Vec<String> = mode_diff
            .changed()
            .map(|c| format!("{} {:?}", c.command, c.offsets()))
            .collect();
        if candidates.is_empty() {
            writeln!(
                f,
                "No byte changed between {} and {}",
                mode_diff.left_label, mode_diff.right_label
            )?;
        } else {
            writeln!(f, "Candidate output-state bytes:")?;
            for c in candidates {
                writeln!(f, "  {c}")?;
            }
        }
        writeln!(f, "{rule}")
    }
}
