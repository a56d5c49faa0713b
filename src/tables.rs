//! Protocol tables: device identity, read catalog, mode sequences, timings
//!
//! Protocol knowledge lives in a versioned TOML document rather than in
//! control flow. The built-in table is embedded at compile time; a different
//! file can be supplied at startup.
//!
//! # Example TOML
//!
//! ```toml
//! version = 1
//! status_command = "5a05"
//!
//! [[read]]
//! name = "0x05_status"
//! report = "5a05"
//!
//! [[sequence]]
//! name = "headphones"
//! reports = ["5a2c050004", "5a2c0101"]
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use g6_transport::protocol::{timing, CLASS_MARKER};
use g6_transport::{DeviceSelector, HidReport};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Table format version understood by this build
pub const TABLE_VERSION: u32 = 1;

/// Built-in G6 tables
pub const DEFAULT_TABLES_TOML: &str = include_str!("../protocol/g6.toml");

/// Upper bound on status writes in one buffer drain
pub const MAX_DRAIN_ATTEMPTS: usize = 12;

// ── Raw (file) types ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct RawTables {
    version: u32,
    status_command: String,
    #[serde(default)]
    device: RawDevice,
    #[serde(default)]
    timing: RawTiming,
    discovery: RawDiscovery,
    #[serde(default)]
    read: Vec<RawReadCommand>,
    #[serde(default)]
    sequence: Vec<RawSequence>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawDevice {
    vendor_id: u16,
    product_id: u16,
    interface: i32,
}

impl Default for RawDevice {
    fn default() -> Self {
        let sel = DeviceSelector::default();
        Self {
            vendor_id: sel.vid,
            product_id: sel.pid,
            interface: sel.interface,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
struct RawTiming {
    inter_read_ms: u64,
    post_switch_settle_ms: u64,
    reconnect_settle_ms: u64,
    release_pause_ms: u64,
    read_timeout_ms: u64,
    drain_attempts: usize,
}

impl Default for RawTiming {
    fn default() -> Self {
        Self {
            inter_read_ms: 50,
            post_switch_settle_ms: 3000,
            reconnect_settle_ms: 5000,
            release_pause_ms: 500,
            read_timeout_ms: timing::DEFAULT_READ_TIMEOUT_MS,
            drain_attempts: MAX_DRAIN_ATTEMPTS,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct RawDiscovery {
    mode_a: String,
    mode_b: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawReadCommand {
    name: String,
    report: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawSequence {
    name: String,
    reports: Vec<String>,
}

// ── Resolved types ───────────────────────────────────────────────────

/// Named wait contracts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Pause between catalog reads (device turnaround)
    pub inter_read: Duration,
    /// Wait after a mode switch for the output relay to settle
    pub post_switch_settle: Duration,
    /// Wait between closing the switching handle and reconnecting
    pub reconnect_settle: Duration,
    /// Pause after closing a handle before the next phase connects
    pub release_pause: Duration,
    /// Transport read timeout
    pub read_timeout: Duration,
    /// Maximum status writes during a buffer drain
    pub drain_attempts: usize,
}

impl Timings {
    /// No waits at all; for driving scripted transports
    pub fn immediate() -> Self {
        Self {
            inter_read: Duration::ZERO,
            post_switch_settle: Duration::ZERO,
            reconnect_settle: Duration::ZERO,
            release_pause: Duration::ZERO,
            read_timeout: Duration::from_millis(timing::DEFAULT_READ_TIMEOUT_MS),
            drain_attempts: MAX_DRAIN_ATTEMPTS,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        RawTiming::default().into()
    }
}

impl From<RawTiming> for Timings {
    fn from(raw: RawTiming) -> Self {
        Self {
            inter_read: Duration::from_millis(raw.inter_read_ms),
            post_switch_settle: Duration::from_millis(raw.post_switch_settle_ms),
            reconnect_settle: Duration::from_millis(raw.reconnect_settle_ms),
            release_pause: Duration::from_millis(raw.release_pause_ms),
            read_timeout: Duration::from_millis(raw.read_timeout_ms),
            drain_attempts: raw.drain_attempts,
        }
    }
}

/// One named query report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCommand {
    pub name: String,
    pub report: HidReport,
}

/// Ordered catalog of read commands; iteration order is table order
#[derive(Debug, Clone, Default)]
pub struct ReadCatalog {
    entries: Vec<ReadCommand>,
}

impl ReadCatalog {
    pub fn iter(&self) -> impl Iterator<Item = &ReadCommand> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ReadCommand> {
        self.entries.iter().find(|c| c.name == name)
    }
}

impl FromIterator<ReadCommand> for ReadCatalog {
    fn from_iter<I: IntoIterator<Item = ReadCommand>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An ordered, named list of reports forming one logical operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSequence {
    pub name: String,
    pub reports: Vec<HidReport>,
}

impl CommandSequence {
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// Fully validated protocol tables
#[derive(Debug, Clone)]
pub struct ProtocolTables {
    pub version: u32,
    pub selector: DeviceSelector,
    pub timings: Timings,
    pub status: HidReport,
    pub catalog: ReadCatalog,
    pub sequences: Vec<CommandSequence>,
    /// Sequence names switched to during discovery, in order
    pub mode_a: String,
    pub mode_b: String,
}

impl ProtocolTables {
    /// The embedded G6 tables
    pub fn builtin() -> Result<Self, ProtocolError> {
        Self::from_toml(DEFAULT_TABLES_TOML)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ProtocolError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProtocolError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ProtocolError> {
        let raw: RawTables = toml::from_str(content)?;
        if raw.version != TABLE_VERSION {
            return Err(ProtocolError::UnsupportedVersion(raw.version));
        }

        if !(1..=MAX_DRAIN_ATTEMPTS).contains(&raw.timing.drain_attempts) {
            return Err(ProtocolError::DrainAttempts {
                value: raw.timing.drain_attempts,
                max: MAX_DRAIN_ATTEMPTS,
            });
        }

        let status = parse_report("status_command", &raw.status_command)?;

        let mut seen = HashSet::new();
        let mut catalog = Vec::with_capacity(raw.read.len());
        for cmd in &raw.read {
            if !seen.insert(cmd.name.as_str()) {
                return Err(ProtocolError::DuplicateName(cmd.name.clone()));
            }
            catalog.push(ReadCommand {
                name: cmd.name.clone(),
                report: parse_report(&format!("read '{}'", cmd.name), &cmd.report)?,
            });
        }
        if catalog.is_empty() {
            return Err(ProtocolError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        let mut sequences = Vec::with_capacity(raw.sequence.len());
        for seq in &raw.sequence {
            if !seen.insert(seq.name.as_str()) {
                return Err(ProtocolError::DuplicateName(seq.name.clone()));
            }
            let reports = seq
                .reports
                .iter()
                .enumerate()
                .map(|(i, hex)| parse_report(&format!("sequence '{}' #{}", seq.name, i), hex))
                .collect::<Result<Vec<_>, _>>()?;
            sequences.push(CommandSequence {
                name: seq.name.clone(),
                reports,
            });
        }

        for mode in [&raw.discovery.mode_a, &raw.discovery.mode_b] {
            if !sequences.iter().any(|s| &s.name == mode) {
                return Err(ProtocolError::UnknownSequence(mode.clone()));
            }
        }

        Ok(Self {
            version: raw.version,
            selector: DeviceSelector {
                vid: raw.device.vendor_id,
                pid: raw.device.product_id,
                interface: raw.device.interface,
            },
            timings: raw.timing.into(),
            status,
            catalog: catalog.into_iter().collect(),
            sequences,
            mode_a: raw.discovery.mode_a,
            mode_b: raw.discovery.mode_b,
        })
    }

    /// Replace the wait contracts
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Look up a sequence by name
    pub fn sequence(&self, name: &str) -> Option<&CommandSequence> {
        self.sequences.iter().find(|s| s.name == name)
    }
}

/// Decode a hex string (whitespace ignored) into a marker-checked report
fn parse_report(context: &str, value: &str) -> Result<HidReport, ProtocolError> {
    let bytes = parse_hex(value).ok_or_else(|| ProtocolError::Hex {
        context: context.to_string(),
        value: value.to_string(),
    })?;
    let report = HidReport::from_slice(&bytes).map_err(|source| ProtocolError::Report {
        context: context.to_string(),
        source,
    })?;
    if report.marker() != CLASS_MARKER {
        return Err(ProtocolError::Marker {
            context: context.to_string(),
            expected: CLASS_MARKER,
            found: report.marker(),
        });
    }
    Ok(report)
}

fn parse_hex(value: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = value
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(s, 16).ok()
        })
        .collect()
}
