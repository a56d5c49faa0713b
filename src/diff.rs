//! Byte-level comparison of two snapshots
//!
//! Responses are compared over their shared prefix only. A length mismatch
//! is recorded and flagged in the report but never treated as an error.

use std::fmt;

use g6_transport::protocol;
use serde::Serialize;

use crate::reader::Snapshot;

/// Number of differing offsets printed per command
const SHOWN_DIFFS: usize = 5;

/// One differing byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteDiff {
    pub offset: usize,
    pub left: u8,
    pub right: u8,
}

/// Differences for one read command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDiff {
    pub command: String,
    /// Strictly increasing offsets below `min(left_len, right_len)`
    pub differences: Vec<ByteDiff>,
    pub left_len: usize,
    pub right_len: usize,
    #[serde(skip)]
    left: Vec<u8>,
    #[serde(skip)]
    right: Vec<u8>,
}

impl CommandDiff {
    pub fn is_identical(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn length_mismatch(&self) -> bool {
        self.left_len != self.right_len
    }

    pub fn offsets(&self) -> Vec<usize> {
        self.differences.iter().map(|d| d.offset).collect()
    }
}

/// Per-command differences between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub left_label: String,
    pub right_label: String,
    /// One entry per command present in both snapshots, in left order
    pub commands: Vec<CommandDiff>,
    /// Commands present in only one of the snapshots
    pub unmatched: Vec<String>,
}

impl DiffResult {
    pub fn get(&self, command: &str) -> Option<&CommandDiff> {
        self.commands.iter().find(|c| c.command == command)
    }

    /// Commands with at least one differing byte
    pub fn changed(&self) -> impl Iterator<Item = &CommandDiff> {
        self.commands.iter().filter(|c| !c.is_identical())
    }

    pub fn has_differences(&self) -> bool {
        self.changed().next().is_some()
    }
}

/// Differing offsets of two byte strings over their shared prefix
pub fn diff_bytes(left: &[u8], right: &[u8]) -> Vec<ByteDiff> {
    left.iter()
        .zip(right)
        .enumerate()
        .filter(|(_, (l, r))| l != r)
        .map(|(offset, (&left, &right))| ByteDiff {
            offset,
            left,
            right,
        })
        .collect()
}

/// Compare two snapshots command by command
pub fn diff_snapshots(left: &Snapshot, right: &Snapshot) -> DiffResult {
    let mut commands = Vec::with_capacity(left.len());
    let mut unmatched = Vec::new();

    for (name, l) in left.iter() {
        match right.get(name) {
            Some(r) => commands.push(CommandDiff {
                command: name.to_string(),
                differences: diff_bytes(l, r),
                left_len: l.len(),
                right_len: r.len(),
                left: l.to_vec(),
                right: r.to_vec(),
            }),
            None => unmatched.push(name.to_string()),
        }
    }
    for (name, _) in right.iter() {
        if left.get(name).is_none() {
            unmatched.push(name.to_string());
        }
    }

    DiffResult {
        left_label: left.label().to_string(),
        right_label: right.label().to_string(),
        commands,
        unmatched,
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (l, r) = (&self.left_label, &self.right_label);
        writeln!(f, "COMPARISON: {l} vs {r}")?;

        for cmd in &self.commands {
            if cmd.is_identical() {
                writeln!(f, "   {:16}: Identical", cmd.command)?;
            } else {
                writeln!(
                    f,
                    "   {:16}: DIFFERENCES at positions {:?}",
                    cmd.command,
                    cmd.offsets()
                )?;
                writeln!(f, "      {:10} {}", l, protocol::hex(&cmd.left[..cmd.left.len().min(32)]))?;
                writeln!(f, "      {:10} {}", r, protocol::hex(&cmd.right[..cmd.right.len().min(32)]))?;
                for d in cmd.differences.iter().take(SHOWN_DIFFS) {
                    writeln!(
                        f,
                        "      -> byte {}: 0x{:02x} ({l}) vs 0x{:02x} ({r})",
                        d.offset, d.left, d.right
                    )?;
                }
            }
            if cmd.length_mismatch() {
                writeln!(
                    f,
                    "      note: lengths differ ({} vs {}); compared first {} bytes",
                    cmd.left_len,
                    cmd.right_len,
                    cmd.left_len.min(cmd.right_len)
                )?;
            }
        }

        for name in &self.unmatched {
            writeln!(f, "   {name:16}: present in only one snapshot")?;
        }
        if !self.has_differences() {
            writeln!(f, "   No differences found in any command")?;
        }
        Ok(())
    }
}
