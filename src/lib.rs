// Sound BlasterX G6 protocol probe - Shared Library
// Protocol tables, command sequencing, state diffing and capture analysis

pub mod diff;
pub mod error;
pub mod pcap_analyzer;
pub mod probe;
pub mod reader;
pub mod sequencer;
pub mod tables;

pub use diff::{diff_bytes, diff_snapshots, ByteDiff, CommandDiff, DiffResult};
pub use error::{ProbeError, ProtocolError};
pub use probe::{DiscoveryReport, OutputProbe, ProbeState, SwitchReport};
pub use reader::{read_snapshot, Snapshot};
pub use sequencer::{drain_buffer, send_sequence, DrainOutcome, SequenceReport};
pub use tables::{CommandSequence, ProtocolTables, ReadCommand, Timings};
