//! Error types for the live probe and protocol tables

use g6_transport::TransportError;
use thiserror::Error;

/// Failures of the command-and-response engine
///
/// Every variant names where it happened; nothing is retried.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{phase}: connect failed: {source}")]
    Connect {
        phase: String,
        source: TransportError,
    },

    #[error("write {index} of sequence '{sequence}' failed: {source}")]
    Write {
        sequence: String,
        index: usize,
        source: TransportError,
    },

    #[error("buffer drain failed: {source}")]
    Drain { source: TransportError },

    #[error("read command '{command}' failed: {source}")]
    Read {
        command: String,
        source: TransportError,
    },

    #[error("unknown command sequence '{0}'")]
    UnknownSequence(String),

    #[error("{phase}: {source}")]
    InPhase {
        phase: String,
        source: Box<ProbeError>,
    },
}

impl ProbeError {
    /// Attach the orchestration phase to an error raised by a sub-step
    pub fn in_phase(self, phase: &str) -> Self {
        match self {
            // Connect errors already carry their phase
            e @ (Self::Connect { .. } | Self::InPhase { .. }) => e,
            e => Self::InPhase {
                phase: phase.to_string(),
                source: Box::new(e),
            },
        }
    }

    /// The innermost transport error, if any
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Connect { source, .. }
            | Self::Write { source, .. }
            | Self::Drain { source }
            | Self::Read { source, .. } => Some(source),
            Self::InPhase { source, .. } => source.transport_error(),
            Self::UnknownSequence(_) => None,
        }
    }
}

/// Failures loading protocol tables
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parse protocol TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported protocol table version {0}")]
    UnsupportedVersion(u32),

    #[error("{context}: invalid hex '{value}'")]
    Hex { context: String, value: String },

    #[error("{context}: {source}")]
    Report {
        context: String,
        source: TransportError,
    },

    #[error("{context}: expected class marker 0x{expected:02x}, found 0x{found:02x}")]
    Marker {
        context: String,
        expected: u8,
        found: u8,
    },

    #[error("duplicate name '{0}'")]
    DuplicateName(String),

    #[error("discovery references unknown sequence '{0}'")]
    UnknownSequence(String),

    #[error("read catalog is empty")]
    EmptyCatalog,

    #[error("drain_attempts must be 1..={max}, got {value}")]
    DrainAttempts { value: usize, max: usize },
}
