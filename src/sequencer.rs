//! Command sequencer and buffer drain
//!
//! The G6 accepts a burst of writes without acknowledging each one, but
//! queues a response per write. After a burst the queue is drained by
//! polling the status command until the device echoes it back.

use g6_transport::protocol::REPORT_SIZE;
use g6_transport::{HidReport, Transport, TransportError};
use tracing::{debug, info, warn};

use crate::error::ProbeError;
use crate::tables::{CommandSequence, Timings, MAX_DRAIN_ATTEMPTS};

/// A progress checkpoint is emitted after every this many writes
pub const CHECKPOINT_INTERVAL: usize = 10;

/// Outcome of sending one command sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceReport {
    pub name: String,
    /// Number of reports written
    pub writes: usize,
    /// Write counts at which a checkpoint was emitted
    pub checkpoints: Vec<usize>,
}

/// Write every report of `sequence` in order, without reading in between
///
/// Duplicates are sent as-is. The first failed write aborts the sequence.
pub fn send_sequence<T: Transport + ?Sized>(
    transport: &T,
    sequence: &CommandSequence,
) -> Result<SequenceReport, ProbeError> {
    let total = sequence.len();
    info!("Sending sequence '{}' ({} reports)", sequence.name, total);

    let mut checkpoints = Vec::new();
    for (i, report) in sequence.reports.iter().enumerate() {
        debug!("  [{}/{}] {:?}", i + 1, total, report);
        transport
            .write(&report.to_wire())
            .map_err(|source| ProbeError::Write {
                sequence: sequence.name.clone(),
                index: i,
                source,
            })?;

        let sent = i + 1;
        if sent % CHECKPOINT_INTERVAL == 0 {
            info!("  Sent {}/{} reports", sent, total);
            checkpoints.push(sent);
        }
    }
    info!("All {} reports of '{}' sent", total, sequence.name);

    Ok(SequenceReport {
        name: sequence.name.clone(),
        writes: total,
        checkpoints,
    })
}

/// Result of a buffer drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The device echoed the status command
    Confirmed { attempts: usize },
    /// The attempt budget ran out without an echo
    Unconfirmed { attempts: usize },
}

impl DrainOutcome {
    pub fn attempts(&self) -> usize {
        match *self {
            Self::Confirmed { attempts } | Self::Unconfirmed { attempts } => attempts,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// True if `response` starts with the marker and opcode of `status`
pub fn is_echo(response: &[u8], status: &HidReport) -> bool {
    response.len() >= 2 && response[..2] == status.as_bytes()[..2]
}

/// Poll the status command until it is echoed or the attempt budget is spent
///
/// Exhausting the budget is not an error. A read timeout uses up an attempt;
/// any other transport failure aborts the drain. The budget never exceeds
/// [`MAX_DRAIN_ATTEMPTS`] and is at least one.
pub fn drain_buffer<T: Transport + ?Sized>(
    transport: &T,
    status: &HidReport,
    timings: &Timings,
) -> Result<DrainOutcome, ProbeError> {
    let wire = status.to_wire();
    let budget = timings.drain_attempts.clamp(1, MAX_DRAIN_ATTEMPTS);

    for attempt in 1..=budget {
        transport
            .write(&wire)
            .map_err(|source| ProbeError::Drain { source })?;

        match transport.read(REPORT_SIZE, Some(timings.read_timeout)) {
            Ok(response) if is_echo(&response, status) => {
                debug!("Drained after {} reads", attempt);
                return Ok(DrainOutcome::Confirmed { attempts: attempt });
            }
            Ok(response) => {
                debug!(
                    "Drain read {}: {:02x?}",
                    attempt,
                    &response[..response.len().min(4)]
                );
            }
            Err(TransportError::Timeout) => {
                debug!("Drain read {} timed out", attempt);
            }
            Err(source) => return Err(ProbeError::Drain { source }),
        }
    }

    warn!("Drained (unconfirmed): no echo after {} reads", budget);
    Ok(DrainOutcome::Unconfirmed { attempts: budget })
}
