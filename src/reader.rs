//! State reader: one pass over the read catalog produces a snapshot

use std::fmt;

use g6_transport::protocol::{self, REPORT_SIZE};
use g6_transport::{Transport, TransportError};
use tracing::{debug, info};

use crate::error::ProbeError;
use crate::sequencer::drain_buffer;
use crate::tables::ProtocolTables;

/// Raw responses to the read catalog, captured within one connection
///
/// Entries keep catalog order. A snapshot is never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    label: String,
    entries: Vec<(String, Vec<u8>)>,
}

impl Snapshot {
    /// Build a snapshot from already-captured responses
    pub fn from_entries<I, S>(label: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        Self {
            label: label.to_string(),
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Response recorded for a command
    pub fn get(&self, command: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(name, _)| name == command)
            .map(|(_, resp)| resp.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(name, resp)| (name.as_str(), resp.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Snapshot '{}':", self.label)?;
        for (name, resp) in self.iter() {
            writeln!(f, "  {:16}: {}", name, protocol::hex(&resp[..resp.len().min(16)]))?;
        }
        Ok(())
    }
}

/// Query every catalog command once and record the responses
///
/// The buffer is drained before the first query. Any failed write or read
/// aborts the pass and names the command.
pub fn read_snapshot<T: Transport + ?Sized>(
    transport: &T,
    tables: &ProtocolTables,
    label: &str,
) -> Result<Snapshot, ProbeError> {
    info!("Reading {} commands for '{}'", tables.catalog.len(), label);
    let drain = drain_buffer(transport, &tables.status, &tables.timings)?;
    debug!("Pre-read drain: {:?}", drain);

    let mut entries = Vec::with_capacity(tables.catalog.len());
    for cmd in tables.catalog.iter() {
        let to_error = |source: TransportError| ProbeError::Read {
            command: cmd.name.clone(),
            source,
        };

        transport.write(&cmd.report.to_wire()).map_err(to_error)?;
        let response = transport
            .read(REPORT_SIZE, Some(tables.timings.read_timeout))
            .map_err(to_error)?;

        debug!(
            "  {:16}: {}",
            cmd.name,
            protocol::hex(&response[..response.len().min(16)])
        );
        entries.push((cmd.name.clone(), response));

        std::thread::sleep(tables.timings.inter_read);
    }

    Ok(Snapshot {
        label: label.to_string(),
        entries,
    })
}
