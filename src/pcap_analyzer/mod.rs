//! Capture analyzer for recorded G6 USB traffic
//!
//! Reads pcap and pcapng captures, extracts each packet's USB transfer
//! payload and mines the result for size buckets, timing gaps, repeating
//! prefixes and command families. Used to hypothesize the framing of the
//! vendor protocol before driving it live.
//!
//! # Example
//!
//! ```ignore
//! use g6_probe::pcap_analyzer::{run_capture_analysis, AnalysisConfig};
//!
//! let analysis = run_capture_analysis(Path::new("status.pcapng"), &AnalysisConfig::default())?;
//! println!("{} repeating patterns", analysis.repeating_total);
//! ```

mod patterns;
mod printer;
mod usb_urb;

pub use patterns::{
    analyze, AnalysisConfig, CaptureAnalysis, CommandFamily, Occurrence, PatternGroup, SizeBucket,
    TimelineEntry,
};
pub use printer::{OutputFormat, Printer};
pub use usb_urb::{extract_payload, linktype, Direction, UsbPayload};

use std::fs::File;
use std::path::Path;

use pcap_parser::pcapng::Block;
use pcap_parser::traits::PcapNGPacketBlock;
use pcap_parser::{create_reader, PcapBlockOwned, PcapError};
use thiserror::Error;
use tracing::{debug, info};

/// Failures loading a capture file
///
/// Any of these aborts the analysis; no partial report is produced.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("capture parse error: {0}")]
    Parse(String),

    #[error("capture truncated after {frames} frames")]
    Truncated { frames: usize },

    #[error("capture block larger than {limit} bytes")]
    BlockTooLarge { limit: usize },
}

/// Initial reader buffer size
const READ_BUFFER: usize = 65536;

/// The reader buffer doubles for oversized blocks up to this size
const MAX_READ_BUFFER: usize = 64 * 1024 * 1024;

/// One packet of a capture
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    /// Packet ordinal in the file, from 0
    pub index: usize,
    /// Seconds since the first packet
    pub timestamp: f64,
    /// USB transfer payload, empty when the packet carries none
    pub payload: Vec<u8>,
    pub direction: Option<Direction>,
}

impl CapturedFrame {
    pub fn new(index: usize, timestamp: f64, payload: Vec<u8>, direction: Option<Direction>) -> Self {
        Self {
            index,
            timestamp,
            payload,
            direction,
        }
    }
}

/// What a block contributes, copied out before the reader is advanced
enum BlockInfo {
    Link(i32),
    Packet {
        link: Option<i32>,
        micros: u64,
        data: Vec<u8>,
    },
    Skip,
}

/// Read every packet of a pcap or pcapng file
pub fn load_capture(path: &Path) -> Result<Vec<CapturedFrame>, CaptureError> {
    let file = File::open(path).map_err(|source| CaptureError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader =
        create_reader(READ_BUFFER, file).map_err(|e| CaptureError::Parse(format!("{e:?}")))?;
    let mut capacity = READ_BUFFER;

    // Legacy pcap has one link type, pcapng one per interface
    let mut interfaces: Vec<i32> = Vec::new();
    let mut base_micros: Option<u64> = None;
    let mut frames = Vec::new();

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let info = match &block {
                    PcapBlockOwned::LegacyHeader(hdr) => BlockInfo::Link(hdr.network.0),
                    PcapBlockOwned::Legacy(lp) => BlockInfo::Packet {
                        link: interfaces.first().copied(),
                        micros: lp.ts_sec as u64 * 1_000_000 + lp.ts_usec as u64,
                        data: lp.data.to_vec(),
                    },
                    PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                        BlockInfo::Link(idb.linktype.0)
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => BlockInfo::Packet {
                        link: interfaces.get(epb.if_id as usize).copied(),
                        micros: ((epb.ts_high as u64) << 32) | epb.ts_low as u64,
                        data: epb.packet_data().to_vec(),
                    },
                    _ => BlockInfo::Skip,
                };
                reader.consume(offset);

                match info {
                    BlockInfo::Link(link) => {
                        debug!("Interface {}: link type {}", interfaces.len(), link);
                        interfaces.push(link);
                    }
                    BlockInfo::Packet { link, micros, data } => {
                        let base = *base_micros.get_or_insert(micros);
                        let timestamp = micros.saturating_sub(base) as f64 / 1_000_000.0;
                        let payload = match link {
                            Some(link) => extract_payload(link, &data),
                            None => UsbPayload {
                                direction: None,
                                data,
                            },
                        };
                        frames.push(CapturedFrame::new(
                            frames.len(),
                            timestamp,
                            payload.data,
                            payload.direction,
                        ));
                    }
                    BlockInfo::Skip => {}
                }
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| CaptureError::Parse(format!("refill: {e:?}")))?;
            }
            Err(PcapError::UnexpectedEof) => {
                return Err(CaptureError::Truncated {
                    frames: frames.len(),
                });
            }
            Err(PcapError::BufferTooSmall) => {
                let grown = capacity * 2;
                if grown > MAX_READ_BUFFER || !reader.grow(grown) {
                    return Err(CaptureError::BlockTooLarge { limit: capacity });
                }
                debug!("Reader buffer grown to {} bytes", grown);
                capacity = grown;
                reader
                    .refill()
                    .map_err(|e| CaptureError::Parse(format!("refill: {e:?}")))?;
            }
            Err(e) => return Err(CaptureError::Parse(format!("{e:?}"))),
        }
    }

    info!("Loaded {} frames from {}", frames.len(), path.display());
    Ok(frames)
}

/// Load a capture and analyze it
pub fn run_capture_analysis(
    path: &Path,
    config: &AnalysisConfig,
) -> Result<CaptureAnalysis, CaptureError> {
    let frames = load_capture(path)?;
    Ok(analyze(&frames, config))
}
