// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "g6_probe")]
#[command(author, version, about = "Sound BlasterX G6 HID protocol probe")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable transport monitoring (prints all reports sent and received)
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Show raw hex dump in monitor output
    #[arg(long, global = true)]
    pub hex: bool,

    /// Load protocol tables from a TOML file instead of the built-in ones
    #[arg(long, global = true, value_name = "FILE")]
    pub protocol: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Baseline read, switch to each output, diff the snapshots
    #[command(visible_alias = "disc")]
    Discover,

    /// Read every catalog command once and print the responses
    #[command(visible_aliases = ["snapshot", "r"])]
    Read,

    /// Switch the active output
    #[command(visible_alias = "sw")]
    Switch {
        /// Sequence name from the protocol tables (e.g. headphones, speakers)
        output: String,
    },

    /// List the device's HID interfaces
    #[command(visible_alias = "ls")]
    List,

    /// Analyze a recorded USB capture (pcap or pcapng)
    #[command(visible_alias = "pcap")]
    Analyze {
        /// Capture file
        file: PathBuf,

        /// Delta between control frames that counts as a gap (ms)
        #[arg(long, default_value = "100")]
        gap_ms: u64,

        /// Maximum number of timeline rows
        #[arg(long, default_value = "200")]
        timeline: usize,

        /// Output format
        #[arg(long, value_enum, default_value_t = CaptureOutputFormat::Text)]
        format: CaptureOutputFormat,
    },

    /// Print the loaded protocol tables
    Tables,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum CaptureOutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON document
    Json,
}
