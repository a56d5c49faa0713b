//! Sound BlasterX G6 protocol probe CLI
//!
//! Drives the G6 vendor HID interface to discover which response bytes encode
//! the selected output, and analyzes recorded USB captures offline.

use clap::Parser;
use tracing::debug;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "g6_probe=debug,g6_transport=debug"
    } else {
        "g6_probe=info,g6_transport=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let protocol = cli.protocol.as_deref();
    let load_tables = || {
        let tables = commands::load_tables(protocol)?;
        debug!(
            "Loaded protocol tables v{}: {} read commands, {} sequences",
            tables.version,
            tables.catalog.len(),
            tables.sequences.len()
        );
        anyhow::Ok(tables)
    };

    // Create printer config if monitoring is enabled
    let printer_config = commands::create_printer_config(cli.monitor, cli.hex);

    match cli.command {
        Commands::Discover => commands::device::discover(&load_tables()?, printer_config),
        Commands::Read => commands::device::read(&load_tables()?, printer_config),
        Commands::Switch { output } => {
            commands::device::switch(&load_tables()?, &output, printer_config)
        }
        Commands::List => commands::device::list(&load_tables()?),
        Commands::Tables => commands::tables::tables(&load_tables()?),
        // Capture analysis needs neither the device nor the tables
        Commands::Analyze {
            file,
            gap_ms,
            timeline,
            format,
        } => commands::analyze::analyze(&file, gap_ms, timeline, format),
    }
}
