//! Capture analysis command handler.

use std::path::Path;
use std::time::Duration;

use super::CommandResult;
use crate::cli::CaptureOutputFormat;
use anyhow::Context;
use g6_probe::pcap_analyzer::{run_capture_analysis, AnalysisConfig, OutputFormat, Printer};

/// Analyze a capture file and print the report to stdout
pub fn analyze(path: &Path, gap_ms: u64, timeline: usize, format: CaptureOutputFormat) -> CommandResult {
    let config = AnalysisConfig {
        gap_threshold: Duration::from_millis(gap_ms),
        timeline_limit: timeline,
        ..Default::default()
    };
    let format = match format {
        CaptureOutputFormat::Text => OutputFormat::Text,
        CaptureOutputFormat::Json => OutputFormat::Json,
    };

    let analysis = run_capture_analysis(path, &config)
        .with_context(|| format!("analyzing {}", path.display()))?;
    let report = Printer::new(format).render(&analysis)?;
    println!("{report}");
    Ok(())
}
