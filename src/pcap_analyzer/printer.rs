//! Output formatting for capture analysis reports

use std::fmt::Write as _;

use g6_transport::protocol;

use super::patterns::CaptureAnalysis;

/// Output format for the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Renders a `CaptureAnalysis`
pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render the whole report as one string
    pub fn render(&self, analysis: &CaptureAnalysis) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Text => Ok(render_text(analysis)),
            OutputFormat::Json => serde_json::to_string_pretty(analysis),
        }
    }
}

fn section(out: &mut String, title: &str) {
    let rule = "=".repeat(80);
    let _ = writeln!(out, "\n{rule}\n{title}\n{rule}");
}

fn render_text(a: &CaptureAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total frames: {}", a.total_frames);
    let _ = writeln!(out, "Frames with data (<= 100 bytes): {}", a.considered);

    let _ = writeln!(out, "\nFrames by size:");
    for b in &a.size_buckets {
        let _ = writeln!(out, "  {:3} bytes: {} frames", b.size, b.count);
    }

    section(&mut out, "CONTROL FRAMES (8-65 bytes)");
    let _ = writeln!(
        out,
        "{} control frames, {} gap(s) over {} ms; showing {}\n",
        a.control_frames,
        a.gap_count,
        a.gap_threshold_ms,
        a.timeline.len()
    );
    for t in &a.timeline {
        let _ = writeln!(
            out,
            "Frame {:5} (+{:6.3}s): {:2}b - {}{}",
            t.index,
            t.delta,
            t.len,
            protocol::hex(&t.head),
            if t.gap { " <-- GAP" } else { "" }
        );
    }

    section(&mut out, "REPEATING PATTERNS");
    let _ = writeln!(out, "Found {} repeating patterns\n", a.repeating_total);
    for p in &a.patterns {
        let _ = writeln!(out, "{:4}x: {}", p.count, protocol::hex(&p.prefix));
        if !p.occurrences.is_empty() {
            let _ = writeln!(out, "       Frames: {:?}", p.frame_indices());
        }
    }

    section(&mut out, "COMMAND FAMILIES (0x5a, byte 1)");
    if a.families.is_empty() {
        let _ = writeln!(out, "No frames start with the class marker");
    }
    for fam in &a.families {
        let _ = writeln!(
            out,
            "\nOpcode 0x{:02x} {}: {} occurrences",
            fam.opcode, fam.name, fam.count
        );
        for ex in &fam.examples {
            let _ = writeln!(out, "  Frame {}: {}", ex.index, protocol::hex(&ex.head));
        }
    }
    out
}
