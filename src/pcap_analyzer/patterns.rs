//! Offline analysis of captured frames
//!
//! Frames are bucketed by size, the control band is laid out on a timeline
//! with gap markers, and control frames are grouped by prefix and by opcode.
//! The analysis is a pure function of its input and produces the same
//! result every time.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::time::Duration;

use g6_transport::protocol::{self, opcode, CLASS_MARKER};
use serde::{Serialize, Serializer};

use super::CapturedFrame;

/// Tunables of a capture analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// A delta above this marks a probable interaction boundary
    pub gap_threshold: Duration,
    /// Maximum number of timeline rows kept
    pub timeline_limit: usize,
    /// Bytes of payload used as the pattern key
    pub prefix_len: usize,
    /// Number of repeating patterns reported
    pub top_patterns: usize,
    /// Occurrence lists are kept for groups no larger than this
    pub list_limit: usize,
    /// Payload sizes considered HID control traffic
    pub control_band: RangeInclusive<usize>,
    /// Frames with larger payloads are ignored
    pub max_payload: usize,
    /// Examples kept per command family
    pub family_examples: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            gap_threshold: Duration::from_millis(100),
            timeline_limit: 200,
            prefix_len: 16,
            top_patterns: 20,
            list_limit: 10,
            control_band: 8..=65,
            max_payload: 100,
            family_examples: 3,
        }
    }
}

fn as_hex<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&protocol::hex(bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeBucket {
    pub size: usize,
    pub count: usize,
}

/// One control-band frame on the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub index: usize,
    pub timestamp: f64,
    /// Seconds since the previous control frame
    pub delta: f64,
    pub len: usize,
    pub gap: bool,
    #[serde(serialize_with = "as_hex")]
    pub head: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Occurrence {
    pub index: usize,
    pub timestamp: f64,
}

/// Control frames sharing an identical prefix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternGroup {
    #[serde(serialize_with = "as_hex")]
    pub prefix: Vec<u8>,
    pub count: usize,
    /// Empty when the group is larger than the list limit
    pub occurrences: Vec<Occurrence>,
}

impl PatternGroup {
    pub fn frame_indices(&self) -> Vec<usize> {
        self.occurrences.iter().map(|o| o.index).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyExample {
    pub index: usize,
    #[serde(serialize_with = "as_hex")]
    pub head: Vec<u8>,
}

/// Control frames starting with the class marker, grouped by opcode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandFamily {
    pub opcode: u8,
    pub name: &'static str,
    pub count: usize,
    pub examples: Vec<FamilyExample>,
}

/// Result of analyzing one capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureAnalysis {
    pub total_frames: usize,
    /// Frames with a non-empty payload within the size limit
    pub considered: usize,
    /// Ascending by size; counts sum to `considered`
    pub size_buckets: Vec<SizeBucket>,
    pub control_frames: usize,
    pub gap_threshold_ms: u128,
    pub gap_count: usize,
    pub timeline: Vec<TimelineEntry>,
    /// Number of repeating groups before truncation
    pub repeating_total: usize,
    pub patterns: Vec<PatternGroup>,
    pub families: Vec<CommandFamily>,
}

/// Analyze `frames` with `config`
pub fn analyze(frames: &[CapturedFrame], config: &AnalysisConfig) -> CaptureAnalysis {
    let considered: Vec<&CapturedFrame> = frames
        .iter()
        .filter(|f| !f.payload.is_empty() && f.payload.len() <= config.max_payload)
        .collect();

    let mut buckets: BTreeMap<usize, usize> = BTreeMap::new();
    for f in &considered {
        *buckets.entry(f.payload.len()).or_default() += 1;
    }
    let size_buckets = buckets
        .into_iter()
        .map(|(size, count)| SizeBucket { size, count })
        .collect();

    let mut control: Vec<&CapturedFrame> = considered
        .iter()
        .copied()
        .filter(|f| config.control_band.contains(&f.payload.len()))
        .collect();
    // Stable, so frames with equal timestamps keep file order
    control.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let (timeline, gap_count) = build_timeline(&control, config);
    let (patterns, repeating_total) = group_patterns(&control, config);

    CaptureAnalysis {
        total_frames: frames.len(),
        considered: considered.len(),
        size_buckets,
        control_frames: control.len(),
        gap_threshold_ms: config.gap_threshold.as_millis(),
        gap_count,
        timeline,
        repeating_total,
        patterns,
        families: group_families(&control, config),
    }
}

fn build_timeline(control: &[&CapturedFrame], config: &AnalysisConfig) -> (Vec<TimelineEntry>, usize) {
    let threshold = config.gap_threshold.as_secs_f64();
    let mut timeline = Vec::with_capacity(control.len().min(config.timeline_limit));
    let mut gaps = 0;
    let mut prev = control.first().map(|f| f.timestamp).unwrap_or_default();

    for f in control {
        let delta = f.timestamp - prev;
        let gap = delta > threshold;
        if gap {
            gaps += 1;
        }
        if timeline.len() < config.timeline_limit {
            timeline.push(TimelineEntry {
                index: f.index,
                timestamp: f.timestamp,
                delta,
                len: f.payload.len(),
                gap,
                head: f.payload[..f.payload.len().min(32)].to_vec(),
            });
        }
        prev = f.timestamp;
    }
    (timeline, gaps)
}

fn group_patterns(control: &[&CapturedFrame], config: &AnalysisConfig) -> (Vec<PatternGroup>, usize) {
    // Groups in order of first occurrence
    let mut groups: Vec<(Vec<u8>, Vec<Occurrence>)> = Vec::new();
    let mut by_key: HashMap<&[u8], usize> = HashMap::new();

    for f in control {
        let key = &f.payload[..f.payload.len().min(config.prefix_len)];
        let occurrence = Occurrence {
            index: f.index,
            timestamp: f.timestamp,
        };
        match by_key.get(key) {
            Some(&slot) => groups[slot].1.push(occurrence),
            None => {
                by_key.insert(key, groups.len());
                groups.push((key.to_vec(), vec![occurrence]));
            }
        }
    }

    let mut repeating: Vec<_> = groups.into_iter().filter(|(_, occ)| occ.len() > 1).collect();
    // Stable sort keeps first-occurrence order among equal counts
    repeating.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    let total = repeating.len();

    let patterns = repeating
        .into_iter()
        .take(config.top_patterns)
        .map(|(prefix, occurrences)| {
            let count = occurrences.len();
            PatternGroup {
                prefix,
                count,
                occurrences: if count <= config.list_limit {
                    occurrences
                } else {
                    Vec::new()
                },
            }
        })
        .collect();
    (patterns, total)
}

fn group_families(control: &[&CapturedFrame], config: &AnalysisConfig) -> Vec<CommandFamily> {
    let mut families: BTreeMap<u8, CommandFamily> = BTreeMap::new();

    for f in control {
        let (Some(&CLASS_MARKER), Some(&op)) = (f.payload.first(), f.payload.get(1)) else {
            continue;
        };
        let family = families.entry(op).or_insert_with(|| CommandFamily {
            opcode: op,
            name: opcode::name(op),
            count: 0,
            examples: Vec::new(),
        });
        family.count += 1;
        if family.examples.len() < config.family_examples {
            family.examples.push(FamilyExample {
                index: f.index,
                head: f.payload[..f.payload.len().min(16)].to_vec(),
            });
        }
    }
    families.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize, timestamp: f64, payload: &[u8]) -> CapturedFrame {
        CapturedFrame::new(index, timestamp, payload.to_vec(), None)
    }

    #[test]
    fn test_filters_empty_and_oversized() {
        let frames = vec![
            frame(0, 0.0, &[]),
            frame(1, 0.1, &[0u8; 101]),
            frame(2, 0.2, &[0u8; 100]),
            frame(3, 0.3, &[0u8; 4]),
        ];
        let a = analyze(&frames, &AnalysisConfig::default());
        assert_eq!(a.total_frames, 4);
        assert_eq!(a.considered, 2);
        assert_eq!(
            a.size_buckets,
            vec![SizeBucket { size: 4, count: 1 }, SizeBucket { size: 100, count: 1 }]
        );
        assert_eq!(a.control_frames, 0);
    }

    #[test]
    fn test_timeline_marks_gaps() {
        let p = [0x5a, 0x05, 0, 0, 0, 0, 0, 0];
        let frames = vec![
            frame(0, 0.000, &p),
            frame(1, 0.050, &p),
            frame(2, 0.300, &p),
            frame(3, 0.301, &p),
        ];
        let a = analyze(&frames, &AnalysisConfig::default());
        let gaps: Vec<bool> = a.timeline.iter().map(|t| t.gap).collect();
        assert_eq!(gaps, [false, false, true, false]);
        assert_eq!(a.gap_count, 1);
        assert_eq!(a.timeline[0].delta, 0.0);
    }

    #[test]
    fn test_gap_threshold_is_tunable() {
        let p = [0x5a, 0x05, 0, 0, 0, 0, 0, 0];
        let frames = vec![frame(0, 0.0, &p), frame(1, 0.05, &p)];
        let config = AnalysisConfig {
            gap_threshold: Duration::from_millis(20),
            ..Default::default()
        };
        assert_eq!(analyze(&frames, &config).gap_count, 1);
    }

    #[test]
    fn test_timeline_is_bounded() {
        let frames: Vec<_> = (0..10).map(|i| frame(i, i as f64, &[0u8; 8])).collect();
        let config = AnalysisConfig {
            timeline_limit: 3,
            ..Default::default()
        };
        let a = analyze(&frames, &config);
        assert_eq!(a.timeline.len(), 3);
        assert_eq!(a.gap_count, 9);
    }

    #[test]
    fn test_pattern_ties_keep_first_occurrence() {
        let a8 = [0xaa; 8];
        let b8 = [0xbb; 8];
        let frames = vec![
            frame(0, 0.0, &b8),
            frame(1, 0.1, &a8),
            frame(2, 0.2, &a8),
            frame(3, 0.3, &b8),
        ];
        let a = analyze(&frames, &AnalysisConfig::default());
        assert_eq!(a.repeating_total, 2);
        assert_eq!(a.patterns[0].prefix, b8.to_vec());
        assert_eq!(a.patterns[1].prefix, a8.to_vec());
    }

    #[test]
    fn test_large_groups_omit_indices() {
        let frames: Vec<_> = (0..11).map(|i| frame(i, i as f64, &[0x01; 8])).collect();
        let a = analyze(&frames, &AnalysisConfig::default());
        assert_eq!(a.patterns[0].count, 11);
        assert!(a.patterns[0].occurrences.is_empty());
    }

    #[test]
    fn test_command_families() {
        let frames = vec![
            frame(0, 0.0, &[0x5a, 0x2c, 0x05, 0x00, 0x04, 0, 0, 0]),
            frame(1, 0.1, &[0x5a, 0x12, 0x07, 0x01, 0x96, 0x0a, 0, 0]),
            frame(2, 0.2, &[0x5a, 0x12, 0x07, 0x01, 0x96, 0x0b, 0, 0]),
            frame(3, 0.3, &[0x00, 0x5a, 0x12, 0, 0, 0, 0, 0]),
        ];
        let a = analyze(&frames, &AnalysisConfig::default());
        let ops: Vec<(u8, usize)> = a.families.iter().map(|f| (f.opcode, f.count)).collect();
        assert_eq!(ops, [(0x12, 2), (0x2c, 1)]);
        assert_eq!(a.families[1].name, "OUTPUT_CONFIG");
        assert_eq!(a.families[0].examples[0].index, 1);
    }
}
