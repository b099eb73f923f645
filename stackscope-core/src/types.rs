//! Core domain types for stackscope
//!
//! These types describe what the analyzer extracts from a preprocessing run
//! log and what it reports back.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **LogLine** | One line of the input log, with its line number and optional timestamp |
//! | **LogEvent** | A structured fact extracted from a line (phase boundary, count, error, ...) |
//! | **Phase** | A named, time-bounded stage of the pipeline (conversion, registration, ...) |
//! | **Waterfall** | The funnel of image counts surviving each successive stage |
//! | **Finding** | An advisory diagnostic from a detector, never a hard error |
//! | **Yield** | Final image count over initial image count across the waterfall |

use chrono::NaiveDateTime;
use serde::Serialize;

// ============================================
// Lines and events
// ============================================

/// A raw line read from the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    /// 1-based line number in the source
    pub line_number: u64,
    /// Line text without the trailing newline
    pub raw_text: String,
    /// Timestamp parsed from the line prefix, if any
    pub timestamp: Option<NaiveDateTime>,
    /// Byte offset where the text after the timestamp prefix begins
    pub body_start: usize,
}

impl LogLine {
    /// Text after the timestamp prefix.
    pub fn body(&self) -> &str {
        self.raw_text.get(self.body_start..).unwrap_or("")
    }
}

/// Kind of extracted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PhaseStart,
    PhaseEnd,
    ImageCount,
    Error,
    Warning,
    Info,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PhaseStart => "phase_start",
            EventKind::PhaseEnd => "phase_end",
            EventKind::ImageCount => "image_count",
            EventKind::Error => "error",
            EventKind::Warning => "warning",
            EventKind::Info => "info",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A numeric quality value reported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measurement {
    /// Star sharpness of one frame, in pixels
    Fwhm { value: f64 },
    /// Field rotation of one frame, in degrees
    Rotation { degrees: f64 },
    /// Low/high pixel rejection percentages for one channel
    PixelRejection { channel: u32, low: f64, high: f64 },
    /// Logical processors used by the pipeline
    Processors { count: u32 },
    /// Per-frame plate-solve outcome
    PlateSolve { solved: bool },
    /// Plate-solve tally printed at the end of the phase
    PlateSolveSummary { solved: u64, total: u64 },
}

/// A structured fact extracted from one log line.
///
/// Events are emitted in source-line order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub kind: EventKind,
    pub timestamp: Option<NaiveDateTime>,
    /// Phase the event opens, closes or is attached to
    pub phase_name: Option<PhaseName>,
    /// Image count, for `ImageCount` events
    pub count: Option<u64>,
    /// Text of the line the event came from (timestamp prefix removed)
    pub message: String,
    pub source_line: u64,
    /// Failing component, for `Error` events
    pub subsystem: Option<String>,
    /// Quality value, for `Info` events
    pub measurement: Option<Measurement>,
}

impl LogEvent {
    /// Create an event with only the always-present fields set.
    pub fn new(
        kind: EventKind,
        source_line: u64,
        timestamp: Option<NaiveDateTime>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            timestamp,
            phase_name: None,
            count: None,
            message: message.into(),
            source_line,
            subsystem: None,
            measurement: None,
        }
    }

    pub fn with_phase(mut self, phase: PhaseName) -> Self {
        self.phase_name = Some(phase);
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn with_measurement(mut self, measurement: Measurement) -> Self {
        self.measurement = Some(measurement);
        self
    }
}

// ============================================
// Phases
// ============================================

/// Recognized pipeline phases.
///
/// `Unscoped` owns image counts seen while no phase is open; `Unknown`
/// stands in for phase labels that match nothing below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Conversion,
    Calibration,
    PlateSolving,
    BackgroundExtraction,
    Registration,
    Stacking,
    Unscoped,
    Unknown,
}

/// Label fragments mapped to phases, checked in order.
const PHASE_ALIASES: &[(&str, PhaseName)] = &[
    ("convert", PhaseName::Conversion),
    ("conversion", PhaseName::Conversion),
    ("calibrat", PhaseName::Calibration),
    ("preprocess", PhaseName::Calibration),
    ("plate", PhaseName::PlateSolving),
    ("platesolv", PhaseName::PlateSolving),
    ("astrometr", PhaseName::PlateSolving),
    ("background", PhaseName::BackgroundExtraction),
    ("seqsubsky", PhaseName::BackgroundExtraction),
    ("subsky", PhaseName::BackgroundExtraction),
    ("regist", PhaseName::Registration),
    ("seqapplyreg", PhaseName::Registration),
    ("align", PhaseName::Registration),
    ("stack", PhaseName::Stacking),
    ("unscoped", PhaseName::Unscoped),
];

impl PhaseName {
    /// Resolve a free-text phase label. Never fails; unmatched labels are `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        PHASE_ALIASES
            .iter()
            .find(|(fragment, _)| label.contains(fragment))
            .map(|(_, phase)| *phase)
            .unwrap_or(PhaseName::Unknown)
    }

    /// Identifier used in JSON output and rule documentation
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Conversion => "conversion",
            PhaseName::Calibration => "calibration",
            PhaseName::PlateSolving => "plate_solving",
            PhaseName::BackgroundExtraction => "background_extraction",
            PhaseName::Registration => "registration",
            PhaseName::Stacking => "stacking",
            PhaseName::Unscoped => "unscoped",
            PhaseName::Unknown => "unknown",
        }
    }

    /// Returns the display name for this phase
    pub fn display_name(&self) -> &'static str {
        match self {
            PhaseName::Conversion => "Conversion",
            PhaseName::Calibration => "Calibration",
            PhaseName::PlateSolving => "Plate Solving",
            PhaseName::BackgroundExtraction => "Background Extraction",
            PhaseName::Registration => "Registration",
            PhaseName::Stacking => "Stacking",
            PhaseName::Unscoped => "Unscoped",
            PhaseName::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final state of a phase in the report.
///
/// Phases that never started are not reported, and a phase still open when
/// the log ends is reported as `Abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Closed,
    Abandoned,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Closed => "closed",
            PhaseStatus::Abandoned => "abandoned",
        }
    }
}

/// One run of a pipeline phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub name: PhaseName,
    pub status: PhaseStatus,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// `end - start` in seconds; `None` when either side is unknown
    pub duration_secs: Option<i64>,
    /// Line of the start marker; `None` for an end marker without a start
    pub start_line: Option<u64>,
    pub end_line: Option<u64>,
}

impl Phase {
    pub fn is_closed(&self) -> bool {
        self.status == PhaseStatus::Closed
    }
}

// ============================================
// Waterfall
// ============================================

/// One stage of the image-count funnel.
///
/// Unknown counts stay `None`; they are never interpolated from neighbours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallStep {
    pub stage_name: PhaseName,
    pub input_count: Option<u64>,
    pub output_count: Option<u64>,
    /// `input_count - output_count`; negative when a stage gained images, `None`
    /// when a count is missing or the difference overflows `i64`
    pub dropped: Option<i64>,
    /// Number of count events observed for the stage
    pub samples: usize,
}

impl WaterfallStep {
    /// Percentage of the input that survived the stage
    pub fn retained_percent(&self) -> Option<f64> {
        match (self.input_count, self.output_count) {
            (Some(input), Some(output)) if input > 0 => {
                Some(output as f64 / input as f64 * 100.0)
            }
            _ => None,
        }
    }

    /// Percentage of the input dropped by the stage
    pub fn dropped_percent(&self) -> Option<f64> {
        match (self.input_count, self.dropped) {
            (Some(input), Some(dropped)) if input > 0 => Some(dropped as f64 / input as f64 * 100.0),
            _ => None,
        }
    }

    /// Whether the stage reported no counts at all
    pub fn is_gap(&self) -> bool {
        self.output_count.is_none()
    }
}

// ============================================
// Findings
// ============================================

/// Severity of a finding, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An advisory diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub detector_name: String,
    pub severity: Severity,
    pub message: String,
    /// Source lines supporting the finding, ascending
    pub evidence_lines: Vec<u64>,
}

impl Finding {
    pub fn new(
        detector_name: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        evidence_lines: Vec<u64>,
    ) -> Self {
        Self {
            detector_name: detector_name.into(),
            severity,
            message: message.into(),
            evidence_lines,
        }
    }
}

// ============================================
// Quality metrics
// ============================================

/// Summary statistics over a sample of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl SampleStats {
    /// Compute statistics; `None` for an empty or non-finite sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sorted.iter().sum::<f64>() / count as f64,
            median,
        })
    }

    pub fn spread(&self) -> f64 {
        self.max - self.min
    }
}

/// Pixel rejection percentages for one colour channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelRejection {
    pub channel: u32,
    pub low: f64,
    pub high: f64,
}

/// Quality values gathered across the whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub plate_solve_successes: u64,
    pub plate_solve_failures: u64,
    pub fwhm: Option<SampleStats>,
    pub rotation: Option<SampleStats>,
    pub pixel_rejection: Vec<ChannelRejection>,
    pub processors_used: Option<u32>,
}

impl QualityMetrics {
    /// Plate-solve success rate in percent, when any frame was attempted
    pub fn plate_solve_success_percent(&self) -> Option<f64> {
        let total = self.plate_solve_successes + self.plate_solve_failures;
        if total == 0 {
            return None;
        }
        Some(self.plate_solve_successes as f64 / total as f64 * 100.0)
    }
}

// ============================================
// Report
// ============================================

/// Run-wide totals shown in the report header and footer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Last event timestamp minus first event timestamp
    pub total_elapsed_secs: Option<i64>,
    /// Sum of known phase durations
    pub phase_time_secs: Option<i64>,
    pub images_in: Option<u64>,
    pub images_out: Option<u64>,
    pub yield_percent: Option<f64>,
}

/// Complete result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Where the log came from (path or `<memory>`)
    pub source: String,
    /// Version of the pattern rules used for extraction
    pub ruleset_version: u32,
    pub lines_read: u64,
    pub events_extracted: usize,
    pub phases: Vec<Phase>,
    pub waterfall: Vec<WaterfallStep>,
    /// Sorted most severe first
    pub findings: Vec<Finding>,
    pub metrics: QualityMetrics,
    pub summary: Summary,
}

impl Report {
    /// Whether extraction found nothing at all
    pub fn is_empty(&self) -> bool {
        self.events_extracted == 0
    }

    /// Findings of one severity, in report order
    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }
}
