//! Analysis orchestration
//!
//! One run: read the log once, materialize the events (and the timestamp of
//! every stamped line), then let every consumer (phase aggregator, waterfall
//! builder, metrics, detectors) read the same slices. Nothing here can fail; problems reading the log end up as
//! findings in the report.

use crate::analysis::{
    compute_metrics, create_default_engine, DetectionContext, DetectorEngine, LineStamp,
    PhaseAggregator, WaterfallBuilder,
};
use crate::config::Config;
use crate::ingest::{
    default_registry, EventExtractor, LogReader, ReadIssue, RuleRegistry, RULESET_VERSION,
};
use crate::types::{Finding, LogEvent, Phase, Report, Summary, WaterfallStep};
use std::cmp::Reverse;
use std::path::Path;

/// Source label for in-memory input.
pub const MEMORY_SOURCE: &str = "<memory>";

/// Runs the full pipeline over one log.
pub struct Analyzer {
    registry: RuleRegistry,
    engine: DetectorEngine,
}

impl Analyzer {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: default_registry(),
            engine: create_default_engine(&config.detectors),
        }
    }

    /// Pattern rules used for extraction.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Detectors run over the extracted events.
    pub fn engine(&self) -> &DetectorEngine {
        &self.engine
    }

    /// Analyze a log file. A missing or unreadable file gives a report with a
    /// critical finding, not an error.
    pub fn analyze_path(&self, path: &Path) -> Report {
        self.analyze_reader(path.display().to_string(), LogReader::open(path))
    }

    /// Analyze log text held in memory.
    pub fn analyze_text(&self, text: &str) -> Report {
        self.analyze_reader(MEMORY_SOURCE, LogReader::from_text(text))
    }

    /// Analyze whatever `reader` yields.
    pub fn analyze_reader(&self, source: impl Into<String>, mut reader: LogReader) -> Report {
        let source = source.into();

        let mut line_stamps: Vec<LineStamp> = Vec::new();
        let lines = reader.by_ref().inspect(|line| {
            if let Some(timestamp) = line.timestamp {
                line_stamps.push(LineStamp {
                    line: line.line_number,
                    timestamp,
                });
            }
        });
        let events: Vec<LogEvent> = EventExtractor::new(&self.registry).extract(lines).collect();
        let lines_read = reader.lines_read();
        let issues = reader.into_issues();

        let phases = PhaseAggregator::aggregate(&events);
        let waterfall = WaterfallBuilder::from_events(&events);
        let metrics = compute_metrics(&events);

        let mut findings: Vec<Finding> = issues.iter().map(ReadIssue::to_finding).collect();
        findings.extend(waterfall.findings);
        let ctx = DetectionContext {
            line_stamps: &line_stamps,
        };
        findings.extend(self.engine.run_all(&events, &ctx));
        sort_findings(&mut findings);

        let summary = summarize(&events, &phases, &waterfall.steps);

        tracing::info!(
            source = %source,
            lines = lines_read,
            events = events.len(),
            phases = phases.len(),
            steps = waterfall.steps.len(),
            findings = findings.len(),
            "Analysis complete"
        );

        Report {
            source,
            ruleset_version: RULESET_VERSION,
            lines_read,
            events_extracted: events.len(),
            phases,
            waterfall: waterfall.steps,
            findings,
            metrics,
            summary,
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

/// Most severe first, then by first evidence line, then detector name.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        let key = |f: &Finding| {
            (
                Reverse(f.severity),
                f.evidence_lines.first().copied().unwrap_or(0),
            )
        };
        key(a)
            .cmp(&key(b))
            .then_with(|| a.detector_name.cmp(&b.detector_name))
            .then_with(|| a.message.cmp(&b.message))
    });
}

/// Compute run-wide totals.
pub fn summarize(events: &[LogEvent], phases: &[Phase], steps: &[WaterfallStep]) -> Summary {
    let first = events.iter().find_map(|e| e.timestamp);
    let last = events.iter().rev().find_map(|e| e.timestamp);
    let total_elapsed_secs = match (first, last) {
        (Some(first), Some(last)) if last >= first => Some((last - first).num_seconds()),
        _ => None,
    };

    let known: Vec<i64> = phases.iter().filter_map(|p| p.duration_secs).collect();
    let phase_time_secs = (!known.is_empty()).then(|| known.iter().sum::<i64>());

    let images_in = steps.iter().find_map(|s| s.input_count);
    let images_out = steps.iter().rev().find_map(|s| s.output_count);
    let yield_percent = match (images_in, images_out) {
        (Some(input), Some(output)) if input > 0 => Some(output as f64 / input as f64 * 100.0),
        _ => None,
    };

    Summary {
        total_elapsed_secs,
        phase_time_secs,
        images_in,
        images_out,
        yield_percent,
    }
}
