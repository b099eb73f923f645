//! Image-count waterfall
//!
//! Builds the funnel of images surviving each stage from IMAGE_COUNT events.
//!
//! ## Rules
//!
//! | Case | Input | Output |
//! |------|-------|--------|
//! | Stage with counts after a known output | previous output | last count |
//! | Stage with counts after a gap (or first) | first count | last count |
//! | Stage that started but reported no count | previous output, if known | unknown |
//!
//! Values are reported as logged. A stage whose counts rise, or whose output
//! exceeds its input, gets one `waterfall.monotonicity` warning; nothing is
//! corrected or interpolated.

use crate::types::{EventKind, Finding, LogEvent, PhaseName, Severity, WaterfallStep};

/// Detector name for non-monotonic stages.
pub const MONOTONICITY_FINDING_SOURCE: &str = "waterfall.monotonicity";

/// `input - output`, or `None` when the difference does not fit an `i64`.
fn dropped_between(input: u64, output: u64) -> Option<i64> {
    i64::try_from(i128::from(input) - i128::from(output)).ok()
}

/// Output of [`WaterfallBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waterfall {
    pub steps: Vec<WaterfallStep>,
    pub findings: Vec<Finding>,
}

#[derive(Debug)]
struct Stage {
    name: PhaseName,
    /// (count, source line) in order of appearance
    counts: Vec<(u64, u64)>,
}

/// Collects stages in first-occurrence order.
#[derive(Debug, Default)]
pub struct WaterfallBuilder {
    stages: Vec<Stage>,
}

impl WaterfallBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a waterfall from a complete event sequence.
    pub fn from_events(events: &[LogEvent]) -> Waterfall {
        let mut builder = Self::new();
        for event in events {
            builder.observe(event);
        }
        builder.build()
    }

    fn stage_mut(&mut self, name: PhaseName) -> &mut Stage {
        let index = match self.stages.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.stages.push(Stage {
                    name,
                    counts: Vec::new(),
                });
                self.stages.len() - 1
            }
        };
        &mut self.stages[index]
    }

    /// Feed one event.
    ///
    /// Phase starts register a stage so a stage that reports nothing still
    /// shows up as a gap. Unrecognized phase labels only appear if they carry
    /// counts.
    pub fn observe(&mut self, event: &LogEvent) {
        let Some(name) = event.phase_name else {
            return;
        };
        match (event.kind, event.count) {
            (EventKind::ImageCount, Some(count)) => {
                self.stage_mut(name).counts.push((count, event.source_line));
            }
            (EventKind::PhaseStart, _) if name != PhaseName::Unknown => {
                self.stage_mut(name);
            }
            _ => {}
        }
    }

    pub fn build(self) -> Waterfall {
        let mut waterfall = Waterfall::default();
        let mut previous_output: Option<u64> = None;

        for stage in self.stages {
            let (Some(&(first, _)), Some(&(last, _))) = (stage.counts.first(), stage.counts.last())
            else {
                waterfall.steps.push(WaterfallStep {
                    stage_name: stage.name,
                    input_count: previous_output,
                    output_count: None,
                    dropped: None,
                    samples: 0,
                });
                previous_output = None;
                continue;
            };

            let input = previous_output.unwrap_or(first);
            let output = last;

            let rose_within = stage.counts.windows(2).any(|w| w[1].0 > w[0].0);
            if rose_within || output > input {
                tracing::debug!(
                    stage = %stage.name,
                    input,
                    output,
                    "Image count increased within waterfall stage"
                );
                waterfall.findings.push(Finding::new(
                    MONOTONICITY_FINDING_SOURCE,
                    Severity::Warning,
                    format!(
                        "Image count increased during {} ({} in, {} out); counts are shown as logged",
                        stage.name.display_name(),
                        input,
                        output
                    ),
                    stage.counts.iter().map(|&(_, line)| line).collect(),
                ));
            }

            waterfall.steps.push(WaterfallStep {
                stage_name: stage.name,
                input_count: Some(input),
                output_count: Some(output),
                dropped: dropped_between(input, output),
                samples: stage.counts.len(),
            });
            previous_output = Some(output);
        }

        waterfall
    }
}
