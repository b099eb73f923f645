//! Plate Solve Detector
//!
//! Reports frames that failed astrometric solving. Unsolved frames have no WCS
//! and are usually dropped before registration, so they feed straight into
//! image loss.
//!
//! | Success rate | Severity |
//! |--------------|----------|
//! | below `plate_solve_warn_percent` (default 85%) | Warning |
//! | otherwise, with any failure | Info |

use crate::analysis::detectors::{DetectionContext, Detector};
use crate::analysis::metrics::compute_metrics;
use crate::config::DetectorConfig;
use crate::types::{Finding, LogEvent, Measurement, Severity};

pub struct PlateSolveDetector {
    warn_percent: f64,
}

impl PlateSolveDetector {
    pub fn new(warn_percent: f64) -> Self {
        Self { warn_percent }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.plate_solve_warn_percent)
    }
}

impl Detector for PlateSolveDetector {
    fn name(&self) -> &'static str {
        "core.plate_solve"
    }

    fn description(&self) -> &'static str {
        "Frames that failed to plate solve"
    }

    fn detect(&self, events: &[LogEvent], _ctx: &DetectionContext) -> Vec<Finding> {
        let metrics = compute_metrics(events);
        let failed = metrics.plate_solve_failures;
        let Some(success) = metrics.plate_solve_success_percent() else {
            return vec![];
        };
        if failed == 0 {
            return vec![];
        }

        let total = metrics.plate_solve_successes + failed;
        let severity = if success < self.warn_percent {
            Severity::Warning
        } else {
            Severity::Info
        };

        let evidence: Vec<u64> = events
            .iter()
            .filter(|e| {
                matches!(
                    e.measurement,
                    Some(Measurement::PlateSolve { solved: false })
                        | Some(Measurement::PlateSolveSummary { .. })
                )
            })
            .map(|e| e.source_line)
            .collect();

        vec![Finding::new(
            self.name(),
            severity,
            format!(
                "{} of {} frames failed to plate solve ({:.1}% success)",
                failed, total, success
            ),
            evidence,
        )]
    }
}
