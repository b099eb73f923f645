//! FWHM Variation Detector
//!
//! Star FWHM (full width at half maximum, in pixels) tracks seeing and focus.
//! A wide spread across the frames of one run usually means focus drifted,
//! clouds passed, or the target sank into worse air.
//!
//! Fires when at least `min_samples` values were logged and
//! `(max - min) / median > spread_ratio`.

use crate::analysis::detectors::{DetectionContext, Detector};
use crate::config::DetectorConfig;
use crate::types::{Finding, LogEvent, Measurement, SampleStats, Severity};

pub struct FwhmVariationDetector {
    min_samples: usize,
    spread_ratio: f64,
}

impl FwhmVariationDetector {
    pub fn new(min_samples: usize, spread_ratio: f64) -> Self {
        Self {
            min_samples,
            spread_ratio,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.fwhm_min_samples, config.fwhm_spread_ratio)
    }
}

impl Detector for FwhmVariationDetector {
    fn name(&self) -> &'static str {
        "core.fwhm_variation"
    }

    fn description(&self) -> &'static str {
        "Wide FWHM spread across frames (focus or seeing changes)"
    }

    fn detect(&self, events: &[LogEvent], _ctx: &DetectionContext) -> Vec<Finding> {
        let samples: Vec<(f64, u64)> = events
            .iter()
            .filter_map(|e| match e.measurement {
                Some(Measurement::Fwhm { value }) if value.is_finite() => {
                    Some((value, e.source_line))
                }
                _ => None,
            })
            .collect();

        if samples.len() < self.min_samples.max(1) {
            return vec![];
        }

        let values: Vec<f64> = samples.iter().map(|(v, _)| *v).collect();
        let Some(stats) = SampleStats::from_values(&values) else {
            return vec![];
        };
        if stats.median <= 0.0 || stats.spread() / stats.median <= self.spread_ratio {
            return vec![];
        }

        // Evidence: where the sharpest and the softest frames were logged.
        let line_of = |target: f64| {
            samples
                .iter()
                .find(|(v, _)| *v == target)
                .map(|(_, line)| *line)
        };
        let mut evidence: Vec<u64> = [line_of(stats.min), line_of(stats.max)]
            .into_iter()
            .flatten()
            .collect();
        evidence.sort_unstable();
        evidence.dedup();

        vec![Finding::new(
            self.name(),
            Severity::Warning,
            format!(
                "FWHM varies from {:.2} to {:.2} px across {} frames (median {:.2}); check focus and seeing",
                stats.min, stats.max, stats.count, stats.median
            ),
            evidence,
        )]
    }
}
