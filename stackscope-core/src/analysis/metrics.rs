//! Quality metrics gathered from measurement events.

use crate::types::{ChannelRejection, LogEvent, Measurement, QualityMetrics, SampleStats};
use std::collections::BTreeMap;

/// Compute [`QualityMetrics`] from the event sequence.
///
/// The plate-solve summary line, when present, replaces the per-frame tally.
/// Pixel rejection keeps the last value logged for each channel.
pub fn compute_metrics(events: &[LogEvent]) -> QualityMetrics {
    let mut solved = 0u64;
    let mut failed = 0u64;
    let mut summary: Option<(u64, u64)> = None;
    let mut fwhm = Vec::new();
    let mut rotation = Vec::new();
    let mut rejection: BTreeMap<u32, ChannelRejection> = BTreeMap::new();
    let mut processors = None;

    for measurement in events.iter().filter_map(|e| e.measurement) {
        match measurement {
            Measurement::Fwhm { value } => fwhm.push(value),
            Measurement::Rotation { degrees } => rotation.push(degrees),
            Measurement::PixelRejection { channel, low, high } => {
                rejection.insert(channel, ChannelRejection { channel, low, high });
            }
            Measurement::Processors { count } => processors = Some(count),
            Measurement::PlateSolve { solved: true } => solved += 1,
            Measurement::PlateSolve { solved: false } => failed += 1,
            Measurement::PlateSolveSummary { solved, total } => summary = Some((solved, total)),
        }
    }

    if let Some((summary_solved, total)) = summary {
        solved = summary_solved.min(total);
        failed = total - solved;
    }

    QualityMetrics {
        plate_solve_successes: solved,
        plate_solve_failures: failed,
        fwhm: SampleStats::from_values(&fwhm),
        rotation: SampleStats::from_values(&rotation),
        pixel_rejection: rejection.into_values().collect(),
        processors_used: processors,
    }
}
