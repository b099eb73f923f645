//! Timing Gap Detector
//!
//! Reports silences longer than `gap_secs` (default 15 minutes) between
//! consecutive timestamped log lines: a stalled step, a machine that went to
//! sleep, or two runs concatenated into one log.
//!
//! Every timestamped line counts as activity, whether or not a rule matched
//! it, so the detector reads [`DetectionContext::line_stamps`] rather than the
//! events. Backwards jumps (log rotation) are ignored.

use crate::analysis::detectors::{DetectionContext, Detector};
use crate::config::DetectorConfig;
use crate::format::format_duration;
use crate::types::{Finding, LogEvent, Severity};

pub struct TimingGapDetector {
    gap_secs: i64,
}

impl TimingGapDetector {
    pub fn new(gap_secs: i64) -> Self {
        Self { gap_secs }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.gap_secs)
    }
}

impl Detector for TimingGapDetector {
    fn name(&self) -> &'static str {
        "core.timing_gap"
    }

    fn description(&self) -> &'static str {
        "Long silences between timestamped log lines"
    }

    fn detect(&self, _events: &[LogEvent], ctx: &DetectionContext) -> Vec<Finding> {
        ctx.line_stamps
            .windows(2)
            .filter_map(|pair| {
                let (before, after) = (pair[0], pair[1]);
                let gap = (after.timestamp - before.timestamp).num_seconds();
                (gap > self.gap_secs).then(|| {
                    Finding::new(
                        self.name(),
                        Severity::Info,
                        format!(
                            "No log activity for {} between lines {} and {}",
                            format_duration(gap),
                            before.line,
                            after.line
                        ),
                        vec![before.line, after.line],
                    )
                })
            })
            .collect()
    }
}
