//! Repeated Failure Detector
//!
//! Groups ERROR events by subsystem and looks for clusters: runs of errors
//! where each error is at most `window_lines` lines after the previous one.
//!
//! | Cluster size | Severity |
//! |--------------|----------|
//! | `>= min_count` (default 3) | Warning |
//! | `>= critical_count` (default 5) | Critical |
//!
//! Errors without a subsystem are grouped under "general".
//!
//! ## Example
//!
//! Five `ERROR: plate solve failed` lines at 10, 14, 18, 25 and 30 form one
//! cluster of five and produce a Critical finding naming "plate solve".

use crate::analysis::detectors::{DetectionContext, Detector};
use crate::config::DetectorConfig;
use crate::types::{EventKind, Finding, LogEvent, Severity};
use std::collections::BTreeMap;

/// Subsystem label for errors nothing could attribute.
const GENERAL_SUBSYSTEM: &str = "general";

pub struct RepeatedFailureDetector {
    min_count: usize,
    critical_count: usize,
    window_lines: u64,
}

impl RepeatedFailureDetector {
    pub fn new(min_count: usize, critical_count: usize, window_lines: u64) -> Self {
        Self {
            min_count,
            critical_count,
            window_lines,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(
            config.failure_min_count,
            config.failure_critical_count,
            config.failure_window_lines,
        )
    }

    /// Split ascending line numbers into clusters.
    fn clusters(&self, lines: &[u64]) -> Vec<Vec<u64>> {
        let mut clusters: Vec<Vec<u64>> = Vec::new();
        for &line in lines {
            let joins = clusters
                .last()
                .and_then(|cluster| cluster.last())
                .is_some_and(|&prev| line.saturating_sub(prev) <= self.window_lines);
            match clusters.last_mut() {
                Some(cluster) if joins => cluster.push(line),
                _ => clusters.push(vec![line]),
            }
        }
        clusters
    }
}

impl Detector for RepeatedFailureDetector {
    fn name(&self) -> &'static str {
        "core.repeated_failure"
    }

    fn description(&self) -> &'static str {
        "Clusters of errors from the same subsystem"
    }

    fn detect(&self, events: &[LogEvent], _ctx: &DetectionContext) -> Vec<Finding> {
        let mut by_subsystem: BTreeMap<&str, Vec<u64>> = BTreeMap::new();
        for event in events.iter().filter(|e| e.kind == EventKind::Error) {
            let subsystem = event.subsystem.as_deref().unwrap_or(GENERAL_SUBSYSTEM);
            by_subsystem
                .entry(subsystem)
                .or_default()
                .push(event.source_line);
        }

        let mut findings = Vec::new();
        for (subsystem, lines) in by_subsystem {
            for cluster in self.clusters(&lines) {
                if cluster.len() < self.min_count {
                    continue;
                }
                let severity = if cluster.len() >= self.critical_count {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                let (first, last) = (cluster[0], cluster[cluster.len() - 1]);
                findings.push(Finding::new(
                    self.name(),
                    severity,
                    format!(
                        "Repeated {} failures: {} errors between lines {} and {}",
                        subsystem,
                        cluster.len(),
                        first,
                        last
                    ),
                    cluster,
                ));
            }
        }
        findings
    }
}
