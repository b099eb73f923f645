//! Session Structure Detector
//!
//! Two informational observations about how the run was shot:
//!
//! - **Mosaic**: frame rotation drifting by more than `mosaic_rotation_degrees`
//!   means the frames do not share one field orientation (mosaic panels, or a
//!   meridian flip).
//! - **Multiple sessions**: the phase sequence starting over (a phase starts
//!   again after other phases ran) means several runs were appended to one log.
//!   A phase restarting right after itself is a retry, not a new session.

use crate::analysis::detectors::{DetectionContext, Detector};
use crate::config::DetectorConfig;
use crate::types::{EventKind, Finding, LogEvent, Measurement, PhaseName, Severity};
use std::collections::HashSet;

pub struct SessionStructureDetector {
    mosaic_rotation_degrees: f64,
}

impl SessionStructureDetector {
    pub fn new(mosaic_rotation_degrees: f64) -> Self {
        Self {
            mosaic_rotation_degrees,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.mosaic_rotation_degrees)
    }

    fn rotation_finding(&self, events: &[LogEvent]) -> Option<Finding> {
        let samples: Vec<(f64, u64)> = events
            .iter()
            .filter_map(|e| match e.measurement {
                Some(Measurement::Rotation { degrees }) if degrees.is_finite() => {
                    Some((degrees, e.source_line))
                }
                _ => None,
            })
            .collect();

        let (min, min_line) = samples
            .iter()
            .copied()
            .min_by(|a, b| a.0.total_cmp(&b.0))?;
        let (max, max_line) = samples
            .iter()
            .copied()
            .max_by(|a, b| a.0.total_cmp(&b.0))?;

        let drift = max - min;
        if drift <= self.mosaic_rotation_degrees {
            return None;
        }

        let mut evidence = vec![min_line, max_line];
        evidence.sort_unstable();
        evidence.dedup();

        Some(Finding::new(
            self.name(),
            Severity::Info,
            format!(
                "Frame rotation spans {:.1} degrees ({:.1} to {:.1}); this looks like a mosaic or a meridian flip",
                drift, min, max
            ),
            evidence,
        ))
    }

    fn session_finding(&self, events: &[LogEvent]) -> Option<Finding> {
        let mut seen: HashSet<PhaseName> = HashSet::new();
        let mut previous: Option<PhaseName> = None;
        let mut session_starts: Vec<u64> = Vec::new();

        let starts = events.iter().filter(|e| e.kind == EventKind::PhaseStart);
        for event in starts {
            let Some(name) = event.phase_name else {
                continue;
            };
            if matches!(name, PhaseName::Unknown | PhaseName::Unscoped) {
                continue;
            }
            if seen.contains(&name) && previous != Some(name) {
                session_starts.push(event.source_line);
                seen.clear();
            }
            seen.insert(name);
            previous = Some(name);
        }

        if session_starts.is_empty() {
            return None;
        }

        let sessions = session_starts.len() + 1;
        Some(Finding::new(
            self.name(),
            Severity::Info,
            format!(
                "Log contains {} processing sessions; the phase sequence restarts at line {}",
                sessions,
                session_starts
                    .iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            session_starts,
        ))
    }
}

impl Detector for SessionStructureDetector {
    fn name(&self) -> &'static str {
        "core.session_structure"
    }

    fn description(&self) -> &'static str {
        "Mosaic rotation drift and multiple sessions in one log"
    }

    fn detect(&self, events: &[LogEvent], _ctx: &DetectionContext) -> Vec<Finding> {
        self.rotation_finding(events)
            .into_iter()
            .chain(self.session_finding(events))
            .collect()
    }
}
