//! Pattern detectors
//!
//! Detectors consume the extracted event sequence and produce advisory
//! [`Finding`]s. Each detector lives in its own subdirectory.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     DETECTOR ENGINE                      │
//! │                                                          │
//! │  ┌────────────────┐ ┌───────────────┐ ┌──────────────┐   │
//! │  │repeated_failure│ │fwhm_variation │ │ plate_solve  │...│
//! │  └───────┬────────┘ └───────┬───────┘ └──────┬───────┘   │
//! │          ▼                  ▼                ▼           │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ DetectorEngine::run_all(events, ctx) -> findings   │  │
//! │  │  - skips disabled detectors                        │  │
//! │  │  - logs per-detector timing                        │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Built-in Detectors
//!
//! | Detector | Finding |
//! |----------|---------|
//! | [`repeated_failure`] | clusters of errors from one subsystem |
//! | [`fwhm_variation`] | star sharpness varying widely across frames |
//! | [`session_structure`] | mosaic rotation drift, several sessions in one log |
//! | [`plate_solve`] | frames that failed to plate solve |
//! | [`timing_gap`] | long silences between timestamped events |
//!
//! Use [`create_default_engine`] to get an engine with all of them.

pub mod fwhm_variation;
pub mod plate_solve;
pub mod repeated_failure;
pub mod session_structure;
pub mod timing_gap;

use crate::config::DetectorConfig;
use crate::types::{Finding, LogEvent};
use chrono::NaiveDateTime;
use std::time::Instant;

/// A source line that carried a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStamp {
    pub line: u64,
    pub timestamp: NaiveDateTime,
}

/// Facts about the log that are not events.
///
/// Lines no rule matched produce no event but still show the pipeline was
/// alive; their timestamps are kept here, in source order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub line_stamps: &'a [LineStamp],
}

/// Trait that all pattern detectors implement.
///
/// Detectors are stateless and infallible:
/// - **Deterministic**: the same events always give the same findings
/// - **Independent**: no detector sees another detector's output
/// - **Quiet on absence**: no data means no finding
///
/// ## Example
///
/// ```rust,ignore
/// use stackscope_core::analysis::Detector;
///
/// pub struct NoStackDetector;
///
/// impl Detector for NoStackDetector {
///     fn name(&self) -> &'static str { "custom.no_stack" }
///     fn description(&self) -> &'static str { "Logs that never reach stacking" }
///     fn detect(&self, events: &[LogEvent], _ctx: &DetectionContext) -> Vec<Finding> {
///         // Inspect events...
///         vec![]
///     }
/// }
/// ```
pub trait Detector: Send + Sync {
    /// Unique detector name.
    ///
    /// Convention: `namespace.detector_name` (e.g., "core.plate_solve")
    fn name(&self) -> &'static str;

    /// One-line description, for `stackscope rules`
    fn description(&self) -> &'static str;

    /// Inspect the full event sequence.
    fn detect(&self, events: &[LogEvent], ctx: &DetectionContext) -> Vec<Finding>;
}

/// Engine that holds and runs detectors.
pub struct DetectorEngine {
    detectors: Vec<Box<dyn Detector>>,
    disabled: Vec<String>,
}

impl DetectorEngine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
            disabled: Vec::new(),
        }
    }

    /// Register a detector with the engine.
    pub fn register(&mut self, detector: Box<dyn Detector>) {
        tracing::debug!(detector = detector.name(), "Registered detector");
        self.detectors.push(detector);
    }

    /// Skip the named detectors in [`DetectorEngine::run_all`].
    pub fn set_disabled(&mut self, names: Vec<String>) {
        for name in &names {
            if !self.has_detector(name) {
                tracing::warn!(detector = %name, "Disabled detector is not registered");
            }
        }
        self.disabled = names;
    }

    /// Get list of registered detector names.
    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Registered detectors, for listing.
    pub fn detectors(&self) -> impl Iterator<Item = &dyn Detector> {
        self.detectors.iter().map(|d| d.as_ref())
    }

    /// Check if a detector is registered.
    pub fn has_detector(&self, name: &str) -> bool {
        self.detectors.iter().any(|d| d.name() == name)
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d == name)
    }

    /// Run every enabled detector and collect their findings in
    /// registration order.
    pub fn run_all(&self, events: &[LogEvent], ctx: &DetectionContext) -> Vec<Finding> {
        let mut findings = Vec::new();

        for detector in &self.detectors {
            if self.is_disabled(detector.name()) {
                tracing::debug!(detector = detector.name(), "Skipping disabled detector");
                continue;
            }

            let start = Instant::now();
            let produced = detector.detect(events, ctx);
            tracing::debug!(
                detector = detector.name(),
                events = events.len(),
                findings = produced.len(),
                duration_us = start.elapsed().as_micros() as u64,
                "Detector completed"
            );
            findings.extend(produced);
        }

        findings
    }
}

impl Default for DetectorEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Create an engine with all built-in detectors registered.
///
/// ```rust,ignore
/// use stackscope_core::analysis::create_default_engine;
/// use stackscope_core::config::DetectorConfig;
///
/// let engine = create_default_engine(&DetectorConfig::default());
/// println!("Registered detectors: {:?}", engine.detector_names());
/// ```
pub fn create_default_engine(config: &DetectorConfig) -> DetectorEngine {
    let mut engine = DetectorEngine::new();
    engine.register(Box::new(repeated_failure::RepeatedFailureDetector::from_config(config)));
    engine.register(Box::new(fwhm_variation::FwhmVariationDetector::from_config(config)));
    engine.register(Box::new(session_structure::SessionStructureDetector::from_config(config)));
    engine.register(Box::new(plate_solve::PlateSolveDetector::from_config(config)));
    engine.register(Box::new(timing_gap::TimingGapDetector::from_config(config)));
    engine.set_disabled(config.disabled.clone());
    engine
}
