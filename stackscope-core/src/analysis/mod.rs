//! Analysis of extracted events
//!
//! Everything here consumes the same `&[LogEvent]` and runs independently:
//!
//! - [`phases`]: phase boundaries into timed [`Phase`](crate::types::Phase) records
//! - [`waterfall`]: image counts into the survival funnel
//! - [`metrics`]: quality measurements into [`QualityMetrics`](crate::types::QualityMetrics)
//! - [`detectors`]: pattern detectors producing findings
//!
//! The [`Analyzer`](crate::Analyzer) wires them together.

pub mod detectors;
pub mod metrics;
pub mod phases;
pub mod waterfall;

pub use detectors::{create_default_engine, DetectionContext, Detector, DetectorEngine, LineStamp};
pub use metrics::compute_metrics;
pub use phases::PhaseAggregator;
pub use waterfall::{Waterfall, WaterfallBuilder, MONOTONICITY_FINDING_SOURCE};
