//! # stackscope-core
//!
//! Core library for stackscope, a post-run analyzer for astrophotography
//! preprocessing logs (Siril and wrapper scripts around it).
//!
//! This library provides:
//! - Domain types for lines, events, phases, waterfall steps and findings
//! - A lazy log reader and a pluggable pattern-rule extractor
//! - Phase aggregation, the image-count waterfall, quality metrics and
//!   pattern detectors
//! - Text/JSON report rendering and atomic report output
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way through three stages:
//! - **Ingest:** [`ingest::LogReader`] → [`ingest::EventExtractor`] (pattern rules)
//! - **Analysis:** phases, waterfall, metrics and detectors over the same events
//! - **Report:** an immutable [`Report`], rendered by [`report`]
//!
//! The log is only ever read. Reading problems become findings, so an
//! analysis always produces a report.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stackscope_core::{report, Analyzer, Config};
//! use std::path::Path;
//!
//! let config = Config::load().expect("failed to load config");
//! let analyzer = Analyzer::new(&config);
//!
//! let result = analyzer.analyze_path(Path::new("siril.log"));
//! print!("{}", report::render_report(&result, &config.report));
//! ```

// Re-export commonly used items at the crate root
pub use analyzer::Analyzer;
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analysis;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod report;
pub mod types;
