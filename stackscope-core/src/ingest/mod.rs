//! Ingestion layer: from log text to events
//!
//! ```text
//! ┌─────────────┐     ┌────────────────┐     ┌─────────────────┐
//! │  Log file   │ ──► │   LogReader    │ ──► │ EventExtractor  │ ──► LogEvent*
//! │ (read-only) │     │ LogLine + time │     │  RuleRegistry   │
//! └─────────────┘     └────────────────┘     └─────────────────┘
//!                                                   │
//!                                                   ▼
//!                                        ┌──────────────────────┐
//!                                        │ PatternRule          │
//!                                        │  ├─ generic.*        │
//!                                        │  └─ siril.*          │
//!                                        └──────────────────────┘
//! ```
//!
//! Both stages are lazy iterators; nothing is buffered beyond the line being
//! processed and the handful of events it produces.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stackscope_core::ingest::{default_registry, EventExtractor, LogReader};
//! use std::path::Path;
//!
//! let registry = default_registry();
//! let mut reader = LogReader::open(Path::new("siril.log"));
//! let events: Vec<_> = EventExtractor::new(&registry)
//!     .extract(reader.by_ref())
//!     .collect();
//! println!("{} events, {} issues", events.len(), reader.issues().len());
//! ```

pub mod extractor;
pub mod reader;
pub mod rules;
pub mod timestamp;

pub use extractor::{classify_subsystem, EventExtractor, Events};
pub use reader::{LogReader, ReadIssue, READER_FINDING_SOURCE};
pub use rules::{default_registry, Marker, PatternRule, RuleRegistry, RULESET_VERSION};
