//! Pattern rules
//!
//! The pipeline log is loosely structured free text, so extraction is driven
//! by a registry of independent rules rather than a grammar. Each rule looks at
//! one line and reports zero or more [`Marker`]s; the
//! [`EventExtractor`](super::EventExtractor) turns markers into events.
//!
//! ## Design Principles
//!
//! 1. **Independent**: a rule never depends on another rule having matched
//! 2. **Order-insensitive**: registry order does not change the extracted events
//! 3. **Degrading**: an unmatched line yields no markers, never an error
//! 4. **Versioned**: [`RULESET_VERSION`] changes whenever the documented patterns change
//!
//! ## Built-in Rules
//!
//! | Rule | Module | Recognizes |
//! |------|--------|------------|
//! | `generic.phase_boundary` | [`generic`] | `START <phase>` / `END <phase>` |
//! | `generic.image_count` | [`generic`] | `N images found`, `N frames registered`, ... |
//! | `generic.severity` | [`generic`] | `ERROR:` / `WARNING:` prefixes |
//! | `siril.conversion` | [`siril`] | `Convert: processing N files`, `Converted N files for processing` |
//! | `siril.plate_solve` | [`siril`] | per-frame solve results and the solve summary |
//! | `siril.background` | [`siril`] | `seqsubsky`, `Background extracted` |
//! | `siril.registration` | [`siril`] | `seqapplyreg`, `Registered sequence` |
//! | `siril.stacking` | [`siril`] | stacking start, stacked count, stacking end |
//! | `siril.quality` | [`siril`] | FWHM, rotation, processors, pixel rejection |

pub mod generic;
pub mod siril;

use crate::types::{LogLine, Measurement, PhaseName};

/// Version of the documented extraction patterns.
///
/// Increment when a rule is added, removed, or its pattern changes.
pub const RULESET_VERSION: u32 = 1;

/// What a rule recognized on a line.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// Explicit start of a phase
    PhaseStart(PhaseName),
    /// Explicit end of a phase
    PhaseEnd(PhaseName),
    /// Line belongs to a phase that has no explicit start marker
    PhaseActivity(PhaseName),
    /// Image count, optionally naming the stage it belongs to
    ImageCount { count: u64, stage: Option<PhaseName> },
    /// Error line, optionally naming the failing subsystem
    Error { subsystem: Option<String> },
    Warning,
    /// Quality measurement
    Measure(Measurement),
}

impl Marker {
    /// Position within a line: openings first, then content, then closings.
    fn line_order(&self) -> u8 {
        match self {
            Marker::PhaseStart(_) | Marker::PhaseActivity(_) => 0,
            Marker::PhaseEnd(_) => 2,
            _ => 1,
        }
    }
}

/// Trait implemented by all pattern rules.
///
/// ## Example
///
/// ```rust,ignore
/// use stackscope_core::ingest::rules::{Marker, PatternRule};
///
/// struct DrizzleRule;
///
/// impl PatternRule for DrizzleRule {
///     fn name(&self) -> &'static str { "custom.drizzle" }
///     fn description(&self) -> &'static str { "Drizzle integration lines" }
///     fn apply(&self, line: &LogLine) -> Vec<Marker> {
///         if line.body().contains("drizzle") { vec![Marker::Warning] } else { vec![] }
///     }
/// }
/// ```
pub trait PatternRule: Send + Sync {
    /// Unique rule name.
    ///
    /// Convention: `family.rule_name` (e.g., "siril.stacking")
    fn name(&self) -> &'static str;

    /// One-line description of the recognized text, for `stackscope rules`
    fn description(&self) -> &'static str;

    /// Markers recognized on this line, in the order they apply.
    fn apply(&self, line: &LogLine) -> Vec<Marker>;
}

/// Fixed, ordered collection of rules.
pub struct RuleRegistry {
    rules: Vec<Box<dyn PatternRule>>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register a rule.
    pub fn register(&mut self, rule: Box<dyn PatternRule>) {
        tracing::debug!(rule = rule.name(), "Registered pattern rule");
        self.rules.push(rule);
    }

    /// Names of registered rules, in registration order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Registered rules, for listing.
    pub fn rules(&self) -> impl Iterator<Item = &dyn PatternRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Apply every rule to a line.
    ///
    /// Markers are ordered so that phases open before the line's counts and
    /// measurements are attached, and close after them.
    pub fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let mut markers: Vec<Marker> = self
            .rules
            .iter()
            .flat_map(|rule| rule.apply(line))
            .collect();
        markers.sort_by_key(Marker::line_order);
        markers
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        default_registry()
    }
}

/// Create a registry with all built-in rules.
pub fn default_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    registry.register(Box::new(generic::PhaseBoundaryRule::new()));
    registry.register(Box::new(generic::ImageCountRule::new()));
    registry.register(Box::new(generic::SeverityRule::new()));
    registry.register(Box::new(siril::ConversionRule::new()));
    registry.register(Box::new(siril::PlateSolveRule::new()));
    registry.register(Box::new(siril::BackgroundRule));
    registry.register(Box::new(siril::RegistrationRule));
    registry.register(Box::new(siril::StackingRule::new()));
    registry.register(Box::new(siril::QualityRule::new()));
    registry
}

/// Build a line for rule tests.
#[cfg(test)]
pub(crate) fn test_line(text: &str) -> LogLine {
    let mut clock = crate::ingest::timestamp::LogClock::new();
    let (timestamp, body_start) = clock.parse(text);
    LogLine {
        line_number: 1,
        raw_text: text.to_string(),
        timestamp,
        body_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_rules() {
        let registry = default_registry();
        let names = registry.rule_names();

        assert_eq!(names.len(), 9);
        assert!(names.contains(&"generic.phase_boundary"));
        assert!(names.contains(&"siril.plate_solve"));
    }

    #[test]
    fn test_rule_names_are_unique() {
        let registry = default_registry();
        let mut names = registry.rule_names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn test_unmatched_line_yields_nothing() {
        let registry = default_registry();
        assert!(registry
            .apply(&test_line("Reading sequence failed to look interesting"))
            .is_empty());
        assert!(registry.apply(&test_line("")).is_empty());
    }

    #[test]
    fn test_registry_order_does_not_change_markers() {
        let forward = default_registry();
        let mut reversed = RuleRegistry::new();
        reversed.register(Box::new(siril::QualityRule::new()));
        reversed.register(Box::new(siril::StackingRule::new()));
        reversed.register(Box::new(siril::RegistrationRule));
        reversed.register(Box::new(siril::BackgroundRule));
        reversed.register(Box::new(siril::PlateSolveRule::new()));
        reversed.register(Box::new(siril::ConversionRule::new()));
        reversed.register(Box::new(generic::SeverityRule::new()));
        reversed.register(Box::new(generic::ImageCountRule::new()));
        reversed.register(Box::new(generic::PhaseBoundaryRule::new()));

        // No line of this kind is matched by more than one rule, so the
        // marker sets agree regardless of order.
        for text in [
            "[10:00:00] START conversion",
            "120 images found",
            "22:04:11: Convert: processing 120 files...",
            "ERROR: plate solve failed for image 7",
        ] {
            let mut a = forward.apply(&test_line(text));
            let mut b = reversed.apply(&test_line(text));
            a.sort_by_key(|m| format!("{m:?}"));
            b.sort_by_key(|m| format!("{m:?}"));
            assert_eq!(a, b, "markers differ for {text:?}");
        }
    }
}
