//! Format-neutral rules
//!
//! These match the explicit markers a wrapper script can print around the
//! pipeline (`START registration`, `95 images registered`, `ERROR: ...`).

use super::{Marker, PatternRule};
use crate::types::{LogLine, PhaseName};
use regex::Regex;

/// `START <phase>` / `BEGIN <phase>` and `END <phase>` / `FINISH <phase>`.
///
/// Keywords must be uppercase so ordinary prose ("End of file") is not
/// mistaken for a boundary.
pub struct PhaseBoundaryRule {
    pattern: Regex,
}

impl PhaseBoundaryRule {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"^=*\s*(START|BEGIN|END|FINISH)\b[:\s]+([^=]+?)\s*=*\s*$")
                .expect("phase boundary pattern is valid"),
        }
    }
}

impl Default for PhaseBoundaryRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRule for PhaseBoundaryRule {
    fn name(&self) -> &'static str {
        "generic.phase_boundary"
    }

    fn description(&self) -> &'static str {
        "START|BEGIN <phase> and END|FINISH <phase>"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let Some(caps) = self.pattern.captures(line.body()) else {
            return vec![];
        };
        let phase = PhaseName::from_label(&caps[2]);
        match &caps[1] {
            "START" | "BEGIN" => vec![Marker::PhaseStart(phase)],
            _ => vec![Marker::PhaseEnd(phase)],
        }
    }
}

/// `N images found`, `N frames registered`, `N files kept`, ...
///
/// The count carries no stage; the extractor attaches it to the open phase.
pub struct ImageCountRule {
    pattern: Regex,
}

impl ImageCountRule {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(
                r"(?i)\b(\d+)\s+(?:images?|files?|frames?)\s+(?:found|loaded|registered|converted|selected|kept|accepted|remaining|processed)\b",
            )
            .expect("image count pattern is valid"),
        }
    }
}

impl Default for ImageCountRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRule for ImageCountRule {
    fn name(&self) -> &'static str {
        "generic.image_count"
    }

    fn description(&self) -> &'static str {
        "N images|files|frames found|loaded|registered|converted|selected|kept|accepted|remaining|processed"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        self.pattern
            .captures(line.body())
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .map(|count| vec![Marker::ImageCount { count, stage: None }])
            .unwrap_or_default()
    }
}

/// `ERROR:` / `[ERROR]` / `fatal:` and `WARNING:` / `[WARN]` lines.
pub struct SeverityRule {
    error: Regex,
    warning: Regex,
}

impl SeverityRule {
    pub fn new() -> Self {
        Self {
            error: Regex::new(
                r"(?i)^(?:\[(?:error|fatal|critical)\]|(?:error|fatal|critical)\s*:)|\berror\s*:",
            )
            .expect("error pattern is valid"),
            warning: Regex::new(r"(?i)^(?:\[(?:warn|warning)\]|(?:warn|warning)\s*:)|\bwarning\s*:")
                .expect("warning pattern is valid"),
        }
    }
}

impl Default for SeverityRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRule for SeverityRule {
    fn name(&self) -> &'static str {
        "generic.severity"
    }

    fn description(&self) -> &'static str {
        "ERROR:/[ERROR]/fatal: lines and WARNING:/[WARN] lines"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let body = line.body();
        if self.error.is_match(body) {
            vec![Marker::Error { subsystem: None }]
        } else if self.warning.is_match(body) {
            vec![Marker::Warning]
        } else {
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::rules::test_line;

    #[test]
    fn test_phase_boundaries() {
        let rule = PhaseBoundaryRule::new();
        assert_eq!(
            rule.apply(&test_line("[10:00:00] START conversion")),
            vec![Marker::PhaseStart(PhaseName::Conversion)]
        );
        assert_eq!(
            rule.apply(&test_line("[10:05:00] END conversion")),
            vec![Marker::PhaseEnd(PhaseName::Conversion)]
        );
        assert_eq!(
            rule.apply(&test_line("=== BEGIN: Plate Solving ===")),
            vec![Marker::PhaseStart(PhaseName::PlateSolving)]
        );
        assert_eq!(
            rule.apply(&test_line("START tea break")),
            vec![Marker::PhaseStart(PhaseName::Unknown)]
        );
    }

    #[test]
    fn test_lowercase_prose_is_not_a_boundary() {
        let rule = PhaseBoundaryRule::new();
        assert!(rule.apply(&test_line("End of file reached")).is_empty());
        assert!(rule.apply(&test_line("Starting stacking")).is_empty());
        assert!(rule.apply(&test_line("STARTED")).is_empty());
    }

    #[test]
    fn test_image_counts() {
        let rule = ImageCountRule::new();
        assert_eq!(
            rule.apply(&test_line("120 images found")),
            vec![Marker::ImageCount {
                count: 120,
                stage: None
            }]
        );
        assert_eq!(
            rule.apply(&test_line("[10:06:00] 95 images registered")),
            vec![Marker::ImageCount {
                count: 95,
                stage: None
            }]
        );
        assert!(rule.apply(&test_line("95 images have been stacked")).is_empty());
        assert!(rule.apply(&test_line("Converted 118 files for processing")).is_empty());
    }

    #[test]
    fn test_severity() {
        let rule = SeverityRule::new();
        assert_eq!(
            rule.apply(&test_line("ERROR: plate solve failed")),
            vec![Marker::Error { subsystem: None }]
        );
        assert_eq!(
            rule.apply(&test_line("[11:00:00] [ERROR] out of memory")),
            vec![Marker::Error { subsystem: None }]
        );
        assert_eq!(
            rule.apply(&test_line("22:10:00: Stacking error: not enough images")),
            vec![Marker::Error { subsystem: None }]
        );
        assert_eq!(
            rule.apply(&test_line("Warning: low disk space")),
            vec![Marker::Warning]
        );
        assert!(rule.apply(&test_line("No errors so far")).is_empty());
    }
}
