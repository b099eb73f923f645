//! Rules for Siril console output
//!
//! Siril prints no explicit phase markers for plate solving, background
//! extraction or registration; those rules report [`Marker::PhaseActivity`]
//! and the extractor derives the phase boundaries from the first and last
//! matching line.

use super::{Marker, PatternRule};
use crate::types::{LogLine, Measurement, PhaseName};
use regex::Regex;

/// Subsystem name attached to plate-solve failures.
pub const PLATE_SOLVE_SUBSYSTEM: &str = "plate solve";

/// `Convert: processing N files` and `Converted N files for processing`.
pub struct ConversionRule {
    start: Regex,
    end: Regex,
}

impl ConversionRule {
    pub fn new() -> Self {
        Self {
            start: Regex::new(r"Convert: processing (\d+) files?")
                .expect("conversion start pattern is valid"),
            end: Regex::new(r"Converted (\d+)\b.*\bfiles? for processing")
                .expect("conversion end pattern is valid"),
        }
    }
}

impl Default for ConversionRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRule for ConversionRule {
    fn name(&self) -> &'static str {
        "siril.conversion"
    }

    fn description(&self) -> &'static str {
        "Convert: processing N files / Converted N files for processing"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let body = line.body();
        let stage = Some(PhaseName::Conversion);

        if let Some(count) = capture::<u64>(&self.start, body) {
            return vec![
                Marker::PhaseStart(PhaseName::Conversion),
                Marker::ImageCount { count, stage },
            ];
        }
        if let Some(count) = capture::<u64>(&self.end, body) {
            return vec![
                Marker::ImageCount { count, stage },
                Marker::PhaseEnd(PhaseName::Conversion),
            ];
        }
        vec![]
    }
}

/// Per-frame plate-solve results and the closing summary.
pub struct PlateSolveRule {
    summary: Regex,
}

impl PlateSolveRule {
    pub fn new() -> Self {
        Self {
            summary: Regex::new(r"(\d+) images? successfully platesolved out of (\d+)")
                .expect("plate solve summary pattern is valid"),
        }
    }
}

impl Default for PlateSolveRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRule for PlateSolveRule {
    fn name(&self) -> &'static str {
        "siril.plate_solve"
    }

    fn description(&self) -> &'static str {
        "platesolved and updated / did not solve / N images successfully platesolved out of M"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let body = line.body();
        let activity = Marker::PhaseActivity(PhaseName::PlateSolving);
        let stage = Some(PhaseName::PlateSolving);

        if let Some(caps) = self.summary.captures(body) {
            let (Ok(solved), Ok(total)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) else {
                return vec![];
            };
            return vec![
                activity,
                Marker::ImageCount {
                    count: total,
                    stage,
                },
                Marker::ImageCount {
                    count: solved,
                    stage,
                },
                Marker::Measure(Measurement::PlateSolveSummary { solved, total }),
                Marker::PhaseEnd(PhaseName::PlateSolving),
            ];
        }

        if body.contains("platesolved and updated") {
            return vec![
                activity,
                Marker::Measure(Measurement::PlateSolve { solved: true }),
            ];
        }

        if body.contains("did not solve") {
            return vec![
                activity,
                Marker::Measure(Measurement::PlateSolve { solved: false }),
                Marker::Error {
                    subsystem: Some(PLATE_SOLVE_SUBSYSTEM.to_string()),
                },
            ];
        }

        vec![]
    }
}

/// `seqsubsky` commands and `Background extracted` lines.
pub struct BackgroundRule;

impl PatternRule for BackgroundRule {
    fn name(&self) -> &'static str {
        "siril.background"
    }

    fn description(&self) -> &'static str {
        "seqsubsky / background extracted"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let body = line.body().to_ascii_lowercase();
        if body.contains("seqsubsky") || body.contains("background extracted") {
            vec![Marker::PhaseActivity(PhaseName::BackgroundExtraction)]
        } else {
            vec![]
        }
    }
}

/// `seqapplyreg` commands and `Registered sequence` lines.
pub struct RegistrationRule;

impl PatternRule for RegistrationRule {
    fn name(&self) -> &'static str {
        "siril.registration"
    }

    fn description(&self) -> &'static str {
        "seqapplyreg / registered sequence"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let body = line.body().to_ascii_lowercase();
        if body.contains("seqapplyreg") || body.contains("registered sequence") {
            vec![Marker::PhaseActivity(PhaseName::Registration)]
        } else {
            vec![]
        }
    }
}

/// `Starting stacking`, `N images have been stacked`, and the stacking end lines.
pub struct StackingRule {
    stacked: Regex,
}

impl StackingRule {
    pub fn new() -> Self {
        Self {
            stacked: Regex::new(r"(\d+) images? ha(?:ve|s) been stacked")
                .expect("stacked count pattern is valid"),
        }
    }
}

impl Default for StackingRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRule for StackingRule {
    fn name(&self) -> &'static str {
        "siril.stacking"
    }

    fn description(&self) -> &'static str {
        "Starting stacking / N images have been stacked / Stacked sequence successfully / Rejection stacking complete"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let body = line.body();
        let mut markers = Vec::new();

        if body.contains("Starting stacking") {
            markers.push(Marker::PhaseStart(PhaseName::Stacking));
        }
        if let Some(count) = capture::<u64>(&self.stacked, body) {
            markers.push(Marker::ImageCount {
                count,
                stage: Some(PhaseName::Stacking),
            });
        }
        if body.contains("Stacked sequence successfully")
            || body.contains("Rejection stacking complete")
        {
            markers.push(Marker::PhaseEnd(PhaseName::Stacking));
        }

        markers
    }
}

/// FWHM, rotation, processor count and pixel rejection values.
pub struct QualityRule {
    fwhm: Regex,
    rotation: Regex,
    processors: Regex,
    rejection: Regex,
}

impl QualityRule {
    pub fn new() -> Self {
        Self {
            fwhm: Regex::new(r"\bFWHM[:=]?\s+(\d+\.\d+)").expect("fwhm pattern is valid"),
            rotation: Regex::new(r"Rotation:\s+([+-]?\d+\.\d+)")
                .expect("rotation pattern is valid"),
            processors: Regex::new(r"using (\d+) logical processors")
                .expect("processors pattern is valid"),
            rejection: Regex::new(
                r"Pixel rejection in channel #(\d+):\s+([\d.]+)%\s*-\s*([\d.]+)%",
            )
            .expect("rejection pattern is valid"),
        }
    }
}

impl Default for QualityRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRule for QualityRule {
    fn name(&self) -> &'static str {
        "siril.quality"
    }

    fn description(&self) -> &'static str {
        "FWHM x.y / Rotation: ±x.y / using N logical processors / Pixel rejection in channel #c: low% - high%"
    }

    fn apply(&self, line: &LogLine) -> Vec<Marker> {
        let body = line.body();
        let mut markers = Vec::new();

        if let Some(value) = capture::<f64>(&self.fwhm, body) {
            markers.push(Marker::Measure(Measurement::Fwhm { value }));
        }
        if let Some(degrees) = capture::<f64>(&self.rotation, body) {
            markers.push(Marker::Measure(Measurement::Rotation { degrees }));
        }
        if let Some(count) = capture::<u64>(&self.processors, body) {
            if let Ok(count) = u32::try_from(count) {
                markers.push(Marker::Measure(Measurement::Processors { count }));
            }
        }
        if let Some(caps) = self.rejection.captures(body) {
            let channel = caps[1].parse::<u32>().ok();
            let low = caps[2].parse::<f64>().ok();
            let high = caps[3].parse::<f64>().ok();
            if let (Some(channel), Some(low), Some(high)) = (channel, low, high) {
                markers.push(Marker::Measure(Measurement::PixelRejection {
                    channel,
                    low,
                    high,
                }));
            }
        }

        markers
    }
}

fn capture<T: std::str::FromStr>(pattern: &Regex, text: &str) -> Option<T> {
    pattern.captures(text).and_then(|caps| caps[1].parse().ok())
}
