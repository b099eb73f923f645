//! Plain-text and JSON rendering of a [`Report`].
//!
//! Rendering is pure: the same report and options always give the same text.

use crate::config::ReportConfig;
use crate::error::Result;
use crate::format::{
    format_count_opt, format_duration_opt, format_percent_opt, format_time_opt, UNKNOWN,
};
use crate::types::{Finding, PhaseStatus, Report, Severity};

const RULE_WIDTH: usize = 60;
const SECTION_RULE_WIDTH: usize = 30;
/// Evidence lines listed per finding before the rest are summarized.
const MAX_EVIDENCE_SHOWN: usize = 5;

fn double_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn section(out: &mut Vec<String>, title: &str) {
    out.push(title.to_string());
    out.push("-".repeat(SECTION_RULE_WIDTH));
}

/// Render the complete report.
pub fn render_report(report: &Report, config: &ReportConfig) -> String {
    let mut out = Vec::new();

    out.push(double_rule());
    out.push("STACKSCOPE PROCESSING REPORT".to_string());
    out.push(double_rule());
    out.push(format!("Source:        {}", report.source));
    out.push(format!("Lines read:    {}", report.lines_read));
    out.push(format!("Events:        {}", report.events_extracted));
    out.push(format!("Rule set:      v{}", report.ruleset_version));
    if report.is_empty() {
        out.push(String::new());
        out.push("No data extracted from this log.".to_string());
    }
    out.push(String::new());

    section(&mut out, "[1] PHASE TIMINGS");
    phase_lines(report, &mut out);
    out.push(String::new());

    section(&mut out, "[2] IMAGE WATERFALL");
    waterfall_lines(report, config, &mut out);
    out.push(String::new());

    section(&mut out, "[3] QUALITY METRICS");
    metric_lines(report, &mut out);
    out.push(String::new());

    section(&mut out, "[4] FINDINGS");
    finding_lines(report, &mut out);
    out.push(String::new());

    section(&mut out, "[5] RECOMMENDATIONS");
    for recommendation in recommendations(report) {
        out.push(format!("  • {recommendation}"));
    }
    out.push(String::new());

    out.push(double_rule());
    let summary = &report.summary;
    out.push(format!(
        "Total elapsed: {}",
        format_duration_opt(summary.total_elapsed_secs)
    ));
    out.push(format!(
        "Images:        {} in, {} out",
        format_count_opt(summary.images_in),
        format_count_opt(summary.images_out)
    ));
    out.push(format!(
        "Yield:         {}",
        format_percent_opt(summary.yield_percent)
    ));
    out.push(double_rule());

    out.join("\n") + "\n"
}

/// Render only the waterfall chart.
pub fn render_waterfall(report: &Report, config: &ReportConfig) -> String {
    let mut out = vec![
        double_rule(),
        "IMAGE PROCESSING WATERFALL".to_string(),
        double_rule(),
    ];
    waterfall_lines(report, config, &mut out);
    out.push(double_rule());
    out.join("\n") + "\n"
}

/// Render the report as pretty-printed JSON.
pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)? + "\n")
}

fn phase_lines(report: &Report, out: &mut Vec<String>) {
    if report.phases.is_empty() {
        out.push("  (no phases detected)".to_string());
        return;
    }

    let total = report.summary.phase_time_secs.filter(|&t| t > 0);
    out.push(format!(
        "  {:<22} {:<10} {:>10} {:>10} {:>10} {:>7}",
        "Phase", "Status", "Start", "End", "Duration", "Share"
    ));
    for phase in &report.phases {
        let share = match (phase.duration_secs, total) {
            (Some(d), Some(t)) => Some(d as f64 / t as f64 * 100.0),
            _ => None,
        };
        out.push(format!(
            "  {:<22} {:<10} {:>10} {:>10} {:>10} {:>7}",
            phase.name.display_name(),
            phase.status.as_str(),
            format_time_opt(phase.start),
            format_time_opt(phase.end),
            format_duration_opt(phase.duration_secs),
            format_percent_opt(share)
        ));
    }

    let abandoned = report
        .phases
        .iter()
        .filter(|p| p.status == PhaseStatus::Abandoned)
        .count();
    if abandoned > 0 {
        out.push(format!("  {abandoned} phase(s) never finished"));
    }
    out.push(format!(
        "  Time in phases: {}",
        format_duration_opt(report.summary.phase_time_secs)
    ));
}

fn bar(count: Option<u64>, scale: Option<u64>, width: usize) -> String {
    match (count, scale) {
        (Some(count), Some(scale)) if scale > 0 => {
            let filled = (count as f64 / scale as f64 * width as f64) as usize;
            "█".repeat(filled.min(width))
        }
        _ => String::new(),
    }
}

fn waterfall_lines(report: &Report, config: &ReportConfig, out: &mut Vec<String>) {
    if report.waterfall.is_empty() {
        out.push("  (no image counts found)".to_string());
        return;
    }

    let scale = report.summary.images_in;
    out.push(format!(
        "  {:<22} {:>6} {:>6} {:>15} {:>9}",
        "Stage", "In", "Out", "Dropped", "Retained"
    ));
    for step in &report.waterfall {
        let dropped = match (step.dropped, step.dropped_percent()) {
            (Some(d), Some(pct)) => format!("{d} ({pct:.1}%)"),
            (Some(d), None) => d.to_string(),
            _ => UNKNOWN.to_string(),
        };
        let line = format!(
            "  {:<22} {:>6} {:>6} {:>15} {:>9}  {}",
            step.stage_name.display_name(),
            format_count_opt(step.input_count),
            format_count_opt(step.output_count),
            dropped,
            format_percent_opt(step.retained_percent()),
            bar(step.output_count, scale, config.bar_width)
        );
        out.push(line.trim_end().to_string());
    }

    let metrics = &report.metrics;
    if metrics.plate_solve_failures > 0 {
        out.push(format!(
            "  ├─ Failed to plate solve: {}",
            metrics.plate_solve_failures
        ));
    }
}

fn metric_lines(report: &Report, out: &mut Vec<String>) {
    let metrics = &report.metrics;
    let before = out.len();

    if let Some(pct) = metrics.plate_solve_success_percent() {
        out.push(format!(
            "  • Plate solve:      {}/{} solved ({:.1}%)",
            metrics.plate_solve_successes,
            metrics.plate_solve_successes + metrics.plate_solve_failures,
            pct
        ));
    }
    if let Some(fwhm) = &metrics.fwhm {
        out.push(format!(
            "  • FWHM:             {:.2} - {:.2} px, median {:.2} ({} frames)",
            fwhm.min, fwhm.max, fwhm.median, fwhm.count
        ));
    }
    if let Some(rotation) = &metrics.rotation {
        out.push(format!(
            "  • Rotation:         {:.1} to {:.1} degrees",
            rotation.min, rotation.max
        ));
    }
    if !metrics.pixel_rejection.is_empty() {
        let channels: Vec<String> = metrics
            .pixel_rejection
            .iter()
            .map(|c| format!("#{} {:.3}%-{:.3}%", c.channel, c.low, c.high))
            .collect();
        out.push(format!("  • Pixel rejection:  {}", channels.join(", ")));
    }
    if let Some(count) = metrics.processors_used {
        out.push(format!("  • Processors:       {count}"));
    }

    if out.len() == before {
        out.push("  (no quality metrics found)".to_string());
    }
}

fn evidence_suffix(finding: &Finding) -> String {
    let lines = &finding.evidence_lines;
    if lines.is_empty() {
        return String::new();
    }
    let shown: Vec<String> = lines
        .iter()
        .take(MAX_EVIDENCE_SHOWN)
        .map(|l| l.to_string())
        .collect();
    let label = if lines.len() == 1 { "line" } else { "lines" };
    let more = lines.len().saturating_sub(MAX_EVIDENCE_SHOWN);
    if more > 0 {
        format!(" ({label} {} and {more} more)", shown.join(", "))
    } else {
        format!(" ({label} {})", shown.join(", "))
    }
}

fn finding_lines(report: &Report, out: &mut Vec<String>) {
    if report.findings.is_empty() {
        out.push("  (no findings)".to_string());
        return;
    }

    for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
        let mut group = report.findings_with(severity).peekable();
        if group.peek().is_none() {
            continue;
        }
        out.push(severity.as_str().to_string());
        for finding in group {
            out.push(format!(
                "  • [{}] {}{}",
                finding.detector_name,
                finding.message,
                evidence_suffix(finding)
            ));
        }
    }
}

/// Advice derived from the report.
pub fn recommendations(report: &Report) -> Vec<String> {
    let mut recs = Vec::new();
    let metrics = &report.metrics;

    if let Some(rate) = metrics.plate_solve_success_percent() {
        if rate >= 95.0 {
            recs.push(format!("Plate solve success rate is excellent ({rate:.1}%)"));
        } else if rate >= 85.0 {
            recs.push(format!("Plate solve success rate is good ({rate:.1}%)"));
        } else {
            recs.push(format!(
                "Low plate solve success rate ({rate:.1}%): check image quality and solver settings"
            ));
        }
    }

    if let Some(retention) = report.summary.yield_percent {
        let loss = (100.0 - retention).max(0.0);
        if retention >= 80.0 {
            recs.push(format!(
                "{loss:.0}% image loss is within the normal range for quality filtering"
            ));
        } else if retention >= 60.0 {
            recs.push(format!(
                "{loss:.0}% image loss: consider reviewing filter settings"
            ));
        } else {
            recs.push(format!(
                "High image loss ({loss:.0}%): review quality filters and check for issues"
            ));
        }
    }

    if let Some(fwhm) = &metrics.fwhm {
        if fwhm.count > 10 && fwhm.spread() > 2.0 {
            recs.push(
                "High FWHM variation: seeing or focus may have changed during the session"
                    .to_string(),
            );
        }
    }

    if report.phases.iter().any(|p| p.status == PhaseStatus::Abandoned) {
        recs.push(
            "Some phases never finished: the run may have been interrupted or crashed".to_string(),
        );
    }

    if recs.is_empty() {
        recs.push("No specific recommendations: processing appears normal".to_string());
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;

    const BASIC: &str = "\
[10:00:00] START conversion
120 images found
[10:05:00] END conversion
[10:05:00] START registration
95 images registered
[10:12:30] END registration
";

    fn config() -> ReportConfig {
        ReportConfig::default()
    }

    #[test]
    fn test_sections_in_order() {
        let report = Analyzer::default().analyze_text(BASIC);
        let text = render_report(&report, &config());

        let positions: Vec<usize> = [
            "STACKSCOPE PROCESSING REPORT",
            "[1] PHASE TIMINGS",
            "[2] IMAGE WATERFALL",
            "[3] QUALITY METRICS",
            "[4] FINDINGS",
            "[5] RECOMMENDATIONS",
            "Total elapsed: 00:12:30",
        ]
        .iter()
        .map(|needle| text.find(needle).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_basic_waterfall_and_timings() {
        let report = Analyzer::default().analyze_text(BASIC);
        let text = render_report(&report, &config());

        assert!(text.contains("25 (20.8%)"));
        assert!(text.contains("79.2%"));
        assert!(text.contains("00:05:00"));
        assert!(text.contains("00:07:30"));
        assert!(text.contains("closed"));
        assert!(!text.contains("No data extracted"));
    }

    #[test]
    fn test_bar_is_scaled_to_first_input() {
        let report = Analyzer::default().analyze_text(BASIC);
        let text = render_waterfall(&report, &ReportConfig { bar_width: 20 });

        let conversion = text.lines().find(|l| l.contains("Conversion")).unwrap();
        assert!(conversion.ends_with(&"█".repeat(20)));
        let registration = text.lines().find(|l| l.contains("Registration")).unwrap();
        // 95 / 120 * 20 = 15.8, truncated
        assert!(registration.ends_with(&format!(" {}", "█".repeat(15))));
    }

    #[test]
    fn test_empty_report_renders() {
        let report = Analyzer::default().analyze_text("");
        let text = render_report(&report, &config());

        assert!(text.contains("No data extracted from this log."));
        assert!(text.contains("(no phases detected)"));
        assert!(text.contains("(no image counts found)"));
        assert!(text.contains("(no findings)"));
        assert!(text.contains("No specific recommendations"));
        assert!(text.contains("Yield:         -"));
    }

    #[test]
    fn test_abandoned_phase_is_shown() {
        let report = Analyzer::default()
            .analyze_text("[10:00:00] START conversion\n[10:05:00] END conversion\n[10:05:00] START registration\n");
        let text = render_report(&report, &config());
        assert!(text.contains("abandoned"));
        assert!(text.contains("1 phase(s) never finished"));
        assert!(text.contains("Some phases never finished"));
    }

    #[test]
    fn test_findings_grouped_critical_first() {
        let text_log: String = (1..=5)
            .map(|i| format!("ERROR: plate solve failed for image {i}\nWarning: low stars\n"))
            .collect();
        let report = Analyzer::default().analyze_text(&text_log);
        let text = render_report(&report, &config());

        let critical = text.find("\nCRITICAL\n").unwrap();
        assert!(text[critical..].contains("plate solve"));
        assert!(text.contains("(lines 1, 3, 5, 7, 9)"));
    }

    #[test]
    fn test_evidence_suffix_truncates() {
        let finding = Finding::new("x", Severity::Info, "m", (1..=8).collect());
        assert_eq!(evidence_suffix(&finding), " (lines 1, 2, 3, 4, 5 and 3 more)");
        let single = Finding::new("x", Severity::Info, "m", vec![4]);
        assert_eq!(evidence_suffix(&single), " (line 4)");
    }

    #[test]
    fn test_json_output() {
        let report = Analyzer::default().analyze_text(BASIC);
        let json = render_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["phases"][0]["name"], "conversion");
        assert_eq!(value["phases"][0]["status"], "closed");
        assert_eq!(value["waterfall"][1]["dropped"], 25);
        assert_eq!(value["ruleset_version"], 1);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let analyzer = Analyzer::default();
        let a = render_report(&analyzer.analyze_text(BASIC), &config());
        let b = render_report(&analyzer.analyze_text(BASIC), &config());
        assert_eq!(a, b);
    }

    #[test]
    fn test_recommendations() {
        let report = Analyzer::default().analyze_text(BASIC);
        let recs = recommendations(&report);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0], "21% image loss: consider reviewing filter settings");
    }
}
