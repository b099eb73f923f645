//! `stackscope analyze`: run the analysis and emit the report.

use crate::OutputFormat;
use anyhow::{Context, Result};
use stackscope_core::report::{render_json, render_report, render_waterfall, write_report};
use stackscope_core::{Analyzer, Config, Severity};
use std::path::PathBuf;

pub struct AnalyzeArgs {
    pub log_path: PathBuf,
    pub output: Option<PathBuf>,
    pub waterfall_only: bool,
    pub format: OutputFormat,
    pub verbose: bool,
}

pub fn run(config: &Config, args: &AnalyzeArgs) -> Result<()> {
    let analyzer = Analyzer::new(config);
    let report = analyzer.analyze_path(&args.log_path);

    if args.verbose {
        eprintln!(
            "Read {} line(s), extracted {} event(s): {} phase(s), {} waterfall step(s), {} finding(s) ({} critical)",
            report.lines_read,
            report.events_extracted,
            report.phases.len(),
            report.waterfall.len(),
            report.findings.len(),
            report.findings_with(Severity::Critical).count()
        );
    }

    let text = match (args.format, args.waterfall_only) {
        (OutputFormat::Json, _) => render_json(&report).context("failed to serialize report")?,
        (OutputFormat::Text, true) => render_waterfall(&report, &config.report),
        (OutputFormat::Text, false) => render_report(&report, &config.report),
    };

    match &args.output {
        Some(path) => {
            write_report(path, &text)
                .with_context(|| format!("failed to save report to {}", path.display()))?;
            println!("Report saved to: {}", path.display());
        }
        None => print!("{text}"),
    }

    Ok(())
}
