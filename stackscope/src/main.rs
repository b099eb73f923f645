//! stackscope - summary reports for astrophotography preprocessing logs
//!
//! Reads a finished (or interrupted) preprocessing run log and prints phase
//! timings, the image-count waterfall, quality metrics and findings.

mod analyze;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use stackscope_core::{Analyzer, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackscope")]
#[command(about = "Summarize astrophotography preprocessing run logs")]
#[command(version)]
struct Cli {
    /// Load configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (debug logging and run statistics on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a run log and print the report
    Analyze {
        /// Path to the preprocessing log
        log_path: PathBuf,

        /// Save the report to this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show only the waterfall chart
        #[arg(short, long, conflicts_with = "format")]
        waterfall_only: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the pattern rules and detectors
    Rules,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// An explicit `--config` must load; a broken file at the default location
/// is reported and replaced by the defaults.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => match Config::load() {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!(
                    "warning: ignoring configuration at {}: {e}; using defaults",
                    Config::config_path().display()
                );
                Ok(Config::default())
            }
        },
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    // Analysis does not depend on logging; carry on without it.
    let _log_guard = match stackscope_core::logging::init(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            None
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stackscope starting");

    match cli.command {
        Command::Analyze {
            log_path,
            output,
            waterfall_only,
            format,
        } => analyze::run(
            &config,
            &analyze::AnalyzeArgs {
                log_path,
                output,
                waterfall_only,
                format,
                verbose: cli.verbose,
            },
        ),
        Command::Rules => {
            print_rules(&config);
            Ok(())
        }
    }
}

fn print_rules(config: &Config) {
    let analyzer = Analyzer::new(config);

    println!(
        "Pattern rules (rule set v{}):",
        stackscope_core::ingest::RULESET_VERSION
    );
    for rule in analyzer.registry().rules() {
        println!("  {:<26} {}", rule.name(), rule.description());
    }

    println!();
    println!("Detectors:");
    let engine = analyzer.engine();
    for detector in engine.detectors() {
        let disabled = if engine.is_disabled(detector.name()) {
            " (disabled)"
        } else {
            ""
        };
        println!(
            "  {:<26} {}{}",
            detector.name(),
            detector.description(),
            disabled
        );
    }
}
