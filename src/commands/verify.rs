//! `streamcheck verify`

use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::emitter::EmitterSettings;
use crate::process::{FollowRunner, ForwardSink, LineSink, NullSink};
use crate::verify::{VerifyReport, verify_transcript};

/// Headroom on top of the emitter's own sleeping time
const STARTUP_ALLOWANCE: Duration = Duration::from_secs(10);

pub struct VerifyOptions {
    pub iterations: Option<u32>,
    pub delay_ms: Option<u64>,
    pub forward: bool,
    pub format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
}

/// Command that re-runs this binary as the emitter
pub fn emitter_runner(settings: &EmitterSettings, config_path: Option<&PathBuf>) -> Result<FollowRunner> {
    let exe = std::env::current_exe().context("Failed to locate streamcheck executable")?;

    let mut args = Vec::new();
    if let Some(path) = config_path {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    args.extend([
        "emit".to_string(),
        "--iterations".to_string(),
        settings.iterations.to_string(),
        "--delay-ms".to_string(),
        settings.delay_ms.to_string(),
    ]);
    if !settings.trailing_delay {
        args.push("--no-trailing-delay".to_string());
    }

    let limit = settings
        .total_delay()?
        .checked_add(STARTUP_ALLOWANCE)
        .ok_or_else(|| eyre!("Emitter run time is too long to put a timeout on"))?;

    Ok(FollowRunner::new(exe.display().to_string()).args(args).timeout(limit))
}

pub fn run(options: VerifyOptions, config_path: Option<&PathBuf>, config: &Config) -> Result<()> {
    let mut settings = config.emitter.clone();
    if let Some(n) = options.iterations {
        settings.iterations = n;
    }
    if let Some(ms) = options.delay_ms {
        settings.delay_ms = ms;
    }

    let runner = emitter_runner(&settings, config_path)?;
    info!("Verifying emitter: {}", runner.command_line());

    let mut forward = ForwardSink::new(false);
    let mut null = NullSink;
    let sink: &mut dyn LineSink = if options.forward { &mut forward } else { &mut null };
    let outcome = runner.run(sink)?;

    let report = verify_transcript(&outcome, &settings);
    info!("Verification {}", if report.passed() { "passed" } else { "failed" });

    if !options.quiet {
        match options.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&report)?),
            OutputFormat::Text => print_text_report(&report, options.verbose),
        }
    }

    if !report.passed() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_text_report(report: &VerifyReport, verbose: bool) {
    println!("{}", "streamcheck verify".bold());
    println!(
        "  {:12} {} pairs, {} ms apart, finished in {} ms",
        "Run:".dimmed(),
        report.iterations,
        report.delay_ms,
        report.duration_ms
    );
    println!();

    for check in &report.checks {
        if check.passed {
            if verbose {
                println!("  {} {:12} {}", "✓".green(), check.name, check.detail.dimmed());
            } else {
                println!("  {} {}", "✓".green(), check.name);
            }
        } else {
            println!("  {} {:12} {}", "✗".red(), check.name, check.detail);
        }
    }

    println!();
    if report.passed() {
        println!("{}", "All checks passed".green());
    } else {
        println!("{} {} check(s) failed", "✗".red(), report.failures().count());
    }
}
