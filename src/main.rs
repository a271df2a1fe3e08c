use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;
mod commands;
mod config;
mod emitter;
mod process;
mod verify;

use cli::{Cli, Commands};
use config::{Config, LogLevel};

fn log_dir() -> PathBuf {
    match std::env::var("STREAMCHECK_LOG_DIR") {
        Ok(dir) => Config::expand_path(&PathBuf::from(dir)),
        Err(_) => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("streamcheck")
            .join("logs"),
    }
}

// Logs go to a file only; stdout and stderr belong to the emitter and the followed child
fn setup_logging(log_level: LogLevel) -> Result<()> {
    let log_dir = log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("streamcheck.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG env var takes precedence, otherwise use config log_level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(log_level.to_level_filter());
    }

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    info!(
        "Log level: {} (from {})",
        log_level.as_filter(),
        if std::env::var("RUST_LOG").is_ok() { "RUST_LOG env" } else { "config" }
    );
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Emit {
            iterations,
            delay_ms,
            no_trailing_delay,
        } => commands::emit::run(iterations, delay_ms, no_trailing_delay, &config),
        Commands::Follow {
            timestamps,
            timeout_secs,
            shell,
            cwd,
            envs,
            output_file,
            log_lines,
            command,
        } => commands::follow::run(
            commands::follow::FollowOptions {
                command,
                timestamps,
                timeout_secs,
                shell,
                cwd,
                envs,
                output_file,
                log_lines,
            },
            &config,
        ),
        Commands::Verify {
            iterations,
            delay_ms,
            forward,
            format,
        } => commands::verify::run(
            commands::verify::VerifyOptions {
                iterations,
                delay_ms,
                forward,
                format: cli::OutputFormat::resolve(format),
                verbose: cli.verbose,
                quiet: cli.quiet,
            },
            cli.config.as_ref(),
            &config,
        ),
        Commands::Config { action } => commands::config::run(action, &config),
        Commands::Completions { shell } => commands::completions::run(shell),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration (before logging, so log messages in Config::load are silent)
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let log_level = if cli.verbose && config.log_level == LogLevel::Info {
        LogLevel::Debug
    } else {
        config.log_level
    };
    // A missing log file is not worth failing the run over. emit and follow
    // stay silent about it since both of their output channels are spoken for.
    if let Err(e) = setup_logging(log_level) {
        if !matches!(cli.command, Commands::Emit { .. } | Commands::Follow { .. }) {
            eprintln!("Warning: logging disabled: {:#}", e);
        }
    }

    info!("Starting streamcheck with config from: {:?}", cli.config);

    run(cli, config).context("Command failed")?;

    Ok(())
}
