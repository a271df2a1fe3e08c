use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "streamcheck",
    about = "Dual-stream emitter and live stdout/stderr forwarder for testing hook wrappers",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/streamcheck/logs/streamcheck.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to streamcheck.yaml config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write numbered lines to stdout and stderr with a pause between pairs
    Emit {
        /// Number of line pairs (default: 10)
        #[arg(long)]
        iterations: Option<u32>,

        /// Pause after each pair in milliseconds (default: 300)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Exit right after the last pair instead of pausing once more
        #[arg(long)]
        no_trailing_delay: bool,
    },

    /// Run a command and forward its stdout and stderr live
    Follow {
        /// Prefix each forwarded line with a local timestamp
        #[arg(long)]
        timestamps: bool,

        /// Kill the command after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Run the arguments as one shell command line through bash -c
        #[arg(long)]
        shell: bool,

        /// Working directory for the command
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Extra environment variable for the command (KEY=VALUE, repeatable)
        #[arg(long = "env", value_name = "KEY=VALUE")]
        envs: Vec<String>,

        /// Also append every line from both streams to this file
        #[arg(long, value_name = "PATH")]
        output_file: Option<PathBuf>,

        /// Also write every line to the streamcheck log at info level
        #[arg(long)]
        log_lines: bool,

        /// Command and its arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Run the emitter through the follow runner and check its output
    Verify {
        /// Number of line pairs (default from config)
        #[arg(long)]
        iterations: Option<u32>,

        /// Pause after each pair in milliseconds (default from config)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Also forward the emitter's lines while verifying
        #[arg(long)]
        forward: bool,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Get a configuration value
    Get {
        /// Configuration key (dot notation)
        key: String,
    },
}
