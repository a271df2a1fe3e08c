use colored::*;
use eyre::Result;

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;

pub fn run(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), config),
        ConfigAction::Get { key } => get(&key, config),
    }
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "streamcheck Configuration".bold());
            println!();

            println!("{}: {}", "log_level".cyan(), config.log_level.as_filter());
            println!();

            println!("{}:", "emitter".cyan());
            println!("  iterations: {}", config.emitter.iterations);
            println!("  delay_ms: {}", config.emitter.delay_ms);
            println!("  trailing_delay: {}", config.emitter.trailing_delay);
            println!();

            println!("{}:", "follow".cyan());
            println!("  timestamps: {}", config.follow.timestamps);
            match config.follow.timeout_secs {
                Some(secs) => println!("  timeout_secs: {}", secs),
                None => println!("  timeout_secs: {}", "(none)".dimmed()),
            }
            match config.follow.output_file {
                Some(ref path) => println!("  output_file: {}", path.display()),
                None => println!("  output_file: {}", "(none)".dimmed()),
            }
            println!("  log_lines: {}", config.follow.log_lines);
        }
    }

    Ok(())
}

fn lookup(key: &str, config: &Config) -> Option<String> {
    match key {
        "log_level" | "log-level" => Some(config.log_level.as_filter().to_string()),
        "emitter.iterations" => Some(config.emitter.iterations.to_string()),
        "emitter.delay_ms" => Some(config.emitter.delay_ms.to_string()),
        "emitter.trailing_delay" => Some(config.emitter.trailing_delay.to_string()),
        "follow.timestamps" => Some(config.follow.timestamps.to_string()),
        "follow.timeout_secs" => Some(
            config
                .follow
                .timeout_secs
                .map(|s| s.to_string())
                .unwrap_or_default(),
        ),
        "follow.output_file" => Some(
            config
                .follow
                .output_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        ),
        "follow.log_lines" => Some(config.follow.log_lines.to_string()),
        _ => None,
    }
}

fn get(key: &str, config: &Config) -> Result<()> {
    match lookup(key, config) {
        Some(v) => println!("{}", v),
        None => {
            eprintln!("{} Unknown config key: {}", "✗".red(), key);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_keys() {
        let config = Config::default();
        assert_eq!(lookup("emitter.iterations", &config).as_deref(), Some("10"));
        assert_eq!(lookup("emitter.delay_ms", &config).as_deref(), Some("300"));
        assert_eq!(lookup("log-level", &config).as_deref(), Some("info"));
        assert_eq!(lookup("follow.timeout_secs", &config).as_deref(), Some(""));
        assert_eq!(lookup("follow.output_file", &config).as_deref(), Some(""));
        assert_eq!(lookup("follow.log_lines", &config).as_deref(), Some("false"));
    }

    #[test]
    fn test_lookup_unknown_key() {
        assert!(lookup("paths.plugins", &Config::default()).is_none());
    }
}
