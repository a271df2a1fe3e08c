use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::emitter::EmitterSettings;

/// Main streamcheck configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub emitter: EmitterSettings,
    pub follow: FollowConfig,
}

/// Log level written to the log file
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

/// Defaults for `streamcheck follow`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Prefix forwarded lines with a local timestamp
    pub timestamps: bool,
    /// Kill the child after this many seconds
    pub timeout_secs: Option<u64>,
    /// Append forwarded lines to this file
    pub output_file: Option<PathBuf>,
    /// Log forwarded lines at info level
    pub log_lines: bool,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // An explicit path must load or fail loudly
        if let Some(path) = config_path {
            let path = Self::expand_path(path);
            return Self::load_from_file(&path).context(format!("Failed to load config from {}", path.display()));
        }

        if let Ok(env_path) = std::env::var("STREAMCHECK_CONFIG") {
            let path = Self::expand_path(Path::new(&env_path));
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from STREAMCHECK_CONFIG: {}", e);
                    }
                }
            }
        }

        let candidates = [
            Self::streamcheck_dir().join("streamcheck.yaml"),
            PathBuf::from("streamcheck.yaml"),
        ];

        for path in candidates.iter() {
            if path.exists() {
                match Self::load_from_file(path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Directory holding streamcheck.yaml
    pub fn streamcheck_dir() -> PathBuf {
        std::env::var("STREAMCHECK_DIR")
            .map(|dir| Self::expand_path(Path::new(&dir)))
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("streamcheck")
            })
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.emitter.iterations, 10);
        assert_eq!(config.emitter.delay(), Duration::from_millis(300));
        assert!(config.emitter.trailing_delay);
        assert!(!config.follow.timestamps);
        assert!(config.follow.timeout_secs.is_none());
        assert!(config.follow.output_file.is_none());
        assert!(!config.follow.log_lines);
    }

    #[test]
    fn test_follow_tee_keys() {
        let yaml = "follow:\n  output_file: ~/hook.log\n  log_lines: true\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.follow.output_file, Some(PathBuf::from("~/hook.log")));
        assert!(config.follow.log_lines);
        assert!(!config.follow.timestamps);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "emitter:\n  iterations: 3\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.emitter.iterations, 3);
        assert_eq!(config.emitter.delay_ms, 300);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_log_level_parsing() {
        let yaml = "log_level: debug\nfollow:\n  timestamps: true\n  timeout_secs: 5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.log_level.to_level_filter(), log::LevelFilter::Debug);
        assert!(config.follow.timestamps);
        assert_eq!(config.follow.timeout_secs, Some(5));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("streamcheck.yaml");
        fs::write(&path, "emitter:\n  delay_ms: 50\n  trailing_delay: false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.emitter.delay_ms, 50);
        assert!(!config.emitter.trailing_delay);
    }

    #[test]
    fn test_load_explicit_path_missing_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nope.yaml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_explicit_path_invalid_yaml_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bad.yaml");
        fs::write(&path, "emitter: [1, 2").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_expand_path_no_expansion() {
        let path = PathBuf::from("/usr/local/bin");
        let expanded = Config::expand_path(&path);
        assert_eq!(expanded, PathBuf::from("/usr/local/bin"));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = Config::expand_path(&path);
        assert!(!expanded.to_string_lossy().contains('~'));
        assert!(expanded.to_string_lossy().contains("test"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = Config::default();
        config.emitter.iterations = 4;
        config.log_level = LogLevel::Warn;
        let yaml_str = serde_yaml::to_string(&config).expect("Failed to serialize");
        let parsed: Config = serde_yaml::from_str(&yaml_str).expect("Failed to deserialize");
        assert_eq!(parsed.emitter.iterations, 4);
        assert_eq!(parsed.log_level, LogLevel::Warn);
    }
}
