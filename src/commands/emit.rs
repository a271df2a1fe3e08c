//! `streamcheck emit`

use eyre::Result;
use std::io;

use crate::config::Config;
use crate::emitter::{Emitter, EmitterSettings, StderrSink};

pub fn settings(
    iterations: Option<u32>,
    delay_ms: Option<u64>,
    no_trailing_delay: bool,
    config: &Config,
) -> EmitterSettings {
    let mut settings = config.emitter.clone();
    if let Some(n) = iterations {
        settings.iterations = n;
    }
    if let Some(ms) = delay_ms {
        settings.delay_ms = ms;
    }
    if no_trailing_delay {
        settings.trailing_delay = false;
    }
    settings
}

pub fn run(iterations: Option<u32>, delay_ms: Option<u64>, no_trailing_delay: bool, config: &Config) -> Result<()> {
    let settings = settings(iterations, delay_ms, no_trailing_delay, config);
    let mut emitter = Emitter::new(settings, io::stdout(), StderrSink);
    emitter.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_to_config() {
        let config = Config::default();
        assert_eq!(settings(None, None, false, &config), EmitterSettings::default());
    }

    #[test]
    fn test_settings_flags_override_config() {
        let mut config = Config::default();
        config.emitter.iterations = 4;

        let s = settings(Some(2), Some(5), true, &config);
        assert_eq!(s.iterations, 2);
        assert_eq!(s.delay_ms, 5);
        assert!(!s.trailing_delay);

        let s = settings(None, Some(5), false, &config);
        assert_eq!(s.iterations, 4);
        assert!(s.trailing_delay);
    }
}
