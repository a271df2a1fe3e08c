//! `streamcheck follow`

use eyre::Result;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::process::{FollowRunner, ForwardSink, TeeSink};

pub struct FollowOptions {
    pub command: Vec<String>,
    pub timestamps: bool,
    pub timeout_secs: Option<u64>,
    pub shell: bool,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<String>,
    pub output_file: Option<PathBuf>,
    pub log_lines: bool,
}

pub fn runner(options: &FollowOptions, config: &Config) -> Result<FollowRunner> {
    let Some((program, args)) = options.command.split_first() else {
        eyre::bail!("No command given to follow");
    };

    let mut runner = if options.shell {
        FollowRunner::shell(options.command.join(" "))
    } else {
        FollowRunner::new(program.clone()).args(args.iter().cloned())
    };

    if let Some(ref dir) = options.cwd {
        runner = runner.working_dir(Config::expand_path(dir));
    }

    for pair in &options.envs {
        let Some((key, value)) = pair.split_once('=') else {
            eyre::bail!("Invalid --env value (expected KEY=VALUE): {}", pair);
        };
        runner = runner.env(key, value);
    }

    if let Some(secs) = options.timeout_secs.or(config.follow.timeout_secs) {
        runner = runner.timeout(Duration::from_secs(secs));
    }

    // Lines are forwarded as they arrive; only the exit code is needed afterwards
    Ok(runner.record(false))
}

/// Forward to our own channels, plus the optional file and log copies
pub fn sink(options: &FollowOptions, config: &Config) -> Result<TeeSink<ForwardSink>> {
    let forward = ForwardSink::new(options.timestamps || config.follow.timestamps);
    let mut sink = TeeSink::new(forward).log_lines(options.log_lines || config.follow.log_lines);

    if let Some(path) = options.output_file.as_ref().or(config.follow.output_file.as_ref()) {
        let path = Config::expand_path(path);
        info!("Copying followed output to {}", path.display());
        sink = sink.output_file(&path)?;
    }

    Ok(sink)
}

pub fn run(options: FollowOptions, config: &Config) -> Result<()> {
    let runner = runner(&options, config)?;
    let mut sink = sink(&options, config)?;
    let outcome = runner.run(&mut sink)?;

    let code = outcome.wrapper_exit_code();
    info!("Followed command finished with wrapper exit code {}", code);
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
