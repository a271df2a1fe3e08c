//! Follow runner implementation

use eyre::{Context, Result, eyre};
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use super::{FollowOutcome, LineSink, Stream, StreamLine};

/// Spawns a child and forwards its output line by line
#[derive(Debug, Clone)]
pub struct FollowRunner {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env_vars: HashMap<String, String>,
    timeout: Option<Duration>,
    record: bool,
}

/// Lines seen so far; only kept when the caller wants the transcript
#[derive(Debug, Default)]
struct Transcript {
    record: bool,
    received: usize,
    lines: Vec<StreamLine>,
}

impl Transcript {
    fn push(&mut self, line: StreamLine) {
        self.received += 1;
        if self.record {
            self.lines.push(line);
        }
    }
}

impl FollowRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env_vars: HashMap::new(),
            timeout: None,
            record: true,
        }
    }

    /// Run `cmd` through `bash -c`, or `sh -c` when bash is missing
    pub fn shell(cmd: impl Into<String>) -> Self {
        let shell = if which::which("bash").is_ok() { "bash" } else { "sh" };
        Self::new(shell).args(["-c".to_string(), cmd.into()])
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Keep every line in the outcome (the default). Wrappers that only
    /// forward can turn this off so long-running children don't pile up memory.
    pub fn record(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Blocking entry point for synchronous callers
    pub fn run(&self, sink: &mut dyn LineSink) -> Result<FollowOutcome> {
        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        rt.block_on(self.follow(sink))
    }

    pub async fn follow(&self, sink: &mut dyn LineSink) -> Result<FollowOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        debug!("Following command: {}", self.command_line());
        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .wrap_err_with(|| format!("Failed to spawn: {}", self.command_line()))?;

        let mut transcript = Transcript {
            record: self.record,
            ..Transcript::default()
        };
        let followed = Self::pump(&mut child, start, sink, &mut transcript);

        let exit_code = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, followed).await.ok() {
                Some(result) => result?,
                None => {
                    warn!("Command timed out after {:?}: {}", limit, self.command_line());
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill timed out child: {}", e);
                    }
                    eyre::bail!(
                        "Command timed out after {}s ({} lines received): {}",
                        limit.as_secs_f64(),
                        transcript.received,
                        self.command_line()
                    );
                }
            },
            None => followed.await?,
        };

        let duration = start.elapsed();
        info!(
            "Command exited with {:?} after {:?} ({} lines): {}",
            exit_code,
            duration,
            transcript.received,
            self.command_line()
        );

        Ok(FollowOutcome {
            exit_code,
            lines: transcript.lines,
            duration,
        })
    }

    /// Read both pipes until they close, then reap the child
    async fn pump(
        child: &mut Child,
        start: Instant,
        sink: &mut dyn LineSink,
        transcript: &mut Transcript,
    ) -> Result<Option<i32>> {
        let stdout = child.stdout.take().ok_or_else(|| eyre!("Child stdout was not captured"))?;
        let stderr = child.stderr.take().ok_or_else(|| eyre!("Child stderr was not captured"))?;

        let mut out = BufReader::new(stdout);
        let mut err = BufReader::new(stderr);
        // Bytes of a line still being read. A read_until cancelled by the
        // other branch leaves what it consumed here and the next call resumes.
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            // biased: when both pipes are ready, stdout was written first
            let (stream, read) = tokio::select! {
                biased;
                read = out.read_until(b'\n', &mut out_buf), if out_open => (Stream::Stdout, read),
                read = err.read_until(b'\n', &mut err_buf), if err_open => (Stream::Stderr, read),
            };

            let n = read.wrap_err_with(|| format!("Failed to read child {}", stream))?;
            let (buf, open) = match stream {
                Stream::Stdout => (&mut out_buf, &mut out_open),
                Stream::Stderr => (&mut err_buf, &mut err_open),
            };

            if n == 0 {
                *open = false;
                // EOF; a cancelled read may still have left an unterminated line
                if buf.is_empty() {
                    continue;
                }
            }

            let line = StreamLine::new(stream, std::mem::take(buf), start.elapsed());
            trace!("{}: {}", stream, line.line);
            sink.on_line(&line)?;
            transcript.push(line);
        }

        let status = child.wait().await.context("Failed to wait for child")?;
        Ok(status.code())
    }
}
