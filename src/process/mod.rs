//! Child process stream following
//!
//! Runs a command with both output pipes captured and hands every line to a
//! [`LineSink`] the moment it arrives, the way a git hook wrapper has to
//! forward a slow child's output to its own caller.

use chrono::{DateTime, Local};
use eyre::{Context, Result};
use log::info;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

pub mod runner;

pub use runner::FollowRunner;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// One line read from the child
#[derive(Debug, Clone, Serialize)]
pub struct StreamLine {
    pub stream: Stream,
    /// Text of the line, invalid UTF-8 replaced
    pub line: String,
    /// Bytes exactly as the child wrote them, without the newline
    #[serde(skip)]
    pub raw: Vec<u8>,
    /// Time since the child was spawned
    pub elapsed: Duration,
    pub at: DateTime<Local>,
}

impl StreamLine {
    pub fn new(stream: Stream, mut raw: Vec<u8>, elapsed: Duration) -> Self {
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        let text = String::from_utf8_lossy(&raw);
        let line = text.strip_suffix('\r').unwrap_or(text.as_ref()).to_string();
        Self {
            stream,
            line,
            raw,
            elapsed,
            at: Local::now(),
        }
    }
}

/// Everything observed while following a child
#[derive(Debug, Clone, Serialize)]
pub struct FollowOutcome {
    /// `None` when the child was killed by a signal
    pub exit_code: Option<i32>,
    /// Lines in arrival order, both streams interleaved
    pub lines: Vec<StreamLine>,
    pub duration: Duration,
}

impl FollowOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn lines_of(&self, stream: Stream) -> impl Iterator<Item = &StreamLine> {
        self.lines.iter().filter(move |l| l.stream == stream)
    }

    #[cfg(test)]
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.lines_of(Stream::Stdout).map(|l| l.line.as_str()).collect()
    }

    #[cfg(test)]
    pub fn stderr_lines(&self) -> Vec<&str> {
        self.lines_of(Stream::Stderr).map(|l| l.line.as_str()).collect()
    }

    /// Exit code for a wrapper to pass on; signals map to 1
    pub fn wrapper_exit_code(&self) -> i32 {
        self.exit_code.unwrap_or(1)
    }
}

/// Receives lines as the follow runner reads them
pub trait LineSink {
    fn on_line(&mut self, line: &StreamLine) -> Result<()>;
}

/// Drops every line; the transcript still records them
#[derive(Debug, Default)]
pub struct NullSink;

impl LineSink for NullSink {
    fn on_line(&mut self, _line: &StreamLine) -> Result<()> {
        Ok(())
    }
}

/// Re-emits each line on the matching channel of this process
#[derive(Debug, Default)]
pub struct ForwardSink {
    timestamps: bool,
}

impl ForwardSink {
    pub fn new(timestamps: bool) -> Self {
        Self { timestamps }
    }

    /// The child's bytes, unchanged apart from the optional timestamp prefix
    fn render(&self, line: &StreamLine) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(line.raw.len() + 32);
        if self.timestamps {
            bytes.extend_from_slice(format!("[{}] ", line.at.format("%Y-%m-%d %H:%M:%S%.3f")).as_bytes());
        }
        bytes.extend_from_slice(&line.raw);
        bytes.push(b'\n');
        bytes
    }
}

impl LineSink for ForwardSink {
    fn on_line(&mut self, line: &StreamLine) -> Result<()> {
        let bytes = self.render(line);
        match line.stream {
            Stream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(&bytes).context("Failed to forward stdout line")?;
                out.flush().context("Failed to flush stdout")
            }
            Stream::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(&bytes).context("Failed to forward stderr line")?;
                err.flush().context("Failed to flush stderr")
            }
        }
    }
}

/// Passes lines on to another sink, optionally copying them to a file and the log
pub struct TeeSink<S: LineSink> {
    inner: S,
    file: Option<File>,
    log_lines: bool,
}

impl<S: LineSink> TeeSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            file: None,
            log_lines: false,
        }
    }

    /// Append every line, from both streams, to `path`
    pub fn output_file(mut self, path: &Path) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("Failed to open output file {}", path.display()))?;
        self.file = Some(file);
        Ok(self)
    }

    /// Log every line at info level
    pub fn log_lines(mut self, enabled: bool) -> Self {
        self.log_lines = enabled;
        self
    }
}

impl<S: LineSink> LineSink for TeeSink<S> {
    fn on_line(&mut self, line: &StreamLine) -> Result<()> {
        self.inner.on_line(line)?;

        if self.log_lines {
            info!("{}: {}", line.stream, line.line);
        }

        if let Some(ref mut file) = self.file {
            file.write_all(&line.raw)
                .and_then(|_| file.write_all(b"\n"))
                .context("Failed to write output file")?;
        }

        Ok(())
    }
}
