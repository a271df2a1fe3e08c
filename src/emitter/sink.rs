//! Error-channel writers handed to the emitter

use eyre::{Context, Result};
use std::io::{self, Write};

/// Something that can print a line to an error channel.
///
/// The emitter never touches stderr itself; whoever builds it decides where
/// error lines go.
pub trait ErrorSink {
    /// Write `text` followed by a newline and flush.
    fn print_error(&mut self, text: &str) -> Result<()>;
}

/// Writes to this process's stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl ErrorSink for StderrSink {
    fn print_error(&mut self, text: &str) -> Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{}", text).context("Failed to write to stderr")?;
        stderr.flush().context("Failed to flush stderr")
    }
}

/// Adapts any writer into an [`ErrorSink`]
#[cfg(test)]
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    inner: W,
}

#[cfg(test)]
impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
impl<W: Write> ErrorSink for WriterSink<W> {
    fn print_error(&mut self, text: &str) -> Result<()> {
        writeln!(self.inner, "{}", text).context("Failed to write error line")?;
        self.inner.flush().context("Failed to flush error channel")
    }
}
