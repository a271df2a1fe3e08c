//! Dual-stream emitter
//!
//! Writes `stdout: <i>` to the output channel and `stderr: <i>` to the error
//! channel once per iteration, sleeping between iterations. Used as a slow
//! child process when testing wrappers that forward both streams live.

use eyre::{Context, Result, eyre};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::thread;
use std::time::Duration;

pub mod sink;

pub use sink::{ErrorSink, StderrSink};

#[cfg(test)]
pub use sink::WriterSink;

pub const DEFAULT_ITERATIONS: u32 = 10;
pub const DEFAULT_DELAY_MS: u64 = 300;

/// Tunables for a run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EmitterSettings {
    /// Number of stdout/stderr line pairs
    pub iterations: u32,
    /// Pause after each pair, in milliseconds
    pub delay_ms: u64,
    /// Also pause after the last pair before exiting
    pub trailing_delay: bool,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            delay_ms: DEFAULT_DELAY_MS,
            trailing_delay: true,
        }
    }
}

impl EmitterSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Number of sleeps a full run performs
    pub fn delay_count(&self) -> u32 {
        match (self.iterations, self.trailing_delay) {
            (0, _) => 0,
            (n, true) => n,
            (n, false) => n - 1,
        }
    }

    /// Lower bound on the time between the first and the last emitted line
    pub fn min_emission_span(&self) -> Result<Duration> {
        self.sleeping_time(self.iterations.saturating_sub(1))
    }

    /// Lower bound on the wall-clock time of a full run
    pub fn total_delay(&self) -> Result<Duration> {
        self.sleeping_time(self.delay_count())
    }

    fn sleeping_time(&self, sleeps: u32) -> Result<Duration> {
        self.delay().checked_mul(sleeps).ok_or_else(|| {
            eyre!(
                "Run time of {} iterations {} ms apart is too long to represent",
                self.iterations,
                self.delay_ms
            )
        })
    }

    pub fn stdout_line(i: u32) -> String {
        format!("stdout: {}", i)
    }

    pub fn stderr_line(i: u32) -> String {
        format!("stderr: {}", i)
    }
}

pub struct Emitter<W: Write, E: ErrorSink> {
    settings: EmitterSettings,
    out: W,
    err: E,
}

impl<W: Write, E: ErrorSink> Emitter<W, E> {
    pub fn new(settings: EmitterSettings, out: W, err: E) -> Self {
        Self { settings, out, err }
    }

    /// Run every iteration. The first failed write ends the run.
    pub fn run(&mut self) -> Result<()> {
        let iterations = self.settings.iterations;
        let delay = self.settings.delay();
        info!(
            "Emitting {} line pairs, {:?} apart (trailing delay: {})",
            iterations, delay, self.settings.trailing_delay
        );

        for i in 1..=iterations {
            writeln!(self.out, "{}", EmitterSettings::stdout_line(i))
                .wrap_err_with(|| format!("Failed to write stdout line {}", i))?;
            self.out
                .flush()
                .wrap_err_with(|| format!("Failed to flush stdout line {}", i))?;

            self.err
                .print_error(&EmitterSettings::stderr_line(i))
                .wrap_err_with(|| format!("Failed to write stderr line {}", i))?;

            debug!("Emitted pair {}/{}", i, iterations);

            if i < iterations || self.settings.trailing_delay {
                thread::sleep(delay);
            }
        }

        info!("Emitter finished");
        Ok(())
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (W, E) {
        (self.out, self.err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;
    use std::time::Instant;

    fn quick(iterations: u32) -> EmitterSettings {
        EmitterSettings {
            iterations,
            delay_ms: 0,
            trailing_delay: true,
        }
    }

    /// Records both channels into one ordered log
    #[derive(Clone, Default)]
    struct SharedLog(Rc<RefCell<Vec<String>>>);

    struct LogWriter {
        log: SharedLog,
        buf: Vec<u8>,
    }

    impl Write for LogWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            let text = String::from_utf8_lossy(&self.buf).to_string();
            for line in text.lines() {
                self.log.0.borrow_mut().push(format!("out|{}", line));
            }
            self.buf.clear();
            Ok(())
        }
    }

    struct LogSink(SharedLog);

    impl ErrorSink for LogSink {
        fn print_error(&mut self, text: &str) -> Result<()> {
            self.0.0.borrow_mut().push(format!("err|{}", text));
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = EmitterSettings::default();
        assert_eq!(settings.iterations, 10);
        assert_eq!(settings.delay_ms, 300);
        assert!(settings.trailing_delay);
        assert_eq!(settings.min_emission_span().unwrap(), Duration::from_millis(2700));
        assert_eq!(settings.total_delay().unwrap(), Duration::from_millis(3000));
    }

    #[test]
    fn test_total_delay_without_trailing() {
        let settings = EmitterSettings {
            trailing_delay: false,
            ..EmitterSettings::default()
        };
        assert_eq!(settings.delay_count(), 9);
        assert_eq!(settings.total_delay().unwrap(), Duration::from_millis(2700));
    }

    #[test]
    fn test_huge_run_time_is_an_error() {
        let settings = EmitterSettings {
            iterations: u32::MAX,
            delay_ms: u64::MAX,
            trailing_delay: true,
        };
        assert!(settings.total_delay().is_err());
        let err = settings.min_emission_span().unwrap_err();
        assert!(err.to_string().contains("too long"), "{}", err);
    }

    #[test]
    fn test_zero_iterations() {
        let settings = quick(0);
        assert_eq!(settings.delay_count(), 0);
        assert_eq!(settings.min_emission_span().unwrap(), Duration::ZERO);

        let mut emitter = Emitter::new(settings, Vec::new(), WriterSink::new(Vec::new()));
        emitter.run().unwrap();
        let (out, err) = emitter.into_parts();
        assert!(out.is_empty());
        assert!(err.into_inner().is_empty());
    }

    #[test]
    fn test_run_writes_both_channels() {
        let mut emitter = Emitter::new(quick(10), Vec::new(), WriterSink::new(Vec::new()));
        emitter.run().unwrap();
        let (out, err) = emitter.into_parts();

        let out = String::from_utf8(out).unwrap();
        let err = String::from_utf8(err.into_inner()).unwrap();
        let expected_out: Vec<String> = (1..=10).map(EmitterSettings::stdout_line).collect();
        let expected_err: Vec<String> = (1..=10).map(EmitterSettings::stderr_line).collect();

        assert_eq!(out.lines().collect::<Vec<_>>(), expected_out);
        assert_eq!(err.lines().collect::<Vec<_>>(), expected_err);
        assert!(out.ends_with('\n'));
        assert!(err.ends_with('\n'));
    }

    #[test]
    fn test_run_pairs_stdout_before_stderr() {
        let log = SharedLog::default();
        let writer = LogWriter {
            log: log.clone(),
            buf: Vec::new(),
        };
        let mut emitter = Emitter::new(quick(3), writer, LogSink(log.clone()));
        emitter.run().unwrap();

        let entries = log.0.borrow().clone();
        assert_eq!(
            entries,
            vec![
                "out|stdout: 1",
                "err|stderr: 1",
                "out|stdout: 2",
                "err|stderr: 2",
                "out|stdout: 3",
                "err|stderr: 3",
            ]
        );
    }

    #[test]
    fn test_run_sleeps_between_iterations() {
        let settings = EmitterSettings {
            iterations: 3,
            delay_ms: 20,
            trailing_delay: false,
        };
        let mut emitter = Emitter::new(settings, io::sink(), WriterSink::new(io::sink()));
        let start = Instant::now();
        emitter.run().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_broken_stdout_aborts_run() {
        let mut emitter = Emitter::new(quick(5), BrokenPipe, WriterSink::new(Vec::new()));
        let err = emitter.run().unwrap_err();
        assert!(format!("{:#}", err).contains("stdout line 1"));

        // Nothing reaches stderr once stdout fails
        let (_, err_sink) = emitter.into_parts();
        assert!(err_sink.into_inner().is_empty());
    }

    #[test]
    fn test_broken_stderr_aborts_run() {
        let mut emitter = Emitter::new(quick(5), Vec::new(), WriterSink::new(BrokenPipe));
        assert!(emitter.run().is_err());

        let (out, _) = emitter.into_parts();
        assert_eq!(String::from_utf8(out).unwrap(), "stdout: 1\n");
    }
}
