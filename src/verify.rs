//! Checks a followed emitter run against the fixture's guarantees

use lazy_regex::regex_captures;
use serde::Serialize;
use std::time::Duration;

use crate::emitter::EmitterSettings;
use crate::process::{FollowOutcome, Stream};

/// Pipe reads of the first and last line can be skewed by scheduler jitter
const TIMING_SLACK: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub iterations: u32,
    pub delay_ms: u64,
    pub exit_code: Option<i32>,
    pub duration_ms: u128,
    pub checks: Vec<Check>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }

    #[cfg(test)]
    pub fn check(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Index carried by a well-formed line, `None` for anything else
pub fn parse_index(stream: Stream, line: &str) -> Option<u32> {
    let captured = match stream {
        Stream::Stdout => regex_captures!(r"^stdout: ([1-9][0-9]*)$", line),
        Stream::Stderr => regex_captures!(r"^stderr: ([1-9][0-9]*)$", line),
    };
    captured.and_then(|(_, n)| n.parse().ok())
}

pub fn verify_transcript(outcome: &FollowOutcome, settings: &EmitterSettings) -> VerifyReport {
    let checks = vec![
        check_line_count(outcome, settings),
        check_format(outcome),
        check_monotonic(outcome, settings),
        check_pair_order(outcome, settings),
        check_timing(outcome, settings),
        check_exit(outcome),
    ];

    VerifyReport {
        iterations: settings.iterations,
        delay_ms: settings.delay_ms,
        exit_code: outcome.exit_code,
        duration_ms: outcome.duration.as_millis(),
        checks,
    }
}

fn check_line_count(outcome: &FollowOutcome, settings: &EmitterSettings) -> Check {
    let out = outcome.lines_of(Stream::Stdout).count();
    let err = outcome.lines_of(Stream::Stderr).count();
    let expected = settings.iterations as usize;
    Check::new(
        "line-count",
        out == expected && err == expected,
        format!("{} stdout, {} stderr, expected {} each", out, err, expected),
    )
}

fn check_format(outcome: &FollowOutcome) -> Check {
    let bad: Vec<String> = outcome
        .lines
        .iter()
        .filter(|l| parse_index(l.stream, &l.line).is_none())
        .map(|l| format!("{}: {:?}", l.stream, l.line))
        .collect();

    if bad.is_empty() {
        Check::new("format", true, "all lines well-formed")
    } else {
        Check::new("format", false, format!("malformed: {}", bad.join(", ")))
    }
}

fn check_monotonic(outcome: &FollowOutcome, settings: &EmitterSettings) -> Check {
    let expected: Vec<u32> = (1..=settings.iterations).collect();

    for stream in [Stream::Stdout, Stream::Stderr] {
        let seen: Vec<u32> = outcome
            .lines_of(stream)
            .filter_map(|l| parse_index(stream, &l.line))
            .collect();
        if seen != expected {
            return Check::new("monotonic", false, format!("{} indices were {:?}", stream, seen));
        }
    }

    Check::new("monotonic", true, format!("both streams count 1..={}", settings.iterations))
}

fn check_pair_order(outcome: &FollowOutcome, settings: &EmitterSettings) -> Check {
    let position = |stream: Stream, i: u32| {
        outcome
            .lines
            .iter()
            .position(|l| l.stream == stream && parse_index(stream, &l.line) == Some(i))
    };

    for i in 1..=settings.iterations {
        match (position(Stream::Stdout, i), position(Stream::Stderr, i)) {
            (Some(out), Some(err)) if out < err => {}
            (Some(_), Some(_)) => {
                return Check::new("pair-order", false, format!("stderr: {} arrived before stdout: {}", i, i));
            }
            _ => return Check::new("pair-order", false, format!("pair {} incomplete", i)),
        }
    }

    Check::new("pair-order", true, "stdout line precedes stderr line in every pair")
}

fn check_timing(outcome: &FollowOutcome, settings: &EmitterSettings) -> Check {
    let minimum = match settings.min_emission_span() {
        Ok(minimum) => minimum,
        Err(e) => return Check::new("timing", false, e.to_string()),
    };
    let (Some(first), Some(last)) = (outcome.lines.first(), outcome.lines.last()) else {
        return Check::new("timing", minimum.is_zero(), "no lines received");
    };

    let span = last.elapsed.saturating_sub(first.elapsed);
    Check::new(
        "timing",
        span + TIMING_SLACK >= minimum,
        format!("first to last line took {:?}, minimum {:?}", span, minimum),
    )
}

fn check_exit(outcome: &FollowOutcome) -> Check {
    let detail = match outcome.exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };
    Check::new("exit-status", outcome.success(), detail)
}
