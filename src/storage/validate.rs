//! Checks an exported snapshot's raw text against per-field rules.
//!
//! Works on tokens, not on loader output, so format corruption such as a
//! missing `%` or a dropped key is caught. Every line must carry the five
//! keys in export order, exactly once. One run reports all problems.

use std::fmt;
use std::path::Path;

use tracing::{debug, error};

use crate::fmt::parse_percent;
use crate::storage::loader::KEYS;
use crate::storage::model::{ElapsedTime, PID_MAX, ProcessId};
use crate::util;

/// One failed check. `line` is 1-based, 0 for file-level problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub field: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.field, self.message)
    }
}

/// Aggregate result of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// AND of every individual check.
    pub passed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    fn new() -> Self {
        Self {
            passed: true,
            diagnostics: Vec::new(),
        }
    }

    fn fail(&mut self, line: usize, field: &str, message: String) {
        error!("validation failed on line {} field {}: {}", line, field, message);
        self.passed = false;
        self.diagnostics.push(Diagnostic {
            line,
            field: field.to_string(),
            message,
        });
    }

    /// Diagnostics raised for `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| d.field == field)
    }
}

/// The rule catalog, keyed by field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRule {
    Pid,
    Percent,
    Threads,
    Time,
}

impl FieldRule {
    fn for_name(name: &str) -> Option<Self> {
        match name {
            "Pid" => Some(FieldRule::Pid),
            "cpu" | "memory" => Some(FieldRule::Percent),
            "threads" => Some(FieldRule::Threads),
            "time" => Some(FieldRule::Time),
            _ => None,
        }
    }

    fn check(self, value: &str, thread_limit: Option<u64>) -> Result<(), String> {
        match self {
            FieldRule::Pid => {
                let pid: ProcessId = value
                    .parse()
                    .map_err(|_| format!("'{}' is not a process id", value))?;
                if !(1..=PID_MAX).contains(&pid) {
                    return Err(format!("{} outside [1, {}]", pid, PID_MAX));
                }
                Ok(())
            }
            FieldRule::Percent => {
                if !value.ends_with('%') {
                    return Err(format!("'{}' lacks the '%' terminator", value));
                }
                let percent = parse_percent(value)
                    .ok_or_else(|| format!("'{}' is not a percentage", value))?;
                if !(0.0..100.0).contains(&percent) {
                    return Err(format!("{} outside [0, 100)", percent));
                }
                Ok(())
            }
            FieldRule::Threads => {
                let threads: u64 = value
                    .parse()
                    .map_err(|_| format!("'{}' is not a thread count", value))?;
                match thread_limit {
                    Some(limit) if threads > limit => Err(format!(
                        "{} exceeds the per-user process limit {}",
                        threads, limit
                    )),
                    _ => Ok(()),
                }
            }
            FieldRule::Time => {
                let time: ElapsedTime = value.parse().map_err(|e| format!("{}", e))?;
                if time.is_zero() {
                    return Err("elapsed time is zero".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Validates exported snapshots.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    thread_limit: Option<u64>,
}

impl Validator {
    /// Uses the calling user's `RLIMIT_NPROC` as thread ceiling.
    pub fn new() -> Self {
        Self::with_thread_limit(util::max_user_processes())
    }

    /// `None` disables the thread ceiling.
    pub fn with_thread_limit(thread_limit: Option<u64>) -> Self {
        Self { thread_limit }
    }

    pub fn thread_limit(&self) -> Option<u64> {
        self.thread_limit
    }

    /// Validates a file. An unreadable file fails with a single diagnostic.
    pub fn validate_file(&self, path: impl AsRef<Path>) -> ValidationReport {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let report = self.validate_str(&content);
                debug!(
                    "validated {}: passed={} diagnostics={}",
                    path.display(),
                    report.passed,
                    report.diagnostics.len()
                );
                report
            }
            Err(e) => {
                let mut report = ValidationReport::new();
                report.fail(0, "file", format!("cannot open {}: {}", path.display(), e));
                report
            }
        }
    }

    /// Validates exported text.
    pub fn validate_str(&self, content: &str) -> ValidationReport {
        let mut report = ValidationReport::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            self.validate_line(index + 1, line, &mut report);
        }
        report
    }

    /// Checks key order and count, then every value against its rule.
    fn validate_line(&self, line_no: usize, line: &str, report: &mut ValidationReport) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut pairs = tokens.chunks(2);

        for (position, expected) in KEYS.iter().enumerate() {
            let Some(pair) = pairs.next() else {
                report.fail(line_no, expected, "missing".to_string());
                continue;
            };
            let key = pair[0];
            let Some(name) = key.strip_suffix(':') else {
                report.fail(line_no, key, "key lacks its ':' separator".to_string());
                continue;
            };
            if name != *expected {
                report.fail(
                    line_no,
                    expected,
                    format!("expected at position {}, found '{}'", position + 1, name),
                );
                continue;
            }
            let Some(value) = pair.get(1) else {
                report.fail(line_no, name, "missing value".to_string());
                continue;
            };
            if let Some(rule) = FieldRule::for_name(name) {
                if let Err(message) = rule.check(value, self.thread_limit) {
                    report.fail(line_no, name, message);
                }
            }
        }

        for pair in pairs {
            let name = pair[0].strip_suffix(':').unwrap_or(pair[0]);
            let message = if FieldRule::for_name(name).is_some() {
                "repeated field"
            } else {
                "unknown field"
            };
            report.fail(line_no, name, message.to_string());
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates `path` with the platform thread limit.
pub fn validate_exported_file(path: impl AsRef<Path>) -> ValidationReport {
    Validator::new().validate_file(path)
}
