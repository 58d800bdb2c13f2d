//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of `/proc` files into
//! structured data. They are designed to be easily testable with string inputs.

use std::collections::BTreeMap;

use crate::collector::procfs::process::CollectError;
use crate::storage::model::ProcessId;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// The `/proc/[pid]/stat` positions the metric calculator consumes (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatField {
    /// Field 14 (utime): user-mode clock ticks.
    UserTicks,
    /// Field 15 (stime): kernel-mode clock ticks.
    KernelTicks,
    /// Field 20 (num_threads).
    ThreadCount,
    /// Field 22 (starttime): clock ticks after boot at which the process started.
    StartTicks,
    /// Field 24 (rss): resident pages.
    ResidentPages,
}

impl StatField {
    pub const ALL: [StatField; 5] = [
        StatField::UserTicks,
        StatField::KernelTicks,
        StatField::ThreadCount,
        StatField::StartTicks,
        StatField::ResidentPages,
    ];

    /// 1-based position in the stat line.
    pub fn position(self) -> usize {
        match self {
            StatField::UserTicks => 14,
            StatField::KernelTicks => 15,
            StatField::ThreadCount => 20,
            StatField::StartTicks => 22,
            StatField::ResidentPages => 24,
        }
    }

    pub fn from_position(position: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.position() == position)
    }

    pub fn name(self) -> &'static str {
        match self {
            StatField::UserTicks => "utime",
            StatField::KernelTicks => "stime",
            StatField::ThreadCount => "num_threads",
            StatField::StartTicks => "starttime",
            StatField::ResidentPages => "rss",
        }
    }
}

/// Raw tokens of the tracked stat positions for one process.
///
/// Transient: lives only while one `ProcessMetrics` is computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatFields {
    fields: BTreeMap<StatField, String>,
}

impl RawStatFields {
    /// Number of positions a complete record carries.
    pub const TRACKED: usize = StatField::ALL.len();

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: StatField, token: impl Into<String>) {
        self.fields.insert(field, token.into());
    }

    pub fn get(&self, field: StatField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.fields.len() == Self::TRACKED
    }

    /// Parses a tracked field as an unsigned counter.
    pub fn counter(&self, field: StatField) -> Result<u64, CollectError> {
        let token = self.get(field).ok_or_else(|| {
            CollectError::Unexpected(format!("stat field {} missing", field.name()))
        })?;
        token.parse().map_err(|_| {
            CollectError::Unexpected(format!(
                "stat field {} is not a counter: '{}'",
                field.name(),
                token
            ))
        })
    }
}

/// Why a stat line could not be turned into [`RawStatFields`].
#[derive(Debug, Clone, PartialEq)]
pub enum StatParseError {
    /// No parenthesised executable name could be located.
    Malformed(String),
    /// Some tracked positions are missing.
    Incomplete { found: usize },
}

impl StatParseError {
    /// Attaches the process id, producing a (moderate) collection error.
    pub fn for_pid(self, pid: ProcessId) -> CollectError {
        match self {
            StatParseError::Malformed(reason) => CollectError::MalformedStat { pid, reason },
            StatParseError::Incomplete { found } => CollectError::IncompleteStat { pid, found },
        }
    }
}

/// Extracts the tracked positions from one `/proc/[pid]/stat` line.
///
/// The executable name (field 2) is wrapped in parentheses and may contain
/// spaces or parentheses itself, so counting starts after the *last* `)`:
/// the token following it is field 3.
pub fn parse_stat_fields(line: &str) -> Result<RawStatFields, StatParseError> {
    let line = line.trim();

    let open_paren = line
        .find('(')
        .ok_or_else(|| StatParseError::Malformed("missing '(' in stat".to_string()))?;
    let close_paren = line
        .rfind(')')
        .ok_or_else(|| StatParseError::Malformed("missing ')' in stat".to_string()))?;

    if close_paren <= open_paren {
        return Err(StatParseError::Malformed(
            "invalid parentheses in stat".to_string(),
        ));
    }

    let mut fields = RawStatFields::new();
    for (index, token) in line[close_paren + 1..].split_whitespace().enumerate() {
        if let Some(field) = StatField::from_position(index + 3) {
            fields.insert(field, token);
        }
    }

    if !fields.is_complete() {
        return Err(StatParseError::Incomplete {
            found: fields.len(),
        });
    }

    Ok(fields)
}

/// Parses `/proc/uptime`: the first token is seconds since boot.
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    let token = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?;
    let uptime: f64 = token
        .parse()
        .map_err(|_| ParseError::new(format!("invalid uptime '{}'", token)))?;
    if !uptime.is_finite() || uptime <= 0.0 {
        return Err(ParseError::new(format!("implausible uptime {}", uptime)));
    }
    Ok(uptime)
}

/// Parses `/proc/meminfo` and returns `MemTotal` in kB.
///
/// Uses the first line that contains `MemTotal` and its first numeric token.
pub fn parse_mem_total(content: &str) -> Result<f64, ParseError> {
    let line = content
        .lines()
        .find(|line| line.contains("MemTotal"))
        .ok_or_else(|| ParseError::new("MemTotal not found"))?;

    let total: f64 = line
        .split_whitespace()
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| ParseError::new(format!("no numeric value in '{}'", line.trim())))?;

    if total <= 0.0 {
        return Err(ParseError::new("MemTotal is zero"));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_STAT: &str = "666 (dummy) S 1 666 666 0 -1 4194560 2271 2377 16 141 125 954 0 0 20 0 3 0 4685 328105984 1696 18446744073709551615 1 1 0 0 0 0 0 4096 0 0 0 0 17 1 0 0 0 0 0 0 0 0 0 0 0 0 0";

    #[test]
    fn test_parse_stat_fields_reference() {
        let fields = parse_stat_fields(REFERENCE_STAT).unwrap();

        assert_eq!(fields.len(), 5);
        assert_eq!(fields.get(StatField::UserTicks), Some("125"));
        assert_eq!(fields.get(StatField::KernelTicks), Some("954"));
        assert_eq!(fields.get(StatField::ThreadCount), Some("3"));
        assert_eq!(fields.get(StatField::StartTicks), Some("4685"));
        assert_eq!(fields.get(StatField::ResidentPages), Some("1696"));
    }

    #[test]
    fn test_parse_stat_fields_with_spaces_in_comm() {
        let content = "5000 (Web Content) S 4999 5000 4999 0 -1 4194304 100000 0 500 0 5000 1000 0 0 20 0 20 0 500000 2000000000 50000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0";
        let fields = parse_stat_fields(content).unwrap();

        assert_eq!(fields.get(StatField::UserTicks), Some("5000"));
        assert_eq!(fields.get(StatField::KernelTicks), Some("1000"));
        assert_eq!(fields.get(StatField::ThreadCount), Some("20"));
        assert_eq!(fields.get(StatField::StartTicks), Some("500000"));
        assert_eq!(fields.get(StatField::ResidentPages), Some("50000"));
    }

    #[test]
    fn test_parse_stat_fields_with_parentheses_in_comm() {
        let content = "5001 (test (1) x) S 1 5001 5001 0 -1 4194304 1000 0 0 0 10 5 0 0 20 0 1 0 500100 10000000 1000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0";
        let fields = parse_stat_fields(content).unwrap();

        assert_eq!(fields.get(StatField::UserTicks), Some("10"));
        assert_eq!(fields.get(StatField::StartTicks), Some("500100"));
    }

    #[test]
    fn test_parse_stat_fields_truncated() {
        let content = "42 (short) S 1 42 42 0 -1 0 0 0 0 0 7 8 0 0 20 0 1";
        let err = parse_stat_fields(content).unwrap_err();
        assert_eq!(err, StatParseError::Incomplete { found: 3 });
    }

    #[test]
    fn test_parse_stat_fields_without_parentheses() {
        let err = parse_stat_fields("42 short S 1").unwrap_err();
        assert!(matches!(err, StatParseError::Malformed(_)));
        assert!(matches!(
            err.for_pid(42),
            CollectError::MalformedStat { pid: 42, .. }
        ));
    }

    #[test]
    fn test_counter_rejects_garbage() {
        let mut fields = RawStatFields::new();
        fields.insert(StatField::UserTicks, "12x");
        assert!(matches!(
            fields.counter(StatField::UserTicks),
            Err(CollectError::Unexpected(_))
        ));
        assert!(matches!(
            fields.counter(StatField::KernelTicks),
            Err(CollectError::Unexpected(_))
        ));
    }

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("5689.13 21013.48\n").unwrap(), 5689.13);
        assert_eq!(parse_uptime("42.5").unwrap(), 42.5);
        assert!(parse_uptime("").is_err());
        assert!(parse_uptime("abc 1.0").is_err());
        assert!(parse_uptime("0.00 0.00").is_err());
    }

    #[test]
    fn test_parse_mem_total() {
        let content = "\
MemTotal:        8131976 kB
MemFree:         1234567 kB
MemAvailable:    4567890 kB
";
        assert_eq!(parse_mem_total(content).unwrap(), 8131976.0);
    }

    #[test]
    fn test_parse_mem_total_missing() {
        assert!(parse_mem_total("MemFree: 1 kB\n").is_err());
        assert!(parse_mem_total("MemTotal: kB\n").is_err());
        assert!(parse_mem_total("").is_err());
    }
}
