//! Match and filter decisions for fuzz results
//!
//! Everything that can fail to parse (regexes, comparator thresholds, status
//! specs) is compiled when the matcher or filter is built, never per result.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;

use super::results::FuzzResult;
use crate::error::ConfigError;

/// Numeric comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    pub fn apply(&self, observed: f64, threshold: f64) -> bool {
        match self {
            CompareOp::Gt => observed > threshold,
            CompareOp::Ge => observed >= threshold,
            CompareOp::Lt => observed < threshold,
            CompareOp::Le => observed <= threshold,
            CompareOp::Eq => observed == threshold,
            CompareOp::Ne => observed != threshold,
        }
    }
}

/// Two-character operators must be tried before their one-character prefixes
const OPERATORS: &[(&str, CompareOp)] = &[
    (">=", CompareOp::Ge),
    ("<=", CompareOp::Le),
    ("==", CompareOp::Eq),
    ("!=", CompareOp::Ne),
    (">", CompareOp::Gt),
    ("<", CompareOp::Lt),
];

/// `(operator, threshold)` pair such as `>=1500`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparator {
    pub op: CompareOp,
    pub threshold: f64,
}

impl Comparator {
    /// Parse a comparator; `name` identifies it in errors
    pub fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        let (op, rest) = OPERATORS
            .iter()
            .find_map(|(symbol, op)| trimmed.strip_prefix(symbol).map(|rest| (*op, rest)))
            .unwrap_or((CompareOp::Gt, trimmed));

        let threshold: f64 = rest.trim().parse().map_err(|_| ConfigError::InvalidComparator {
            name: name.to_string(),
            value: value.to_string(),
        })?;

        if !threshold.is_finite() {
            return Err(ConfigError::InvalidComparator {
                name: name.to_string(),
                value: value.to_string(),
            });
        }

        Ok(Self { op, threshold })
    }

    pub fn passes(&self, observed: f64) -> bool {
        self.op.apply(observed, self.threshold)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.threshold)
    }
}

/// Inclusive status range; bounds given in the wrong order are swapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRange {
    pub min: u16,
    pub max: u16,
}

impl StatusRange {
    pub fn new(a: u16, b: u16) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(&self, status: u16) -> bool {
        (self.min..=self.max).contains(&status)
    }
}

impl FromStr for StatusRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidStatus(s.to_string());
        let (a, b) = s.split_once('-').ok_or_else(invalid)?;
        let a = a.trim().parse().map_err(|_| invalid())?;
        let b = b.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(a, b))
    }
}

/// Parse a comma separated list of codes and `a-b` ranges
pub fn parse_status_spec(spec: &str) -> Result<(Vec<u16>, Vec<StatusRange>), ConfigError> {
    let mut codes = Vec::new();
    let mut ranges = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.contains('-') {
            ranges.push(part.parse()?);
        } else {
            codes.push(
                part.parse()
                    .map_err(|_| ConfigError::InvalidStatus(part.to_string()))?,
            );
        }
    }
    Ok((codes, ranges))
}

/// Baseline used by the opt-in legacy delta check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyBaseline {
    pub size: usize,
    pub time: Duration,
}

impl LegacyBaseline {
    pub const SIZE_DELTA: usize = 300;
    pub const TIME_DELTA: Duration = Duration::from_secs(5);

    fn passes(&self, result: &FuzzResult) -> bool {
        result.status_code < 400
            && (result.response_length > self.size + Self::SIZE_DELTA
                || result.response_time > self.time + Self::TIME_DELTA)
    }
}

/// Positive match rule
#[derive(Debug, Clone)]
pub struct Matcher {
    codes: BTreeSet<u16>,
    ranges: Vec<StatusRange>,
    time: Option<Comparator>,
    size: Option<Comparator>,
    words: Option<Comparator>,
    lines: Option<Comparator>,
    regex: Option<Regex>,
    legacy: Option<LegacyBaseline>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    /// Matches status 200 and nothing else until configured
    pub fn new() -> Self {
        Self {
            codes: BTreeSet::new(),
            ranges: Vec::new(),
            time: None,
            size: None,
            words: None,
            lines: None,
            regex: None,
            legacy: None,
        }
    }

    /// Add codes and ranges from a spec such as `200,301-302`
    pub fn with_status_spec(mut self, spec: &str) -> Result<Self, ConfigError> {
        let (codes, ranges) = parse_status_spec(spec)?;
        self.codes.extend(codes);
        self.ranges.extend(ranges);
        Ok(self)
    }

    /// Elapsed response time, in seconds
    pub fn with_time(mut self, spec: &str) -> Result<Self, ConfigError> {
        self.time = Some(Comparator::parse("time", spec)?);
        Ok(self)
    }

    pub fn with_size(mut self, spec: &str) -> Result<Self, ConfigError> {
        self.size = Some(Comparator::parse("size", spec)?);
        Ok(self)
    }

    pub fn with_words(mut self, spec: &str) -> Result<Self, ConfigError> {
        self.words = Some(Comparator::parse("words", spec)?);
        Ok(self)
    }

    pub fn with_lines(mut self, spec: &str) -> Result<Self, ConfigError> {
        self.lines = Some(Comparator::parse("lines", spec)?);
        Ok(self)
    }

    pub fn with_regex(mut self, pattern: &str) -> Result<Self, ConfigError> {
        let regex =
            Regex::new(pattern).map_err(|e| ConfigError::invalid_regex("matcher", pattern, &e))?;
        self.regex = Some(regex);
        Ok(self)
    }

    pub fn with_legacy_baseline(mut self, baseline: LegacyBaseline) -> Self {
        self.legacy = Some(baseline);
        self
    }

    pub fn status_matches(&self, status: u16) -> bool {
        if self.codes.is_empty() && self.ranges.is_empty() {
            return status == 200;
        }
        self.codes.contains(&status) || self.ranges.iter().any(|r| r.contains(status))
    }

    pub fn is_match(&self, result: &FuzzResult) -> bool {
        if !self.status_matches(result.status_code) {
            return false;
        }

        let checks = [
            (self.time, result.response_time.as_secs_f64()),
            (self.size, result.response_length as f64),
            (self.words, result.word_count as f64),
            (self.lines, result.line_count as f64),
        ];
        if checks
            .iter()
            .any(|(cmp, observed)| cmp.is_some_and(|c| !c.passes(*observed)))
        {
            return false;
        }

        if let Some(legacy) = &self.legacy {
            if !legacy.passes(result) {
                return false;
            }
        }

        match &self.regex {
            Some(regex) => regex.is_match(&result.response_body),
            None => true,
        }
    }
}

/// Negative exclusion rule
#[derive(Debug, Clone, Default)]
pub struct Filter {
    status: Option<u16>,
    regex: Option<Regex>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_status_str(self, status: &str) -> Result<Self, ConfigError> {
        let code = status
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidStatus(status.to_string()))?;
        Ok(self.with_status(code))
    }

    pub fn with_regex(mut self, pattern: &str) -> Result<Self, ConfigError> {
        let regex =
            Regex::new(pattern).map_err(|e| ConfigError::invalid_regex("filter", pattern, &e))?;
        self.regex = Some(regex);
        Ok(self)
    }

    /// `true` keeps the result, `false` drops it
    pub fn check(&self, result: &FuzzResult) -> bool {
        if self.status == Some(result.status_code) {
            return false;
        }
        match &self.regex {
            Some(regex) => !regex.is_match(&result.response_body),
            None => true,
        }
    }
}
