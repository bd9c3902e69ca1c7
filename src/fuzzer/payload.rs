//! Payload values tracked through mutation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::encoding::Encoder;
use crate::error::ConfigError;

/// Case transform applied to every payload variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseTransform {
    Upper,
    Lower,
    Capitalize,
}

impl CaseTransform {
    pub fn apply(&self, value: &str) -> String {
        match self {
            CaseTransform::Upper => value.to_uppercase(),
            CaseTransform::Lower => value.to_lowercase(),
            CaseTransform::Capitalize => {
                let mut chars = value.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                    None => String::new(),
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CaseTransform::Upper => "Upper",
            CaseTransform::Lower => "Lower",
            CaseTransform::Capitalize => "Capitalize",
        }
    }
}

impl FromStr for CaseTransform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upper" | "uppercase" => Ok(CaseTransform::Upper),
            "lower" | "lowercase" => Ok(CaseTransform::Lower),
            "capitalize" | "capital" => Ok(CaseTransform::Capitalize),
            _ => Err(ConfigError::InvalidCase(s.to_string())),
        }
    }
}

/// One applied mutation step
#[derive(Debug, Clone)]
pub enum Mutation {
    Prefix(String),
    Suffix(String),
    Case(CaseTransform),
    Encode(Encoder),
}

impl Mutation {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Mutation::Prefix(prefix) => format!("{}{}", prefix, value),
            Mutation::Suffix(suffix) => format!("{}{}", value, suffix),
            Mutation::Case(case) => case.apply(value),
            Mutation::Encode(encoder) => encoder.apply(value),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Prefix(_) => "prefix",
            Mutation::Suffix(_) => "suffix",
            Mutation::Case(_) => "case",
            Mutation::Encode(_) => "encode",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Prefix(p) | Mutation::Suffix(p) => write!(f, "{}: {:?}", self.kind(), p),
            Mutation::Case(case) => write!(f, "case: {}", case.name()),
            Mutation::Encode(encoder) => write!(f, "encode: {}", encoder.label()),
        }
    }
}

impl From<&str> for Payload {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Payload {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// A candidate string and the steps that produced its final form
#[derive(Debug, Clone)]
pub struct Payload {
    raw: String,
    value: String,
    recursion_level: usize,
    config: Vec<Mutation>,
}

impl Payload {
    /// Create a payload straight from a wordlist entry
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            value: raw.clone(),
            raw,
            recursion_level: 0,
            config: Vec::new(),
        }
    }

    /// Wrap a value discovered from a previous result one level deeper
    pub fn derived(value: impl Into<String>, parent_level: usize) -> Self {
        Self {
            recursion_level: parent_level + 1,
            ..Self::new(value)
        }
    }

    /// Clone this payload and extend it with one more step
    pub fn mutate(&self, mutation: Mutation) -> Self {
        let mut next = self.clone();
        next.value = mutation.apply(&self.value);
        next.config.push(mutation);
        debug_assert_eq!(next.replay(), next.value);
        next
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Current (mutated) value
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn recursion_level(&self) -> usize {
        self.recursion_level
    }

    pub fn config(&self) -> &[Mutation] {
        &self.config
    }

    /// Rebuild the final value from `raw` and the recorded steps
    pub fn replay(&self) -> String {
        self.config
            .iter()
            .fold(self.raw.clone(), |value, step| step.apply(&value))
    }

    /// Serializable snapshot for results and reports
    pub fn summary(&self) -> PayloadSummary {
        PayloadSummary {
            raw: self.raw.clone(),
            value: self.value.clone(),
            recursion_level: self.recursion_level,
            mutations: self.config.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Reporting view of a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSummary {
    pub raw: String,
    pub value: String,
    pub recursion_level: usize,
    pub mutations: Vec<String>,
}
