//! Scanners inspect matched results and may feed payloads back as new jobs

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::jobs::JobProvider;
use super::payload::Payload;
use super::results::FuzzResult;
use crate::error::ConfigError;

/// Auxiliary findings from one scanner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerResult {
    pub findings: Vec<String>,
    /// Payloads pushed to the scanner's job provider
    pub enqueued: usize,
}

impl ScannerResult {
    pub fn finding(text: impl Into<String>) -> Self {
        Self {
            findings: vec![text.into()],
            enqueued: 0,
        }
    }
}

/// Capability interface for result scanners
pub trait Scanner: Send + Sync {
    fn name(&self) -> &str;

    /// Inspect a matched result; `None` means nothing to report
    fn scan(&self, result: &FuzzResult, payload: &Payload) -> Option<ScannerResult>;

    /// Queue this scanner feeds, if it drives recursion
    fn provider(&self) -> Option<&JobProvider> {
        None
    }
}

/// Inputs scanners may need at construction
#[derive(Debug, Clone, Default)]
pub struct ScannerContext {
    /// Base wordlist, re-used for every discovered directory
    pub wordlist: Arc<Vec<String>>,
    /// Header names the header scanner records
    pub headers: Vec<String>,
}

/// Names accepted by `scanner_from_name`
pub const SCANNERS: &[&str] = &["recursion", "reflection", "headers"];

/// Build a scanner from its configured name
pub fn scanner_from_name(name: &str, context: &ScannerContext) -> Result<Arc<dyn Scanner>, ConfigError> {
    match name.trim().to_lowercase().as_str() {
        "recursion" => Ok(Arc::new(RecursionScanner::new(context.wordlist.clone()))),
        "reflection" => Ok(Arc::new(ReflectionScanner)),
        "headers" => Ok(Arc::new(HeaderScanner::new(context.headers.clone()))),
        _ => Err(ConfigError::UnknownScanner(name.to_string())),
    }
}

/// Directory discovery: every found directory gets the whole wordlist appended
pub struct RecursionScanner {
    provider: JobProvider,
    wordlist: Arc<Vec<String>>,
}

impl RecursionScanner {
    pub fn new(wordlist: Arc<Vec<String>>) -> Self {
        Self {
            provider: JobProvider::new("recursion"),
            wordlist,
        }
    }

    fn looks_like_directory(result: &FuzzResult, value: &str) -> bool {
        if !(200..400).contains(&result.status_code) || value.trim_matches('/').is_empty() {
            return false;
        }
        let last = value.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        !last.contains('.')
    }
}

impl Scanner for RecursionScanner {
    fn name(&self) -> &str {
        "recursion"
    }

    fn scan(&self, result: &FuzzResult, payload: &Payload) -> Option<ScannerResult> {
        let value = payload.value();
        if !Self::looks_like_directory(result, value) {
            return None;
        }

        let base = value.trim_end_matches('/');
        let level = payload.recursion_level();
        self.provider.extend(
            self.wordlist
                .iter()
                .map(|word| Payload::derived(format!("{}/{}", base, word), level)),
        );

        tracing::debug!(directory = base, level = level + 1, "Queued recursive payloads");
        Some(ScannerResult {
            findings: vec![format!("directory: {}", base)],
            enqueued: self.wordlist.len(),
        })
    }

    fn provider(&self) -> Option<&JobProvider> {
        Some(&self.provider)
    }
}

/// Reports payloads echoed back verbatim in the body
pub struct ReflectionScanner;

impl Scanner for ReflectionScanner {
    fn name(&self) -> &str {
        "reflection"
    }

    fn scan(&self, result: &FuzzResult, payload: &Payload) -> Option<ScannerResult> {
        let value = payload.value();
        if value.is_empty() {
            return None;
        }
        let hits = result.response_body.matches(value).count();
        (hits > 0).then(|| ScannerResult::finding(format!("payload reflected {} time(s)", hits)))
    }
}

/// Records interesting response headers
pub struct HeaderScanner {
    headers: Vec<String>,
}

impl HeaderScanner {
    pub fn new(headers: Vec<String>) -> Self {
        let headers = if headers.is_empty() {
            vec!["server".into(), "x-powered-by".into(), "location".into()]
        } else {
            headers.into_iter().map(|h| h.to_lowercase()).collect()
        };
        Self { headers }
    }
}

impl Scanner for HeaderScanner {
    fn name(&self) -> &str {
        "headers"
    }

    fn scan(&self, result: &FuzzResult, _payload: &Payload) -> Option<ScannerResult> {
        let mut findings: Vec<String> = result
            .response_headers
            .iter()
            .filter(|(k, _)| self.headers.contains(&k.to_lowercase()))
            .map(|(k, v)| format!("{}: {}", k.to_lowercase(), v))
            .collect();
        findings.sort();

        (!findings.is_empty()).then(|| ScannerResult {
            findings,
            enqueued: 0,
        })
    }
}
