//! Fuzzing result collection

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::payload::{Payload, PayloadSummary};
use super::scanners::ScannerResult;
use crate::http::Response;

/// Single fuzzing result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzResult {
    /// Request index, assigned at dispatch time
    pub request_num: usize,
    /// Label of the job the payload came from
    pub job: String,
    /// HTTP method sent
    pub method: String,
    /// URL sent
    pub url: String,
    /// Payload used for every marked field
    pub payload: PayloadSummary,
    /// HTTP status code
    pub status_code: u16,
    /// Response length in bytes
    pub response_length: usize,
    /// Whitespace-delimited words in the body
    pub word_count: usize,
    /// Newlines in the body
    pub line_count: usize,
    /// Time spent rendering the request
    pub build_time: Duration,
    /// Time spent waiting on the transport
    pub response_time: Duration,
    /// Response body (truncated)
    pub response_body: String,
    /// Response headers
    pub response_headers: HashMap<String, String>,
    /// Whether the matcher accepted this result
    pub matched: bool,
    /// Auxiliary findings keyed by scanner name
    pub scanners_res: BTreeMap<String, ScannerResult>,
    /// Error message if request failed
    pub error: Option<String>,
}

impl FuzzResult {
    pub fn new(request_num: usize, job: &str, method: &str, url: &str) -> Self {
        Self {
            request_num,
            job: job.to_string(),
            method: method.to_string(),
            url: url.to_string(),
            payload: PayloadSummary::default(),
            status_code: 0,
            response_length: 0,
            word_count: 0,
            line_count: 0,
            build_time: Duration::ZERO,
            response_time: Duration::ZERO,
            response_body: String::new(),
            response_headers: HashMap::new(),
            matched: false,
            scanners_res: BTreeMap::new(),
            error: None,
        }
    }

    pub fn with_payload(mut self, payload: &Payload) -> Self {
        self.payload = payload.summary();
        self
    }

    pub fn with_build_time(mut self, build_time: Duration) -> Self {
        self.build_time = build_time;
        self
    }

    /// Copy metrics and the whole body from the response
    pub fn with_response(mut self, response: &Response) -> Self {
        self.status_code = response.status;
        self.response_length = response.size();
        self.word_count = response.word_count();
        self.line_count = response.line_count();
        self.response_time = response.elapsed;
        self.response_headers = response.headers.clone();
        self.response_body = response.body_text();
        self
    }

    /// Cut the kept body to at most `max_body` bytes
    pub fn truncate_body(&mut self, max_body: usize) {
        if self.response_body.len() <= max_body {
            return;
        }
        // Find safe char boundary
        let mut end = max_body;
        while end > 0 && !self.response_body.is_char_boundary(end) {
            end -= 1;
        }
        self.response_body.truncate(end);
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    /// Total time spent on this request
    pub fn elapsed(&self) -> Duration {
        self.build_time + self.response_time
    }
}

/// Matched results plus distribution of everything seen
#[derive(Debug, Clone, Default)]
pub struct FuzzResultSet {
    /// Matched results, in completion order
    pub results: Vec<FuzzResult>,
    /// Requests the transport could not complete
    pub failures: Vec<FuzzResult>,
    /// Status code distribution over every completed request
    pub status_distribution: HashMap<u16, usize>,
}

impl FuzzResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a completed request
    pub fn observe(&mut self, status: u16) {
        *self.status_distribution.entry(status).or_insert(0) += 1;
    }

    pub fn add_result(&mut self, result: FuzzResult) {
        self.results.push(result);
    }

    pub fn add_failure(&mut self, result: FuzzResult) {
        self.failures.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results in dispatch order
    #[cfg(test)]
    pub fn sorted_by_index(&self) -> Vec<&FuzzResult> {
        let mut results: Vec<_> = self.results.iter().collect();
        results.sort_by_key(|r| r.request_num);
        results
    }

    /// Consume the set, returning matched and failed requests in dispatch order
    pub fn into_sorted(mut self) -> (Vec<FuzzResult>, Vec<FuzzResult>) {
        self.results.sort_by_key(|r| r.request_num);
        self.failures.sort_by_key(|r| r.request_num);
        (self.results, self.failures)
    }
}
