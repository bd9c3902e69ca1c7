//! Fuzzer module - job scheduling, payload mutation and concurrent dispatch
//!
//! A run turns a wordlist plus recursive discoveries into an ordered stream
//! of payload-substituted requests, dispatched across a worker pool and
//! classified by a matcher and filter.

mod dictionary;
mod encoding;
mod engine;
mod jobs;
mod matcher;
mod mutator;
mod payload;
mod results;
mod scanners;
mod template;
mod wordlist;

pub use dictionary::Dictionary;
pub use encoding::{Encoder, PayloadEncoding};
pub use engine::{
    error_policy, ErrorAction, ErrorCallback, FuzzReport, Fuzzer, FuzzerConfig, FuzzerState,
    NullSink, RequestFailure, ResultSink, RunOutcome, StopHandle,
};
pub use jobs::{JobManager, JobProvider, Promotion, WORDLIST_JOB};
pub use matcher::{Comparator, CompareOp, Filter, LegacyBaseline, Matcher, StatusRange};
pub use mutator::{MutationConfig, Mutator};
pub use payload::{CaseTransform, Mutation, Payload, PayloadSummary};
pub use results::{FuzzResult, FuzzResultSet};
pub use scanners::{scanner_from_name, Scanner, ScannerContext, ScannerResult, SCANNERS};
pub use template::{RequestTemplate, DEFAULT_MARKER};
pub use wordlist::{wordlist_from_spec, BuiltinWordlist, WordlistSource};

use std::time::Instant;

/// Fuzzer statistics
#[derive(Debug, Clone, Default)]
pub struct FuzzerStats {
    /// Requests completed, including failed ones
    pub requests_sent: usize,
    /// Requests scheduled so far across every job and method
    pub requests_total: usize,
    /// Requests per second
    pub requests_per_second: f64,
    /// Transport errors encountered
    pub errors: usize,
    /// Results dropped by the filter
    pub filtered: usize,
    /// Results accepted by the matcher
    pub matched: usize,
    /// Jobs run, the wordlist job included
    pub jobs_run: usize,
    /// Provider payloads promoted into new jobs
    pub promoted: usize,
    /// Provider payloads discarded past the recursion limit
    pub dropped_beyond_depth: usize,
    /// Start time
    pub start_time: Option<Instant>,
    /// Elapsed time in milliseconds
    pub elapsed_ms: u64,
}

impl FuzzerStats {
    pub fn progress(&self) -> f64 {
        if self.requests_total == 0 {
            0.0
        } else {
            self.requests_sent as f64 / self.requests_total as f64
        }
    }

    /// Count one completed request and refresh the rate
    fn record_sent(&mut self) {
        self.requests_sent += 1;
        self.refresh();
    }

    fn refresh(&mut self) {
        if let Some(start_time) = self.start_time {
            self.elapsed_ms = start_time.elapsed().as_millis() as u64;
            if self.elapsed_ms > 0 {
                self.requests_per_second =
                    self.requests_sent as f64 / (self.elapsed_ms as f64 / 1000.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress() {
        let mut stats = FuzzerStats::default();
        assert_eq!(stats.progress(), 0.0);

        stats.requests_total = 4;
        stats.record_sent();
        assert_eq!(stats.progress(), 0.25);
    }
}
