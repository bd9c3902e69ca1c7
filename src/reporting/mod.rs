//! Report Generation Module
//!
//! Turns the outcome of a run into a persisted report:
//! - TXT (one line per matched result)
//! - JSON (machine-readable)
//! - CSV (spreadsheet-compatible)
//!
//! Also provides the console sink that streams matches while a run is live.

pub mod formats;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::fuzzer::{FuzzReport, FuzzResult, ResultSink, RunOutcome};

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Unique id of the run
    pub run_id: Uuid,
    /// Target URL template
    pub target: String,
    /// Run start time
    pub start_time: DateTime<Utc>,
    /// Run end time
    pub end_time: DateTime<Utc>,
    /// How the run ended
    pub outcome: String,
    /// Tool version
    pub version: String,
}

impl ReportMetadata {
    pub fn new(target: &str, start_time: DateTime<Utc>, outcome: &RunOutcome) -> Self {
        let outcome = match outcome {
            RunOutcome::Completed => "completed".to_string(),
            RunOutcome::Cancelled => "cancelled".to_string(),
            RunOutcome::Aborted(reason) => format!("aborted: {}", reason),
        };
        Self {
            run_id: Uuid::new_v4(),
            target: target.to_string(),
            start_time,
            end_time: Utc::now(),
            outcome,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub requests_sent: usize,
    pub matched: usize,
    pub filtered: usize,
    pub errors: usize,
    pub jobs_run: usize,
    pub promoted: usize,
    pub dropped_beyond_depth: usize,
    pub duration_secs: f64,
    pub requests_per_second: f64,
    /// Status codes seen across every completed request
    pub status_distribution: BTreeMap<u16, usize>,
    /// Matched results per job label
    pub by_job: BTreeMap<String, usize>,
}

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Summary statistics
    pub summary: ReportSummary,
    /// Matched results in request order
    pub results: Vec<FuzzResult>,
    /// Requests that never got a response, in request order
    pub failures: Vec<FuzzResult>,
}

impl ScanReport {
    pub fn new(report: FuzzReport, start_time: DateTime<Utc>) -> Self {
        let metadata = ReportMetadata::new(&report.target, start_time, &report.outcome);
        let stats = report.stats;

        let mut summary = ReportSummary {
            requests_sent: stats.requests_sent,
            matched: stats.matched,
            filtered: stats.filtered,
            errors: stats.errors,
            jobs_run: stats.jobs_run,
            promoted: stats.promoted,
            dropped_beyond_depth: stats.dropped_beyond_depth,
            duration_secs: stats.elapsed_ms as f64 / 1000.0,
            requests_per_second: stats.requests_per_second,
            status_distribution: report.results.status_distribution.iter().map(|(k, v)| (*k, *v)).collect(),
            by_job: BTreeMap::new(),
        };

        let (results, failures) = report.results.into_sorted();
        for result in &results {
            *summary.by_job.entry(result.job.clone()).or_insert(0) += 1;
        }

        Self {
            metadata,
            summary,
            results,
            failures,
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Txt => formats::txt::generate(self),
            ReportFormat::Json => formats::json::generate(self),
            ReportFormat::Csv => formats::csv::generate(self),
        }
    }
}

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Txt,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn all() -> &'static [ReportFormat] {
        &[ReportFormat::Txt, ReportFormat::Json, ReportFormat::Csv]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Txt => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|f| f.extension() == wanted)
            .ok_or_else(|| ConfigError::ValidationError {
                field: "output.format".into(),
                reason: format!("unknown format '{}', expected txt, csv or json", s),
            })
    }
}

/// Writes a finished report to a file or stdout
#[derive(Debug, Clone)]
pub struct ReportWriter {
    format: ReportFormat,
    path: Option<PathBuf>,
}

impl ReportWriter {
    pub fn new(format: ReportFormat, path: Option<PathBuf>) -> Self {
        Self { format, path }
    }

    pub fn write(&self, report: &ScanReport) -> Result<()> {
        let content = report.render(self.format)?;
        match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                std::fs::write(path, content)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                tracing::info!(path = %path.display(), format = %self.format, "Report written");
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(content.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

/// Prints each match to stderr as it arrives
#[derive(Debug, Default)]
pub struct ConsoleSink {
    /// Print the mutation steps of every payload
    pub verbose: bool,
}

impl ConsoleSink {
    pub fn format_line(&self, result: &FuzzResult) -> String {
        let mut line = format!(
            "[{}] {:>4} {:>8}B {:>6}W {:>6}L {:>6}ms  {}",
            result.request_num,
            result.status_code,
            result.response_length,
            result.word_count,
            result.line_count,
            result.elapsed().as_millis(),
            result.url,
        );
        if result.payload.recursion_level > 0 {
            line.push_str(&format!("  (depth {})", result.payload.recursion_level));
        }
        if self.verbose && !result.payload.mutations.is_empty() {
            line.push_str(&format!("  <{}>", result.payload.mutations.join(", ")));
        }
        for (scanner, found) in &result.scanners_res {
            for finding in &found.findings {
                line.push_str(&format!("\n    {}: {}", scanner, finding));
            }
        }
        line
    }
}

impl ResultSink for ConsoleSink {
    fn on_result(&self, result: &FuzzResult) {
        eprintln!("{}", self.format_line(result));
    }

    fn on_job_start(&self, label: &str, total_requests: usize) {
        eprintln!("--- job '{}': {} requests ---", label, total_requests);
    }
}
