//! Plain text report generator

use std::fmt::Write;

use anyhow::Result;

use crate::reporting::ScanReport;

/// Generate a plain text report
pub fn generate(report: &ScanReport) -> Result<String> {
    let mut out = String::new();
    let meta = &report.metadata;
    let summary = &report.summary;

    writeln!(out, "Target:   {}", meta.target)?;
    writeln!(out, "Run:      {}", meta.run_id)?;
    writeln!(
        out,
        "Period:   {} to {}",
        meta.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
        meta.end_time.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "Outcome:  {}", meta.outcome)?;
    writeln!(
        out,
        "Requests: {} sent, {} matched, {} filtered, {} errors ({:.1} req/s)",
        summary.requests_sent, summary.matched, summary.filtered, summary.errors, summary.requests_per_second
    )?;
    if summary.promoted > 0 || summary.dropped_beyond_depth > 0 {
        writeln!(
            out,
            "Recursion: {} payloads promoted, {} beyond max depth",
            summary.promoted, summary.dropped_beyond_depth
        )?;
    }
    out.push('\n');

    for result in &report.results {
        writeln!(
            out,
            "{}\t{}\t{}\t{}B\t{}W\t{}L\t{}",
            result.request_num,
            result.method,
            result.status_code,
            result.response_length,
            result.word_count,
            result.line_count,
            result.url
        )?;
        for (scanner, found) in &result.scanners_res {
            for finding in &found.findings {
                writeln!(out, "\t{}: {}", scanner, finding)?;
            }
        }
    }

    if !report.failures.is_empty() {
        writeln!(out, "\nFailed requests:")?;
        for failure in &report.failures {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                failure.request_num,
                failure.method,
                failure.url,
                failure.error.as_deref().unwrap_or_default()
            )?;
        }
    }

    Ok(out)
}
