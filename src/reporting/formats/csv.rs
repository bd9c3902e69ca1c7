//! CSV Report Generator
//!
//! Generates spreadsheet-compatible CSV reports, one row per matched result
//! followed by one row per failed request.

use anyhow::Result;

use crate::reporting::ScanReport;

/// Generate CSV report
pub fn generate(report: &ScanReport) -> Result<String> {
    let mut csv = String::new();

    // Header row
    csv.push_str("Index,Job,Method,URL,Payload,Raw,Depth,Mutations,Status,Size,Words,Lines,BuildMs,ResponseMs,Findings,Error\n");

    // Data rows
    for result in report.results.iter().chain(&report.failures) {
        let findings: Vec<String> = result
            .scanners_res
            .iter()
            .flat_map(|(name, found)| found.findings.iter().map(move |f| format!("{}: {}", name, f)))
            .collect();

        let row = [
            result.request_num.to_string(),
            csv_escape(&result.job),
            csv_escape(&result.method),
            csv_escape(&result.url),
            csv_escape(&result.payload.value),
            csv_escape(&result.payload.raw),
            result.payload.recursion_level.to_string(),
            csv_escape(&result.payload.mutations.join("|")),
            result.status_code.to_string(),
            result.response_length.to_string(),
            result.word_count.to_string(),
            result.line_count.to_string(),
            result.build_time.as_millis().to_string(),
            result.response_time.as_millis().to_string(),
            csv_escape(&findings.join("; ")),
            csv_escape(result.error.as_deref().unwrap_or_default()),
        ];

        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    Ok(csv)
}

/// Escape a value for CSV (handle commas, quotes, newlines)
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        // Escape quotes by doubling them and wrap in quotes
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
