//! JSON Report Generator
//!
//! Generates machine-readable JSON reports.

use anyhow::Result;

use crate::reporting::ScanReport;

/// Generate JSON report
pub fn generate(report: &ScanReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::tests::sample_report;

    #[test]
    fn test_generate_json_report() {
        let json = generate(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["results"][0]["payload"]["value"], "admin");
        assert_eq!(value["summary"]["matched"], 2);
        assert!(value["metadata"]["run_id"].is_string());
        assert_eq!(value["failures"][0]["error"], "Connection error: refused");
    }
}
