//! JSON report rendering.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Error;
use crate::types::{Finding, SummaryCounts};

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    cluster: &'a str,
    results: &'a [Finding],
    summary: SummaryCounts,
}

/// Render the per-endpoint JSON report.
///
/// # Errors
/// Serialization failures only.
pub fn render(
    host: &str,
    findings: &[Finding],
    generated_at: DateTime<Utc>,
) -> Result<String, Error> {
    let mut summary = SummaryCounts::default();
    for finding in findings {
        summary.add(finding.severity);
    }

    let report = JsonReport {
        generated_at: generated_at.to_rfc3339(),
        cluster: host,
        results: findings,
        summary,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
