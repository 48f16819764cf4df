//! CSV report rendering with RFC 4180 quoting.

use std::fmt::Write;

use crate::types::Finding;

/// Render findings as CSV with a `Severity,CheckName,Detail` header.
#[must_use]
pub fn render(findings: &[Finding]) -> String {
    let mut out = String::from("Severity,CheckName,Detail\n");
    for finding in findings {
        let _ = writeln!(
            out,
            "{},{},{}",
            quote(finding.severity.as_str()),
            quote(&finding.check_name),
            quote(&finding.detail),
        );
    }
    out
}

/// Quote a field when it contains a separator, quote, or newline.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
