//! Parser for the semi-structured NCC run summary.
//!
//! The summary is a block-structured text: each finding opens with a
//! `Detailed information for ...` line and closes with the first subsequent
//! `Refer to ...` line. Severity is derived from the detail text.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::Error;
use crate::types::{Finding, Severity};

fn block_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Detailed information for .*").expect("valid regex"))
}

fn block_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Refer to.*").expect("valid regex"))
}

fn severity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(FAIL|WARN|INFO|ERR):").expect("valid regex"))
}

/// Replace the two-character escape `\n` with an actual newline.
///
/// The remote JSON delivers the summary as an embedded string, so newlines
/// arrive escaped.
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Detect the severity of a finding from its raw detail text.
///
/// The first explicit `SEVERITY:` marker wins; without one, the first of
/// `FAIL:`/`WARN:`/`ERR:`/`INFO:` in that priority; otherwise INFO.
fn detect_severity(detail: &str) -> Severity {
    if let Some(caps) = severity_re().captures(detail) {
        return match &caps[1] {
            "FAIL" => Severity::Fail,
            "WARN" => Severity::Warn,
            "ERR" => Severity::Err,
            _ => Severity::Info,
        };
    }
    if detail.contains("FAIL:") {
        Severity::Fail
    } else if detail.contains("WARN:") {
        Severity::Warn
    } else if detail.contains("ERR:") {
        Severity::Err
    } else {
        Severity::Info
    }
}

/// Parse summary text into an ordered sequence of findings.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] for an empty string and
/// [`Error::NoFindings`] when no block opens; callers decide whether the
/// latter is fatal (a clean cluster produces no blocks).
pub fn parse_summary(text: &str) -> Result<Vec<Finding>, Error> {
    if text.is_empty() {
        return Err(Error::EmptyInput);
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut findings = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        if block_start_re().is_match(lines[i]) {
            let check_name = lines[i].to_string();
            i += 1;
            let mut buf: Vec<&str> = Vec::new();
            while i < lines.len() && !block_end_re().is_match(lines[i]) {
                buf.push(lines[i]);
                i += 1;
            }
            if i < lines.len() {
                buf.push(lines[i]);
            }
            let detail = buf.join("\n");
            findings.push(Finding {
                severity: detect_severity(&detail),
                check_name,
                detail,
            });
        }
        i += 1;
    }

    if findings.is_empty() {
        return Err(Error::NoFindings);
    }
    Ok(findings)
}

/// Horizontal rule between findings in the filtered file.
const FILTERED_RULE: &str = "---------------------------------------";

/// Serialize findings into the human-readable filtered-file format.
///
/// The output is parseable by [`parse_summary`], which is what replay mode
/// relies on.
#[must_use]
pub fn render_filtered(findings: &[Finding]) -> String {
    let mut out = String::new();
    for finding in findings {
        out.push_str(&finding.check_name);
        out.push_str("\n\n");
        out.push_str(&finding.detail);
        out.push_str("\n\n");
        out.push_str(FILTERED_RULE);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SAMPLE: &str = "NCC run completed\n\
Detailed information for check_disk_usage\n\
FAIL: disk usage above 90% on node A\n\
Refer to KB 1234\n\
noise between blocks\n\
Detailed information for check_cvm_memory\n\
INFO: memory within limits\n\
Refer to KB 5678\n\
trailing noise\n";

    #[test]
    fn test_parse_two_blocks() {
        let findings = parse_summary(SAMPLE).unwrap();
        assert_eq!(findings.len(), 2);

        assert_eq!(findings[0].check_name, "Detailed information for check_disk_usage");
        assert_eq!(findings[0].severity, Severity::Fail);
        assert!(findings[0].detail.contains("FAIL: disk usage"));
        assert!(findings[0].detail.ends_with("Refer to KB 1234"));

        assert_eq!(findings[1].severity, Severity::Info);
        assert!(findings[1].detail.ends_with("Refer to KB 5678"));
    }

    #[test]
    fn test_each_finding_has_one_terminal_line() {
        let findings = parse_summary(SAMPLE).unwrap();
        for finding in &findings {
            let terminals = finding
                .detail
                .lines()
                .filter(|l| l.starts_with("Refer to"))
                .count();
            assert_eq!(terminals, 1);
            assert!(finding.check_name.starts_with("Detailed information for "));
        }
    }

    #[test]
    fn test_block_without_terminal_runs_to_end() {
        let text = "Detailed information for check_x\nWARN: something\nmore detail";
        let findings = parse_summary(text).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warn);
        assert!(findings[0].detail.ends_with("more detail"));
    }

    #[test]
    fn test_empty_input() {
        let err = parse_summary("").unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_no_findings_distinct_from_empty() {
        let err = parse_summary("just some text\nwith no blocks\n").unwrap_err();
        assert!(matches!(err, Error::NoFindings));
    }

    #[test]
    fn test_severity_marker_priority() {
        // Explicit marker order in the text wins.
        let text = "Detailed information for check_x\nWARN: first\nFAIL: second\nRefer to KB";
        assert_eq!(parse_summary(text).unwrap()[0].severity, Severity::Warn);

        // Without a word-boundary match, substring priority applies:
        // FAIL > WARN > ERR > INFO.
        assert_eq!(detect_severity("nothing here"), Severity::Info);
        assert_eq!(detect_severity("xWARN: and xFAIL: glued"), Severity::Fail);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse_summary(SAMPLE).unwrap();
        let second = parse_summary(SAMPLE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sanitize_unescapes_newlines() {
        assert_eq!(sanitize("a\\nb"), "a\nb");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn test_sanitize_idempotent() {
        let input = "Detailed information for x\\nFAIL: y\\nRefer to z";
        assert_eq!(sanitize(&sanitize(input)), sanitize(input));
    }

    #[test]
    fn test_filtered_round_trip() {
        let findings = parse_summary(SAMPLE).unwrap();
        let rendered = render_filtered(&findings);
        let reparsed = parse_summary(&rendered).unwrap();

        assert_eq!(reparsed.len(), findings.len());
        for (orig, back) in findings.iter().zip(&reparsed) {
            assert_eq!(back.check_name, orig.check_name);
            assert_eq!(back.severity, orig.severity);
            // Block boundaries introduce surrounding whitespace.
            assert_eq!(back.detail.trim(), orig.detail.trim());
        }
    }

    #[test]
    fn test_very_long_detail_line() {
        let big = "x".repeat(4 * 1024 * 1024 + 16);
        let text = format!("Detailed information for check_big\nFAIL: {big}\nRefer to KB");
        let findings = parse_summary(&text).unwrap();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].detail.len() > 4 * 1024 * 1024);
    }
}
