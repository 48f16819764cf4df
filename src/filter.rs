//! Post-parse finding filters: severity set, check-name regex, endpoint
//! regex. All criteria are optional and AND-combined; an invalid regex is
//! logged and the criterion dropped.

use std::collections::HashSet;

use regex::Regex;
use tracing::{info, warn};

use crate::types::{Finding, Severity};

#[derive(Debug, Default)]
pub struct FindingFilter {
    severities: Option<HashSet<Severity>>,
    check: Option<Regex>,
    endpoint: Option<Regex>,
}

impl FindingFilter {
    /// Build from the raw filter options.
    #[must_use]
    pub fn from_options(
        severity_csv: Option<&str>,
        check_pattern: Option<&str>,
        endpoint_pattern: Option<&str>,
    ) -> Self {
        let severities = severity_csv.filter(|s| !s.trim().is_empty()).map(|csv| {
            csv.split(',')
                .filter_map(|token| match token.parse::<Severity>() {
                    Ok(sev) => Some(sev),
                    Err(_) => {
                        warn!(token = token.trim(), "unknown severity in filter, ignoring");
                        None
                    }
                })
                .collect()
        });

        let check = compile_pattern(check_pattern, "check");
        let endpoint = compile_pattern(endpoint_pattern, "cluster");

        Self {
            severities,
            check,
            endpoint,
        }
    }

    /// Apply the filters to one endpoint's findings.
    ///
    /// A non-matching endpoint pattern reduces the whole result to zero
    /// findings.
    #[must_use]
    pub fn apply(&self, host: &str, findings: Vec<Finding>) -> Vec<Finding> {
        let original = findings.len();

        if let Some(re) = &self.endpoint {
            if !re.is_match(host) {
                info!(cluster = host, original, filtered = 0, "applied filters");
                return Vec::new();
            }
        }

        let filtered: Vec<Finding> = findings
            .into_iter()
            .filter(|f| {
                if let Some(set) = &self.severities {
                    if !set.contains(&f.severity) {
                        return false;
                    }
                }
                if let Some(re) = &self.check {
                    if !re.is_match(&f.check_name) {
                        return false;
                    }
                }
                true
            })
            .collect();

        info!(
            cluster = host,
            original,
            filtered = filtered.len(),
            "applied filters"
        );
        filtered
    }
}

fn compile_pattern(pattern: Option<&str>, which: &str) -> Option<Regex> {
    let pattern = pattern.filter(|p| !p.is_empty())?;
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "invalid {which} filter regex, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, check: &str) -> Finding {
        Finding {
            severity,
            check_name: format!("Detailed information for {check}"),
            detail: format!("{severity}: detail for {check}"),
        }
    }

    fn sample() -> Vec<Finding> {
        vec![
            finding(Severity::Fail, "disk_usage"),
            finding(Severity::Warn, "cvm_memory"),
            finding(Severity::Info, "ntp_sync"),
        ]
    }

    #[test]
    fn test_no_filters_keeps_everything() {
        let filter = FindingFilter::from_options(None, None, None);
        assert_eq!(filter.apply("c1", sample()).len(), 3);
    }

    #[test]
    fn test_severity_filter() {
        let filter = FindingFilter::from_options(Some("FAIL,WARN"), None, None);
        let kept = filter.apply("c1", sample());
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|f| f.severity != Severity::Info));
    }

    #[test]
    fn test_severity_filter_ignores_bad_tokens() {
        let filter = FindingFilter::from_options(Some("FAIL,BOGUS"), None, None);
        let kept = filter.apply("c1", sample());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].severity, Severity::Fail);
    }

    #[test]
    fn test_check_filter() {
        let filter = FindingFilter::from_options(None, Some("disk|ntp"), None);
        let kept = filter.apply("c1", sample());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_invalid_check_regex_is_dropped() {
        let filter = FindingFilter::from_options(None, Some("(unclosed"), None);
        assert_eq!(filter.apply("c1", sample()).len(), 3);
    }

    #[test]
    fn test_endpoint_filter_empties_non_matching_host() {
        let filter = FindingFilter::from_options(None, None, Some("^10\\.0\\."));
        assert!(filter.apply("192.168.1.5", sample()).is_empty());
        assert_eq!(filter.apply("10.0.1.1", sample()).len(), 3);
    }

    #[test]
    fn test_invalid_endpoint_regex_is_dropped() {
        let filter = FindingFilter::from_options(None, None, Some("[bad"));
        assert_eq!(filter.apply("c1", sample()).len(), 3);
    }

    #[test]
    fn test_filters_combine() {
        let filter = FindingFilter::from_options(Some("FAIL,WARN"), Some("memory"), None);
        let kept = filter.apply("c1", sample());
        assert_eq!(kept.len(), 1);
        assert!(kept[0].check_name.contains("cvm_memory"));
    }
}
