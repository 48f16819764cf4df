//! Fan-in of per-endpoint results into the aggregated report.

use chrono::{DateTime, Utc};

use crate::types::{AggregatedFinding, EndpointResult, SummaryCounts};

/// Merged findings across all endpoints, stable by order of publication.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub rows: Vec<AggregatedFinding>,
    /// Hosts that published findings (possibly zero), publication order.
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl Aggregate {
    /// Build from published worker results.
    #[must_use]
    pub fn from_results(results: &[EndpointResult]) -> Self {
        let mut rows = Vec::new();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for result in results {
            match &result.outcome {
                Ok(findings) => {
                    succeeded.push(result.endpoint.clone());
                    for finding in findings {
                        rows.push(AggregatedFinding {
                            cluster: result.endpoint.clone(),
                            severity: finding.severity,
                            check: finding.check_name.clone(),
                            detail: finding.detail.clone(),
                        });
                    }
                }
                Err(_) => failed.push(result.endpoint.clone()),
            }
        }

        Self {
            rows,
            succeeded,
            failed,
            generated_at: Utc::now(),
        }
    }

    /// Severity counts over all aggregated findings.
    #[must_use]
    pub fn counts(&self) -> SummaryCounts {
        let mut counts = SummaryCounts::default();
        for row in &self.rows {
            counts.add(row.severity);
        }
        counts
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{Finding, Severity};

    fn finding(sev: Severity) -> Finding {
        Finding {
            severity: sev,
            check_name: "Detailed information for x".to_string(),
            detail: format!("{sev}: detail"),
        }
    }

    #[test]
    fn test_from_results_splits_failures() {
        let results = vec![
            EndpointResult {
                endpoint: "c1".to_string(),
                outcome: Ok(vec![finding(Severity::Fail), finding(Severity::Info)]),
            },
            EndpointResult {
                endpoint: "c2".to_string(),
                outcome: Err(Error::Auth("denied".into())),
            },
            EndpointResult {
                endpoint: "c3".to_string(),
                outcome: Ok(vec![finding(Severity::Warn)]),
            },
        ];

        let aggregate = Aggregate::from_results(&results);
        assert_eq!(aggregate.rows.len(), 3);
        assert_eq!(aggregate.failed, vec!["c2"]);
        assert_eq!(aggregate.rows[0].cluster, "c1");
        assert_eq!(aggregate.rows[2].cluster, "c3");

        let counts = aggregate.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.fail, 1);
        assert_eq!(counts.warn, 1);
        assert_eq!(counts.info, 1);

        assert_eq!(aggregate.succeeded, vec!["c1", "c3"]);
    }

    #[test]
    fn test_empty_success_produces_no_rows() {
        let results = vec![EndpointResult {
            endpoint: "c1".to_string(),
            outcome: Ok(vec![]),
        }];
        let aggregate = Aggregate::from_results(&results);
        assert!(aggregate.rows.is_empty());
        assert!(aggregate.failed.is_empty());
        assert_eq!(aggregate.succeeded, vec!["c1"]);
    }
}
