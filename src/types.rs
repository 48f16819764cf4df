//! Core data model: endpoints, findings, and per-endpoint results.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A single remote cluster reachable at `https://{host}:9440`.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// IP address or FQDN of the Prism gateway.
    pub host: String,
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
}

/// Severity of a finding, derived from its detail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "ERR")]
    Err,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "FAIL",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Err => "ERR",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim() {
            "FAIL" => Ok(Self::Fail),
            "WARN" => Ok(Self::Warn),
            "INFO" => Ok(Self::Info),
            "ERR" => Ok(Self::Err),
            other => Err(Error::Validation(format!("unknown severity: {other}"))),
        }
    }
}

/// A typed record extracted from the remote summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// The `Detailed information for ...` line that opened the block.
    pub check_name: String,
    /// Raw detail text, up to and including the `Refer to ...` line.
    pub detail: String,
}

/// Task progress as reported by `GET /v2.0/tasks/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub percentage_complete: i64,
    #[serde(default)]
    pub progress_status: String,
}

/// Summary payload of `GET /v1/ncc/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "runSummary", default)]
    pub run_summary: String,
}

/// Outcome of one endpoint worker. Published exactly once per endpoint.
#[derive(Debug)]
pub struct EndpointResult {
    pub endpoint: String,
    pub outcome: Result<Vec<Finding>, Error>,
}

impl EndpointResult {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.outcome.is_err()
    }
}

/// A finding tagged with the endpoint that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedFinding {
    pub cluster: String,
    pub severity: Severity,
    pub check: String,
    pub detail: String,
}

/// Severity counts over a set of findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total: usize,
    pub fail: usize,
    pub warn: usize,
    pub info: usize,
    pub err: usize,
}

impl SummaryCounts {
    pub fn add(&mut self, severity: Severity) {
        self.total += 1;
        match severity {
            Severity::Fail => self.fail += 1,
            Severity::Warn => self.warn += 1,
            Severity::Info => self.info += 1,
            Severity::Err => self.err += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_round_trip() {
        for sev in [Severity::Fail, Severity::Warn, Severity::Info, Severity::Err] {
            assert_eq!(sev.as_str().parse::<Severity>().unwrap(), sev);
        }
        assert!("CRITICAL".parse::<Severity>().is_err());
    }

    #[test]
    fn test_task_status_tolerates_missing_fields() {
        let status: TaskStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status.percentage_complete, 0);
        assert_eq!(status.progress_status, "");

        let status: TaskStatus =
            serde_json::from_str(r#"{"percentage_complete":50,"progress_status":"Running"}"#)
                .unwrap();
        assert_eq!(status.percentage_complete, 50);
        assert_eq!(status.progress_status, "Running");
    }

    #[test]
    fn test_summary_counts() {
        let mut counts = SummaryCounts::default();
        counts.add(Severity::Fail);
        counts.add(Severity::Fail);
        counts.add(Severity::Info);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.fail, 2);
        assert_eq!(counts.info, 1);
        assert_eq!(counts.warn, 0);
    }
}
