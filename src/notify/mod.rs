//! Result-sink notifiers. Delivery failures are logged and swallowed; a
//! notifier can never fail the run.

pub mod email;
pub mod webhook;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::aggregate::Aggregate;
use crate::error::Error;
use crate::types::{AggregatedFinding, SummaryCounts};

pub use email::{EmailConfig, EmailNotifier};
pub use webhook::{WebhookConfig, WebhookNotifier};

/// Payload handed to every notifier.
#[derive(Debug, Clone, Serialize)]
pub struct NotifyReport {
    pub timestamp: String,
    pub event_type: String,
    pub summary: SummaryCounts,
    pub results: Vec<AggregatedFinding>,
    pub failed_clusters: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl NotifyReport {
    #[must_use]
    pub fn new(aggregate: &Aggregate) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), "ncc-orchestrator".to_string());
        metadata.insert(
            "version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );

        Self {
            timestamp: aggregate.generated_at.to_rfc3339(),
            event_type: "ncc_report".to_string(),
            summary: aggregate.counts(),
            results: aggregate.rows.clone(),
            failed_clusters: aggregate.failed.clone(),
            metadata,
        }
    }
}

/// A delivery channel for the aggregated report.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, report: &NotifyReport) -> Result<(), Error>;
}

/// Send the report to every notifier, swallowing failures.
pub async fn dispatch(notifiers: &[Box<dyn Notifier>], report: &NotifyReport) {
    for notifier in notifiers {
        match notifier.send(report).await {
            Ok(()) => info!(channel = notifier.name(), "notification sent"),
            Err(err) => {
                error!(channel = notifier.name(), error = %err, "failed to send notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use chrono::Utc;

    fn aggregate() -> Aggregate {
        Aggregate {
            rows: vec![AggregatedFinding {
                cluster: "c1".to_string(),
                severity: Severity::Fail,
                check: "Detailed information for disk".to_string(),
                detail: "FAIL: full".to_string(),
            }],
            succeeded: vec!["c1".to_string()],
            failed: vec!["c2".to_string()],
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_payload_shape() {
        let report = NotifyReport::new(&aggregate());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["event_type"], "ncc_report");
        assert_eq!(value["summary"]["total"], 1);
        assert_eq!(value["summary"]["fail"], 1);
        assert_eq!(value["results"][0]["cluster"], "c1");
        assert_eq!(value["results"][0]["severity"], "FAIL");
        assert_eq!(value["failed_clusters"][0], "c2");
        assert_eq!(value["metadata"]["source"], "ncc-orchestrator");
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _report: &NotifyReport) -> Result<(), Error> {
            Err(Error::Network("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_swallows_errors() {
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(FailingNotifier)];
        // Must not panic or propagate the failure.
        dispatch(&notifiers, &NotifyReport::new(&aggregate())).await;
    }
}
