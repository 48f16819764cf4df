//! Typed client for the Prism Gateway NCC API.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Error;
use crate::http::{send_with_retry, PreparedRequest, RetryPolicy, Transport};
use crate::types::{RunSummary, TaskStatus};

/// Client for one endpoint's NCC control API.
///
/// All operations use basic auth and the retrying caller, except
/// [`health_check`](Self::health_check) which bypasses retries for fast
/// feedback.
pub struct PrismClient {
    base_url: String,
    username: String,
    password: String,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    request_timeout: Duration,
}

impl PrismClient {
    #[must_use]
    pub fn new(
        host: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            base_url: format!("https://{host}:9440/PrismGateway/services/rest"),
            username: username.into(),
            password: password.into(),
            transport,
            policy,
            request_timeout,
        }
    }

    fn request(&self, req: PreparedRequest) -> PreparedRequest {
        req.with_basic_auth(self.username.clone(), self.password.clone())
    }

    /// Start NCC checks and return the task id to poll.
    ///
    /// # Errors
    /// [`Error::MissingTaskId`] when the response carries neither `taskUuid`
    /// nor `task_uuid`; otherwise HTTP/network/decode errors.
    pub async fn start_checks(&self, cancel: &CancellationToken) -> Result<String, Error> {
        let req = self.request(PreparedRequest::post_json(
            format!("{}/v1/ncc/checks", self.base_url),
            br#"{"sendEmail":false}"#.to_vec(),
        ));
        let resp = send_with_retry(
            self.transport.as_ref(),
            cancel,
            &req,
            self.request_timeout,
            &self.policy,
            "start checks",
        )
        .await?;

        // The task id key varies by AOS version.
        let data: serde_json::Value = serde_json::from_slice(&resp.body)?;
        let task_id = data
            .get("taskUuid")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                data.get("task_uuid")
                    .and_then(serde_json::Value::as_str)
                    .filter(|s| !s.is_empty())
            })
            .ok_or(Error::MissingTaskId)?;

        debug!(task_id, "ncc task started");
        Ok(task_id.to_string())
    }

    /// Fetch the status of a running task.
    ///
    /// # Errors
    /// HTTP/network/decode errors.
    pub async fn get_task(
        &self,
        cancel: &CancellationToken,
        task_id: &str,
    ) -> Result<TaskStatus, Error> {
        let req = self.request(PreparedRequest::get(format!(
            "{}/v2.0/tasks/{task_id}",
            self.base_url
        )));
        let resp = send_with_retry(
            self.transport.as_ref(),
            cancel,
            &req,
            self.request_timeout,
            &self.policy,
            "get task",
        )
        .await?;
        Ok(serde_json::from_slice(&resp.body)?)
    }

    /// Fetch the textual run summary of a completed task.
    ///
    /// # Errors
    /// HTTP/network/decode errors.
    pub async fn get_run_summary(
        &self,
        cancel: &CancellationToken,
        task_id: &str,
    ) -> Result<String, Error> {
        let req = self.request(PreparedRequest::get(format!(
            "{}/v1/ncc/{task_id}",
            self.base_url
        )));
        let resp = send_with_retry(
            self.transport.as_ref(),
            cancel,
            &req,
            self.request_timeout,
            &self.policy,
            "get summary",
        )
        .await?;
        let summary: RunSummary = serde_json::from_slice(&resp.body)?;
        Ok(summary.run_summary)
    }

    /// Probe connectivity and credentials without starting checks.
    ///
    /// Bypasses the retry loop and uses `probe_timeout` as its only
    /// deadline.
    ///
    /// # Errors
    /// [`Error::Auth`] on HTTP 401, a network error for any other non-2xx
    /// status or transport failure, a parse error if the body is not a JSON
    /// object.
    pub async fn health_check(&self, probe_timeout: Duration) -> Result<(), Error> {
        let req = self.request(PreparedRequest::get(format!(
            "{}/v1/cluster",
            self.base_url
        )));

        let resp = tokio::time::timeout(probe_timeout, self.transport.execute(&req))
            .await
            .map_err(|_| {
                Error::Timeout(format!("health check exceeded {probe_timeout:?}"))
            })??;

        if resp.status == 401 {
            return Err(Error::Auth(
                "authentication failed - check username and password".to_string(),
            ));
        }
        if !resp.is_success() {
            return Err(Error::Network(format!(
                "health check returned status {}",
                resp.status
            )));
        }

        let data: serde_json::Value = serde_json::from_slice(&resp.body)?;
        if !data.is_object() {
            return Err(Error::Network(
                "health check response is not a JSON object".to_string(),
            ));
        }
        Ok(())
    }
}
