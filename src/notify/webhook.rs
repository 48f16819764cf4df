//! Webhook notification channel.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::{Notifier, NotifyReport};
use crate::error::Error;

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
}

/// Posts the aggregated report as JSON to a configured URL.
#[derive(Debug)]
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// # Errors
    /// [`Error::Config`] when no URL is configured or the client cannot be
    /// built.
    pub fn new(config: WebhookConfig) -> Result<Self, Error> {
        if config.url.is_empty() {
            return Err(Error::Config("webhook URL not configured".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build webhook client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, report: &NotifyReport) -> Result<(), Error> {
        let method = reqwest::Method::from_bytes(self.config.method.as_bytes())
            .map_err(|_| Error::Config(format!("invalid webhook method: {}", self.config.method)))?;

        let mut request = self
            .client
            .request(method, &self.config.url)
            .json(report);
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("failed to send webhook: {e}")))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(Error::Network(format!(
                "webhook returned status {status}"
            )));
        }
        Ok(())
    }
}

/// Parse the `--webhook-headers` JSON object; invalid JSON is a validation
/// error the caller logs and ignores.
pub fn parse_headers(raw: &str) -> Result<HashMap<String, String>, Error> {
    serde_json::from_str(raw)
        .map_err(|e| Error::Validation(format!("invalid webhook headers: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_rejected() {
        let err = WebhookNotifier::new(WebhookConfig {
            url: String::new(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            timeout: Duration::from_secs(30),
        })
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(r#"{"X-Token":"abc","X-Env":"lab"}"#).unwrap();
        assert_eq!(headers.get("X-Token").map(String::as_str), Some("abc"));
        assert_eq!(headers.len(), 2);

        assert!(parse_headers("not json").is_err());
    }
}
