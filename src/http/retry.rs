//! Retrying caller: per-attempt timeout, outcome classification, and
//! full-jitter exponential backoff with `Retry-After` support.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{is_retryable_status, Error};
use crate::http::transport::{PreparedRequest, Transport, TransportResponse};

/// Retry tuning, config-derived and process-wide.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Max attempts per request; at least 1.
    pub max_attempts: u32,
    /// Base backoff delay.
    pub base_delay: Duration,
    /// Cap on the jittered backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Full-jitter exponential backoff: `uniform(0, min(base * 2^(k-1), max))`.
fn jittered_backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exp = policy.base_delay.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
    let cap = exp.min(policy.max_delay.as_secs_f64());
    if cap <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..cap))
}

/// Parse a `Retry-After` header value: integer seconds or an HTTP-date.
fn retry_after_delay(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(when) = chrono::DateTime::parse_from_rfc2822(raw) {
        let delta = when.signed_duration_since(chrono::Utc::now());
        return Some(delta.to_std().unwrap_or(Duration::ZERO));
    }
    None
}

/// Sleep for `dur`, bailing out with a timeout error if `cancel` fires.
pub(crate) async fn sleep_cancellable(
    cancel: &CancellationToken,
    dur: Duration,
    what: &str,
) -> Result<(), Error> {
    tokio::select! {
        () = cancel.cancelled() => Err(Error::Timeout(format!("cancelled during {what}"))),
        () = tokio::time::sleep(dur) => Ok(()),
    }
}

/// Execute `req` under `policy`, replaying the captured body on every
/// attempt.
///
/// Classification per attempt: transport error and HTTP
/// 408/429/500/502/503/504 are retryable, any other non-2xx status is
/// terminal. On 429 a parseable `Retry-After` header is honored exactly,
/// even beyond `max_delay`. No attempt is issued after `cancel` fires.
///
/// # Errors
/// The terminal error, or the last retryable one once attempts run out.
pub async fn send_with_retry(
    transport: &dyn Transport,
    cancel: &CancellationToken,
    req: &PreparedRequest,
    request_timeout: Duration,
    policy: &RetryPolicy,
    operation: &str,
) -> Result<TransportResponse, Error> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err: Option<Error> = None;

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(Error::Timeout(format!("cancelled before {operation}")));
        }

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                return Err(Error::Timeout(format!("cancelled during {operation}")));
            }
            res = tokio::time::timeout(request_timeout, transport.execute(req)) => res,
        };

        let err = match outcome {
            Ok(Ok(resp)) => {
                if resp.is_success() {
                    debug!(op = operation, status = resp.status, attempt, "request succeeded");
                    return Ok(resp);
                }

                let status_err = Error::HttpStatus {
                    status: resp.status,
                    url: req.url.clone(),
                    operation: operation.to_string(),
                };
                if !is_retryable_status(resp.status) {
                    warn!(op = operation, status = resp.status, attempt, "terminal status");
                    return Err(status_err);
                }

                if attempt < attempts {
                    let delay = if resp.status == 429 {
                        resp.retry_after
                            .as_deref()
                            .and_then(retry_after_delay)
                            .unwrap_or_else(|| jittered_backoff(policy, attempt))
                    } else {
                        jittered_backoff(policy, attempt)
                    };
                    warn!(
                        op = operation,
                        status = resp.status,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        "retryable status, retrying"
                    );
                    sleep_cancellable(cancel, delay, "retry wait").await?;
                }
                status_err
            }
            Ok(Err(transport_err)) => {
                if cancel.is_cancelled() {
                    return Err(Error::Timeout(format!("cancelled during {operation}")));
                }
                if attempt < attempts {
                    let delay = jittered_backoff(policy, attempt);
                    warn!(
                        op = operation,
                        attempt,
                        error = %transport_err,
                        backoff_ms = delay.as_millis() as u64,
                        "transport error, retrying"
                    );
                    sleep_cancellable(cancel, delay, "retry wait").await?;
                }
                transport_err
            }
            Err(_elapsed) => {
                let timeout_err = Error::Network(format!(
                    "{operation} exceeded request timeout of {request_timeout:?}"
                ));
                if attempt < attempts {
                    let delay = jittered_backoff(policy, attempt);
                    warn!(
                        op = operation,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        "request timed out, retrying"
                    );
                    sleep_cancellable(cancel, delay, "retry wait").await?;
                }
                timeout_err
            }
        };
        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| Error::Network(format!("{operation} exhausted retries"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct SequenceTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, Error>>>,
        bodies: Mutex<Vec<Option<Vec<u8>>>>,
    }

    impl SequenceTransport {
        fn new(responses: Vec<Result<TransportResponse, Error>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                bodies: Mutex::new(Vec::new()),
            }
        }

        fn attempt_count(&self) -> usize {
            self.bodies.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for SequenceTransport {
        async fn execute(&self, req: &PreparedRequest) -> Result<TransportResponse, Error> {
            self.bodies.lock().unwrap().push(req.body.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Network("script exhausted".into())))
        }
    }

    fn ok(body: &str) -> Result<TransportResponse, Error> {
        Ok(TransportResponse {
            status: 200,
            retry_after: None,
            body: body.as_bytes().to_vec(),
        })
    }

    fn status(code: u16) -> Result<TransportResponse, Error> {
        Ok(TransportResponse {
            status: code,
            retry_after: None,
            body: vec![],
        })
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_bounds() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(8),
        };
        for attempt in 1..=12 {
            let delay = jittered_backoff(&policy, attempt);
            assert!(delay <= policy.max_delay, "attempt {attempt}: {delay:?}");
        }
        // First attempt is bounded by the base delay itself.
        assert!(jittered_backoff(&policy, 1) <= policy.base_delay);
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(retry_after_delay("2"), Some(Duration::from_secs(2)));
        assert_eq!(retry_after_delay(" 0 "), Some(Duration::ZERO));
        assert_eq!(retry_after_delay("not-a-date"), None);

        // HTTP-dates in the past clamp to zero.
        let past = retry_after_delay("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(past, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let transport = SequenceTransport::new(vec![ok("hello")]);
        let cancel = CancellationToken::new();
        let req = PreparedRequest::get("https://c1:9440/x");

        let resp = send_with_retry(
            &transport,
            &cancel,
            &req,
            Duration::from_secs(1),
            &fast_policy(6),
            "op",
        )
        .await
        .unwrap();
        assert_eq!(resp.body, b"hello");
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_retryable_then_success() {
        let transport = SequenceTransport::new(vec![status(503), ok("ok")]);
        let cancel = CancellationToken::new();
        let req = PreparedRequest::get("https://c1:9440/x");

        let resp = send_with_retry(
            &transport,
            &cancel,
            &req,
            Duration::from_secs(1),
            &fast_policy(6),
            "op",
        )
        .await
        .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(transport.attempt_count(), 2);
    }

    #[tokio::test]
    async fn test_terminal_status_no_retry() {
        let transport = SequenceTransport::new(vec![status(404)]);
        let cancel = CancellationToken::new();
        let req = PreparedRequest::get("https://c1:9440/x");

        let err = send_with_retry(
            &transport,
            &cancel,
            &req,
            Duration::from_secs(1),
            &fast_policy(6),
            "op",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_attempts_capped_and_last_error_returned() {
        let transport = SequenceTransport::new(vec![status(503), status(503), status(503)]);
        let cancel = CancellationToken::new();
        let req = PreparedRequest::get("https://c1:9440/x");

        let err = send_with_retry(
            &transport,
            &cancel,
            &req,
            Duration::from_secs(1),
            &fast_policy(3),
            "op",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
        assert_eq!(transport.attempt_count(), 3);
    }

    #[tokio::test]
    async fn test_body_replayed_identically() {
        let transport = SequenceTransport::new(vec![status(503), status(500), ok("done")]);
        let cancel = CancellationToken::new();
        let req = PreparedRequest::post_json("https://c1:9440/x", br#"{"sendEmail":false}"#.to_vec());

        send_with_retry(
            &transport,
            &cancel,
            &req,
            Duration::from_secs(1),
            &fast_policy(6),
            "op",
        )
        .await
        .unwrap();

        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 3);
        for body in bodies.iter() {
            assert_eq!(body.as_deref(), Some(br#"{"sendEmail":false}"#.as_ref()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_honored_beyond_max_delay() {
        let transport = SequenceTransport::new(vec![
            Ok(TransportResponse {
                status: 429,
                retry_after: Some("30".to_string()),
                body: vec![],
            }),
            ok("ok"),
        ]);
        let cancel = CancellationToken::new();
        let req = PreparedRequest::get("https://c1:9440/x");
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_secs(1),
        };

        let start = tokio::time::Instant::now();
        send_with_retry(&transport, &cancel, &req, Duration::from_secs(60), &policy, "op")
            .await
            .unwrap();
        // Retry-After wins over the 1s cap.
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_no_attempt_after_cancellation() {
        let transport = SequenceTransport::new(vec![ok("never")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = PreparedRequest::get("https://c1:9440/x");

        let err = send_with_retry(
            &transport,
            &cancel,
            &req,
            Duration::from_secs(1),
            &fast_policy(6),
            "op",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(transport.attempt_count(), 0);
    }
}
