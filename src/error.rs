//! Error types for the NCC orchestrator.

use thiserror::Error;

/// Errors that can occur while driving NCC checks.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration; fatal before any worker starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential rejection (HTTP 401 from any remote call).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport failure (connect, TLS, read).
    #[error("network error: {0}")]
    Network(String),

    /// Non-retryable HTTP status, or a retryable one after retries ran out.
    #[error("{operation} returned HTTP {status} from {url}")]
    HttpStatus {
        status: u16,
        url: String,
        operation: String,
    },

    /// Cancellation via the overall or per-request deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// JSON decode failure on a remote response.
    #[error("failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    /// `start` response carried neither `taskUuid` nor `task_uuid`.
    #[error("missing taskUuid in start checks response")]
    MissingTaskId,

    /// Summary text was empty.
    #[error("empty summary text")]
    EmptyInput,

    /// Summary text was non-empty but contained no finding blocks.
    #[error("no finding blocks in summary")]
    NoFindings,

    /// The remote task reported `progress_status == "Failed"`.
    #[error("remote NCC task reported failure")]
    RemoteTaskFailed,

    /// Persistence adapter failure.
    #[error("file error: {path}: {reason}")]
    File { path: String, reason: String },

    /// Invalid filter input (non-fatal; the filter is dropped).
    #[error("validation error: {0}")]
    Validation(String),

    /// A worker panicked; caught at the worker boundary.
    #[error("panic: {0}")]
    Panic(String),
}

/// Coarse error classification, used for reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Auth,
    Network,
    Timeout,
    Parse,
    File,
    Validation,
    Unknown,
}

impl Error {
    /// Classify this error into its kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Auth(_) => ErrorKind::Auth,
            Self::HttpStatus { status: 401, .. } => ErrorKind::Auth,
            Self::Network(_) | Self::HttpStatus { .. } | Self::RemoteTaskFailed => {
                ErrorKind::Network
            }
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Json(_) | Self::MissingTaskId | Self::EmptyInput | Self::NoFindings => {
                ErrorKind::Parse
            }
            Self::File { .. } => ErrorKind::File,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Panic(_) => ErrorKind::Unknown,
        }
    }

    /// Build a file error for `path`.
    pub fn file(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::File {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Whether an HTTP status is worth retrying.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status} should be retryable");
        }
        for status in [200, 201, 301, 400, 401, 403, 404, 501] {
            assert!(!is_retryable_status(status), "{status} should be terminal");
        }
    }

    #[test]
    fn test_http_401_classifies_as_auth() {
        let err = Error::HttpStatus {
            status: 401,
            url: "https://c1:9440/x".to_string(),
            operation: "start checks".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Auth);

        let err = Error::HttpStatus {
            status: 500,
            url: "https://c1:9440/x".to_string(),
            operation: "start checks".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!(Error::EmptyInput.kind(), ErrorKind::Parse);
        assert_eq!(Error::NoFindings.kind(), ErrorKind::Parse);
        assert_eq!(Error::MissingTaskId.kind(), ErrorKind::Parse);
        assert_eq!(Error::Timeout("t".into()).kind(), ErrorKind::Timeout);
    }
}
