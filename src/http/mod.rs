//! Resilient HTTP layer: the transport seam and the retrying caller.

pub mod retry;
pub mod transport;

pub use retry::{send_with_retry, RetryPolicy};
pub use transport::{HttpMethod, PreparedRequest, ReqwestTransport, Transport, TransportResponse};
