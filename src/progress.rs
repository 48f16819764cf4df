//! Progress presenter seam.
//!
//! The state machine reports progress through this narrow capability; the
//! actual rendering (bars, TUI, nothing) lives behind it. Each endpoint owns
//! its own presenter instance.

use std::sync::Arc;

use tracing::info;

/// Per-endpoint progress sink.
pub trait Progress: Send + Sync {
    /// Percent complete, 0..=100, non-decreasing.
    fn set_percent(&self, percent: u8);
    /// Current phase label (starting, polling, fetching, ...).
    fn set_phase(&self, phase: &str);
}

/// Creates one [`Progress`] per endpoint.
pub trait ProgressFactory: Send + Sync {
    fn for_endpoint(&self, host: &str) -> Arc<dyn Progress>;
}

/// Presenter that logs phase changes and drops percent updates.
pub struct LogProgress {
    host: String,
}

impl Progress for LogProgress {
    fn set_percent(&self, _percent: u8) {}

    fn set_phase(&self, phase: &str) {
        info!(cluster = %self.host, phase, "phase change");
    }
}

/// Factory for [`LogProgress`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressFactory;

impl ProgressFactory for LogProgressFactory {
    fn for_endpoint(&self, host: &str) -> Arc<dyn Progress> {
        Arc::new(LogProgress {
            host: host.to_string(),
        })
    }
}

/// Presenter that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl Progress for NoopProgress {
    fn set_percent(&self, _percent: u8) {}
    fn set_phase(&self, _phase: &str) {}
}
