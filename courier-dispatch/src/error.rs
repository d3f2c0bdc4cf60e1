//! Terminal failure states for dispatch jobs.

use courier_transport::TransportError;
use thiserror::Error;

/// The reason a job's handle was rejected.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The transport failed and the retry bound was reached (or the
    /// failure happened with the job already at the bound).
    #[error("delivery failed after {attempts} attempt(s): {source}")]
    Failed {
        /// Counted retries at the moment of rejection.
        attempts: u32,
        /// The failure that exhausted the bound.
        #[source]
        source: TransportError,
    },

    /// The transport never answered within the configured send timeout.
    #[error("delivery timed out after {attempts} attempt(s): no response within {timeout_ms}ms")]
    TimedOut {
        /// Counted retries at the moment of rejection.
        attempts: u32,
        /// The per-send timeout that was exceeded.
        timeout_ms: u64,
    },

    /// The queue shut down before the job reached a terminal state.
    #[error("dispatch queue shut down before the job completed")]
    QueueClosed,
}

impl DispatchError {
    /// Returns `true` if the job was lost to shutdown rather than a
    /// delivery failure.
    #[must_use]
    pub const fn is_queue_closed(&self) -> bool {
        matches!(self, Self::QueueClosed)
    }
}
