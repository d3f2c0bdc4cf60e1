//! Rate-limited dispatch queue for outgoing mail
//!
//! The queue is the core of the relay: an in-process FIFO of send jobs
//! drained by a single worker that serializes transport sends behind a
//! minimum inter-send interval, retries failures within a bound, and
//! resolves a handle per job.
//!
//! Ordering rules:
//! - enqueue appends at the back
//! - a transient (rate-related) failure requeues at the *front*, ahead
//!   of newer jobs, without consuming a retry
//! - any other failure consumes a retry and requeues at the *back*,
//!   until the bound is reached and the job is rejected
//!
//! There is exactly one drain worker per queue, enforced by
//! construction: [`DispatchQueue::new`] hands back the only
//! [`DrainWorker`], and [`DrainWorker::serve`] consumes it.

mod config;
mod error;
mod job;
mod queue;
mod rate;
mod worker;

pub use config::DispatchConfig;
pub use error::DispatchError;
pub use job::{JobId, SendHandle};
pub use queue::{DispatchQueue, QueueStatus};
pub use worker::DrainWorker;

/// Control signal broadcast to long-running tasks.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    /// Stop accepting work and shut down gracefully.
    Shutdown,
}
