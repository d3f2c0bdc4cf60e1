//! Send jobs and the handles callers await

use std::{fmt, time::SystemTime};

use courier_transport::{Email, Receipt};
use tokio::sync::oneshot;
use ulid::Ulid;

use crate::error::DispatchError;

pub(crate) type SendResult = Result<Receipt, DispatchError>;

/// Opaque unique token identifying a job for logging and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Ulid);

impl JobId {
    pub(crate) fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A pending send, owned exclusively by the queue until terminal.
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) email: Email,
    /// Counted (non-transient) failures so far.
    pub(crate) retries: u32,
    pub(crate) enqueued_at: SystemTime,
    responder: oneshot::Sender<SendResult>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("retries", &self.retries)
            .field("enqueued_at", &self.enqueued_at)
            .finish_non_exhaustive()
    }
}

impl Job {
    pub(crate) fn new(email: Email) -> (Self, SendHandle) {
        let id = JobId::generate();
        let (tx, rx) = oneshot::channel();
        let job = Self {
            id,
            email,
            retries: 0,
            enqueued_at: SystemTime::now(),
            responder: tx,
        };
        (job, SendHandle { id, rx })
    }

    /// Resolve the caller's handle with a successful receipt.
    pub(crate) fn resolve(self, receipt: Receipt) {
        if self.responder.send(Ok(receipt)).is_err() {
            // The caller gave up on the handle; the send still happened.
            tracing::debug!(job_id = %self.id, "handle dropped before resolution");
        }
    }

    /// Reject the caller's handle with a terminal failure.
    pub(crate) fn reject(self, error: DispatchError) {
        if self.responder.send(Err(error)).is_err() {
            tracing::debug!(job_id = %self.id, "handle dropped before rejection");
        }
    }
}

/// Handle returned by [`DispatchQueue::enqueue`](crate::DispatchQueue::enqueue).
///
/// Resolves once the job reaches a terminal state. Dropping the handle
/// does not cancel the job.
pub struct SendHandle {
    id: JobId,
    rx: oneshot::Receiver<SendResult>,
}

impl SendHandle {
    /// The job identifier, for correlation with worker logs.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Wait for the job to complete.
    ///
    /// # Errors
    ///
    /// Returns the [`DispatchError`] the job was rejected with, or
    /// [`DispatchError::QueueClosed`] if the worker went away.
    pub async fn resolve(self) -> Result<Receipt, DispatchError> {
        self.rx.await.unwrap_or(Err(DispatchError::QueueClosed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_resolves_with_receipt() {
        let (job, handle) = Job::new(Email::new("user@example.com", "hi"));
        job.resolve(Receipt {
            message_id: "<id@test>".to_string(),
        });

        let receipt = handle.resolve().await.expect("job resolved");
        assert_eq!(receipt.message_id, "<id@test>");
    }

    #[tokio::test]
    async fn dropped_worker_reports_queue_closed() {
        let (job, handle) = Job::new(Email::new("user@example.com", "hi"));
        drop(job);

        assert!(matches!(
            handle.resolve().await,
            Err(DispatchError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn rejecting_a_dropped_handle_does_not_panic() {
        let (job, handle) = Job::new(Email::new("user@example.com", "hi"));
        drop(handle);
        job.reject(DispatchError::QueueClosed);
    }
}
