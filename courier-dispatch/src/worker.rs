//! The single drain worker
//!
//! Consumes the queue one job at a time: waits out the rate-limit
//! interval, attempts the transport send under the per-send timeout,
//! and applies the requeue rules. Exactly one worker exists per queue;
//! [`serve`](DrainWorker::serve) consumes it, so a second drain loop
//! cannot be started.

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use courier_transport::{MailTransport, TransportError};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::{Signal, error::DispatchError, job::Job, queue::QueueInner};

/// What a single failed attempt looked like.
#[derive(Debug, Error)]
enum AttemptFailure {
    #[error("{0}")]
    Transport(TransportError),
    #[error("no response within {0}ms")]
    TimedOut(u64),
}

impl AttemptFailure {
    fn into_error(self, attempts: u32) -> DispatchError {
        match self {
            Self::Transport(source) => DispatchError::Failed { attempts, source },
            Self::TimedOut(timeout_ms) => DispatchError::TimedOut {
                attempts,
                timeout_ms,
            },
        }
    }
}

/// Drains a [`DispatchQueue`](crate::DispatchQueue).
pub struct DrainWorker {
    inner: Arc<QueueInner>,
    transport: Arc<dyn MailTransport>,
}

impl DrainWorker {
    pub(crate) fn new(inner: Arc<QueueInner>, transport: Arc<dyn MailTransport>) -> Self {
        Self { inner, transport }
    }

    /// Run until a shutdown signal arrives (or the signal channel
    /// closes). Jobs still queued at shutdown are rejected with
    /// [`DispatchError::QueueClosed`].
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) {
        tracing::info!(
            rate_limit_ms = self.inner.gate.interval().as_millis() as u64,
            max_retries = self.inner.config.max_retries,
            send_timeout_ms = self.inner.config.send_timeout_ms,
            "dispatch worker started"
        );

        loop {
            if matches!(shutdown.try_recv(), Ok(_)) {
                break;
            }

            let popped = self.inner.jobs.lock().pop_front();
            let job = match popped {
                Some(job) => job,
                None => {
                    self.inner.busy.store(false, Ordering::SeqCst);
                    tokio::select! {
                        () = self.inner.notify.notified() => continue,
                        _ = shutdown.recv() => break,
                    }
                }
            };
            self.inner.busy.store(true, Ordering::SeqCst);

            let wait = self.inner.gate.time_until_ready();
            if !wait.is_zero() {
                tracing::debug!(
                    job_id = %job.id,
                    wait_ms = wait.as_millis() as u64,
                    "waiting out the send interval"
                );
                if !sleep_or_shutdown(wait, &mut shutdown).await {
                    self.inner.jobs.lock().push_front(job);
                    break;
                }
            }

            if !self.attempt(job, &mut shutdown).await {
                break;
            }
        }

        self.close();
    }

    /// One send attempt. Returns `false` when a shutdown signal arrived
    /// during the retry-delay wait.
    async fn attempt(&self, job: Job, shutdown: &mut broadcast::Receiver<Signal>) -> bool {
        let timeout = self.inner.config.send_timeout();
        tracing::debug!(job_id = %job.id, retries = job.retries, "attempting send");

        match tokio::time::timeout(timeout, self.transport.send(&job.email)).await {
            Ok(Ok(receipt)) => {
                self.inner.gate.record_send();
                tracing::info!(
                    job_id = %job.id,
                    message_id = %receipt.message_id,
                    "message relayed"
                );
                job.resolve(receipt);
                true
            }
            // A rate signal from the relay: back to the front of the
            // queue, no retry consumed.
            Ok(Err(error)) if error.is_transient() => {
                tracing::warn!(
                    job_id = %job.id,
                    error = %error,
                    retry_delay_ms = self.inner.config.retry_delay_ms,
                    "transient failure, requeueing at the front"
                );
                self.inner.jobs.lock().push_front(job);
                sleep_or_shutdown(self.inner.config.retry_delay(), shutdown).await
            }
            Ok(Err(error)) => {
                self.counted_failure(job, AttemptFailure::Transport(error));
                true
            }
            Err(_elapsed) => {
                self.counted_failure(
                    job,
                    AttemptFailure::TimedOut(self.inner.config.send_timeout_ms),
                );
                true
            }
        }
    }

    /// A failure that counts against the retry bound: requeue at the
    /// back while under the bound, reject otherwise.
    fn counted_failure(&self, mut job: Job, failure: AttemptFailure) {
        job.retries += 1;

        if job.retries < self.inner.config.max_retries {
            tracing::warn!(
                job_id = %job.id,
                retries = job.retries,
                error = %failure,
                "send failed, requeueing at the back"
            );
            self.inner.jobs.lock().push_back(job);
        } else {
            let attempts = job.retries;
            tracing::error!(
                job_id = %job.id,
                attempts,
                error = %failure,
                "retry bound reached, rejecting job"
            );
            job.reject(failure.into_error(attempts));
        }
    }

    fn close(&self) {
        let pending: Vec<Job> = self.inner.jobs.lock().drain(..).collect();
        if !pending.is_empty() {
            tracing::warn!(
                pending = pending.len(),
                "rejecting jobs still queued at shutdown"
            );
        }
        for job in pending {
            job.reject(DispatchError::QueueClosed);
        }
        self.inner.busy.store(false, Ordering::SeqCst);
        tracing::info!("dispatch worker stopped");
    }
}

async fn sleep_or_shutdown(
    duration: Duration,
    shutdown: &mut broadcast::Receiver<Signal>,
) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        _ = shutdown.recv() => false,
    }
}
