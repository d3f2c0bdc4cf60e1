//! The dispatch queue callers enqueue into

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use courier_transport::{Email, MailTransport};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

use crate::{
    config::DispatchConfig,
    job::{Job, SendHandle},
    rate::RateGate,
    worker::DrainWorker,
};

/// Shared queue state. Single consumer (the drain worker); enqueue is
/// the only external mutator and only ever appends.
#[derive(Debug)]
pub(crate) struct QueueInner {
    pub(crate) jobs: Mutex<VecDeque<Job>>,
    /// True while the worker is draining (including in-flight sends and
    /// rate waits), false when idle.
    pub(crate) busy: AtomicBool,
    pub(crate) notify: Notify,
    pub(crate) gate: RateGate,
    pub(crate) config: DispatchConfig,
}

/// An owned, cheaply clonable dispatch queue.
///
/// Construction also yields the queue's single [`DrainWorker`]; spawn
/// its [`serve`](DrainWorker::serve) future once. Handlers keep clones
/// of the queue and only ever enqueue and query status, so tests can
/// build as many isolated queues as they like.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    inner: Arc<QueueInner>,
}

impl DispatchQueue {
    /// Create a queue and its drain worker.
    #[must_use]
    pub fn new(
        config: DispatchConfig,
        transport: Arc<dyn MailTransport>,
    ) -> (Self, DrainWorker) {
        let inner = Arc::new(QueueInner {
            jobs: Mutex::new(VecDeque::new()),
            busy: AtomicBool::new(false),
            notify: Notify::new(),
            gate: RateGate::new(config.min_send_interval()),
            config,
        });
        let queue = Self {
            inner: Arc::clone(&inner),
        };
        (queue, DrainWorker::new(inner, transport))
    }

    /// Append a job and return its handle. Never blocks; the worker is
    /// woken if it was idle, and a wake-up while draining is a no-op.
    pub fn enqueue(&self, email: Email) -> SendHandle {
        let (job, handle) = Job::new(email);
        tracing::debug!(
            job_id = %job.id,
            recipients = job.email.to.len(),
            "job enqueued"
        );
        self.inner.jobs.lock().push_back(job);
        self.inner.notify.notify_one();
        handle
    }

    /// Number of pending (not in-flight) jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    /// Whether no jobs are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.jobs.lock().is_empty()
    }

    /// Snapshot of the queue for the status endpoint.
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.len(),
            is_processing: self.inner.busy.load(Ordering::SeqCst),
            last_email_time: self.inner.gate.last_send_epoch_ms(),
            rate_limit_ms: u64::try_from(self.inner.gate.interval().as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Pending jobs, excluding the one currently in flight.
    pub queue_length: usize,
    /// Whether the drain worker is busy.
    pub is_processing: bool,
    /// Epoch milliseconds of the last successful send, 0 when none.
    pub last_email_time: u64,
    /// Enforced minimum interval between sends.
    pub rate_limit_ms: u64,
}
