//! Minimum inter-send interval enforcement
//!
//! The relay cap is expressed as sends per minute; the gate turns that
//! into a minimum spacing between consecutive transport sends. Gating
//! uses the tokio clock so tests can drive it deterministically; the
//! wall-clock timestamp of the last send is kept separately for status
//! reporting.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub(crate) struct RateGate {
    interval: Duration,
    last_send: Mutex<Option<Instant>>,
    /// Epoch milliseconds of the last successful send, 0 when none.
    last_send_epoch_ms: AtomicU64,
}

impl RateGate {
    pub(crate) const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_send: Mutex::new(None),
            last_send_epoch_ms: AtomicU64::new(0),
        }
    }

    /// How long the worker must still wait before the next send.
    pub(crate) fn time_until_ready(&self) -> Duration {
        self.last_send.lock().map_or(Duration::ZERO, |last| {
            (last + self.interval).saturating_duration_since(Instant::now())
        })
    }

    /// Record a successful send at the current instant.
    pub(crate) fn record_send(&self) {
        *self.last_send.lock() = Some(Instant::now());
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        self.last_send_epoch_ms
            .store(u64::try_from(epoch_ms).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub(crate) fn last_send_epoch_ms(&self) -> u64 {
        self.last_send_epoch_ms.load(Ordering::Relaxed)
    }

    pub(crate) const fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn gate_is_open_before_first_send() {
        let gate = RateGate::new(Duration::from_secs(1));
        assert_eq!(gate.time_until_ready(), Duration::ZERO);
        assert_eq!(gate.last_send_epoch_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_closes_for_one_interval_after_a_send() {
        let gate = RateGate::new(Duration::from_secs(1));
        gate.record_send();
        assert_eq!(gate.time_until_ready(), Duration::from_secs(1));

        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(gate.time_until_ready(), Duration::from_millis(600));

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(gate.time_until_ready(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn record_send_updates_wall_clock_timestamp() {
        let gate = RateGate::new(Duration::from_secs(1));
        gate.record_send();
        assert!(gate.last_send_epoch_ms() > 0);
    }
}
