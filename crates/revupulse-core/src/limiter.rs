//! Hourly fixed-window rate limiter with a deferred-send queue
//!
//! The window is anchored at `hour_start_time` and never slides. A send is
//! admitted while `current_hour_count < max_per_hour`; overflow is queued
//! FIFO and drained only on explicit request. Expired windows reset lazily
//! on the dispatch path and eagerly from the background expiry task.

use chrono::{DateTime, Duration, Utc};
use revupulse_storage::models::{QueuedSend, SendRequest};
use revupulse_storage::RateLimitRepository;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

/// Admission decision for one send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPermit {
    /// Whether the counter is below the hourly ceiling
    pub can_send: bool,
    /// Whether the window has expired and should be reset before sending
    pub reset_needed: bool,
}

/// Snapshot of the limiter for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub current_count: u32,
    pub max_count: u32,
    pub queue_size: usize,
    /// Whole minutes until the window expires, rounded up, never negative
    pub minutes_until_reset: i64,
    pub can_send: bool,
}

/// Rate limiter service over the persisted singleton state
pub struct RateLimiter {
    repo: Arc<RateLimitRepository>,
}

impl RateLimiter {
    pub fn new(repo: Arc<RateLimitRepository>) -> Self {
        Self { repo }
    }

    fn window_expired(hour_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - hour_start >= Duration::hours(1)
    }

    fn minutes_until_reset(hour_start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let remaining_secs = 3600 - (now - hour_start).num_seconds();
        if remaining_secs <= 0 {
            0
        } else {
            (remaining_secs + 59) / 60
        }
    }

    /// Whether the current window has expired as of `now`
    pub async fn check_window_at(&self, now: DateTime<Utc>) -> bool {
        let state = self.repo.snapshot().await;
        Self::window_expired(state.hour_start_time, now)
    }

    pub async fn check_window(&self) -> bool {
        self.check_window_at(Utc::now()).await
    }

    /// Reset the window: counter to zero, anchor to `now`
    ///
    /// Idempotent; resetting a fresh window just re-anchors it.
    pub async fn reset_window_at(&self, now: DateTime<Utc>) {
        self.repo
            .mutate(|state| {
                state.current_hour_count = 0;
                state.hour_start_time = now;
            })
            .await;
        debug!("Rate limit window reset at {}", now);
    }

    pub async fn reset_window(&self) {
        self.reset_window_at(Utc::now()).await;
    }

    /// Evaluate admission for one send as of `now`
    pub async fn can_send_at(&self, now: DateTime<Utc>) -> SendPermit {
        let state = self.repo.snapshot().await;
        let reset_needed = Self::window_expired(state.hour_start_time, now);
        SendPermit {
            can_send: reset_needed || state.current_hour_count < state.max_per_hour,
            reset_needed,
        }
    }

    pub async fn can_send(&self) -> SendPermit {
        self.can_send_at(Utc::now()).await
    }

    /// Count one admitted send against the current window
    pub async fn increment(&self) -> u32 {
        self.repo
            .mutate(|state| {
                state.current_hour_count += 1;
                state.current_hour_count
            })
            .await
    }

    /// Defer a send to the back of the queue, stamped with `now`
    ///
    /// Returns the queue size after the append.
    pub async fn enqueue_at(&self, request: SendRequest, now: DateTime<Utc>) -> usize {
        let size = self
            .repo
            .mutate(|state| {
                state.queued_emails.push(QueuedSend {
                    request,
                    queued_at: now,
                });
                state.queued_emails.len()
            })
            .await;
        info!("Send deferred, {} emails queued", size);
        size
    }

    pub async fn enqueue(&self, request: SendRequest) -> usize {
        self.enqueue_at(request, Utc::now()).await
    }

    /// Pop the oldest queued send, only while the window has headroom
    ///
    /// Does not count against the limit; the caller increments after a
    /// successful dispatch.
    pub async fn dequeue_next(&self) -> Option<SendRequest> {
        self.repo
            .mutate(|state| {
                if state.current_hour_count < state.max_per_hour
                    && !state.queued_emails.is_empty()
                {
                    Some(state.queued_emails.remove(0).request)
                } else {
                    None
                }
            })
            .await
    }

    /// Limiter snapshot as of `now`
    pub async fn status_at(&self, now: DateTime<Utc>) -> RateLimitStatus {
        let state = self.repo.snapshot().await;
        let reset_needed = Self::window_expired(state.hour_start_time, now);
        RateLimitStatus {
            current_count: state.current_hour_count,
            max_count: state.max_per_hour,
            queue_size: state.queued_emails.len(),
            minutes_until_reset: Self::minutes_until_reset(state.hour_start_time, now),
            can_send: reset_needed || state.current_hour_count < state.max_per_hour,
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        self.status_at(Utc::now()).await
    }

    /// Spawn the background expiry tick
    ///
    /// Checks every `tick_interval_secs` whether the window has expired and
    /// resets it when it has. The returned handle aborts the task on drop.
    pub fn spawn_expiry_task(self: &Arc<Self>, tick_interval_secs: u64) -> ExpiryTaskHandle {
        let limiter = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(std::time::Duration::from_secs(tick_interval_secs));
            loop {
                ticker.tick().await;
                if limiter.check_window().await {
                    info!("Rate limit window expired, resetting");
                    limiter.reset_window().await;
                }
            }
        });
        ExpiryTaskHandle { handle }
    }
}

/// Handle to the background expiry task; aborts the task when dropped
pub struct ExpiryTaskHandle {
    handle: JoinHandle<()>,
}

impl ExpiryTaskHandle {
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for ExpiryTaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
