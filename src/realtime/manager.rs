use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::config::{
    BACKOFF_BASE_MS, BACKOFF_CAP_MS, HEARTBEAT_INTERVAL_SECS, SUBSCRIBE_TIMEOUT_SECS,
};
use crate::error::SubscriptionError;
use crate::realtime::listener::RealtimeListener;
use crate::types::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Disconnected,
    Connecting,
    Subscribed,
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubscriptionState::Disconnected => "disconnected",
            SubscriptionState::Connecting => "connecting",
            SubscriptionState::Subscribed => "subscribed",
        };
        write!(f, "{s}")
    }
}

/// Exponential reconnect delay: `base * 2^retry`, capped. Retries are unbounded.
#[derive(Debug, Clone)]
pub struct Backoff {
    retry_count: u32,
    base_ms: u64,
    cap_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BACKOFF_BASE_MS, BACKOFF_CAP_MS)
    }
}

impl Backoff {
    pub fn new(base_ms: u64, cap_ms: u64) -> Self {
        Self { retry_count: 0, base_ms, cap_ms }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay before the next attempt; advances the retry count.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u64.checked_shl(self.retry_count).unwrap_or(u64::MAX);
        let ms = self.base_ms.saturating_mul(factor).min(self.cap_ms);
        self.retry_count = self.retry_count.saturating_add(1);
        Duration::from_millis(ms)
    }

    pub fn reset(&mut self) {
        self.retry_count = 0;
    }
}

/// Keeps exactly one realtime listener alive and forwards every created job.
///
/// Jobs go out on an unbounded channel so a slow job never stalls the socket.
pub struct SubscriptionManager {
    url: String,
    access_token: String,
    jobs_tx: mpsc::UnboundedSender<Job>,
    health: Arc<HealthState>,
    backoff: Backoff,
    listener: Option<RealtimeListener>,
    subscribe_timeout: Duration,
    heartbeat_interval: Duration,
}

impl SubscriptionManager {
    pub fn new(
        url: String,
        access_token: String,
        jobs_tx: mpsc::UnboundedSender<Job>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            url,
            access_token,
            jobs_tx,
            health,
            backoff: Backoff::default(),
            listener: None,
            subscribe_timeout: Duration::from_secs(SUBSCRIBE_TIMEOUT_SECS),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_subscribe_timeout(mut self, subscribe_timeout: Duration) -> Self {
        self.subscribe_timeout = subscribe_timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    /// Runs until the job receiver is dropped.
    pub async fn run(mut self) {
        loop {
            let err = self.connect().await;
            self.health.set_subscription_state(SubscriptionState::Disconnected);
            if self.jobs_tx.is_closed() {
                info!("Job receiver dropped, stopping subscription");
                if let Some(old) = self.listener.take() {
                    old.close().await;
                }
                return;
            }

            let retry = self.backoff.retry_count();
            let delay = self.backoff.next_delay();
            warn!(
                retry,
                delay_ms = delay.as_millis() as u64,
                "Realtime subscription lost ({err}), reconnecting in {}ms",
                delay.as_millis(),
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One connection attempt. Returns only when the listener has failed.
    async fn connect(&mut self) -> SubscriptionError {
        if let Some(old) = self.listener.take() {
            old.close().await;
        }

        self.health.set_subscription_state(SubscriptionState::Connecting);
        info!(retry = self.backoff.retry_count(), "Realtime connecting to change feed");

        let listener = match timeout(
            self.subscribe_timeout,
            RealtimeListener::open(&self.url, &self.access_token, self.heartbeat_interval),
        )
        .await
        {
            Ok(Ok(l)) => self.listener.insert(l),
            Ok(Err(e)) => return e,
            Err(_) => return SubscriptionError::Timeout,
        };

        match timeout(self.subscribe_timeout, listener.await_joined()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return e,
            Err(_) => return SubscriptionError::Timeout,
        }

        self.backoff.reset();
        self.health.set_subscription_state(SubscriptionState::Subscribed);
        info!("Realtime subscribed to job inserts");

        loop {
            match listener.next_job().await {
                Ok(job) => {
                    info!(job_id = %job.id, "New job received");
                    if self.jobs_tx.send(job).is_err() {
                        return SubscriptionError::ChannelError("job receiver dropped".to_string());
                    }
                }
                Err(e) => {
                    error!("Realtime listener failed: {e}");
                    return e;
                }
            }
        }
    }
}
