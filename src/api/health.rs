//! Shared health state for the /health endpoint.
//! Updated by SubscriptionManager and JobDispatcher.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::realtime::SubscriptionState;

/// Shared liveness metrics. Updated by service components, read by API.
pub struct HealthState {
    subscription_state: AtomicU8,
    /// Jobs handed to a worker task since process start.
    jobs_started: AtomicU64,
    /// Jobs whose run finished (with or without page failures).
    jobs_completed: AtomicU64,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            subscription_state: AtomicU8::new(encode(SubscriptionState::Disconnected)),
            jobs_started: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
        }
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_subscription_state(&self, state: SubscriptionState) {
        self.subscription_state.store(encode(state), Ordering::Relaxed);
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        match self.subscription_state.load(Ordering::Relaxed) {
            1 => SubscriptionState::Connecting,
            2 => SubscriptionState::Subscribed,
            _ => SubscriptionState::Disconnected,
        }
    }

    pub fn inc_jobs_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn jobs_started(&self) -> u64 {
        self.jobs_started.load(Ordering::Relaxed)
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }
}

fn encode(state: SubscriptionState) -> u8 {
    match state {
        SubscriptionState::Disconnected => 0,
        SubscriptionState::Connecting => 1,
        SubscriptionState::Subscribed => 2,
    }
}
