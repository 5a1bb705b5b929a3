use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::api::health::HealthState;
use crate::realtime::SubscriptionState;

#[derive(Clone)]
pub struct ApiState {
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub subscription: String,
    pub jobs_started: u64,
    pub jobs_completed: u64,
    pub jobs_running: u64,
}

/// 200 while subscribed, 503 while reconnecting. The body is the same either way.
async fn get_health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let h = &state.health;
    let subscription = h.subscription_state();
    let started = h.jobs_started();
    let completed = h.jobs_completed();

    let (code, status) = if subscription == SubscriptionState::Subscribed {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            subscription: subscription.to_string(),
            jobs_started: started,
            jobs_completed: completed,
            jobs_running: started.saturating_sub(completed),
        }),
    )
}
