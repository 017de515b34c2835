//! HTTP boundary: inbound callback endpoints and interactive operations.

pub mod callback;
pub mod health;
pub mod payments;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::config::Config;
use crate::pipeline::ReconciliationPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<ReconciliationPipeline>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/waafipay/callback", post(callback::callback))
        .route("/waafipay/callback", post(callback::webhook))
        .route("/api/payments/phone", post(payments::request_phone_payment))
        .route("/api/payments/link", post(payments::generate_payment_link))
        .route("/api/payments/try-again", post(payments::try_again))
        .with_state(state)
}
