//! Inbound gateway callback endpoints.
//!
//! Both endpoints are guest-accessible and tolerant about the body: the
//! gateway delivers raw JSON from server-side notifications and
//! form-encoded fields from hosted-page redirects. `/api/waafipay/callback`
//! answers with a JSON body; `/waafipay/callback` redirects the payer's
//! browser to the configured landing page.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Redirect;
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::api::AppState;
use crate::pipeline::{CallbackNotification, CallbackOutcome, ExecutionContext};

/// Decode the body as JSON first, then as a form. An undecodable body
/// yields an empty notification, which the pipeline records as a failure.
fn parse_body(body: &[u8]) -> Value {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        return value;
    }
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        Ok(pairs) => Value::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        ),
        Err(_) => {
            warn!("callback body is neither JSON nor form-encoded");
            Value::Null
        }
    }
}

pub async fn callback(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let notification = CallbackNotification::from_value(parse_body(&body));
    let ctx = ExecutionContext::elevated("waafipay-callback");

    match state.pipeline.handle_callback(&ctx, &notification).await {
        Ok(CallbackOutcome::Completed { .. }) => {
            Json(json!({ "message": "Callback processed successfully." }))
        }
        Ok(CallbackOutcome::Failed { reason }) => Json(json!({ "error": reason })),
        Err(err) => Json(json!({ "error": err.to_string() })),
    }
}

pub async fn webhook(State(state): State<AppState>, body: Bytes) -> Redirect {
    let notification = CallbackNotification::from_value(parse_body(&body));
    let ctx = ExecutionContext::elevated("waafipay-webhook");

    let (success_url, failure_url) = state
        .pipeline
        .landing_urls()
        .await
        .unwrap_or_else(|err| {
            warn!("cannot load landing pages: {err}");
            (
                "/waafipay-payment-success".to_string(),
                "/waafipay-payment-failure".to_string(),
            )
        });

    match state.pipeline.handle_callback(&ctx, &notification).await {
        Ok(outcome) if outcome.is_completed() => Redirect::to(&success_url),
        _ => Redirect::to(&failure_url),
    }
}
