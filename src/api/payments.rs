//! Interactive payment operations.
//!
//! These mirror the ERP-side whitelisted endpoints: the caller always gets
//! a `{status, message}` body back, with failures reported in-band rather
//! than as HTTP errors.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::AppState;
use crate::pipeline::ExecutionContext;

#[derive(Debug, Deserialize)]
pub struct PhonePaymentBody {
    pub invoice: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TryAgainBody {
    pub log_entry: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkBody {
    pub payment_request: String,
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl OperationResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: "Success",
            message: message.into(),
            link: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            status: "Failed",
            message: message.into(),
            link: None,
        }
    }
}

pub async fn request_phone_payment(
    State(state): State<AppState>,
    Json(body): Json<PhonePaymentBody>,
) -> Json<OperationResponse> {
    let ctx = ExecutionContext::interactive("api");
    match state
        .pipeline
        .run_phone_payment(&ctx, &body.invoice, body.phone.as_deref())
        .await
    {
        Ok(outcome) => Json(OperationResponse::success(format!(
            "Phone payment requested for invoice {} (reference {})",
            body.invoice, outcome.reference_id
        ))),
        Err(err) => {
            warn!(invoice = %body.invoice, "phone payment failed: {err}");
            Json(OperationResponse::failed(err.to_string()))
        }
    }
}

pub async fn try_again(
    State(state): State<AppState>,
    Json(body): Json<TryAgainBody>,
) -> Json<OperationResponse> {
    let ctx = ExecutionContext::interactive("api");
    match state.pipeline.try_again(&ctx, &body.log_entry).await {
        Ok(Some(entry)) => Json(OperationResponse::success(format!(
            "Payment entry {entry} created"
        ))),
        Ok(None) => Json(OperationResponse::success(
            "Payment entry already exists; nothing to do",
        )),
        Err(err) => {
            warn!(log_entry = %body.log_entry, "retry failed: {err}");
            Json(OperationResponse::failed(err.to_string()))
        }
    }
}

pub async fn generate_payment_link(
    State(state): State<AppState>,
    Json(body): Json<PaymentLinkBody>,
) -> Json<OperationResponse> {
    let ctx = ExecutionContext::interactive("api");
    match state
        .pipeline
        .generate_payment_link(&ctx, &body.payment_request)
        .await
    {
        Ok(link) => {
            let mut response = OperationResponse::success("Payment link generated");
            response.link = Some(link);
            Json(response)
        }
        Err(err) => {
            warn!(payment_request = %body.payment_request, "link generation failed: {err}");
            Json(OperationResponse::failed(err.to_string()))
        }
    }
}
