//! WaafiPay HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::gateway::traits::PaymentGateway;
use crate::gateway::types::{
    CommitRequest, GatewayResponse, HostedLinkRequest, PreauthorizeRequest, ServiceRequest,
};
use crate::store::documents::GatewayCredentials;

/// Path of the single service endpoint
const ASM_PATH: &str = "/asm";

pub struct WaafiPayGateway {
    credentials: GatewayCredentials,
    client: Client,
}

impl WaafiPayGateway {
    pub fn new(credentials: GatewayCredentials, timeout_secs: u64) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            credentials,
            client,
        })
    }

    pub fn credentials(&self) -> &GatewayCredentials {
        &self.credentials
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.credentials.base_url.trim_end_matches('/'),
            ASM_PATH
        )
    }
}

#[async_trait]
impl PaymentGateway for WaafiPayGateway {
    fn prepare_preauthorize(&self, request: &PreauthorizeRequest) -> AppResult<ServiceRequest> {
        ServiceRequest::preauthorize(&self.credentials, request)
    }

    fn prepare_commit(&self, request: &CommitRequest) -> AppResult<ServiceRequest> {
        Ok(ServiceRequest::preauthorize_commit(
            &self.credentials,
            request,
        ))
    }

    fn prepare_hosted_link(&self, request: &HostedLinkRequest) -> AppResult<ServiceRequest> {
        ServiceRequest::hpp_purchase(&self.credentials, request)
    }

    async fn dispatch(&self, envelope: &ServiceRequest) -> AppResult<GatewayResponse> {
        let url = self.endpoint();
        info!(
            service = %envelope.service_name,
            request_id = %envelope.request_id,
            "dispatching WaafiPay request"
        );

        let response = self
            .client
            .post(&url)
            .header(http::header::ACCEPT, "application/json")
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                error!(service = %envelope.service_name, "WaafiPay transport failure: {e}");
                AppError::transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::transport(format!("cannot read response body: {e}")))?;

        if !status.is_success() {
            error!(service = %envelope.service_name, %status, "WaafiPay HTTP error");
            return Err(AppError::transport(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GatewayResponse = serde_json::from_str(&body).map_err(|e| {
            error!(service = %envelope.service_name, "unparseable WaafiPay response: {e}");
            AppError::transport(format!("invalid response format: {e}"))
        })?;

        info!(
            service = %envelope.service_name,
            request_id = %envelope.request_id,
            response_code = parsed.response_code.as_deref().unwrap_or("-"),
            state = parsed.state().unwrap_or("-"),
            "WaafiPay response received"
        );

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> WaafiPayGateway {
        let credentials = GatewayCredentials {
            name: "Default WaafiPay".into(),
            merchant_uid: "M0910291".into(),
            api_user_id: "1000297".into(),
            api_key: "API-TEST-KEY".into(),
            base_url: "https://api.waafipay.com/".into(),
            supported_currencies: vec!["USD".into()],
            success_url: "/ok".into(),
            failure_url: "/fail".into(),
            store_id: None,
            hpp_key: None,
        };
        WaafiPayGateway::new(credentials, 30).unwrap()
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(gateway().endpoint(), "https://api.waafipay.com/asm");
    }

    #[test]
    fn prepare_rejects_unsupported_currency_without_io() {
        let err = gateway()
            .prepare_preauthorize(&PreauthorizeRequest {
                phone_number: "252611111111".into(),
                amount: 5.0,
                currency: "KES".into(),
                reference_id: "ref-1".into(),
                invoice_id: None,
            })
            .unwrap_err();
        assert!(err.is_validation());
    }
}
