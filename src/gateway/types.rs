//! WaafiPay wire types.
//!
//! The gateway exposes a single `/asm` endpoint; the service being invoked
//! is named inside the envelope. Field names follow the gateway's camelCase
//! schema exactly, so a logged payload is byte-comparable with what went
//! over the wire (secrets excepted, see [`ServiceRequest::redacted`]).

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::documents::GatewayCredentials;

pub const SCHEMA_VERSION: &str = "1.0";
pub const CHANNEL_WEB: &str = "WEB";
pub const PAYMENT_METHOD_WALLET: &str = "MWALLET_ACCOUNT";

pub const SERVICE_PREAUTHORIZE: &str = "API_PREAUTHORIZE";
pub const SERVICE_PREAUTHORIZE_COMMIT: &str = "API_PREAUTHORIZE_COMMIT";
pub const SERVICE_HPP_PURCHASE: &str = "HPP_PURCHASE";

/// Gateway-level success, independent of the HTTP status
pub const RESPONSE_CODE_OK: &str = "2001";
pub const STATE_APPROVED: &str = "APPROVED";
pub const STATE_RCS_SUCCESS: &str = "RCS_SUCCESS";

const REDACTED: &str = "***";

/// Amounts cross the wire as 2-decimal strings
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Inputs for a preauthorization call
#[derive(Debug, Clone, PartialEq)]
pub struct PreauthorizeRequest {
    pub phone_number: String,
    pub amount: f64,
    pub currency: String,
    pub reference_id: String,
    pub invoice_id: Option<String>,
}

/// Inputs for committing a preauthorized hold
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRequest {
    pub transaction_id: String,
    pub reference_id: String,
}

/// Inputs for a hosted-payment-page link
#[derive(Debug, Clone, PartialEq)]
pub struct HostedLinkRequest {
    pub reference: String,
    pub amount: f64,
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayerInfo {
    pub account_no: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionInfo {
    pub reference_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    pub amount: String,
    pub currency: String,
    pub description: String,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceParams {
    pub merchant_uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpp_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpp_success_callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpp_failure_callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpp_resp_data_format: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_info: Option<PayerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_info: Option<TransactionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// Keys must not leak through debug logging
impl fmt::Debug for ServiceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceParams")
            .field("merchant_uid", &self.merchant_uid)
            .field("api_user_id", &self.api_user_id)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("store_id", &self.store_id)
            .field("hpp_key", &self.hpp_key.as_ref().map(|_| REDACTED))
            .field("payment_method", &self.payment_method)
            .field("payer_info", &self.payer_info)
            .field("transaction_info", &self.transaction_info)
            .field("transaction_id", &self.transaction_id)
            .field("reference_id", &self.reference_id)
            .finish_non_exhaustive()
    }
}

/// Canonical request envelope for the `/asm` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub schema_version: String,
    pub request_id: String,
    pub timestamp: String,
    pub channel_name: String,
    pub service_name: String,
    pub service_params: ServiceParams,
}

impl ServiceRequest {
    fn envelope(service_name: &str, params: ServiceParams) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            channel_name: CHANNEL_WEB.to_string(),
            service_name: service_name.to_string(),
            service_params: params,
        }
    }

    pub fn preauthorize(
        credentials: &GatewayCredentials,
        request: &PreauthorizeRequest,
    ) -> AppResult<Self> {
        if !credentials.supports_currency(&request.currency) {
            return Err(AppError::UnsupportedCurrency {
                currency: request.currency.clone(),
            });
        }

        let description = match &request.invoice_id {
            Some(invoice) => format!("Payment for Sales Invoice {invoice} via WaafiPay"),
            None => format!("Payment for {}", request.reference_id),
        };

        Ok(Self::envelope(
            SERVICE_PREAUTHORIZE,
            ServiceParams {
                merchant_uid: credentials.merchant_uid.clone(),
                api_user_id: Some(credentials.api_user_id.clone()),
                api_key: Some(credentials.api_key.clone()),
                payment_method: Some(PAYMENT_METHOD_WALLET.to_string()),
                payer_info: Some(PayerInfo {
                    account_no: request.phone_number.clone(),
                }),
                transaction_info: Some(TransactionInfo {
                    reference_id: request.reference_id.clone(),
                    invoice_id: request.invoice_id.clone(),
                    amount: format_amount(request.amount),
                    currency: request.currency.clone(),
                    description,
                }),
                ..ServiceParams::default()
            },
        ))
    }

    pub fn preauthorize_commit(
        credentials: &GatewayCredentials,
        request: &CommitRequest,
    ) -> Self {
        Self::envelope(
            SERVICE_PREAUTHORIZE_COMMIT,
            ServiceParams {
                merchant_uid: credentials.merchant_uid.clone(),
                api_user_id: Some(credentials.api_user_id.clone()),
                api_key: Some(credentials.api_key.clone()),
                transaction_id: Some(request.transaction_id.clone()),
                reference_id: Some(request.reference_id.clone()),
                description: Some(format!(
                    "Commit for preauthorized transaction {}",
                    request.transaction_id
                )),
                ..ServiceParams::default()
            },
        )
    }

    pub fn hpp_purchase(
        credentials: &GatewayCredentials,
        request: &HostedLinkRequest,
    ) -> AppResult<Self> {
        let (store_id, hpp_key) = match (&credentials.store_id, &credentials.hpp_key) {
            (Some(store_id), Some(hpp_key)) => (store_id.clone(), hpp_key.clone()),
            _ => {
                return Err(AppError::validation(
                    "hosted payment pages are not configured for this gateway account",
                ))
            }
        };

        Ok(Self::envelope(
            SERVICE_HPP_PURCHASE,
            ServiceParams {
                merchant_uid: credentials.merchant_uid.clone(),
                store_id: Some(store_id),
                hpp_key: Some(hpp_key),
                payment_method: Some(PAYMENT_METHOD_WALLET.to_string()),
                hpp_success_callback_url: Some(credentials.success_url.clone()),
                hpp_failure_callback_url: Some(credentials.failure_url.clone()),
                hpp_resp_data_format: Some(1),
                transaction_info: Some(TransactionInfo {
                    reference_id: request.reference.clone(),
                    invoice_id: None,
                    amount: format_amount(request.amount),
                    currency: request.currency.clone(),
                    description: request.description.clone(),
                }),
                ..ServiceParams::default()
            },
        ))
    }

    /// Copy with secret fields masked; this is the only form that may be
    /// persisted or logged.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.service_params.api_key.is_some() {
            copy.service_params.api_key = Some(REDACTED.to_string());
        }
        if copy.service_params.hpp_key.is_some() {
            copy.service_params.hpp_key = Some(REDACTED.to_string());
        }
        copy
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_amount: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpp_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_payment_link: Option<String>,
}

/// Parsed gateway response. HTTP status and `responseCode` are independent
/// axes; a 200 with a non-"2001" code is still a rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<ResponseParams>,
}

impl GatewayResponse {
    /// Gateway-level success: responseCode "2001" and no non-zero errorCode
    pub fn is_ok(&self) -> bool {
        let code_ok = self.response_code.as_deref() == Some(RESPONSE_CODE_OK);
        let error_ok = self
            .error_code
            .as_deref()
            .map_or(true, |code| code == "0" || code.is_empty());
        code_ok && error_ok
    }

    /// Whichever of responseMsg/responseMessage the gateway sent
    pub fn message(&self) -> Option<&str> {
        self.response_msg
            .as_deref()
            .or(self.response_message.as_deref())
    }

    pub fn message_or(&self, fallback: &'static str) -> String {
        self.message().unwrap_or(fallback).to_string()
    }

    pub fn state(&self) -> Option<&str> {
        self.params.as_ref().and_then(|p| p.state.as_deref())
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.params.as_ref().and_then(|p| p.transaction_id.as_deref())
    }

    pub fn reference_id(&self) -> Option<&str> {
        self.params.as_ref().and_then(|p| p.reference_id.as_deref())
    }

    /// HPP link: `hppUrl`, falling back to `directPaymentLink`
    pub fn payment_link(&self) -> Option<&str> {
        self.params.as_ref().and_then(|p| {
            p.hpp_url
                .as_deref()
                .or(p.direct_payment_link.as_deref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_credentials() -> GatewayCredentials {
        GatewayCredentials {
            name: "Default WaafiPay".into(),
            merchant_uid: "M0910291".into(),
            api_user_id: "1000297".into(),
            api_key: "API-TEST-KEY".into(),
            base_url: "https://api.waafipay.com".into(),
            supported_currencies: vec!["USD".into(), "SOS".into()],
            success_url: "https://shop.example/waafipay-payment-success".into(),
            failure_url: "https://shop.example/waafipay-payment-failure".into(),
            store_id: Some("4001".into()),
            hpp_key: Some("HPP-TEST-KEY".into()),
        }
    }

    fn preauth_request() -> PreauthorizeRequest {
        PreauthorizeRequest {
            phone_number: "252611111111".into(),
            amount: 10.0,
            currency: "USD".into(),
            reference_id: "ref-1".into(),
            invoice_id: Some("SI-00001".into()),
        }
    }

    #[test]
    fn amount_is_a_two_decimal_string() {
        assert_eq!(format_amount(10.0), "10.00");
        assert_eq!(format_amount(10.556), "10.56");
        assert_eq!(format_amount(0.1), "0.10");
    }

    #[test]
    fn preauthorize_envelope_matches_gateway_schema() {
        let envelope =
            ServiceRequest::preauthorize(&test_credentials(), &preauth_request()).unwrap();

        assert_eq!(envelope.schema_version, "1.0");
        assert_eq!(envelope.channel_name, "WEB");
        assert_eq!(envelope.service_name, SERVICE_PREAUTHORIZE);

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["serviceParams"]["merchantUid"], "M0910291");
        assert_eq!(json["serviceParams"]["paymentMethod"], "MWALLET_ACCOUNT");
        assert_eq!(
            json["serviceParams"]["payerInfo"]["accountNo"],
            "252611111111"
        );
        assert_eq!(
            json["serviceParams"]["transactionInfo"]["amount"],
            "10.00"
        );
        assert_eq!(
            json["serviceParams"]["transactionInfo"]["referenceId"],
            "ref-1"
        );
        assert_eq!(
            json["serviceParams"]["transactionInfo"]["invoiceId"],
            "SI-00001"
        );
    }

    #[test]
    fn preauthorize_rejects_unsupported_currency() {
        let mut request = preauth_request();
        request.currency = "EUR".into();
        let err = ServiceRequest::preauthorize(&test_credentials(), &request).unwrap_err();
        assert_eq!(
            err,
            AppError::UnsupportedCurrency {
                currency: "EUR".into()
            }
        );
    }

    #[test]
    fn commit_envelope_names_the_commit_service() {
        let envelope = ServiceRequest::preauthorize_commit(
            &test_credentials(),
            &CommitRequest {
                transaction_id: "T1".into(),
                reference_id: "ref-1".into(),
            },
        );
        assert_eq!(envelope.service_name, SERVICE_PREAUTHORIZE_COMMIT);

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["serviceParams"]["transactionId"], "T1");
        assert_eq!(json["serviceParams"]["referenceId"], "ref-1");
        assert!(json["serviceParams"].get("payerInfo").is_none());
    }

    #[test]
    fn hpp_envelope_requires_store_configuration() {
        let mut credentials = test_credentials();
        credentials.store_id = None;
        credentials.hpp_key = None;
        let err = ServiceRequest::hpp_purchase(
            &credentials,
            &HostedLinkRequest {
                reference: "PR-00001".into(),
                amount: 25.0,
                currency: "USD".into(),
                description: "Payment for PR-00001".into(),
            },
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn redaction_masks_keys_and_nothing_else() {
        let envelope =
            ServiceRequest::preauthorize(&test_credentials(), &preauth_request()).unwrap();
        let redacted = envelope.redacted();

        assert_eq!(redacted.service_params.api_key.as_deref(), Some("***"));
        assert_eq!(redacted.service_params.merchant_uid, "M0910291");
        assert_eq!(
            redacted.service_params.transaction_info,
            envelope.service_params.transaction_info
        );

        let json = serde_json::to_string(&redacted).unwrap();
        assert!(!json.contains("API-TEST-KEY"));
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = ServiceRequest::preauthorize(&test_credentials(), &preauth_request())
            .unwrap()
            .redacted();
        let json = serde_json::to_string(&envelope).unwrap();
        let back: ServiceRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn response_success_requires_both_axes() {
        let ok: GatewayResponse = serde_json::from_value(serde_json::json!({
            "responseCode": "2001",
            "errorCode": "0",
            "responseMsg": "RCS_SUCCESS",
            "params": {"state": "APPROVED", "transactionId": "T1"}
        }))
        .unwrap();
        assert!(ok.is_ok());
        assert_eq!(ok.state(), Some("APPROVED"));
        assert_eq!(ok.transaction_id(), Some("T1"));

        let error_code: GatewayResponse = serde_json::from_value(serde_json::json!({
            "responseCode": "2001",
            "errorCode": "E101"
        }))
        .unwrap();
        assert!(!error_code.is_ok());

        let rejected: GatewayResponse = serde_json::from_value(serde_json::json!({
            "responseCode": "5310",
            "responseMsg": "payer rejected the authorization"
        }))
        .unwrap();
        assert!(!rejected.is_ok());
        assert_eq!(rejected.message(), Some("payer rejected the authorization"));
    }

    #[test]
    fn message_prefers_response_msg_over_response_message() {
        let both: GatewayResponse = serde_json::from_value(serde_json::json!({
            "responseMsg": "short",
            "responseMessage": "long"
        }))
        .unwrap();
        assert_eq!(both.message(), Some("short"));

        let only_long: GatewayResponse = serde_json::from_value(serde_json::json!({
            "responseMessage": "long"
        }))
        .unwrap();
        assert_eq!(only_long.message(), Some("long"));
    }

    #[test]
    fn payment_link_falls_back_to_direct_link() {
        let response: GatewayResponse = serde_json::from_value(serde_json::json!({
            "responseCode": "2001",
            "params": {"directPaymentLink": "https://pay.waafipay.com/x"}
        }))
        .unwrap();
        assert_eq!(response.payment_link(), Some("https://pay.waafipay.com/x"));
    }

    #[test]
    fn response_round_trips_through_json() {
        let response: GatewayResponse = serde_json::from_value(serde_json::json!({
            "responseCode": "2001",
            "params": {"state": "APPROVED", "transactionId": "T1", "referenceId": "ref-1"}
        }))
        .unwrap();
        let text = serde_json::to_string(&response).unwrap();
        let back: GatewayResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(back, response);
    }
}
