//! Typed records over the store's generic document shape.
//!
//! The ERP hands documents around as loosely-typed field maps; this module
//! is the mapping layer that translates between that shape and the explicit
//! records the pipeline works with.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::store::{doctype, DocumentStore};

/// ERP document lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Draft,
    Submitted,
    Cancelled,
}

/// Generic document as the external store sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doctype: String,
    pub name: String,
    pub docstatus: DocStatus,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(doctype: &str, name: &str, fields: Map<String, Value>) -> Self {
        Self {
            doctype: doctype.to_string(),
            name: name.to_string(),
            docstatus: DocStatus::Draft,
            fields,
        }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn require_str(&self, field: &str) -> AppResult<String> {
        self.get_str(field)
            .map(str::to_string)
            .ok_or_else(|| self.missing(field))
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        match self.fields.get(field) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn require_f64(&self, field: &str) -> AppResult<f64> {
        self.get_f64(field).ok_or_else(|| self.missing(field))
    }

    pub fn get_date(&self, field: &str) -> Option<NaiveDate> {
        self.get_str(field)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    pub fn require_date(&self, field: &str) -> AppResult<NaiveDate> {
        self.get_date(field).ok_or_else(|| self.missing(field))
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    fn missing(&self, field: &str) -> AppError {
        AppError::store(format!(
            "{} '{}': missing or malformed field '{}'",
            self.doctype, self.name, field
        ))
    }
}

/// Gateway account configuration held in the ERP settings document.
/// Read-only at request time; secrets come through the store's password
/// retrieval and are masked in Debug output.
#[derive(Clone)]
pub struct GatewayCredentials {
    pub name: String,
    pub merchant_uid: String,
    pub api_user_id: String,
    pub api_key: String,
    pub base_url: String,
    pub supported_currencies: Vec<String>,
    pub success_url: String,
    pub failure_url: String,
    pub store_id: Option<String>,
    pub hpp_key: Option<String>,
}

impl GatewayCredentials {
    pub async fn load(store: &dyn DocumentStore, name: &str) -> AppResult<Self> {
        let doc = store.load(doctype::CREDENTIALS, name).await?;
        let api_key = store.get_password(&doc, "api_key").await?;

        let store_id = doc.get_str("store_id").map(str::to_string);
        let hpp_key = if store_id.is_some() {
            Some(store.get_password(&doc, "hpp_key").await?)
        } else {
            None
        };

        let supported_currencies = doc
            .fields
            .get("supported_currencies")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: doc.name.clone(),
            merchant_uid: doc.require_str("merchant_uid")?,
            api_user_id: doc.require_str("api_user_id")?,
            api_key,
            base_url: doc
                .get_str("api_base_url")
                .unwrap_or("https://api.waafipay.com")
                .to_string(),
            supported_currencies,
            success_url: doc
                .get_str("success_url")
                .unwrap_or("/waafipay-payment-success")
                .to_string(),
            failure_url: doc
                .get_str("failure_url")
                .unwrap_or("/waafipay-payment-failure")
                .to_string(),
            store_id,
            hpp_key,
        })
    }

    pub fn supports_currency(&self, currency: &str) -> bool {
        self.supported_currencies.iter().any(|c| c == currency)
    }
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("name", &self.name)
            .field("merchant_uid", &self.merchant_uid)
            .field("api_user_id", &self.api_user_id)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("supported_currencies", &self.supported_currencies)
            .field("store_id", &self.store_id)
            .field("hpp_key", &self.hpp_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Transaction log entry status. Transitions only Initiated -> Success or
/// Initiated -> Failed, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Initiated,
    Success,
    Failed,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "Initiated",
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "Initiated" => Ok(Self::Initiated),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            other => Err(AppError::store(format!("unknown log status '{other}'"))),
        }
    }
}

/// One attempted gateway call as recorded in the ERP
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub name: String,
    pub reference_id: String,
    pub status: LogStatus,
    pub request_payload: Option<String>,
    pub response_data: Option<String>,
    pub error_message: Option<String>,
    pub sales_invoice: Option<String>,
}

impl LogEntry {
    pub fn from_document(doc: &Document) -> AppResult<Self> {
        Ok(Self {
            name: doc.name.clone(),
            reference_id: doc.require_str("reference_id")?,
            status: LogStatus::parse(&doc.require_str("status")?)?,
            request_payload: doc.get_str("request_payload").map(str::to_string),
            response_data: doc.get_str("response_data").map(str::to_string),
            error_message: doc.get_str("error_message").map(str::to_string),
            sales_invoice: doc.get_str("sales_invoice").map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentRequestStatus {
    Draft,
    Requested,
    Initiated,
    Paid,
    Cancelled,
}

impl PaymentRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Requested => "Requested",
            Self::Initiated => "Initiated",
            Self::Paid => "Paid",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Requested" => Ok(Self::Requested),
            "Initiated" => Ok(Self::Initiated),
            "Paid" => Ok(Self::Paid),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(AppError::store(format!(
                "unknown payment request status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentChannel {
    Phone,
    Other(String),
}

impl PaymentChannel {
    pub fn from_field(s: &str) -> Self {
        if s == "Phone" {
            Self::Phone
        } else {
            Self::Other(s.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Phone => "Phone",
            Self::Other(s) => s,
        }
    }
}

/// ERP-side request for payment against a reference document
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub name: String,
    pub status: PaymentRequestStatus,
    pub grand_total: f64,
    pub currency: String,
    pub payment_channel: PaymentChannel,
    pub reference_doctype: String,
    pub reference_name: String,
    pub payment_account_currency: Option<String>,
    pub payment_link: Option<String>,
    pub docstatus: DocStatus,
}

impl PaymentRequest {
    pub fn from_document(doc: &Document) -> AppResult<Self> {
        Ok(Self {
            name: doc.name.clone(),
            status: PaymentRequestStatus::parse(&doc.require_str("status")?)?,
            grand_total: doc.require_f64("grand_total")?,
            currency: doc.require_str("currency")?,
            payment_channel: PaymentChannel::from_field(
                doc.get_str("payment_channel").unwrap_or("Phone"),
            ),
            reference_doctype: doc.require_str("reference_doctype")?,
            reference_name: doc.require_str("reference_name")?,
            payment_account_currency: doc
                .get_str("payment_account_currency")
                .map(str::to_string),
            payment_link: doc.get_str("payment_link").map(str::to_string),
            docstatus: doc.docstatus,
        })
    }

    /// Field map for creating a fresh request through the store
    pub fn creation_fields(
        reference_doctype: &str,
        reference_name: &str,
        grand_total: f64,
        currency: &str,
        channel: &PaymentChannel,
        gateway_account: &str,
    ) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("status".into(), Value::from("Requested"));
        fields.insert("grand_total".into(), Value::from(grand_total));
        fields.insert("currency".into(), Value::from(currency));
        fields.insert("payment_channel".into(), Value::from(channel.as_str()));
        fields.insert("reference_doctype".into(), Value::from(reference_doctype));
        fields.insert("reference_name".into(), Value::from(reference_name));
        fields.insert("payment_gateway_account".into(), Value::from(gateway_account));
        fields
    }
}

/// Allocation row linking a payment entry to the invoice it settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntryReference {
    pub reference_doctype: String,
    pub reference_name: String,
    pub total_amount: f64,
    pub outstanding_amount: f64,
    pub allocated_amount: f64,
}

/// Ledger evidence that money was received. Built once, submitted once,
/// never modified afterwards.
#[derive(Debug, Clone)]
pub struct PaymentEntry {
    pub company: String,
    pub posting_date: NaiveDate,
    pub party: String,
    pub paid_amount: f64,
    pub received_amount: f64,
    pub paid_currency: String,
    pub source_exchange_rate: f64,
    pub target_exchange_rate: f64,
    pub reference_no: String,
    pub reference_date: NaiveDate,
    pub paid_to: String,
    pub references: Vec<PaymentEntryReference>,
}

impl PaymentEntry {
    pub fn creation_fields(&self) -> AppResult<Map<String, Value>> {
        let references = serde_json::to_value(&self.references)
            .map_err(|e| AppError::store(format!("cannot serialize payment references: {e}")))?;

        let mut fields = Map::new();
        fields.insert("payment_type".into(), Value::from("Receive"));
        fields.insert("company".into(), Value::from(self.company.as_str()));
        fields.insert(
            "posting_date".into(),
            Value::from(self.posting_date.format("%Y-%m-%d").to_string()),
        );
        fields.insert("party_type".into(), Value::from("Customer"));
        fields.insert("party".into(), Value::from(self.party.as_str()));
        fields.insert("paid_amount".into(), Value::from(self.paid_amount));
        fields.insert("received_amount".into(), Value::from(self.received_amount));
        fields.insert("paid_currency".into(), Value::from(self.paid_currency.as_str()));
        fields.insert(
            "source_exchange_rate".into(),
            Value::from(self.source_exchange_rate),
        );
        fields.insert(
            "target_exchange_rate".into(),
            Value::from(self.target_exchange_rate),
        );
        fields.insert("reference_no".into(), Value::from(self.reference_no.as_str()));
        fields.insert(
            "reference_date".into(),
            Value::from(self.reference_date.format("%Y-%m-%d").to_string()),
        );
        fields.insert("paid_to".into(), Value::from(self.paid_to.as_str()));
        fields.insert("references".into(), references);
        Ok(fields)
    }
}

/// The reference document being settled. Owned by the ERP; only the fields
/// the pipeline reads are mapped.
#[derive(Debug, Clone)]
pub struct SalesInvoice {
    pub name: String,
    pub customer: String,
    pub customer_mobile: Option<String>,
    pub currency: String,
    pub company: String,
    pub company_currency: String,
    pub posting_date: NaiveDate,
    pub outstanding_amount: f64,
    pub debit_to: String,
    pub docstatus: DocStatus,
}

impl SalesInvoice {
    pub fn from_document(doc: &Document) -> AppResult<Self> {
        Ok(Self {
            name: doc.name.clone(),
            customer: doc.require_str("customer")?,
            customer_mobile: doc.get_str("customer_mobile").map(str::to_string),
            currency: doc.require_str("currency")?,
            company: doc.require_str("company")?,
            company_currency: doc.require_str("company_currency")?,
            posting_date: doc.require_date("posting_date")?,
            outstanding_amount: doc.require_f64("outstanding_amount")?,
            debit_to: doc.require_str("debit_to")?,
            docstatus: doc.docstatus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_document() -> Document {
        let mut fields = Map::new();
        fields.insert("customer".into(), Value::from("Cali Traders"));
        fields.insert("customer_mobile".into(), Value::from("252611111111"));
        fields.insert("currency".into(), Value::from("USD"));
        fields.insert("company".into(), Value::from("Demo Co"));
        fields.insert("company_currency".into(), Value::from("USD"));
        fields.insert("posting_date".into(), Value::from("2025-03-14"));
        fields.insert("outstanding_amount".into(), Value::from(125.5));
        fields.insert("debit_to".into(), Value::from("Debtors - DC"));
        Document::new(doctype::SALES_INVOICE, "SI-00001", fields)
    }

    #[test]
    fn invoice_maps_from_document() {
        let invoice = SalesInvoice::from_document(&invoice_document()).unwrap();
        assert_eq!(invoice.customer, "Cali Traders");
        assert_eq!(invoice.outstanding_amount, 125.5);
        assert_eq!(
            invoice.posting_date,
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );
    }

    #[test]
    fn invoice_missing_field_is_store_error() {
        let mut doc = invoice_document();
        doc.fields.remove("debit_to");
        let err = SalesInvoice::from_document(&doc).unwrap_err();
        assert!(err.to_string().contains("debit_to"));
    }

    #[test]
    fn numeric_fields_accept_string_values() {
        let mut doc = invoice_document();
        doc.set("outstanding_amount", Value::from("99.25"));
        let invoice = SalesInvoice::from_document(&doc).unwrap();
        assert_eq!(invoice.outstanding_amount, 99.25);
    }

    #[test]
    fn log_status_round_trips() {
        for status in [LogStatus::Initiated, LogStatus::Success, LogStatus::Failed] {
            assert_eq!(LogStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(LogStatus::parse("Pending").is_err());
    }

    #[test]
    fn credentials_debug_masks_secrets() {
        let creds = GatewayCredentials {
            name: "Default WaafiPay".into(),
            merchant_uid: "M0910291".into(),
            api_user_id: "1000297".into(),
            api_key: "API-695418888AHX".into(),
            base_url: "https://api.waafipay.com".into(),
            supported_currencies: vec!["USD".into()],
            success_url: "/ok".into(),
            failure_url: "/fail".into(),
            store_id: Some("4001".into()),
            hpp_key: Some("HPP-SECRET".into()),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("API-695418888AHX"));
        assert!(!rendered.contains("HPP-SECRET"));
        assert!(rendered.contains("M0910291"));
    }

    #[test]
    fn payment_entry_creation_fields_carry_references() {
        let entry = PaymentEntry {
            company: "Demo Co".into(),
            posting_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            party: "Cali Traders".into(),
            paid_amount: 10.0,
            received_amount: 10.0,
            paid_currency: "USD".into(),
            source_exchange_rate: 1.0,
            target_exchange_rate: 1.0,
            reference_no: "ref-1".into(),
            reference_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            paid_to: "Debtors - DC".into(),
            references: vec![PaymentEntryReference {
                reference_doctype: doctype::SALES_INVOICE.into(),
                reference_name: "SI-00001".into(),
                total_amount: 10.0,
                outstanding_amount: 10.0,
                allocated_amount: 10.0,
            }],
        };
        let fields = entry.creation_fields().unwrap();
        assert_eq!(fields.get("reference_no").unwrap(), "ref-1");
        assert_eq!(fields.get("posting_date").unwrap(), "2025-03-14");
        let refs = fields.get("references").unwrap().as_array().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].get("reference_name").unwrap(), "SI-00001");
    }
}
