//! Transaction log: the audit record of every gateway call attempted.
//!
//! An entry is opened with the redacted outbound payload before the network
//! call is made, so an attempt is on record even if the process dies
//! mid-call. Closing it is the single mutation allowed afterwards.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::gateway::types::{GatewayResponse, ServiceRequest};
use crate::store::documents::{Document, LogEntry, LogStatus};
use crate::store::{doctype, DocumentStore};

/// Handle to an open (not yet closed) log entry
#[derive(Debug, Clone)]
pub struct LogHandle {
    pub name: String,
    pub reference_id: String,
}

#[derive(Clone)]
pub struct TransactionLog {
    store: Arc<dyn DocumentStore>,
}

impl TransactionLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persist an `Initiated` entry carrying the redacted request payload.
    /// A second entry for the same reference id fails fast rather than
    /// silently overwriting the first.
    pub async fn open(
        &self,
        reference_id: &str,
        sales_invoice: Option<&str>,
        payload: &ServiceRequest,
    ) -> AppResult<LogHandle> {
        if self.find_by_reference(reference_id).await?.is_some() {
            return Err(AppError::validation(format!(
                "a transaction log entry for reference '{reference_id}' already exists"
            )));
        }

        let request_payload = serde_json::to_string(&payload.redacted())
            .map_err(|e| AppError::store(format!("cannot serialize request payload: {e}")))?;

        let mut fields = Map::new();
        fields.insert("reference_id".into(), Value::from(reference_id));
        fields.insert("status".into(), Value::from(LogStatus::Initiated.as_str()));
        fields.insert("request_payload".into(), Value::from(request_payload));
        if let Some(invoice) = sales_invoice {
            fields.insert("sales_invoice".into(), Value::from(invoice));
        }

        let doc = self.store.create(doctype::LOG, fields).await?;
        Ok(LogHandle {
            name: doc.name,
            reference_id: reference_id.to_string(),
        })
    }

    pub async fn close_success(
        &self,
        handle: &LogHandle,
        response: &GatewayResponse,
    ) -> AppResult<()> {
        let response_data = serde_json::to_value(response)
            .map_err(|e| AppError::store(format!("cannot serialize response: {e}")))?;
        self.close(&handle.name, LogStatus::Success, &response_data, None)
            .await
    }

    pub async fn close_failure(
        &self,
        handle: &LogHandle,
        response: Option<&GatewayResponse>,
        error: &str,
    ) -> AppResult<()> {
        let response_data = match response {
            Some(response) => serde_json::to_value(response)
                .map_err(|e| AppError::store(format!("cannot serialize response: {e}")))?,
            None => serde_json::json!({ "error": error }),
        };
        self.close(&handle.name, LogStatus::Failed, &response_data, Some(error))
            .await
    }

    /// Callback path: close the entry for this reference id if it is still
    /// open. Entries already closed by the interactive flow are left
    /// untouched (closed entries are never reopened).
    pub async fn record_callback(
        &self,
        reference_id: &str,
        payload: &Value,
        status: LogStatus,
        error: Option<&str>,
    ) -> AppResult<Option<LogEntry>> {
        let Some(entry) = self.find_by_reference(reference_id).await? else {
            return Ok(None);
        };

        if entry.status != LogStatus::Initiated {
            warn!(
                reference_id,
                status = entry.status.as_str(),
                "callback for an already-closed log entry; leaving it as is"
            );
            return Ok(Some(entry));
        }

        self.close(&entry.name, status, payload, error).await?;
        self.load(&entry.name).await.map(Some)
    }

    pub async fn find_by_reference(&self, reference_id: &str) -> AppResult<Option<LogEntry>> {
        let doc = self
            .store
            .find(doctype::LOG, &[("reference_id", Value::from(reference_id))])
            .await?;
        doc.as_ref().map(LogEntry::from_document).transpose()
    }

    pub async fn load(&self, name: &str) -> AppResult<LogEntry> {
        let doc = self.store.load(doctype::LOG, name).await?;
        LogEntry::from_document(&doc)
    }

    async fn close(
        &self,
        name: &str,
        status: LogStatus,
        response_data: &Value,
        error: Option<&str>,
    ) -> AppResult<()> {
        let mut doc: Document = self.store.load(doctype::LOG, name).await?;
        let current = LogStatus::parse(doc.get_str("status").unwrap_or_default())?;
        if current != LogStatus::Initiated {
            return Err(AppError::store(format!(
                "log entry '{name}' is already closed as {}",
                current.as_str()
            )));
        }

        let response_text = serde_json::to_string(response_data)
            .map_err(|e| AppError::store(format!("cannot serialize response: {e}")))?;
        doc.set("status", Value::from(status.as_str()));
        doc.set("response_data", Value::from(response_text));
        if let Some(error) = error {
            doc.set("error_message", Value::from(error));
        }
        self.store.save(&doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::PreauthorizeRequest;
    use crate::store::documents::GatewayCredentials;
    use crate::store::memory::InMemoryStore;

    fn envelope(reference_id: &str) -> ServiceRequest {
        let credentials = GatewayCredentials {
            name: "Default WaafiPay".into(),
            merchant_uid: "M0910291".into(),
            api_user_id: "1000297".into(),
            api_key: "API-TEST-KEY".into(),
            base_url: "https://api.waafipay.com".into(),
            supported_currencies: vec!["USD".into()],
            success_url: "/ok".into(),
            failure_url: "/fail".into(),
            store_id: None,
            hpp_key: None,
        };
        ServiceRequest::preauthorize(
            &credentials,
            &PreauthorizeRequest {
                phone_number: "252611111111".into(),
                amount: 10.0,
                currency: "USD".into(),
                reference_id: reference_id.into(),
                invoice_id: None,
            },
        )
        .unwrap()
    }

    fn log() -> (InMemoryStore, TransactionLog) {
        let store = InMemoryStore::new();
        let log = TransactionLog::new(Arc::new(store.clone()));
        (store, log)
    }

    #[tokio::test]
    async fn open_records_initiated_with_redacted_payload() {
        let (store, log) = log();
        log.open("ref-1", Some("SI-00001"), &envelope("ref-1"))
            .await
            .unwrap();

        let entry = log.find_by_reference("ref-1").await.unwrap().unwrap();
        assert_eq!(entry.status, LogStatus::Initiated);
        assert_eq!(entry.sales_invoice.as_deref(), Some("SI-00001"));

        let stored = entry.request_payload.unwrap();
        assert!(!stored.contains("API-TEST-KEY"));
        assert!(stored.contains("\"serviceName\":\"API_PREAUTHORIZE\""));
        assert_eq!(store.all(doctype::LOG).len(), 1);
    }

    #[tokio::test]
    async fn stored_payload_reparses_to_the_dispatched_envelope() {
        let (_store, log) = log();
        let sent = envelope("ref-rt");
        log.open("ref-rt", None, &sent).await.unwrap();

        let entry = log.find_by_reference("ref-rt").await.unwrap().unwrap();
        let reparsed: ServiceRequest =
            serde_json::from_str(&entry.request_payload.unwrap()).unwrap();
        assert_eq!(reparsed, sent.redacted());
    }

    #[tokio::test]
    async fn duplicate_reference_id_fails_fast() {
        let (_store, log) = log();
        log.open("ref-1", None, &envelope("ref-1")).await.unwrap();
        let err = log.open("ref-1", None, &envelope("ref-1")).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn closed_entries_cannot_be_closed_again() {
        let (_store, log) = log();
        let handle = log.open("ref-1", None, &envelope("ref-1")).await.unwrap();
        log.close_success(&handle, &GatewayResponse::default())
            .await
            .unwrap();

        let err = log
            .close_failure(&handle, None, "late failure")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already closed"));
    }

    #[tokio::test]
    async fn record_callback_leaves_closed_entries_untouched() {
        let (_store, log) = log();
        let handle = log.open("ref-1", None, &envelope("ref-1")).await.unwrap();
        log.close_success(&handle, &GatewayResponse::default())
            .await
            .unwrap();

        let entry = log
            .record_callback(
                "ref-1",
                &serde_json::json!({"responseCode": "5310"}),
                LogStatus::Failed,
                Some("gateway callback reported failure"),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, LogStatus::Success);
    }

    #[tokio::test]
    async fn record_callback_closes_open_entries() {
        let (_store, log) = log();
        log.open("ref-1", None, &envelope("ref-1")).await.unwrap();

        let entry = log
            .record_callback(
                "ref-1",
                &serde_json::json!({"responseCode": "2001"}),
                LogStatus::Success,
                None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, LogStatus::Success);
    }
}
