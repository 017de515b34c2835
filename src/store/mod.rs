//! External document store collaborator.
//!
//! The ERP owns every document this integration touches; the pipeline only
//! reads and writes through this interface and never holds direct storage.

pub mod documents;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppResult;
use self::documents::Document;

/// ERP doctype names as the store knows them
pub mod doctype {
    pub const CREDENTIALS: &str = "WaafiPay Credentials";
    pub const LOG: &str = "WaafiPay Log";
    pub const PAYMENT_REQUEST: &str = "Payment Request";
    pub const PAYMENT_ENTRY: &str = "Payment Entry";
    pub const SALES_INVOICE: &str = "Sales Invoice";
}

/// Interface to the ERP document store.
///
/// Each call is its own atomic unit as provided by the store; there is no
/// transaction boundary spanning a whole pipeline run.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether a document with this name exists
    async fn exists(&self, doctype: &str, name: &str) -> AppResult<bool>;

    /// Load a document by name; missing documents are a `Store` error
    async fn load(&self, doctype: &str, name: &str) -> AppResult<Document>;

    /// First document whose fields match all the given (field, value)
    /// pairs, or None. `name` and `docstatus` match against the document
    /// head rather than its field map.
    async fn find(&self, doctype: &str, filters: &[(&str, Value)]) -> AppResult<Option<Document>>;

    /// Create a new draft document, assigning it a name
    async fn create(
        &self,
        doctype: &str,
        fields: serde_json::Map<String, Value>,
    ) -> AppResult<Document>;

    /// Persist field changes on an existing document
    async fn save(&self, doc: &Document) -> AppResult<()>;

    /// Submit a document: the irreversible draft -> submitted transition.
    /// Returns the updated document.
    async fn submit(&self, doc: &Document) -> AppResult<Document>;

    /// Retrieve a secret field. The value must never appear in logs or be
    /// serialized back out of the process.
    async fn get_password(&self, doc: &Document, field: &str) -> AppResult<String>;
}
