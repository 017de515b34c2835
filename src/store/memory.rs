//! In-memory document store binding.
//!
//! Stands in for the ERP during tests and local development. Creation
//! refuses duplicate names, which doubles as the uniqueness backstop for
//! the payment-entry idempotence check.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::store::documents::{DocStatus, Document};
use crate::store::DocumentStore;

#[derive(Default)]
struct Inner {
    docs: HashMap<String, BTreeMap<String, Document>>,
    passwords: HashMap<(String, String, String), String>,
    counters: HashMap<String, u64>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document under an explicit name (fixture setup)
    pub fn insert(&self, doc: Document) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner
            .docs
            .entry(doc.doctype.clone())
            .or_default()
            .insert(doc.name.clone(), doc);
    }

    /// Register a secret retrievable through `get_password`
    pub fn set_password(&self, doctype: &str, name: &str, field: &str, value: &str) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.passwords.insert(
            (doctype.to_string(), name.to_string(), field.to_string()),
            value.to_string(),
        );
    }

    /// Snapshot of every document of a doctype (test assertions)
    pub fn all(&self, doctype: &str) -> Vec<Document> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .docs
            .get(doctype)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    fn next_name(inner: &mut Inner, doctype: &str) -> String {
        let prefix: String = doctype
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .collect::<String>()
            .to_uppercase();
        let counter = inner.counters.entry(doctype.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}-{counter:05}")
    }

    fn matches(doc: &Document, filters: &[(&str, Value)]) -> bool {
        filters.iter().all(|(field, expected)| match *field {
            "name" => Value::from(doc.name.as_str()) == *expected,
            "docstatus" => {
                serde_json::to_value(doc.docstatus).map(|v| v == *expected).unwrap_or(false)
            }
            _ => doc.fields.get(*field) == Some(expected),
        })
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn exists(&self, doctype: &str, name: &str) -> AppResult<bool> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .docs
            .get(doctype)
            .is_some_and(|m| m.contains_key(name)))
    }

    async fn load(&self, doctype: &str, name: &str) -> AppResult<Document> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .docs
            .get(doctype)
            .and_then(|m| m.get(name))
            .cloned()
            .ok_or_else(|| AppError::store(format!("{doctype} '{name}' not found")))
    }

    async fn find(&self, doctype: &str, filters: &[(&str, Value)]) -> AppResult<Option<Document>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.docs.get(doctype).and_then(|m| {
            m.values()
                .find(|doc| Self::matches(doc, filters))
                .cloned()
        }))
    }

    async fn create(
        &self,
        doctype: &str,
        fields: Map<String, Value>,
    ) -> AppResult<Document> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let name = Self::next_name(&mut inner, doctype);
        if inner
            .docs
            .get(doctype)
            .is_some_and(|m| m.contains_key(&name))
        {
            return Err(AppError::store(format!(
                "{doctype} '{name}' already exists"
            )));
        }
        let doc = Document::new(doctype, &name, fields);
        inner
            .docs
            .entry(doctype.to_string())
            .or_default()
            .insert(name, doc.clone());
        Ok(doc)
    }

    async fn save(&self, doc: &Document) -> AppResult<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let slot = inner
            .docs
            .get_mut(&doc.doctype)
            .and_then(|m| m.get_mut(&doc.name))
            .ok_or_else(|| {
                AppError::store(format!("{} '{}' not found", doc.doctype, doc.name))
            })?;
        if slot.docstatus == DocStatus::Cancelled {
            return Err(AppError::store(format!(
                "{} '{}' is cancelled and cannot be modified",
                doc.doctype, doc.name
            )));
        }
        slot.fields = doc.fields.clone();
        Ok(())
    }

    async fn submit(&self, doc: &Document) -> AppResult<Document> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let slot = inner
            .docs
            .get_mut(&doc.doctype)
            .and_then(|m| m.get_mut(&doc.name))
            .ok_or_else(|| {
                AppError::store(format!("{} '{}' not found", doc.doctype, doc.name))
            })?;
        if slot.docstatus != DocStatus::Draft {
            return Err(AppError::store(format!(
                "{} '{}' is not a draft and cannot be submitted",
                doc.doctype, doc.name
            )));
        }
        slot.fields = doc.fields.clone();
        slot.docstatus = DocStatus::Submitted;
        Ok(slot.clone())
    }

    async fn get_password(&self, doc: &Document, field: &str) -> AppResult<String> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .passwords
            .get(&(doc.doctype.clone(), doc.name.clone(), field.to_string()))
            .cloned()
            .ok_or_else(|| {
                AppError::store(format!(
                    "no secret '{field}' stored for {} '{}'",
                    doc.doctype, doc.name
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::doctype;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn create_assigns_sequential_names() {
        let store = InMemoryStore::new();
        let first = store.create(doctype::LOG, Map::new()).await.unwrap();
        let second = store.create(doctype::LOG, Map::new()).await.unwrap();
        assert_eq!(first.name, "WL-00001");
        assert_eq!(second.name, "WL-00002");
    }

    #[tokio::test]
    async fn find_matches_on_field_values() {
        let store = InMemoryStore::new();
        store
            .create(
                doctype::LOG,
                fields(&[("reference_id", Value::from("ref-a"))]),
            )
            .await
            .unwrap();

        let hit = store
            .find(doctype::LOG, &[("reference_id", Value::from("ref-a"))])
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = store
            .find(doctype::LOG, &[("reference_id", Value::from("ref-b"))])
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn submit_is_irreversible() {
        let store = InMemoryStore::new();
        let doc = store.create(doctype::PAYMENT_ENTRY, Map::new()).await.unwrap();
        let submitted = store.submit(&doc).await.unwrap();
        assert_eq!(submitted.docstatus, DocStatus::Submitted);

        let again = store.submit(&submitted).await.unwrap_err();
        assert!(again.to_string().contains("cannot be submitted"));
    }

    #[tokio::test]
    async fn duplicate_insert_is_visible_to_exists() {
        let store = InMemoryStore::new();
        store.insert(Document::new(doctype::SALES_INVOICE, "SI-1", Map::new()));
        assert!(store.exists(doctype::SALES_INVOICE, "SI-1").await.unwrap());
        assert!(!store.exists(doctype::SALES_INVOICE, "SI-2").await.unwrap());
    }

    #[tokio::test]
    async fn passwords_never_live_in_fields() {
        let store = InMemoryStore::new();
        let doc = Document::new(doctype::CREDENTIALS, "Default WaafiPay", Map::new());
        store.insert(doc.clone());
        store.set_password(doctype::CREDENTIALS, "Default WaafiPay", "api_key", "s3cret");

        let loaded = store
            .load(doctype::CREDENTIALS, "Default WaafiPay")
            .await
            .unwrap();
        assert!(loaded.fields.get("api_key").is_none());
        assert_eq!(store.get_password(&doc, "api_key").await.unwrap(), "s3cret");
    }
}
