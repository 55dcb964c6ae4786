use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::StoreError;
use crate::store::traits::{DocumentStore, FieldMap};

/// In-memory document store for tests and embedders without a remote store
///
/// Ids are numbered per doctype (`PE-0001`, `PE-0002`, ...). Failure
/// injection switches let tests drive the create/finalize/link error paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, HashMap<String, FieldMap>>,
    finalized: HashSet<(String, String)>,
    counters: HashMap<String, u64>,

    fail_lookup: HashSet<String>,
    fail_create_when: Vec<(String, Value)>,
    fail_finalize_for: HashSet<String>,
    fail_set_field_for: HashSet<String>,
}

fn id_prefix(doctype: &str) -> String {
    doctype
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_uppercase()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document under an explicit name
    pub fn insert(&self, doctype: &str, name: &str, fields: FieldMap) {
        let mut inner = self.inner.lock();
        inner
            .documents
            .entry(doctype.to_string())
            .or_default()
            .insert(name.to_string(), fields);
    }

    /// Make every lookup against the doctype fail
    pub fn fail_lookups_for(&self, doctype: &str) {
        self.inner.lock().fail_lookup.insert(doctype.to_string());
    }

    /// Reject creation of any document whose payload field matches the value
    pub fn fail_create_when(&self, field: &str, value: Value) {
        self.inner
            .lock()
            .fail_create_when
            .push((field.to_string(), value));
    }

    /// Make finalize of the named document fail
    pub fn fail_finalize_for(&self, name: &str) {
        self.inner
            .lock()
            .fail_finalize_for
            .insert(name.to_string());
    }

    /// Make every field write against the doctype fail
    pub fn fail_set_field_for(&self, doctype: &str) {
        self.inner
            .lock()
            .fail_set_field_for
            .insert(doctype.to_string());
    }

    pub fn get(&self, doctype: &str, name: &str) -> Option<FieldMap> {
        self.inner
            .lock()
            .documents
            .get(doctype)
            .and_then(|docs| docs.get(name))
            .cloned()
    }

    pub fn count(&self, doctype: &str) -> usize {
        self.inner
            .lock()
            .documents
            .get(doctype)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_finalized(&self, doctype: &str, name: &str) -> bool {
        self.inner
            .lock()
            .finalized
            .contains(&(doctype.to_string(), name.to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_fields(
        &self,
        doctype: &str,
        name: &str,
        fields: &[&str],
    ) -> Result<Option<FieldMap>, StoreError> {
        let inner = self.inner.lock();
        if inner.fail_lookup.contains(doctype) {
            return Err(StoreError::Lookup {
                doctype: doctype.to_string(),
                name: name.to_string(),
                message: "injected lookup failure".to_string(),
            });
        }

        let Some(document) = inner.documents.get(doctype).and_then(|docs| docs.get(name)) else {
            return Ok(None);
        };

        // Unknown fields stay absent rather than erroring
        let mut selected = FieldMap::new();
        for field in fields {
            if let Some(value) = document.get(*field) {
                selected.insert(field.to_string(), value.clone());
            }
        }
        Ok(Some(selected))
    }

    async fn create(&self, doctype: &str, fields: FieldMap) -> Result<String, StoreError> {
        let mut inner = self.inner.lock();
        for (field, value) in &inner.fail_create_when {
            if fields.get(field) == Some(value) {
                return Err(StoreError::Create {
                    doctype: doctype.to_string(),
                    message: format!("injected create failure on {}", field),
                });
            }
        }

        let counter = inner.counters.entry(doctype.to_string()).or_insert(0);
        *counter += 1;
        let name = format!("{}-{:04}", id_prefix(doctype), counter);

        let mut document = fields;
        document.insert("name".to_string(), Value::String(name.clone()));
        inner
            .documents
            .entry(doctype.to_string())
            .or_default()
            .insert(name.clone(), document);
        Ok(name)
    }

    async fn finalize(&self, doctype: &str, name: &str) -> Result<String, StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_finalize_for.contains(name) {
            return Err(StoreError::Finalize {
                doctype: doctype.to_string(),
                name: name.to_string(),
                message: "injected finalize failure".to_string(),
            });
        }

        let exists = inner
            .documents
            .get(doctype)
            .map(|docs| docs.contains_key(name))
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::Finalize {
                doctype: doctype.to_string(),
                name: name.to_string(),
                message: "document does not exist".to_string(),
            });
        }

        inner
            .finalized
            .insert((doctype.to_string(), name.to_string()));
        Ok(name.to_string())
    }

    async fn set_field(
        &self,
        doctype: &str,
        name: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_set_field_for.contains(doctype) {
            return Err(StoreError::FieldWrite {
                doctype: doctype.to_string(),
                name: name.to_string(),
                field: field.to_string(),
                message: "injected field write failure".to_string(),
            });
        }

        // Rows live in the host store; upsert so link write-backs land even
        // when the row document was never seeded here
        inner
            .documents
            .entry(doctype.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }
}
