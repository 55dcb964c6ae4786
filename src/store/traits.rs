use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Field map of one document as held by the external store
pub type FieldMap = serde_json::Map<String, Value>;

/// Document kinds the workflow touches in the external store
pub mod doctype {
    pub const BANK_ACCOUNT: &str = "Bank Account";
    pub const MODE_OF_PAYMENT: &str = "Mode of Payment";
    pub const COMPANY: &str = "Company";
    pub const PAYMENT_ENTRY: &str = "Payment Entry";
    pub const CHEQUE_ROW_PAY: &str = "Cheque Table Pay";
    pub const CHEQUE_ROW_RECEIVE: &str = "Cheque Table Receive";
}

/// External document store - the only stateful collaborator of the workflow
///
/// INVARIANTS:
/// - `get_fields` tolerates unknown fields by returning them as absent
/// - `finalize` is irreversible once it returns success
/// - the store serializes writes to a given document internally
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read selected fields of one document; `Ok(None)` when it does not exist
    async fn get_fields(
        &self,
        doctype: &str,
        name: &str,
        fields: &[&str],
    ) -> Result<Option<FieldMap>, StoreError>;

    /// Insert a new document, returning its assigned id
    async fn create(&self, doctype: &str, fields: FieldMap) -> Result<String, StoreError>;

    /// Irreversibly submit a created document, returning its id
    async fn finalize(&self, doctype: &str, name: &str) -> Result<String, StoreError>;

    /// Write a single field of an existing document
    async fn set_field(
        &self,
        doctype: &str,
        name: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError>;
}

/// Extract a non-empty string field from a field map
pub fn field_string(fields: &FieldMap, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
