use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use crate::error::StoreError;
use crate::store::traits::{DocumentStore, FieldMap};

/// REST client for a resource-style document store API
///
/// Every call is one HTTP round trip; the per-request timeout is applied at
/// the client level and a timed-out call surfaces as the corresponding
/// operation's failure.
pub struct RestDocumentStore {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    data: FieldMap,
}

impl RestDocumentStore {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            client,
        })
    }

    fn resource_url(&self, doctype: &str, name: &str) -> String {
        format!("{}/api/resource/{}/{}", self.base_url, doctype, name)
    }

    fn collection_url(&self, doctype: &str) -> String {
        format!("{}/api/resource/{}", self.base_url, doctype)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_token)
    }

    /// Pull the assigned document id out of a create/finalize response
    fn document_name(response: DocumentResponse) -> Result<String, StoreError> {
        match response.data.get("name") {
            Some(Value::String(name)) if !name.is_empty() => Ok(name.clone()),
            _ => Err(StoreError::Decode(
                "response document carries no name".to_string(),
            )),
        }
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn get_fields(
        &self,
        doctype: &str,
        name: &str,
        fields: &[&str],
    ) -> Result<Option<FieldMap>, StoreError> {
        let response = self
            .client
            .get(self.resource_url(doctype, name))
            .header("Authorization", self.auth_header())
            .query(&[("fields", serde_json::to_string(fields).unwrap_or_default())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Lookup {
                doctype: doctype.to_string(),
                name: name.to_string(),
                message,
            });
        }

        let document: DocumentResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(document.data))
    }

    async fn create(&self, doctype: &str, fields: FieldMap) -> Result<String, StoreError> {
        let response = self
            .client
            .post(self.collection_url(doctype))
            .header("Authorization", self.auth_header())
            .json(&Value::Object(fields))
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Create {
                doctype: doctype.to_string(),
                message,
            });
        }

        let document: DocumentResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let name = Self::document_name(document)?;
        info!("Created {} {}", doctype, name);
        Ok(name)
    }

    async fn finalize(&self, doctype: &str, name: &str) -> Result<String, StoreError> {
        let url = format!("{}/submit", self.resource_url(doctype, name));
        let response = self
            .client
            .post(url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Finalize {
                doctype: doctype.to_string(),
                name: name.to_string(),
                message,
            });
        }

        let document: DocumentResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let finalized = Self::document_name(document)?;
        info!("Finalized {} {}", doctype, finalized);
        Ok(finalized)
    }

    async fn set_field(
        &self,
        doctype: &str,
        name: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.resource_url(doctype, name))
            .header("Authorization", self.auth_header())
            .json(&json!({ field: value }))
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::FieldWrite {
                doctype: doctype.to_string(),
                name: name.to_string(),
                field: field.to_string(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_rooted_at_base() {
        let store = RestDocumentStore::new(
            "https://erp.example.com/",
            "token123",
            Duration::from_secs(10),
        )
        .unwrap();

        assert_eq!(
            store.collection_url("Payment Entry"),
            "https://erp.example.com/api/resource/Payment Entry"
        );
        assert_eq!(
            store.resource_url("Bank Account", "B1"),
            "https://erp.example.com/api/resource/Bank Account/B1"
        );
    }

    #[test]
    fn test_document_name_extraction() {
        let mut data = FieldMap::new();
        data.insert("name".to_string(), Value::String("PE-0001".to_string()));
        let name = RestDocumentStore::document_name(DocumentResponse { data }).unwrap();
        assert_eq!(name, "PE-0001");

        let missing = RestDocumentStore::document_name(DocumentResponse {
            data: FieldMap::new(),
        });
        assert!(matches!(missing, Err(StoreError::Decode(_))));
    }
}
