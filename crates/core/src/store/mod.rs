pub mod appwrite;
pub mod error;
pub mod lookup;
pub mod query;

#[cfg(test)]
pub mod memory;

pub use error::StoreError;
pub use query::{DocumentQuery, Filter, SortDirection};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Read access to the remote document store.
///
/// Documents are returned raw; typed decoding happens in [`list_typed`] and [`get_typed`].
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lists documents matching `query`. Without a limit every matching document is
    /// returned, following cursors as needed.
    async fn list_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> anyhow::Result<Vec<Value>>;

    /// `Ok(None)` when no document has this id.
    async fn get_document(&self, collection: &str, id: &str) -> anyhow::Result<Option<Value>>;
}

/// Lists and decodes documents. Documents that fail to decode are skipped and logged.
pub async fn list_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    query: &DocumentQuery,
) -> anyhow::Result<Vec<T>> {
    let raw = store.list_documents(collection, query).await?;
    Ok(decode_all(collection, raw))
}

pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> anyhow::Result<Option<T>> {
    let Some(raw) = store.get_document(collection, id).await? else {
        return Ok(None);
    };
    let parsed = serde_json::from_value::<T>(raw).map_err(|e| StoreError::Decode {
        collection: collection.to_string(),
        detail: format!("document {id}: {e}"),
    })?;
    Ok(Some(parsed))
}

fn decode_all<T: DeserializeOwned>(collection: &str, raw: Vec<Value>) -> Vec<T> {
    let total = raw.len();
    let mut out = Vec::with_capacity(total);
    for doc in raw {
        let id = doc
            .get("$id")
            .and_then(Value::as_str)
            .unwrap_or("<no id>")
            .to_string();
        match serde_json::from_value::<T>(doc) {
            Ok(parsed) => out.push(parsed),
            Err(e) => {
                tracing::warn!(collection, document_id = %id, error = %e, "skipping malformed document");
            }
        }
    }
    if out.len() != total {
        tracing::warn!(collection, total, decoded = out.len(), "some documents were skipped");
    }
    out
}
