//! Generic document store boundary.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Document store error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document store error: {0}")]
    Backend(String),
}

/// Collection-oriented document store.
///
/// Documents are opaque JSON objects. Selectors match on top-level field
/// equality; patches merge at the top level. No referential integrity is
/// enforced across collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one document into a collection.
    async fn create(&self, collection: &str, doc: &JsonValue) -> Result<(), StoreError>;

    /// Patch every document matching the selector.
    ///
    /// Resolves with the number of documents updated.
    async fn update(
        &self,
        collection: &str,
        selector: &JsonValue,
        patch: &JsonValue,
    ) -> Result<u64, StoreError>;
}

/// One store call, as observed by [`InMemoryDocumentStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Create {
        collection: String,
        doc: JsonValue,
    },
    Update {
        collection: String,
        selector: JsonValue,
        patch: JsonValue,
    },
}

#[derive(Debug, Default)]
struct StoreState {
    collections: HashMap<String, Vec<JsonValue>>,
    log: Vec<StoreOp>,
}

/// In-memory document store for tests/dev.
///
/// Keeps per-collection document vectors in insertion order and records an
/// ordered log of every call so tests can assert write ordering at the
/// boundary.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    state: Mutex<StoreState>,
}

fn selector_matches(selector: &JsonValue, doc: &JsonValue) -> bool {
    match selector.as_object() {
        Some(fields) => fields.iter().all(|(k, v)| doc.get(k) == Some(v)),
        None => false,
    }
}

fn apply_patch(doc: &mut JsonValue, patch: &JsonValue) {
    if let (Some(doc), Some(patch)) = (doc.as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            doc.insert(k.clone(), v.clone());
        }
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All documents of a collection, in insertion order.
    pub fn docs(&self, collection: &str) -> Vec<JsonValue> {
        let state = self.state.lock().unwrap();
        state.collections.get(collection).cloned().unwrap_or_default()
    }

    /// Documents of a collection matching a top-level equality selector.
    pub fn find(&self, collection: &str, selector: &JsonValue) -> Vec<JsonValue> {
        self.docs(collection)
            .into_iter()
            .filter(|doc| selector_matches(selector, doc))
            .collect()
    }

    /// Snapshot of the ordered operation log.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.state.lock().unwrap().log.clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, collection: &str, doc: &JsonValue) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(StoreOp::Create {
            collection: collection.to_string(),
            doc: doc.clone(),
        });
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        selector: &JsonValue,
        patch: &JsonValue,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(StoreOp::Update {
            collection: collection.to_string(),
            selector: selector.clone(),
            patch: patch.clone(),
        });

        let mut updated = 0;
        if let Some(docs) = state.collections.get_mut(collection) {
            for doc in docs.iter_mut() {
                if selector_matches(selector, doc) {
                    apply_patch(doc, patch);
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn create_and_find() {
        let store = InMemoryDocumentStore::new();

        store
            .create("things", &json!({"objectId": "a", "n": 1}))
            .await
            .unwrap();
        store
            .create("things", &json!({"objectId": "b", "n": 2}))
            .await
            .unwrap();

        assert_eq!(store.docs("things").len(), 2);
        let found = store.find("things", &json!({"objectId": "b"}));
        assert_eq!(found, vec![json!({"objectId": "b", "n": 2})]);
    }

    #[tokio::test]
    async fn update_patches_matching_documents_only() {
        let store = InMemoryDocumentStore::new();

        store
            .create("things", &json!({"objectId": "a", "status": "pending"}))
            .await
            .unwrap();
        store
            .create("things", &json!({"objectId": "b", "status": "pending"}))
            .await
            .unwrap();

        let updated = store
            .update(
                "things",
                &json!({"objectId": "a", "status": "pending"}),
                &json!({"status": "running"}),
            )
            .await
            .unwrap();

        assert_eq!(updated, 1);
        assert_eq!(
            store.find("things", &json!({"objectId": "a"}))[0]["status"],
            json!("running")
        );
        assert_eq!(
            store.find("things", &json!({"objectId": "b"}))[0]["status"],
            json!("pending")
        );
    }

    #[tokio::test]
    async fn update_with_no_match_resolves_zero() {
        let store = InMemoryDocumentStore::new();
        let updated = store
            .update("things", &json!({"objectId": "missing"}), &json!({"n": 1}))
            .await
            .unwrap();
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn log_records_calls_in_order() {
        let store = InMemoryDocumentStore::new();

        store.create("a", &json!({"objectId": "1"})).await.unwrap();
        store
            .update("a", &json!({"objectId": "1"}), &json!({"x": 2}))
            .await
            .unwrap();

        let ops = store.ops();
        assert!(matches!(&ops[0], StoreOp::Create { collection, .. } if collection == "a"));
        assert!(matches!(&ops[1], StoreOp::Update { collection, .. } if collection == "a"));
    }
}
