//! Generic status writer: serialized create/update against one collection.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use optrack_queue::{QueueError, SerialQueue};

use crate::store::{DocumentStore, StoreError};

/// Status writing error.
///
/// Store errors propagate as failed operations; the caller of the failing
/// operation sees the error, later operations on the same writer do not.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("record serialization failed: {0}")]
    Serialize(String),
}

/// Collection-scoped writer over a [`DocumentStore`].
///
/// Every write is enqueued on the writer's own [`SerialQueue`], so the
/// store observes them in submission order regardless of when the returned
/// futures are awaited. The fan-out helpers route per-element writes
/// through the same queue, serializing them against the writer's other
/// operations.
pub struct StatusWriter<D> {
    collection: String,
    store: Arc<D>,
    queue: SerialQueue,
}

impl<D> Clone for StatusWriter<D> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            store: Arc::clone(&self.store),
            queue: self.queue.clone(),
        }
    }
}

impl<D: DocumentStore + 'static> StatusWriter<D> {
    pub fn new(collection: impl Into<String>, store: Arc<D>) -> Self {
        Self {
            collection: collection.into(),
            store,
            queue: SerialQueue::new(),
        }
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> Arc<D> {
        Arc::clone(&self.store)
    }

    /// Insert one document into the writer's collection.
    ///
    /// Resolves with the same document, so callers can keep chaining off
    /// generated fields.
    pub fn create(
        &self,
        doc: JsonValue,
    ) -> impl Future<Output = Result<JsonValue, StatusError>> + Send + use<D> {
        self.create_in(self.collection.clone(), doc)
    }

    /// Patch documents in the writer's collection.
    pub fn update(
        &self,
        selector: JsonValue,
        patch: JsonValue,
    ) -> impl Future<Output = Result<u64, StatusError>> + Send + use<D> {
        self.update_in(self.collection.clone(), selector, patch)
    }

    /// Insert one document per element into an explicit collection.
    ///
    /// Writes are dispatched together and joined, but each one still passes
    /// through the writer's queue, so they land on the store in element
    /// order. Fails if any insert fails.
    pub fn create_many(
        &self,
        collection: &str,
        docs: Vec<JsonValue>,
    ) -> impl Future<Output = Result<Vec<JsonValue>, StatusError>> + Send + use<D> {
        let writes: Vec<_> = docs
            .into_iter()
            .map(|doc| self.create_in(collection.to_string(), doc))
            .collect();
        async move { try_join_all(writes).await }
    }

    /// One patch per `(selector, patch)` pair against an explicit collection.
    pub fn update_many(
        &self,
        collection: &str,
        ops: Vec<(JsonValue, JsonValue)>,
    ) -> impl Future<Output = Result<Vec<u64>, StatusError>> + Send + use<D> {
        let writes: Vec<_> = ops
            .into_iter()
            .map(|(selector, patch)| self.update_in(collection.to_string(), selector, patch))
            .collect();
        async move { try_join_all(writes).await }
    }

    fn create_in(
        &self,
        collection: String,
        doc: JsonValue,
    ) -> impl Future<Output = Result<JsonValue, StatusError>> + Send + use<D> {
        debug!(%collection, "status create");
        let store = Arc::clone(&self.store);
        let queued = self.queue.enqueue(move || async move {
            store.create(&collection, &doc).await.map(|()| doc)
        });
        async move { Ok(queued.await??) }
    }

    fn update_in(
        &self,
        collection: String,
        selector: JsonValue,
        patch: JsonValue,
    ) -> impl Future<Output = Result<u64, StatusError>> + Send + use<D> {
        debug!(%collection, "status update");
        let store = Arc::clone(&self.store);
        let queued = self.queue.enqueue(move || async move {
            store.update(&collection, &selector, &patch).await
        });
        async move { Ok(queued.await??) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::store::{InMemoryDocumentStore, StoreOp};

    use super::*;

    #[tokio::test]
    async fn create_resolves_with_the_same_document() {
        let writer = StatusWriter::new("things", Arc::new(InMemoryDocumentStore::new()));

        let doc = json!({"objectId": "a", "n": 1});
        let created = writer.create(doc.clone()).await.unwrap();

        assert_eq!(created, doc);
        assert_eq!(writer.store().docs("things"), vec![doc]);
    }

    #[tokio::test]
    async fn update_resolves_with_matched_count() {
        let writer = StatusWriter::new("things", Arc::new(InMemoryDocumentStore::new()));

        writer.create(json!({"objectId": "a"})).await.unwrap();
        let updated = writer
            .update(json!({"objectId": "a"}), json!({"n": 2}))
            .await
            .unwrap();

        assert_eq!(updated, 1);
    }

    #[tokio::test]
    async fn writes_land_in_submission_order() {
        let writer = StatusWriter::new("things", Arc::new(InMemoryDocumentStore::new()));

        // Submit without awaiting any individual write.
        let c1 = writer.create(json!({"objectId": "a"}));
        let u1 = writer.update(json!({"objectId": "a"}), json!({"n": 1}));
        let c2 = writer.create(json!({"objectId": "b"}));

        let (r1, r2, r3) = tokio::join!(c1, u1, c2);
        r1.unwrap();
        r2.unwrap();
        r3.unwrap();

        let ops = writer.store().ops();
        assert!(matches!(&ops[0], StoreOp::Create { doc, .. } if doc["objectId"] == "a"));
        assert!(matches!(&ops[1], StoreOp::Update { .. }));
        assert!(matches!(&ops[2], StoreOp::Create { doc, .. } if doc["objectId"] == "b"));
    }

    #[tokio::test]
    async fn create_many_lands_in_element_order() {
        let writer = StatusWriter::new("things", Arc::new(InMemoryDocumentStore::new()));

        let docs: Vec<_> = (0..5).map(|i| json!({"objectId": i.to_string()})).collect();
        writer.create_many("fanout", docs.clone()).await.unwrap();

        assert_eq!(writer.store().docs("fanout"), docs);
    }

    /// Fails the first create, succeeds afterwards.
    struct FlakyStore {
        inner: InMemoryDocumentStore,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn create(&self, collection: &str, doc: &JsonValue) -> Result<(), StoreError> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Backend("write refused".to_string()));
            }
            self.inner.create(collection, doc).await
        }

        async fn update(
            &self,
            collection: &str,
            selector: &JsonValue,
            patch: &JsonValue,
        ) -> Result<u64, StoreError> {
            self.inner.update(collection, selector, patch).await
        }
    }

    #[tokio::test]
    async fn store_errors_propagate_without_poisoning_the_writer() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryDocumentStore::new(),
            failed_once: AtomicBool::new(false),
        });
        let writer = StatusWriter::new("things", store);

        let first = writer.create(json!({"objectId": "a"})).await;
        assert!(matches!(first, Err(StatusError::Store(_))));

        // The failure was reported to its own caller only.
        let second = writer.create(json!({"objectId": "b"})).await;
        assert!(second.is_ok());
        assert_eq!(writer.store().inner.docs("things").len(), 1);
    }
}
