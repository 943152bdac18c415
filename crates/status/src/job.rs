//! Lifecycle tracker for one background job.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use optrack_core::{Acl, ObjectId};

use crate::records::{JobState, JobStatusRecord, JOB_STATUS_COLLECTION};
use crate::store::DocumentStore;
use crate::writer::{StatusError, StatusWriter};

/// Tracks one background job through `running → {succeeded, failed}`.
///
/// The tracker's identifier is allocated at construction; `set_running`
/// creates the status document and the terminal setters patch it. Calling
/// `set_running` twice, or mutating after a terminal status, is a caller
/// contract violation this tracker does not guard against.
pub struct JobStatusTracker<D> {
    object_id: ObjectId,
    writer: StatusWriter<D>,
}

impl<D: DocumentStore + 'static> JobStatusTracker<D> {
    pub fn new(store: Arc<D>) -> Self {
        Self {
            object_id: ObjectId::new(),
            writer: StatusWriter::new(JOB_STATUS_COLLECTION, store),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Create the job status document with `status = running`.
    ///
    /// Resolves with the created document.
    pub fn set_running(
        &self,
        job_name: &str,
        params: JsonValue,
    ) -> impl Future<Output = Result<JsonValue, StatusError>> + Send + use<D> {
        debug!(%job_name, job = %self.object_id, "job running");
        let record = JobStatusRecord {
            object_id: self.object_id.clone(),
            job_name: job_name.to_string(),
            params,
            status: JobState::Running,
            source: "api".to_string(),
            created_at: Utc::now(),
            acl: Acl::restricted(),
        };
        let queued = serde_json::to_value(&record)
            .map(|doc| self.writer.create(doc))
            .map_err(|e| StatusError::Serialize(e.to_string()));
        async move { queued?.await }
    }

    /// Update the job's progress message.
    ///
    /// An empty message is a no-op: nothing is written.
    pub fn set_message(
        &self,
        message: &str,
    ) -> impl Future<Output = Result<(), StatusError>> + Send + use<D> {
        let queued = if message.is_empty() {
            None
        } else {
            Some(self.writer.update(
                json!({"objectId": self.object_id}),
                json!({"message": message}),
            ))
        };
        async move {
            match queued {
                Some(write) => write.await.map(|_| ()),
                None => Ok(()),
            }
        }
    }

    /// Terminal transition to `succeeded`.
    pub fn set_succeeded(
        &self,
        message: Option<&str>,
    ) -> impl Future<Output = Result<(), StatusError>> + Send + use<D> {
        self.set_final_status(JobState::Succeeded, message)
    }

    /// Terminal transition to `failed`.
    pub fn set_failed(
        &self,
        message: Option<&str>,
    ) -> impl Future<Output = Result<(), StatusError>> + Send + use<D> {
        self.set_final_status(JobState::Failed, message)
    }

    fn set_final_status(
        &self,
        status: JobState,
        message: Option<&str>,
    ) -> impl Future<Output = Result<(), StatusError>> + Send + use<D> {
        debug!(job = %self.object_id, ?status, "job finished");
        let mut patch = json!({
            "status": status,
            "finishedAt": Utc::now(),
        });
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            patch["message"] = json!(message);
        }
        let queued = self.writer.update(json!({"objectId": self.object_id}), patch);
        async move { queued.await.map(|_| ()) }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::store::{InMemoryDocumentStore, StoreOp};

    use super::*;

    fn tracker() -> JobStatusTracker<InMemoryDocumentStore> {
        JobStatusTracker::new(Arc::new(InMemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn set_running_creates_a_locked_down_running_document() {
        let tracker = tracker();

        let doc = tracker
            .set_running("reindex", json!({"batch": 10}))
            .await
            .unwrap();

        assert_eq!(doc["jobName"], json!("reindex"));
        assert_eq!(doc["params"], json!({"batch": 10}));
        assert_eq!(doc["status"], json!("running"));
        assert_eq!(doc["source"], json!("api"));
        assert_eq!(doc["ACL"], json!({}));
        assert!(doc.get("finishedAt").is_none());

        let stored = tracker.writer.store().docs(JOB_STATUS_COLLECTION);
        assert_eq!(stored, vec![doc]);
    }

    #[tokio::test]
    async fn succeeded_sets_terminal_status_and_finished_at() {
        let tracker = tracker();

        tracker.set_running("J1", json!({})).await.unwrap();
        tracker.set_succeeded(Some("done")).await.unwrap();

        let doc = &tracker
            .writer
            .store()
            .find(JOB_STATUS_COLLECTION, &json!({"objectId": tracker.object_id()}))[0];
        assert_eq!(doc["status"], json!("succeeded"));
        assert_eq!(doc["message"], json!("done"));
        assert!(doc.get("finishedAt").is_some());
    }

    #[tokio::test]
    async fn failed_without_message_omits_it() {
        let tracker = tracker();

        tracker.set_running("J1", json!({})).await.unwrap();
        tracker.set_failed(None).await.unwrap();

        let doc = &tracker
            .writer
            .store()
            .find(JOB_STATUS_COLLECTION, &json!({"objectId": tracker.object_id()}))[0];
        assert_eq!(doc["status"], json!("failed"));
        assert!(doc.get("message").is_none());
        assert!(doc.get("finishedAt").is_some());
    }

    #[tokio::test]
    async fn empty_message_writes_nothing() {
        let tracker = tracker();

        tracker.set_running("J1", json!({})).await.unwrap();
        tracker.set_message("").await.unwrap();

        // Only the create reached the store.
        assert_eq!(tracker.writer.store().ops().len(), 1);

        tracker.set_message("halfway").await.unwrap();
        let ops = tracker.writer.store().ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[1], StoreOp::Update { patch, .. } if patch["message"] == "halfway"));
    }
}
