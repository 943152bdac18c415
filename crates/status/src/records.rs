//! Record types for the status collections.
//!
//! One explicit type per stored document shape. Caller-defined content
//! (`params`, push payloads, delivery results) stays opaque JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use optrack_core::{Acl, ObjectId};

/// Collection holding one document per tracked background job.
pub const JOB_STATUS_COLLECTION: &str = "_JobStatus";
/// Collection holding one document per push broadcast.
pub const PUSH_STATUS_COLLECTION: &str = "_PushStatus";
/// Collection holding one delivery record per push recipient.
pub const PUSH_COLLECTION: &str = "Push";

/// Background job lifecycle state.
///
/// `running → {succeeded, failed}`; both end states are terminal. Terminal
/// re-entry is a caller contract, not enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Push broadcast lifecycle state.
///
/// `pending → running → {succeeded, failed}`. Partial delivery failure
/// still ends in `succeeded`; only a failure of the send operation itself
/// ends in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl PushState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PushState::Succeeded | PushState::Failed)
    }
}

/// Cross-collection reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    #[serde(rename = "__type")]
    pub r#type: String,
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
}

impl Pointer {
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            r#type: "Pointer".to_string(),
            class_name: class_name.into(),
            object_id: object_id.into(),
        }
    }

    /// Reference to an external `_Installation` entity.
    pub fn installation(object_id: impl Into<String>) -> Self {
        Self::new("_Installation", object_id)
    }
}

/// Status document for one background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusRecord {
    pub object_id: ObjectId,
    pub job_name: String,
    /// Caller-defined job parameters, stored verbatim.
    pub params: JsonValue,
    pub status: JobState,
    pub source: String,
    pub created_at: DateTime<Utc>,
    /// Lockdown: no public read or write.
    #[serde(rename = "ACL")]
    pub acl: Acl,
}

/// Status document for one push broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStatusRecord {
    pub object_id: ObjectId,
    pub created_at: DateTime<Utc>,
    /// ISO-8601 send time, kept as a string for audit.
    pub push_time: String,
    /// Serialized installation selector, kept for audit.
    pub query: String,
    /// Serialized push payload data, kept for audit.
    pub payload: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<JsonValue>,
    pub status: PushState,
    pub num_sent: u64,
    pub num_failed: u64,
    pub push_hash: String,
    #[serde(rename = "ACL")]
    pub acl: Acl,
}

/// Delivery record for one push recipient.
///
/// Owned conceptually by a [`PushStatusRecord`] but stored independently,
/// correlated only by the `pushStatus` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushDeliveryRecord {
    pub object_id: ObjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
    pub installation: Pointer,
    pub push_status: ObjectId,
    /// Delivery outcome; absent until the broadcast completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn states_serialize_lowercase() {
        assert_eq!(serde_json::to_value(JobState::Running).unwrap(), json!("running"));
        assert_eq!(serde_json::to_value(PushState::Pending).unwrap(), json!("pending"));
        assert_eq!(serde_json::to_value(PushState::Succeeded).unwrap(), json!("succeeded"));
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!PushState::Pending.is_terminal());
        assert!(!PushState::Running.is_terminal());
        assert!(PushState::Failed.is_terminal());
    }

    #[test]
    fn pointer_document_shape() {
        let ptr = Pointer::installation("i1");
        assert_eq!(
            serde_json::to_value(&ptr).unwrap(),
            json!({"__type": "Pointer", "className": "_Installation", "objectId": "i1"})
        );
    }

    #[test]
    fn delivery_record_omits_unset_fields() {
        let record = PushDeliveryRecord {
            object_id: "p1".parse().unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            device_token: None,
            installation: Pointer::installation("i1"),
            push_status: "s1".parse().unwrap(),
            result: None,
        };
        let doc = serde_json::to_value(&record).unwrap();
        assert!(doc.get("deviceToken").is_none());
        assert!(doc.get("result").is_none());
    }
}
