//! Lifecycle tracker for one push broadcast.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use optrack_core::{fingerprint, Acl, ObjectId, EMPTY_FINGERPRINT};

use crate::records::{
    Pointer, PushDeliveryRecord, PushState, PushStatusRecord, PUSH_COLLECTION,
    PUSH_STATUS_COLLECTION,
};
use crate::store::DocumentStore;
use crate::writer::{StatusError, StatusWriter};

/// One target recipient, read-only to this tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub object_id: String,
    pub device_token: Option<String>,
}

impl Installation {
    pub fn new(object_id: impl Into<String>, device_token: Option<&str>) -> Self {
        Self {
            object_id: object_id.into(),
            device_token: device_token.map(str::to_string),
        }
    }
}

/// Broadcast metadata supplied alongside the push body.
#[derive(Debug, Clone)]
pub struct PushOptions {
    pub source: String,
    pub title: Option<String>,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            source: "rest".to_string(),
            title: None,
        }
    }
}

/// Outcome bundle handed back by the push-delivery adapter.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    /// Raw adapter results; may be nested arrays of arrays (batched
    /// responses) or a non-array, which tallies as empty.
    pub results: JsonValue,
    /// The installations the broadcast targeted.
    pub installations: Vec<Installation>,
}

/// Flatten arbitrarily nested arrays into a flat element sequence.
///
/// Pure structural recursion, order-preserving; depth is unbounded.
/// Non-array leaves come back as single elements.
pub fn flatten(value: &JsonValue) -> Vec<JsonValue> {
    match value {
        JsonValue::Array(items) => items.iter().flat_map(flatten).collect(),
        leaf => vec![leaf.clone()],
    }
}

/// Aggregate delivery statistics, recomputed from scratch per report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTally {
    pub num_sent: u64,
    pub num_failed: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sent_per_type: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_per_type: BTreeMap<String, u64>,
}

impl DeliveryTally {
    /// Tally flattened adapter results.
    ///
    /// Entries lacking `device` or `device.deviceType` cannot be attributed
    /// and are skipped; they count toward neither total. The per-type maps
    /// therefore sum exactly to `num_sent` / `num_failed`.
    pub fn from_results(results: &[JsonValue]) -> Self {
        let mut tally = Self::default();
        for result in results {
            let Some(device_type) = result
                .get("device")
                .and_then(|d| d.get("deviceType"))
                .and_then(JsonValue::as_str)
            else {
                continue;
            };
            let transmitted = result
                .get("transmitted")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            if transmitted {
                tally.num_sent += 1;
                *tally.sent_per_type.entry(device_type.to_string()).or_default() += 1;
            } else {
                tally.num_failed += 1;
                *tally.failed_per_type.entry(device_type.to_string()).or_default() += 1;
            }
        }
        tally
    }
}

/// Tracks one push broadcast through `pending → running → {succeeded, failed}`.
///
/// `set_running` fans out one delivery record per installation; `complete`
/// matches adapter results back to those records by device token and
/// recomputes the broadcast's aggregates. Partial delivery failure still
/// ends in `succeeded`; `fail` is reserved for a failure of the send
/// operation itself.
pub struct PushStatusTracker<D> {
    object_id: ObjectId,
    writer: StatusWriter<D>,
}

impl<D: DocumentStore + 'static> PushStatusTracker<D> {
    pub fn new(store: Arc<D>) -> Self {
        Self {
            object_id: ObjectId::new(),
            writer: StatusWriter::new(PUSH_STATUS_COLLECTION, store),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Create the push status document with `status = pending`.
    ///
    /// The content fingerprint is taken from `body.data.alert`: a string
    /// hashes raw, an object hashes its serialized form, anything else
    /// falls back to the empty-input fingerprint. Selector and payload are
    /// persisted serialized, for audit.
    pub fn set_initial(
        &self,
        body: &JsonValue,
        selector: &JsonValue,
        options: PushOptions,
    ) -> impl Future<Output = Result<JsonValue, StatusError>> + Send + use<D> {
        let now = Utc::now();
        let data = body.get("data").cloned().unwrap_or_else(|| json!({}));
        let push_hash = match data.get("alert") {
            Some(JsonValue::String(alert)) => fingerprint(alert),
            Some(alert @ JsonValue::Object(_)) => fingerprint(&alert.to_string()),
            _ => EMPTY_FINGERPRINT.to_string(),
        };
        let record = PushStatusRecord {
            object_id: self.object_id.clone(),
            created_at: now,
            push_time: now.to_rfc3339(),
            query: selector.to_string(),
            payload: data.to_string(),
            source: options.source,
            title: options.title,
            expiry: body.get("expiration_time").filter(|v| !v.is_null()).cloned(),
            status: PushState::Pending,
            num_sent: 0,
            num_failed: 0,
            push_hash,
            acl: Acl::restricted(),
        };
        debug!(push = %self.object_id, hash = %record.push_hash, "push pending");
        let queued = serde_json::to_value(&record)
            .map(|doc| self.writer.create(doc))
            .map_err(|e| StatusError::Serialize(e.to_string()));
        async move { queued?.await }
    }

    /// Fan out delivery records, then transition `pending → running`.
    ///
    /// Exactly one record is created per installation, result unset. The
    /// status transition is written only after every insert has settled.
    pub fn set_running(
        &self,
        installations: &[Installation],
    ) -> impl Future<Output = Result<(), StatusError>> + Send + use<D> {
        debug!(
            push = %self.object_id,
            installations = installations.len(),
            "sending push"
        );
        let now = Utc::now();
        let docs: Result<Vec<JsonValue>, StatusError> = installations
            .iter()
            .map(|installation| {
                let record = PushDeliveryRecord {
                    object_id: ObjectId::new(),
                    created_at: now,
                    updated_at: now,
                    device_token: installation.device_token.clone(),
                    installation: Pointer::installation(installation.object_id.clone()),
                    push_status: self.object_id.clone(),
                    result: None,
                };
                serde_json::to_value(&record).map_err(|e| StatusError::Serialize(e.to_string()))
            })
            .collect();

        let queued = docs.map(|docs| self.writer.create_many(PUSH_COLLECTION, docs));
        let writer = self.writer.clone();
        let object_id = self.object_id.clone();
        async move {
            queued?.await?;
            writer
                .update(
                    json!({"status": PushState::Pending, "objectId": object_id}),
                    json!({"status": PushState::Running, "updatedAt": Utc::now()}),
                )
                .await?;
            Ok(())
        }
    }

    /// Record per-recipient outcomes and transition `running → succeeded`.
    ///
    /// Aggregates are recomputed from this report alone, never accumulated
    /// across calls. Resolves with the computed tally.
    pub fn complete(
        &self,
        report: CompletionReport,
    ) -> impl Future<Output = Result<DeliveryTally, StatusError>> + Send + use<D> {
        let now = Utc::now();
        let results = if report.results.is_array() {
            flatten(&report.results)
        } else {
            Vec::new()
        };
        let tally = DeliveryTally::from_results(&results);
        debug!(
            push = %self.object_id,
            sent = tally.num_sent,
            failed = tally.num_failed,
            "push completed"
        );

        // Later duplicates win, matching a keyed lookup over the flat list.
        let by_token: HashMap<&str, &JsonValue> = results
            .iter()
            .filter_map(|result| {
                let token = result.get("device")?.get("deviceToken")?.as_str()?;
                Some((token, result))
            })
            .collect();

        let updates: Vec<(JsonValue, JsonValue)> = report
            .installations
            .iter()
            .map(|installation| {
                let outcome = match installation.device_token.as_deref() {
                    None | Some("") => {
                        json!({"transmitted": false, "error": "No deviceToken found on installation"})
                    }
                    Some(token) => by_token.get(token).map(|r| (*r).clone()).unwrap_or_else(
                        || json!({"transmitted": false, "error": "No result from adapter"}),
                    ),
                };
                let selector = json!({
                    "pushStatus": self.object_id,
                    "installation": Pointer::installation(installation.object_id.clone()),
                });
                (selector, json!({"result": outcome, "updatedAt": now}))
            })
            .collect();

        let queued = self.writer.update_many(PUSH_COLLECTION, updates);
        let writer = self.writer.clone();
        let object_id = self.object_id.clone();
        async move {
            queued.await?;

            let mut patch = json!({
                "status": PushState::Succeeded,
                "updatedAt": now,
            });
            if let (Some(patch), Ok(JsonValue::Object(counts))) =
                (patch.as_object_mut(), serde_json::to_value(&tally))
            {
                patch.extend(counts);
            }
            writer
                .update(
                    json!({"status": PushState::Running, "objectId": object_id}),
                    patch,
                )
                .await?;
            Ok(tally)
        }
    }

    /// Terminal transition to `failed`.
    ///
    /// Records a serialized form of the error on the status document;
    /// delivery records are left untouched.
    pub fn fail<E>(&self, err: &E) -> impl Future<Output = Result<(), StatusError>> + Send + use<D, E>
    where
        E: Serialize + ?Sized,
    {
        let error_message = serde_json::to_string(err)
            .unwrap_or_else(|_| "\"unserializable error\"".to_string());
        warn!(push = %self.object_id, %error_message, "error while sending push");
        let queued = self.writer.update(
            json!({"objectId": self.object_id}),
            json!({
                "status": PushState::Failed,
                "errorMessage": error_message,
                "updatedAt": Utc::now(),
            }),
        );
        async move { queued.await.map(|_| ()) }
    }
}
