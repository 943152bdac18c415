//! Status lifecycle tracking for background jobs and push broadcasts.
//!
//! All writes flow through a [`StatusWriter`], which serializes them on a
//! per-writer [`optrack_queue::SerialQueue`] before they reach the
//! [`DocumentStore`]. On top of the writer sit two lifecycle trackers:
//! [`JobStatusTracker`] (`running → succeeded | failed`) and
//! [`PushStatusTracker`] (`pending → running → succeeded | failed`, with
//! per-recipient delivery fan-out and result aggregation).
//!
//! Store errors **propagate** to the caller of the failing operation; a
//! failure never poisons later operations on the same writer. This is the
//! opposite policy from the cache adapter, which swallows backend errors.

pub mod job;
pub mod push;
pub mod records;
pub mod store;
pub mod writer;


pub use job::JobStatusTracker;
pub use push::{flatten, CompletionReport, DeliveryTally, Installation, PushOptions, PushStatusTracker};
pub use records::{
    JobState, JobStatusRecord, Pointer, PushDeliveryRecord, PushState, PushStatusRecord,
    JOB_STATUS_COLLECTION, PUSH_COLLECTION, PUSH_STATUS_COLLECTION,
};
pub use store::{DocumentStore, InMemoryDocumentStore, StoreError, StoreOp};
pub use writer::{StatusError, StatusWriter};
