//! Serialized asynchronous operation queue.
//!
//! Every status/cache mutation in this workspace passes through a
//! [`SerialQueue`]: operations submitted against one instance run in strict
//! FIFO submission order, even when callers do not await prior operations.
//!
//! ## Ordering
//!
//! Submission order is fixed at the moment [`SerialQueue::enqueue`] is
//! *called* (the job is pushed onto the worker's channel synchronously).
//! Operation N does not start until operation N−1 has settled. Ordering is
//! instance-global, not resource-scoped: operations on different keys or
//! documents routed through the same instance still serialize against each
//! other.
//!
//! ## Failure isolation
//!
//! An operation's outcome is delivered only to the caller that enqueued it.
//! A failed or panicked operation never blocks or fails subsequently queued
//! operations.
//!
//! ## Limits
//!
//! The pending queue is unbounded; there is no backpressure, cancellation,
//! or timeout. An enqueued operation always runs to completion once its
//! turn arrives, whether or not its caller still holds the returned future.

use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Queue submission/settlement error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The worker task is gone (runtime shut down) or the operation was
    /// dropped before producing a result.
    #[error("serial queue closed")]
    Closed,
}

type Job = BoxFuture<'static, ()>;

/// Strict-FIFO executor for asynchronous operations.
///
/// Cloning yields another handle to the same queue; all clones share one
/// ordering domain. The queue's worker exits once every handle is dropped
/// and the backlog is drained.
#[derive(Debug, Clone)]
pub struct SerialQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Create a queue and spawn its worker task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
            debug!("serial queue worker exiting");
        });
        Self { tx }
    }

    /// Submit an operation for serialized execution.
    ///
    /// The operation's position in the queue is taken immediately; the
    /// returned future resolves with its output once its turn completes.
    /// Dropping the returned future does not cancel the operation.
    pub fn enqueue<F, Fut, T>(
        &self,
        op: F,
    ) -> impl Future<Output = Result<T, QueueError>> + Send + use<F, Fut, T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job = async move {
            let out = op().await;
            // The caller may have dropped its handle; the operation still ran.
            let _ = done_tx.send(out);
        }
        .boxed();

        let accepted = self.tx.send(job).is_ok();
        async move {
            if !accepted {
                return Err(QueueError::Closed);
            }
            done_rx.await.map_err(|_| QueueError::Closed)
        }
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}
