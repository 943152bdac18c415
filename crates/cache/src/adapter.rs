//! Cache adapter: JSON encoding, TTL normalization, serialized ordering.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use optrack_queue::SerialQueue;

use crate::client::KeyValueClient;

/// Default entry lifetime: 30 seconds, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 30_000;

/// Normalized entry lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// A zero-duration entry is meaningless to the backing store; the write
    /// is skipped entirely.
    Zero,
    /// Expire after the given number of milliseconds.
    Millis(u64),
    /// Store with no expiration.
    Infinite,
}

impl Ttl {
    /// Normalize a raw millisecond count.
    ///
    /// `0` maps to [`Ttl::Zero`], negative or NaN inputs fall back to
    /// [`DEFAULT_TTL_MS`], `+∞` maps to [`Ttl::Infinite`].
    pub fn from_millis(ms: f64) -> Self {
        if ms == 0.0 {
            Ttl::Zero
        } else if ms.is_nan() || ms < 0.0 {
            Ttl::Millis(DEFAULT_TTL_MS)
        } else if ms.is_infinite() {
            Ttl::Infinite
        } else {
            Ttl::Millis(ms as u64)
        }
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::Millis(DEFAULT_TTL_MS)
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        match d.as_millis() {
            0 => Ttl::Zero,
            ms => Ttl::Millis(ms as u64),
        }
    }
}

impl From<f64> for Ttl {
    fn from(ms: f64) -> Self {
        Ttl::from_millis(ms)
    }
}

/// Key-value cache over a remote client.
///
/// Every operation is enqueued on the adapter's [`SerialQueue`], so client
/// calls reach the backing store in submission order regardless of when the
/// returned futures are awaited.
///
/// ## Error policy
///
/// Client errors are **swallowed**: every operation resolves successfully
/// whatever the client reports. Callers cannot distinguish "cached" from
/// "cache write silently failed"; failures are logged at `debug` only.
pub struct CacheAdapter<C> {
    client: Arc<C>,
    queue: SerialQueue,
}

impl<C: KeyValueClient + 'static> CacheAdapter<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            queue: SerialQueue::new(),
        }
    }

    /// Shared handle to the underlying client.
    pub fn client(&self) -> Arc<C> {
        Arc::clone(&self.client)
    }

    /// Read and decode one entry.
    ///
    /// Absent, expired, undecodable, and errored reads all yield `None`.
    pub fn get<V>(&self, key: &str) -> impl Future<Output = Option<V>> + Send + use<C, V>
    where
        V: DeserializeOwned + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let key = key.to_string();
        debug!(%key, "cache get");

        let queued = self.queue.enqueue(move || async move {
            let raw = match client.get(&key).await {
                Ok(raw) => raw,
                Err(err) => {
                    debug!(%key, %err, "cache get failed");
                    return None;
                }
            };
            raw.and_then(|text| match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(err) => {
                    debug!(%key, %err, "cache entry undecodable");
                    None
                }
            })
        });

        async move { queued.await.ok().flatten() }
    }

    /// Encode and write one entry.
    ///
    /// A [`Ttl::Zero`] lifetime makes the whole call a no-op.
    pub fn put<V>(
        &self,
        key: &str,
        value: &V,
        ttl: Ttl,
    ) -> impl Future<Output = ()> + Send + use<C, V>
    where
        V: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(value);
        let client = Arc::clone(&self.client);
        let key = key.to_string();
        debug!(%key, ?ttl, "cache put");

        let queued = match (ttl, encoded) {
            (Ttl::Zero, _) => None,
            (_, Err(err)) => {
                debug!(%key, %err, "cache value unencodable");
                None
            }
            (ttl, Ok(text)) => Some(self.queue.enqueue(move || async move {
                let outcome = if let Ttl::Millis(ms) = ttl {
                    client.psetex(&key, ms, &text).await
                } else {
                    client.set(&key, &text).await
                };
                if let Err(err) = outcome {
                    debug!(%key, %err, "cache put failed");
                }
            })),
        };

        async move {
            if let Some(queued) = queued {
                let _ = queued.await;
            }
        }
    }

    /// Remove one entry. Absent keys are not an error.
    pub fn del(&self, key: &str) -> impl Future<Output = ()> + Send + use<C> {
        let client = Arc::clone(&self.client);
        let key = key.to_string();
        debug!(%key, "cache del");

        let queued = self.queue.enqueue(move || async move {
            if let Err(err) = client.del(&key).await {
                debug!(%key, %err, "cache del failed");
            }
        });
        async move {
            let _ = queued.await;
        }
    }

    /// Flush the **entire** backing store.
    ///
    /// Destructive and non-namespaced: this removes every entry, not just
    /// those written through this adapter.
    pub fn clear(&self) -> impl Future<Output = ()> + Send + use<C> {
        let client = Arc::clone(&self.client);
        debug!("cache clear");

        let queued = self.queue.enqueue(move || async move {
            if let Err(err) = client.flushall().await {
                debug!(%err, "cache clear failed");
            }
        });
        async move {
            let _ = queued.await;
        }
    }
}
