//! Key-value client boundary.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

/// Key-value client error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("key-value backend error: {0}")]
    Backend(String),
}

/// Remote key-value store abstraction.
///
/// Values are stored as text; encoding is the caller's concern. Absent keys
/// are not errors: `get` yields `Ok(None)`.
#[async_trait]
pub trait KeyValueClient: Send + Sync {
    /// Read one entry. Absent or expired keys yield `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write one entry with no expiration.
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Write one entry that expires after `ttl_ms` milliseconds.
    async fn psetex(&self, key: &str, ttl_ms: u64, value: &str) -> Result<(), KvError>;

    /// Remove one entry. Absent keys are not an error.
    async fn del(&self, key: &str) -> Result<(), KvError>;

    /// Flush the **entire** store, including entries written by others.
    async fn flushall(&self) -> Result<(), KvError>;
}

/// One client call, as observed by [`InMemoryKvClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Get(String),
    Set(String),
    PSetEx(String, u64),
    Del(String),
    FlushAll,
}

#[derive(Debug, Default)]
struct KvState {
    entries: HashMap<String, (String, Option<Instant>)>,
    log: Vec<KvOp>,
}

/// In-memory key-value client for tests/dev.
///
/// Expiry is deadline-based and enforced lazily on read. Every call is
/// appended to an ordered operation log so tests can assert submission
/// ordering at the boundary.
#[derive(Debug, Default)]
pub struct InMemoryKvClient {
    state: Mutex<KvState>,
}

impl InMemoryKvClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the ordered operation log.
    pub fn ops(&self) -> Vec<KvOp> {
        self.state.lock().unwrap().log.clone()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().unwrap();
        state
            .entries
            .values()
            .filter(|(_, deadline)| deadline.map_or(true, |d| d > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueClient for InMemoryKvClient {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(KvOp::Get(key.to_string()));
        match state.entries.get(key) {
            Some((_, Some(deadline))) if *deadline <= Instant::now() => {
                state.entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(KvOp::Set(key.to_string()));
        state.entries.insert(key.to_string(), (value.to_string(), None));
        Ok(())
    }

    async fn psetex(&self, key: &str, ttl_ms: u64, value: &str) -> Result<(), KvError> {
        let deadline = Instant::now() + Duration::from_millis(ttl_ms);
        let mut state = self.state.lock().unwrap();
        state.log.push(KvOp::PSetEx(key.to_string(), ttl_ms));
        state
            .entries
            .insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(KvOp::Del(key.to_string()));
        state.entries.remove(key);
        Ok(())
    }

    async fn flushall(&self) -> Result<(), KvError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(KvOp::FlushAll);
        state.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_del_round_trip() {
        let client = InMemoryKvClient::new();

        client.set("k", "v").await.unwrap();
        assert_eq!(client.get("k").await.unwrap(), Some("v".to_string()));

        client.del("k").await.unwrap();
        assert_eq!(client.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn psetex_entry_expires() {
        let client = InMemoryKvClient::new();

        client.psetex("k", 5, "v").await.unwrap();
        assert_eq!(client.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn flushall_clears_everything() {
        let client = InMemoryKvClient::new();

        client.set("a", "1").await.unwrap();
        client.set("b", "2").await.unwrap();
        client.flushall().await.unwrap();

        assert!(client.is_empty());
        assert_eq!(client.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn del_on_absent_key_is_ok() {
        let client = InMemoryKvClient::new();
        assert!(client.del("missing").await.is_ok());
    }
}
