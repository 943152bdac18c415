//! Network-backed key-value cache with expiration.
//!
//! The cache is split along the infrastructure boundary: [`KeyValueClient`]
//! abstracts the remote store (Redis in production, in-memory in tests),
//! and [`CacheAdapter`] layers JSON encoding, TTL normalization, and
//! serialized write ordering on top of it.

pub mod adapter;
pub mod client;
#[cfg(feature = "redis")]
pub mod redis;

pub use adapter::{CacheAdapter, Ttl, DEFAULT_TTL_MS};
pub use client::{InMemoryKvClient, KeyValueClient, KvError, KvOp};
#[cfg(feature = "redis")]
pub use redis::RedisKvClient;
