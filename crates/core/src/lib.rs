//! `optrack-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod acl;
pub mod error;
pub mod fingerprint;
pub mod id;

pub use acl::Acl;
pub use error::{CoreError, CoreResult};
pub use fingerprint::{fingerprint, EMPTY_FINGERPRINT};
pub use id::ObjectId;
