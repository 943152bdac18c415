//! Access control value object for status documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-document access control list.
///
/// Status documents are written with an empty ACL ("lockdown"): no public
/// read or write. The map form mirrors the stored document shape, keyed by
/// principal with per-principal read/write flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl(BTreeMap<String, AclEntry>);

/// Read/write grant for a single principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub write: bool,
}

impl Acl {
    /// Fully restricted ACL: no principal may read or write.
    pub fn restricted() -> Self {
        Self::default()
    }

    pub fn is_restricted(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_acl_serializes_as_empty_object() {
        let acl = Acl::restricted();
        assert_eq!(serde_json::to_value(&acl).unwrap(), serde_json::json!({}));
    }
}
