//! Common types used throughout CirrusDrive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the remote API accepts as an alias for the drive root.
pub const ROOT_ID: &str = "root";

/// Identifier of a drive item (file or folder).
///
/// Item ids are opaque strings assigned by the remote API. The empty string
/// and the literal "root" both address the drive root; no other
/// normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Create an ItemId, normalizing empty and "root" spellings to the
    /// canonical root id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.is_empty() || id.eq_ignore_ascii_case(ROOT_ID) {
            Self(ROOT_ID.to_string())
        } else {
            Self(id)
        }
    }

    /// The drive root.
    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    /// Check whether this id addresses the drive root.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
