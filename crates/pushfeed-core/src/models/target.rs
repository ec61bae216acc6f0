//! Target identifiers

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Opaque identifier of a monitored target (e.g. a server id)
///
/// Backends emit ids either as JSON strings or as integers; both decode to the
/// same textual form so `"7"` and `7` address the same store entry. Ids are
/// always serialized as strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(String);

impl TargetId {
    /// Create a target id from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for TargetId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u32> for TargetId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for TargetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for TargetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TargetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TargetIdVisitor;

        impl<'de> Visitor<'de> for TargetIdVisitor {
            type Value = TargetId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer target id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TargetId, E> {
                Ok(TargetId::new(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<TargetId, E> {
                Ok(TargetId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TargetId, E> {
                Ok(TargetId::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<TargetId, E> {
                Ok(TargetId::from(v))
            }
        }

        deserializer.deserialize_any(TargetIdVisitor)
    }
}
