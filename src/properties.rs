use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
pub use uuid::Uuid;

use crate::error::ImportError;

/// Stable identifier
///
/// Assigned once per source path by the [crate::registry::MetadataRegistry] and never reallocated
/// for the lifetime of an import run. Every schema type, attribute owner, content item and space
/// the importer emits is addressed by one of these.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct StableId(Uuid);

impl StableId {
    pub fn generate() -> Self {
        StableId(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        StableId(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl TryFrom<&str> for StableId {
    type Error = ImportError;

    fn try_from(string: &str) -> Result<Self, Self::Error> {
        Ok(StableId(Uuid::parse_str(string)?))
    }
}

impl Display for StableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0.hyphenated().encode_lower(&mut Uuid::encode_buffer())
        )
    }
}

impl From<StableId> for String {
    fn from(val: StableId) -> Self {
        format!("{val}")
    }
}

/// Blob identifier. Allocated from its own namespace so a path may carry both a [StableId] (as an
/// attachment document) and a [BlobId] (as the uploaded bytes).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BlobId(Uuid);

impl BlobId {
    pub fn generate() -> Self {
        BlobId(Uuid::new_v4())
    }
}

impl TryFrom<&str> for BlobId {
    type Error = ImportError;

    fn try_from(string: &str) -> Result<Self, Self::Error> {
        Ok(BlobId(Uuid::parse_str(string)?))
    }
}

impl Display for BlobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "blob:{}", self.0.simple())
    }
}

/// Generates a globally unique attribute name.
pub fn generate_name() -> String {
    Uuid::new_v4().simple().to_string()
}
