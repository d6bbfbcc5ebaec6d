//! Snapshot tag constants and the tag set carried on every snapshot record
//!
//! Tags are the tool's only persistent state. Every snapshot the tool creates
//! carries a marker tag so later passes can tell tool-managed snapshots apart
//! from manual ones, plus a pair of flags that drive the share and re-encrypt
//! passes.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `CreatedBy` | Static tool marker on snapshots taken by the tool |
//! | `CreatedOn` | Creation timestamp (`YYYY-MM-DD-HH-MM`) |
//! | `shareAndCopy` | `YES` while the snapshot still has to be shared |
//! | `reEncrypt` | `YES` while the snapshot still has to be re-encrypted |
//! | `CopiedBy` | Static tool marker on copies made in the destination |
//! | `DBClusterIdentifier` | Cluster a live-created snapshot was taken from |
//! | `SourceDBClusterSnapshotIdentifier` | Automated backup a snapshot was copied from |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag key marking a snapshot as created by this tool
pub const TAG_CREATED_BY: &str = "CreatedBy";

/// Tag key holding the creation timestamp
pub const TAG_CREATED_ON: &str = "CreatedOn";

/// Tag key flagging a snapshot that still has to be shared
pub const TAG_SHARE_AND_COPY: &str = "shareAndCopy";

/// Tag key flagging a snapshot that still has to be re-encrypted
pub const TAG_REENCRYPT: &str = "reEncrypt";

/// Tag key marking a destination-side copy made by this tool
pub const TAG_COPIED_BY: &str = "CopiedBy";

/// Tag key recording the cluster a snapshot was taken from
pub const TAG_CLUSTER_ID: &str = "DBClusterIdentifier";

/// Tag key recording the automated backup a snapshot was copied from
pub const TAG_SOURCE_SNAPSHOT: &str = "SourceDBClusterSnapshotIdentifier";

/// Static value of the `CreatedBy` and `CopiedBy` markers
pub const TOOL_MARKER: &str = "Snapshot Tool for Aurora";

/// Values of the `shareAndCopy` and `reEncrypt` flags
pub mod flag {
    /// Work is still pending
    pub const YES: &str = "YES";

    /// Work is done (or was never requested)
    pub const NO: &str = "NO";
}

/// Key/value tags attached to a snapshot
///
/// Ordered so that rendering and comparisons are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `other` into this set, overwriting existing keys
    pub fn extend(&mut self, other: &TagSet) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Snapshot was taken by this tool
    pub fn is_created_by_tool(&self) -> bool {
        self.get(TAG_CREATED_BY) == Some(TOOL_MARKER)
    }

    /// Snapshot is a destination copy made by this tool
    pub fn is_copied_by_tool(&self) -> bool {
        self.get(TAG_COPIED_BY) == Some(TOOL_MARKER)
    }

    /// Tool-created snapshot that has not been shared yet
    pub fn share_pending(&self) -> bool {
        self.is_created_by_tool() && self.get(TAG_SHARE_AND_COPY) == Some(flag::YES)
    }

    /// Tool-created snapshot that has not been re-encrypted yet
    pub fn reencrypt_pending(&self) -> bool {
        self.is_created_by_tool() && self.get(TAG_REENCRYPT) == Some(flag::YES)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Tags written on a snapshot the tool creates (or re-encrypts)
///
/// `created_on` is the encoded timestamp. `reencrypt` sets the re-encrypt
/// flag so the snapshot is picked up by the re-encrypt pass.
pub fn creation_tags(created_on: &str, reencrypt: bool) -> TagSet {
    let mut tags = TagSet::new()
        .with(TAG_CREATED_BY, TOOL_MARKER)
        .with(TAG_CREATED_ON, created_on)
        .with(TAG_SHARE_AND_COPY, flag::YES);
    if reencrypt {
        tags.insert(TAG_REENCRYPT, flag::YES);
    }
    tags
}

/// Tag written on every copy the tool makes
pub fn copy_marker() -> TagSet {
    TagSet::new().with(TAG_COPIED_BY, TOOL_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_tags_mark_share_pending() {
        let tags = creation_tags("2024-01-01-00-00", false);
        assert!(tags.is_created_by_tool());
        assert!(tags.share_pending());
        assert!(!tags.reencrypt_pending());
        assert_eq!(tags.get(TAG_CREATED_ON), Some("2024-01-01-00-00"));
    }

    #[test]
    fn test_creation_tags_with_reencrypt() {
        let tags = creation_tags("2024-01-01-00-00", true);
        assert!(tags.reencrypt_pending());
    }

    #[test]
    fn test_share_flag_requires_tool_marker() {
        let tags = TagSet::new().with(TAG_SHARE_AND_COPY, flag::YES);
        assert!(!tags.share_pending());
    }

    #[test]
    fn test_cleared_flag_is_not_pending() {
        let tags = creation_tags("2024-01-01-00-00", true)
            .with(TAG_SHARE_AND_COPY, flag::NO)
            .with(TAG_REENCRYPT, flag::NO);
        assert!(!tags.share_pending());
        assert!(!tags.reencrypt_pending());
    }

    #[test]
    fn test_marker_value_must_match() {
        let tags = TagSet::new()
            .with(TAG_CREATED_BY, "someone else")
            .with(TAG_COPIED_BY, "someone else");
        assert!(!tags.is_created_by_tool());
        assert!(!tags.is_copied_by_tool());
        assert!(copy_marker().is_copied_by_tool());
    }

    #[test]
    fn test_extend_overwrites() {
        let mut tags = TagSet::new().with("a", "1").with("b", "2");
        tags.extend(&TagSet::new().with("b", "3"));
        assert_eq!(tags.get("a"), Some("1"));
        assert_eq!(tags.get("b"), Some("3"));
        assert_eq!(tags.len(), 2);
    }
}
