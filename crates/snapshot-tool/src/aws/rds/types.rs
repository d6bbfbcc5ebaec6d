//! RDS request and response types

use snapshot_tool_common::{SnapshotOrigin, TagSet};

/// One page of a marker-paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Marker for the next page; `None` on the last page
    pub marker: Option<String>,
}

impl<T> Page<T> {
    /// A final page
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            marker: None,
        }
    }
}

/// Which snapshots a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope {
    /// Snapshots owned by this account
    Own,
    /// Own snapshots plus snapshots other accounts shared with this one
    IncludeShared,
}

/// Cluster snapshot listing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshotsRequest {
    pub scope: SnapshotScope,
    /// Restrict to one origin (`manual`, `automated`, `shared`)
    pub snapshot_type: Option<SnapshotOrigin>,
}

impl ListSnapshotsRequest {
    /// Manual snapshots owned by this account
    pub fn own_manual() -> Self {
        Self {
            scope: SnapshotScope::Own,
            snapshot_type: Some(SnapshotOrigin::Manual),
        }
    }

    /// Automated backups owned by this account
    pub fn automated() -> Self {
        Self {
            scope: SnapshotScope::Own,
            snapshot_type: Some(SnapshotOrigin::Automated),
        }
    }

    /// Snapshots shared with this account by others
    pub fn shared() -> Self {
        Self {
            scope: SnapshotScope::IncludeShared,
            snapshot_type: Some(SnapshotOrigin::Shared),
        }
    }
}

/// Parameters for taking a snapshot of a live cluster
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSnapshotRequest {
    pub cluster_id: String,
    pub identifier: String,
    pub tags: TagSet,
}

/// Parameters for copying a cluster snapshot
///
/// The copy is issued in the region of the client that receives the request.
#[derive(Debug, Clone, PartialEq)]
pub struct CopySnapshotRequest {
    /// Source snapshot identifier, or ARN when the source lives in another
    /// region or account
    pub source: String,
    pub target_identifier: String,
    /// Region the source lives in, when it differs from the client's region
    pub source_region: Option<String>,
    /// Key to (re-)encrypt the copy with
    pub kms_key_id: Option<String>,
    /// Carry the source snapshot's tags onto the copy
    pub copy_tags: bool,
    /// Extra tags for the copy
    pub tags: TagSet,
}

impl CopySnapshotRequest {
    pub fn new(source: impl Into<String>, target_identifier: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target_identifier: target_identifier.into(),
            source_region: None,
            kms_key_id: None,
            copy_tags: false,
            tags: TagSet::new(),
        }
    }

    pub fn with_source_region(mut self, region: impl Into<String>) -> Self {
        self.source_region = Some(region.into());
        self
    }

    pub fn with_kms_key(mut self, key_id: Option<String>) -> Self {
        self.kms_key_id = key_id;
        self
    }

    pub fn with_copy_tags(mut self, copy_tags: bool) -> Self {
        self.copy_tags = copy_tags;
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }
}
