//! Lifecycle classification
//!
//! Pure decisions over projections: whether a cluster is due for a backup,
//! whether a snapshot should be shared, re-encrypted, copied or expired.
//! Nothing here touches the provider; `now` is always passed in.
//!
//! Ages come from the timestamp encoded in the snapshot identifier, never
//! from provider metadata. A snapshot whose identifier does not decode is
//! never copied by age and never expired.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use snapshot_tool_common::naming::{self, is_reencrypted_name};

use crate::filter::{ProjectedSnapshot, Projection};

/// Retention and backup cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub retention: Duration,
    pub interval: Duration,
}

impl Schedule {
    pub fn new(retention_days: u32, interval_hours: u32) -> Self {
        Self {
            retention: Duration::days(i64::from(retention_days)),
            interval: Duration::hours(i64::from(interval_hours)),
        }
    }
}

/// Age of a snapshot according to its identifier
pub fn age(identifier: &str, cluster_id: &str, now: DateTime<Utc>) -> Option<Duration> {
    naming::decode(identifier, cluster_id).map(|created| now - created)
}

/// Newest backup hour among own snapshots of `cluster_id`
pub fn latest_backup_hour(cluster_id: &str, own: &Projection) -> Option<DateTime<Utc>> {
    own.iter()
        .filter(|(_, s)| s.cluster_id == cluster_id)
        .filter_map(|(identifier, _)| naming::decode_hour(identifier, cluster_id))
        .max()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum BackupDecision {
    /// No own snapshot within the interval
    Due { last: Option<DateTime<Utc>> },
    /// A recent enough snapshot exists
    Fresh { last: DateTime<Utc> },
}

/// A backup is due unless an own snapshot's hour is newer than `now - interval`
pub fn needs_backup(
    cluster_id: &str,
    own: &Projection,
    interval: Duration,
    now: DateTime<Utc>,
) -> BackupDecision {
    match latest_backup_hour(cluster_id, own) {
        Some(last) if now - last < interval => BackupDecision::Fresh { last },
        last => BackupDecision::Due { last },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum ShareDecision {
    /// Grant restore access to the destination account
    Share,
    /// Key differs from the backup key; re-encrypt and share the copy instead
    ReencryptFirst,
    /// Flagged, but not available yet
    NotReady,
    /// Not flagged for sharing
    NotPending,
}

/// Decide the share action for one own snapshot
///
/// `backup_key` is the resolved ARN of the key snapshots must be encrypted
/// with before they leave the account, when that check is enabled.
pub fn needs_share(
    identifier: &str,
    snapshot: &ProjectedSnapshot,
    backup_key: Option<&str>,
) -> ShareDecision {
    if !snapshot.tags.share_pending() {
        return ShareDecision::NotPending;
    }
    if !snapshot.status.is_available() {
        return ShareDecision::NotReady;
    }
    match backup_key {
        Some(key)
            if snapshot.encrypted
                && snapshot.kms_key_id.as_deref() != Some(key)
                && !is_reencrypted_name(identifier) =>
        {
            ShareDecision::ReencryptFirst
        }
        _ => ShareDecision::Share,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum ReencryptDecision {
    Copy,
    NotReady,
    NotPending,
    /// Past retention; expiry will remove it
    Expired,
    /// Identifier does not decode
    Undated,
}

/// Decide whether a flagged snapshot gets re-encrypted now
pub fn needs_reencrypt(
    identifier: &str,
    snapshot: &ProjectedSnapshot,
    retention: Duration,
    now: DateTime<Utc>,
) -> ReencryptDecision {
    if !snapshot.tags.reencrypt_pending() {
        return ReencryptDecision::NotPending;
    }
    match age(identifier, &snapshot.cluster_id, now) {
        None => ReencryptDecision::Undated,
        Some(age) if age >= retention => ReencryptDecision::Expired,
        Some(_) if !snapshot.status.is_available() => ReencryptDecision::NotReady,
        Some(_) => ReencryptDecision::Copy,
    }
}

/// Where a shared snapshot is in its copy lineage
///
/// A shared snapshot moves through: copied into the source region, the local
/// copy copied on to the destination region, then the local copy deleted.
/// Each pass performs at most one step per snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "kebab-case")]
pub enum CopyStage {
    /// Copy the shared snapshot into the source region
    CopyLocal,
    /// Copy the local copy on to the destination region
    CopyRemote,
    /// Local copy exists but is not available yet
    AwaitLocal,
    /// Destination copy is available; remove the intermediate local copy
    DeleteLocal,
    /// Destination copy exists but is not available yet
    AwaitRemote,
    /// Nothing left to do
    Complete,
    /// Shared snapshot is past retention
    TooOld,
    /// Identifier does not decode
    Undated,
}

/// Classify a snapshot shared with this account
///
/// `local` and `remote` are the same-named snapshots in the source and
/// destination regions. With no cross-region step, the lineage ends once
/// the local copy exists.
pub fn classify_copy(
    identifier: &str,
    shared: &ProjectedSnapshot,
    local: Option<&ProjectedSnapshot>,
    remote: Option<&ProjectedSnapshot>,
    cross_region: bool,
    retention: Duration,
    now: DateTime<Utc>,
) -> CopyStage {
    match (local, remote) {
        (None, None) => match age(identifier, &shared.cluster_id, now) {
            None => CopyStage::Undated,
            Some(age) if age < retention => CopyStage::CopyLocal,
            Some(_) => CopyStage::TooOld,
        },
        (Some(local), None) => classify_remote_copy(local, None, cross_region),
        (Some(_), Some(remote)) if cross_region => {
            if remote.status.is_available() {
                CopyStage::DeleteLocal
            } else {
                CopyStage::AwaitRemote
            }
        }
        _ => CopyStage::Complete,
    }
}

/// Classify an own snapshot that should end up in the destination region
pub fn classify_remote_copy(
    local: &ProjectedSnapshot,
    remote: Option<&ProjectedSnapshot>,
    cross_region: bool,
) -> CopyStage {
    match remote {
        _ if !cross_region => CopyStage::Complete,
        Some(remote) if remote.status.is_available() => CopyStage::Complete,
        Some(_) => CopyStage::AwaitRemote,
        None if local.status.is_available() => CopyStage::CopyRemote,
        None => CopyStage::AwaitLocal,
    }
}

/// Marker tag a snapshot must carry to be expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "PascalCase")]
pub enum ExpiryMarker {
    /// Snapshots taken by the tool in the source account
    CreatedBy,
    /// Copies the tool made in the destination
    CopiedBy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum ExpiryDecision {
    Delete,
    Retain,
    Undated,
    /// Missing the marker tag; never deleted
    Unmanaged,
}

/// Expire strictly past retention; the boundary itself is retained
pub fn needs_expiry(
    identifier: &str,
    snapshot: &ProjectedSnapshot,
    marker: ExpiryMarker,
    retention: Duration,
    now: DateTime<Utc>,
) -> ExpiryDecision {
    let Some(age) = age(identifier, &snapshot.cluster_id, now) else {
        return ExpiryDecision::Undated;
    };
    if age <= retention {
        return ExpiryDecision::Retain;
    }
    let managed = match marker {
        ExpiryMarker::CreatedBy => snapshot.tags.is_created_by_tool(),
        ExpiryMarker::CopiedBy => snapshot.tags.is_copied_by_tool(),
    };
    if managed {
        ExpiryDecision::Delete
    } else {
        ExpiryDecision::Unmanaged
    }
}
