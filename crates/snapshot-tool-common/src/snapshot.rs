//! Provider-neutral snapshot and cluster records
//!
//! The AWS layer converts SDK shapes into these records once, at the
//! boundary; everything downstream (filtering, classification, reporting)
//! works on them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tags::TagSet;

/// How a snapshot came to exist, as reported by the provider
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    /// Taken or copied explicitly in this account
    Manual,
    /// Taken by the cluster's backup window
    Automated,
    /// Owned by another account and shared with this one
    Shared,
    /// Public snapshot
    Public,
    /// Managed by AWS Backup
    #[strum(serialize = "awsbackup")]
    AwsBackup,
    #[strum(disabled)]
    Unknown,
}

impl SnapshotOrigin {
    /// Parse a provider value, falling back to `Unknown`
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }
}

/// Snapshot lifecycle status as reported by the provider
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Creating,
    Copying,
    Available,
    Deleting,
    Failed,
    #[strum(disabled)]
    Unknown,
}

impl SnapshotStatus {
    /// Parse a provider value, falling back to `Unknown`
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }

    /// Only available snapshots can be shared, copied or re-encrypted
    pub fn is_available(self) -> bool {
        self == Self::Available
    }
}

/// A cluster snapshot as listed by the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRecord {
    pub identifier: String,
    pub arn: String,
    pub cluster_id: String,
    pub engine: String,
    pub origin: SnapshotOrigin,
    pub status: SnapshotStatus,
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: TagSet,
}

impl SnapshotRecord {
    /// New available, unencrypted manual snapshot with no tags
    pub fn new(
        identifier: impl Into<String>,
        arn: impl Into<String>,
        cluster_id: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            arn: arn.into(),
            cluster_id: cluster_id.into(),
            engine: engine.into(),
            origin: SnapshotOrigin::Manual,
            status: SnapshotStatus::Available,
            encrypted: false,
            kms_key_id: None,
            created_at: None,
            tags: TagSet::new(),
        }
    }

    pub fn with_origin(mut self, origin: SnapshotOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_status(mut self, status: SnapshotStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_kms_key(mut self, key_id: impl Into<String>) -> Self {
        self.encrypted = true;
        self.kms_key_id = Some(key_id.into());
        self
    }

    pub fn with_created_at(mut self, time: DateTime<Utc>) -> Self {
        self.created_at = Some(time);
        self
    }
}

/// A database cluster as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterRecord {
    pub identifier: String,
    pub engine: String,
    pub status: String,
}

impl ClusterRecord {
    pub fn new(identifier: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            engine: engine.into(),
            status: "available".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_parse() {
        assert_eq!(SnapshotOrigin::parse("manual"), SnapshotOrigin::Manual);
        assert_eq!(SnapshotOrigin::parse("Automated"), SnapshotOrigin::Automated);
        assert_eq!(SnapshotOrigin::parse("shared"), SnapshotOrigin::Shared);
        assert_eq!(SnapshotOrigin::parse("awsbackup"), SnapshotOrigin::AwsBackup);
        assert_eq!(SnapshotOrigin::parse("bogus"), SnapshotOrigin::Unknown);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(SnapshotStatus::parse("available"), SnapshotStatus::Available);
        assert_eq!(SnapshotStatus::parse("AVAILABLE"), SnapshotStatus::Available);
        assert_eq!(SnapshotStatus::parse("creating"), SnapshotStatus::Creating);
        assert_eq!(SnapshotStatus::parse("migrating"), SnapshotStatus::Unknown);
        assert!(!SnapshotStatus::Unknown.is_available());
    }

    #[test]
    fn test_display_matches_provider_values() {
        assert_eq!(SnapshotOrigin::Manual.to_string(), "manual");
        assert_eq!(SnapshotStatus::Available.as_ref(), "available");
    }

    #[test]
    fn test_record_builder() {
        let record = SnapshotRecord::new("s", "arn", "c", "aurora-mysql")
            .with_status(SnapshotStatus::Creating)
            .with_kms_key("key");
        assert!(record.encrypted);
        assert_eq!(record.kms_key_id.as_deref(), Some("key"));
        assert_eq!(record.origin, SnapshotOrigin::Manual);
    }
}
