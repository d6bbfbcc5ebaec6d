//! Snapshot selection and projections
//!
//! Inventory listings are narrowed in two steps: a selector (regex or the
//! match-all sentinels) plus the engine allow-list picks the snapshots a pass
//! may touch, then tag projections pick the ones with pending work.
//! Projections are keyed by snapshot identifier and ordered, so passes act on
//! candidates deterministically.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use snapshot_tool_common::defaults::{ALL_CLUSTERS, ALL_SNAPSHOTS};
use snapshot_tool_common::naming::identifier_from_arn;
use snapshot_tool_common::{ClusterRecord, SnapshotOrigin, SnapshotRecord, SnapshotStatus, TagSet};
use tracing::warn;

/// Name pattern for clusters or snapshots
#[derive(Debug, Clone)]
pub enum Selector {
    /// One of the match-all sentinels
    All,
    /// Unanchored regex search
    Pattern(Regex),
}

impl Selector {
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        match pattern.trim() {
            ALL_CLUSTERS | ALL_SNAPSHOTS => Ok(Self::All),
            pattern => Ok(Self::Pattern(Regex::new(pattern)?)),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::All => true,
            Self::Pattern(regex) => regex.is_match(value),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("<all>"),
            Self::Pattern(regex) => f.write_str(regex.as_str()),
        }
    }
}

/// What the selector is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorTarget {
    ClusterId,
    SnapshotId,
}

/// The parts of a snapshot record the lifecycle logic reads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedSnapshot {
    pub arn: String,
    pub cluster_id: String,
    pub status: SnapshotStatus,
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    pub tags: TagSet,
}

impl From<&SnapshotRecord> for ProjectedSnapshot {
    fn from(record: &SnapshotRecord) -> Self {
        Self {
            arn: record.arn.clone(),
            cluster_id: record.cluster_id.clone(),
            status: record.status,
            encrypted: record.encrypted,
            kms_key_id: record.kms_key_id.clone(),
            tags: record.tags.clone(),
        }
    }
}

/// Snapshots keyed by identifier
pub type Projection = BTreeMap<String, ProjectedSnapshot>;

/// Selector plus engine allow-list
pub struct FilterEngine<'a> {
    selector: &'a Selector,
    target: SelectorTarget,
    engines: &'a [String],
}

impl<'a> FilterEngine<'a> {
    pub fn new(selector: &'a Selector, target: SelectorTarget, engines: &'a [String]) -> Self {
        Self {
            selector,
            target,
            engines,
        }
    }

    fn engine_allowed(&self, engine: &str) -> bool {
        self.engines.iter().any(|e| e == engine)
    }

    fn accepts(&self, identifier: &str, record: &SnapshotRecord) -> bool {
        let subject = match self.target {
            SelectorTarget::ClusterId => record.cluster_id.as_str(),
            SelectorTarget::SnapshotId => identifier,
        };
        self.engine_allowed(&record.engine) && self.selector.matches(subject)
    }

    /// Clusters with a supported engine whose identifier matches
    pub fn clusters<'c>(&self, clusters: &'c [ClusterRecord]) -> Vec<&'c ClusterRecord> {
        clusters
            .iter()
            .filter(|c| self.engine_allowed(&c.engine) && self.selector.matches(&c.identifier))
            .collect()
    }

    /// Manual snapshots owned by this account
    pub fn own(&self, snapshots: &[SnapshotRecord]) -> Projection {
        snapshots
            .iter()
            .filter(|s| s.origin == SnapshotOrigin::Manual)
            .filter(|s| self.accepts(&s.identifier, s))
            .map(|s| (s.identifier.clone(), ProjectedSnapshot::from(s)))
            .collect()
    }

    /// Snapshots shared with this account, keyed by the identifier in their ARN
    pub fn shared(&self, snapshots: &[SnapshotRecord]) -> Projection {
        let mut projection = Projection::new();
        for snapshot in snapshots
            .iter()
            .filter(|s| s.origin == SnapshotOrigin::Shared)
        {
            let Some(identifier) = identifier_from_arn(&snapshot.arn) else {
                warn!(arn = %snapshot.arn, "Shared snapshot ARN has no identifier, skipping");
                continue;
            };
            if !self.accepts(identifier, snapshot) {
                continue;
            }
            if let Some(previous) =
                projection.insert(identifier.to_string(), ProjectedSnapshot::from(snapshot))
            {
                warn!(
                    snapshot = %identifier,
                    kept = %snapshot.arn,
                    dropped = %previous.arn,
                    "Two shared snapshots have the same identifier"
                );
            }
        }
        projection
    }
}

fn retain_by(projection: &Projection, keep: impl Fn(&ProjectedSnapshot) -> bool) -> Projection {
    projection
        .iter()
        .filter(|(_, s)| keep(s))
        .map(|(k, s)| (k.clone(), s.clone()))
        .collect()
}

/// Tool-created snapshots still flagged for sharing
pub fn share_pending(projection: &Projection) -> Projection {
    retain_by(projection, |s| s.tags.share_pending())
}

/// Tool-created snapshots still flagged for re-encryption
pub fn reencrypt_pending(projection: &Projection) -> Projection {
    retain_by(projection, |s| s.tags.reencrypt_pending())
}

/// Snapshots carrying the `CreatedBy` marker
pub fn created_by_tool(projection: &Projection) -> Projection {
    retain_by(projection, |s| s.tags.is_created_by_tool())
}

/// Snapshots carrying the `CopiedBy` marker
pub fn copied_by_tool(projection: &Projection) -> Projection {
    retain_by(projection, |s| s.tags.is_copied_by_tool())
}
