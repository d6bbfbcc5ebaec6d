//! Action executor
//!
//! Every action is a single provider mutation followed, where needed, by the
//! tag update that records it. Preconditions were already checked by the
//! lifecycle classifier against this pass's inventory; the executor only has
//! to make each call safe to repeat:
//!
//! - a copy whose target already exists counts as done (and still clears the
//!   source's pending flags)
//! - a delete of a snapshot that is already gone counts as done
//! - a share into an account that already has restore access only clears
//!   the pending flag

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use snapshot_tool_common::naming;
use snapshot_tool_common::tags::{
    self, TAG_CLUSTER_ID, TAG_REENCRYPT, TAG_SHARE_AND_COPY, TAG_SOURCE_SNAPSHOT, TagSet, flag,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::aws::{find_aws_error, ignore_not_found};
use crate::aws::rds::{CopySnapshotRequest, CreateSnapshotRequest, RdsOperations};
use crate::inventory::Inventory;

/// Precondition failures detected while executing an action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Cluster {cluster} has no automated backup to copy from")]
    NoAutomatedBackup { cluster: String },

    #[error("Latest automated backup of cluster {cluster} is {hours}h old, more than twice the backup interval")]
    StaleAutomatedBackup { cluster: String, hours: i64 },

    #[error("Automated backup {backup} of cluster {cluster} has no creation time")]
    UndatedAutomatedBackup { cluster: String, backup: String },

    #[error("Snapshot {identifier} is encrypted but no KMS key is configured for the copy")]
    MissingKmsKey { identifier: String },
}

/// Region an action runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Side {
    Source,
    Destination,
}

/// One state transition for one snapshot (or cluster)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, strum::IntoStaticStr)]
#[serde(tag = "action", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    /// Snapshot a live cluster
    CreateFromCluster {
        cluster_id: String,
        identifier: String,
    },
    /// Copy the cluster's latest automated backup into a manual snapshot
    CreateFromAutomated {
        cluster_id: String,
        identifier: String,
    },
    /// Grant the destination account restore access
    Share {
        identifier: String,
        arn: String,
        account_id: String,
    },
    /// Copy under the source key as `<identifier>-reencrypted`
    ReencryptCopy { identifier: String, arn: String },
    /// Copy a shared snapshot into the source region
    CopyLocal {
        identifier: String,
        source_arn: String,
        encrypted: bool,
    },
    /// Copy a source-region snapshot into the destination region
    CopyRemote {
        identifier: String,
        source_arn: String,
        encrypted: bool,
    },
    Delete { identifier: String, side: Side },
}

impl Action {
    /// Snapshot identifier the action produces or acts on
    pub fn identifier(&self) -> &str {
        match self {
            Action::CreateFromCluster { identifier, .. }
            | Action::CreateFromAutomated { identifier, .. }
            | Action::Share { identifier, .. }
            | Action::ReencryptCopy { identifier, .. }
            | Action::CopyLocal { identifier, .. }
            | Action::CopyRemote { identifier, .. }
            | Action::Delete { identifier, .. } => identifier,
        }
    }

    /// Short kebab-case name for logs and reports
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// How an action ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// The provider accepted the mutation
    Done,
    /// A previous (or concurrent) pass already did it
    AlreadyDone,
    /// Done, but the lineage needs another pass to finish
    FollowUp,
    /// Dry run; nothing was called
    DryRun,
}

/// Settings the executor needs from the pass configuration
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub source_region: String,
    pub cross_region: bool,
    pub mark_reencrypt: bool,
    /// Key for copies made in the source region
    pub source_key: Option<String>,
    /// Key for copies made in the destination region
    pub destination_key: Option<String>,
    pub interval: Duration,
    pub now: DateTime<Utc>,
    pub dry_run: bool,
}

/// Runs actions against the source and destination regions
pub struct ActionExecutor<'a, R> {
    source: &'a R,
    destination: &'a R,
    inventory: &'a Inventory<'a, R>,
    settings: ExecutorSettings,
}

impl<'a, R: RdsOperations> ActionExecutor<'a, R> {
    pub fn new(
        source: &'a R,
        destination: &'a R,
        inventory: &'a Inventory<'a, R>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            source,
            destination,
            inventory,
            settings,
        }
    }

    pub async fn execute(&self, action: &Action) -> Result<Outcome> {
        if self.settings.dry_run {
            info!(
                action = action.kind(),
                snapshot = %action.identifier(),
                "[DRY RUN] Would execute"
            );
            return Ok(Outcome::DryRun);
        }

        match action {
            Action::CreateFromCluster {
                cluster_id,
                identifier,
            } => self.create_from_cluster(cluster_id, identifier).await,
            Action::CreateFromAutomated {
                cluster_id,
                identifier,
            } => self.create_from_automated(cluster_id, identifier).await,
            Action::Share {
                identifier,
                arn,
                account_id,
            } => self.share(identifier, arn, account_id).await,
            Action::ReencryptCopy { identifier, arn } => self.reencrypt(identifier, arn).await,
            Action::CopyLocal {
                identifier,
                source_arn,
                encrypted,
            } => self.copy_local(identifier, source_arn, *encrypted).await,
            Action::CopyRemote {
                identifier,
                source_arn,
                encrypted,
            } => self.copy_remote(identifier, source_arn, *encrypted).await,
            Action::Delete { identifier, side } => self.delete(identifier, *side).await,
        }
    }

    fn created_on(&self) -> String {
        naming::format_timestamp(self.settings.now)
    }

    async fn create_from_cluster(&self, cluster_id: &str, identifier: &str) -> Result<Outcome> {
        let tags = tags::creation_tags(&self.created_on(), self.settings.mark_reencrypt)
            .with(TAG_CLUSTER_ID, cluster_id);

        let result = self
            .source
            .create_snapshot(CreateSnapshotRequest {
                cluster_id: cluster_id.to_string(),
                identifier: identifier.to_string(),
                tags,
            })
            .await;

        let outcome = already_exists_is_done(result)?;
        info!(cluster = %cluster_id, snapshot = %identifier, "Snapshot requested");
        Ok(outcome)
    }

    async fn create_from_automated(&self, cluster_id: &str, identifier: &str) -> Result<Outcome> {
        let backup = self
            .inventory
            .latest_automated_backup(cluster_id)
            .await?
            .ok_or_else(|| ActionError::NoAutomatedBackup {
                cluster: cluster_id.to_string(),
            })?;

        // Age unknown, so freshness cannot be shown
        let created_at = backup
            .created_at
            .ok_or_else(|| ActionError::UndatedAutomatedBackup {
                cluster: cluster_id.to_string(),
                backup: backup.identifier.clone(),
            })?;
        let age = self.settings.now - created_at;
        if age >= self.settings.interval * 2 {
            return Err(ActionError::StaleAutomatedBackup {
                cluster: cluster_id.to_string(),
                hours: age.num_hours(),
            }
            .into());
        }
        if age >= self.settings.interval {
            warn!(
                cluster = %cluster_id,
                backup = %backup.identifier,
                hours = age.num_hours(),
                "Latest automated backup is older than the backup interval"
            );
        }

        let tags = tags::creation_tags(&self.created_on(), self.settings.mark_reencrypt)
            .with(TAG_SOURCE_SNAPSHOT, &backup.identifier);
        let request = CopySnapshotRequest::new(&backup.arn, identifier).with_tags(tags);

        let outcome = already_exists_is_done(self.source.copy_snapshot(request).await)?;
        info!(
            cluster = %cluster_id,
            snapshot = %identifier,
            backup = %backup.identifier,
            "Snapshot copied from automated backup"
        );
        Ok(outcome)
    }

    async fn share(&self, identifier: &str, arn: &str, account_id: &str) -> Result<Outcome> {
        let accounts = self.source.restore_accounts(identifier).await?;

        let outcome = if accounts.iter().any(|a| a == account_id) {
            info!(snapshot = %identifier, account = %account_id, "Already shared");
            Outcome::AlreadyDone
        } else {
            self.source.share_snapshot(identifier, account_id).await?;
            info!(snapshot = %identifier, account = %account_id, "Shared");
            Outcome::Done
        };

        self.source
            .add_tags(arn, TagSet::new().with(TAG_SHARE_AND_COPY, flag::NO))
            .await
            .with_context(|| format!("Shared {identifier} but failed to clear its share flag"))?;
        Ok(outcome)
    }

    /// Copy under the source key, then hand the pending flags over to the copy
    async fn reencrypt(&self, identifier: &str, arn: &str) -> Result<Outcome> {
        let key = self.key_for(identifier, true, Side::Source)?;
        let target = naming::reencrypted_name(identifier);
        let request = CopySnapshotRequest::new(arn, &target)
            .with_kms_key(key)
            .with_tags(tags::creation_tags(&self.created_on(), false));

        let outcome = already_exists_is_done(self.source.copy_snapshot(request).await)?;
        info!(snapshot = %identifier, copy = %target, "Re-encrypted copy requested");

        let cleared = TagSet::new()
            .with(TAG_REENCRYPT, flag::NO)
            .with(TAG_SHARE_AND_COPY, flag::NO);
        self.source
            .add_tags(arn, cleared)
            .await
            .with_context(|| format!("Copied {identifier} but failed to clear its pending flags"))?;
        Ok(outcome)
    }

    async fn copy_local(&self, identifier: &str, source_arn: &str, encrypted: bool) -> Result<Outcome> {
        let key = self.key_for(identifier, encrypted, Side::Source)?;
        let request = CopySnapshotRequest::new(source_arn, identifier)
            .with_kms_key(key)
            .with_tags(tags::copy_marker());

        let outcome = already_exists_is_done(self.source.copy_snapshot(request).await)?;
        info!(snapshot = %identifier, encrypted, "Local copy requested");

        match outcome {
            Outcome::Done if self.settings.cross_region => Ok(Outcome::FollowUp),
            outcome => Ok(outcome),
        }
    }

    async fn copy_remote(&self, identifier: &str, source_arn: &str, encrypted: bool) -> Result<Outcome> {
        let key = self.key_for(identifier, encrypted, Side::Destination)?;
        let request = CopySnapshotRequest::new(source_arn, identifier)
            .with_source_region(&self.settings.source_region)
            .with_kms_key(key)
            .with_copy_tags(true)
            .with_tags(tags::copy_marker());

        let outcome = already_exists_is_done(self.destination.copy_snapshot(request).await)?;
        info!(snapshot = %identifier, encrypted, "Destination copy requested");
        Ok(outcome)
    }

    async fn delete(&self, identifier: &str, side: Side) -> Result<Outcome> {
        let rds = match side {
            Side::Source => self.source,
            Side::Destination => self.destination,
        };

        if ignore_not_found(rds.delete_snapshot(identifier).await)? {
            info!(snapshot = %identifier, %side, "Deleted");
            Ok(Outcome::Done)
        } else {
            info!(snapshot = %identifier, %side, "Already deleted");
            Ok(Outcome::AlreadyDone)
        }
    }

    /// KMS key for a copy made on `side`; only encrypted sources need one
    fn key_for(&self, identifier: &str, encrypted: bool, side: Side) -> Result<Option<String>> {
        if !encrypted {
            return Ok(None);
        }
        let key = match side {
            Side::Source => &self.settings.source_key,
            Side::Destination => &self.settings.destination_key,
        };
        match key {
            Some(key) => Ok(Some(key.clone())),
            None => Err(ActionError::MissingKmsKey {
                identifier: identifier.to_string(),
            }
            .into()),
        }
    }
}

fn already_exists_is_done(result: Result<()>) -> Result<Outcome> {
    match result {
        Ok(()) => Ok(Outcome::Done),
        Err(e) if find_aws_error(&e).is_some_and(|e| e.is_already_exists()) => {
            Ok(Outcome::AlreadyDone)
        }
        Err(e) => Err(e),
    }
}
