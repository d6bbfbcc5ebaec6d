//! RDS operations trait for testing

use super::RdsClient;
use super::types::{CopySnapshotRequest, CreateSnapshotRequest, ListSnapshotsRequest, Page};
use anyhow::Result;
use snapshot_tool_common::{ClusterRecord, SnapshotRecord, TagSet};

/// Trait for RDS operations that can be mocked in tests.
///
/// This is the whole provider surface the tool needs. Listings are exposed a
/// page at a time so callers decide how pagination is drained.
///
/// Note: Some parameters use `Option<String>` instead of `Option<&str>` to work
/// around mockall lifetime limitations.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait RdsOperations: Send + Sync {
    /// Describe one page of DB clusters
    async fn describe_clusters(&self, marker: Option<String>) -> Result<Page<ClusterRecord>>;

    /// Describe one page of cluster snapshots
    async fn describe_snapshots(
        &self,
        request: ListSnapshotsRequest,
        marker: Option<String>,
    ) -> Result<Page<SnapshotRecord>>;

    /// Take a manual snapshot of a live cluster
    async fn create_snapshot(&self, request: CreateSnapshotRequest) -> Result<()>;

    /// Copy a snapshot into this client's region
    async fn copy_snapshot(&self, request: CopySnapshotRequest) -> Result<()>;

    /// Accounts allowed to restore the snapshot
    async fn restore_accounts(&self, identifier: &str) -> Result<Vec<String>>;

    /// Allow an account to restore the snapshot
    async fn share_snapshot(&self, identifier: &str, account_id: &str) -> Result<()>;

    /// Current tags of a resource
    async fn list_tags(&self, arn: &str) -> Result<TagSet>;

    /// Add or overwrite tags on a resource
    async fn add_tags(&self, arn: &str, tags: TagSet) -> Result<()>;

    /// Delete a snapshot
    async fn delete_snapshot(&self, identifier: &str) -> Result<()>;
}

impl RdsOperations for RdsClient {
    async fn describe_clusters(&self, marker: Option<String>) -> Result<Page<ClusterRecord>> {
        RdsClient::describe_clusters(self, marker).await
    }

    async fn describe_snapshots(
        &self,
        request: ListSnapshotsRequest,
        marker: Option<String>,
    ) -> Result<Page<SnapshotRecord>> {
        RdsClient::describe_snapshots(self, request, marker).await
    }

    async fn create_snapshot(&self, request: CreateSnapshotRequest) -> Result<()> {
        RdsClient::create_snapshot(self, request).await
    }

    async fn copy_snapshot(&self, request: CopySnapshotRequest) -> Result<()> {
        RdsClient::copy_snapshot(self, request).await
    }

    async fn restore_accounts(&self, identifier: &str) -> Result<Vec<String>> {
        RdsClient::restore_accounts(self, identifier).await
    }

    async fn share_snapshot(&self, identifier: &str, account_id: &str) -> Result<()> {
        RdsClient::share_snapshot(self, identifier, account_id).await
    }

    async fn list_tags(&self, arn: &str) -> Result<TagSet> {
        RdsClient::list_tags(self, arn).await
    }

    async fn add_tags(&self, arn: &str, tags: TagSet) -> Result<()> {
        RdsClient::add_tags(self, arn, tags).await
    }

    async fn delete_snapshot(&self, identifier: &str) -> Result<()> {
        RdsClient::delete_snapshot(self, identifier).await
    }
}
