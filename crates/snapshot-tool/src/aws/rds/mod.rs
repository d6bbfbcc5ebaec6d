//! RDS cluster snapshot management
//!
//! Thin wrapper over the RDS API: every call converts SDK shapes into the
//! provider-neutral records from `snapshot_tool_common` and classifies
//! failures into [`AwsError`]. No call retries; the next scheduled pass is
//! the retry.

mod operations;
mod presign;
mod types;

pub use operations::RdsOperations;
pub use types::{CopySnapshotRequest, CreateSnapshotRequest, ListSnapshotsRequest, Page, SnapshotScope};

#[cfg(test)]
pub use operations::MockRdsOperations;

use std::time::SystemTime;

use anyhow::{Context, Result};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_rds::Client;
use aws_sdk_rds::types::{DbCluster, DbClusterSnapshot, Tag};
use chrono::DateTime;
use snapshot_tool_common::defaults::RESTORE_ATTRIBUTE;
use snapshot_tool_common::{ClusterRecord, SnapshotOrigin, SnapshotRecord, SnapshotStatus, TagSet};
use tracing::debug;

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::AwsError;

/// RDS client bound to one region
pub struct RdsClient {
    pub(crate) client: Client,
    region: String,
    /// Signs the source-region request of cross-region copies
    credentials: Option<SharedCredentialsProvider>,
}

impl FromAwsContext for RdsClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.rds_client(),
            region: ctx.region().to_string(),
            credentials: ctx.credentials_provider(),
        }
    }
}

impl RdsClient {
    /// Create a new RDS client (loads AWS config from environment)
    pub async fn new(region: &str) -> Result<Self> {
        let ctx = AwsContext::new(region).await;
        Ok(Self::from_context(&ctx))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Describe one page of DB clusters
    pub async fn describe_clusters(&self, marker: Option<String>) -> Result<Page<ClusterRecord>> {
        let response = self
            .client
            .describe_db_clusters()
            .set_marker(marker)
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .context("Failed to describe DB clusters")?;

        let items = response
            .db_clusters()
            .iter()
            .filter_map(cluster_record)
            .collect();

        Ok(Page {
            items,
            marker: response.marker().map(str::to_string),
        })
    }

    /// Describe one page of cluster snapshots
    pub async fn describe_snapshots(
        &self,
        request: ListSnapshotsRequest,
        marker: Option<String>,
    ) -> Result<Page<SnapshotRecord>> {
        let response = self
            .client
            .describe_db_cluster_snapshots()
            .set_snapshot_type(request.snapshot_type.map(|t| t.to_string()))
            .include_shared(request.scope == SnapshotScope::IncludeShared)
            .set_marker(marker)
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .context("Failed to describe DB cluster snapshots")?;

        let items = response
            .db_cluster_snapshots()
            .iter()
            .filter_map(snapshot_record)
            .collect();

        Ok(Page {
            items,
            marker: response.marker().map(str::to_string),
        })
    }

    /// Take a manual snapshot of a live cluster
    pub async fn create_snapshot(&self, request: CreateSnapshotRequest) -> Result<()> {
        self.client
            .create_db_cluster_snapshot()
            .db_cluster_identifier(&request.cluster_id)
            .db_cluster_snapshot_identifier(&request.identifier)
            .set_tags(Some(to_sdk_tags(&request.tags)))
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .with_context(|| format!("Failed to create snapshot '{}'", request.identifier))?;

        debug!(
            cluster_id = %request.cluster_id,
            snapshot = %request.identifier,
            region = %self.region,
            "Create snapshot requested"
        );
        Ok(())
    }

    /// Copy a cluster snapshot into this client's region
    ///
    /// Cross-region copies pass the source as an ARN and carry a request
    /// presigned for the source region, which RDS requires for encrypted
    /// snapshots.
    pub async fn copy_snapshot(&self, request: CopySnapshotRequest) -> Result<()> {
        let pre_signed_url = match presign::presign_region(&request, &self.region) {
            Some(source_region) => Some(self.presign_copy(&request, source_region).await?),
            None => None,
        };

        self.client
            .copy_db_cluster_snapshot()
            .source_db_cluster_snapshot_identifier(&request.source)
            .target_db_cluster_snapshot_identifier(&request.target_identifier)
            .set_kms_key_id(request.kms_key_id.clone())
            .copy_tags(request.copy_tags)
            .set_tags(Some(to_sdk_tags(&request.tags)))
            .set_pre_signed_url(pre_signed_url)
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .with_context(|| {
                format!(
                    "Failed to copy snapshot '{}' to '{}'",
                    request.source, request.target_identifier
                )
            })?;

        debug!(
            source = %request.source,
            source_region = ?request.source_region,
            target = %request.target_identifier,
            region = %self.region,
            "Copy snapshot requested"
        );
        Ok(())
    }

    async fn presign_copy(&self, request: &CopySnapshotRequest, source_region: &str) -> Result<String> {
        let provider = self
            .credentials
            .as_ref()
            .with_context(|| format!("No credentials to presign the copy of '{}'", request.source))?;
        let credentials = provider
            .provide_credentials()
            .await
            .context("Failed to load credentials for presigning")?;
        presign::presigned_copy_url(request, source_region, &self.region, credentials, SystemTime::now())
    }

    /// Accounts currently allowed to restore the snapshot
    pub async fn restore_accounts(&self, identifier: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .describe_db_cluster_snapshot_attributes()
            .db_cluster_snapshot_identifier(identifier)
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .with_context(|| format!("Failed to describe attributes of snapshot '{identifier}'"))?;

        let accounts = response
            .db_cluster_snapshot_attributes_result()
            .map(|result| {
                result
                    .db_cluster_snapshot_attributes()
                    .iter()
                    .filter(|attr| attr.attribute_name() == Some(RESTORE_ATTRIBUTE))
                    .flat_map(|attr| attr.attribute_values().iter().cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok(accounts)
    }

    /// Grant `account_id` permission to restore the snapshot
    pub async fn share_snapshot(&self, identifier: &str, account_id: &str) -> Result<()> {
        self.client
            .modify_db_cluster_snapshot_attribute()
            .db_cluster_snapshot_identifier(identifier)
            .attribute_name(RESTORE_ATTRIBUTE)
            .values_to_add(account_id)
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .with_context(|| format!("Failed to share snapshot '{identifier}' with {account_id}"))?;
        Ok(())
    }

    pub async fn list_tags(&self, arn: &str) -> Result<TagSet> {
        let response = self
            .client
            .list_tags_for_resource()
            .resource_name(arn)
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .with_context(|| format!("Failed to list tags for '{arn}'"))?;

        Ok(extract_tags(response.tag_list()))
    }

    pub async fn add_tags(&self, arn: &str, tags: TagSet) -> Result<()> {
        self.client
            .add_tags_to_resource()
            .resource_name(arn)
            .set_tags(Some(to_sdk_tags(&tags)))
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .with_context(|| format!("Failed to tag '{arn}'"))?;
        Ok(())
    }

    pub async fn delete_snapshot(&self, identifier: &str) -> Result<()> {
        self.client
            .delete_db_cluster_snapshot()
            .db_cluster_snapshot_identifier(identifier)
            .send()
            .await
            .map_err(AwsError::from_sdk)
            .with_context(|| format!("Failed to delete snapshot '{identifier}'"))?;
        Ok(())
    }
}

fn extract_tags(tags: &[Tag]) -> TagSet {
    tags.iter()
        .filter_map(|t| Some((t.key()?, t.value().unwrap_or_default())))
        .collect()
}

fn to_sdk_tags(tags: &TagSet) -> Vec<Tag> {
    tags.iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect()
}

fn cluster_record(cluster: &DbCluster) -> Option<ClusterRecord> {
    Some(ClusterRecord {
        identifier: cluster.db_cluster_identifier()?.to_string(),
        engine: cluster.engine().unwrap_or_default().to_string(),
        status: cluster.status().unwrap_or_default().to_string(),
    })
}

fn snapshot_record(snapshot: &DbClusterSnapshot) -> Option<SnapshotRecord> {
    let identifier = snapshot.db_cluster_snapshot_identifier()?.to_string();
    let kms_key_id = snapshot.kms_key_id().map(str::to_string);
    // A key is only attached to encrypted snapshots; use it when the flag is absent.
    let encrypted =
        Option::<bool>::from(snapshot.storage_encrypted()).unwrap_or(kms_key_id.is_some());
    Some(SnapshotRecord {
        identifier,
        arn: snapshot
            .db_cluster_snapshot_arn()
            .unwrap_or_default()
            .to_string(),
        cluster_id: snapshot
            .db_cluster_identifier()
            .unwrap_or_default()
            .to_string(),
        engine: snapshot.engine().unwrap_or_default().to_string(),
        origin: SnapshotOrigin::parse(snapshot.snapshot_type().unwrap_or_default()),
        status: SnapshotStatus::parse(snapshot.status().unwrap_or_default()),
        encrypted,
        kms_key_id,
        created_at: snapshot
            .snapshot_create_time()
            .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())),
        tags: extract_tags(snapshot.tag_list()),
    })
}
