//! Inventory client: drains provider listings
//!
//! Every pass classifies against a complete view of the account, so listings
//! are always drained to the last page before anything is decided.

use anyhow::{Result, bail};
use snapshot_tool_common::{ClusterRecord, SnapshotRecord};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::aws::rds::{ListSnapshotsRequest, Page, RdsOperations};
use crate::filter::Projection;

/// Paginated listing over one region
///
/// Automated backups are fetched at most once per inventory; the inventory
/// lives for a single pass.
pub struct Inventory<'a, R> {
    rds: &'a R,
    automated: OnceCell<Vec<SnapshotRecord>>,
}

impl<'a, R: RdsOperations> Inventory<'a, R> {
    pub fn new(rds: &'a R) -> Self {
        Self {
            rds,
            automated: OnceCell::new(),
        }
    }

    /// All DB clusters in the region
    pub async fn clusters(&self) -> Result<Vec<ClusterRecord>> {
        let clusters = drain(|marker| self.rds.describe_clusters(marker)).await?;
        debug!(count = clusters.len(), "Listed clusters");
        Ok(clusters)
    }

    /// All snapshots matching `request`
    pub async fn snapshots(&self, request: ListSnapshotsRequest) -> Result<Vec<SnapshotRecord>> {
        let snapshots =
            drain(|marker| self.rds.describe_snapshots(request.clone(), marker)).await?;
        debug!(count = snapshots.len(), scope = ?request.scope, "Listed snapshots");
        Ok(snapshots)
    }

    /// All automated backups in the region (fetched once)
    pub async fn automated_backups(&self) -> Result<&[SnapshotRecord]> {
        let backups = self
            .automated
            .get_or_try_init(|| self.snapshots(ListSnapshotsRequest::automated()))
            .await?;
        Ok(backups.as_slice())
    }

    /// Most recent automated backup of a cluster, by provider creation time
    pub async fn latest_automated_backup(&self, cluster_id: &str) -> Result<Option<SnapshotRecord>> {
        let latest = self
            .automated_backups()
            .await?
            .iter()
            .filter(|s| s.cluster_id == cluster_id)
            .max_by_key(|s| s.created_at)
            .cloned();
        Ok(latest)
    }

    /// Replace listing tags with a fresh tag lookup per snapshot
    ///
    /// Listings may carry stale or truncated tags. A failed lookup leaves the
    /// snapshot with no tags, which keeps it out of every tag-gated action
    /// for this pass.
    pub async fn hydrate_tags(&self, projection: &mut Projection) {
        for (identifier, snapshot) in projection.iter_mut() {
            match self.rds.list_tags(&snapshot.arn).await {
                Ok(tags) => snapshot.tags = tags,
                Err(e) => {
                    warn!(
                        snapshot = %identifier,
                        error = ?e,
                        "Failed to read tags, skipping snapshot this pass"
                    );
                    snapshot.tags = Default::default();
                }
            }
        }
    }
}

/// Follow markers until the provider reports the last page
async fn drain<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = fetch(marker.clone()).await?;
        items.extend(page.items);

        match page.marker {
            Some(next) if marker.as_deref() == Some(next.as_str()) => {
                bail!("Provider returned the same pagination marker twice: {next}");
            }
            Some(next) => marker = Some(next),
            None => return Ok(items),
        }
    }
}
