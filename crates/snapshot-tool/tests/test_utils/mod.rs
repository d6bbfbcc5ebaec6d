//! Shared test utilities for integration tests
//!
//! `FakeCloud` is an in-memory RDS provider spanning several regions of one
//! account. Each `FakeRds` handle is scoped to one region, like a real client,
//! and copies resolve their source by ARN across every region, which is how
//! shared and cross-region copies find their source. Every call yields to the
//! runtime first, so concurrent passes interleave the way real network calls
//! would.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use snapshot_tool::aws::AwsError;
use snapshot_tool::aws::rds::{
    CopySnapshotRequest, CreateSnapshotRequest, ListSnapshotsRequest, Page, RdsOperations,
    SnapshotScope,
};
use snapshot_tool::reconcile::{PassReport, Reconciler};
use snapshot_tool::config::{
    CreationConfig, KmsConfig, Mode, RegionConfig, RuntimeFlags, ScheduleConfig,
    SelectionConfig, SharingConfig, ToolConfig,
};
use snapshot_tool_common::defaults::{
    DEFAULT_BACKUP_INTERVAL_HOURS, DEFAULT_RETENTION_DAYS, default_engines,
};
use snapshot_tool_common::{
    ClusterRecord, SnapshotOrigin, SnapshotRecord, SnapshotStatus, TagSet,
};

pub use snapshot_tool_test_utils::fixtures::{
    DEST_ACCOUNT, DEST_REGION, SOURCE_ACCOUNT, SOURCE_REGION, days_ago, fixed_now, hours_ago,
    snapshot_arn, snapshot_name_at,
};

/// Account that shares snapshots into the tool's account in copy-shared tests
pub const SHARING_ACCOUNT: &str = "999988887777";

pub const ENGINE: &str = "aurora-postgresql";

/// One recorded mutating call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub region: String,
    pub op: &'static str,
    pub identifier: String,
}

#[derive(Default)]
struct RegionState {
    clusters: Vec<ClusterRecord>,
    /// Keyed by ARN so a shared snapshot and its local copy can coexist
    snapshots: BTreeMap<String, SnapshotRecord>,
    restore: HashMap<String, Vec<String>>,
}

struct CloudState {
    account: String,
    regions: HashMap<String, RegionState>,
    calls: Vec<Call>,
    fail_on: HashSet<String>,
    page_size: usize,
    new_status: SnapshotStatus,
}

/// In-memory provider shared by every region handle
#[derive(Clone)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CloudState {
                account: SOURCE_ACCOUNT.to_string(),
                regions: HashMap::new(),
                calls: Vec::new(),
                fail_on: HashSet::new(),
                page_size: 2,
                new_status: SnapshotStatus::Available,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap()
    }

    /// Client handle for one region
    pub fn region(&self, region: &str) -> FakeRds {
        FakeRds {
            region: region.to_string(),
            cloud: self.clone(),
        }
    }

    pub fn add_cluster(&self, region: &str, cluster_id: &str) {
        let mut state = self.lock();
        state
            .regions
            .entry(region.to_string())
            .or_default()
            .clusters
            .push(ClusterRecord::new(cluster_id, ENGINE));
    }

    /// Own manual snapshot with the given tags
    pub fn add_snapshot(&self, region: &str, identifier: &str, cluster_id: &str, tags: TagSet) {
        let record = SnapshotRecord::new(
            identifier,
            snapshot_arn(region, SOURCE_ACCOUNT, identifier),
            cluster_id,
            ENGINE,
        )
        .with_tags(tags);
        self.insert(region, record);
    }

    /// Snapshot another account shared with the tool's account
    pub fn add_shared_snapshot(&self, region: &str, identifier: &str, cluster_id: &str) {
        let record = SnapshotRecord::new(
            identifier,
            snapshot_arn(region, SHARING_ACCOUNT, identifier),
            cluster_id,
            ENGINE,
        )
        .with_origin(SnapshotOrigin::Shared);
        self.insert(region, record);
    }

    pub fn insert(&self, region: &str, record: SnapshotRecord) {
        let mut state = self.lock();
        state
            .regions
            .entry(region.to_string())
            .or_default()
            .snapshots
            .insert(record.arn.clone(), record);
    }

    /// Make every mutating call on `identifier` fail with a throttling error
    pub fn fail_on(&self, identifier: &str) {
        self.lock().fail_on.insert(identifier.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().fail_on.clear();
    }

    /// Status given to snapshots created or copied from now on
    pub fn set_new_status(&self, status: SnapshotStatus) {
        self.lock().new_status = status;
    }

    pub fn set_status(&self, region: &str, identifier: &str, status: SnapshotStatus) {
        let mut state = self.lock();
        let arn = snapshot_arn(region, SOURCE_ACCOUNT, identifier);
        if let Some(snapshot) = state
            .regions
            .get_mut(region)
            .and_then(|r| r.snapshots.get_mut(&arn))
        {
            snapshot.status = status;
        }
    }

    /// Own snapshot in `region`, if present
    pub fn snapshot(&self, region: &str, identifier: &str) -> Option<SnapshotRecord> {
        let state = self.lock();
        let arn = snapshot_arn(region, SOURCE_ACCOUNT, identifier);
        state.regions.get(region)?.snapshots.get(&arn).cloned()
    }

    /// Identifiers of own snapshots in `region`
    pub fn own_identifiers(&self, region: &str) -> Vec<String> {
        let state = self.lock();
        state
            .regions
            .get(region)
            .map(|r| {
                r.snapshots
                    .values()
                    .filter(|s| s.origin == SnapshotOrigin::Manual)
                    .map(|s| s.identifier.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn restore_list(&self, region: &str, identifier: &str) -> Vec<String> {
        let state = self.lock();
        state
            .regions
            .get(region)
            .and_then(|r| r.restore.get(identifier).cloned())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

fn provider_error(error: AwsError, op: &str) -> anyhow::Error {
    anyhow::Error::new(error).context(format!("Fake {op} failed"))
}

/// Region-scoped client over a `FakeCloud`
pub struct FakeRds {
    region: String,
    cloud: FakeCloud,
}

impl FakeRds {
    /// Record a mutating call, failing it if the identifier is marked
    fn mutate(&self, state: &mut CloudState, op: &'static str, identifier: &str) -> Result<()> {
        state.calls.push(Call {
            region: self.region.clone(),
            op,
            identifier: identifier.to_string(),
        });
        if state.fail_on.contains(identifier) {
            return Err(provider_error(AwsError::Throttled, op));
        }
        Ok(())
    }

    fn own_arn(&self, state: &CloudState, identifier: &str) -> String {
        snapshot_arn(&self.region, &state.account, identifier)
    }

    fn page<T: Clone>(items: Vec<T>, marker: Option<String>, size: usize) -> Result<Page<T>> {
        let start: usize = match marker {
            Some(m) => m.parse()?,
            None => 0,
        };
        let end = (start + size).min(items.len());
        let next = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: items[start.min(end)..end].to_vec(),
            marker: next,
        })
    }
}

impl RdsOperations for FakeRds {
    async fn describe_clusters(&self, marker: Option<String>) -> Result<Page<ClusterRecord>> {
        tokio::task::yield_now().await;
        let state = self.cloud.lock();
        let clusters = state
            .regions
            .get(&self.region)
            .map(|r| r.clusters.clone())
            .unwrap_or_default();
        Self::page(clusters, marker, state.page_size)
    }

    async fn describe_snapshots(
        &self,
        request: ListSnapshotsRequest,
        marker: Option<String>,
    ) -> Result<Page<SnapshotRecord>> {
        tokio::task::yield_now().await;
        let state = self.cloud.lock();
        let snapshots: Vec<SnapshotRecord> = state
            .regions
            .get(&self.region)
            .map(|r| {
                r.snapshots
                    .values()
                    .filter(|s| {
                        request.scope == SnapshotScope::IncludeShared
                            || s.origin != SnapshotOrigin::Shared
                    })
                    .filter(|s| request.snapshot_type.is_none_or(|t| t == s.origin))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Self::page(snapshots, marker, state.page_size)
    }

    async fn create_snapshot(&self, request: CreateSnapshotRequest) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.cloud.lock();
        self.mutate(&mut state, "create", &request.identifier)?;

        let arn = self.own_arn(&state, &request.identifier);
        let status = state.new_status;
        let region = state.regions.entry(self.region.clone()).or_default();
        if region.snapshots.contains_key(&arn) {
            return Err(provider_error(
                AwsError::AlreadyExists {
                    message: request.identifier,
                },
                "create",
            ));
        }
        let record = SnapshotRecord::new(&request.identifier, &arn, &request.cluster_id, ENGINE)
            .with_status(status)
            .with_tags(request.tags);
        region.snapshots.insert(arn, record);
        Ok(())
    }

    async fn copy_snapshot(&self, request: CopySnapshotRequest) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.cloud.lock();
        self.mutate(&mut state, "copy", &request.target_identifier)?;

        let source = state
            .regions
            .values()
            .flat_map(|r| r.snapshots.values())
            .find(|s| s.arn == request.source)
            .cloned()
            .ok_or_else(|| {
                provider_error(
                    AwsError::NotFound {
                        message: request.source.clone(),
                    },
                    "copy",
                )
            })?;

        let arn = self.own_arn(&state, &request.target_identifier);
        let status = state.new_status;
        let region = state.regions.entry(self.region.clone()).or_default();
        if region.snapshots.contains_key(&arn) {
            return Err(provider_error(
                AwsError::AlreadyExists {
                    message: request.target_identifier,
                },
                "copy",
            ));
        }

        let mut tags = if request.copy_tags {
            source.tags.clone()
        } else {
            TagSet::new()
        };
        tags.extend(&request.tags);

        let mut record =
            SnapshotRecord::new(&request.target_identifier, &arn, &source.cluster_id, &source.engine)
                .with_status(status)
                .with_tags(tags);
        match request.kms_key_id.or(source.kms_key_id) {
            Some(key) => record = record.with_kms_key(key),
            None => record.encrypted = source.encrypted,
        }
        region.snapshots.insert(arn, record);
        Ok(())
    }

    async fn restore_accounts(&self, identifier: &str) -> Result<Vec<String>> {
        tokio::task::yield_now().await;
        Ok(self.cloud.restore_list(&self.region, identifier))
    }

    async fn share_snapshot(&self, identifier: &str, account_id: &str) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.cloud.lock();
        self.mutate(&mut state, "share", identifier)?;
        state
            .regions
            .entry(self.region.clone())
            .or_default()
            .restore
            .entry(identifier.to_string())
            .or_default()
            .push(account_id.to_string());
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> Result<TagSet> {
        tokio::task::yield_now().await;
        let state = self.cloud.lock();
        state
            .regions
            .get(&self.region)
            .and_then(|r| r.snapshots.get(arn))
            .map(|s| s.tags.clone())
            .ok_or_else(|| {
                provider_error(
                    AwsError::NotFound {
                        message: arn.to_string(),
                    },
                    "list tags",
                )
            })
    }

    async fn add_tags(&self, arn: &str, tags: TagSet) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.cloud.lock();
        let identifier = arn.rsplit(':').next().unwrap_or(arn).to_string();
        self.mutate(&mut state, "tag", &identifier)?;
        let snapshot = state
            .regions
            .get_mut(&self.region)
            .and_then(|r| r.snapshots.get_mut(arn))
            .ok_or_else(|| {
                provider_error(
                    AwsError::NotFound {
                        message: arn.to_string(),
                    },
                    "tag",
                )
            })?;
        snapshot.tags.extend(&tags);
        Ok(())
    }

    async fn delete_snapshot(&self, identifier: &str) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.cloud.lock();
        self.mutate(&mut state, "delete", identifier)?;
        let arn = self.own_arn(&state, identifier);
        state
            .regions
            .get_mut(&self.region)
            .and_then(|r| r.snapshots.remove(&arn))
            .map(|_| ())
            .ok_or_else(|| {
                provider_error(
                    AwsError::NotFound {
                        message: identifier.to_string(),
                    },
                    "delete",
                )
            })
    }
}

/// Configuration for a pass from us-east-1 to us-west-2
pub fn config(mode: Mode) -> ToolConfig {
    ToolConfig {
        mode,
        selection: SelectionConfig {
            pattern: mode.default_pattern().to_string(),
            engines: default_engines(),
        },
        schedule: ScheduleConfig {
            retention_days: DEFAULT_RETENTION_DAYS,
            interval_hours: DEFAULT_BACKUP_INTERVAL_HOURS,
        },
        regions: RegionConfig {
            source: SOURCE_REGION.to_string(),
            destination: DEST_REGION.to_string(),
        },
        sharing: SharingConfig {
            destination_account: Some(DEST_ACCOUNT.parse().unwrap()),
            reencrypt_before_share: false,
        },
        keys: KmsConfig::default(),
        creation: CreationConfig::default(),
        flags: RuntimeFlags {
            dry_run: false,
            max_in_flight: 4,
        },
    }
}

/// Run one pass at the fixture clock against `cloud`
pub async fn run_pass(config: &ToolConfig, cloud: &FakeCloud) -> PassReport {
    run_pass_with_key(config, cloud, None).await
}

pub async fn run_pass_with_key(
    config: &ToolConfig,
    cloud: &FakeCloud,
    backup_key: Option<&str>,
) -> PassReport {
    let source = cloud.region(config.region());
    let destination = cloud.region(config.destination_region());
    Reconciler::new(config, &source, &destination, fixed_now())
        .unwrap()
        .with_backup_key(backup_key.map(str::to_string))
        .run()
        .await
        .unwrap()
}
