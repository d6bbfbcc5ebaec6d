//! Copy passes
//!
//! `copy-shared` walks snapshots shared into this account through
//! shared → local copy → destination copy → local copy deleted.
//! `copy-own` moves the account's own snapshots to the destination region
//! and keeps the originals.

use anyhow::Result;
use tracing::{debug, info};

use super::{Plan, PassReport, Reconciler};
use crate::aws::rds::{ListSnapshotsRequest, RdsOperations};
use crate::executor::{Action, Side};
use crate::filter::{ProjectedSnapshot, Projection, created_by_tool};
use crate::lifecycle::{CopyStage, classify_copy, classify_remote_copy};

impl<R: RdsOperations> Reconciler<'_, R> {
    /// Own manual snapshots in the destination region (none without a cross-region step)
    async fn destination_snapshots(&self) -> Result<Projection> {
        if !self.config.is_cross_region() {
            return Ok(Projection::new());
        }
        let snapshots = self
            .destination_inventory
            .snapshots(ListSnapshotsRequest::own_manual())
            .await?;
        Ok(self.filter().own(&snapshots))
    }

    pub(super) async fn plan_copy_shared(&self, report: &mut PassReport) -> Result<Plan> {
        let inventory = &self.source_inventory;
        let (shared, local, remote) = tokio::try_join!(
            inventory.snapshots(ListSnapshotsRequest::shared()),
            inventory.snapshots(ListSnapshotsRequest::own_manual()),
            self.destination_snapshots(),
        )?;

        let filter = self.filter();
        let shared = filter.shared(&shared);
        let mut local: Projection = filter
            .own(&local)
            .into_iter()
            .filter(|(identifier, _)| shared.contains_key(identifier))
            .collect();
        // Local copies are only deleted when they carry the copy marker
        inventory.hydrate_tags(&mut local).await;

        let cross_region = self.config.is_cross_region();
        let retention = self.schedule().retention;

        let mut plan = Plan::default();
        for (identifier, snapshot) in &shared {
            let local_copy = local.get(identifier);
            let stage = classify_copy(
                identifier,
                snapshot,
                local_copy,
                remote.get(identifier),
                cross_region,
                retention,
                self.now,
            );
            match (stage, local_copy) {
                (CopyStage::CopyLocal, _) => plan.push(Action::CopyLocal {
                    identifier: identifier.clone(),
                    source_arn: snapshot.arn.clone(),
                    encrypted: snapshot.encrypted,
                }),
                (CopyStage::CopyRemote, Some(local_copy)) => {
                    plan.push(remote_copy(identifier, local_copy));
                }
                (CopyStage::DeleteLocal, Some(local_copy)) => {
                    if local_copy.tags.is_copied_by_tool() {
                        plan.push(Action::Delete {
                            identifier: identifier.clone(),
                            side: Side::Source,
                        });
                    } else {
                        info!(snapshot = %identifier, "Local snapshot was not copied by the tool, keeping it");
                        report.skip(identifier, "local snapshot not copied by the tool");
                    }
                }
                (stage, _) => self.note_stage(identifier, &stage, report),
            }
        }
        Ok(plan)
    }

    pub(super) async fn plan_copy_own(&self, report: &mut PassReport) -> Result<Plan> {
        let inventory = &self.source_inventory;
        let (local, remote) = tokio::try_join!(
            inventory.snapshots(ListSnapshotsRequest::own_manual()),
            self.destination_snapshots(),
        )?;

        let mut local = self.filter().own(&local);
        inventory.hydrate_tags(&mut local).await;
        let local = created_by_tool(&local);
        let cross_region = self.config.is_cross_region();

        let mut plan = Plan::default();
        for (identifier, snapshot) in &local {
            match classify_remote_copy(snapshot, remote.get(identifier), cross_region) {
                CopyStage::CopyRemote => plan.push(remote_copy(identifier, snapshot)),
                stage => self.note_stage(identifier, &stage, report),
            }
        }
        Ok(plan)
    }

    /// Report stages that need no action this pass
    fn note_stage(&self, identifier: &str, stage: &CopyStage, report: &mut PassReport) {
        match stage {
            CopyStage::AwaitLocal => {
                info!(snapshot = %identifier, "Remote copy pending, local copy not available yet");
                report.wait(identifier);
            }
            CopyStage::AwaitRemote => {
                report.skip(identifier, "destination copy not available yet");
            }
            CopyStage::TooOld => {
                info!(snapshot = %identifier, "Not copying, older than retention");
                report.skip(identifier, "older than retention");
            }
            CopyStage::Undated => {
                info!(snapshot = %identifier, "Not copying, no valid timestamp");
                report.skip(identifier, "no valid timestamp");
            }
            other => debug!(snapshot = %identifier, stage = ?other, "Nothing to do"),
        }
    }
}

fn remote_copy(identifier: &str, local: &ProjectedSnapshot) -> Action {
    Action::CopyRemote {
        identifier: identifier.to_string(),
        source_arn: local.arn.clone(),
        encrypted: local.encrypted,
    }
}
