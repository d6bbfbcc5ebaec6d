//! Backup pass: snapshot clusters that are due

use anyhow::Result;
use snapshot_tool_common::naming;
use tracing::info;

use super::{Plan, PassReport, Reconciler};
use crate::aws::rds::{ListSnapshotsRequest, RdsOperations};
use crate::executor::Action;
use crate::filter::created_by_tool;
use crate::lifecycle::{BackupDecision, needs_backup};

impl<R: RdsOperations> Reconciler<'_, R> {
    pub(super) async fn plan_take(&self, report: &mut PassReport) -> Result<Plan> {
        let inventory = &self.source_inventory;
        let (clusters, snapshots) = tokio::try_join!(
            inventory.clusters(),
            inventory.snapshots(ListSnapshotsRequest::own_manual())
        )?;

        let filter = self.filter();
        // Manual snapshots taken outside the tool never count as a backup
        let mut own = filter.own(&snapshots);
        inventory.hydrate_tags(&mut own).await;
        let own = created_by_tool(&own);
        let interval = self.schedule().interval;
        let prefix = self.config.creation.name_prefix.as_deref();

        let mut plan = Plan::default();
        for cluster in filter.clusters(&clusters) {
            let cluster_id = &cluster.identifier;
            match needs_backup(cluster_id, &own, interval, self.now) {
                BackupDecision::Fresh { last } => {
                    let minutes = (self.now - last).num_minutes();
                    info!(cluster = %cluster_id, minutes, "Skipped, does not require backup");
                    report.skip(cluster_id, format!("backed up {minutes} minutes ago"));
                }
                BackupDecision::Due { last } => {
                    match last {
                        Some(last) => info!(
                            cluster = %cluster_id,
                            minutes = (self.now - last).num_minutes(),
                            "Last backup is older than the interval"
                        ),
                        None => info!(cluster = %cluster_id, "No previous backup found"),
                    }

                    let identifier = naming::encode(cluster_id, self.now, prefix);
                    let cluster_id = cluster_id.clone();
                    plan.push(if self.config.creation.use_automated_backup {
                        Action::CreateFromAutomated {
                            cluster_id,
                            identifier,
                        }
                    } else {
                        Action::CreateFromCluster {
                            cluster_id,
                            identifier,
                        }
                    });
                }
            }
        }
        Ok(plan)
    }
}
