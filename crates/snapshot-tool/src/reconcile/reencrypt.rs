//! Re-encrypt pass: copy flagged snapshots under the source key

use anyhow::Result;
use tracing::{debug, info};

use super::{Plan, PassReport, Reconciler};
use crate::aws::rds::{ListSnapshotsRequest, RdsOperations};
use crate::executor::Action;
use crate::lifecycle::{ReencryptDecision, needs_reencrypt};

impl<R: RdsOperations> Reconciler<'_, R> {
    pub(super) async fn plan_reencrypt(&self, report: &mut PassReport) -> Result<Plan> {
        let inventory = &self.source_inventory;
        let snapshots = inventory
            .snapshots(ListSnapshotsRequest::own_manual())
            .await?;
        let mut own = self.filter().own(&snapshots);
        inventory.hydrate_tags(&mut own).await;

        let retention = self.schedule().retention;
        let mut plan = Plan::default();
        for (identifier, snapshot) in &own {
            match needs_reencrypt(identifier, snapshot, retention, self.now) {
                ReencryptDecision::Copy => plan.push(Action::ReencryptCopy {
                    identifier: identifier.clone(),
                    arn: snapshot.arn.clone(),
                }),
                ReencryptDecision::NotReady => {
                    report.skip(identifier, format!("status is {}", snapshot.status));
                }
                ReencryptDecision::Expired => {
                    info!(snapshot = %identifier, "Not copying, older than retention");
                    report.skip(identifier, "older than retention");
                }
                ReencryptDecision::Undated => {
                    info!(snapshot = %identifier, "Not copying, no valid timestamp");
                    report.skip(identifier, "no valid timestamp");
                }
                ReencryptDecision::NotPending => {
                    debug!(snapshot = %identifier, "Not flagged for re-encryption");
                }
            }
        }
        Ok(plan)
    }
}
