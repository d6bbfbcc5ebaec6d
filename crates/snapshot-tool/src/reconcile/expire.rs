//! Expiry passes: delete tool-managed snapshots past retention

use anyhow::Result;
use tracing::{debug, info};

use super::{Plan, PassReport, Reconciler};
use crate::aws::rds::{ListSnapshotsRequest, RdsOperations};
use crate::config::Mode;
use crate::executor::{Action, Side};
use crate::lifecycle::{ExpiryDecision, ExpiryMarker, needs_expiry};

impl<R: RdsOperations> Reconciler<'_, R> {
    /// `expire` deletes originals in the source region, `expire-dest` deletes
    /// copies in the destination region
    pub(super) async fn plan_expire(&self, report: &mut PassReport) -> Result<Plan> {
        let (inventory, marker, side) = match self.config.mode {
            Mode::ExpireDest => (
                &self.destination_inventory,
                ExpiryMarker::CopiedBy,
                Side::Destination,
            ),
            _ => (&self.source_inventory, ExpiryMarker::CreatedBy, Side::Source),
        };

        let snapshots = inventory
            .snapshots(ListSnapshotsRequest::own_manual())
            .await?;
        let mut own = self.filter().own(&snapshots);
        inventory.hydrate_tags(&mut own).await;

        let retention = self.schedule().retention;
        let mut plan = Plan::default();
        for (identifier, snapshot) in &own {
            match needs_expiry(identifier, snapshot, marker, retention, self.now) {
                ExpiryDecision::Delete => {
                    info!(snapshot = %identifier, %side, "Expired, deleting");
                    plan.push(Action::Delete {
                        identifier: identifier.clone(),
                        side,
                    });
                }
                ExpiryDecision::Unmanaged => {
                    info!(snapshot = %identifier, %marker, "Not deleting, did not find the tool's tag");
                    report.skip(identifier, format!("missing {marker} tag"));
                }
                ExpiryDecision::Undated => {
                    debug!(snapshot = %identifier, "Not deleting, no valid timestamp");
                    report.skip(identifier, "no valid timestamp");
                }
                ExpiryDecision::Retain => {
                    debug!(snapshot = %identifier, "Within retention");
                }
            }
        }
        Ok(plan)
    }
}
