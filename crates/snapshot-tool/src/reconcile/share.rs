//! Share pass: grant the destination account restore access

use anyhow::Result;
use tracing::{debug, info};

use super::{Plan, PassReport, Reconciler};
use crate::aws::rds::{ListSnapshotsRequest, RdsOperations};
use crate::config::ConfigError;
use crate::executor::Action;
use crate::lifecycle::{ShareDecision, needs_share};

impl<R: RdsOperations> Reconciler<'_, R> {
    pub(super) async fn plan_share(&self, report: &mut PassReport) -> Result<Plan> {
        let Some(account) = &self.config.sharing.destination_account else {
            return Err(ConfigError::MissingDestinationAccount(self.config.mode).into());
        };

        let inventory = &self.source_inventory;
        let snapshots = inventory
            .snapshots(ListSnapshotsRequest::own_manual())
            .await?;
        let mut own = self.filter().own(&snapshots);
        inventory.hydrate_tags(&mut own).await;

        let backup_key = if self.config.sharing.reencrypt_before_share {
            self.backup_key.as_deref()
        } else {
            None
        };

        let mut plan = Plan::default();
        for (identifier, snapshot) in &own {
            match needs_share(identifier, snapshot, backup_key) {
                ShareDecision::Share => plan.push(Action::Share {
                    identifier: identifier.clone(),
                    arn: snapshot.arn.clone(),
                    account_id: account.to_string(),
                }),
                ShareDecision::ReencryptFirst => {
                    info!(
                        snapshot = %identifier,
                        key = ?snapshot.kms_key_id,
                        "Not under the backup key, re-encrypting before sharing"
                    );
                    plan.push(Action::ReencryptCopy {
                        identifier: identifier.clone(),
                        arn: snapshot.arn.clone(),
                    });
                }
                ShareDecision::NotReady => {
                    report.skip(identifier, format!("status is {}", snapshot.status));
                }
                ShareDecision::NotPending => {
                    debug!(snapshot = %identifier, "Not flagged for sharing");
                }
            }
        }
        Ok(plan)
    }
}
