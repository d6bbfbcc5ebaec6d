//! Reconciliation driver
//!
//! One pass per invocation: fetch inventories, classify every candidate,
//! execute the due actions with bounded concurrency, and report what is left.
//! Nothing is retried in-process; a pass that leaves work behind returns a
//! report whose [`PassReport::check`] fails, and the scheduler invokes the
//! mode again later.

mod copy;
mod expire;
pub mod report;
mod reencrypt;
mod share;
mod take;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::aws::classify_anyhow_error;
use crate::aws::rds::RdsOperations;
use crate::config::{ConfigError, Mode, ToolConfig};
use crate::executor::{Action, ActionExecutor, ExecutorSettings};
use crate::filter::{FilterEngine, Selector};
use crate::inventory::Inventory;
use crate::lifecycle::Schedule;

pub use report::{Completed, Failure, PassReport, PendingWork, PlannedAction, Skip};

/// Actions chosen for one pass, at most one per snapshot identifier
#[derive(Debug, Default)]
pub(crate) struct Plan {
    actions: BTreeMap<String, Action>,
}

impl Plan {
    fn push(&mut self, action: Action) {
        match self.actions.entry(action.identifier().to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(action);
            }
            Entry::Occupied(existing) => {
                warn!(
                    snapshot = %existing.key(),
                    kept = existing.get().kind(),
                    dropped = action.kind(),
                    "Second action for the same snapshot in one pass, dropping it"
                );
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Runs one pass of the configured mode
pub struct Reconciler<'a, R> {
    config: &'a ToolConfig,
    selector: Selector,
    source: &'a R,
    destination: &'a R,
    source_inventory: Inventory<'a, R>,
    destination_inventory: Inventory<'a, R>,
    now: DateTime<Utc>,
    backup_key: Option<String>,
}

impl<'a, R: RdsOperations> Reconciler<'a, R> {
    /// `source` and `destination` are clients for the source and destination
    /// regions (the same client when the pass does not cross regions).
    pub fn new(
        config: &'a ToolConfig,
        source: &'a R,
        destination: &'a R,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            selector: config.selector()?,
            source,
            destination,
            source_inventory: Inventory::new(source),
            destination_inventory: Inventory::new(destination),
            now,
            backup_key: None,
        })
    }

    /// Resolved ARN of the backup key checked before sharing
    pub fn with_backup_key(mut self, key_arn: Option<String>) -> Self {
        self.backup_key = key_arn;
        self
    }

    fn filter(&self) -> FilterEngine<'_> {
        FilterEngine::new(
            &self.selector,
            self.config.mode.selector_target(),
            &self.config.selection.engines,
        )
    }

    fn schedule(&self) -> Schedule {
        self.config.schedule()
    }

    pub async fn run(&self) -> Result<PassReport> {
        let mode = self.config.mode;
        info!(
            %mode,
            region = %self.config.region(),
            destination = %self.config.destination_region(),
            selector = %self.selector,
            dry_run = self.config.dry_run(),
            "Starting pass"
        );

        let mut report = PassReport::new(mode, self.config.dry_run());
        let plan = match mode {
            Mode::Take => self.plan_take(&mut report).await?,
            Mode::Share => self.plan_share(&mut report).await?,
            Mode::Reencrypt => self.plan_reencrypt(&mut report).await?,
            Mode::CopyShared => self.plan_copy_shared(&mut report).await?,
            Mode::CopyOwn => self.plan_copy_own(&mut report).await?,
            Mode::Expire | Mode::ExpireDest => self.plan_expire(&mut report).await?,
        };

        info!(%mode, actions = plan.len(), "Classified inventory");
        self.dispatch(plan, &mut report).await;

        let report = report.finish();
        info!(summary = %report.summary(), "Pass finished");
        Ok(report)
    }

    fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            source_region: self.config.region().to_string(),
            cross_region: self.config.is_cross_region(),
            mark_reencrypt: self.config.creation.mark_reencrypt,
            source_key: self.config.keys.source_key.clone(),
            destination_key: self.config.keys.destination_key.clone(),
            interval: self.schedule().interval,
            now: self.now,
            dry_run: self.config.dry_run(),
        }
    }

    /// Execute every planned action; one failure never stops the others
    async fn dispatch(&self, plan: Plan, report: &mut PassReport) {
        let executor = ActionExecutor::new(
            self.source,
            self.destination,
            &self.source_inventory,
            self.executor_settings(),
        );
        let executor = &executor;

        let results: Vec<_> = stream::iter(plan.actions.into_values())
            .map(|action| async move {
                let result = executor.execute(&action).await;
                if let Err(e) = &result {
                    let cause = classify_anyhow_error(e);
                    if cause.is_transient() {
                        warn!(
                            action = action.kind(),
                            snapshot = %action.identifier(),
                            error = %cause,
                            "Provider busy, pending until the next pass"
                        );
                    } else {
                        error!(
                            action = action.kind(),
                            snapshot = %action.identifier(),
                            error = %format!("{e:#}"),
                            "Action failed, pending until the next pass"
                        );
                    }
                }
                (action, result)
            })
            .buffer_unordered(self.config.max_in_flight())
            .collect()
            .await;

        for (action, result) in results {
            report.record(action, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Side;

    #[test]
    fn plan_keeps_first_action_per_snapshot() {
        let mut plan = Plan::default();
        plan.push(Action::Delete {
            identifier: "orders-2024-01-01-00-00".into(),
            side: Side::Source,
        });
        plan.push(Action::CopyRemote {
            identifier: "orders-2024-01-01-00-00".into(),
            source_arn: "arn".into(),
            encrypted: false,
        });
        plan.push(Action::Delete {
            identifier: "orders-2024-01-02-00-00".into(),
            side: Side::Source,
        });

        assert_eq!(plan.len(), 2);
        assert!(matches!(
            plan.actions["orders-2024-01-01-00-00"],
            Action::Delete { .. }
        ));
    }
}
