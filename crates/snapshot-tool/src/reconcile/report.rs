//! Pass report and summary display

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use thiserror::Error;

use crate::config::Mode;
use crate::executor::{Action, Outcome};

/// Actions recorded instead of executed during a dry run
pub type PlannedAction = Action;

/// An action the provider accepted (or that was already in place)
#[derive(Debug, Clone, Serialize)]
pub struct Completed {
    pub identifier: String,
    pub action: &'static str,
    pub outcome: Outcome,
}

/// A candidate left alone this pass, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skip {
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub identifier: String,
    pub action: &'static str,
    pub reason: String,
}

/// Raised to the scheduler when a pass left work for a later invocation
#[derive(Debug, Error)]
#[error("{mode}: {pending} snapshot(s) pending, needs retrying")]
pub struct PendingWork {
    pub pending: usize,
    pub mode: Mode,
}

/// Outcome of one pass
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub mode: Mode,
    pub dry_run: bool,
    pub succeeded: Vec<Completed>,
    pub skipped: Vec<Skip>,
    /// Lineages that need another pass before they can advance
    pub waiting: Vec<String>,
    pub failures: Vec<Failure>,
    pub planned: Vec<PlannedAction>,
}

impl PassReport {
    pub fn new(mode: Mode, dry_run: bool) -> Self {
        Self {
            mode,
            dry_run,
            succeeded: Vec::new(),
            skipped: Vec::new(),
            waiting: Vec::new(),
            failures: Vec::new(),
            planned: Vec::new(),
        }
    }

    pub fn skip(&mut self, identifier: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(Skip {
            identifier: identifier.into(),
            reason: reason.into(),
        });
    }

    pub fn wait(&mut self, identifier: impl Into<String>) {
        self.waiting.push(identifier.into());
    }

    /// Record the result of one executed action
    pub fn record(&mut self, action: Action, result: anyhow::Result<Outcome>) {
        let identifier = action.identifier().to_string();
        match result {
            Ok(Outcome::DryRun) => self.planned.push(action),
            Ok(outcome) => {
                if outcome == Outcome::FollowUp {
                    self.waiting.push(identifier.clone());
                }
                self.succeeded.push(Completed {
                    identifier,
                    action: action.kind(),
                    outcome,
                });
            }
            Err(e) => self.failures.push(Failure {
                identifier,
                action: action.kind(),
                reason: format!("{e:#}"),
            }),
        }
    }

    /// Sort every list by identifier so output does not depend on completion order
    pub fn finish(mut self) -> Self {
        self.succeeded
            .sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.skipped.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.waiting.sort();
        self.failures.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.planned
            .sort_by(|a, b| a.identifier().cmp(b.identifier()));
        self
    }

    /// Failed actions plus lineages waiting on another pass; always zero for a dry run
    pub fn pending_count(&self) -> usize {
        if self.dry_run {
            0
        } else {
            self.failures.len() + self.waiting.len()
        }
    }

    /// `Err` when the scheduler has to invoke this mode again
    pub fn check(&self) -> Result<(), PendingWork> {
        match self.pending_count() {
            0 => Ok(()),
            pending => Err(PendingWork {
                pending,
                mode: self.mode,
            }),
        }
    }

    /// Render the report as a table for stdout
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Snapshot"),
                Cell::new("Result"),
                Cell::new("Detail"),
            ]);

        for done in &self.succeeded {
            let result = match done.outcome {
                Outcome::AlreadyDone => "already done",
                _ => "done",
            };
            table.add_row(vec![
                Cell::new(&done.identifier),
                Cell::new(result),
                Cell::new(done.action),
            ]);
        }
        for planned in &self.planned {
            table.add_row(vec![
                Cell::new(planned.identifier()),
                Cell::new("planned"),
                Cell::new(planned.kind()),
            ]);
        }
        for identifier in &self.waiting {
            table.add_row(vec![
                Cell::new(identifier),
                Cell::new("waiting"),
                Cell::new("needs another pass"),
            ]);
        }
        for failure in &self.failures {
            table.add_row(vec![
                Cell::new(&failure.identifier),
                Cell::new("failed"),
                Cell::new(format!("{}: {}", failure.action, failure.reason)),
            ]);
        }
        for skip in &self.skipped {
            table.add_row(vec![
                Cell::new(&skip.identifier),
                Cell::new("skipped"),
                Cell::new(&skip.reason),
            ]);
        }
        table
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{}: {} done, {} planned, {} skipped, {} waiting, {} failed",
            self.mode,
            self.succeeded.len(),
            self.planned.len(),
            self.skipped.len(),
            self.waiting.len(),
            self.failures.len()
        )
    }
}
