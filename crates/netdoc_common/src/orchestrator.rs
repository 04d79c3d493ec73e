//! Remediation Orchestrator
//!
//! Applies a fixed or engine-selected sequence of actions and tallies the
//! outcome. Every action in a sequence is attempted even when earlier ones
//! fail. Where an action has a post-condition it is re-read after applying,
//! so "the command exited 0" is not taken as success on its own.

use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

use crate::actions::{ActionExecutor, ActionId, Plan};
use crate::attribution::{AttributionEngine, AttributionReport, PrimaryCause, TrialObserver};
use crate::checks::Finding;
use crate::error::{NetDocError, Result};

/// Record of one attempted action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub action_id: ActionId,
    pub applied: bool,
    /// Post-condition re-read; `None` when the action has none or it was unreadable
    pub verified: Option<bool>,
    pub error: Option<String>,
    pub requires_restart: bool,
    pub duration_ms: u64,
}

impl ActionResult {
    pub fn success(&self) -> bool {
        self.applied && self.verified != Some(false)
    }
}

/// Per-action outcome of one remediation run
#[derive(Debug, Clone, Serialize)]
pub struct RemediationTally {
    pub label: String,
    pub results: Vec<ActionResult>,
}

impl RemediationTally {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// "success k / total n"
    pub fn summary(&self) -> String {
        format!("success {} / total {}", self.succeeded(), self.total())
    }

    /// Attempted actions that only take effect after a restart
    pub fn restart_required(&self) -> Vec<ActionId> {
        self.results
            .iter()
            .filter(|r| r.requires_restart)
            .map(|r| r.action_id)
            .collect()
    }

    /// A restart-requiring action was applied
    pub fn restart_pending(&self) -> bool {
        self.results.iter().any(|r| r.requires_restart && r.applied)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| !r.success())
    }

    pub fn meets(&self, min_successes: usize) -> bool {
        self.succeeded() >= min_successes
    }
}

/// Repair strategies offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RepairMode {
    Quick,
    Full,
    /// Attribute first, then apply only the primary cause (or Full)
    Guided,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuidedOutcome {
    pub report: AttributionReport,
    pub tally: RemediationTally,
    /// Attribution was inconclusive and Full was applied instead
    pub fell_back_to_full: bool,
}

/// Actions that address a set of findings
///
/// A repairable finding without a single fixing action (e.g. all HTTP
/// requests failing) escalates to the Full plan. With nothing repairable
/// the Quick plan is used.
pub fn actions_for_findings(findings: &[Finding]) -> Vec<ActionId> {
    let repairable: Vec<&Finding> = findings
        .iter()
        .filter(|f| f.status.is_issue() || f.fix_action.is_some())
        .filter(|f| f.fix_available)
        .collect();

    if repairable.iter().any(|f| f.fix_action.is_none()) {
        return Plan::Full.actions().to_vec();
    }

    let mut ids: Vec<ActionId> = repairable.iter().filter_map(|f| f.fix_action).collect();
    if ids.is_empty() {
        return Plan::Quick.actions().to_vec();
    }
    ids.sort();
    ids.dedup();
    ids
}

pub struct Orchestrator<'a> {
    executor: &'a dyn ActionExecutor,
}

impl<'a> Orchestrator<'a> {
    pub fn new(executor: &'a dyn ActionExecutor) -> Self {
        Self { executor }
    }

    /// Apply actions in order, attempting every one
    pub async fn apply_actions(&self, label: &str, ids: &[ActionId]) -> Result<RemediationTally> {
        if !self.executor.is_elevated() {
            return Err(NetDocError::NotElevated);
        }

        info!("Starting {} ({} actions)", label, ids.len());
        let mut results = Vec::with_capacity(ids.len());

        for id in ids.iter().copied() {
            let action = id.action();
            let start = Instant::now();
            let outcome = self.executor.apply(action).await;

            let verified = match (outcome.applied, action.post_condition) {
                (true, Some(condition)) => self.executor.verify(condition).await,
                _ => None,
            };
            if verified == Some(false) {
                warn!("{} applied but its post-condition does not hold", id);
            }

            results.push(ActionResult {
                action_id: id,
                applied: outcome.applied,
                verified,
                error: outcome.error,
                requires_restart: action.requires_restart,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let tally = RemediationTally {
            label: label.to_string(),
            results,
        };
        info!("Finished {}: {}", label, tally.summary());
        Ok(tally)
    }

    pub async fn apply_plan(&self, plan: Plan) -> Result<RemediationTally> {
        self.apply_actions(plan.label(), plan.actions()).await
    }

    /// Apply the actions that address the given findings
    pub async fn repair_findings(&self, findings: &[Finding]) -> Result<RemediationTally> {
        let ids = actions_for_findings(findings);
        self.apply_actions("diagnose and repair", &ids).await
    }

    /// Run attribution, then apply only its primary cause, or Full if inconclusive
    pub async fn guided(
        &self,
        engine: &AttributionEngine<'_>,
        candidates: &[ActionId],
        observer: &dyn TrialObserver,
    ) -> Result<GuidedOutcome> {
        let report = engine.run(candidates, observer).await?;

        let (tally, fell_back_to_full) = match report.primary_cause {
            PrimaryCause::Action(id) => (self.apply_actions("guided repair", &[id]).await?, false),
            PrimaryCause::Inconclusive => (self.apply_plan(Plan::Full).await?, true),
        };

        Ok(GuidedOutcome {
            report,
            tally,
            fell_back_to_full,
        })
    }
}
