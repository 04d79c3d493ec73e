//! Causal Attribution Engine
//!
//! Trials candidate actions one at a time: measure a baseline, apply the
//! action, let the system settle, measure again. Each trial's effect on HTTP
//! response time is classified, and the trials are ranked into a report
//! naming the primary cause when one action clearly helped.
//!
//! Trials never roll back earlier actions. Each baseline reflects the
//! cumulative state, so later trials measure marginal effect, and the fixed
//! registry order keeps runs reproducible.

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actions::{ActionExecutor, ActionId};
use crate::config::EngineConfig;
use crate::error::{NetDocError, Result};
use crate::sampler::{self, MetricSource, AVERAGE_SPACING};
use crate::snapshot::Snapshot;

/// Improvement at or above which an action counts as effective
pub const EFFECTIVE_PCT: f64 = 20.0;

/// Improvement at or above which an action counts as a slight help
pub const SLIGHT_PCT: f64 = 5.0;

/// Improvement strictly below which an action counts as harmful
pub const NEGATIVE_PCT: f64 = -5.0;

// ============================================================================
// Effect classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EffectClass {
    Effective,
    Slight,
    None,
    Negative,
}

impl EffectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Effective => "effective",
            Self::Slight => "slight",
            Self::None => "none",
            Self::Negative => "negative",
        }
    }
}

impl std::fmt::Display for EffectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage drop from `baseline` to `post`
///
/// `None` when the baseline is the sentinel or not positive, or the post
/// reading failed.
pub fn improvement_pct(baseline: f64, post: f64) -> Option<f64> {
    if baseline <= 0.0 || post < 0.0 {
        return None;
    }
    Some((baseline - post) * 100.0 / baseline)
}

pub fn classify_effect(pct: f64) -> EffectClass {
    if pct >= EFFECTIVE_PCT {
        EffectClass::Effective
    } else if pct >= SLIGHT_PCT {
        EffectClass::Slight
    } else if pct < NEGATIVE_PCT {
        EffectClass::Negative
    } else {
        EffectClass::None
    }
}

// ============================================================================
// Trials and report
// ============================================================================

/// One isolated action trial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionTrial {
    pub action_id: ActionId,
    pub baseline: Snapshot,
    pub post: Snapshot,
    /// HTTP improvement; `None` marks an indeterminate trial
    pub improvement_pct: Option<f64>,
    /// DNS improvement, secondary evidence only
    pub dns_improvement_pct: Option<f64>,
    pub effect_class: EffectClass,
    /// Set when the action could not be applied
    pub apply_error: Option<String>,
}

impl ActionTrial {
    /// Trial of an action that was applied and measured
    pub fn measured(action_id: ActionId, baseline: Snapshot, post: Snapshot) -> Self {
        let improvement = improvement_pct(baseline.http_response_ms(), post.http_response_ms());
        let dns_improvement = improvement_pct(baseline.dns_resolve_ms(), post.dns_resolve_ms());
        Self {
            action_id,
            effect_class: improvement.map(classify_effect).unwrap_or(EffectClass::None),
            improvement_pct: improvement,
            dns_improvement_pct: dns_improvement,
            baseline,
            post,
            apply_error: None,
        }
    }

    /// Trial of an action whose apply failed; post mirrors the baseline
    pub fn failed(action_id: ActionId, baseline: Snapshot, error: String) -> Self {
        Self {
            action_id,
            post: baseline.clone(),
            baseline,
            improvement_pct: None,
            dns_improvement_pct: None,
            effect_class: EffectClass::None,
            apply_error: Some(error),
        }
    }

    /// Participates in ranking
    pub fn is_ranked(&self) -> bool {
        self.apply_error.is_none() && self.improvement_pct.is_some()
    }
}

/// The action judged most responsible, or none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryCause {
    Action(ActionId),
    Inconclusive,
}

impl PrimaryCause {
    pub fn action(&self) -> Option<ActionId> {
        match self {
            Self::Action(id) => Some(*id),
            Self::Inconclusive => None,
        }
    }

    /// Human-readable verdict
    pub fn explanation(&self) -> String {
        match self {
            Self::Action(id) => format!("{} ({})", id, id.action().description),
            Self::Inconclusive => {
                "inconclusive: no single action produced a significant improvement".to_string()
            }
        }
    }
}

impl std::fmt::Display for PrimaryCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Action(id) => f.write_str(id.as_str()),
            Self::Inconclusive => f.write_str("inconclusive"),
        }
    }
}

impl Serialize for PrimaryCause {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Ranked trials by improvement descending, then unranked in trial order
    pub trials: Vec<ActionTrial>,
    pub primary_cause: PrimaryCause,
}

impl AttributionReport {
    /// Trial of the primary cause, if there is one
    pub fn primary_trial(&self) -> Option<&ActionTrial> {
        let id = self.primary_cause.action()?;
        self.trials.iter().find(|t| t.action_id == id)
    }

    pub fn ranked(&self) -> impl Iterator<Item = &ActionTrial> {
        self.trials.iter().filter(|t| t.is_ranked())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ActionTrial> {
        self.trials.iter().filter(|t| t.apply_error.is_some())
    }
}

/// Order trials and pick the primary cause
///
/// Sorting is stable: ties keep trial order. Unranked trials follow every
/// ranked one.
pub fn rank_trials(trials: Vec<ActionTrial>) -> (Vec<ActionTrial>, PrimaryCause) {
    let (mut ranked, unranked): (Vec<_>, Vec<_>) = trials.into_iter().partition(|t| t.is_ranked());

    ranked.sort_by(|a, b| {
        let a = a.improvement_pct.unwrap_or(f64::NEG_INFINITY);
        let b = b.improvement_pct.unwrap_or(f64::NEG_INFINITY);
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });

    let primary = ranked
        .first()
        .filter(|t| t.effect_class == EffectClass::Effective)
        .map(|t| PrimaryCause::Action(t.action_id))
        .unwrap_or(PrimaryCause::Inconclusive);

    ranked.extend(unranked);
    (ranked, primary)
}

// ============================================================================
// Engine
// ============================================================================

/// Progress callbacks, invoked from the engine's single thread of control
pub trait TrialObserver: Send + Sync {
    fn trial_started(&self, _index: usize, _total: usize, _action: ActionId) {}

    fn trial_finished(&self, _index: usize, _total: usize, _trial: &ActionTrial) {}
}

pub struct NoopObserver;

impl TrialObserver for NoopObserver {}

pub struct AttributionEngine<'a> {
    sampler: &'a dyn MetricSource,
    executor: &'a dyn ActionExecutor,
    stabilization: Duration,
    trial_samples: usize,
}

impl<'a> AttributionEngine<'a> {
    pub fn new(
        sampler: &'a dyn MetricSource,
        executor: &'a dyn ActionExecutor,
        config: &EngineConfig,
    ) -> Self {
        Self {
            sampler,
            executor,
            stabilization: config.stabilization(),
            trial_samples: config.effective_trial_samples(),
        }
    }

    pub fn with_stabilization(mut self, stabilization: Duration) -> Self {
        self.stabilization = stabilization;
        self
    }

    async fn measure(&self) -> Snapshot {
        if self.trial_samples <= 1 {
            self.sampler.sample().await
        } else {
            sampler::sample_averaged(self.sampler, self.trial_samples, AVERAGE_SPACING).await
        }
    }

    /// Trial every candidate strictly in order and build the report
    ///
    /// Fails only when the process cannot change network settings; that is
    /// checked before the first action runs.
    pub async fn run(
        &self,
        candidates: &[ActionId],
        observer: &dyn TrialObserver,
    ) -> Result<AttributionReport> {
        if !self.executor.is_elevated() {
            return Err(NetDocError::NotElevated);
        }

        let run_id = Uuid::new_v4();
        let started_at = Local::now();
        let total = candidates.len();
        info!("Attribution run {} with {} candidates", run_id, total);

        let mut trials = Vec::with_capacity(total);
        for (index, id) in candidates.iter().copied().enumerate() {
            observer.trial_started(index, total, id);

            let baseline = self.measure().await;
            let outcome = self.executor.apply(id.action()).await;

            let trial = if outcome.applied {
                if !self.stabilization.is_zero() {
                    tokio::time::sleep(self.stabilization).await;
                }
                let post = self.measure().await;
                ActionTrial::measured(id, baseline, post)
            } else {
                let error = outcome.error.unwrap_or_else(|| "apply failed".to_string());
                warn!("Trial {} could not apply: {}", id, error);
                ActionTrial::failed(id, baseline, error)
            };

            match trial.improvement_pct {
                Some(pct) => info!("Trial {}: {:+.1}% ({})", id, pct, trial.effect_class),
                None => info!("Trial {}: indeterminate", id),
            }

            observer.trial_finished(index, total, &trial);
            trials.push(trial);
        }

        let (trials, primary_cause) = rank_trials(trials);
        info!("Attribution run {} primary cause: {}", run_id, primary_cause);

        Ok(AttributionReport {
            run_id,
            started_at,
            finished_at: Local::now(),
            trials,
            primary_cause,
        })
    }
}
