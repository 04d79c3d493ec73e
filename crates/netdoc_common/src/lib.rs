//! NetDoc Common - network diagnosis and causal remediation core
//!
//! Measures network health, runs diagnostic checks, and trials remediation
//! actions one at a time to find out which one actually helped.

pub mod actions;
pub mod attribution;
pub mod checks;
pub mod config;
pub mod error;
pub mod health;
pub mod host;
pub mod orchestrator;
pub mod parsers;
pub mod sampler;
pub mod snapshot;
pub mod trend;

pub use actions::{Action, ActionExecutor, ActionId, HostExecutor, Plan};
pub use attribution::{
    ActionTrial, AttributionEngine, AttributionReport, EffectClass, NoopObserver, PrimaryCause,
    TrialObserver,
};
pub use checks::{Check, CheckStatus, Finding};
pub use config::NetDocConfig;
pub use error::{NetDocError, QueryError, Result};
pub use health::{classify, HealthStatus};
pub use host::{Capability, NetworkHost, WindowsHost};
pub use orchestrator::{Orchestrator, RemediationTally, RepairMode};
pub use sampler::{MetricSampler, MetricSource};
pub use snapshot::{Readings, Snapshot, SENTINEL};
pub use trend::{Trend, TrendTracker};
