//! Action Registry
//!
//! Static catalog of idempotent remediation actions. Each action is a short
//! list of host capabilities plus metadata the engine and the orchestrator
//! use to decide when it may run. The registry is never mutated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::host::{Capability, ExecutionStatus, NetworkHost};
use crate::parsers::{self, WinHttpProxy};

// ============================================================================
// Identity and metadata
// ============================================================================

/// Registry action identifier, in registry order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionId {
    FlushDnsCache,
    ClearArpCache,
    ClearNetbiosCache,
    RefreshNetbios,
    DisableProxy,
    #[serde(rename = "reset-winhttp-proxy")]
    ResetWinHttpProxy,
    RegisterDns,
    TuneTcp,
    ResetProviderCatalog,
    ResetIpStack,
    ReleaseRenewLease,
}

impl ActionId {
    pub const ALL: [ActionId; 11] = [
        ActionId::FlushDnsCache,
        ActionId::ClearArpCache,
        ActionId::ClearNetbiosCache,
        ActionId::RefreshNetbios,
        ActionId::DisableProxy,
        ActionId::ResetWinHttpProxy,
        ActionId::RegisterDns,
        ActionId::TuneTcp,
        ActionId::ResetProviderCatalog,
        ActionId::ResetIpStack,
        ActionId::ReleaseRenewLease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlushDnsCache => "flush-dns-cache",
            Self::ClearArpCache => "clear-arp-cache",
            Self::ClearNetbiosCache => "clear-netbios-cache",
            Self::RefreshNetbios => "refresh-netbios",
            Self::DisableProxy => "disable-proxy",
            Self::ResetWinHttpProxy => "reset-winhttp-proxy",
            Self::RegisterDns => "register-dns",
            Self::TuneTcp => "tune-tcp",
            Self::ResetProviderCatalog => "reset-provider-catalog",
            Self::ResetIpStack => "reset-ip-stack",
            Self::ReleaseRenewLease => "release-renew-lease",
        }
    }

    /// Registry entry for this id
    pub fn action(self) -> &'static Action {
        &REGISTRY[self as usize]
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        ActionId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| format!("unknown action: {}", s))
    }
}

/// Part of the network stack an action is expected to affect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectDomain {
    Proxy,
    NameResolution,
    NeighborCache,
    SocketStack,
    AddressLease,
}

impl EffectDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proxy => "proxy",
            Self::NameResolution => "name resolution",
            Self::NeighborCache => "neighbor cache",
            Self::SocketStack => "socket stack",
            Self::AddressLease => "address lease",
        }
    }
}

/// How the outcome of a multi-step action is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Try steps in order, stop at the first success (fallbacks)
    FirstSuccess,
    /// Run every step; succeed if any succeeded
    AnySucceeds,
    /// Run every step; only the last one decides
    FinalDecides,
}

/// State that can be re-read after an action to confirm it took effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostCondition {
    /// Per-user proxy off with no PAC script
    ProxyDisabled,
    /// WinHTTP configured for direct access
    WinHttpDirect,
}

#[derive(Debug)]
pub struct Action {
    pub id: ActionId,
    pub description: &'static str,
    pub domain: EffectDomain,
    pub requires_restart: bool,
    pub reversible: bool,
    /// Drops connectivity while it runs
    pub disruptive: bool,
    /// Safe to trial in isolation by the attribution engine
    pub trialable: bool,
    pub steps: &'static [Capability],
    pub step_mode: StepMode,
    pub post_condition: Option<PostCondition>,
}

static REGISTRY: [Action; 11] = [
    Action {
        id: ActionId::FlushDnsCache,
        description: "Flush DNS resolver cache",
        domain: EffectDomain::NameResolution,
        requires_restart: false,
        reversible: false,
        disruptive: false,
        trialable: true,
        steps: &[Capability::FlushDnsCache],
        step_mode: StepMode::FirstSuccess,
        post_condition: None,
    },
    Action {
        id: ActionId::ClearArpCache,
        description: "Clear ARP cache",
        domain: EffectDomain::NeighborCache,
        requires_restart: false,
        reversible: false,
        disruptive: false,
        trialable: true,
        steps: &[Capability::ClearNeighbors, Capability::ClearNeighborsFallback],
        step_mode: StepMode::FirstSuccess,
        post_condition: None,
    },
    Action {
        id: ActionId::ClearNetbiosCache,
        description: "Purge NetBIOS name cache",
        domain: EffectDomain::NameResolution,
        requires_restart: false,
        reversible: false,
        disruptive: false,
        trialable: true,
        steps: &[Capability::ClearNetbiosCache],
        step_mode: StepMode::FirstSuccess,
        post_condition: None,
    },
    Action {
        id: ActionId::RefreshNetbios,
        description: "Refresh NetBIOS name registration",
        domain: EffectDomain::NameResolution,
        requires_restart: false,
        reversible: false,
        disruptive: false,
        trialable: true,
        steps: &[Capability::RefreshNetbios],
        step_mode: StepMode::FirstSuccess,
        post_condition: None,
    },
    Action {
        id: ActionId::DisableProxy,
        description: "Disable system proxy and PAC script",
        domain: EffectDomain::Proxy,
        requires_restart: false,
        reversible: true,
        disruptive: false,
        trialable: true,
        steps: &[Capability::DisableProxy],
        step_mode: StepMode::FirstSuccess,
        post_condition: Some(PostCondition::ProxyDisabled),
    },
    Action {
        id: ActionId::ResetWinHttpProxy,
        description: "Reset WinHTTP proxy to direct access",
        domain: EffectDomain::Proxy,
        requires_restart: false,
        reversible: true,
        disruptive: false,
        trialable: true,
        steps: &[Capability::ResetWinHttpProxy],
        step_mode: StepMode::FirstSuccess,
        post_condition: Some(PostCondition::WinHttpDirect),
    },
    Action {
        id: ActionId::RegisterDns,
        description: "Re-register DNS names",
        domain: EffectDomain::NameResolution,
        requires_restart: false,
        reversible: false,
        disruptive: false,
        trialable: false,
        steps: &[Capability::RegisterDns],
        step_mode: StepMode::FirstSuccess,
        post_condition: None,
    },
    Action {
        id: ActionId::TuneTcp,
        description: "Tune TCP global parameters",
        domain: EffectDomain::SocketStack,
        requires_restart: false,
        reversible: true,
        disruptive: false,
        trialable: false,
        steps: &[Capability::TuneTcpAutotuning, Capability::TuneTcpRss],
        step_mode: StepMode::AnySucceeds,
        post_condition: None,
    },
    Action {
        id: ActionId::ResetProviderCatalog,
        description: "Reset Winsock catalog",
        domain: EffectDomain::SocketStack,
        requires_restart: true,
        reversible: false,
        disruptive: false,
        trialable: false,
        steps: &[Capability::ResetProviderCatalog],
        step_mode: StepMode::FirstSuccess,
        post_condition: None,
    },
    Action {
        id: ActionId::ResetIpStack,
        description: "Reset TCP/IP stack",
        domain: EffectDomain::SocketStack,
        requires_restart: true,
        reversible: false,
        disruptive: false,
        trialable: false,
        steps: &[Capability::ResetIpStack],
        step_mode: StepMode::FirstSuccess,
        post_condition: None,
    },
    Action {
        id: ActionId::ReleaseRenewLease,
        description: "Release and renew DHCP lease",
        domain: EffectDomain::AddressLease,
        requires_restart: false,
        reversible: false,
        disruptive: true,
        trialable: false,
        steps: &[Capability::ReleaseLease, Capability::RenewLease],
        step_mode: StepMode::FinalDecides,
        post_condition: None,
    },
];

/// The whole registry, in registry order
pub fn registry() -> &'static [Action] {
    &REGISTRY
}

/// Actions the attribution engine trials, in registry order
pub fn candidates() -> Vec<ActionId> {
    REGISTRY
        .iter()
        .filter(|a| a.trialable && !a.requires_restart && !a.disruptive)
        .map(|a| a.id)
        .collect()
}

// ============================================================================
// Fixed plans
// ============================================================================

/// Fixed action sequences offered by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Plan {
    /// Low-risk, no-restart subset
    Quick,
    /// Complete list, two actions need a restart
    Full,
    /// Cache bloat set
    Optimize,
    /// Cache bloat set plus NetBIOS refresh and TCP tuning
    FullOptimize,
    ProxyOnly,
    CatalogOnly,
}

impl Plan {
    pub fn actions(&self) -> &'static [ActionId] {
        match self {
            Self::Quick => &[
                ActionId::DisableProxy,
                ActionId::ResetWinHttpProxy,
                ActionId::FlushDnsCache,
            ],
            Self::Full => &[
                ActionId::DisableProxy,
                ActionId::ResetWinHttpProxy,
                ActionId::FlushDnsCache,
                ActionId::RegisterDns,
                ActionId::ResetProviderCatalog,
                ActionId::ResetIpStack,
                ActionId::ReleaseRenewLease,
            ],
            Self::Optimize => &[
                ActionId::FlushDnsCache,
                ActionId::ClearArpCache,
                ActionId::ClearNetbiosCache,
            ],
            Self::FullOptimize => &[
                ActionId::FlushDnsCache,
                ActionId::ClearArpCache,
                ActionId::ClearNetbiosCache,
                ActionId::RefreshNetbios,
                ActionId::TuneTcp,
            ],
            Self::ProxyOnly => &[ActionId::DisableProxy, ActionId::ResetWinHttpProxy],
            Self::CatalogOnly => &[ActionId::ResetProviderCatalog],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Quick => "quick repair",
            Self::Full => "full repair",
            Self::Optimize => "quick optimize",
            Self::FullOptimize => "full optimize",
            Self::ProxyOnly => "proxy reset",
            Self::CatalogOnly => "Winsock reset",
        }
    }

    /// Successes needed before the plan as a whole is reported as working
    pub fn min_successes(&self) -> usize {
        match self {
            Self::Quick => 2,
            Self::Full => 3,
            other => other.actions().len().div_ceil(2),
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

/// One capability step of an applied action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub capability: Capability,
    pub status: ExecutionStatus,
    pub duration_ms: u64,
}

/// Result of applying one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub applied: bool,
    /// Reason for the failure when `applied` is false
    pub error: Option<String>,
    pub steps: Vec<StepRecord>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            applied: true,
            error: None,
            steps: Vec::new(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            applied: false,
            error: Some(reason.into()),
            steps: Vec::new(),
        }
    }
}

/// Applies actions and reads back their post-conditions
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Whether actions may change system state at all
    fn is_elevated(&self) -> bool;

    async fn apply(&self, action: &Action) -> ActionOutcome;

    /// `Some(true)` if the condition holds, `None` if it cannot be read
    async fn verify(&self, condition: PostCondition) -> Option<bool>;
}

/// Executor backed by a [`NetworkHost`]
pub struct HostExecutor {
    host: Arc<dyn NetworkHost>,
}

impl HostExecutor {
    pub fn new(host: Arc<dyn NetworkHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl ActionExecutor for HostExecutor {
    fn is_elevated(&self) -> bool {
        self.host.is_elevated()
    }

    async fn apply(&self, action: &Action) -> ActionOutcome {
        info!("Applying {}", action.id);

        let mut steps = Vec::with_capacity(action.steps.len());
        let mut any_success = false;
        let mut last_error: Option<String> = None;
        let mut last_success = false;

        for capability in action.steps {
            let result = self.host.invoke(*capability).await;
            steps.push(StepRecord {
                capability: *capability,
                status: result.status,
                duration_ms: result.duration_ms,
            });

            last_success = result.success();
            if last_success {
                any_success = true;
                if action.step_mode == StepMode::FirstSuccess {
                    break;
                }
            } else {
                debug!("{} step {} failed: {}", action.id, capability, result.failure_reason());
                last_error = Some(format!("{}: {}", capability, result.failure_reason()));
            }
        }

        let applied = match action.step_mode {
            StepMode::FirstSuccess | StepMode::AnySucceeds => any_success,
            StepMode::FinalDecides => last_success,
        };

        if !applied {
            warn!("{} failed", action.id);
        }

        ActionOutcome {
            applied,
            error: if applied { None } else { last_error.or(Some("no steps".to_string())) },
            steps,
        }
    }

    async fn verify(&self, condition: PostCondition) -> Option<bool> {
        match condition {
            PostCondition::ProxyDisabled => match self.host.proxy_settings().await {
                Ok(settings) => Some(!settings.enabled && settings.auto_config_url.is_none()),
                Err(e) => {
                    debug!("proxy verification unreadable: {}", e);
                    None
                }
            },
            PostCondition::WinHttpDirect => {
                let result = self.host.invoke(Capability::ShowWinHttpProxy).await;
                if !result.success() {
                    return None;
                }
                match parsers::parse_winhttp(&result.stdout) {
                    WinHttpProxy::Direct => Some(true),
                    WinHttpProxy::Proxy(_) => Some(false),
                    WinHttpProxy::Unknown => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_indexed_by_id() {
        for (i, action) in registry().iter().enumerate() {
            assert_eq!(action.id as usize, i, "{} out of place", action.id);
            assert_eq!(ActionId::ALL[i], action.id);
            assert!(!action.steps.is_empty());
        }
        assert_eq!(ActionId::DisableProxy.action().id, ActionId::DisableProxy);
    }

    #[test]
    fn test_candidates() {
        assert_eq!(
            candidates(),
            vec![
                ActionId::FlushDnsCache,
                ActionId::ClearArpCache,
                ActionId::ClearNetbiosCache,
                ActionId::RefreshNetbios,
                ActionId::DisableProxy,
                ActionId::ResetWinHttpProxy,
            ]
        );
        for id in candidates() {
            let action = id.action();
            assert!(!action.requires_restart && !action.disruptive);
        }
    }

    #[test]
    fn test_plans() {
        assert_eq!(Plan::Quick.actions().len(), 3);
        assert_eq!(Plan::Full.actions().len(), 7);
        let restart: Vec<_> = Plan::Full
            .actions()
            .iter()
            .filter(|id| id.action().requires_restart)
            .collect();
        assert_eq!(restart, vec![&ActionId::ResetProviderCatalog, &ActionId::ResetIpStack]);
        assert!(Plan::Quick.actions().iter().all(|id| !id.action().requires_restart));
        assert_eq!(Plan::Optimize.min_successes(), 2);
        assert_eq!(Plan::CatalogOnly.min_successes(), 1);
    }

    #[test]
    fn test_full_optimize_extends_optimize() {
        let full = Plan::FullOptimize.actions();
        assert!(Plan::Optimize.actions().iter().all(|id| full.contains(id)));
        assert_eq!(&full[3..], &[ActionId::RefreshNetbios, ActionId::TuneTcp]);
        assert!(full.iter().all(|id| !id.action().requires_restart));
        assert_eq!(Plan::FullOptimize.min_successes(), 3);
    }

    #[test]
    fn test_action_id_parse() {
        assert_eq!("disable-proxy".parse::<ActionId>(), Ok(ActionId::DisableProxy));
        assert_eq!("FLUSH_DNS_CACHE".parse::<ActionId>(), Ok(ActionId::FlushDnsCache));
        assert!("reboot".parse::<ActionId>().is_err());
        for id in ActionId::ALL {
            assert_eq!(id.as_str().parse::<ActionId>(), Ok(id));
        }
    }

    #[test]
    fn test_action_id_serde() {
        let json = serde_json::to_string(&ActionId::ResetWinHttpProxy).unwrap();
        assert_eq!(json, "\"reset-winhttp-proxy\"");
        for id in ActionId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
    }
}
