//! Host platform capabilities
//!
//! Everything NetDoc does to, or reads from, the operating system goes
//! through [`NetworkHost`]. Side-effecting operations and table dumps are
//! [`Capability`] values executed by `invoke`; measurements that return a
//! typed value have their own query methods.

pub mod command_exec;
pub mod windows;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::error::QueryError;

pub use command_exec::{CommandResult, ExecutionStatus};
pub use windows::{check_environment, WindowsHost};

/// One OS-level operation NetDoc knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    // Proxy
    DisableProxy,
    ShowWinHttpProxy,
    ResetWinHttpProxy,

    // Name resolution
    FlushDnsCache,
    RegisterDns,
    ShowIpConfig,
    ShowDnsCache,

    // Neighbor / NetBIOS caches
    ShowNeighbors,
    ClearNeighbors,
    ClearNeighborsFallback,
    ShowNetbiosCache,
    ClearNetbiosCache,
    RefreshNetbios,

    // Socket stack
    ShowTcpConnections,
    ShowProviderCatalog,
    ResetProviderCatalog,
    ResetIpStack,
    TuneTcpAutotuning,
    TuneTcpRss,

    // Address lease
    ReleaseLease,
    RenewLease,

    // Misc
    ShowFirewall,
    Restart,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisableProxy => "disable_proxy",
            Self::ShowWinHttpProxy => "show_winhttp_proxy",
            Self::ResetWinHttpProxy => "reset_winhttp_proxy",
            Self::FlushDnsCache => "flush_dns_cache",
            Self::RegisterDns => "register_dns",
            Self::ShowIpConfig => "show_ip_config",
            Self::ShowDnsCache => "show_dns_cache",
            Self::ShowNeighbors => "show_neighbors",
            Self::ClearNeighbors => "clear_neighbors",
            Self::ClearNeighborsFallback => "clear_neighbors_fallback",
            Self::ShowNetbiosCache => "show_netbios_cache",
            Self::ClearNetbiosCache => "clear_netbios_cache",
            Self::RefreshNetbios => "refresh_netbios",
            Self::ShowTcpConnections => "show_tcp_connections",
            Self::ShowProviderCatalog => "show_provider_catalog",
            Self::ResetProviderCatalog => "reset_provider_catalog",
            Self::ResetIpStack => "reset_ip_stack",
            Self::TuneTcpAutotuning => "tune_tcp_autotuning",
            Self::TuneTcpRss => "tune_tcp_rss",
            Self::ReleaseLease => "release_lease",
            Self::RenewLease => "renew_lease",
            Self::ShowFirewall => "show_firewall",
            Self::Restart => "restart",
        }
    }

    /// Whether invoking this capability changes system state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::ShowWinHttpProxy
                | Self::ShowIpConfig
                | Self::ShowDnsCache
                | Self::ShowNeighbors
                | Self::ShowNetbiosCache
                | Self::ShowTcpConnections
                | Self::ShowProviderCatalog
                | Self::ShowFirewall
        )
    }
}

impl Capability {
    /// Read-only table listings whose rows are counted
    pub fn is_table_dump(&self) -> bool {
        matches!(
            self,
            Self::ShowDnsCache | Self::ShowNeighbors | Self::ShowNetbiosCache | Self::ShowTcpConnections
        )
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user browser proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub enabled: bool,
    pub server: Option<String>,
    pub auto_config_url: Option<String>,
    pub bypass: Option<String>,
}

impl ProxySettings {
    /// Enabled with a non-empty server
    pub fn has_active_proxy(&self) -> bool {
        self.enabled
            && self
                .server
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
    }

    /// The state `DisableProxy` leaves behind
    pub fn is_cleared(&self) -> bool {
        !self.enabled && self.server.is_none() && self.auto_config_url.is_none()
    }
}

/// Periodic unattended invocation registered with the OS scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub name: String,
    pub interval_minutes: u32,
    /// Command line the scheduler runs
    pub command: String,
}

/// The OS capability surface
#[async_trait]
pub trait NetworkHost: Send + Sync {
    /// Whether the current process may change network settings
    fn is_elevated(&self) -> bool;

    /// Run one capability and return its raw result
    async fn invoke(&self, capability: Capability) -> CommandResult;

    /// Resolve a hostname to addresses
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, QueryError>;

    /// One ICMP echo, returning the round-trip time in ms
    async fn ping(&self, target: &str, timeout: Duration) -> Result<f64, QueryError>;

    /// One HTTP GET, returning the status code
    async fn http_get(&self, url: &str, timeout: Duration) -> Result<u16, QueryError>;

    async fn proxy_settings(&self) -> Result<ProxySettings, QueryError>;

    async fn read_hosts_file(&self) -> Result<String, QueryError>;

    /// Physical memory in use, 0-100
    fn memory_used_pct(&self) -> Result<f64, QueryError>;

    async fn install_schedule(&self, task: &ScheduledTask) -> CommandResult;

    async fn remove_schedule(&self, name: &str) -> CommandResult;
}
