//! NetDoc Configuration
//!
//! Measurement targets, timeouts, thresholds and scheduling settings.
//!
//! Configuration lives in `<config_dir>/netdoc/config.toml`, or wherever
//! `$NETDOC_CONFIG` points. A missing file means defaults; a malformed file
//! is an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NetDocError, Result};

const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "netdoc";

/// Environment override for the config file location
pub const CONFIG_ENV: &str = "NETDOC_CONFIG";

// ============================================================================
// Measurement targets
// ============================================================================

/// Targets used by the sampler and the diagnostic checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Domain resolved for each snapshot
    #[serde(default = "default_sample_domain")]
    pub sample_domain: String,

    /// Host pinged for each snapshot
    #[serde(default = "default_sample_ping_target")]
    pub sample_ping_target: String,

    /// URL fetched for each snapshot
    #[serde(default = "default_sample_url")]
    pub sample_url: String,

    /// Domains resolved by the DNS resolution check
    #[serde(default = "default_dns_panel")]
    pub dns_panel: Vec<String>,

    /// IP targets pinged by the connectivity check
    #[serde(default = "default_ping_panel")]
    pub ping_panel: Vec<String>,

    /// URLs fetched by the HTTP connectivity check
    #[serde(default = "default_http_panel")]
    pub http_panel: Vec<String>,

    /// Domains whose presence in the hosts file is suspicious
    #[serde(default = "default_hosts_keywords")]
    pub hosts_keywords: Vec<String>,

    /// Provider catalog substrings that suggest traffic interception
    #[serde(default = "default_catalog_keywords")]
    pub catalog_keywords: Vec<String>,

    /// Location of the hosts file
    #[serde(default = "default_hosts_path")]
    pub hosts_path: PathBuf,
}

fn default_sample_domain() -> String {
    "www.baidu.com".to_string()
}

fn default_sample_ping_target() -> String {
    "114.114.114.114".to_string()
}

fn default_sample_url() -> String {
    "http://www.baidu.com".to_string()
}

fn default_dns_panel() -> Vec<String> {
    vec![
        "www.baidu.com".to_string(),
        "www.qq.com".to_string(),
        "www.google.com".to_string(),
    ]
}

fn default_ping_panel() -> Vec<String> {
    vec![
        "114.114.114.114".to_string(),
        "223.5.5.5".to_string(),
        "8.8.8.8".to_string(),
    ]
}

fn default_http_panel() -> Vec<String> {
    vec![
        "http://www.baidu.com".to_string(),
        "https://www.baidu.com".to_string(),
        "http://www.qq.com".to_string(),
    ]
}

fn default_hosts_keywords() -> Vec<String> {
    ["google", "facebook", "youtube", "twitter", "github"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_catalog_keywords() -> Vec<String> {
    ["proxy", "vpn", "hook", "inject", "filter"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_hosts_path() -> PathBuf {
    PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            sample_domain: default_sample_domain(),
            sample_ping_target: default_sample_ping_target(),
            sample_url: default_sample_url(),
            dns_panel: default_dns_panel(),
            ping_panel: default_ping_panel(),
            http_panel: default_http_panel(),
            hosts_keywords: default_hosts_keywords(),
            catalog_keywords: default_catalog_keywords(),
            hosts_path: default_hosts_path(),
        }
    }
}

// ============================================================================
// Timeouts
// ============================================================================

/// Per sub-measurement timeouts in milliseconds (valid: 100-120000)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_dns_ms")]
    pub dns_ms: u64,

    #[serde(default = "default_ping_ms")]
    pub ping_ms: u64,

    #[serde(default = "default_http_ms")]
    pub http_ms: u64,

    /// Reading OS tables (connections, caches, memory)
    #[serde(default = "default_tables_ms")]
    pub tables_ms: u64,

    /// Any collaborator command not covered above
    #[serde(default = "default_command_ms")]
    pub command_ms: u64,
}

fn default_dns_ms() -> u64 {
    3_000
}

fn default_ping_ms() -> u64 {
    3_000
}

fn default_http_ms() -> u64 {
    10_000
}

fn default_tables_ms() -> u64 {
    10_000
}

fn default_command_ms() -> u64 {
    30_000
}

fn clamp_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.clamp(100, 120_000))
}

impl TimeoutConfig {
    pub fn dns(&self) -> Duration {
        clamp_ms(self.dns_ms)
    }

    pub fn ping(&self) -> Duration {
        clamp_ms(self.ping_ms)
    }

    pub fn http(&self) -> Duration {
        clamp_ms(self.http_ms)
    }

    pub fn tables(&self) -> Duration {
        clamp_ms(self.tables_ms)
    }

    pub fn command(&self) -> Duration {
        clamp_ms(self.command_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dns_ms: default_dns_ms(),
            ping_ms: default_ping_ms(),
            http_ms: default_http_ms(),
            tables_ms: default_tables_ms(),
            command_ms: default_command_ms(),
        }
    }
}

// ============================================================================
// Thresholds
// ============================================================================

/// Classifier, advisory and cache-view thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// HTTP response above this is Slow
    #[serde(default = "default_slow_http_ms")]
    pub slow_http_ms: f64,

    /// HTTP response above this is VerySlow
    #[serde(default = "default_very_slow_http_ms")]
    pub very_slow_http_ms: f64,

    /// HTTP response above this triggers the "run optimization" advisory
    #[serde(default = "default_advisory_http_ms")]
    pub advisory_http_ms: f64,

    #[serde(default = "default_advisory_dns_cache")]
    pub advisory_dns_cache: i64,

    #[serde(default = "default_advisory_tcp")]
    pub advisory_tcp_connections: i64,

    #[serde(default = "default_advisory_arp")]
    pub advisory_arp_cache: i64,

    /// Cache status view warning levels
    #[serde(default = "default_warn_dns_cache")]
    pub warn_dns_cache: i64,

    #[serde(default = "default_warn_arp_cache")]
    pub warn_arp_cache: i64,

    #[serde(default = "default_warn_netbios_cache")]
    pub warn_netbios_cache: i64,

    #[serde(default = "default_warn_tcp")]
    pub warn_tcp_connections: i64,
}

fn default_slow_http_ms() -> f64 {
    1500.0
}

fn default_very_slow_http_ms() -> f64 {
    3000.0
}

fn default_advisory_http_ms() -> f64 {
    2000.0
}

fn default_advisory_dns_cache() -> i64 {
    1000
}

fn default_advisory_tcp() -> i64 {
    500
}

fn default_advisory_arp() -> i64 {
    200
}

fn default_warn_dns_cache() -> i64 {
    500
}

fn default_warn_arp_cache() -> i64 {
    100
}

fn default_warn_netbios_cache() -> i64 {
    50
}

fn default_warn_tcp() -> i64 {
    300
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            slow_http_ms: default_slow_http_ms(),
            very_slow_http_ms: default_very_slow_http_ms(),
            advisory_http_ms: default_advisory_http_ms(),
            advisory_dns_cache: default_advisory_dns_cache(),
            advisory_tcp_connections: default_advisory_tcp(),
            advisory_arp_cache: default_advisory_arp(),
            warn_dns_cache: default_warn_dns_cache(),
            warn_arp_cache: default_warn_arp_cache(),
            warn_netbios_cache: default_warn_netbios_cache(),
            warn_tcp_connections: default_warn_tcp(),
        }
    }
}

impl Thresholds {
    /// (Slow, VerySlow) HTTP floors in ascending order
    ///
    /// An inverted pair is swapped; negative or non-finite values fall back
    /// to their defaults.
    fn http_bands(&self) -> (f64, f64) {
        let valid = |v: f64, default: f64| if v.is_finite() && v >= 0.0 { v } else { default };
        let slow = valid(self.slow_http_ms, default_slow_http_ms());
        let very_slow = valid(self.very_slow_http_ms, default_very_slow_http_ms());
        (slow.min(very_slow), slow.max(very_slow))
    }

    pub fn effective_slow_http_ms(&self) -> f64 {
        self.http_bands().0
    }

    pub fn effective_very_slow_http_ms(&self) -> f64 {
        self.http_bands().1
    }
}

// ============================================================================
// Engine, monitor, schedule
// ============================================================================

/// Attribution engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Settle time between applying an action and the post sample (valid: 0-30000)
    #[serde(default = "default_stabilization_ms")]
    pub stabilization_ms: u64,

    /// Snapshots averaged per baseline/post measurement (valid: 1-5)
    #[serde(default = "default_trial_samples")]
    pub trial_samples: usize,
}

fn default_stabilization_ms() -> u64 {
    2_000
}

fn default_trial_samples() -> usize {
    1
}

impl EngineConfig {
    pub fn stabilization(&self) -> Duration {
        Duration::from_millis(self.stabilization_ms.min(30_000))
    }

    pub fn effective_trial_samples(&self) -> usize {
        self.trial_samples.clamp(1, 5)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stabilization_ms: default_stabilization_ms(),
            trial_samples: default_trial_samples(),
        }
    }
}

/// Realtime monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between refreshes (valid: 5-3600)
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_refresh_secs() -> u64 {
    30
}

impl MonitorConfig {
    pub fn effective_refresh_secs(&self) -> u64 {
        self.refresh_secs.clamp(5, 3600)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_refresh_secs(),
        }
    }
}

/// Scheduled background repair settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between unattended runs (valid: 1-1440)
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    /// Name of the OS scheduled task
    #[serde(default = "default_task_name")]
    pub task_name: String,
}

fn default_interval_minutes() -> u32 {
    30
}

fn default_task_name() -> String {
    "NetDocQuickRepair".to_string()
}

impl ScheduleConfig {
    pub fn effective_interval_minutes(&self) -> u32 {
        clamp_interval(self.interval_minutes)
    }
}

/// Clamp a schedule interval to 1-1440 minutes
pub fn clamp_interval(minutes: u32) -> u32 {
    minutes.clamp(1, 1440)
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            task_name: default_task_name(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Complete configuration, passed explicitly to every component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetDocConfig {
    #[serde(default)]
    pub targets: TargetConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl NetDocConfig {
    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from an explicit path, falling back to defaults when absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| NetDocError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write the config as TOML, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| NetDocError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Config file path: `$NETDOC_CONFIG`, else `<config_dir>/netdoc/config.toml`
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    config_dir().join(CONFIG_FILE)
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Directory for logs written by unattended runs
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
