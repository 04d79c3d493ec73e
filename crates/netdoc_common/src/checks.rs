//! Diagnostic Check Set
//!
//! Independent checks, each producing exactly one [`Finding`]. A query that
//! fails inside a check becomes an `Error` finding; checks never abort.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::ActionId;
use crate::config::NetDocConfig;
use crate::host::{Capability, NetworkHost};
use crate::parsers::{self, WinHttpProxy};

/// Most suspicious hosts-file lines listed in a finding
const MAX_SUSPICIOUS_LINES: usize = 5;

/// Custom hosts-file entries beyond which the file is flagged as crowded
const HOSTS_ENTRY_LIMIT: usize = 50;

// ============================================================================
// Finding
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
    Info,
}

impl CheckStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Warning => "[WARN]",
            Self::Error => "[FAIL]",
            Self::Info => "[INFO]",
        }
    }

    pub fn is_issue(&self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub check_name: String,
    pub status: CheckStatus,
    pub message: String,
    pub details: Vec<String>,
    pub fix_available: bool,
    /// Registry action that repairs this finding, when a single one does
    pub fix_action: Option<ActionId>,
}

impl Finding {
    pub fn new(check: Check, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            check_name: check.name().to_string(),
            status,
            message: message.into(),
            details: Vec::new(),
            fix_available: false,
            fix_action: None,
        }
    }

    pub fn ok(check: Check, message: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Ok, message)
    }

    pub fn warning(check: Check, message: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Warning, message)
    }

    pub fn error(check: Check, message: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Error, message)
    }

    pub fn info(check: Check, message: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Info, message)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    /// Mark as repairable by a specific registry action
    pub fn with_fix(mut self, action: ActionId) -> Self {
        self.fix_available = true;
        self.fix_action = Some(action);
        self
    }

    /// Mark as repairable only by a broad repair plan
    pub fn with_general_fix(mut self) -> Self {
        self.fix_available = true;
        self.fix_action = None;
        self
    }
}

/// Number of findings that are warnings or errors
pub fn issue_count(findings: &[Finding]) -> usize {
    findings.iter().filter(|f| f.status.is_issue()).count()
}

/// Whether auto-repair should be offered for these findings
pub fn repair_offered(findings: &[Finding]) -> bool {
    issue_count(findings) > 0
}

// ============================================================================
// Checks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Check {
    ProxySettings,
    WinHttpProxy,
    ProviderCatalog,
    DnsConfiguration,
    DnsResolution,
    HostsFile,
    NetworkAdapters,
    Connectivity,
    HttpConnectivity,
    Firewall,
}

/// The fixed check list, in run order
pub fn default_checks() -> Vec<Check> {
    vec![
        Check::ProxySettings,
        Check::WinHttpProxy,
        Check::ProviderCatalog,
        Check::DnsConfiguration,
        Check::DnsResolution,
        Check::HostsFile,
        Check::NetworkAdapters,
        Check::Connectivity,
        Check::HttpConnectivity,
        Check::Firewall,
    ]
}

fn output_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProxySettings => "System proxy settings",
            Self::WinHttpProxy => "WinHTTP proxy",
            Self::ProviderCatalog => "Winsock catalog",
            Self::DnsConfiguration => "DNS configuration",
            Self::DnsResolution => "DNS resolution",
            Self::HostsFile => "Hosts file",
            Self::NetworkAdapters => "Network adapters",
            Self::Connectivity => "Basic connectivity",
            Self::HttpConnectivity => "HTTP connectivity",
            Self::Firewall => "Firewall",
        }
    }

    /// Progress text shown while the check runs
    pub fn progress_label(&self) -> &'static str {
        match self {
            Self::ProxySettings => "Checking system proxy settings",
            Self::WinHttpProxy => "Checking WinHTTP proxy",
            Self::ProviderCatalog => "Checking Winsock catalog",
            Self::DnsConfiguration => "Checking DNS configuration",
            Self::DnsResolution => "Testing DNS resolution",
            Self::HostsFile => "Checking hosts file",
            Self::NetworkAdapters => "Checking network adapters",
            Self::Connectivity => "Testing connectivity",
            Self::HttpConnectivity => "Testing HTTP connectivity",
            Self::Firewall => "Checking firewall state",
        }
    }

    pub async fn run(&self, host: &dyn NetworkHost, config: &NetDocConfig) -> Finding {
        debug!("Running check: {}", self.name());
        match self {
            Self::ProxySettings => check_proxy(host).await,
            Self::WinHttpProxy => check_winhttp(host).await,
            Self::ProviderCatalog => check_catalog(host, config).await,
            Self::DnsConfiguration => check_dns_config(host).await,
            Self::DnsResolution => check_dns_resolution(host, config).await,
            Self::HostsFile => check_hosts(host, config).await,
            Self::NetworkAdapters => check_adapters(host).await,
            Self::Connectivity => check_connectivity(host, config).await,
            Self::HttpConnectivity => check_http(host, config).await,
            Self::Firewall => check_firewall(host).await,
        }
    }
}

/// Run checks in order, reporting each before it starts
pub async fn run_checks<F>(
    checks: &[Check],
    host: &dyn NetworkHost,
    config: &NetDocConfig,
    mut on_start: F,
) -> Vec<Finding>
where
    F: FnMut(Check),
{
    let mut findings = Vec::with_capacity(checks.len());
    for check in checks {
        on_start(*check);
        findings.push(check.run(host, config).await);
    }
    findings
}

// ============================================================================
// Individual checks
// ============================================================================

async fn check_proxy(host: &dyn NetworkHost) -> Finding {
    let check = Check::ProxySettings;
    let settings = match host.proxy_settings().await {
        Ok(s) => s,
        Err(e) => return Finding::error(check, format!("Cannot read proxy settings: {}", e)),
    };

    let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "none".to_string());
    let details = vec![
        format!("Proxy enabled: {}", if settings.enabled { "yes" } else { "no" }),
        format!("Proxy server: {}", or_none(&settings.server)),
        format!("PAC script: {}", or_none(&settings.auto_config_url)),
        format!("Bypass list: {}", or_none(&settings.bypass)),
    ];

    if settings.has_active_proxy() {
        Finding::warning(check, "System proxy is enabled; some programs may lose connectivity")
            .with_details(details)
            .with_fix(ActionId::DisableProxy)
    } else if settings.auto_config_url.is_some() {
        Finding::info(check, "A PAC auto-configuration script is set; confirm it is needed")
            .with_details(details)
            .with_fix(ActionId::DisableProxy)
    } else {
        Finding::ok(check, "System proxy is not enabled").with_details(details)
    }
}

async fn check_winhttp(host: &dyn NetworkHost) -> Finding {
    let check = Check::WinHttpProxy;
    let result = host.invoke(Capability::ShowWinHttpProxy).await;
    if !result.success() {
        return Finding::error(
            check,
            format!("Cannot read WinHTTP proxy: {}", result.failure_reason()),
        );
    }

    let details = output_lines(&result.stdout);
    match parsers::parse_winhttp(&result.stdout) {
        WinHttpProxy::Direct => {
            Finding::ok(check, "WinHTTP uses direct access (no proxy)").with_details(details)
        }
        WinHttpProxy::Proxy(server) => Finding::warning(
            check,
            format!("WinHTTP proxy {} is set; system-level requests may fail", server),
        )
        .with_details(details)
        .with_fix(ActionId::ResetWinHttpProxy),
        WinHttpProxy::Unknown => {
            Finding::info(check, "WinHTTP proxy state not recognized").with_details(details)
        }
    }
}

async fn check_catalog(host: &dyn NetworkHost, config: &NetDocConfig) -> Finding {
    let check = Check::ProviderCatalog;
    let result = host.invoke(Capability::ShowProviderCatalog).await;
    if !result.success() || result.stdout.trim().is_empty() {
        let reason = if result.success() {
            "empty output".to_string()
        } else {
            result.failure_reason()
        };
        return Finding::error(check, "Cannot read the Winsock catalog")
            .with_detail(reason)
            .with_fix(ActionId::ResetProviderCatalog);
    }

    let scan = parsers::scan_provider_catalog(&result.stdout, &config.targets.catalog_keywords);
    let detail = format!("{} catalog entries", scan.entries);
    if scan.suspicious.is_empty() {
        Finding::ok(check, "Winsock catalog looks normal").with_detail(detail)
    } else {
        Finding::warning(
            check,
            format!(
                "Third-party providers that may intercept traffic: {}",
                scan.suspicious.join(", ")
            ),
        )
        .with_detail(detail)
        .with_fix(ActionId::ResetProviderCatalog)
    }
}

async fn check_dns_config(host: &dyn NetworkHost) -> Finding {
    let check = Check::DnsConfiguration;
    let result = host.invoke(Capability::ShowIpConfig).await;
    if !result.success() {
        return Finding::error(
            check,
            format!("Cannot read adapter configuration: {}", result.failure_reason()),
        );
    }

    let servers = parsers::parse_dns_servers(&result.stdout);
    if servers.is_empty() {
        Finding::error(check, "No DNS servers configured on any connected adapter")
            .with_detail("DNS servers: none")
            .with_fix(ActionId::RegisterDns)
    } else {
        Finding::ok(check, format!("{} DNS server(s) configured", servers.len()))
            .with_detail(format!("DNS servers: {}", servers.join(", ")))
    }
}

async fn check_dns_resolution(host: &dyn NetworkHost, config: &NetDocConfig) -> Finding {
    let check = Check::DnsResolution;
    let domains = &config.targets.dns_panel;
    let timeout = config.timeouts.dns();

    let mut details = Vec::with_capacity(domains.len());
    let mut failed = 0;
    for domain in domains {
        match tokio::time::timeout(timeout, host.resolve(domain)).await {
            Ok(Ok(addrs)) => {
                let first = addrs.first().map(|a| a.to_string()).unwrap_or_default();
                details.push(format!("{}: {}", domain, first));
            }
            Ok(Err(e)) => {
                failed += 1;
                details.push(format!("{}: failed ({})", domain, e));
            }
            Err(_) => {
                failed += 1;
                details.push(format!("{}: timed out", domain));
            }
        }
    }

    if domains.is_empty() || failed == domains.len() {
        Finding::error(check, "DNS resolution failed for every domain; likely the main problem")
            .with_details(details)
            .with_fix(ActionId::FlushDnsCache)
    } else if failed > 0 {
        Finding::warning(
            check,
            format!("Some domains failed to resolve ({}/{})", failed, domains.len()),
        )
        .with_details(details)
        .with_fix(ActionId::FlushDnsCache)
    } else {
        Finding::ok(check, "DNS resolution works").with_details(details)
    }
}

async fn check_hosts(host: &dyn NetworkHost, config: &NetDocConfig) -> Finding {
    let check = Check::HostsFile;
    let content = match host.read_hosts_file().await {
        Ok(c) => c,
        Err(e) => return Finding::error(check, format!("Cannot read hosts file: {}", e)),
    };

    let scan = parsers::scan_hosts_file(&content, &config.targets.hosts_keywords);
    let mut details = vec![format!("Custom entries: {}", scan.entries)];

    if !scan.suspicious.is_empty() {
        details.push("Suspicious entries:".to_string());
        details.extend(
            scan.suspicious
                .iter()
                .take(MAX_SUSPICIOUS_LINES)
                .map(|l| format!("  {}", l)),
        );
        // No registry action edits the hosts file
        Finding::warning(
            check,
            format!("{} hosts entries may affect connectivity", scan.suspicious.len()),
        )
        .with_details(details)
    } else if scan.entries > HOSTS_ENTRY_LIMIT {
        Finding::warning(check, format!("Hosts file has many entries ({})", scan.entries))
            .with_details(details)
    } else {
        Finding::ok(check, "Hosts file looks normal").with_details(details)
    }
}

async fn check_adapters(host: &dyn NetworkHost) -> Finding {
    let check = Check::NetworkAdapters;
    let result = host.invoke(Capability::ShowIpConfig).await;
    if !result.success() {
        return Finding::error(
            check,
            format!("Cannot list adapters: {}", result.failure_reason()),
        );
    }

    let adapters = parsers::adapters_with_ipv4(&result.stdout);
    let mut details = vec![format!("Active adapters: {}", adapters.len())];
    details.extend(adapters.iter().take(5).cloned());

    if adapters.is_empty() {
        Finding::error(check, "No active network adapter with an IPv4 address")
            .with_details(details)
            .with_fix(ActionId::ReleaseRenewLease)
    } else {
        Finding::ok(check, format!("{} active network adapter(s)", adapters.len()))
            .with_details(details)
    }
}

async fn check_connectivity(host: &dyn NetworkHost, config: &NetDocConfig) -> Finding {
    let check = Check::Connectivity;
    let targets = &config.targets.ping_panel;
    let timeout = config.timeouts.ping();

    let mut details = Vec::with_capacity(targets.len());
    let mut reachable = 0;
    for target in targets {
        match host.ping(target, timeout).await {
            Ok(rtt) => {
                reachable += 1;
                details.push(format!("{}: reachable ({:.0} ms)", target, rtt));
            }
            Err(_) => details.push(format!("{}: unreachable", target)),
        }
    }

    if reachable == 0 {
        Finding::error(check, "No test target is reachable; check the network connection")
            .with_details(details)
    } else if reachable < targets.len() {
        Finding::warning(
            check,
            format!("Some targets reachable ({}/{})", reachable, targets.len()),
        )
        .with_details(details)
    } else {
        Finding::ok(check, "Connectivity is normal").with_details(details)
    }
}

async fn check_http(host: &dyn NetworkHost, config: &NetDocConfig) -> Finding {
    let check = Check::HttpConnectivity;
    let urls = &config.targets.http_panel;
    let timeout = config.timeouts.http();

    let mut details = Vec::with_capacity(urls.len());
    let mut success = 0;
    for url in urls {
        match host.http_get(url, timeout).await {
            Ok(200) => {
                success += 1;
                details.push(format!("{}: ok (status 200)", url));
            }
            Ok(code) => details.push(format!("{}: unexpected status {}", url, code)),
            Err(e) => details.push(format!("{}: failed ({})", url, e)),
        }
    }

    if success == 0 {
        Finding::error(check, "Every HTTP request failed; this is the key symptom")
            .with_details(details)
            .with_general_fix()
    } else if success < urls.len() {
        Finding::warning(
            check,
            format!("Some HTTP requests failed ({}/{} ok)", success, urls.len()),
        )
        .with_details(details)
        .with_general_fix()
    } else {
        Finding::ok(check, "HTTP connectivity is normal").with_details(details)
    }
}

async fn check_firewall(host: &dyn NetworkHost) -> Finding {
    let check = Check::Firewall;
    let result = host.invoke(Capability::ShowFirewall).await;
    if result.success() {
        Finding::info(check, "Firewall profile state").with_details(output_lines(&result.stdout))
    } else {
        Finding::warning(check, "Cannot read firewall state")
            .with_detail(result.failure_reason())
    }
}
