//! Parsers for collaborator command output
//!
//! Pure functions over the text printed by `ping`, `ipconfig`, `arp`,
//! `nbtstat`, `netstat`, `netsh` and `reg`, plus the hosts file. Both the
//! English and the Simplified Chinese Windows wordings are recognized.

use regex::Regex;
use std::net::IpAddr;
use std::sync::OnceLock;

use crate::host::ProxySettings;

// ============================================================================
// Patterns
// ============================================================================

fn ping_time_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:time|时间)\s*([=<])\s*(\d+(?:\.\d+)?)\s*(?:ms|毫秒)").ok())
        .as_ref()
}

fn arp_entry_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*\d{1,3}(?:\.\d{1,3}){3}\s+[0-9a-f]{2}(?:[-:][0-9a-f]{2}){5}\s").ok()
    })
    .as_ref()
}

fn netbios_entry_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[0-9A-Fa-f]{2}>").ok()).as_ref()
}

fn reg_value_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+(\S+)\s+(REG_\w+)\s*(.*)$").ok())
        .as_ref()
}

// ============================================================================
// ping
// ============================================================================

/// Round-trip time of the first reply, in ms
///
/// `time<1ms` is reported as 1.
pub fn parse_ping_rtt(output: &str) -> Option<f64> {
    let caps = ping_time_re()?.captures(output)?;
    caps.get(2)?.as_str().parse::<f64>().ok()
}

/// Whether a ping transcript contains an echo reply
pub fn ping_reachable(output: &str) -> bool {
    output.to_ascii_uppercase().contains("TTL=")
}

// ============================================================================
// Table counts
// ============================================================================

/// Records in `ipconfig /displaydns`
pub fn count_dns_cache_records(output: &str) -> i64 {
    (output.matches("Record Name").count() + output.matches("记录名称").count()) as i64
}

/// Neighbor entries in `arp -a`
pub fn count_arp_entries(output: &str) -> i64 {
    match arp_entry_re() {
        Some(re) => output.lines().filter(|l| re.is_match(l)).count() as i64,
        None => 0,
    }
}

/// Cached names in `nbtstat -c`
pub fn count_netbios_entries(output: &str) -> i64 {
    match netbios_entry_re() {
        Some(re) => output.lines().filter(|l| re.is_match(l)).count() as i64,
        None => 0,
    }
}

fn tcp_rows(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter(|l| l.trim_start().starts_with("TCP"))
}

/// TCP rows in `netstat -an`
pub fn count_tcp_connections(output: &str) -> i64 {
    tcp_rows(output).count() as i64
}

/// TCP rows per connection state, most frequent first (ties by name)
pub fn tcp_state_counts(output: &str) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in tcp_rows(output) {
        let parts: Vec<&str> = row.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let state = parts[parts.len() - 1];
        match counts.iter_mut().find(|(s, _)| s.as_str() == state) {
            Some((_, n)) => *n += 1,
            None => counts.push((state.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

// ============================================================================
// ipconfig /all
// ============================================================================

/// One adapter section of `ipconfig` output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterSection {
    pub name: String,
    pub connected: bool,
    pub has_ipv4: bool,
    pub dns_servers: Vec<String>,
    pub gateways: Vec<String>,
}

/// Multi-line `ipconfig` field whose continuation lines are being read
#[derive(Clone, Copy, PartialEq, Eq)]
enum ListField {
    None,
    DnsServers,
    Gateways,
}

fn is_adapter_header(line: &str) -> bool {
    !line.starts_with(' ')
        && !line.starts_with('\t')
        && line.trim_end().ends_with(':')
        && (line.to_lowercase().contains("adapter") || line.contains("适配器"))
}

fn split_field(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim().trim_end_matches(['.', ' ']), value.trim()))
}

fn as_address(text: &str) -> Option<String> {
    let bare = text.trim().split('%').next()?;
    let bare = bare.trim_end_matches("(Preferred)").trim_end_matches("(首选)");
    bare.parse::<IpAddr>().ok().map(|_| bare.to_string())
}

/// Split `ipconfig` / `ipconfig /all` output into adapter sections
pub fn parse_adapters(output: &str) -> Vec<AdapterSection> {
    let mut sections: Vec<AdapterSection> = Vec::new();
    let mut list = ListField::None;

    for line in output.lines() {
        if is_adapter_header(line) {
            sections.push(AdapterSection {
                name: line.trim().trim_end_matches(':').to_string(),
                connected: true,
                ..Default::default()
            });
            list = ListField::None;
            continue;
        }

        let Some(current) = sections.last_mut() else {
            continue;
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            list = ListField::None;
            continue;
        }

        if line.contains(" : ") || line.contains(". :") {
            list = ListField::None;
            let Some((key, value)) = split_field(line) else {
                continue;
            };

            if key.contains("Media State") || key.contains("媒体状态") {
                if value.contains("disconnected") || value.contains("断开") {
                    current.connected = false;
                }
            } else if key.contains("IPv4") || key.contains("IP Address") || key.contains("IP 地址") {
                current.has_ipv4 = true;
            } else if key.contains("DNS Servers") || key.contains("DNS 服务器") {
                list = ListField::DnsServers;
                current.dns_servers.extend(as_address(value));
            } else if key.contains("Default Gateway") || key.contains("默认网关") {
                list = ListField::Gateways;
                current.gateways.extend(as_address(value));
            }
        } else if list != ListField::None {
            match (as_address(trimmed), list) {
                (Some(addr), ListField::DnsServers) => current.dns_servers.push(addr),
                (Some(addr), ListField::Gateways) => current.gateways.push(addr),
                _ => list = ListField::None,
            }
        }
    }

    sections
}

/// DNS servers configured on adapters that are up, deduplicated in order
pub fn parse_dns_servers(output: &str) -> Vec<String> {
    let mut servers: Vec<String> = Vec::new();
    for adapter in parse_adapters(output).into_iter().filter(|a| a.connected) {
        for server in adapter.dns_servers {
            if !servers.contains(&server) {
                servers.push(server);
            }
        }
    }
    servers
}

/// Default gateways of adapters that are up, deduplicated in order
pub fn default_gateways(output: &str) -> Vec<String> {
    let mut gateways: Vec<String> = Vec::new();
    for adapter in parse_adapters(output).into_iter().filter(|a| a.connected) {
        for gateway in adapter.gateways {
            if !gateways.contains(&gateway) {
                gateways.push(gateway);
            }
        }
    }
    gateways
}

/// Names of adapters that hold an IPv4 address
pub fn adapters_with_ipv4(output: &str) -> Vec<String> {
    parse_adapters(output)
        .into_iter()
        .filter(|a| a.has_ipv4)
        .map(|a| a.name)
        .collect()
}

// ============================================================================
// netsh
// ============================================================================

/// System-level (WinHTTP) proxy state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WinHttpProxy {
    Direct,
    Proxy(String),
    Unknown,
}

/// Interpret `netsh winhttp show proxy`
pub fn parse_winhttp(output: &str) -> WinHttpProxy {
    if output.contains("Direct access") || output.contains("直接访问") {
        return WinHttpProxy::Direct;
    }

    output
        .lines()
        .find(|l| l.contains("Proxy Server") || l.contains("代理服务器"))
        .map(|l| {
            let server = split_field(l).map(|(_, v)| v.to_string()).unwrap_or_default();
            WinHttpProxy::Proxy(server)
        })
        .unwrap_or(WinHttpProxy::Unknown)
}

/// Result of scanning the socket provider catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogScan {
    pub entries: usize,
    /// Keywords found, in keyword order
    pub suspicious: Vec<String>,
}

/// Scan `netsh winsock show catalog` for interception keywords
pub fn scan_provider_catalog(output: &str, keywords: &[String]) -> CatalogScan {
    let entries = output
        .lines()
        .filter(|l| l.contains("Winsock Catalog") || l.contains("Winsock 目录"))
        .count();
    let lower = output.to_lowercase();
    let suspicious = keywords
        .iter()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .cloned()
        .collect();

    CatalogScan {
        entries,
        suspicious,
    }
}

// ============================================================================
// hosts file
// ============================================================================

/// Result of scanning the hosts file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostsScan {
    /// Non-comment, non-blank lines
    pub entries: usize,
    /// Lines that mention a watched domain
    pub suspicious: Vec<String>,
}

pub fn scan_hosts_file(content: &str, keywords: &[String]) -> HostsScan {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let suspicious = lines
        .iter()
        .filter(|l| {
            let lower = l.to_lowercase();
            keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
        })
        .map(|l| l.to_string())
        .collect();

    HostsScan {
        entries: lines.len(),
        suspicious,
    }
}

// ============================================================================
// reg query
// ============================================================================

/// Interpret `reg query` of the Internet Settings key
pub fn parse_internet_settings(output: &str) -> ProxySettings {
    let mut settings = ProxySettings::default();
    let Some(re) = reg_value_re() else {
        return settings;
    };

    for line in output.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let value = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
        let non_empty = (!value.is_empty()).then(|| value.to_string());

        match name {
            "ProxyEnable" => settings.enabled = parse_reg_dword(value).unwrap_or(0) != 0,
            "ProxyServer" => settings.server = non_empty,
            "AutoConfigURL" => settings.auto_config_url = non_empty,
            "ProxyOverride" => settings.bypass = non_empty,
            _ => {}
        }
    }

    settings
}

fn parse_reg_dword(value: &str) -> Option<u32> {
    match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}
