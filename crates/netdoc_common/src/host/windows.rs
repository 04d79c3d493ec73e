//! Windows implementation of the capability surface
//!
//! Built on the stock Windows utilities (`ipconfig`, `netsh`, `arp`,
//! `nbtstat`, `netstat`, `reg`, `schtasks`, `shutdown`, `ping`). On other
//! platforms the same code compiles and every command reports
//! `CommandNotFound`, which callers treat as an ordinary failure;
//! [`check_environment`] lets a caller refuse up front instead.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::command_exec::{self, CommandResult};
use super::{Capability, NetworkHost, ProxySettings, ScheduledTask};
use crate::config::{NetDocConfig, TimeoutConfig};
use crate::error::{NetDocError, QueryError};
use crate::parsers;

const INTERNET_SETTINGS_KEY: &str =
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings";

/// DHCP renewal waits for a server; never give it less than this
const RENEW_MIN_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = "Mozilla/5.0";

/// Command-backed host for Windows workstations
pub struct WindowsHost {
    timeouts: TimeoutConfig,
    hosts_path: PathBuf,
    elevated: bool,
}

impl WindowsHost {
    pub fn new(config: &NetDocConfig) -> Self {
        let elevated = detect_elevation();
        tracing::debug!("WindowsHost created (elevated: {})", elevated);
        Self {
            timeouts: config.timeouts.clone(),
            hosts_path: config.targets.hosts_path.clone(),
            elevated,
        }
    }

    /// Program and arguments for a single-command capability
    fn command_for(capability: Capability) -> Option<(&'static str, &'static [&'static str])> {
        let cmd: (&'static str, &'static [&'static str]) = match capability {
            Capability::DisableProxy => return None,
            Capability::ShowWinHttpProxy => ("netsh", &["winhttp", "show", "proxy"]),
            Capability::ResetWinHttpProxy => ("netsh", &["winhttp", "reset", "proxy"]),
            Capability::FlushDnsCache => ("ipconfig", &["/flushdns"]),
            Capability::RegisterDns => ("ipconfig", &["/registerdns"]),
            Capability::ShowIpConfig => ("ipconfig", &["/all"]),
            Capability::ShowDnsCache => ("ipconfig", &["/displaydns"]),
            Capability::ShowNeighbors => ("arp", &["-a"]),
            Capability::ClearNeighbors => ("netsh", &["interface", "ip", "delete", "arpcache"]),
            Capability::ClearNeighborsFallback => ("arp", &["-d", "*"]),
            Capability::ShowNetbiosCache => ("nbtstat", &["-c"]),
            Capability::ClearNetbiosCache => ("nbtstat", &["-R"]),
            Capability::RefreshNetbios => ("nbtstat", &["-RR"]),
            Capability::ShowTcpConnections => ("netstat", &["-an"]),
            Capability::ShowProviderCatalog => ("netsh", &["winsock", "show", "catalog"]),
            Capability::ResetProviderCatalog => ("netsh", &["winsock", "reset"]),
            Capability::ResetIpStack => ("netsh", &["int", "ip", "reset"]),
            Capability::TuneTcpAutotuning => {
                ("netsh", &["int", "tcp", "set", "global", "autotuninglevel=normal"])
            }
            Capability::TuneTcpRss => ("netsh", &["int", "tcp", "set", "global", "rss=enabled"]),
            Capability::ReleaseLease => ("ipconfig", &["/release"]),
            Capability::RenewLease => ("ipconfig", &["/renew"]),
            Capability::ShowFirewall => ("netsh", &["advfirewall", "show", "allprofiles", "state"]),
            Capability::Restart => ("shutdown", &["/r", "/t", "5"]),
        };
        Some(cmd)
    }

    fn timeout_for(&self, capability: Capability) -> Duration {
        match capability {
            c if c.is_table_dump() => self.timeouts.tables(),
            Capability::RenewLease => self.timeouts.command().max(RENEW_MIN_TIMEOUT),
            _ => self.timeouts.command(),
        }
    }

    /// Table dumps are counted, so they are captured whole
    fn output_limit(capability: Capability) -> usize {
        if capability.is_table_dump() {
            command_exec::MAX_TABLE_OUTPUT_BYTES
        } else {
            command_exec::MAX_OUTPUT_BYTES
        }
    }

    /// Turn off the per-user proxy and clear its server and PAC URL
    ///
    /// Only the `ProxyEnable` write decides success: the deletes fail
    /// harmlessly when the values are already absent, which keeps the
    /// operation idempotent.
    async fn disable_proxy(&self) -> CommandResult {
        let timeout = self.timeouts.command();
        let label = Capability::DisableProxy.as_str();

        let result = command_exec::execute(
            label,
            "reg",
            &[
                "add",
                INTERNET_SETTINGS_KEY,
                "/v",
                "ProxyEnable",
                "/t",
                "REG_DWORD",
                "/d",
                "0",
                "/f",
            ],
            timeout,
        )
        .await;

        if !result.success() {
            return result;
        }

        for value in ["ProxyServer", "AutoConfigURL"] {
            let delete = command_exec::execute(
                label,
                "reg",
                &["delete", INTERNET_SETTINGS_KEY, "/v", value, "/f"],
                timeout,
            )
            .await;
            if !delete.success() {
                tracing::debug!("{} not removed ({})", value, delete.status.as_str());
            }
        }

        result
    }
}

#[async_trait]
impl NetworkHost for WindowsHost {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    async fn invoke(&self, capability: Capability) -> CommandResult {
        if capability == Capability::DisableProxy {
            return self.disable_proxy().await;
        }

        match Self::command_for(capability) {
            Some((program, args)) => {
                command_exec::execute_with_limit(
                    capability.as_str(),
                    program,
                    args,
                    self.timeout_for(capability),
                    Self::output_limit(capability),
                )
                .await
            }
            None => CommandResult::unsupported(capability.as_str(), "no command for capability"),
        }
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, QueryError> {
        let timeout = self.timeouts.dns();
        let lookup = tokio::net::lookup_host((host, 80));
        let addrs = tokio::time::timeout(timeout, lookup)
            .await
            .map_err(|_| QueryError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| QueryError::Resolve(e.to_string()))?;

        let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
        if ips.is_empty() {
            return Err(QueryError::Resolve(format!("no addresses for {}", host)));
        }
        Ok(ips)
    }

    async fn ping(&self, target: &str, timeout: Duration) -> Result<f64, QueryError> {
        let wait_ms = timeout.as_millis().to_string();
        // Headroom over the echo wait for process start-up
        let result = command_exec::execute(
            "ping",
            "ping",
            &["-n", "1", "-w", &wait_ms, target],
            timeout + Duration::from_secs(2),
        )
        .await;

        if !result.success() {
            return Err(QueryError::Command(result.failure_reason()));
        }
        parsers::parse_ping_rtt(&result.stdout)
            .ok_or_else(|| QueryError::Parse(format!("no reply from {}", target)))
    }

    async fn http_get(&self, url: &str, timeout: Duration) -> Result<u16, QueryError> {
        // Fresh client per request so proxy changes made by an action are observed
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| QueryError::Http(e.to_string()))?;

        let start = Instant::now();
        let mut response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                QueryError::Timeout(timeout.as_millis() as u64)
            } else {
                QueryError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(QueryError::Http(format!("status {}", status.as_u16())));
        }

        // First chunk is enough to prove the body is flowing
        response
            .chunk()
            .await
            .map_err(|e| QueryError::Http(e.to_string()))?;

        tracing::trace!("GET {} -> {} in {:?}", url, status, start.elapsed());
        Ok(status.as_u16())
    }

    async fn proxy_settings(&self) -> Result<ProxySettings, QueryError> {
        let result = command_exec::execute(
            "proxy_settings",
            "reg",
            &["query", INTERNET_SETTINGS_KEY],
            self.timeouts.command(),
        )
        .await;

        if !result.success() {
            return Err(QueryError::Command(result.failure_reason()));
        }
        Ok(parsers::parse_internet_settings(&result.stdout))
    }

    async fn read_hosts_file(&self) -> Result<String, QueryError> {
        let bytes = tokio::fs::read(&self.hosts_path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn memory_used_pct(&self) -> Result<f64, QueryError> {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(QueryError::Parse("total memory reported as zero".to_string()));
        }
        Ok(sys.used_memory() as f64 / total as f64 * 100.0)
    }

    async fn install_schedule(&self, task: &ScheduledTask) -> CommandResult {
        let interval = task.interval_minutes.to_string();
        command_exec::execute(
            "install_schedule",
            "schtasks",
            &[
                "/Create",
                "/SC",
                "MINUTE",
                "/MO",
                &interval,
                "/TN",
                &task.name,
                "/TR",
                &task.command,
                "/RL",
                "HIGHEST",
                "/F",
            ],
            self.timeouts.command(),
        )
        .await
    }

    async fn remove_schedule(&self, name: &str) -> CommandResult {
        command_exec::execute(
            "remove_schedule",
            "schtasks",
            &["/Delete", "/TN", name, "/F"],
            self.timeouts.command(),
        )
        .await
    }
}

/// Utilities every mutating capability depends on
const REQUIRED_UTILITIES: &[&str] = &["netsh", "ipconfig"];

/// Fails when a required network utility is not on `PATH`
pub fn check_environment() -> crate::error::Result<()> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    match missing_utility(&path, REQUIRED_UTILITIES) {
        Some(name) => Err(NetDocError::EnvironmentMissing(name.to_string())),
        None => Ok(()),
    }
}

fn missing_utility<'a>(path: &OsStr, names: &[&'a str]) -> Option<&'a str> {
    let dirs: Vec<PathBuf> = std::env::split_paths(path).collect();
    names.iter().copied().find(|name| {
        !dirs.iter().any(|dir| {
            dir.join(name).is_file() || dir.join(format!("{}.exe", name)).is_file()
        })
    })
}

#[cfg(windows)]
fn detect_elevation() -> bool {
    // `net session` only succeeds from an elevated token
    std::process::Command::new("net")
        .arg("session")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(unix)]
fn detect_elevation() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(any(windows, unix)))]
fn detect_elevation() -> bool {
    false
}
