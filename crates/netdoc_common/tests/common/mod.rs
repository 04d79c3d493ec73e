//! Shared fixtures for integration tests
//!
//! `FakeHost` keeps a small model of the machine's network configuration
//! that capabilities mutate, so post-conditions and repeated actions behave
//! the way they would on a real host.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netdoc_common::host::{
    Capability, CommandResult, ExecutionStatus, NetworkHost, ProxySettings, ScheduledTask,
};
use netdoc_common::sampler::MetricSource;
use netdoc_common::snapshot::{Readings, Snapshot};
use netdoc_common::{NetDocConfig, QueryError};

pub const IPCONFIG_ALL: &str = "\
Windows IP Configuration

Ethernet adapter Ethernet:

   IPv4 Address. . . . . . . . . . . : 192.168.1.20(Preferred)
   DNS Servers . . . . . . . . . . . : 192.168.1.1
                                       114.114.114.114
";

pub const CLEAN_CATALOG: &str = "\
Winsock Catalog Provider Entry
------------------------------------------------------
Description:                      MSAFD Tcpip [TCP/IP]

Winsock Catalog Provider Entry
------------------------------------------------------
Description:                      MSAFD Tcpip [UDP/IP]
";

pub const FIREWALL_STATE: &str = "\
Domain Profile Settings:
State                                 ON

Private Profile Settings:
State                                 ON
";

#[derive(Debug)]
pub struct FakeState {
    pub elevated: bool,
    pub proxy: ProxySettings,
    pub proxy_readable: bool,
    /// `None` means direct access
    pub winhttp_proxy: Option<String>,
    /// WinHTTP reset reports success but changes nothing
    pub winhttp_sticky: bool,
    pub failing: HashSet<Capability>,
    pub outputs: HashMap<Capability, String>,
    pub invoked: Vec<Capability>,
    pub unresolvable: HashSet<String>,
    pub unreachable: HashSet<String>,
    pub http_failures: HashSet<String>,
    /// HTTP requests never answer; the caller's timeout has to fire
    pub http_hangs: bool,
    /// Capabilities whose stdout comes back cut short
    pub truncated: HashSet<Capability>,
    pub hosts: Result<String, QueryError>,
    pub schedules: Vec<ScheduledTask>,
}

pub struct FakeHost {
    pub state: Mutex<FakeState>,
}

impl FakeHost {
    /// An elevated, healthy machine
    pub fn healthy() -> Self {
        let mut outputs = HashMap::new();
        outputs.insert(Capability::ShowIpConfig, IPCONFIG_ALL.to_string());
        outputs.insert(Capability::ShowProviderCatalog, CLEAN_CATALOG.to_string());
        outputs.insert(Capability::ShowFirewall, FIREWALL_STATE.to_string());

        Self {
            state: Mutex::new(FakeState {
                elevated: true,
                proxy: ProxySettings::default(),
                proxy_readable: true,
                winhttp_proxy: None,
                winhttp_sticky: false,
                failing: HashSet::new(),
                outputs,
                invoked: Vec::new(),
                unresolvable: HashSet::new(),
                unreachable: HashSet::new(),
                http_failures: HashSet::new(),
                http_hangs: false,
                truncated: HashSet::new(),
                hosts: Ok("127.0.0.1 localhost\n".to_string()),
                schedules: Vec::new(),
            }),
        }
    }

    pub fn with<F: FnOnce(&mut FakeState)>(self, f: F) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn invoked(&self) -> Vec<Capability> {
        self.state.lock().unwrap().invoked.clone()
    }

    pub fn proxy(&self) -> ProxySettings {
        self.state.lock().unwrap().proxy.clone()
    }

    pub fn proxy_enabled(&self) -> bool {
        self.state.lock().unwrap().proxy.has_active_proxy()
    }

    fn result(capability: Capability, status: ExecutionStatus, stdout: String) -> CommandResult {
        CommandResult {
            label: capability.as_str().to_string(),
            full_command: format!("fake {}", capability),
            exit_code: if status == ExecutionStatus::Success { 0 } else { 1 },
            stdout,
            stdout_truncated: false,
            stderr: if status == ExecutionStatus::Success {
                String::new()
            } else {
                "simulated failure".to_string()
            },
            stderr_truncated: false,
            duration_ms: 1,
            status,
        }
    }
}

/// Proxy settings with an enabled server
pub fn active_proxy() -> ProxySettings {
    ProxySettings {
        enabled: true,
        server: Some("127.0.0.1:7890".to_string()),
        auto_config_url: None,
        bypass: Some("<local>".to_string()),
    }
}

#[async_trait]
impl NetworkHost for FakeHost {
    fn is_elevated(&self) -> bool {
        self.state.lock().unwrap().elevated
    }

    async fn invoke(&self, capability: Capability) -> CommandResult {
        let mut state = self.state.lock().unwrap();
        state.invoked.push(capability);

        if state.failing.contains(&capability) {
            return Self::result(capability, ExecutionStatus::NonZeroExit, String::new());
        }

        match capability {
            Capability::DisableProxy => state.proxy = ProxySettings::default(),
            Capability::ResetWinHttpProxy if !state.winhttp_sticky => state.winhttp_proxy = None,
            _ => {}
        }

        let stdout = match (capability, state.outputs.get(&capability)) {
            (_, Some(out)) => out.clone(),
            (Capability::ShowWinHttpProxy, None) => match &state.winhttp_proxy {
                None => "Current WinHTTP proxy settings:\n\n    Direct access (no proxy server).\n"
                    .to_string(),
                Some(server) => format!(
                    "Current WinHTTP proxy settings:\n\n    Proxy Server(s) :  {}\n",
                    server
                ),
            },
            _ => String::new(),
        };

        let mut result = Self::result(capability, ExecutionStatus::Success, stdout);
        result.stdout_truncated = state.truncated.contains(&capability);
        result
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, QueryError> {
        if self.state.lock().unwrap().unresolvable.contains(host) {
            return Err(QueryError::Resolve(format!("no such host: {}", host)));
        }
        Ok(vec![IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))])
    }

    async fn ping(&self, target: &str, timeout: Duration) -> Result<f64, QueryError> {
        if self.state.lock().unwrap().unreachable.contains(target) {
            return Err(QueryError::Timeout(timeout.as_millis() as u64));
        }
        Ok(12.0)
    }

    async fn http_get(&self, url: &str, _timeout: Duration) -> Result<u16, QueryError> {
        let (fails, hangs) = {
            let state = self.state.lock().unwrap();
            (state.http_failures.contains(url), state.http_hangs)
        };
        if hangs {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if fails {
            return Err(QueryError::Http("connection reset".to_string()));
        }
        Ok(200)
    }

    async fn proxy_settings(&self) -> Result<ProxySettings, QueryError> {
        let state = self.state.lock().unwrap();
        if !state.proxy_readable {
            return Err(QueryError::Command("access denied".to_string()));
        }
        Ok(state.proxy.clone())
    }

    async fn read_hosts_file(&self) -> Result<String, QueryError> {
        self.state.lock().unwrap().hosts.clone()
    }

    fn memory_used_pct(&self) -> Result<f64, QueryError> {
        Ok(55.0)
    }

    async fn install_schedule(&self, task: &ScheduledTask) -> CommandResult {
        self.state.lock().unwrap().schedules.push(task.clone());
        Self::result(Capability::ShowFirewall, ExecutionStatus::Success, String::new())
    }

    async fn remove_schedule(&self, name: &str) -> CommandResult {
        self.state.lock().unwrap().schedules.retain(|t| t.name != name);
        Self::result(Capability::ShowFirewall, ExecutionStatus::Success, String::new())
    }
}

/// Metric source replaying a fixed list of HTTP readings
///
/// Negative values replay as failed measurements; once exhausted every
/// snapshot is a failure.
pub struct ScriptedSource {
    http: Mutex<VecDeque<f64>>,
}

impl ScriptedSource {
    pub fn new(http: &[f64]) -> Self {
        Self {
            http: Mutex::new(http.iter().copied().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.http.lock().unwrap().len()
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    async fn sample(&self) -> Snapshot {
        let next = self.http.lock().unwrap().pop_front();
        Snapshot::new(Readings {
            http_response_ms: next,
            dns_resolve_ms: next.map(|_| 20.0),
            ..Default::default()
        })
    }
}

/// Metric source whose HTTP time depends on the fake host's proxy state
pub struct ProxyBoundSource {
    pub host: Arc<FakeHost>,
    pub with_proxy_ms: f64,
    pub direct_ms: f64,
}

#[async_trait]
impl MetricSource for ProxyBoundSource {
    async fn sample(&self) -> Snapshot {
        let http = if self.host.proxy_enabled() {
            self.with_proxy_ms
        } else {
            self.direct_ms
        };
        Snapshot::new(Readings {
            http_response_ms: Some(http),
            ..Default::default()
        })
    }
}

/// Default config with no settle delay
pub fn fast_config() -> NetDocConfig {
    let mut config = NetDocConfig::default();
    config.engine.stabilization_ms = 0;
    config
}
