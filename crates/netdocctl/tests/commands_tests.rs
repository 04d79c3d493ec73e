//! Command paths that only read state, run against a stub host

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use netdoc_common::host::{
    Capability, CommandResult, ExecutionStatus, NetworkHost, ProxySettings, ScheduledTask,
};
use netdoc_common::{CheckStatus, NetDocConfig, QueryError};
use netdocctl::commands::diagnose::{self, AfterDiagnosis};
use netdocctl::commands::{optimize, report, Context};
use netdocctl::errors::{exit_code_for, EXIT_NOT_ELEVATED};

/// Unelevated host with a proxy switched on
struct StubHost;

fn ok(capability: Capability, stdout: &str) -> CommandResult {
    CommandResult {
        label: capability.as_str().to_string(),
        full_command: format!("stub {}", capability),
        exit_code: 0,
        stdout: stdout.to_string(),
        stdout_truncated: false,
        stderr: String::new(),
        stderr_truncated: false,
        duration_ms: 1,
        status: ExecutionStatus::Success,
    }
}

#[async_trait]
impl NetworkHost for StubHost {
    fn is_elevated(&self) -> bool {
        false
    }

    async fn invoke(&self, capability: Capability) -> CommandResult {
        let stdout = match capability {
            Capability::ShowIpConfig => {
                "Ethernet adapter Ethernet:\n\n   IPv4 Address. . . : 10.0.0.5\n   Default Gateway . : 10.0.0.1\n   DNS Servers . . . : 10.0.0.1\n"
            }
            Capability::ShowWinHttpProxy => "    Direct access (no proxy server).\n",
            Capability::ShowProviderCatalog => "Winsock Catalog Provider Entry\n",
            Capability::ShowNeighbors => "  10.0.0.1    00-11-22-33-44-55     dynamic\n",
            Capability::ShowTcpConnections => {
                "  TCP    10.0.0.5:5000    1.2.3.4:443    ESTABLISHED\n  TCP    0.0.0.0:135    0.0.0.0:0    LISTENING\n  TCP    10.0.0.5:5001    1.2.3.4:443    ESTABLISHED\n"
            }
            _ => "",
        };
        ok(capability, stdout)
    }

    async fn resolve(&self, _host: &str) -> Result<Vec<IpAddr>, QueryError> {
        Ok(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9))])
    }

    async fn ping(&self, _target: &str, _timeout: Duration) -> Result<f64, QueryError> {
        Ok(8.0)
    }

    async fn http_get(&self, _url: &str, _timeout: Duration) -> Result<u16, QueryError> {
        Ok(200)
    }

    async fn proxy_settings(&self) -> Result<ProxySettings, QueryError> {
        Ok(ProxySettings {
            enabled: true,
            server: Some("127.0.0.1:8888".to_string()),
            auto_config_url: None,
            bypass: None,
        })
    }

    async fn read_hosts_file(&self) -> Result<String, QueryError> {
        Ok("127.0.0.1 localhost\n".to_string())
    }

    fn memory_used_pct(&self) -> Result<f64, QueryError> {
        Ok(40.0)
    }

    async fn install_schedule(&self, _task: &ScheduledTask) -> CommandResult {
        ok(Capability::ShowFirewall, "")
    }

    async fn remove_schedule(&self, _name: &str) -> CommandResult {
        ok(Capability::ShowFirewall, "")
    }
}

fn context() -> Context {
    Context::with_host(NetDocConfig::default(), Arc::new(StubHost), true)
}

#[tokio::test]
async fn test_diagnose_report_only() {
    let ctx = context();

    let findings = diagnose::diagnose(&ctx, AfterDiagnosis::Report).await.unwrap();

    assert_eq!(findings.len(), 10);
    assert_eq!(findings[0].status, CheckStatus::Warning, "proxy is on");
    assert_eq!(netdoc_common::checks::issue_count(&findings), 1);
}

#[tokio::test]
async fn test_export_writes_given_findings() {
    let ctx = context();
    let dir = tempfile::tempdir().unwrap();
    let findings = diagnose::run_diagnostics(&ctx).await;

    let path = report::export(&ctx, Some(&findings), Some(dir.path().to_path_buf()))
        .await
        .unwrap();

    assert!(path.starts_with(dir.path()));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("network_diagnostic_report_"));
    assert!(name.ends_with(".txt"));
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[WARN] System proxy settings"));
    assert!(text.contains("Issues found: 1"));
}

#[tokio::test]
async fn test_cache_and_sample_read_without_privileges() {
    let ctx = context();
    optimize::cache(&ctx).await.unwrap();
    optimize::sample(&ctx, 1).await.unwrap();
}

#[tokio::test]
async fn test_network_details() {
    let ctx = context();

    let details = optimize::collect_details(&ctx).await;

    assert_eq!(details.adapters, vec!["Ethernet adapter Ethernet"]);
    assert_eq!(details.gateways, vec!["10.0.0.1"]);
    assert_eq!(
        details.tcp_states,
        vec![("ESTABLISHED".to_string(), 2), ("LISTENING".to_string(), 1)]
    );
    optimize::details(&ctx).await.unwrap();
}

#[test]
fn test_unelevated_context_maps_to_exit_code() {
    let ctx = context();
    let err = ctx.require_elevated().unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_NOT_ELEVATED);
}
