//! Diagnostic checks against a fake host

mod common;

use common::{active_proxy, fast_config, FakeHost};
use netdoc_common::checks::{default_checks, issue_count, repair_offered, run_checks};
use netdoc_common::host::{Capability, ProxySettings};
use netdoc_common::{ActionId, Check, CheckStatus, QueryError};

#[tokio::test]
async fn test_clean_host_has_no_issues() {
    let host = FakeHost::healthy();
    let config = fast_config();

    let findings = run_checks(&default_checks(), &host, &config, |_| {}).await;

    assert_eq!(findings.len(), 10);
    assert_eq!(issue_count(&findings), 0, "{:#?}", findings);
    assert!(!repair_offered(&findings));
    assert_eq!(findings[9].status, CheckStatus::Info, "firewall is informational");
}

#[tokio::test]
async fn test_callback_sees_every_check_in_order() {
    let host = FakeHost::healthy();
    let config = fast_config();
    let mut seen = Vec::new();

    run_checks(&default_checks(), &host, &config, |check| seen.push(check)).await;

    assert_eq!(seen, default_checks());
}

#[tokio::test]
async fn test_active_proxy_is_a_warning() {
    let host = FakeHost::healthy().with(|s| s.proxy = active_proxy());
    let finding = Check::ProxySettings.run(&host, &fast_config()).await;

    assert_eq!(finding.status, CheckStatus::Warning);
    assert_eq!(finding.fix_action, Some(ActionId::DisableProxy));
    assert!(finding.details.contains(&"Proxy server: 127.0.0.1:7890".to_string()));
}

#[tokio::test]
async fn test_pac_script_is_info() {
    let host = FakeHost::healthy().with(|s| {
        s.proxy = ProxySettings {
            auto_config_url: Some("http://wpad/proxy.pac".to_string()),
            ..Default::default()
        }
    });
    let finding = Check::ProxySettings.run(&host, &fast_config()).await;

    assert_eq!(finding.status, CheckStatus::Info);
    assert!(finding.fix_available);
}

#[tokio::test]
async fn test_unreadable_proxy_is_an_error() {
    let host = FakeHost::healthy().with(|s| s.proxy_readable = false);
    let finding = Check::ProxySettings.run(&host, &fast_config()).await;
    assert_eq!(finding.status, CheckStatus::Error);
}

#[tokio::test]
async fn test_winhttp_proxy_states() {
    let config = fast_config();

    let host = FakeHost::healthy().with(|s| s.winhttp_proxy = Some("10.0.0.1:3128".to_string()));
    let finding = Check::WinHttpProxy.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Warning);
    assert_eq!(finding.fix_action, Some(ActionId::ResetWinHttpProxy));
    assert!(finding.message.contains("10.0.0.1:3128"));

    let host = FakeHost::healthy().with(|s| {
        s.outputs
            .insert(Capability::ShowWinHttpProxy, "something else entirely".to_string());
    });
    let finding = Check::WinHttpProxy.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Info);
    assert!(!finding.fix_available);

    let host = FakeHost::healthy().with(|s| {
        s.failing.insert(Capability::ShowWinHttpProxy);
    });
    let finding = Check::WinHttpProxy.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Error);
}

#[tokio::test]
async fn test_catalog_findings() {
    let config = fast_config();

    let host = FakeHost::healthy().with(|s| {
        s.failing.insert(Capability::ShowProviderCatalog);
    });
    let finding = Check::ProviderCatalog.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Error);
    assert_eq!(finding.fix_action, Some(ActionId::ResetProviderCatalog));

    let host = FakeHost::healthy().with(|s| {
        s.outputs.insert(Capability::ShowProviderCatalog, String::new());
    });
    let finding = Check::ProviderCatalog.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Error);
    assert_eq!(finding.details, vec!["empty output".to_string()]);

    let host = FakeHost::healthy().with(|s| {
        s.outputs.insert(
            Capability::ShowProviderCatalog,
            "Winsock Catalog Provider Entry\nDescription: SuperVPN Layered Provider\n".to_string(),
        );
    });
    let finding = Check::ProviderCatalog.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Warning);
    assert!(finding.message.contains("vpn"));
}

#[tokio::test]
async fn test_missing_dns_servers_is_an_error() {
    let host = FakeHost::healthy().with(|s| {
        s.outputs.insert(
            Capability::ShowIpConfig,
            "Windows IP Configuration\n\nEthernet adapter Ethernet:\n\n   Media State . . . : Media disconnected\n"
                .to_string(),
        );
    });
    let config = fast_config();

    let dns = Check::DnsConfiguration.run(&host, &config).await;
    assert_eq!(dns.status, CheckStatus::Error);
    assert_eq!(dns.fix_action, Some(ActionId::RegisterDns));

    let adapters = Check::NetworkAdapters.run(&host, &config).await;
    assert_eq!(adapters.status, CheckStatus::Error);
    assert_eq!(adapters.fix_action, Some(ActionId::ReleaseRenewLease));
}

#[tokio::test]
async fn test_dns_configuration_lists_servers() {
    let host = FakeHost::healthy();
    let finding = Check::DnsConfiguration.run(&host, &fast_config()).await;

    assert_eq!(finding.status, CheckStatus::Ok);
    assert_eq!(finding.details, vec!["DNS servers: 192.168.1.1, 114.114.114.114".to_string()]);
}

#[tokio::test]
async fn test_dns_resolution_partial_and_total_failure() {
    let config = fast_config();

    let host = FakeHost::healthy().with(|s| {
        s.unresolvable.insert("www.google.com".to_string());
    });
    let finding = Check::DnsResolution.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Warning);
    assert!(finding.message.contains("1/3"));
    assert_eq!(finding.fix_action, Some(ActionId::FlushDnsCache));

    let host = FakeHost::healthy().with(|s| {
        for domain in &config.targets.dns_panel {
            s.unresolvable.insert(domain.clone());
        }
    });
    let finding = Check::DnsResolution.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Error);
    assert_eq!(finding.details.len(), 3);
}

#[tokio::test]
async fn test_hosts_file_findings() {
    let config = fast_config();

    let host = FakeHost::healthy().with(|s| {
        s.hosts = Ok("# comment\n127.0.0.1 localhost\n0.0.0.0 www.google.com\n".to_string());
    });
    let finding = Check::HostsFile.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Warning);
    assert!(!finding.fix_available, "no action edits the hosts file");
    assert_eq!(finding.details[0], "Custom entries: 2");
    assert_eq!(finding.details[1], "Suspicious entries:");
    assert_eq!(finding.details[2], "  0.0.0.0 www.google.com");

    let crowded: String = (0..60).map(|i| format!("10.0.0.{} host{}\n", i, i)).collect();
    let host = FakeHost::healthy().with(|s| s.hosts = Ok(crowded));
    let finding = Check::HostsFile.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Warning);
    assert!(finding.message.contains("60"));

    let host = FakeHost::healthy()
        .with(|s| s.hosts = Err(QueryError::Io("permission denied".to_string())));
    let finding = Check::HostsFile.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Error);
}

#[tokio::test]
async fn test_suspicious_hosts_lines_are_capped() {
    let lines: String = (0..8).map(|i| format!("0.0.0.0 m{}.youtube.com\n", i)).collect();
    let host = FakeHost::healthy().with(|s| s.hosts = Ok(lines));
    let finding = Check::HostsFile.run(&host, &fast_config()).await;

    assert!(finding.message.starts_with("8 "));
    // count line, header, five entries
    assert_eq!(finding.details.len(), 7);
}

#[tokio::test]
async fn test_connectivity_findings() {
    let config = fast_config();

    let host = FakeHost::healthy().with(|s| {
        s.unreachable.insert("8.8.8.8".to_string());
    });
    let finding = Check::Connectivity.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Warning);
    assert!(finding.details.contains(&"8.8.8.8: unreachable".to_string()));

    let host = FakeHost::healthy().with(|s| {
        for target in &config.targets.ping_panel {
            s.unreachable.insert(target.clone());
        }
    });
    let finding = Check::Connectivity.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Error);
    assert!(!finding.fix_available);
}

#[tokio::test]
async fn test_http_findings_use_general_fix() {
    let config = fast_config();

    let host = FakeHost::healthy().with(|s| {
        s.http_failures.insert("https://www.baidu.com".to_string());
    });
    let finding = Check::HttpConnectivity.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Warning);
    assert!(finding.fix_available);
    assert_eq!(finding.fix_action, None);

    let host = FakeHost::healthy().with(|s| {
        for url in &config.targets.http_panel {
            s.http_failures.insert(url.clone());
        }
    });
    let finding = Check::HttpConnectivity.run(&host, &config).await;
    assert_eq!(finding.status, CheckStatus::Error);
    assert!(finding.fix_available);
}

#[tokio::test]
async fn test_unreadable_firewall_is_a_warning() {
    let host = FakeHost::healthy().with(|s| {
        s.failing.insert(Capability::ShowFirewall);
    });
    let finding = Check::Firewall.run(&host, &fast_config()).await;
    assert_eq!(finding.status, CheckStatus::Warning);
}

#[tokio::test]
async fn test_failing_queries_never_abort_the_run() {
    let host = FakeHost::healthy().with(|s| {
        s.proxy_readable = false;
        s.failing.insert(Capability::ShowWinHttpProxy);
        s.failing.insert(Capability::ShowProviderCatalog);
        s.failing.insert(Capability::ShowIpConfig);
        s.failing.insert(Capability::ShowFirewall);
    });

    let findings = run_checks(&default_checks(), &host, &fast_config(), |_| {}).await;

    assert_eq!(findings.len(), 10);
    assert_eq!(issue_count(&findings), 6);
}
