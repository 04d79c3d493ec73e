//! Metric sampler against a fake host with failing and hanging measurements

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::FakeHost;
use netdoc_common::health::{advisories, Advisory};
use netdoc_common::host::Capability;
use netdoc_common::{MetricSampler, MetricSource, NetDocConfig, SENTINEL};

const NETSTAT: &str = "\
  Proto  Local Address          Foreign Address        State
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING
  TCP    192.168.1.20:5000      1.2.3.4:443            ESTABLISHED
";

const ARP: &str = "\
  192.168.1.1           aa-bb-cc-dd-ee-ff     dynamic
  192.168.1.255         ff-ff-ff-ff-ff-ff     static
";

fn displaydns(records: usize) -> String {
    (0..records)
        .map(|i| {
            format!(
                "    host{i}.example.com\n    ----------------------------------------\n    Record Name . . . . . : host{i}.example.com\n    Record Type . . . . . : 1\n    A (Host) Record . . . : 10.0.0.1\n\n"
            )
        })
        .collect()
}

fn host_with_tables() -> FakeHost {
    FakeHost::healthy().with(|s| {
        s.outputs.insert(Capability::ShowTcpConnections, NETSTAT.to_string());
        s.outputs.insert(Capability::ShowNeighbors, ARP.to_string());
        s.outputs.insert(Capability::ShowDnsCache, displaydns(3));
    })
}

fn sampler(host: FakeHost, config: &NetDocConfig) -> MetricSampler {
    MetricSampler::new(Arc::new(host), config)
}

#[tokio::test]
async fn test_healthy_host_fills_every_reading() {
    let config = NetDocConfig::default();
    let snap = sampler(host_with_tables(), &config).sample().await;

    assert!(snap.dns_resolve_ms() >= 0.0);
    assert_eq!(snap.ping_ms(), 12.0);
    assert!(snap.http_response_ms() >= 0.0);
    assert_eq!(snap.tcp_connection_count(), 2);
    assert_eq!(snap.arp_cache_entries(), 2);
    assert_eq!(snap.dns_cache_entries(), 3);
    assert_eq!(snap.memory_used_pct(), 55.0);
}

#[tokio::test]
async fn test_hung_http_request_is_capped_by_its_timeout() {
    let mut config = NetDocConfig::default();
    config.timeouts.http_ms = 300;
    let host = host_with_tables().with(|s| s.http_hangs = true);

    let start = Instant::now();
    let snap = sampler(host, &config).sample().await;
    let elapsed = start.elapsed();

    assert!(elapsed < Duration::from_secs(5), "sample took {:?}", elapsed);
    assert_eq!(snap.http_response_ms(), SENTINEL);
    assert!(snap.dns_resolve_ms() >= 0.0);
    assert_eq!(snap.ping_ms(), 12.0);
    assert_eq!(snap.tcp_connection_count(), 2);
    assert_eq!(snap.memory_used_pct(), 55.0);
}

#[tokio::test]
async fn test_failed_measurements_do_not_abort_the_others() {
    let config = NetDocConfig::default();
    let domain = config.targets.sample_domain.clone();
    let target = config.targets.sample_ping_target.clone();
    let host = host_with_tables().with(|s| {
        s.unresolvable.insert(domain);
        s.unreachable.insert(target);
        s.failing.insert(Capability::ShowNeighbors);
    });

    let snap = sampler(host, &config).sample().await;

    assert_eq!(snap.dns_resolve_ms(), SENTINEL);
    assert_eq!(snap.ping_ms(), SENTINEL);
    assert_eq!(snap.arp_cache_entries(), -1);
    assert!(snap.http_response_ms() >= 0.0);
    assert_eq!(snap.tcp_connection_count(), 2);
    assert_eq!(snap.dns_cache_entries(), 3);
}

#[tokio::test]
async fn test_large_dns_cache_is_counted_in_full() {
    let config = NetDocConfig::default();
    let host = host_with_tables().with(|s| {
        s.outputs.insert(Capability::ShowDnsCache, displaydns(1200));
    });

    let snap = sampler(host, &config).sample().await;

    assert_eq!(snap.dns_cache_entries(), 1200);
    assert!(advisories(&snap, &config.thresholds).contains(&Advisory::DnsCacheLarge));
}

#[tokio::test]
async fn test_truncated_table_is_a_failed_measurement() {
    let config = NetDocConfig::default();
    let host = host_with_tables().with(|s| {
        s.truncated.insert(Capability::ShowDnsCache);
    });

    let snap = sampler(host, &config).sample().await;

    assert_eq!(snap.dns_cache_entries(), -1);
    assert_eq!(snap.arp_cache_entries(), 2);
}
