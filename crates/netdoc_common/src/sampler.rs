//! Metric Sampler
//!
//! Collects one [`Snapshot`]. The four measurement groups (DNS, ping, HTTP,
//! OS tables + memory) run concurrently under their own timeouts; a failing
//! or timed-out group only turns its own fields into sentinels.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::{NetDocConfig, TargetConfig, Thresholds, TimeoutConfig};
use crate::health::{CacheKind, CacheReading};
use crate::host::{Capability, NetworkHost};
use crate::parsers;
use crate::snapshot::{self, Readings, Snapshot};

/// Spacing between snapshots in an averaged measurement
pub const AVERAGE_SPACING: Duration = Duration::from_millis(500);

/// Anything that can produce a snapshot on demand
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn sample(&self) -> Snapshot;
}

/// Host-backed sampler
pub struct MetricSampler {
    host: Arc<dyn NetworkHost>,
    targets: TargetConfig,
    timeouts: TimeoutConfig,
}

/// Run `fut` under `limit`, collapsing timeout into `None`
async fn bounded<T, F>(label: &str, limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = Option<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => value,
        Err(_) => {
            debug!("{} timed out after {} ms", label, limit.as_millis());
            None
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl MetricSampler {
    pub fn new(host: Arc<dyn NetworkHost>, config: &NetDocConfig) -> Self {
        Self {
            host,
            targets: config.targets.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    async fn measure_dns(&self) -> Option<f64> {
        let start = Instant::now();
        match self.host.resolve(&self.targets.sample_domain).await {
            Ok(_) => Some(elapsed_ms(start)),
            Err(e) => {
                debug!("DNS measurement failed: {}", e);
                None
            }
        }
    }

    async fn measure_ping(&self) -> Option<f64> {
        match self
            .host
            .ping(&self.targets.sample_ping_target, self.timeouts.ping())
            .await
        {
            Ok(rtt) => Some(rtt),
            Err(e) => {
                debug!("ping measurement failed: {}", e);
                None
            }
        }
    }

    async fn measure_http(&self) -> Option<f64> {
        let start = Instant::now();
        match self
            .host
            .http_get(&self.targets.sample_url, self.timeouts.http())
            .await
        {
            Ok(_) => Some(elapsed_ms(start)),
            Err(e) => {
                debug!("HTTP measurement failed: {}", e);
                None
            }
        }
    }

    async fn measure_tables(&self) -> (Option<i64>, Option<i64>, Option<i64>, Option<f64>) {
        let limit = self.timeouts.tables();
        let (tcp, dns_cache, arp) = tokio::join!(
            bounded("tcp table", limit, table_count(self.host.as_ref(), Capability::ShowTcpConnections)),
            bounded("dns cache", limit, table_count(self.host.as_ref(), Capability::ShowDnsCache)),
            bounded("arp table", limit, table_count(self.host.as_ref(), Capability::ShowNeighbors)),
        );

        let memory = match self.host.memory_used_pct() {
            Ok(pct) => Some(pct),
            Err(e) => {
                debug!("memory measurement failed: {}", e);
                None
            }
        };

        (tcp, dns_cache, arp, memory)
    }
}

#[async_trait]
impl MetricSource for MetricSampler {
    async fn sample(&self) -> Snapshot {
        let (dns, ping, http, (tcp, dns_cache, arp, memory)) = tokio::join!(
            bounded("dns lookup", self.timeouts.dns(), self.measure_dns()),
            bounded("ping", self.timeouts.ping(), self.measure_ping()),
            bounded("http request", self.timeouts.http(), self.measure_http()),
            self.measure_tables(),
        );

        Snapshot::new(Readings {
            dns_resolve_ms: dns,
            ping_ms: ping,
            http_response_ms: http,
            tcp_connection_count: tcp,
            dns_cache_entries: dns_cache,
            arp_cache_entries: arp,
            memory_used_pct: memory,
        })
    }
}

/// Entry count of one OS table, `None` when it could not be read
async fn table_count(host: &dyn NetworkHost, capability: Capability) -> Option<i64> {
    let result = host.invoke(capability).await;
    if !result.success() {
        debug!("{} failed: {}", capability, result.failure_reason());
        return None;
    }
    if result.stdout_truncated {
        warn!("{} output was truncated; not counting a partial table", capability);
        return None;
    }

    let count = match capability {
        Capability::ShowTcpConnections => parsers::count_tcp_connections(&result.stdout),
        Capability::ShowDnsCache => parsers::count_dns_cache_records(&result.stdout),
        Capability::ShowNeighbors => parsers::count_arp_entries(&result.stdout),
        Capability::ShowNetbiosCache => parsers::count_netbios_entries(&result.stdout),
        _ => return None,
    };
    Some(count)
}

/// Average `runs` snapshots taken `spacing` apart
pub async fn sample_averaged(source: &dyn MetricSource, runs: usize, spacing: Duration) -> Snapshot {
    let runs = runs.max(1);
    let mut snapshots = Vec::with_capacity(runs);

    for i in 0..runs {
        if i > 0 && !spacing.is_zero() {
            tokio::time::sleep(spacing).await;
        }
        snapshots.push(source.sample().await);
    }

    snapshot::average(&snapshots).unwrap_or_else(Snapshot::failed)
}

/// Current size of each cacheable OS table
pub async fn cache_status(
    host: &dyn NetworkHost,
    thresholds: &Thresholds,
    timeouts: &TimeoutConfig,
) -> Vec<CacheReading> {
    let limit = timeouts.tables();
    let (dns, arp, netbios, tcp) = tokio::join!(
        bounded("dns cache", limit, table_count(host, Capability::ShowDnsCache)),
        bounded("arp table", limit, table_count(host, Capability::ShowNeighbors)),
        bounded("netbios cache", limit, table_count(host, Capability::ShowNetbiosCache)),
        bounded("tcp table", limit, table_count(host, Capability::ShowTcpConnections)),
    );

    [
        (CacheKind::DnsCache, dns),
        (CacheKind::ArpCache, arp),
        (CacheKind::NetbiosCache, netbios),
        (CacheKind::TcpConnections, tcp),
    ]
    .into_iter()
    .map(|(kind, count)| CacheReading::new(kind, count.unwrap_or(-1), thresholds))
    .collect()
}
