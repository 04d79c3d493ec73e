//! Health Classifier
//!
//! Maps a snapshot to a coarse status label and a list of advisories.
//! Advisories are suggestion text only and never change the status.

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::snapshot::Snapshot;

/// Coarse network health label, derived from HTTP response time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Normal,
    Slow,
    VerySlow,
    /// HTTP measurement failed
    Abnormal,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Slow => "slow",
            Self::VerySlow => "very slow",
            Self::Abnormal => "abnormal",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify with the default thresholds
pub fn classify(snapshot: &Snapshot) -> HealthStatus {
    classify_with(snapshot, &Thresholds::default())
}

pub fn classify_with(snapshot: &Snapshot, thresholds: &Thresholds) -> HealthStatus {
    let http = snapshot.http_response_ms();
    if http < 0.0 {
        HealthStatus::Abnormal
    } else if http > thresholds.effective_very_slow_http_ms() {
        HealthStatus::VerySlow
    } else if http > thresholds.effective_slow_http_ms() {
        HealthStatus::Slow
    } else {
        HealthStatus::Normal
    }
}

/// Optimization suggestion raised by a secondary indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advisory {
    DnsCacheLarge,
    TooManyConnections,
    ArpCacheLarge,
    SlowResponses,
}

impl Advisory {
    pub fn message(&self) -> &'static str {
        match self {
            Self::DnsCacheLarge => "DNS cache is large, consider flushing it",
            Self::TooManyConnections => "too many TCP connections, possible connection leak",
            Self::ArpCacheLarge => "ARP cache is large, consider clearing it",
            Self::SlowResponses => "network responses are slow, run optimization",
        }
    }
}

pub fn advisories(snapshot: &Snapshot, thresholds: &Thresholds) -> Vec<Advisory> {
    let mut out = Vec::new();
    if snapshot.dns_cache_entries() > thresholds.advisory_dns_cache {
        out.push(Advisory::DnsCacheLarge);
    }
    if snapshot.tcp_connection_count() > thresholds.advisory_tcp_connections {
        out.push(Advisory::TooManyConnections);
    }
    if snapshot.arp_cache_entries() > thresholds.advisory_arp_cache {
        out.push(Advisory::ArpCacheLarge);
    }
    if snapshot.http_response_ms() > thresholds.advisory_http_ms {
        out.push(Advisory::SlowResponses);
    }
    out
}

// ============================================================================
// Per-metric rating (display coloring)
// ============================================================================

/// Traffic-light rating of a single reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Good,
    Fair,
    Poor,
    Unknown,
}

fn rate(value: f64, good_below: f64, fair_below: f64) -> Rating {
    if value < 0.0 {
        Rating::Unknown
    } else if value < good_below {
        Rating::Good
    } else if value < fair_below {
        Rating::Fair
    } else {
        Rating::Poor
    }
}

pub fn rate_dns_ms(ms: f64) -> Rating {
    rate(ms, 100.0, 500.0)
}

pub fn rate_ping_ms(ms: f64) -> Rating {
    rate(ms, 50.0, 100.0)
}

pub fn rate_http_ms(ms: f64) -> Rating {
    rate(ms, 500.0, 1500.0)
}

pub fn rate_memory_pct(pct: f64) -> Rating {
    rate(pct, 70.0, 85.0)
}

/// Count rating against a warning and an advisory threshold
pub fn rate_count(count: i64, warn: i64, advisory: i64) -> Rating {
    rate(count as f64, warn as f64, advisory as f64)
}

// ============================================================================
// Cache status view
// ============================================================================

/// Which OS table a cache reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKind {
    DnsCache,
    ArpCache,
    NetbiosCache,
    TcpConnections,
}

impl CacheKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DnsCache => "DNS cache",
            Self::ArpCache => "ARP cache",
            Self::NetbiosCache => "NetBIOS cache",
            Self::TcpConnections => "TCP connections",
        }
    }

    /// Consequence of bloat in this table
    pub fn impact(&self) -> &'static str {
        match self {
            Self::DnsCache => "too many entries slow down DNS lookups",
            Self::ArpCache => "too many entries add address resolution latency",
            Self::NetbiosCache => "too many entries can affect name resolution",
            Self::TcpConnections => "too many connections consume system resources",
        }
    }

    pub fn threshold(&self, thresholds: &Thresholds) -> i64 {
        match self {
            Self::DnsCache => thresholds.warn_dns_cache,
            Self::ArpCache => thresholds.warn_arp_cache,
            Self::NetbiosCache => thresholds.warn_netbios_cache,
            Self::TcpConnections => thresholds.warn_tcp_connections,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheLevel {
    Normal,
    High,
    Unknown,
}

/// One row of the cache status view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheReading {
    pub kind: CacheKind,
    /// Entry count, or -1 when the table could not be read
    pub count: i64,
    pub threshold: i64,
    pub level: CacheLevel,
}

impl CacheReading {
    pub fn new(kind: CacheKind, count: i64, thresholds: &Thresholds) -> Self {
        let threshold = kind.threshold(thresholds);
        let level = if count < 0 {
            CacheLevel::Unknown
        } else if count > threshold {
            CacheLevel::High
        } else {
            CacheLevel::Normal
        };
        Self {
            kind,
            count: count.max(-1),
            threshold,
            level,
        }
    }
}
