//! Point-in-time network health snapshot
//!
//! Every numeric reading is either a valid non-negative measurement or
//! exactly [`SENTINEL`], meaning "measurement failed". A snapshot is built
//! once from [`Readings`] and never changes afterwards.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Marker for a measurement that failed (distinct from a measured zero)
pub const SENTINEL: f64 = -1.0;

/// Integer form of [`SENTINEL`] for count readings
pub const SENTINEL_COUNT: i64 = -1;

/// Raw readings gathered by a sampler; `None` means the measurement failed
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readings {
    pub dns_resolve_ms: Option<f64>,
    pub ping_ms: Option<f64>,
    pub http_response_ms: Option<f64>,
    pub tcp_connection_count: Option<i64>,
    pub dns_cache_entries: Option<i64>,
    pub arp_cache_entries: Option<i64>,
    pub memory_used_pct: Option<f64>,
}

/// Deserialization goes through [`Snapshot::at`], so stored values obey the
/// same sentinel rules as measured ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotRecord")]
pub struct Snapshot {
    timestamp: DateTime<Local>,
    dns_resolve_ms: f64,
    ping_ms: f64,
    http_response_ms: f64,
    tcp_connection_count: i64,
    dns_cache_entries: i64,
    arp_cache_entries: i64,
    memory_used_pct: f64,
}

/// Wire form of a [`Snapshot`]
#[derive(Deserialize)]
struct SnapshotRecord {
    timestamp: DateTime<Local>,
    dns_resolve_ms: f64,
    ping_ms: f64,
    http_response_ms: f64,
    tcp_connection_count: i64,
    dns_cache_entries: i64,
    arp_cache_entries: i64,
    memory_used_pct: f64,
}

impl From<SnapshotRecord> for Snapshot {
    fn from(r: SnapshotRecord) -> Self {
        Snapshot::at(
            r.timestamp,
            Readings {
                dns_resolve_ms: Some(r.dns_resolve_ms),
                ping_ms: Some(r.ping_ms),
                http_response_ms: Some(r.http_response_ms),
                tcp_connection_count: Some(r.tcp_connection_count),
                dns_cache_entries: Some(r.dns_cache_entries),
                arp_cache_entries: Some(r.arp_cache_entries),
                memory_used_pct: Some(r.memory_used_pct),
            },
        )
    }
}

fn ms(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => SENTINEL,
    }
}

fn count(value: Option<i64>) -> i64 {
    match value {
        Some(v) if v >= 0 => v,
        _ => SENTINEL_COUNT,
    }
}

fn valid_ms(value: f64) -> Option<f64> {
    (value >= 0.0).then_some(value)
}

fn valid_count(value: i64) -> Option<i64> {
    (value >= 0).then_some(value)
}

impl Snapshot {
    /// Build a snapshot stamped with the current local time
    pub fn new(readings: Readings) -> Self {
        Self::at(Local::now(), readings)
    }

    /// Build a snapshot with an explicit timestamp
    ///
    /// Negative or non-finite readings collapse to the sentinel.
    pub fn at(timestamp: DateTime<Local>, readings: Readings) -> Self {
        Self {
            timestamp,
            dns_resolve_ms: ms(readings.dns_resolve_ms),
            ping_ms: ms(readings.ping_ms),
            http_response_ms: ms(readings.http_response_ms),
            tcp_connection_count: count(readings.tcp_connection_count),
            dns_cache_entries: count(readings.dns_cache_entries),
            arp_cache_entries: count(readings.arp_cache_entries),
            memory_used_pct: ms(readings.memory_used_pct).min(100.0),
        }
    }

    /// A snapshot in which every measurement failed
    pub fn failed() -> Self {
        Self::new(Readings::default())
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn dns_resolve_ms(&self) -> f64 {
        self.dns_resolve_ms
    }

    pub fn ping_ms(&self) -> f64 {
        self.ping_ms
    }

    pub fn http_response_ms(&self) -> f64 {
        self.http_response_ms
    }

    pub fn tcp_connection_count(&self) -> i64 {
        self.tcp_connection_count
    }

    pub fn dns_cache_entries(&self) -> i64 {
        self.dns_cache_entries
    }

    pub fn arp_cache_entries(&self) -> i64 {
        self.arp_cache_entries
    }

    pub fn memory_used_pct(&self) -> f64 {
        self.memory_used_pct
    }

    /// The snapshot's readings, with sentinels mapped back to `None`
    pub fn readings(&self) -> Readings {
        Readings {
            dns_resolve_ms: valid_ms(self.dns_resolve_ms),
            ping_ms: valid_ms(self.ping_ms),
            http_response_ms: valid_ms(self.http_response_ms),
            tcp_connection_count: valid_count(self.tcp_connection_count),
            dns_cache_entries: valid_count(self.dns_cache_entries),
            arp_cache_entries: valid_count(self.arp_cache_entries),
            memory_used_pct: valid_ms(self.memory_used_pct),
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

fn mean_f(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let valid: Vec<f64> = values.flatten().collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }
}

fn mean_i(values: impl Iterator<Item = Option<i64>>) -> Option<i64> {
    mean_f(values.map(|v| v.map(|n| n as f64))).map(|m| m.round() as i64)
}

/// Field-wise mean over valid readings, stamped with the last timestamp
///
/// A field is sentinel only when every snapshot failed it. Returns `None`
/// for an empty slice.
pub fn average(snapshots: &[Snapshot]) -> Option<Snapshot> {
    let last = snapshots.last()?;
    let readings: Vec<Readings> = snapshots.iter().map(Snapshot::readings).collect();

    Some(Snapshot::at(
        last.timestamp,
        Readings {
            dns_resolve_ms: mean_f(readings.iter().map(|r| r.dns_resolve_ms)),
            ping_ms: mean_f(readings.iter().map(|r| r.ping_ms)),
            http_response_ms: mean_f(readings.iter().map(|r| r.http_response_ms)),
            tcp_connection_count: mean_i(readings.iter().map(|r| r.tcp_connection_count)),
            dns_cache_entries: mean_i(readings.iter().map(|r| r.dns_cache_entries)),
            arp_cache_entries: mean_i(readings.iter().map(|r| r.arp_cache_entries)),
            memory_used_pct: mean_f(readings.iter().map(|r| r.memory_used_pct)),
        },
    ))
}

// ============================================================================
// Before/after comparison
// ============================================================================

/// Change in one metric between two snapshots (lower is better)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    pub unit: String,
    pub before: f64,
    pub after: f64,
    /// Positive means improved; `None` when either side failed or before is zero
    pub improvement_pct: Option<f64>,
}

impl MetricDelta {
    fn new(metric: &str, unit: &str, before: f64, after: f64) -> Self {
        let improvement_pct = if before > 0.0 && after >= 0.0 {
            Some((before - after) * 100.0 / before)
        } else {
            None
        };
        Self {
            metric: metric.to_string(),
            unit: unit.to_string(),
            before,
            after,
            improvement_pct,
        }
    }

    /// Both sides carry a valid measurement
    pub fn comparable(&self) -> bool {
        self.before >= 0.0 && self.after >= 0.0
    }
}

/// Compare the latency and cache metrics of two snapshots
pub fn compare(before: &Snapshot, after: &Snapshot) -> Vec<MetricDelta> {
    vec![
        MetricDelta::new("DNS resolve time", "ms", before.dns_resolve_ms, after.dns_resolve_ms),
        MetricDelta::new("Ping latency", "ms", before.ping_ms, after.ping_ms),
        MetricDelta::new("HTTP response time", "ms", before.http_response_ms, after.http_response_ms),
        MetricDelta::new(
            "DNS cache entries",
            "entries",
            before.dns_cache_entries as f64,
            after.dns_cache_entries as f64,
        ),
        MetricDelta::new(
            "ARP cache entries",
            "entries",
            before.arp_cache_entries as f64,
            after.arp_cache_entries as f64,
        ),
    ]
}
