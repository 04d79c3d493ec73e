//! Trend Tracker
//!
//! Bounded in-memory history used by the realtime monitor. Nothing here is
//! persisted.

use serde::Serialize;
use std::collections::VecDeque;

use crate::snapshot::Snapshot;

/// Snapshots retained
pub const HISTORY_CAPACITY: usize = 100;

/// Snapshots per comparison window
const WINDOW: usize = 10;

/// Recent mean must exceed the previous mean by this factor to count as degrading
const DEGRADE_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Trend {
    InsufficientData,
    Stable {
        avg_http_ms: Option<f64>,
        avg_dns_ms: Option<f64>,
    },
    Degrading {
        /// Increase of the recent HTTP mean over the previous window
        http_increase_pct: f64,
    },
}

#[derive(Debug, Clone)]
pub struct TrendTracker {
    history: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for TrendTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let valid: Vec<f64> = values.filter(|v| *v >= 0.0).collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }
}

impl TrendTracker {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2 * WINDOW);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest beyond capacity
    pub fn record(&mut self, snapshot: Snapshot) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.history.back()
    }

    /// Compare the last window against the one before it
    ///
    /// Fewer than two snapshots is `InsufficientData`; degradation needs two
    /// full windows.
    pub fn analyze(&self) -> Trend {
        let n = self.history.len();
        if n < 2 {
            return Trend::InsufficientData;
        }

        let recent_start = n.saturating_sub(WINDOW);
        let recent_http = mean(self.history.range(recent_start..).map(|s| s.http_response_ms()));
        let recent_dns = mean(self.history.range(recent_start..).map(|s| s.dns_resolve_ms()));

        if n >= 2 * WINDOW {
            let older_http = mean(
                self.history
                    .range(n - 2 * WINDOW..recent_start)
                    .map(|s| s.http_response_ms()),
            );

            if let (Some(recent), Some(older)) = (recent_http, older_http) {
                if older > 0.0 && recent > older * DEGRADE_FACTOR {
                    return Trend::Degrading {
                        http_increase_pct: (recent - older) * 100.0 / older,
                    };
                }
            }
        }

        Trend::Stable {
            avg_http_ms: recent_http,
            avg_dns_ms: recent_dns,
        }
    }
}
