//! Realtime monitor
//!
//! Samples on a fixed interval, keeps a bounded in-memory history and
//! reports whether HTTP latency is drifting upwards. Nothing is persisted.

use anyhow::Result;
use serde_json::json;
use std::time::Duration;

use netdoc_common::health;
use netdoc_common::sampler::MetricSource;
use netdoc_common::trend::{Trend, TrendTracker};

use super::Context;
use crate::display;

/// Refresh interval: the flag if given, else config, clamped to 5-3600 s
pub fn refresh_secs(ctx: &Context, interval: Option<u64>) -> u64 {
    let mut monitor = ctx.config.monitor.clone();
    if let Some(secs) = interval {
        monitor.refresh_secs = secs;
    }
    monitor.effective_refresh_secs()
}

pub async fn monitor(ctx: &Context, interval: Option<u64>) -> Result<()> {
    let refresh = refresh_secs(ctx, interval);
    let sampler = ctx.sampler();
    let mut tracker = TrendTracker::new();
    let thresholds = &ctx.config.thresholds;

    if !ctx.json {
        println!("Monitoring every {} s, press Ctrl+C to stop", refresh);
    }

    loop {
        let snapshot = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            snapshot = sampler.sample() => snapshot,
        };
        tracker.record(snapshot.clone());
        let trend = tracker.analyze();

        if ctx.json {
            let line = json!({
                "snapshot": snapshot,
                "status": health::classify_with(&snapshot, thresholds),
                "trend": trend,
            });
            println!("{}", serde_json::to_string(&line)?);
        } else {
            display::print_monitor_line(&snapshot, thresholds, &trend);
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(refresh)) => {}
        }
    }

    if !ctx.json {
        println!();
        println!("Stopped after {} samples", tracker.len());
        if let Trend::Degrading { http_increase_pct } = tracker.analyze() {
            println!(
                "HTTP response time rose {:.0}% over the session; try `netdocctl optimize`",
                http_increase_pct
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdoc_common::NetDocConfig;

    #[test]
    fn test_refresh_secs_clamped() {
        let ctx = Context::new(NetDocConfig::default(), false);
        assert_eq!(refresh_secs(&ctx, None), 30);
        assert_eq!(refresh_secs(&ctx, Some(1)), 5);
        assert_eq!(refresh_secs(&ctx, Some(120)), 120);
        assert_eq!(refresh_secs(&ctx, Some(100_000)), 3600);
    }
}
