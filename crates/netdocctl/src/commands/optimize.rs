//! Optimization and measurement commands

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use netdoc_common::actions::{HostExecutor, Plan};
use netdoc_common::health::{self, advisories};
use netdoc_common::host::Capability;
use netdoc_common::parsers;
use netdoc_common::orchestrator::Orchestrator;
use netdoc_common::sampler::{self, MetricSource, AVERAGE_SPACING};
use netdoc_common::snapshot::{self, Snapshot};

use super::repair::report_tally;
use super::Context;
use crate::display;

/// Settle time between optimizing and measuring again
const COMPARE_SETTLE: Duration = Duration::from_secs(3);

/// Snapshots averaged on each side of a comparison
const COMPARE_RUNS: usize = 3;

/// Clear the caches; `full` adds the NetBIOS refresh and TCP tuning
pub async fn optimize(ctx: &Context, full: bool) -> Result<()> {
    ctx.require_environment()?;
    ctx.require_elevated()?;

    let plan = if full { Plan::FullOptimize } else { Plan::Optimize };
    let executor = HostExecutor::new(ctx.host.clone());
    let tally = Orchestrator::new(&executor).apply_plan(plan).await?;
    report_tally(ctx, &tally, Some(plan))
}

pub async fn cache(ctx: &Context) -> Result<()> {
    let readings =
        sampler::cache_status(ctx.host.as_ref(), &ctx.config.thresholds, &ctx.config.timeouts).await;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&readings)?);
    } else {
        display::print_cache_status(&readings);
    }
    Ok(())
}

/// Adapters, gateways and TCP states; a failed query leaves its part empty
#[derive(Debug, Default, Serialize)]
pub struct NetworkDetails {
    pub adapters: Vec<String>,
    pub gateways: Vec<String>,
    pub tcp_states: Vec<(String, usize)>,
}

pub async fn collect_details(ctx: &Context) -> NetworkDetails {
    let (ipconfig, netstat) = tokio::join!(
        ctx.host.invoke(Capability::ShowIpConfig),
        ctx.host.invoke(Capability::ShowTcpConnections),
    );

    let mut details = NetworkDetails::default();
    if ipconfig.success() {
        details.adapters = parsers::adapters_with_ipv4(&ipconfig.stdout);
        details.gateways = parsers::default_gateways(&ipconfig.stdout);
    } else {
        tracing::debug!("ipconfig failed: {}", ipconfig.failure_reason());
    }
    if netstat.success() && !netstat.stdout_truncated {
        details.tcp_states = parsers::tcp_state_counts(&netstat.stdout);
    } else {
        tracing::debug!("netstat unusable: {}", netstat.failure_reason());
    }
    details
}

pub async fn details(ctx: &Context) -> Result<()> {
    let details = collect_details(ctx).await;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        display::print_details(&details.adapters, &details.gateways, &details.tcp_states);
    }
    Ok(())
}

async fn measure(ctx: &Context, runs: usize) -> Snapshot {
    let sampler = ctx.sampler();
    if runs <= 1 {
        sampler.sample().await
    } else {
        sampler::sample_averaged(&sampler, runs, AVERAGE_SPACING).await
    }
}

pub async fn sample(ctx: &Context, runs: usize) -> Result<()> {
    let snapshot = measure(ctx, runs).await;

    if ctx.json {
        let thresholds = &ctx.config.thresholds;
        let notes: Vec<&str> = advisories(&snapshot, thresholds)
            .iter()
            .map(|a| a.message())
            .collect();
        let output = json!({
            "snapshot": snapshot,
            "status": health::classify_with(&snapshot, thresholds),
            "advisories": notes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        display::print_snapshot(&snapshot, &ctx.config.thresholds);
    }
    Ok(())
}

/// Measure, clear caches, settle, measure again
pub async fn compare(ctx: &Context) -> Result<()> {
    ctx.require_environment()?;
    ctx.require_elevated()?;

    if !ctx.json {
        println!("Measuring current performance...");
    }
    let before = measure(ctx, COMPARE_RUNS).await;

    let executor = HostExecutor::new(ctx.host.clone());
    let tally = Orchestrator::new(&executor).apply_plan(Plan::Optimize).await?;

    if !ctx.json {
        println!("Waiting {} s for the network to settle...", COMPARE_SETTLE.as_secs());
    }
    tokio::time::sleep(COMPARE_SETTLE).await;
    let after = measure(ctx, COMPARE_RUNS).await;
    let deltas = snapshot::compare(&before, &after);

    if ctx.json {
        let output = json!({
            "before": before,
            "after": after,
            "optimize": tally,
            "deltas": deltas,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        display::print_tally(&tally);
        display::print_comparison(&deltas);
    }
    Ok(())
}
