//! Scheduled quick repair
//!
//! `install`/`remove` manage an OS scheduled task that invokes the hidden
//! `scheduled-run` subcommand, which applies the Quick plan silently and
//! logs to a file.

use anyhow::{bail, Context as _, Result};
use std::path::Path;
use tracing::{info, warn};

use netdoc_common::actions::{HostExecutor, Plan};
use netdoc_common::config::{clamp_interval, ScheduleConfig};
use netdoc_common::host::ScheduledTask;
use netdoc_common::orchestrator::Orchestrator;

use super::Context;
use crate::logging;

/// Subcommand the scheduler invokes
pub const SCHEDULED_SUBCOMMAND: &str = "scheduled-run";

/// Task definition for the given executable
pub fn build_task(config: &ScheduleConfig, interval: Option<u32>, exe: &Path) -> ScheduledTask {
    let interval_minutes = interval
        .map(clamp_interval)
        .unwrap_or_else(|| config.effective_interval_minutes());

    ScheduledTask {
        name: config.task_name.clone(),
        interval_minutes,
        command: format!("\"{}\" {}", exe.display(), SCHEDULED_SUBCOMMAND),
    }
}

pub async fn install(ctx: &Context, interval: Option<u32>) -> Result<()> {
    ctx.require_environment()?;
    ctx.require_elevated()?;

    let exe = std::env::current_exe().context("locating the netdocctl executable")?;
    let task = build_task(&ctx.config.schedule, interval, &exe);

    let result = ctx.host.install_schedule(&task).await;
    if !result.success() {
        bail!("could not create scheduled task {}: {}", task.name, result.failure_reason());
    }

    println!(
        "✓ Task {} runs the quick repair every {} minutes",
        task.name, task.interval_minutes
    );
    println!("  Log: {}", logging::scheduled_log_path().display());
    Ok(())
}

pub async fn remove(ctx: &Context) -> Result<()> {
    ctx.require_environment()?;
    ctx.require_elevated()?;

    let name = &ctx.config.schedule.task_name;
    let result = ctx.host.remove_schedule(name).await;
    if !result.success() {
        bail!("could not delete scheduled task {}: {}", name, result.failure_reason());
    }

    println!("✓ Task {} removed", name);
    Ok(())
}

/// Unattended Quick plan; output goes to the log only
pub async fn scheduled_run(ctx: &Context) -> Result<()> {
    info!("Scheduled quick repair starting");
    ctx.require_environment()?;

    let executor = HostExecutor::new(ctx.host.clone());
    let tally = Orchestrator::new(&executor).apply_plan(Plan::Quick).await?;

    for result in &tally.results {
        if result.success() {
            info!("{}: ok", result.action_id);
        } else {
            warn!(
                "{}: {}",
                result.action_id,
                result.error.as_deref().unwrap_or("post-condition not met")
            );
        }
    }
    info!("Scheduled quick repair finished: {}", tally.summary());
    Ok(())
}
