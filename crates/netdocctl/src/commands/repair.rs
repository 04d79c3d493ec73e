//! Repair commands
//!
//! Quick, full and guided repair, the single-purpose proxy and catalog
//! resets, and the standalone attribution run.

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use netdoc_common::actions::{self, HostExecutor, Plan};
use netdoc_common::attribution::{ActionTrial, AttributionEngine, TrialObserver};
use netdoc_common::host::Capability;
use netdoc_common::orchestrator::{Orchestrator, RemediationTally, RepairMode};
use netdoc_common::ActionId;

use super::{confirm, Context};
use crate::display;

/// Progress bar fed by the attribution engine
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(total: usize, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TrialObserver for ProgressObserver {
    fn trial_started(&self, _index: usize, _total: usize, action: ActionId) {
        self.bar.set_message(format!("trialing {}", action));
    }

    fn trial_finished(&self, _index: usize, _total: usize, trial: &ActionTrial) {
        self.bar.inc(1);
        if let Some(err) = &trial.apply_error {
            self.bar.println(format!("  {} {} failed: {}", "✗".red(), trial.action_id, err));
        }
    }
}

/// Print a tally, or its JSON form
pub(crate) fn report_tally(ctx: &Context, tally: &RemediationTally, plan: Option<Plan>) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(tally)?);
        return Ok(());
    }

    display::print_tally(tally);
    if let Some(plan) = plan {
        if !tally.meets(plan.min_successes()) {
            println!(
                "  {} most actions failed; check that netdocctl runs as administrator",
                "!".yellow()
            );
        }
    }
    Ok(())
}

/// One confirm prompt after restart-requiring actions were applied
pub async fn offer_restart(ctx: &Context, tally: &RemediationTally) {
    if ctx.json || !tally.restart_pending() {
        return;
    }

    if !confirm("Restart now to finish the repair?") {
        println!("Restart later to finish the repair");
        return;
    }

    let result = ctx.host.invoke(Capability::Restart).await;
    if result.success() {
        println!("Restarting in 5 seconds...");
    } else {
        println!("{} restart failed: {}", "✗".red(), result.failure_reason());
    }
}

pub async fn repair(ctx: &Context, mode: RepairMode, yes: bool) -> Result<()> {
    ctx.require_environment()?;
    ctx.require_elevated()?;

    let executor = HostExecutor::new(ctx.host.clone());
    let orchestrator = Orchestrator::new(&executor);

    let (tally, plan) = match mode {
        RepairMode::Quick => (orchestrator.apply_plan(Plan::Quick).await?, Some(Plan::Quick)),
        RepairMode::Full => {
            if !yes && !ctx.json {
                println!(
                    "{} Full repair resets the Winsock catalog and the IP stack (restart needed)",
                    "!".yellow()
                );
                println!("  and briefly drops the connection while the DHCP lease is renewed.");
                if !confirm("Continue?") {
                    println!("Cancelled");
                    return Ok(());
                }
            }
            (orchestrator.apply_plan(Plan::Full).await?, Some(Plan::Full))
        }
        RepairMode::Guided => {
            let sampler = ctx.sampler();
            let engine = AttributionEngine::new(&sampler, &executor, &ctx.config.engine);
            let candidates = actions::candidates();
            let observer = ProgressObserver::new(candidates.len(), ctx.json);

            let outcome = orchestrator.guided(&engine, &candidates, &observer).await;
            observer.finish();
            let outcome = outcome?;

            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            display::print_attribution(&outcome.report);
            if outcome.fell_back_to_full {
                println!("No single action stood out; the full repair was applied instead.");
            }
            (outcome.tally, None)
        }
    };

    report_tally(ctx, &tally, plan)?;
    offer_restart(ctx, &tally).await;
    Ok(())
}

pub async fn proxy_off(ctx: &Context) -> Result<()> {
    ctx.require_environment()?;
    ctx.require_elevated()?;

    let executor = HostExecutor::new(ctx.host.clone());
    let tally = Orchestrator::new(&executor).apply_plan(Plan::ProxyOnly).await?;
    report_tally(ctx, &tally, Some(Plan::ProxyOnly))
}

pub async fn reset_catalog(ctx: &Context, yes: bool) -> Result<()> {
    ctx.require_environment()?;
    ctx.require_elevated()?;

    if !yes && !ctx.json && !confirm("Reset the Winsock catalog? A restart is needed afterwards") {
        println!("Cancelled");
        return Ok(());
    }

    let executor = HostExecutor::new(ctx.host.clone());
    let tally = Orchestrator::new(&executor).apply_plan(Plan::CatalogOnly).await?;
    report_tally(ctx, &tally, Some(Plan::CatalogOnly))?;
    offer_restart(ctx, &tally).await;
    Ok(())
}

/// Trial every candidate, or just `only`, and print the ranking without a
/// follow-up repair
pub async fn attribute(ctx: &Context, only: Option<ActionId>) -> Result<()> {
    ctx.require_environment()?;
    ctx.require_elevated()?;

    let candidates = match only {
        Some(id) if !actions::candidates().contains(&id) => {
            bail!("{} cannot be trialed in isolation", id)
        }
        Some(id) => vec![id],
        None => actions::candidates(),
    };

    let executor = HostExecutor::new(ctx.host.clone());
    let sampler = ctx.sampler();
    let engine = AttributionEngine::new(&sampler, &executor, &ctx.config.engine);

    if !ctx.json {
        println!(
            "Trialing {} action(s) one at a time ({} s settle each)...",
            candidates.len(),
            ctx.config.engine.stabilization().as_secs()
        );
    }

    let observer = ProgressObserver::new(candidates.len(), ctx.json);
    let report = engine.run(&candidates, &observer).await;
    observer.finish();
    let report = report?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display::print_attribution(&report);
    }
    Ok(())
}
