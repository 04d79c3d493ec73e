//! Diagnose command
//!
//! Runs the fixed check list, prints the findings, and optionally applies
//! the actions that address them.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;

use netdoc_common::actions::HostExecutor;
use netdoc_common::checks::{self, default_checks, run_checks, Finding};
use netdoc_common::orchestrator::{Orchestrator, RemediationTally};

use super::{confirm, repair, Context};
use crate::display;

/// What to do once the findings are in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterDiagnosis {
    /// Print only
    Report,
    /// Ask before repairing
    Offer,
    /// Repair without asking
    Repair,
}

#[derive(Serialize)]
struct DiagnosisOutput<'a> {
    findings: &'a [Finding],
    issue_count: usize,
    repair_offered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    repair: Option<&'a RemediationTally>,
}

/// Run every check, showing progress unless output is JSON
pub async fn run_diagnostics(ctx: &Context) -> Vec<Finding> {
    let checks = default_checks();
    let total = checks.len();
    let show_progress = !ctx.json;
    let mut started = 0;

    run_checks(&checks, ctx.host.as_ref(), &ctx.config, |check| {
        started += 1;
        if show_progress {
            println!("{} {}...", format!("[{}/{}]", started, total).dimmed(), check.progress_label());
        }
    })
    .await
}

pub async fn diagnose(ctx: &Context, after: AfterDiagnosis) -> Result<Vec<Finding>> {
    let findings = run_diagnostics(ctx).await;
    let offered = checks::repair_offered(&findings);

    if !ctx.json {
        display::print_findings(&findings);
    }

    let proceed = offered
        && match after {
            AfterDiagnosis::Report => false,
            AfterDiagnosis::Offer => !ctx.json && confirm("Apply automatic repair for these issues?"),
            AfterDiagnosis::Repair => true,
        };

    let tally = if proceed {
        ctx.require_environment()?;
        let executor = HostExecutor::new(ctx.host.clone());
        Some(Orchestrator::new(&executor).repair_findings(&findings).await?)
    } else {
        None
    };

    if ctx.json {
        let output = DiagnosisOutput {
            findings: &findings,
            issue_count: checks::issue_count(&findings),
            repair_offered: offered,
            repair: tally.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(tally) = &tally {
        display::print_tally(tally);
        repair::offer_restart(ctx, tally).await;
    } else if offered && after == AfterDiagnosis::Report {
        println!("Run `netdocctl diagnose --repair` to fix the issues found");
    }

    Ok(findings)
}
