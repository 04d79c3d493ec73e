//! Interactive menu loop
//!
//! Entered when netdocctl runs without a subcommand. Each entry maps to the
//! same code path as its subcommand; errors are printed and the loop goes on.

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize;

use netdoc_common::actions::candidates;
use netdoc_common::checks::Finding;
use netdoc_common::config::clamp_interval;
use netdoc_common::{ActionId, RepairMode};

use crate::commands::diagnose::{self, AfterDiagnosis};
use crate::commands::{monitor, optimize, repair, report, schedule, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Diagnose,
    QuickRepair,
    FullRepair,
    DiagnoseAndRepair,
    ProxyOff,
    ResetCatalog,
    Monitor,
    Compare,
    GuidedOptimize,
    CacheStatus,
    Optimize,
    ExportReport,
    Schedule,
    FullOptimize,
    TrialAction,
    NetworkDetails,
    Quit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 17] = [
        MenuChoice::Diagnose,
        MenuChoice::QuickRepair,
        MenuChoice::FullRepair,
        MenuChoice::DiagnoseAndRepair,
        MenuChoice::ProxyOff,
        MenuChoice::ResetCatalog,
        MenuChoice::Monitor,
        MenuChoice::Compare,
        MenuChoice::GuidedOptimize,
        MenuChoice::CacheStatus,
        MenuChoice::Optimize,
        MenuChoice::ExportReport,
        MenuChoice::Schedule,
        MenuChoice::FullOptimize,
        MenuChoice::TrialAction,
        MenuChoice::NetworkDetails,
        MenuChoice::Quit,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Diagnose => "1",
            Self::QuickRepair => "2",
            Self::FullRepair => "3",
            Self::DiagnoseAndRepair => "4",
            Self::ProxyOff => "5",
            Self::ResetCatalog => "6",
            Self::Monitor => "7",
            Self::Compare => "8",
            Self::GuidedOptimize => "9",
            Self::CacheStatus => "10",
            Self::Optimize => "11",
            Self::ExportReport => "12",
            Self::Schedule => "13",
            Self::FullOptimize => "14",
            Self::TrialAction => "15",
            Self::NetworkDetails => "16",
            Self::Quit => "0",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Diagnose => "Run diagnostics",
            Self::QuickRepair => "Quick repair (no restart)",
            Self::FullRepair => "Full repair (restart required)",
            Self::DiagnoseAndRepair => "Diagnose, then repair what was found",
            Self::ProxyOff => "Disable proxies only",
            Self::ResetCatalog => "Reset Winsock catalog only",
            Self::Monitor => "Realtime monitor",
            Self::Compare => "Performance comparison",
            Self::GuidedOptimize => "Guided repair (find the cause, fix only that)",
            Self::CacheStatus => "Cache status",
            Self::Optimize => "Quick optimize (clear caches)",
            Self::ExportReport => "Export diagnostic report",
            Self::Schedule => "Scheduled optimization",
            Self::FullOptimize => "Full optimize (caches, NetBIOS refresh, TCP tuning)",
            Self::TrialAction => "Measure a single action's effect",
            Self::NetworkDetails => "Detailed network information",
            Self::Quit => "Quit",
        }
    }

    /// Entry changes system settings
    pub fn needs_elevation(&self) -> bool {
        !matches!(
            self,
            Self::Diagnose
                | Self::Monitor
                | Self::CacheStatus
                | Self::ExportReport
                | Self::NetworkDetails
                | Self::Quit
        )
    }

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::ALL.iter().copied().find(|c| c.key() == input)
    }
}

/// Interval typed at the schedule prompt; empty means the configured default
pub fn parse_interval(input: &str) -> Option<u32> {
    input.trim().parse::<u32>().ok().map(clamp_interval)
}

/// Trialable action picked at the prompt, by list number or id
pub fn parse_action_choice(input: &str, choices: &[ActionId]) -> Option<ActionId> {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| choices.get(i)).copied();
    }
    input.parse::<ActionId>().ok().filter(|id| choices.contains(id))
}

fn print_menu(elevated: bool) {
    println!();
    println!("{}", "NetDoc - network diagnosis and repair".bold().cyan());
    println!("{}", "━".repeat(40).cyan());
    for choice in MenuChoice::ALL {
        let marker = if choice.needs_elevation() && !elevated { "*" } else { " " };
        println!(" {:>2}{} {}", choice.key(), marker.yellow(), choice.label());
    }
    if !elevated {
        println!();
        println!(
            "{} not running as administrator; entries marked * will fail",
            "!".yellow()
        );
    }
}

fn prompt(term: &Term, text: &str) -> Option<String> {
    term.write_str(text).ok()?;
    term.read_line().ok()
}

fn pause(term: &Term) {
    let _ = prompt(term, "\nPress Enter to continue...");
}

pub async fn run(ctx: &Context) -> Result<()> {
    let term = Term::stdout();
    let mut last_findings: Option<Vec<Finding>> = None;

    loop {
        print_menu(ctx.host.is_elevated());
        let Some(input) = prompt(&term, "\nSelect an option: ") else {
            break;
        };
        let Some(choice) = MenuChoice::parse(&input) else {
            println!("{} unknown option: {}", "✗".red(), input.trim());
            continue;
        };
        if choice == MenuChoice::Quit {
            break;
        }

        if let Err(e) = dispatch(ctx, &term, choice, &mut last_findings).await {
            eprintln!("{} {:#}", "error:".red().bold(), e);
        }
        pause(&term);
    }

    println!("Goodbye");
    Ok(())
}

async fn dispatch(
    ctx: &Context,
    term: &Term,
    choice: MenuChoice,
    last_findings: &mut Option<Vec<Finding>>,
) -> Result<()> {
    match choice {
        MenuChoice::Diagnose => {
            *last_findings = Some(diagnose::diagnose(ctx, AfterDiagnosis::Offer).await?);
        }
        MenuChoice::QuickRepair => repair::repair(ctx, RepairMode::Quick, false).await?,
        MenuChoice::FullRepair => repair::repair(ctx, RepairMode::Full, false).await?,
        MenuChoice::DiagnoseAndRepair => {
            *last_findings = Some(diagnose::diagnose(ctx, AfterDiagnosis::Repair).await?);
        }
        MenuChoice::ProxyOff => repair::proxy_off(ctx).await?,
        MenuChoice::ResetCatalog => repair::reset_catalog(ctx, false).await?,
        MenuChoice::Monitor => monitor::monitor(ctx, None).await?,
        MenuChoice::Compare => optimize::compare(ctx).await?,
        MenuChoice::GuidedOptimize => repair::repair(ctx, RepairMode::Guided, false).await?,
        MenuChoice::CacheStatus => optimize::cache(ctx).await?,
        MenuChoice::Optimize => optimize::optimize(ctx, false).await?,
        MenuChoice::FullOptimize => optimize::optimize(ctx, true).await?,
        MenuChoice::TrialAction => trial_menu(ctx, term).await?,
        MenuChoice::NetworkDetails => optimize::details(ctx).await?,
        MenuChoice::ExportReport => {
            report::export(ctx, last_findings.as_deref(), None).await?;
        }
        MenuChoice::Schedule => schedule_menu(ctx, term).await?,
        MenuChoice::Quit => {}
    }
    Ok(())
}

async fn trial_menu(ctx: &Context, term: &Term) -> Result<()> {
    let choices = candidates();
    println!();
    for (i, id) in choices.iter().enumerate() {
        println!("  {} {}", i + 1, id.action().description);
    }

    let picked = prompt(term, "Action to measure (blank to go back): ")
        .and_then(|input| parse_action_choice(&input, &choices));
    match picked {
        Some(id) => repair::attribute(ctx, Some(id)).await,
        None => Ok(()),
    }
}

async fn schedule_menu(ctx: &Context, term: &Term) -> Result<()> {
    println!();
    println!("  1 Install scheduled quick repair");
    println!("  2 Remove scheduled quick repair");
    println!("  0 Back");

    match prompt(term, "Select: ").as_deref().map(str::trim) {
        Some("1") => {
            let default = ctx.config.schedule.effective_interval_minutes();
            let text = format!("Interval in minutes (30/60/120/240, default {}): ", default);
            let interval = prompt(term, &text).and_then(|i| parse_interval(&i));
            schedule::install(ctx, interval).await
        }
        Some("2") => schedule::remove(ctx).await,
        _ => Ok(()),
    }
}
