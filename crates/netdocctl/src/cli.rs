//! CLI - Command-line argument parsing
//!
//! Every interactive menu entry is also a subcommand. Running without a
//! subcommand starts the menu.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use netdoc_common::actions::candidates;
use netdoc_common::{ActionId, RepairMode};

/// NetDoc CLI
#[derive(Parser, Debug)]
#[command(name = "netdocctl")]
#[command(about = "NetDoc - network diagnosis and causal remediation", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (overrides $NETDOC_CONFIG and the default location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Machine-readable output where supported
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand (if not provided, starts the interactive menu)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run every diagnostic check
    Diagnose {
        /// Apply the fixes for the issues found
        #[arg(long)]
        repair: bool,
    },

    /// Apply a repair plan
    Repair {
        #[arg(long, value_enum, default_value_t = ModeArg::Quick)]
        mode: ModeArg,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Disable the system and WinHTTP proxies
    ProxyOff,

    /// Reset the Winsock catalog (needs a restart)
    ResetCatalog {
        #[arg(short, long)]
        yes: bool,
    },

    /// Clear DNS, ARP and NetBIOS caches
    Optimize {
        /// Also refresh NetBIOS names and tune TCP globals
        #[arg(long)]
        full: bool,
    },

    /// Show cache and connection table sizes
    Cache,

    /// Show adapters, default gateways and TCP connection states
    Details,

    /// Take one health snapshot
    Sample {
        /// Average this many snapshots
        #[arg(long, default_value_t = 1)]
        runs: usize,
    },

    /// Watch health and trend until Ctrl+C
    Monitor {
        /// Seconds between snapshots
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Measure, optimize, measure again
    Compare,

    /// Trial each safe action in isolation and rank the effects
    Attribute {
        /// Trial only this action (e.g. flush-dns-cache)
        #[arg(long, value_parser = parse_trialable)]
        action: Option<ActionId>,
    },

    /// Run diagnostics and write a text report
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the scheduled quick repair
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommands,
    },

    /// Unattended quick repair (invoked by the task scheduler)
    #[command(hide = true)]
    ScheduledRun,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleCommands {
    /// Register the periodic task
    Install {
        /// Minutes between runs (1-1440)
        #[arg(long)]
        interval: Option<u32>,
    },

    /// Delete the periodic task
    Remove,
}

/// An action id the attribution engine may trial on its own
pub fn parse_trialable(input: &str) -> Result<ActionId, String> {
    let id: ActionId = input.parse()?;
    let allowed = candidates();
    if allowed.contains(&id) {
        return Ok(id);
    }

    let names: Vec<&str> = allowed.iter().map(|a| a.as_str()).collect();
    Err(format!("{} cannot be trialed; choose one of: {}", id, names.join(", ")))
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Quick,
    Full,
    Guided,
}

impl From<ModeArg> for RepairMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Quick => RepairMode::Quick,
            ModeArg::Full => RepairMode::Full,
            ModeArg::Guided => RepairMode::Guided,
        }
    }
}
