//! Command modules for netdocctl
//!
//! - diagnose: check set, optional targeted repair
//! - repair: quick/full/guided plans, proxy-off, catalog reset, attribution
//! - optimize: cache clearing, cache view, network details, sampling,
//!   before/after comparison
//! - monitor: realtime health with trend
//! - schedule: scheduled task install/remove and the unattended run
//! - report: text report export

pub mod diagnose;
pub mod monitor;
pub mod optimize;
pub mod repair;
pub mod report;
pub mod schedule;

use anyhow::Result;
use console::Term;
use std::sync::Arc;

use netdoc_common::host::{self, NetworkHost};
use netdoc_common::{MetricSampler, NetDocConfig, NetDocError, WindowsHost};

use crate::cli::{Commands, ScheduleCommands};

/// Everything a command needs: config, host and output mode
pub struct Context {
    pub config: NetDocConfig,
    pub host: Arc<dyn NetworkHost>,
    pub json: bool,
}

impl Context {
    pub fn new(config: NetDocConfig, json: bool) -> Self {
        let host: Arc<dyn NetworkHost> = Arc::new(WindowsHost::new(&config));
        Self::with_host(config, host, json)
    }

    pub fn with_host(config: NetDocConfig, host: Arc<dyn NetworkHost>, json: bool) -> Self {
        Self { config, host, json }
    }

    pub fn sampler(&self) -> MetricSampler {
        MetricSampler::new(self.host.clone(), &self.config)
    }

    /// Refuse before touching anything when settings cannot be changed
    pub fn require_elevated(&self) -> Result<()> {
        if !self.host.is_elevated() {
            return Err(NetDocError::NotElevated.into());
        }
        Ok(())
    }

    /// Refuse when the network utilities are not installed
    pub fn require_environment(&self) -> Result<()> {
        host::check_environment()?;
        Ok(())
    }
}

/// Accepts y/yes (any case); everything else is no
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ask a yes/no question; unreadable input counts as no
pub fn confirm(question: &str) -> bool {
    let term = Term::stdout();
    if term.write_str(&format!("{} [y/N]: ", question)).is_err() {
        return false;
    }
    term.read_line().map(|l| is_affirmative(&l)).unwrap_or(false)
}

pub async fn dispatch(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Diagnose { repair } => {
            let after = if repair {
                diagnose::AfterDiagnosis::Repair
            } else {
                diagnose::AfterDiagnosis::Report
            };
            diagnose::diagnose(ctx, after).await.map(|_| ())
        }
        Commands::Repair { mode, yes } => repair::repair(ctx, mode.into(), yes).await,
        Commands::ProxyOff => repair::proxy_off(ctx).await,
        Commands::ResetCatalog { yes } => repair::reset_catalog(ctx, yes).await,
        Commands::Optimize { full } => optimize::optimize(ctx, full).await,
        Commands::Cache => optimize::cache(ctx).await,
        Commands::Details => optimize::details(ctx).await,
        Commands::Sample { runs } => optimize::sample(ctx, runs).await,
        Commands::Monitor { interval } => monitor::monitor(ctx, interval).await,
        Commands::Compare => optimize::compare(ctx).await,
        Commands::Attribute { action } => repair::attribute(ctx, action).await,
        Commands::Export { output } => report::export(ctx, None, output).await.map(|_| ()),
        Commands::Schedule { action } => match action {
            ScheduleCommands::Install { interval } => schedule::install(ctx, interval).await,
            ScheduleCommands::Remove => schedule::remove(ctx).await,
        },
        Commands::ScheduledRun => schedule::scheduled_run(ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES\n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
    }
}
