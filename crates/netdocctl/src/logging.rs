//! Tracing setup for netdocctl
//!
//! Interactive runs log to stderr at `warn` so diagnostics stay readable.
//! Unattended scheduled runs log to `<data_dir>/scheduled.log` instead of
//! the terminal.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use netdoc_common::config;

/// Environment variable holding a filter directive, e.g. `netdoc_common=debug`
pub const LOG_ENV: &str = "NETDOC_LOG";

const SCHEDULED_LOG_FILE: &str = "scheduled.log";

/// Filter directive: `-v` wins, then `$NETDOC_LOG`, then `default`
pub fn directive(verbose: bool, env_value: Option<String>, default: &str) -> String {
    if verbose {
        return "debug".to_string();
    }
    env_value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn filter(verbose: bool, default: &str) -> EnvFilter {
    let wanted = directive(verbose, std::env::var(LOG_ENV).ok(), default);
    EnvFilter::try_new(&wanted).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Log to stderr for interactive use
pub fn init_interactive(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, "warn"))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn scheduled_log_path() -> PathBuf {
    config::data_dir().join(SCHEDULED_LOG_FILE)
}

/// Log to the scheduled-run file, appending
pub fn init_scheduled(verbose: bool) -> Result<PathBuf> {
    let path = scheduled_log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, "info"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(path)
}
