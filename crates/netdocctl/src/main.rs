//! NetDoc Control - CLI for diagnosing and repairing workstation networking
//!
//! Runs a single subcommand, or the interactive menu when none is given.

use clap::Parser;
use owo_colors::OwoColorize;

use netdoc_common::NetDocConfig;
use netdocctl::cli::{Cli, Commands};
use netdocctl::commands::{self, Context};
use netdocctl::{errors, logging, menu};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let scheduled = matches!(cli.command, Some(Commands::ScheduledRun));

    if scheduled {
        if let Err(e) = logging::init_scheduled(cli.verbose) {
            logging::init_interactive(cli.verbose);
            tracing::warn!("scheduled log unavailable: {:#}", e);
        }
    } else {
        logging::init_interactive(cli.verbose);
    }

    let code = match run(cli).await {
        Ok(()) => errors::EXIT_SUCCESS,
        Err(e) => {
            if scheduled {
                tracing::error!("{:#}", e);
            } else {
                eprintln!("{} {:#}", "error:".red().bold(), e);
            }
            errors::exit_code_for(&e)
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => NetDocConfig::load_from(path)?,
        None => NetDocConfig::load()?,
    };
    tracing::debug!("Configuration loaded");

    let ctx = Context::new(config, cli.json);
    match cli.command {
        Some(command) => commands::dispatch(&ctx, command).await,
        None => menu::run(&ctx).await,
    }
}
