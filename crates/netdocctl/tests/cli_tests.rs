//! Argument parsing

use clap::Parser;
use std::path::PathBuf;

use netdoc_common::{ActionId, RepairMode};
use netdocctl::cli::{parse_trialable, Cli, Commands, ModeArg, ScheduleCommands};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn test_no_subcommand_enters_menu() {
    let cli = parse(&["netdocctl"]);
    assert_eq!(cli.command, None);
    assert!(!cli.json);
    assert!(!cli.verbose);
}

#[test]
fn test_repair_modes() {
    let cli = parse(&["netdocctl", "repair"]);
    assert_eq!(cli.command, Some(Commands::Repair { mode: ModeArg::Quick, yes: false }));

    let cli = parse(&["netdocctl", "repair", "--mode", "guided", "-y"]);
    assert_eq!(cli.command, Some(Commands::Repair { mode: ModeArg::Guided, yes: true }));
    assert_eq!(RepairMode::from(ModeArg::Guided), RepairMode::Guided);

    assert!(Cli::try_parse_from(["netdocctl", "repair", "--mode", "everything"]).is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = parse(&["netdocctl", "diagnose", "--repair", "--json", "-v", "--config", "nd.toml"]);
    assert_eq!(cli.command, Some(Commands::Diagnose { repair: true }));
    assert!(cli.json);
    assert!(cli.verbose);
    assert_eq!(cli.config, Some(PathBuf::from("nd.toml")));
}

#[test]
fn test_schedule_subcommands() {
    let cli = parse(&["netdocctl", "schedule", "install", "--interval", "60"]);
    assert_eq!(
        cli.command,
        Some(Commands::Schedule {
            action: ScheduleCommands::Install { interval: Some(60) }
        })
    );

    let cli = parse(&["netdocctl", "schedule", "remove"]);
    assert_eq!(
        cli.command,
        Some(Commands::Schedule { action: ScheduleCommands::Remove })
    );
}

#[test]
fn test_hidden_scheduled_run_still_parses() {
    let cli = parse(&["netdocctl", "scheduled-run"]);
    assert_eq!(cli.command, Some(Commands::ScheduledRun));
}

#[test]
fn test_measurement_subcommands() {
    assert_eq!(
        parse(&["netdocctl", "sample", "--runs", "3"]).command,
        Some(Commands::Sample { runs: 3 })
    );
    assert_eq!(
        parse(&["netdocctl", "monitor", "--interval", "10"]).command,
        Some(Commands::Monitor { interval: Some(10) })
    );
    assert_eq!(
        parse(&["netdocctl", "attribute"]).command,
        Some(Commands::Attribute { action: None })
    );
    assert_eq!(parse(&["netdocctl", "details"]).command, Some(Commands::Details));
    assert_eq!(parse(&["netdocctl", "proxy-off"]).command, Some(Commands::ProxyOff));
    assert_eq!(
        parse(&["netdocctl", "export", "-o", "out.txt"]).command,
        Some(Commands::Export { output: Some(PathBuf::from("out.txt")) })
    );
}

#[test]
fn test_optimize_full_flag() {
    assert_eq!(
        parse(&["netdocctl", "optimize"]).command,
        Some(Commands::Optimize { full: false })
    );
    assert_eq!(
        parse(&["netdocctl", "optimize", "--full"]).command,
        Some(Commands::Optimize { full: true })
    );
}

#[test]
fn test_attribute_single_action() {
    assert_eq!(
        parse(&["netdocctl", "attribute", "--action", "flush-dns-cache"]).command,
        Some(Commands::Attribute { action: Some(ActionId::FlushDnsCache) })
    );

    // Restart-requiring and unknown actions are refused at parse time
    assert!(Cli::try_parse_from(["netdocctl", "attribute", "--action", "reset-ip-stack"]).is_err());
    assert!(Cli::try_parse_from(["netdocctl", "attribute", "--action", "reboot"]).is_err());
}

#[test]
fn test_parse_trialable_lists_choices() {
    assert_eq!(parse_trialable("disable_proxy"), Ok(ActionId::DisableProxy));
    let err = parse_trialable("tune-tcp").unwrap_err();
    assert!(err.contains("cannot be trialed"));
    assert!(err.contains("flush-dns-cache"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    assert!(Cli::try_parse_from(["netdocctl", "reboot"]).is_err());
}
