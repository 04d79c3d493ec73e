//! Terminal rendering for netdocctl
//!
//! Plain `println!` with `owo-colors`; nothing here touches the network.

use owo_colors::OwoColorize;

use netdoc_common::attribution::{AttributionReport, EffectClass};
use netdoc_common::checks::{issue_count, CheckStatus, Finding};
use netdoc_common::config::Thresholds;
use netdoc_common::health::{
    self, advisories, CacheLevel, CacheReading, HealthStatus, Rating,
};
use netdoc_common::orchestrator::RemediationTally;
use netdoc_common::snapshot::{MetricDelta, Snapshot};
use netdoc_common::trend::Trend;

const RULE: &str = "────────────────────────────────────────────────────────";

pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", RULE.dimmed());
}

/// Milliseconds, or "failed" for the sentinel
pub fn format_ms(value: f64) -> String {
    if value < 0.0 {
        "failed".to_string()
    } else {
        format!("{:.1} ms", value)
    }
}

pub fn format_count(value: i64) -> String {
    if value < 0 {
        "failed".to_string()
    } else {
        value.to_string()
    }
}

pub fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.1}%", v),
        None => "n/a".to_string(),
    }
}

fn paint(text: &str, rating: Rating) -> String {
    match rating {
        Rating::Good => text.green().to_string(),
        Rating::Fair => text.yellow().to_string(),
        Rating::Poor => text.red().to_string(),
        Rating::Unknown => text.dimmed().to_string(),
    }
}

fn paint_status(status: HealthStatus) -> String {
    match status {
        HealthStatus::Normal => status.as_str().green().bold().to_string(),
        HealthStatus::Slow => status.as_str().yellow().bold().to_string(),
        HealthStatus::VerySlow | HealthStatus::Abnormal => status.as_str().red().bold().to_string(),
    }
}

fn paint_symbol(status: CheckStatus) -> String {
    let symbol = status.symbol();
    match status {
        CheckStatus::Ok => symbol.green().to_string(),
        CheckStatus::Warning => symbol.yellow().to_string(),
        CheckStatus::Error => symbol.red().to_string(),
        CheckStatus::Info => symbol.cyan().to_string(),
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

pub fn print_findings(findings: &[Finding]) {
    print_header("Diagnostic results");
    for finding in findings {
        println!(
            "{} {}: {}",
            paint_symbol(finding.status),
            finding.check_name.bold(),
            finding.message
        );
        for line in &finding.details {
            println!("      {}", line.dimmed());
        }
        if finding.fix_available {
            let fix = finding
                .fix_action
                .map(|id| id.to_string())
                .unwrap_or_else(|| "full repair".to_string());
            println!("      {} {}", "fix:".cyan(), fix);
        }
    }

    println!("{}", RULE.dimmed());
    let issues = issue_count(findings);
    if issues == 0 {
        println!("{}", "✓ No problems found".green());
    } else {
        println!("{} {} issue(s) found", "✗".red(), issues);
    }
}

// ============================================================================
// Health
// ============================================================================

pub fn print_snapshot(snapshot: &Snapshot, thresholds: &Thresholds) {
    print_header(&format!(
        "Network health at {}",
        snapshot.timestamp().format("%Y-%m-%d %H:%M:%S")
    ));

    let http = snapshot.http_response_ms();
    let dns = snapshot.dns_resolve_ms();
    let ping = snapshot.ping_ms();
    let memory = snapshot.memory_used_pct();

    println!("  DNS resolve:      {}", paint(&format_ms(dns), health::rate_dns_ms(dns)));
    println!("  Ping latency:     {}", paint(&format_ms(ping), health::rate_ping_ms(ping)));
    println!("  HTTP response:    {}", paint(&format_ms(http), health::rate_http_ms(http)));
    println!(
        "  TCP connections:  {}",
        paint(
            &format_count(snapshot.tcp_connection_count()),
            health::rate_count(
                snapshot.tcp_connection_count(),
                thresholds.warn_tcp_connections,
                thresholds.advisory_tcp_connections
            )
        )
    );
    println!(
        "  DNS cache:        {}",
        paint(
            &format_count(snapshot.dns_cache_entries()),
            health::rate_count(
                snapshot.dns_cache_entries(),
                thresholds.warn_dns_cache,
                thresholds.advisory_dns_cache
            )
        )
    );
    println!(
        "  ARP cache:        {}",
        paint(
            &format_count(snapshot.arp_cache_entries()),
            health::rate_count(
                snapshot.arp_cache_entries(),
                thresholds.warn_arp_cache,
                thresholds.advisory_arp_cache
            )
        )
    );
    let memory_text = if memory < 0.0 { "failed".to_string() } else { format!("{:.1}%", memory) };
    println!("  Memory used:      {}", paint(&memory_text, health::rate_memory_pct(memory)));

    let status = health::classify_with(snapshot, thresholds);
    println!();
    println!("  Status: {}", paint_status(status));
    for advisory in advisories(snapshot, thresholds) {
        println!("  {} {}", "!".yellow(), advisory.message());
    }
}

/// One-line monitor entry
pub fn print_monitor_line(snapshot: &Snapshot, thresholds: &Thresholds, trend: &Trend) {
    let status = health::classify_with(snapshot, thresholds);
    let trend_text = match trend {
        Trend::InsufficientData => "collecting".dimmed().to_string(),
        Trend::Stable { .. } => "stable".green().to_string(),
        Trend::Degrading { http_increase_pct } => {
            format!("degrading (+{:.0}%)", http_increase_pct).red().to_string()
        }
    };
    println!(
        "[{}] http {:>10}  dns {:>10}  ping {:>10}  tcp {:>5}  {}  trend: {}",
        snapshot.timestamp().format("%H:%M:%S"),
        format_ms(snapshot.http_response_ms()),
        format_ms(snapshot.dns_resolve_ms()),
        format_ms(snapshot.ping_ms()),
        format_count(snapshot.tcp_connection_count()),
        paint_status(status),
        trend_text
    );
    for advisory in advisories(snapshot, thresholds) {
        println!("           {} {}", "!".yellow(), advisory.message());
    }
}

pub fn print_cache_status(readings: &[CacheReading]) {
    print_header("Cache status");
    for reading in readings {
        let (count, level) = match reading.level {
            CacheLevel::Normal => (reading.count.to_string().green().to_string(), "normal".green().to_string()),
            CacheLevel::High => (reading.count.to_string().red().to_string(), "high".red().to_string()),
            CacheLevel::Unknown => ("failed".dimmed().to_string(), "unknown".dimmed().to_string()),
        };
        println!(
            "  {:<16} {:>8}  (threshold {:>4})  {}",
            reading.kind.label(),
            count,
            reading.threshold,
            level
        );
        if reading.level == CacheLevel::High {
            println!("      {}", reading.kind.impact().dimmed());
        }
    }
}

/// TCP states shown in the details view
const TOP_TCP_STATES: usize = 5;

pub fn print_details(adapters: &[String], gateways: &[String], tcp_states: &[(String, usize)]) {
    print_header("Network details");

    println!("  {}", "Adapters with IPv4".bold());
    if adapters.is_empty() {
        println!("    {}", "none".dimmed());
    }
    for adapter in adapters {
        println!("    → {}", adapter);
    }

    println!("  {}", "Default gateway".bold());
    if gateways.is_empty() {
        println!("    {}", "none".dimmed());
    }
    for gateway in gateways {
        println!("    → {}", gateway);
    }

    println!("  {}", "TCP connection states".bold());
    if tcp_states.is_empty() {
        println!("    {}", "unavailable".dimmed());
    }
    for (state, count) in tcp_states.iter().take(TOP_TCP_STATES) {
        println!("    {:<14} {:>6}", state, count);
    }
}

pub fn print_comparison(deltas: &[MetricDelta]) {
    print_header("Performance comparison");
    println!("  {:<20} {:>12} {:>12} {:>10}", "metric", "before", "after", "change");
    for delta in deltas {
        let (before, after) = if delta.unit == "ms" {
            (format_ms(delta.before), format_ms(delta.after))
        } else {
            (format_count(delta.before as i64), format_count(delta.after as i64))
        };
        let change = format_pct(delta.improvement_pct);
        let change = match delta.improvement_pct {
            Some(v) if v > 0.0 => change.green().to_string(),
            Some(v) if v < 0.0 => change.red().to_string(),
            _ => change.dimmed().to_string(),
        };
        println!("  {:<20} {:>12} {:>12} {:>10}", delta.metric, before, after, change);
    }
    println!("  {}", "positive change means faster or smaller".dimmed());
}

// ============================================================================
// Remediation
// ============================================================================

fn paint_effect(effect: EffectClass) -> String {
    match effect {
        EffectClass::Effective => effect.as_str().green().bold().to_string(),
        EffectClass::Slight => effect.as_str().green().to_string(),
        EffectClass::None => effect.as_str().dimmed().to_string(),
        EffectClass::Negative => effect.as_str().red().to_string(),
    }
}

pub fn print_attribution(report: &AttributionReport) {
    print_header("Attribution report");
    println!(
        "  {:<24} {:>12} {:>12} {:>9}  effect",
        "action", "baseline", "after", "change"
    );
    for trial in &report.trials {
        let change = match (&trial.apply_error, trial.improvement_pct) {
            (Some(_), _) => "failed".red().to_string(),
            (None, None) => "n/a".dimmed().to_string(),
            (None, pct) => format_pct(pct),
        };
        println!(
            "  {:<24} {:>12} {:>12} {:>9}  {}",
            trial.action_id.as_str(),
            format_ms(trial.baseline.http_response_ms()),
            format_ms(trial.post.http_response_ms()),
            change,
            paint_effect(trial.effect_class)
        );
        if let Some(err) = &trial.apply_error {
            println!("      {}", err.dimmed());
        }
    }
    println!();
    println!("  Primary cause: {}", report.primary_cause.explanation().bold());
}

pub fn print_tally(tally: &RemediationTally) {
    print_header(&format!("Results: {}", tally.label));
    for result in &tally.results {
        let mark = if result.success() { "✓".green().to_string() } else { "✗".red().to_string() };
        let mut line = format!("  {} {}", mark, result.action_id.action().description);
        match result.verified {
            Some(true) => line.push_str(&format!(" {}", "(verified)".dimmed())),
            Some(false) => line.push_str(&format!(" {}", "(did not take effect)".yellow())),
            None => {}
        }
        if result.requires_restart {
            line.push_str(&format!(" {}", "[restart]".yellow()));
        }
        println!("{}", line);
        if let Some(err) = &result.error {
            println!("      {}", err.dimmed());
        }
    }
    println!("{}", RULE.dimmed());
    println!("  {}", tally.summary().bold());

    let restart = tally.restart_required();
    if !restart.is_empty() {
        let names: Vec<&str> = restart.iter().map(|id| id.as_str()).collect();
        println!(
            "  {} restart required for: {}",
            "!".yellow(),
            names.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(-1.0), "failed");
        assert_eq!(format_ms(0.0), "0.0 ms");
        assert_eq!(format_ms(123.456), "123.5 ms");
    }

    #[test]
    fn test_format_count_and_pct() {
        assert_eq!(format_count(-1), "failed");
        assert_eq!(format_count(42), "42");
        assert_eq!(format_pct(Some(28.0)), "+28.0%");
        assert_eq!(format_pct(Some(-5.0)), "-5.0%");
        assert_eq!(format_pct(None), "n/a");
    }
}
