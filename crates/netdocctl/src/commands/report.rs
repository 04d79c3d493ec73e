//! Diagnostic report export

use anyhow::{Context as _, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use netdoc_common::checks::{issue_count, Finding};

use super::{diagnose, Context};

const REPORT_PREFIX: &str = "network_diagnostic_report_";

/// `network_diagnostic_report_YYYYmmdd_HHMMSS.txt`
pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("{}{}.txt", REPORT_PREFIX, at.format("%Y%m%d_%H%M%S"))
}

pub fn render_report(findings: &[Finding], generated_at: DateTime<Local>) -> String {
    let rule = "=".repeat(60);
    let mut lines = vec![
        "Network Diagnostic Report".to_string(),
        format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        rule.clone(),
        String::new(),
    ];

    for finding in findings {
        lines.push(format!(
            "{} {}: {}",
            finding.status.symbol(),
            finding.check_name,
            finding.message
        ));
        lines.extend(finding.details.iter().map(|d| format!("    {}", d)));
        if finding.fix_available {
            let fix = finding
                .fix_action
                .map(|id| id.action().description.to_string())
                .unwrap_or_else(|| "full repair".to_string());
            lines.push(format!("    Fix: {}", fix));
        }
        lines.push(String::new());
    }

    lines.push(rule);
    lines.push(format!("Issues found: {}", issue_count(findings)));
    lines.push(String::new());
    lines.join("\n")
}

/// Where to write: the given file, a fresh name inside the given directory,
/// or a fresh name in the working directory
pub fn resolve_output(output: Option<PathBuf>, at: DateTime<Local>) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(report_file_name(at)),
        Some(path) => path,
        None => PathBuf::from(report_file_name(at)),
    }
}

pub fn write_report(path: &Path, findings: &[Finding], at: DateTime<Local>) -> Result<()> {
    std::fs::write(path, render_report(findings, at))
        .with_context(|| format!("writing report to {}", path.display()))
}

/// Write the given findings, or run diagnostics first when there are none
pub async fn export(
    ctx: &Context,
    findings: Option<&[Finding]>,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let fresh;
    let findings = match findings {
        Some(findings) => findings,
        None => {
            fresh = diagnose::run_diagnostics(ctx).await;
            &fresh[..]
        }
    };

    let now = Local::now();
    let path = resolve_output(output, now);
    write_report(&path, findings, now)?;
    println!("✓ Report saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use netdoc_common::{ActionId, Check};

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name(fixed_time()),
            "network_diagnostic_report_20240309_140507.txt"
        );
    }

    #[test]
    fn test_render_report() {
        let findings = vec![
            Finding::ok(Check::DnsResolution, "DNS resolution works"),
            Finding::warning(Check::ProxySettings, "System proxy is enabled")
                .with_detail("Proxy server: 127.0.0.1:7890")
                .with_fix(ActionId::DisableProxy),
        ];

        let text = render_report(&findings, fixed_time());

        assert!(text.starts_with("Network Diagnostic Report\nGenerated: 2024-03-09 14:05:07"));
        assert!(text.contains("[OK] DNS resolution: DNS resolution works"));
        assert!(text.contains("[WARN] System proxy settings: System proxy is enabled"));
        assert!(text.contains("    Proxy server: 127.0.0.1:7890"));
        assert!(text.contains("    Fix: Disable system proxy and PAC script"));
        assert!(text.contains("Issues found: 1"));
    }

    #[test]
    fn test_write_report_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = resolve_output(Some(dir.path().to_path_buf()), fixed_time());
        assert_eq!(
            path,
            dir.path().join("network_diagnostic_report_20240309_140507.txt")
        );

        write_report(&path, &[], fixed_time()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Issues found: 0"));
    }
}
