//! Command execution layer
//!
//! Runs one collaborator command and captures exit code, stdout, stderr and
//! duration without interpreting them. A command that exceeds its timeout is
//! killed and reported as `ExecutionStatus::Timeout`.
//!
//! Output is decoded as UTF-8, or as GBK (code page 936) when the bytes are
//! not valid UTF-8, since the console tools on Simplified Chinese Windows
//! print in the ANSI code page.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Maximum output length to capture
pub const MAX_OUTPUT_BYTES: usize = 256 * 1024;

/// Limit for table dumps, which are counted and must be read whole
pub const MAX_TABLE_OUTPUT_BYTES: usize = 64 * 1024 * 1024;

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Capability or task label that requested the command
    pub label: String,
    /// Full command line that was executed
    pub full_command: String,
    /// Exit code (0 = success, -1 = no exit code)
    pub exit_code: i32,
    pub stdout: String,
    pub stdout_truncated: bool,
    pub stderr: String,
    pub stderr_truncated: bool,
    pub duration_ms: u64,
    pub status: ExecutionStatus,
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Command ran successfully (exit code 0)
    Success,
    /// Command ran but returned non-zero exit code
    NonZeroExit,
    /// Program not found on this system
    CommandNotFound,
    PermissionDenied,
    /// Killed after exceeding its timeout
    Timeout,
    /// Capability has no implementation on this platform
    Unsupported,
    /// Other OS error
    OsError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonZeroExit => "non-zero exit",
            Self::CommandNotFound => "command not found",
            Self::PermissionDenied => "permission denied",
            Self::Timeout => "timeout",
            Self::Unsupported => "unsupported",
            Self::OsError => "OS error",
        }
    }
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// A result for a capability that was never started
    pub fn unsupported(label: &str, reason: &str) -> Self {
        Self {
            label: label.to_string(),
            full_command: String::new(),
            exit_code: -1,
            stdout: String::new(),
            stdout_truncated: false,
            stderr: reason.to_string(),
            stderr_truncated: false,
            duration_ms: 0,
            status: ExecutionStatus::Unsupported,
        }
    }

    /// One-line reason for a failure, suitable for an action record
    pub fn failure_reason(&self) -> String {
        let detail = self
            .stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");

        match self.status {
            ExecutionStatus::NonZeroExit if !detail.is_empty() => {
                format!("exit {}: {}", self.exit_code, detail)
            }
            ExecutionStatus::NonZeroExit => format!("exit {}", self.exit_code),
            _ if !detail.is_empty() => format!("{}: {}", self.status.as_str(), detail),
            _ => self.status.as_str().to_string(),
        }
    }
}

/// Execute `program args...` with a hard timeout
pub async fn execute(label: &str, program: &str, args: &[&str], timeout: Duration) -> CommandResult {
    execute_with_limit(label, program, args, timeout, MAX_OUTPUT_BYTES).await
}

/// [`execute`] with an explicit cap on captured stdout/stderr bytes
pub async fn execute_with_limit(
    label: &str,
    program: &str,
    args: &[&str],
    timeout: Duration,
    max_output: usize,
) -> CommandResult {
    let full_command = if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    };
    tracing::debug!("exec [{}]: {}", label, full_command);

    let start = Instant::now();
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(c) => c,
        Err(e) => return os_error(label, full_command, e, start),
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return os_error(label, full_command, e, start),
        Err(_) => {
            tracing::warn!("[{}] timed out after {} ms", label, timeout.as_millis());
            return CommandResult {
                label: label.to_string(),
                full_command,
                exit_code: -1,
                stdout: String::new(),
                stdout_truncated: false,
                stderr: format!("timed out after {} ms", timeout.as_millis()),
                stderr_truncated: false,
                duration_ms: start.elapsed().as_millis() as u64,
                status: ExecutionStatus::Timeout,
            };
        }
    };

    let (stdout, stdout_truncated) = truncate_output(&output.stdout, max_output);
    let (stderr, stderr_truncated) = truncate_output(&output.stderr, max_output);
    if stdout_truncated {
        tracing::warn!("[{}] stdout truncated at {} bytes", label, max_output);
    }
    let exit_code = output.status.code().unwrap_or(-1);

    let status = if output.status.success() {
        ExecutionStatus::Success
    } else if stderr.contains("Access is denied") || stderr.contains("Permission denied") {
        ExecutionStatus::PermissionDenied
    } else {
        ExecutionStatus::NonZeroExit
    };

    CommandResult {
        label: label.to_string(),
        full_command,
        exit_code,
        stdout,
        stdout_truncated,
        stderr,
        stderr_truncated,
        duration_ms: start.elapsed().as_millis() as u64,
        status,
    }
}

fn os_error(label: &str, full_command: String, e: std::io::Error, start: Instant) -> CommandResult {
    let status = match e.kind() {
        std::io::ErrorKind::NotFound => ExecutionStatus::CommandNotFound,
        std::io::ErrorKind::PermissionDenied => ExecutionStatus::PermissionDenied,
        _ => ExecutionStatus::OsError,
    };

    CommandResult {
        label: label.to_string(),
        full_command,
        exit_code: -1,
        stdout: String::new(),
        stdout_truncated: false,
        stderr: format!("OS error: {}", e),
        stderr_truncated: false,
        duration_ms: start.elapsed().as_millis() as u64,
        status,
    }
}

/// Truncate output to `limit` bytes and decode it
fn truncate_output(bytes: &[u8], limit: usize) -> (String, bool) {
    let truncated = bytes.len() > limit;
    let slice = if truncated { &bytes[..limit] } else { bytes };

    (decode_output(slice), truncated)
}

/// UTF-8 when valid, otherwise GBK
fn decode_output(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Cut inside a multi-byte character: keep the complete prefix
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
        }
        Err(_) => {
            let (text, _, had_errors) = encoding_rs::GBK.decode(bytes);
            if had_errors {
                tracing::trace!("output is neither UTF-8 nor GBK, decoded lossily");
            }
            text.into_owned()
        }
    }
}
