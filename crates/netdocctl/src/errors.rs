//! Exit codes for netdocctl

use netdoc_common::NetDocError;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when a required system utility is missing (EX_UNAVAILABLE)
pub const EXIT_ENVIRONMENT_MISSING: i32 = 69;

/// Exit code when administrator privileges are missing (EX_NOPERM)
pub const EXIT_NOT_ELEVATED: i32 = 77;

/// Map a command error to the process exit code
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<NetDocError>() {
        Some(NetDocError::NotElevated) => EXIT_NOT_ELEVATED,
        Some(NetDocError::EnvironmentMissing(_)) => EXIT_ENVIRONMENT_MISSING,
        _ => EXIT_GENERAL_ERROR,
    }
}
