//! External command execution for platform enumeration tools

use kvmscan_core::{Error, Result};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

/// Run a command and return its stdout as (lossy) UTF-8.
///
/// A missing binary, a non-zero exit, or exceeding `limit` is reported as
/// `Error::CommandFailed`.
pub async fn run_command(program: &str, args: &[&str], limit: Duration) -> Result<String> {
    let command_line = if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    };
    trace!(command = %command_line, "Running command");

    let output = tokio::time::timeout(
        limit,
        Command::new(program).args(args).kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| Error::CommandFailed {
        command: command_line.clone(),
        message: format!("timed out after {}s", limit.as_secs()),
    })?
    .map_err(|e| Error::CommandFailed {
        command: command_line.clone(),
        message: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CommandFailed {
            command: command_line,
            message: format!("exit status {}: {}", output.status, stderr.trim()),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!(command = %command_line, bytes = stdout.len(), "Command completed");
    Ok(stdout)
}

/// Check that `program` can be started at all.
///
/// Only a spawn failure or exceeding `limit` is an error; the exit status
/// and output are ignored, since `args` is just something cheap to run.
pub async fn ensure_available(program: &str, args: &[&str], limit: Duration) -> Result<()> {
    trace!(program, "Checking command availability");

    tokio::time::timeout(
        limit,
        Command::new(program).args(args).kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| Error::CommandFailed {
        command: program.to_string(),
        message: format!("timed out after {}s", limit.as_secs()),
    })?
    .map_err(|e| Error::CommandFailed {
        command: program.to_string(),
        message: e.to_string(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_command_failed() {
        let err = run_command(
            "kvmscan-definitely-not-a-real-binary",
            &["-a"],
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
        assert_eq!(err.code(), "COMMAND_FAILED");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout() {
        let out = run_command("echo", &["hello"], Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_command_line_names_program_and_args() {
        let err = run_command(
            "kvmscan-definitely-not-a-real-binary",
            &["-4", "glkvm.local"],
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        match err {
            Error::CommandFailed { command, .. } => {
                assert_eq!(command, "kvmscan-definitely-not-a-real-binary -4 glkvm.local")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ensure_available_missing_binary() {
        let err = ensure_available("kvmscan-definitely-not-a-real-binary", &[], Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ensure_available_ignores_exit_status() {
        ensure_available("false", &[], Duration::from_secs(2))
            .await
            .unwrap();
    }
}
