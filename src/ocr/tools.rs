//! Helpers for invoking external command-line tools.

use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Failure to get an exit status out of an external tool.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0} not found in PATH")]
    NotFound(String),

    #[error("{tool} did not finish within {}s", timeout.as_secs())]
    TimedOut { tool: String, timeout: Duration },

    #[error("IO error running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Check if a binary is available in PATH (or is an existing path).
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Report availability of each named tool.
pub fn check_tools<'a>(tools: impl IntoIterator<Item = &'a str>) -> Vec<(String, bool)> {
    tools
        .into_iter()
        .map(|tool| (tool.to_string(), check_binary(tool)))
        .collect()
}

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// The child is killed if `timeout` elapses first.
pub async fn run_command(
    mut cmd: Command,
    tool: &str,
    timeout: Option<Duration>,
) -> Result<Output, CommandError> {
    cmd.kill_on_drop(true);

    let io_err = |e: std::io::Error| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CommandError::NotFound(tool.to_string())
        } else {
            CommandError::Io {
                tool: tool.to_string(),
                source: e,
            }
        }
    };

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
            Ok(result) => result.map_err(io_err),
            Err(_) => Err(CommandError::TimedOut {
                tool: tool.to_string(),
                timeout: limit,
            }),
        },
        None => cmd.output().await.map_err(io_err),
    }
}

/// Lossy stderr of a finished command, trimmed.
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tools() {
        let tools = check_tools(["pdftoppm", "tesseract"]);
        assert_eq!(tools.len(), 2);
        for (tool, available) in tools {
            println!("{}: {}", tool, if available { "found" } else { "missing" });
        }
    }

    #[test]
    fn test_missing_binary() {
        assert!(!check_binary("pdfmail-no-such-tool-7f3a"));
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let cmd = Command::new("pdfmail-no-such-tool-7f3a");
        let err = run_command(cmd, "pdfmail-no-such-tool-7f3a", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
    }
}
