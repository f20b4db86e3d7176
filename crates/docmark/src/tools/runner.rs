//! Bounded subprocess execution shared by every external tool adapter.
//!
//! A run either yields the captured stdout of a zero-exit process or a single
//! `DocmarkError::ExternalToolUnavailable` carrying a [`ToolFailure`]. Timeouts,
//! cancellation and stdout overflow kill the child before returning, and `kill_on_drop`
//! covers the case where the whole attempt future is dropped.

use crate::core::config::ToolConfig;
use crate::error::ToolFailure;
use crate::{DocmarkError, Result};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const INPUT_PLACEHOLDER: &str = "{input}";
const WORKSPACE_PLACEHOLDER: &str = "{workspace}";

/// Stderr beyond this is dropped; it is only used for diagnostics.
const STDERR_CAPTURE_LIMIT: u64 = 64 * 1024;

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// One configured executable plus the argument template used when the configuration
/// does not provide one.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    name: String,
    config: ToolConfig,
    default_args: Vec<String>,
}

enum RunOutcome {
    Exited(ExitStatus, Vec<u8>),
    Overflow,
    Io(io::Error),
    TimedOut,
    Cancelled,
}

impl ToolRunner {
    pub fn new(name: impl Into<String>, config: ToolConfig, default_args: &[&str]) -> Self {
        Self {
            name: name.into(),
            config,
            default_args: default_args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Argument list with `{input}` and `{workspace}` expanded.
    pub fn expand_args(&self, input: &Path, workspace: &Path) -> Vec<String> {
        let template = if self.config.args.is_empty() {
            &self.default_args
        } else {
            &self.config.args
        };

        let input = input.to_string_lossy();
        let workspace = workspace.to_string_lossy();
        template
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(WORKSPACE_PLACEHOLDER, &workspace)
            })
            .collect()
    }

    fn failure(&self, reason: ToolFailure) -> DocmarkError {
        DocmarkError::tool_unavailable(&self.name, reason)
    }

    /// Run the tool against `input` with `workspace` as working directory.
    ///
    /// # Errors
    ///
    /// Every failure mode (disabled, missing executable, spawn error, non-zero exit,
    /// stdout overflow, timeout, cancellation) is returned as
    /// `DocmarkError::ExternalToolUnavailable`.
    pub async fn run(&self, input: &Path, workspace: &Path, cancel: &CancellationToken) -> Result<ToolOutput> {
        if !self.config.enabled {
            return Err(self.failure(ToolFailure::Disabled));
        }
        if cancel.is_cancelled() {
            return Err(self.failure(ToolFailure::Cancelled));
        }

        let args = self.expand_args(input, workspace);
        let timeout = self.config.timeout();
        let limit = self.config.max_output_bytes;

        tracing::debug!(
            tool = %self.name,
            program = %self.config.program,
            args = ?args,
            timeout_ms = timeout.as_millis() as u64,
            "Running external tool"
        );

        let started = Instant::now();
        let mut child = Command::new(&self.config.program)
            .args(&args)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let reason = if e.kind() == io::ErrorKind::NotFound {
                    ToolFailure::Missing {
                        program: self.config.program.clone(),
                    }
                } else {
                    ToolFailure::Spawn { message: e.to_string() }
                };
                self.failure(reason)
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(self.failure(ToolFailure::Spawn {
                message: "process pipes were not captured".to_string(),
            }));
        };

        let mut stderr_task = tokio::spawn(read_limited(stderr, STDERR_CAPTURE_LIMIT));

        let outcome = {
            let work = async {
                let stdout = match read_limited(stdout, limit as u64 + 1).await {
                    Ok(stdout) => stdout,
                    Err(e) => return RunOutcome::Io(e),
                };
                if stdout.len() > limit {
                    return RunOutcome::Overflow;
                }
                match child.wait().await {
                    Ok(status) => RunOutcome::Exited(status, stdout),
                    Err(e) => RunOutcome::Io(e),
                }
            };

            tokio::select! {
                outcome = work => outcome,
                _ = tokio::time::sleep(timeout) => RunOutcome::TimedOut,
                _ = cancel.cancelled() => RunOutcome::Cancelled,
            }
        };

        let reason = match outcome {
            RunOutcome::Exited(status, stdout) => {
                // A background process spawned by the tool may still hold stderr open.
                let remaining = timeout.saturating_sub(started.elapsed());
                let stderr = match tokio::time::timeout(remaining, &mut stderr_task).await {
                    Ok(Ok(Ok(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                    Ok(_) => String::new(),
                    Err(_) => {
                        stderr_task.abort();
                        tracing::debug!(tool = %self.name, "Stderr still open after exit, dropping it");
                        String::new()
                    }
                };
                return self.finish(status, stdout, stderr, started.elapsed());
            }
            RunOutcome::Overflow => ToolFailure::OutputTooLarge { limit },
            RunOutcome::TimedOut => ToolFailure::timed_out(timeout),
            RunOutcome::Cancelled => ToolFailure::Cancelled,
            RunOutcome::Io(e) => ToolFailure::Spawn { message: e.to_string() },
        };

        if let Err(e) = child.kill().await {
            tracing::debug!(tool = %self.name, error = %e, "Failed to kill external tool");
        }
        stderr_task.abort();
        tracing::debug!(tool = %self.name, reason = %reason, "External tool stopped");
        Err(self.failure(reason))
    }

    fn finish(&self, status: ExitStatus, stdout: Vec<u8>, stderr: String, elapsed: Duration) -> Result<ToolOutput> {
        if !status.success() {
            tracing::debug!(tool = %self.name, code = ?status.code(), "External tool exited with failure");
            return Err(self.failure(ToolFailure::NonZeroExit {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            }));
        }

        tracing::debug!(
            tool = %self.name,
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_bytes = stdout.len(),
            "External tool finished"
        );

        Ok(ToolOutput { stdout, stderr, elapsed })
    }

    pub(crate) fn unparseable(&self, message: impl Into<String>) -> DocmarkError {
        self.failure(ToolFailure::Unparseable {
            message: message.into(),
        })
    }
}

async fn read_limited<R: AsyncRead + Unpin>(reader: R, limit: u64) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    reader.take(limit).read_to_end(&mut buffer).await?;
    Ok(buffer)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn runner(program: String) -> ToolRunner {
        ToolRunner::new("test-tool", ToolConfig::new(program), &["{input}"])
    }

    fn reason(err: DocmarkError) -> ToolFailure {
        match err {
            DocmarkError::ExternalToolUnavailable { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_expand_args_uses_template() {
        let runner = ToolRunner::new("t", ToolConfig::new("t"), &["-json", "{input}"]);
        let args = runner.expand_args(Path::new("/tmp/in.pdf"), Path::new("/tmp/ws"));
        assert_eq!(args, vec!["-json", "/tmp/in.pdf"]);

        let configured = ToolConfig::new("t").with_args(["--out={workspace}/x", "{input}"]);
        let runner = ToolRunner::new("t", configured, &["ignored"]);
        let args = runner.expand_args(Path::new("/a"), Path::new("/w"));
        assert_eq!(args, vec!["--out=/w/x", "/a"]);
    }

    #[tokio::test]
    async fn test_successful_run_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "ok.sh", "echo \"got $1\"; echo warn >&2");
        let output = runner(program)
            .run(Path::new("input.bin"), dir.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout_text().trim(), "got input.bin");
        assert_eq!(output.stderr.trim(), "warn");
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let dir = TempDir::new().unwrap();
        let err = runner("/nonexistent/docmark-tool".to_string())
            .run(Path::new("x"), dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(reason(err), ToolFailure::Missing { .. }));
    }

    #[tokio::test]
    async fn test_disabled_tool() {
        let dir = TempDir::new().unwrap();
        let mut config = ToolConfig::new("true");
        config.enabled = false;
        let err = ToolRunner::new("t", config, &[])
            .run(Path::new("x"), dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(reason(err), ToolFailure::Disabled);
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_stderr() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "fail.sh", "echo broken >&2; exit 3");
        let err = runner(program)
            .run(Path::new("x"), dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            reason(err),
            ToolFailure::NonZeroExit {
                code: Some(3),
                stderr: "broken".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_output_overflow() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "loud.sh", "while true; do echo 0123456789; done");
        let mut config = ToolConfig::new(program);
        config.max_output_bytes = 1024;
        let err = ToolRunner::new("t", config, &[])
            .run(Path::new("x"), dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(reason(err), ToolFailure::OutputTooLarge { limit: 1024 });
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "slow.sh", "exec sleep 30");
        let config = ToolConfig::new(program).with_timeout(Duration::from_secs(1));
        let started = Instant::now();
        let err = ToolRunner::new("t", config, &[])
            .run(Path::new("x"), dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(reason(err), ToolFailure::TimedOut { after_ms: 1000 }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_lingering_stderr_does_not_outlive_timeout() {
        let dir = TempDir::new().unwrap();
        let config = ToolConfig::new("/bin/sh")
            .with_args(["-c", "sleep 6 >/dev/null & echo ok"])
            .with_timeout(Duration::from_secs(1));
        let started = Instant::now();
        let output = ToolRunner::new("t", config, &[])
            .run(Path::new("x"), dir.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout_text(), "ok\n");
        assert!(output.stderr.is_empty());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_cancellation_stops_process() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "slow.sh", "exec sleep 30");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = runner(program).run(Path::new("x"), dir.path(), &cancel).await.unwrap_err();
        assert_eq!(reason(err), ToolFailure::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
