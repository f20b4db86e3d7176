//! Per-attempt conversion state.
//!
//! A [`ConversionContext`] is created for exactly one converter attempt and owns a
//! private scratch directory. The directory is removed when the context is dropped, so
//! every exit path of an attempt (success, error, timeout, cancellation, panic) cleans up.

use crate::core::config::ConversionConfig;
use crate::tools::ExternalTools;
use crate::types::InputDocument;
use crate::{DocmarkError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const WORKSPACE_PREFIX: &str = "docmark-";
const FALLBACK_FILE_NAME: &str = "input";

/// Scratch state handed to a converter for one attempt.
#[derive(Debug)]
pub struct ConversionContext {
    workspace: TempDir,
    config: Arc<ConversionConfig>,
    tools: Arc<ExternalTools>,
    cancel: CancellationToken,
    deadline: Instant,
}

impl ConversionContext {
    /// Create a context with a fresh workspace under `config.workspace_root` (or the OS
    /// temp dir). The deadline is `now + config.attempt_timeout()`.
    pub fn new(config: Arc<ConversionConfig>, tools: Arc<ExternalTools>, cancel: CancellationToken) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let workspace = match &config.workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            DocmarkError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create conversion workspace: {}", e),
            ))
        })?;

        let deadline = Instant::now() + config.attempt_timeout();
        tracing::debug!(workspace = %workspace.path().display(), "Created conversion workspace");

        Ok(Self {
            workspace,
            config,
            tools,
            cancel,
            deadline,
        })
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn tools(&self) -> &ExternalTools {
        &self.tools
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the attempt deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Write the document into the workspace and return the file path.
    ///
    /// The file name is the sanitized declared filename, so external tools that look at
    /// extensions see the same hint the sniffer saw.
    pub async fn materialize(&self, document: &InputDocument) -> Result<PathBuf> {
        if self.is_cancelled() {
            return Err(DocmarkError::Cancelled);
        }

        let path = self.workspace().join(sanitize_file_name(document.filename()));
        tokio::fs::write(&path, document.bytes()).await?;
        Ok(path)
    }

    /// Remove the workspace now instead of on drop, reporting failures.
    pub fn close(self) -> Result<()> {
        let path = self.workspace.path().to_path_buf();
        self.workspace.close().map_err(|e| {
            tracing::warn!(workspace = %path.display(), error = %e, "Failed to remove conversion workspace");
            DocmarkError::Io(e)
        })
    }
}

/// Reduce a declared filename to a safe single path component.
///
/// Directory parts are dropped, every character outside `[A-Za-z0-9._-]` becomes `_`,
/// and leading dots are removed. Names that end up empty become `"input"`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
