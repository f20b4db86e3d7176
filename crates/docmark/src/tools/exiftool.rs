//! ExifTool adapter: embedded metadata as a flat key-value map.

use crate::Result;
use crate::core::config::ToolConfig;
use crate::tools::runner::ToolRunner;
use crate::types::Metadata;
use serde_json::Value;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub const EXIFTOOL_ARGS: &[&str] = &["-json", "{input}"];

/// Keys describing the scratch copy rather than the document itself.
const FILESYSTEM_KEYS: &[&str] = &[
    "SourceFile",
    "ExifToolVersion",
    "FileName",
    "Directory",
    "FileSize",
    "FileModifyDate",
    "FileAccessDate",
    "FileInodeChangeDate",
    "FilePermissions",
];

#[derive(Debug, Clone)]
pub struct ExifTool {
    runner: ToolRunner,
}

impl ExifTool {
    pub fn new(config: ToolConfig) -> Self {
        Self {
            runner: ToolRunner::new("exiftool", config, EXIFTOOL_ARGS),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.runner.config().enabled
    }

    /// Read the metadata of `input`.
    ///
    /// # Errors
    ///
    /// `DocmarkError::ExternalToolUnavailable` when the tool fails or prints something
    /// other than an exiftool JSON array.
    pub async fn metadata(&self, input: &Path, workspace: &Path, cancel: &CancellationToken) -> Result<Metadata> {
        let output = self.runner.run(input, workspace, cancel).await?;
        let value: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| self.runner.unparseable(format!("invalid JSON: {}", e)))?;
        parse_exiftool_json(value).ok_or_else(|| self.runner.unparseable("expected a JSON array of objects"))
    }
}

/// Flatten exiftool's `[{..}]` output, dropping filesystem keys.
pub(crate) fn parse_exiftool_json(value: Value) -> Option<Metadata> {
    let Value::Array(records) = value else {
        return None;
    };
    let Some(Value::Object(record)) = records.into_iter().next() else {
        return None;
    };

    Some(
        record
            .into_iter()
            .filter(|(key, value)| !FILESYSTEM_KEYS.contains(&key.as_str()) && !value.is_null())
            .collect(),
    )
}
