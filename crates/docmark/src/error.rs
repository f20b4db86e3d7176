//! Error types for docmark.
//!
//! Every fallible operation in the library returns [`DocmarkError`]. The enum carries
//! two kinds of errors:
//!
//! **System and input errors** bubble up unchanged:
//! - `Io` - File system errors (reading an input file, creating a workspace)
//! - `Validation` - Invalid configuration, invalid descriptors, bad parameters
//!
//! **Conversion taxonomy** produced by the pipeline:
//! - `UnsupportedFormat` - No registered converter matched any sniffed candidate
//! - `ConverterFailure` - A matched converter failed or returned empty content
//! - `ExternalToolUnavailable` - A subprocess was missing, failed, overflowed or timed out
//! - `PluginLoad` - A plugin package could not be loaded (startup warning, never fatal)
//! - `ExhaustedCandidates` - Every matching converter across every candidate failed
//!
//! Individual converter and tool failures never reach the caller directly. The
//! orchestrator records them as [`AttemptRecord`]s and only surfaces the aggregate.
//!
//! # Example
//!
//! ```rust
//! use docmark::{DocmarkError, Result};
//!
//! fn read_input(path: &str) -> Result<Vec<u8>> {
//!     let bytes = std::fs::read(path)?;
//!     if bytes.is_empty() {
//!         return Err(DocmarkError::validation(format!("Input file is empty: {}", path)));
//!     }
//!     Ok(bytes)
//! }
//! ```
use crate::types::AttemptRecord;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `DocmarkError`.
pub type Result<T> = std::result::Result<T, DocmarkError>;

/// Main error type for all docmark operations.
#[derive(Debug, Error)]
pub enum DocmarkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Unsupported format: no converter accepts any of [{}]", .candidates.join(", "))]
    UnsupportedFormat { candidates: Vec<String> },

    #[error("Converter '{converter_id}' failed: {message}")]
    ConverterFailure { converter_id: String, message: String },

    #[error("External tool '{tool}' unavailable: {reason}")]
    ExternalToolUnavailable { tool: String, reason: ToolFailure },

    #[error("Plugin '{plugin_name}' failed to load: {message}")]
    PluginLoad { plugin_name: String, message: String },

    #[error("All {} conversion attempts failed: {}", .attempts.len(), summarize_attempts(.attempts))]
    ExhaustedCandidates { attempts: Vec<AttemptRecord> },

    #[error("Converter id '{0}' is already registered")]
    DuplicateIdentifier(String),

    #[error("Conversion cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Why an external tool invocation could not produce usable output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolFailure {
    /// The executable does not exist or is not on `PATH`.
    Missing { program: String },
    /// The tool is switched off in configuration.
    Disabled,
    /// The process could not be started for a reason other than a missing binary.
    Spawn { message: String },
    NonZeroExit { code: Option<i32>, stderr: String },
    OutputTooLarge { limit: usize },
    TimedOut { after_ms: u64 },
    Cancelled,
    /// The process succeeded but its stdout could not be parsed.
    Unparseable { message: String },
}

impl ToolFailure {
    pub fn timed_out(after: Duration) -> Self {
        Self::TimedOut {
            after_ms: after.as_millis() as u64,
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFailure::Missing { program } => write!(f, "executable '{}' not found", program),
            ToolFailure::Disabled => write!(f, "disabled in configuration"),
            ToolFailure::Spawn { message } => write!(f, "failed to start: {}", message),
            ToolFailure::NonZeroExit { code, stderr } => {
                match code {
                    Some(code) => write!(f, "exited with status {}", code)?,
                    None => write!(f, "terminated by signal")?,
                }
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            ToolFailure::OutputTooLarge { limit } => write!(f, "stdout exceeded {} bytes", limit),
            ToolFailure::TimedOut { after_ms } => write!(f, "timed out after {} ms", after_ms),
            ToolFailure::Cancelled => write!(f, "cancelled"),
            ToolFailure::Unparseable { message } => write!(f, "unparseable output: {}", message),
        }
    }
}

fn summarize_attempts(attempts: &[AttemptRecord]) -> String {
    attempts
        .iter()
        .map(|attempt| format!("{}@{}: {}", attempt.converter_id, attempt.format, attempt.outcome))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for DocmarkError {
    fn from(err: serde_json::Error) -> Self {
        DocmarkError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<csv::Error> for DocmarkError {
    fn from(err: csv::Error) -> Self {
        DocmarkError::Parsing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "office")]
impl From<zip::result::ZipError> for DocmarkError {
    fn from(err: zip::result::ZipError) -> Self {
        DocmarkError::Parsing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "office")]
impl From<roxmltree::Error> for DocmarkError {
    fn from(err: roxmltree::Error) -> Self {
        DocmarkError::Parsing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl DocmarkError {
    error_constructor!(parsing, Parsing);
    error_constructor!(validation, Validation);
    error_constructor!(serialization, Serialization);

    /// Create an `ExternalToolUnavailable` error.
    pub fn tool_unavailable(tool: impl Into<String>, reason: ToolFailure) -> Self {
        Self::ExternalToolUnavailable {
            tool: tool.into(),
            reason,
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DocmarkError::Io(_) => "io",
            DocmarkError::Parsing { .. } => "parsing",
            DocmarkError::Validation { .. } => "validation",
            DocmarkError::Serialization { .. } => "serialization",
            DocmarkError::MissingDependency(_) => "missing_dependency",
            DocmarkError::UnsupportedFormat { .. } => "unsupported_format",
            DocmarkError::ConverterFailure { .. } => "converter_failure",
            DocmarkError::ExternalToolUnavailable { .. } => "external_tool_unavailable",
            DocmarkError::PluginLoad { .. } => "plugin_load_error",
            DocmarkError::ExhaustedCandidates { .. } => "exhausted_candidates",
            DocmarkError::DuplicateIdentifier(_) => "duplicate_identifier",
            DocmarkError::Cancelled => "cancelled",
            DocmarkError::Other(_) => "other",
        }
    }

    /// Attempt records carried by the error, empty for kinds without diagnostics.
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            DocmarkError::ExhaustedCandidates { attempts } => attempts,
            _ => &[],
        }
    }
}

/// Serializable view of a terminal error for the service boundary.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
}

impl From<&DocmarkError> for ErrorReport {
    fn from(err: &DocmarkError) -> Self {
        let candidates = match err {
            DocmarkError::UnsupportedFormat { candidates } => candidates.clone(),
            _ => Vec::new(),
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            candidates,
            attempts: err.attempts().to_vec(),
        }
    }
}
