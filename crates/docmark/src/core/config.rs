//! Configuration loading and defaults.
//!
//! Every field of [`ConversionConfig`] has a default, so a configuration file only has to
//! name the settings it changes. Files can be TOML, YAML or JSON; [`ConversionConfig::discover`]
//! looks for a `docmark.toml` in the current directory and its parents.

use crate::{DocmarkError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level settings for a [`DocumentConverter`](crate::DocumentConverter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Upper bound for a single converter attempt, in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Keep inline `data:` image URIs instead of truncating them.
    #[serde(default)]
    pub keep_data_uris: bool,

    /// Downscale kept data-URI images larger than this many KiB.
    #[serde(default = "default_max_image_size_kb")]
    pub max_image_size_kb: Option<u64>,

    /// Maximum concurrent conversions in `batch_convert` (defaults to `num_cpus * 2`).
    #[serde(default)]
    pub max_concurrent_conversions: Option<usize>,

    /// Parent directory for per-attempt workspaces (defaults to the OS temp dir).
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    /// Number of leading bytes the sniffer inspects.
    #[serde(default = "default_sniff_window_bytes")]
    pub sniff_window_bytes: usize,

    #[serde(default)]
    pub normalize: NormalizeOptions,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// Options for the Markdown normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Append the trailing metadata block.
    #[serde(default = "default_true")]
    pub emit_metadata: bool,

    /// Deepest heading level kept; deeper headings are clamped to it.
    #[serde(default = "default_max_heading_level")]
    pub max_heading_level: u8,
}

/// External executables used by the built-in converters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_exiftool")]
    pub exiftool: ToolConfig,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: ToolConfig,

    #[serde(default = "default_pdftotext")]
    pub pdftotext: ToolConfig,

    /// Speech-to-text program; transcription is skipped when unset.
    #[serde(default)]
    pub transcriber: Option<ToolConfig>,
}

/// One external executable.
///
/// `args` is an argument template: `{input}` expands to the materialized input file and
/// `{workspace}` to the attempt's scratch directory. An empty template means "use the
/// adapter's fixed arguments".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugin names that are skipped at load time.
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_attempt_timeout_secs() -> u64 {
    120
}
fn default_max_image_size_kb() -> Option<u64> {
    Some(200)
}
fn default_sniff_window_bytes() -> usize {
    crate::core::sniff::DEFAULT_SNIFF_WINDOW
}
fn default_max_heading_level() -> u8 {
    6
}
fn default_tool_timeout_secs() -> u64 {
    60
}
fn default_max_output_bytes() -> usize {
    8 * 1024 * 1024
}
fn default_exiftool() -> ToolConfig {
    ToolConfig::new("exiftool")
}
fn default_ffprobe() -> ToolConfig {
    ToolConfig::new("ffprobe")
}
fn default_pdftotext() -> ToolConfig {
    ToolConfig::new("pdftotext")
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: default_attempt_timeout_secs(),
            keep_data_uris: false,
            max_image_size_kb: default_max_image_size_kb(),
            max_concurrent_conversions: None,
            workspace_root: None,
            sniff_window_bytes: default_sniff_window_bytes(),
            normalize: NormalizeOptions::default(),
            tools: ToolsConfig::default(),
            plugins: PluginsConfig::default(),
        }
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            emit_metadata: true,
            max_heading_level: default_max_heading_level(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            exiftool: default_exiftool(),
            ffprobe: default_ffprobe(),
            pdftotext: default_pdftotext(),
            transcriber: None,
        }
    }
}

impl ToolConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            enabled: true,
            program: program.into(),
            args: Vec::new(),
            timeout_secs: default_tool_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ToolsConfig {
    /// Replace executable paths with `DOCMARK_EXIFTOOL_PATH`, `DOCMARK_FFPROBE_PATH` and
    /// `DOCMARK_PDFTOTEXT_PATH` when those are set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        let targets = [
            ("DOCMARK_EXIFTOOL_PATH", &mut self.exiftool),
            ("DOCMARK_FFPROBE_PATH", &mut self.ffprobe),
            ("DOCMARK_PDFTOTEXT_PATH", &mut self.pdftotext),
        ];

        for (var, tool) in targets {
            if let Some(value) = env::var_os(var).filter(|v| !v.is_empty()) {
                let program = value.to_string_lossy().into_owned();
                tracing::debug!(var, program = %program, "Executable path overridden from environment");
                tool.program = program;
            }
        }
    }
}

impl ConversionConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.attempt_timeout_secs == 0 {
            return Err(DocmarkError::validation("attempt_timeout_secs must be greater than zero"));
        }
        if self.sniff_window_bytes == 0 {
            return Err(DocmarkError::validation("sniff_window_bytes must be greater than zero"));
        }
        if !(1..=6).contains(&self.normalize.max_heading_level) {
            return Err(DocmarkError::validation(format!(
                "normalize.max_heading_level must be between 1 and 6, got {}",
                self.normalize.max_heading_level
            )));
        }
        if self.max_concurrent_conversions == Some(0) {
            return Err(DocmarkError::validation("max_concurrent_conversions must be greater than zero"));
        }

        let tools = [
            ("exiftool", Some(&self.tools.exiftool)),
            ("ffprobe", Some(&self.tools.ffprobe)),
            ("pdftotext", Some(&self.tools.pdftotext)),
            ("transcriber", self.tools.transcriber.as_ref()),
        ];
        for (name, tool) in tools {
            let Some(tool) = tool else { continue };
            if tool.enabled && tool.program.trim().is_empty() {
                return Err(DocmarkError::validation(format!("tools.{}.program cannot be empty", name)));
            }
            if tool.timeout_secs == 0 {
                return Err(DocmarkError::validation(format!(
                    "tools.{}.timeout_secs must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `DocmarkError::Validation` if the file doesn't exist or is invalid TOML.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        toml::from_str(&content)
            .map_err(|e| DocmarkError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| DocmarkError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| DocmarkError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration, picking the parser from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Self::from_toml_file(path),
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            other => Err(DocmarkError::validation(format!(
                "Unsupported config file extension '{}' for {} (expected toml, yaml, yml or json)",
                other,
                path.display()
            ))),
        }
    }

    /// Discover configuration file in parent directories.
    ///
    /// Searches for `docmark.toml` in the current directory and its parents.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = env::current_dir().map_err(DocmarkError::Io)?;

        loop {
            let docmark_toml = current.join("docmark.toml");
            if docmark_toml.exists() {
                tracing::debug!(path = %docmark_toml.display(), "Discovered configuration file");
                return Ok(Some(Self::from_toml_file(docmark_toml)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| DocmarkError::validation(format!("Failed to read config file {}: {}", path.display(), e)))
}
