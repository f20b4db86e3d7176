use crate::error::ToolFailure;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Input
// ============================================================================

/// A document submitted for conversion.
///
/// The bytes are held behind an `Arc` so every attempt of one conversion can read the
/// same buffer without copying. The document is never mutated after creation.
#[derive(Debug, Clone)]
pub struct InputDocument {
    bytes: Arc<[u8]>,
    filename: String,
    content_type: Option<String>,
}

impl InputDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
            filename: filename.into(),
            content_type: None,
        }
    }

    /// Attach a declared content type. Only used as a low-priority sniffing hint.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.content_type = if content_type.trim().is_empty() {
            None
        } else {
            Some(content_type)
        };
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension of the declared filename, without the dot.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

// ============================================================================
// Converter output (intermediate representation)
// ============================================================================

/// Converter-local metadata. Keys are namespaced by the orchestrator.
pub type Metadata = IndexMap<String, serde_json::Value>;

/// What a converter hands to the normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Intermediate {
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Intermediate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// True when no block and no metadata value would render to any text.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Block::is_blank)
            && self
                .metadata
                .values()
                .all(|value| crate::normalize::render_value(value).is_none())
    }
}

/// A structural unit of converter output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Heading hint; the level is clamped and remapped by the normalizer.
    Heading { level: u8, text: String },
    Paragraph { text: String },
    /// Markdown produced by a converter that already speaks Markdown.
    Markdown { text: String },
    Code {
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        text: String,
    },
    Table(Table),
    List { ordered: bool, items: Vec<String> },
}

impl Block {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Block::Markdown { text: text.into() }
    }

    pub fn code(language: Option<&str>, text: impl Into<String>) -> Self {
        Block::Code {
            language: language.map(str::to_string),
            text: text.into(),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Block::Heading { text, .. }
            | Block::Paragraph { text }
            | Block::Markdown { text }
            | Block::Code { text, .. } => text.trim().is_empty(),
            Block::Table(table) => table.is_empty(),
            Block::List { items, .. } => items.iter().all(|item| item.trim().is_empty()),
        }
    }
}

/// Tabular data. When `header` is `None` the first row is promoted on rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Option<Vec<String>>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    pub fn is_empty(&self) -> bool {
        let header_blank = self
            .header
            .as_ref()
            .is_none_or(|cells| cells.iter().all(|cell| cell.trim().is_empty()));
        header_blank && self.rows.iter().all(|row| row.iter().all(|cell| cell.trim().is_empty()))
    }
}

/// One timed piece of a transcript produced by a transcription tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

// ============================================================================
// Conversion outcome
// ============================================================================

/// Final product of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub markdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Keys are `"<converter-id>.<key>"`.
    pub metadata: Metadata,
    pub warnings: Vec<String>,
    /// Format candidate the winning converter was selected for.
    pub format: String,
    pub converter_id: String,
}

/// One (candidate, converter, outcome) step of orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub format: String,
    pub converter_id: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed(AttemptFailure),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Succeeded => write!(f, "succeeded"),
            AttemptOutcome::Failed(failure) => write!(f, "{}", failure),
        }
    }
}

/// Why one converter attempt did not produce a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptFailure {
    /// The converter returned an error of its own.
    Converter { message: String },
    /// An external tool the converter depends on was unavailable.
    ExternalTool { tool: String, reason: ToolFailure },
    /// The converter succeeded but produced nothing.
    EmptyContent,
    /// The attempt exceeded the configured attempt timeout.
    TimedOut { after_ms: u64 },
    Panicked { message: String },
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Converter { message } => write!(f, "{}", message),
            AttemptFailure::ExternalTool { tool, reason } => write!(f, "external tool '{}' unavailable: {}", tool, reason),
            AttemptFailure::EmptyContent => write!(f, "empty content"),
            AttemptFailure::TimedOut { after_ms } => write!(f, "timed out after {} ms", after_ms),
            AttemptFailure::Panicked { message } => write!(f, "panicked: {}", message),
        }
    }
}
