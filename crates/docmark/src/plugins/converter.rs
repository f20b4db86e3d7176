//! Converter plugin trait and the descriptor the registry stores for each converter.

use crate::Result;
use crate::core::context::ConversionContext;
use crate::plugins::Plugin;
use crate::types::{InputDocument, Intermediate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Priority given to descriptors that do not set one.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Trait for converters that turn one document into an [`Intermediate`].
///
/// A converter is invoked once per attempt with a fresh [`ConversionContext`]. It should
/// return `Err` for anything that prevents a useful result; returning an empty
/// `Intermediate` is also treated as a failed attempt by the orchestrator.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docmark::plugins::{Converter, Plugin};
/// use docmark::core::context::ConversionContext;
/// use docmark::{Block, InputDocument, Intermediate, Result};
///
/// struct ShoutingConverter;
///
/// impl Plugin for ShoutingConverter {
///     fn name(&self) -> &str { "shouting" }
///     fn version(&self) -> String { "1.0.0".to_string() }
/// }
///
/// #[async_trait]
/// impl Converter for ShoutingConverter {
///     async fn convert(&self, document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
///         let text = String::from_utf8_lossy(document.bytes()).to_uppercase();
///         let mut output = Intermediate::new();
///         output.push(Block::paragraph(text));
///         Ok(output)
///     }
/// }
/// ```
#[async_trait]
pub trait Converter: Plugin {
    async fn convert(&self, document: &InputDocument, context: &ConversionContext) -> Result<Intermediate>;
}

/// Declared capabilities of a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Runs an external executable.
    ExternalTool,
    /// Performs network requests.
    Network,
    /// Produces transcripts from audio.
    Transcription,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ExternalTool => "external_tool",
            Capability::Network => "network",
            Capability::Transcription => "transcription",
        };
        f.write_str(name)
    }
}

/// Decides whether a converter accepts a candidate format id.
#[derive(Clone)]
pub enum FormatMatcher {
    /// Accepts exactly the listed format ids.
    Formats(Vec<String>),
    /// Accepts every format id the predicate returns `true` for.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl FormatMatcher {
    pub fn formats<I, S>(formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FormatMatcher::Formats(formats.into_iter().map(Into::into).collect())
    }

    pub fn predicate(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        FormatMatcher::Predicate(Arc::new(predicate))
    }

    pub fn matches(&self, format: &str) -> bool {
        match self {
            FormatMatcher::Formats(formats) => formats.iter().any(|f| f == format),
            FormatMatcher::Predicate(predicate) => predicate(format),
        }
    }

    /// A format list with no usable entry can never match anything.
    pub fn is_empty(&self) -> bool {
        match self {
            FormatMatcher::Formats(formats) => formats.iter().all(|f| f.trim().is_empty()),
            FormatMatcher::Predicate(_) => false,
        }
    }

    /// Listed formats, `None` for predicates.
    pub fn listed_formats(&self) -> Option<&[String]> {
        match self {
            FormatMatcher::Formats(formats) => Some(formats),
            FormatMatcher::Predicate(_) => None,
        }
    }
}

impl fmt::Debug for FormatMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatMatcher::Formats(formats) => f.debug_tuple("Formats").field(formats).finish(),
            FormatMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Registration record for one converter.
///
/// The id is the converter's [`Plugin::name`]. Descriptors are immutable once built and
/// are shared by the registry as `Arc<ConverterDescriptor>`.
#[derive(Clone)]
pub struct ConverterDescriptor {
    id: String,
    matcher: FormatMatcher,
    priority: i32,
    capabilities: Vec<Capability>,
    converter: Arc<dyn Converter>,
}

impl ConverterDescriptor {
    pub fn new(converter: Arc<dyn Converter>, matcher: FormatMatcher) -> Self {
        Self {
            id: converter.name().to_string(),
            matcher,
            priority: DEFAULT_PRIORITY,
            capabilities: Vec::new(),
            converter,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn matcher(&self) -> &FormatMatcher {
        &self.matcher
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    pub fn matches(&self, format: &str) -> bool {
        self.matcher.matches(format)
    }

    pub fn info(&self) -> ConverterInfo {
        ConverterInfo {
            id: self.id.clone(),
            version: self.converter.version(),
            priority: self.priority,
            capabilities: self.capabilities.clone(),
            formats: self.matcher.listed_formats().map(<[String]>::to_vec),
            description: Some(self.converter.description())
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        }
    }
}

impl fmt::Debug for ConverterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterDescriptor")
            .field("id", &self.id)
            .field("matcher", &self.matcher)
            .field("priority", &self.priority)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Serializable summary of a registered converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterInfo {
    pub id: String,
    pub version: String,
    pub priority: i32,
    pub capabilities: Vec<Capability>,
    /// `None` when the converter matches through a predicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
