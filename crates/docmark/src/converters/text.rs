//! Plain text and Markdown converters.

use crate::Result;
use crate::converters::{decode_text, split_front_matter};
use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::plugins::{Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::types::{Block, InputDocument, Intermediate};
use async_trait::async_trait;
use std::sync::Arc;

/// Plain text converter.
///
/// Each run of non-blank lines becomes one paragraph. Markdown syntax in the text is
/// escaped by the normalizer, so `# foo` in a `.txt` file stays literal.
pub struct PlainTextConverter;

impl PlainTextConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats([formats::TEXT]))
    }
}

impl Default for PlainTextConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PlainTextConverter {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Converts plain text files into paragraphs"
    }
}

#[async_trait]
impl Converter for PlainTextConverter {
    async fn convert(&self, document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
        let text = decode_text(document.bytes()).replace("\r\n", "\n");

        let mut output = Intermediate::new();
        for paragraph in paragraphs(&text) {
            output.push(Block::paragraph(paragraph));
        }

        if !output.blocks.is_empty() {
            output.insert_metadata("line_count", text.lines().count());
            output.insert_metadata("word_count", text.split_whitespace().count());
            output.insert_metadata("character_count", text.chars().count());
        }
        Ok(output)
    }
}

pub(crate) fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// Markdown converter.
///
/// Passes the document through, lifting YAML front matter into metadata and the first
/// level-one heading (or a front matter `title`) into the title.
pub struct MarkdownConverter;

impl MarkdownConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats([formats::MARKDOWN]))
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for MarkdownConverter {
    fn name(&self) -> &str {
        "markdown"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Passes Markdown through, extracting front matter"
    }
}

#[async_trait]
impl Converter for MarkdownConverter {
    async fn convert(&self, document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
        let text = decode_text(document.bytes());
        let mut output = Intermediate::new();

        let body = match split_front_matter(&text) {
            Ok((Some(front_matter), body)) => {
                output.metadata = front_matter;
                body
            }
            Ok((None, body)) => body,
            Err(e) => {
                output.warn(format!("Front matter ignored: {}", e));
                text.as_str()
            }
        };

        let title = output
            .metadata
            .get("title")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .or_else(|| first_h1(body));
        output.title = title;

        output.push(Block::markdown(body));
        Ok(output)
    }
}

fn first_h1(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("# "))
        .map(|heading| heading.trim().trim_end_matches('#').trim().to_string())
        .find(|heading| !heading.is_empty())
}
