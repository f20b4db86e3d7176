//! HTML converter using html-to-markdown.

use crate::converters::{decode_text, split_front_matter};
use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::plugins::{Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::types::{Block, InputDocument, Intermediate};
use crate::{DocmarkError, Result};
use async_trait::async_trait;
use html_to_markdown_rs::{ConversionOptions, PreprocessingOptions, convert as convert_html};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static TITLE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap_or_else(|e| panic!("invalid title pattern: {e}"))
});

/// Front matter keys copied into metadata under a friendlier name.
const METADATA_KEYS: &[(&str, &str)] = &[
    ("meta-description", "description"),
    ("meta-keywords", "keywords"),
    ("meta-author", "author"),
    ("canonical", "canonical"),
    ("base-href", "base_href"),
    ("language", "language"),
];

pub struct HtmlConverter;

impl HtmlConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats([formats::HTML]))
    }
}

impl Default for HtmlConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for HtmlConverter {
    fn name(&self) -> &str {
        "html"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Converts HTML pages to Markdown"
    }
}

#[async_trait]
impl Converter for HtmlConverter {
    async fn convert(&self, document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
        let html = decode_text(document.bytes());
        let options = ConversionOptions {
            extract_metadata: true,
            preprocessing: PreprocessingOptions {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };

        let markdown = convert_html(&html, Some(options))
            .map_err(|e| DocmarkError::parsing(format!("Failed to convert HTML to Markdown: {}", e)))?;

        let mut output = Intermediate::new();
        let body = match split_front_matter(&markdown) {
            Ok((front_matter, body)) => {
                if let Some(front_matter) = front_matter {
                    for (source, target) in METADATA_KEYS {
                        if let Some(value) = front_matter.get(*source) {
                            output.insert_metadata(*target, value.clone());
                        }
                    }
                    output.title = front_matter.get("title").and_then(|v| v.as_str()).map(str::to_string);
                }
                body
            }
            Err(e) => {
                output.warn(format!("HTML metadata ignored: {}", e));
                markdown.as_str()
            }
        };

        if output.title.is_none() {
            output.title = title_from_html(&html);
        }

        output.push(Block::markdown(body));
        Ok(output)
    }
}

fn title_from_html(html: &str) -> Option<String> {
    let captured = TITLE_TAG.captures(html)?.get(1)?.as_str();
    let title = captured.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::test_context;

    #[test]
    fn test_title_from_html() {
        assert_eq!(
            title_from_html("<html><head><TITLE>\n  Quarterly   report </TITLE></head></html>").as_deref(),
            Some("Quarterly report")
        );
        assert_eq!(title_from_html("<html><title> </title></html>"), None);
        assert_eq!(title_from_html("<p>no title</p>"), None);
    }

    #[tokio::test]
    async fn test_html_converts_structure() {
        let html = b"<html><head><title>Doc</title></head><body><h1>Heading</h1><p>Some <strong>bold</strong> text.</p><ul><li>one</li><li>two</li></ul></body></html>";
        let document = InputDocument::new(html.to_vec(), "page.html");
        let output = HtmlConverter::new().convert(&document, &test_context()).await.unwrap();

        assert_eq!(output.title.as_deref(), Some("Doc"));
        let Block::Markdown { text } = &output.blocks[0] else {
            panic!("expected markdown block");
        };
        assert!(text.contains("Heading"));
        assert!(text.contains("**bold**"));
        assert!(text.contains("one"));
        assert!(!text.starts_with("---"));
    }
}
