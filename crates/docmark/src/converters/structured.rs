//! JSON and XML converters.
//!
//! Both render the document as a fenced code block. They sit below the default priority
//! so format-specific converters registered by plugins win on the same format.

use crate::converters::decode_text;
use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::plugins::{Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::types::{Block, InputDocument, Intermediate};
use crate::{DocmarkError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const JSON_PRIORITY: i32 = 40;
pub const XML_PRIORITY: i32 = 30;

/// Pretty-prints JSON (or JSON Lines) into a fenced `json` block.
pub struct JsonConverter;

impl JsonConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats([formats::JSON])).with_priority(JSON_PRIORITY)
    }
}

impl Default for JsonConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for JsonConverter {
    fn name(&self) -> &str {
        "json"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[async_trait]
impl Converter for JsonConverter {
    async fn convert(&self, document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
        let text = decode_text(document.bytes());
        let mut output = Intermediate::new();
        if text.trim().is_empty() {
            return Ok(output);
        }

        let value = match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(whole_error) => parse_json_lines(&text).ok_or_else(|| {
                DocmarkError::parsing_with_source("Document is neither JSON nor JSON Lines", whole_error)
            })?,
        };

        let kind = match &value {
            Value::Object(map) => {
                output.insert_metadata("key_count", map.len());
                "object"
            }
            Value::Array(items) => {
                output.insert_metadata("item_count", items.len());
                "array"
            }
            _ => "scalar",
        };
        output.insert_metadata("json_type", kind);

        output.push(Block::code(Some("json"), serde_json::to_string_pretty(&value)?));
        Ok(output)
    }
}

/// One JSON value per non-blank line, collected into an array.
fn parse_json_lines(text: &str) -> Option<Value> {
    let items: Option<Vec<Value>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).ok())
        .collect();
    items.filter(|items| items.len() > 1).map(Value::Array)
}

/// Wraps XML in a fenced `xml` block.
pub struct XmlConverter;

impl XmlConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats([formats::XML])).with_priority(XML_PRIORITY)
    }
}

impl Default for XmlConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for XmlConverter {
    fn name(&self) -> &str {
        "xml"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[async_trait]
impl Converter for XmlConverter {
    async fn convert(&self, document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
        let text = decode_text(document.bytes());
        let mut output = Intermediate::new();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(output);
        }

        #[cfg(feature = "office")]
        {
            let parsed = roxmltree::Document::parse(trimmed)?;
            output.insert_metadata("root_element", parsed.root_element().tag_name().name());
        }

        output.push(Block::code(Some("xml"), trimmed));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::test_context;

    #[tokio::test]
    async fn test_json_pretty_printed() {
        let document = InputDocument::new(br#"{"a":1,"b":[true,null]}"#.to_vec(), "data.json");
        let output = JsonConverter::new().convert(&document, &test_context()).await.unwrap();

        assert_eq!(
            output.blocks,
            vec![Block::code(Some("json"), "{\n  \"a\": 1,\n  \"b\": [\n    true,\n    null\n  ]\n}")]
        );
        assert_eq!(output.metadata["json_type"], "object");
        assert_eq!(output.metadata["key_count"], 2);
    }

    #[tokio::test]
    async fn test_json_lines() {
        let document = InputDocument::new(b"{\"n\":1}\n\n{\"n\":2}\n".to_vec(), "events.jsonl");
        let output = JsonConverter::new().convert(&document, &test_context()).await.unwrap();
        assert_eq!(output.metadata["item_count"], 2);
    }

    #[tokio::test]
    async fn test_invalid_json_fails() {
        let document = InputDocument::new(b"{not json".to_vec(), "data.json");
        let result = JsonConverter::new().convert(&document, &test_context()).await;
        assert!(matches!(result, Err(DocmarkError::Parsing { .. })));
    }

    #[tokio::test]
    async fn test_xml_fenced() {
        let document = InputDocument::new(b"\n<?xml version=\"1.0\"?><note><to>Ada</to></note>\n".to_vec(), "n.xml");
        let output = XmlConverter::new().convert(&document, &test_context()).await.unwrap();
        assert_eq!(
            output.blocks,
            vec![Block::code(Some("xml"), "<?xml version=\"1.0\"?><note><to>Ada</to></note>")]
        );
    }

    #[cfg(feature = "office")]
    #[tokio::test]
    async fn test_malformed_xml_fails() {
        let document = InputDocument::new(b"<a><b></a>".to_vec(), "bad.xml");
        assert!(XmlConverter::new().convert(&document, &test_context()).await.is_err());
    }
}
