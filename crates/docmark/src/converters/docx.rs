//! DOCX converter.
//!
//! Reads `word/document.xml` straight out of the package with `zip` and `roxmltree`:
//! paragraphs styled `Title` or `Heading1`..`Heading9` become headings, numbered
//! paragraphs become list items, and `w:tbl` elements become tables. Dublin Core
//! properties from `docProps/core.xml` become metadata.

use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::plugins::{Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::types::{Block, InputDocument, Intermediate, Table};
use crate::{DocmarkError, Result};
use async_trait::async_trait;
use roxmltree::Node;
use std::io::{Cursor, Read, Seek};
use std::sync::Arc;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Upper bound on the inflated size of a single package part.
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Core property element name to metadata key.
const CORE_PROPERTIES: &[(&str, &str)] = &[
    ("creator", "author"),
    ("subject", "subject"),
    ("description", "description"),
    ("keywords", "keywords"),
    ("lastModifiedBy", "last_modified_by"),
    ("created", "created"),
    ("modified", "modified"),
    ("language", "language"),
];

pub struct DocxConverter;

impl DocxConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats([formats::DOCX]))
    }
}

impl Default for DocxConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for DocxConverter {
    fn name(&self) -> &str {
        "docx"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Converts Word documents (headings, paragraphs, lists, tables)"
    }
}

#[async_trait]
impl Converter for DocxConverter {
    async fn convert(&self, document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
        let document = document.clone();
        tokio::task::spawn_blocking(move || convert_package(document.bytes(), MAX_PART_BYTES))
            .await
            .map_err(|e| DocmarkError::parsing(format!("DOCX task join error: {}", e)))?
    }
}

fn convert_package(bytes: &[u8], part_limit: u64) -> Result<Intermediate> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let document_xml = read_part(&mut archive, DOCUMENT_PART, part_limit)?
        .ok_or_else(|| DocmarkError::parsing(format!("Package has no {}", DOCUMENT_PART)))?;
    let parsed = roxmltree::Document::parse(&document_xml)?;

    let mut output = Intermediate::new();
    if let Some(body) = parsed.root_element().children().find(|n| n.has_tag_name("body")) {
        convert_body(body, &mut output);
    }

    if let Some(core_xml) = read_part(&mut archive, CORE_PROPERTIES_PART, part_limit)? {
        match roxmltree::Document::parse(&core_xml) {
            Ok(core) => apply_core_properties(core.root_element(), &mut output),
            Err(e) => output.warn(format!("Ignored malformed {}: {}", CORE_PROPERTIES_PART, e)),
        }
    }

    Ok(output)
}

/// Reads one part, failing once more than `limit` bytes have been inflated.
fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str, limit: u64) -> Result<Option<String>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if file.size() > limit {
        return Err(DocmarkError::parsing(format!(
            "{} declares {} bytes, above the {} byte limit",
            name,
            file.size(),
            limit
        )));
    }

    let mut content = Vec::new();
    file.take(limit + 1)
        .read_to_end(&mut content)
        .map_err(|e| DocmarkError::parsing(format!("Failed to read {}: {}", name, e)))?;
    if content.len() as u64 > limit {
        return Err(DocmarkError::parsing(format!("{} inflates beyond {} bytes", name, limit)));
    }

    String::from_utf8(content)
        .map(Some)
        .map_err(|e| DocmarkError::parsing(format!("{} is not UTF-8: {}", name, e)))
}

fn convert_body(body: Node<'_, '_>, output: &mut Intermediate) {
    let mut list_items: Vec<String> = Vec::new();

    for node in body.children().filter(Node::is_element) {
        if node.has_tag_name("p") {
            let text = paragraph_text(node);
            if is_list_item(node) {
                if !text.trim().is_empty() {
                    list_items.push(text);
                }
                continue;
            }
            flush_list(&mut list_items, output);

            if text.trim().is_empty() {
                continue;
            }
            match heading_level(node) {
                Some(level) => {
                    if output.title.is_none() && style_id(node).is_some_and(|s| s.eq_ignore_ascii_case("title")) {
                        output.title = Some(text.trim().to_string());
                    }
                    output.push(Block::heading(level, text));
                }
                None => {
                    output.push(Block::paragraph(text));
                }
            }
        } else if node.has_tag_name("tbl") {
            flush_list(&mut list_items, output);
            let table = table_of(node);
            if !table.is_empty() {
                output.push(Block::Table(table));
            }
        }
    }
    flush_list(&mut list_items, output);
}

fn flush_list(items: &mut Vec<String>, output: &mut Intermediate) {
    if !items.is_empty() {
        output.push(Block::List {
            ordered: false,
            items: std::mem::take(items),
        });
    }
}

/// Text of a paragraph: runs concatenated, `w:tab` as a space, `w:br` as a line break.
fn paragraph_text(paragraph: Node<'_, '_>) -> String {
    let mut text = String::new();
    for node in paragraph.descendants().filter(Node::is_element) {
        match node.tag_name().name() {
            "t" => text.push_str(node.text().unwrap_or_default()),
            "tab" if node.parent().is_some_and(|p| p.has_tag_name("r")) => text.push(' '),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn paragraph_properties<'a, 'input>(paragraph: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    paragraph.children().find(|n| n.has_tag_name("pPr"))
}

fn style_id<'a>(paragraph: Node<'a, '_>) -> Option<&'a str> {
    let style = paragraph_properties(paragraph)?.children().find(|n| n.has_tag_name("pStyle"))?;
    local_attribute(style, "val")
}

fn is_list_item(paragraph: Node<'_, '_>) -> bool {
    paragraph_properties(paragraph).is_some_and(|props| props.children().any(|n| n.has_tag_name("numPr")))
        || style_id(paragraph).is_some_and(|style| style.to_ascii_lowercase().starts_with("listparagraph"))
}

/// `Title` is level 1; `Heading1`..`Heading9` (any case, spaces ignored) map to their number.
fn heading_level(paragraph: Node<'_, '_>) -> Option<u8> {
    let style: String = style_id(paragraph)?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    if style == "title" {
        return Some(1);
    }
    let level: u8 = style.strip_prefix("heading")?.parse().ok()?;
    (1..=9).contains(&level).then_some(level)
}

fn table_of(table: Node<'_, '_>) -> Table {
    let rows = table
        .children()
        .filter(|n| n.has_tag_name("tr"))
        .map(|row| {
            row.children()
                .filter(|n| n.has_tag_name("tc"))
                .map(|cell| {
                    cell.descendants()
                        .filter(|n| n.has_tag_name("p"))
                        .map(paragraph_text)
                        .filter(|text| !text.trim().is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<String>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();
    Table::new(None, rows)
}

fn apply_core_properties(root: Node<'_, '_>, output: &mut Intermediate) {
    if output.title.is_none() {
        output.title = element_text(root, "title");
    }
    for (element, key) in CORE_PROPERTIES {
        if let Some(value) = element_text(root, element) {
            output.insert_metadata(*key, value);
        }
    }
}

fn element_text(root: Node<'_, '_>, name: &str) -> Option<String> {
    root.descendants()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn local_attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes().find(|attr| attr.name() == name).map(|attr| attr.value())
}
