//! Markdown normalizer.
//!
//! Converters hand over an [`Intermediate`]; this module turns it into canonical Markdown.
//! [`render`] lays the blocks out and [`normalize_markdown`] canonicalizes the text, so the
//! output of either is a fixed point of [`normalize_markdown`].

pub mod images;
pub mod markdown;
pub mod table;

pub use images::{process_data_uris, resize_base64_images, truncate_data_uris};
pub use markdown::normalize_markdown;
pub use table::{escape_cell, render_table};

use crate::core::config::{ConversionConfig, NormalizeOptions};
use crate::types::{Block, Intermediate, Metadata};
use serde_json::Value;

/// Render an intermediate representation to canonical Markdown.
///
/// Metadata keys in the trailing block are prefixed with `namespace.` unless the namespace
/// is empty.
pub fn render(intermediate: &Intermediate, options: &NormalizeOptions, namespace: &str) -> String {
    normalize_markdown(&render_raw(intermediate, options, namespace), options)
}

/// Render, apply the data-URI policy from `config`, then normalize.
pub fn finalize(intermediate: &Intermediate, config: &ConversionConfig, namespace: &str) -> String {
    let raw = render_raw(intermediate, &config.normalize, namespace);
    let processed = process_data_uris(&raw, config.keep_data_uris, config.max_image_size_kb);
    normalize_markdown(&processed, &config.normalize)
}

fn render_raw(intermediate: &Intermediate, options: &NormalizeOptions, namespace: &str) -> String {
    let mut sections: Vec<String> = intermediate
        .blocks
        .iter()
        .map(render_block)
        .filter(|section| !section.trim().is_empty())
        .collect();

    if options.emit_metadata
        && let Some(block) = render_metadata(&intermediate.metadata, namespace)
    {
        sections.push(block);
    }

    sections.join("\n\n")
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Heading { level, text } => {
            let text = collapse(text);
            if text.is_empty() {
                return String::new();
            }
            format!("{} {}", "#".repeat((*level).clamp(1, 6) as usize), text)
        }
        Block::Paragraph { text } => text.lines().map(escape_line_start).collect::<Vec<_>>().join("\n"),
        Block::Markdown { text } => text.clone(),
        Block::Code { language, text } => render_code(language.as_deref(), text),
        Block::Table(table) => render_table(table),
        Block::List { ordered, items } => items
            .iter()
            .map(|item| collapse(item))
            .filter(|item| !item.is_empty())
            .enumerate()
            .map(|(index, item)| {
                if *ordered {
                    format!("{}. {}", index + 1, item)
                } else {
                    format!("- {}", item)
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Plain text must not turn into headings, tables or fences.
fn escape_line_start(line: &str) -> String {
    let trimmed = line.trim_start();
    let special = trimmed.starts_with('#')
        || trimmed.starts_with('|')
        || trimmed.starts_with("```")
        || trimmed.starts_with("~~~");
    if special {
        format!("{}\\{}", &line[..line.len() - trimmed.len()], trimmed)
    } else {
        line.to_string()
    }
}

fn render_code(language: Option<&str>, text: &str) -> String {
    let longest_run = text
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat((longest_run + 1).max(3));
    let info = language.map(|lang| lang.split_whitespace().collect::<String>()).unwrap_or_default();
    let body = text.trim_end_matches(['\n', '\r']);
    format!("{fence}{info}\n{body}\n{fence}")
}

fn render_metadata(metadata: &Metadata, namespace: &str) -> Option<String> {
    let lines: Vec<String> = metadata
        .iter()
        .filter_map(|(key, value)| {
            let value = render_value(value)?;
            let key = if namespace.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", namespace, key)
            };
            Some(format!("- **{}**: {}", key, value))
        })
        .collect();

    if lines.is_empty() {
        return None;
    }
    Some(format!("---\n{}", lines.join("\n")))
}

pub(crate) fn render_value(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::Null => return None,
        Value::String(s) => collapse(s),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(collapse(s)),
                other => Some(other.to_string()),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    };
    (!rendered.is_empty()).then_some(rendered)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
