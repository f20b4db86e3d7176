//! Built-in converters.
//!
//! This module contains the default converters that ship with docmark. All of them
//! implement the [`Converter`](crate::plugins::Converter) plugin trait and are registered by
//! [`builtin_descriptors`] before any plugin package is loaded.

use crate::core::config::ConversionConfig;
use crate::plugins::ConverterDescriptor;
use crate::types::Metadata;
use crate::{DocmarkError, Result};

pub mod csv;
pub mod exif;
pub mod media;
pub mod pdf;
pub mod structured;
pub mod text;

#[cfg(feature = "office")]
pub mod docx;

#[cfg(feature = "html")]
pub mod html;

#[cfg(feature = "images")]
pub mod image;

/// Descriptors for every built-in converter enabled by crate features and `config`.
///
/// Converters that need an external tool are left out when that tool is disabled. The
/// media converter only advertises transcription when a transcriber is configured.
pub fn builtin_descriptors(config: &ConversionConfig) -> Vec<ConverterDescriptor> {
    let mut descriptors = vec![
        text::PlainTextConverter::descriptor(),
        text::MarkdownConverter::descriptor(),
        csv::CsvConverter::descriptor(),
        structured::JsonConverter::descriptor(),
        structured::XmlConverter::descriptor(),
    ];

    #[cfg(feature = "html")]
    descriptors.push(html::HtmlConverter::descriptor());

    #[cfg(feature = "office")]
    descriptors.push(docx::DocxConverter::descriptor());

    if config.tools.pdftotext.enabled {
        descriptors.push(pdf::PdfTextConverter::descriptor());
    }

    #[cfg(feature = "images")]
    descriptors.push(image::ImageConverter::descriptor());

    if config.tools.ffprobe.enabled {
        let transcribe = config.tools.transcriber.as_ref().is_some_and(|tool| tool.enabled);
        descriptors.push(media::MediaConverter::descriptor(transcribe));
    }

    if config.tools.exiftool.enabled {
        descriptors.push(exif::ExifMetadataConverter::descriptor());
    }

    descriptors
}

/// Decode bytes as UTF-8 (lossy), dropping a leading BOM.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Split a leading YAML front matter block (`---` ... `---`) off Markdown text.
///
/// Returns the parsed mapping (if there was one) and the remaining body. Front matter that
/// is not a YAML mapping is an error.
pub(crate) fn split_front_matter(text: &str) -> Result<(Option<Metadata>, &str)> {
    let Some(after_opening) = text.strip_prefix("---\n").or_else(|| text.strip_prefix("---\r\n")) else {
        return Ok((None, text));
    };

    let (yaml, body) = if let Some(body) = after_opening
        .strip_prefix("---\n")
        .or_else(|| after_opening.strip_prefix("---\r\n"))
    {
        ("", body)
    } else if let Some(pos) = after_opening.find("\n---\n") {
        (&after_opening[..pos], &after_opening[pos + 5..])
    } else if let Some(pos) = after_opening.find("\r\n---\r\n") {
        (&after_opening[..pos], &after_opening[pos + 7..])
    } else if let Some(yaml) = after_opening.strip_suffix("\n---") {
        (yaml, "")
    } else {
        return Ok((None, text));
    };

    if yaml.trim().is_empty() {
        return Ok((None, body));
    }

    let value: serde_json::Value = serde_yaml_ng::from_str(yaml)
        .map_err(|e| DocmarkError::parsing(format!("Failed to parse YAML front matter: {}", e)))?;

    match value {
        serde_json::Value::Object(mapping) => Ok((Some(mapping.into_iter().collect()), body)),
        _ => Err(DocmarkError::parsing("YAML front matter is not a mapping")),
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> crate::core::context::ConversionContext {
    test_context_with(ConversionConfig::default())
}

#[cfg(test)]
pub(crate) fn test_context_with(config: ConversionConfig) -> crate::core::context::ConversionContext {
    use std::sync::Arc;
    let tools = crate::tools::ExternalTools::from_config(&config.tools);
    crate::core::context::ConversionContext::new(
        Arc::new(config),
        Arc::new(tools),
        tokio_util::sync::CancellationToken::new(),
    )
    .unwrap()
}

/// A tool configuration that runs `body` through `/bin/sh -c`, with the input path as `$1`.
#[cfg(all(test, unix))]
pub(crate) fn shell_tool(body: &str) -> crate::core::config::ToolConfig {
    crate::core::config::ToolConfig::new("/bin/sh").with_args(["-c", body, "sh", "{input}"])
}
