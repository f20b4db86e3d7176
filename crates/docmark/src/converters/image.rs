//! Image converter.
//!
//! Images carry no text of their own, so the output is metadata: pixel dimensions read
//! from the header with the `image` crate, plus descriptive fields from exiftool when
//! that tool is enabled.

use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::error::ToolFailure;
use crate::plugins::{Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::types::{InputDocument, Intermediate};
use crate::{DocmarkError, Result};
use async_trait::async_trait;
use image::ImageReader;
use std::io::Cursor;
use std::sync::Arc;

/// exiftool fields worth surfacing for an image, in output order.
const EXIF_FIELDS: &[&str] = &[
    "ImageSize",
    "Title",
    "Caption",
    "Description",
    "Keywords",
    "Artist",
    "Author",
    "Copyright",
    "DateTimeOriginal",
    "CreateDate",
    "Make",
    "Model",
    "GPSPosition",
];

pub struct ImageConverter;

impl ImageConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(
            Arc::new(Self::new()),
            FormatMatcher::formats(formats::IMAGE_FORMATS.iter().copied()),
        )
    }
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ImageConverter {
    fn name(&self) -> &str {
        "image"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Reports image dimensions and embedded metadata"
    }
}

#[async_trait]
impl Converter for ImageConverter {
    async fn convert(&self, document: &InputDocument, context: &ConversionContext) -> Result<Intermediate> {
        let reader = ImageReader::new(Cursor::new(document.bytes()))
            .with_guessed_format()
            .map_err(|e| DocmarkError::parsing(format!("Failed to read image header: {}", e)))?;
        let format = reader
            .format()
            .ok_or_else(|| DocmarkError::parsing("Unrecognized image format"))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| DocmarkError::parsing_with_source("Failed to read image dimensions", e))?;

        let mut output = Intermediate::new();
        output.insert_metadata("format", format.to_mime_type());
        output.insert_metadata("width", width);
        output.insert_metadata("height", height);

        let exiftool = &context.tools().exiftool;
        if exiftool.is_enabled() {
            let path = context.materialize(document).await?;
            match exiftool.metadata(&path, context.workspace(), context.cancellation()).await {
                Ok(exif) => {
                    for field in EXIF_FIELDS {
                        if let Some(value) = exif.get(*field) {
                            output.insert_metadata(*field, value.clone());
                        }
                    }
                }
                Err(DocmarkError::ExternalToolUnavailable {
                    reason: ToolFailure::Missing { program },
                    ..
                }) => {
                    tracing::debug!(program = %program, "exiftool not installed, skipping image metadata");
                }
                Err(e) => output.warn(format!("Embedded image metadata unavailable: {}", e)),
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::test_context_with;
    use crate::core::config::ConversionConfig;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::new(width, height);
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn config_without_exiftool() -> ConversionConfig {
        let mut config = ConversionConfig::default();
        config.tools.exiftool.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_dimensions() {
        let document = InputDocument::new(png(7, 3), "pixel.png");
        let output = ImageConverter::new()
            .convert(&document, &test_context_with(config_without_exiftool()))
            .await
            .unwrap();

        assert_eq!(output.metadata["format"], "image/png");
        assert_eq!(output.metadata["width"], 7);
        assert_eq!(output.metadata["height"], 3);
        assert!(output.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_fails() {
        let document = InputDocument::new(b"not an image at all".to_vec(), "x.png");
        let result = ImageConverter::new()
            .convert(&document, &test_context_with(config_without_exiftool()))
            .await;
        assert!(matches!(result, Err(DocmarkError::Parsing { .. })));
    }

    #[tokio::test]
    async fn test_missing_exiftool_is_silent() {
        let mut config = ConversionConfig::default();
        config.tools.exiftool.program = "docmark-test-no-such-exiftool".to_string();

        let document = InputDocument::new(png(2, 2), "pixel.png");
        let output = ImageConverter::new()
            .convert(&document, &test_context_with(config))
            .await
            .unwrap();
        assert!(output.warnings.is_empty());
        assert_eq!(output.metadata["width"], 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exif_fields_are_merged() {
        let mut config = ConversionConfig::default();
        config.tools.exiftool = crate::converters::shell_tool(
            r#"echo '[{"SourceFile": "x", "Artist": "Ada", "Model": "X100", "Software": "ignored"}]'"#,
        );

        let document = InputDocument::new(png(2, 2), "pixel.png");
        let output = ImageConverter::new()
            .convert(&document, &test_context_with(config))
            .await
            .unwrap();
        assert_eq!(output.metadata["Artist"], "Ada");
        assert_eq!(output.metadata["Model"], "X100");
        assert!(!output.metadata.contains_key("Software"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exiftool_failure_becomes_warning() {
        let mut config = ConversionConfig::default();
        config.tools.exiftool = crate::converters::shell_tool("exit 2");

        let document = InputDocument::new(png(2, 2), "pixel.png");
        let output = ImageConverter::new()
            .convert(&document, &test_context_with(config))
            .await
            .unwrap();
        assert_eq!(output.warnings.len(), 1);
    }
}
