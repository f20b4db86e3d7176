//! Metadata-only fallback for images and media, backed by exiftool.

use crate::Result;
use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::plugins::{Capability, Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::types::{Block, InputDocument, Intermediate};
use async_trait::async_trait;
use std::sync::Arc;

pub const EXIF_PRIORITY: i32 = 30;

pub struct ExifMetadataConverter;

impl ExifMetadataConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(
            Arc::new(Self::new()),
            FormatMatcher::predicate(|format| formats::is_image(format) || formats::is_media(format)),
        )
        .with_priority(EXIF_PRIORITY)
        .with_capability(Capability::ExternalTool)
    }
}

impl Default for ExifMetadataConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ExifMetadataConverter {
    fn name(&self) -> &str {
        "exif-metadata"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Reports embedded metadata of images and media files with exiftool"
    }
}

#[async_trait]
impl Converter for ExifMetadataConverter {
    async fn convert(&self, document: &InputDocument, context: &ConversionContext) -> Result<Intermediate> {
        let path = context.materialize(document).await?;
        let metadata = context
            .tools()
            .exiftool
            .metadata(&path, context.workspace(), context.cancellation())
            .await?;

        let mut output = Intermediate::new();
        output.title = ["Title", "Headline"]
            .iter()
            .find_map(|key| metadata.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string);
        if let Some(file_type) = metadata.get("FileType").and_then(|v| v.as_str()) {
            output.push(Block::paragraph(format!("{} file.", file_type)));
        }
        output.metadata = metadata;
        Ok(output)
    }
}
