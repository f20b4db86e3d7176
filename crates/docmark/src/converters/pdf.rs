//! PDF converter backed by poppler's `pdftotext`.

use crate::Result;
use crate::converters::text::paragraphs;
use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::plugins::{Capability, Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::types::{Block, InputDocument, Intermediate};
use async_trait::async_trait;
use std::sync::Arc;

pub struct PdfTextConverter;

impl PdfTextConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats([formats::PDF]))
            .with_capability(Capability::ExternalTool)
    }
}

impl Default for PdfTextConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PdfTextConverter {
    fn name(&self) -> &str {
        "pdf-text"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Extracts the text layer of PDF documents with pdftotext"
    }
}

#[async_trait]
impl Converter for PdfTextConverter {
    async fn convert(&self, document: &InputDocument, context: &ConversionContext) -> Result<Intermediate> {
        let path = context.materialize(document).await?;
        let pages = context
            .tools()
            .pdftotext
            .pages(&path, context.workspace(), context.cancellation())
            .await?;

        let mut output = Intermediate::new();
        if pages.is_empty() {
            return Ok(output);
        }

        output.insert_metadata("page_count", pages.len());
        for page in &pages {
            for paragraph in paragraphs(page) {
                output.push(Block::paragraph(paragraph.trim()));
            }
        }

        if output.blocks.is_empty() {
            output.warn("PDF has no text layer; it may be a scanned document");
        }
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::DocmarkError;
    use crate::converters::{shell_tool, test_context_with};
    use crate::core::config::ConversionConfig;
    use crate::error::ToolFailure;

    fn context_with_pdftotext(body: &str) -> ConversionContext {
        let mut config = ConversionConfig::default();
        config.tools.pdftotext = shell_tool(body);
        test_context_with(config)
    }

    #[tokio::test]
    async fn test_pages_become_paragraphs() {
        let context = context_with_pdftotext(r"printf 'Title line\n\n  Body text\f\fLast page\f'");
        let document = InputDocument::new(b"%PDF-1.7 fake".to_vec(), "report.pdf");

        let output = PdfTextConverter::new().convert(&document, &context).await.unwrap();

        assert_eq!(
            output.blocks,
            vec![
                Block::paragraph("Title line"),
                Block::paragraph("Body text"),
                Block::paragraph("Last page"),
            ]
        );
        assert_eq!(output.metadata["page_count"], 3);
    }

    #[tokio::test]
    async fn test_input_is_materialized_with_its_name() {
        let context = context_with_pdftotext(r#"basename "$1""#);
        let document = InputDocument::new(b"%PDF-1.7".to_vec(), "../../etc/report 2024.pdf");

        let output = PdfTextConverter::new().convert(&document, &context).await.unwrap();
        assert_eq!(output.blocks, vec![Block::paragraph("report_2024.pdf")]);
    }

    #[tokio::test]
    async fn test_tool_failure_is_tool_unavailable() {
        let context = context_with_pdftotext("echo 'Syntax Error' >&2; exit 1");
        let document = InputDocument::new(b"%PDF-1.7".to_vec(), "broken.pdf");

        let result = PdfTextConverter::new().convert(&document, &context).await;
        match result {
            Err(DocmarkError::ExternalToolUnavailable { tool, reason }) => {
                assert_eq!(tool, "pdftotext");
                assert!(matches!(reason, ToolFailure::NonZeroExit { code: Some(1), .. }));
            }
            other => panic!("expected tool failure, got {:?}", other),
        }
    }
}
