//! pdftotext (poppler) adapter: layout-preserving text, one entry per page.

use crate::Result;
use crate::core::config::ToolConfig;
use crate::tools::runner::ToolRunner;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub const PDFTOTEXT_ARGS: &[&str] = &["-layout", "-enc", "UTF-8", "{input}", "-"];

/// pdftotext ends every page with a form feed.
const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Clone)]
pub struct PdfToText {
    runner: ToolRunner,
}

impl PdfToText {
    pub fn new(config: ToolConfig) -> Self {
        Self {
            runner: ToolRunner::new("pdftotext", config, PDFTOTEXT_ARGS),
        }
    }

    /// Extract the text of every page of `input`.
    pub async fn pages(&self, input: &Path, workspace: &Path, cancel: &CancellationToken) -> Result<Vec<String>> {
        let output = self.runner.run(input, workspace, cancel).await?;
        Ok(split_pages(&output.stdout_text()))
    }
}

pub(crate) fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(|page| page.trim_end().to_string()).collect();
    while pages.last().is_some_and(|page| page.trim().is_empty()) {
        pages.pop();
    }
    pages
}
