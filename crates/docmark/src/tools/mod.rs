//! External tool adapters.
//!
//! Each adapter wraps one executable behind a narrow async call: a path goes in,
//! structured data or `DocmarkError::ExternalToolUnavailable` comes out. Process
//! management (spawning, output limits, timeouts, cancellation) lives in [`runner`].

pub mod exiftool;
pub mod ffprobe;
pub mod pdftotext;
pub mod runner;
pub mod transcribe;

pub use exiftool::ExifTool;
pub use ffprobe::{AudioStream, FfProbe, MediaProbe, VideoStream};
pub use pdftotext::PdfToText;
pub use runner::{ToolOutput, ToolRunner};
pub use transcribe::Transcriber;

use crate::core::config::ToolsConfig;

/// The set of adapters available to converters, built once from configuration.
#[derive(Debug, Clone)]
pub struct ExternalTools {
    pub exiftool: ExifTool,
    pub ffprobe: FfProbe,
    pub pdftotext: PdfToText,
    pub transcriber: Option<Transcriber>,
}

impl ExternalTools {
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            exiftool: ExifTool::new(config.exiftool.clone()),
            ffprobe: FfProbe::new(config.ffprobe.clone()),
            pdftotext: PdfToText::new(config.pdftotext.clone()),
            transcriber: config
                .transcriber
                .as_ref()
                .filter(|tool| tool.enabled)
                .map(|tool| Transcriber::new(tool.clone())),
        }
    }
}

impl Default for ExternalTools {
    fn default() -> Self {
        Self::from_config(&ToolsConfig::default())
    }
}
