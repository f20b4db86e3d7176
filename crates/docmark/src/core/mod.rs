//! Core conversion orchestration module.
//!
//! # Architecture
//!
//! - **Sniffing**: [`sniff`] infers candidate formats from bytes, filename and declared type
//! - **Formats**: [`formats`] holds format ids and the extension / MIME tables
//! - **Orchestration**: [`orchestrator`] tries converters until one succeeds
//! - **Context**: [`context`] is the per-attempt workspace and cancellation state
//! - **Configuration**: [`config`] loads and validates settings
//!
//! # Example
//!
//! ```rust,no_run
//! use docmark::{ConversionConfig, DocumentConverter};
//!
//! # async fn example() -> docmark::Result<()> {
//! let converter = DocumentConverter::with_builtins(ConversionConfig::default())?;
//! let result = converter.convert_file("report.html", None).await?;
//! println!("{}", result.markdown);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod formats;
pub mod orchestrator;
pub mod sniff;

pub use config::{ConversionConfig, NormalizeOptions, PluginsConfig, ToolConfig, ToolsConfig};
pub use context::ConversionContext;
pub use orchestrator::DocumentConverter;
pub use sniff::{Candidate, CandidateSource, FormatSniffer};
