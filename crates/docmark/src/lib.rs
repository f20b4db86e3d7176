//! docmark - document to Markdown conversion pipeline
//!
//! docmark turns heterogeneous input files (office documents, web pages, data files,
//! PDFs, images, audio and video) into clean Markdown for downstream text and LLM
//! processing.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use docmark::{ConversionConfig, DocumentConverter};
//!
//! # async fn example() -> docmark::Result<()> {
//! let converter = DocumentConverter::with_builtins(ConversionConfig::default())?;
//! let result = converter.convert_file("report.docx", None).await?;
//! println!("{}", result.markdown);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Sniffer** (`core::sniff`): ranked format candidates from signature, filename and declared type
//! - **Registry and loader** (`plugins`): immutable converter registry built once at startup
//! - **Orchestrator** (`core::orchestrator`): tries converters in order with timeouts and fallback
//! - **External tools** (`tools`): bounded, cancellable subprocess adapters
//! - **Normalizer** (`normalize`): idempotent canonical Markdown rendering
//! - **Converters** (`converters`): the built-in converters

#![deny(unsafe_code)]

pub mod converters;
pub mod core;
pub mod error;
pub mod normalize;
pub mod plugins;
pub mod tools;
pub mod types;

pub use error::{DocmarkError, ErrorReport, Result, ToolFailure};
pub use types::*;

pub use core::config::{ConversionConfig, NormalizeOptions, PluginsConfig, ToolConfig, ToolsConfig};
pub use core::context::ConversionContext;
pub use core::orchestrator::DocumentConverter;
pub use core::sniff::{Candidate, CandidateSource, FormatSniffer};

pub use plugins::{ConverterDescriptor, ConverterInfo, ConverterRegistry, PluginLoader, PluginManifest};

use serde::{Deserialize, Serialize};

/// Identity of a running docmark instance, for health and discovery endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    /// Registered converter ids in registration order.
    pub converters: Vec<String>,
}

pub fn service_info(registry: &ConverterRegistry) -> ServiceInfo {
    ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        converters: registry.list(),
    }
}
