//! Plugin system for extending docmark with converters.
//!
//! # Plugin Types
//!
//! - [`Plugin`] - Base trait carrying identity and lifecycle hooks
//! - [`Converter`] - Turns one document into an [`Intermediate`](crate::Intermediate)
//!
//! # Registration
//!
//! Converters are described by a [`ConverterDescriptor`] (id, accepted formats, priority,
//! capabilities). Built-in converters and plugin packages are registered once by the
//! [`PluginLoader`], which freezes them into an immutable [`ConverterRegistry`]:
//!
//! ```rust,no_run
//! use docmark::plugins::{PluginLoader, PluginManifest, ConverterDescriptor};
//! use docmark::{ConversionConfig, DocumentConverter};
//!
//! fn my_plugin() -> Vec<ConverterDescriptor> {
//!     Vec::new()
//! }
//!
//! # fn main() -> docmark::Result<()> {
//! let config = ConversionConfig::default();
//! let report = PluginLoader::new()
//!     .with_builtins(docmark::converters::builtin_descriptors(&config))
//!     .with_plugin(PluginManifest::new("my-plugin", "1.0.0", my_plugin))
//!     .load();
//! let converter = DocumentConverter::new(report.registry, config)?;
//! # Ok(())
//! # }
//! ```

pub mod converter;
pub mod loader;
pub mod registry;
pub mod traits;

pub use converter::{Capability, Converter, ConverterDescriptor, ConverterInfo, DEFAULT_PRIORITY, FormatMatcher};
pub use loader::{LoadReport, PluginLoadError, PluginLoadFailure, PluginLoader, PluginManifest, RegistrationFn};
pub use registry::{ConverterRegistry, ConverterRegistryBuilder};
pub use traits::Plugin;
