//! Plugin loading.
//!
//! A plugin package exposes a single registration function, [`RegistrationFn`], that
//! returns the descriptors of the converters it provides. The host lists the packages it
//! ships as [`PluginManifest`]s and hands them to a [`PluginLoader`], which runs once at
//! startup and produces the frozen registry.
//!
//! Loading never fails as a whole. A plugin whose registration function is missing,
//! panics, or returns a malformed list is skipped and reported in
//! [`LoadReport::errors`]; built-in converters and the remaining plugins are unaffected.
//!
//! # Example
//!
//! ```rust,no_run
//! use docmark::plugins::{PluginLoader, PluginManifest, ConverterDescriptor};
//!
//! fn register() -> Vec<ConverterDescriptor> {
//!     Vec::new()
//! }
//!
//! let report = PluginLoader::new()
//!     .with_plugin(PluginManifest::new("my-plugin", "1.0.0", register))
//!     .load();
//! for error in &report.errors {
//!     eprintln!("{}", error);
//! }
//! ```

use crate::DocmarkError;
use crate::core::config::PluginsConfig;
use crate::plugins::converter::ConverterDescriptor;
use crate::plugins::registry::{ConverterRegistry, ConverterRegistryBuilder};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// The entry-point contract every plugin package satisfies.
pub type RegistrationFn = fn() -> Vec<ConverterDescriptor>;

/// A discovered plugin package.
#[derive(Debug, Clone)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    /// `None` when the package does not expose a registration function.
    pub entry_point: Option<RegistrationFn>,
}

impl PluginManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>, entry_point: RegistrationFn) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            entry_point: Some(entry_point),
        }
    }

    /// A package that was found but exposes no registration function.
    pub fn without_entry_point(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            entry_point: None,
        }
    }
}

/// Why a plugin was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PluginLoadFailure {
    MissingEntryPoint,
    Panicked { message: String },
    EmptyRegistration,
    /// A descriptor failed validation, collided with a registered id, or could not be
    /// initialized.
    InvalidDescriptor { message: String },
}

impl fmt::Display for PluginLoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginLoadFailure::MissingEntryPoint => write!(f, "no registration function exposed"),
            PluginLoadFailure::Panicked { message } => write!(f, "registration function panicked: {}", message),
            PluginLoadFailure::EmptyRegistration => write!(f, "registration function returned no converters"),
            PluginLoadFailure::InvalidDescriptor { message } => write!(f, "{}", message),
        }
    }
}

/// One skipped plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginLoadError {
    pub plugin_name: String,
    pub failure: PluginLoadFailure,
}

impl fmt::Display for PluginLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plugin '{}': {}", self.plugin_name, self.failure)
    }
}

impl std::error::Error for PluginLoadError {}

impl From<PluginLoadError> for DocmarkError {
    fn from(err: PluginLoadError) -> Self {
        DocmarkError::PluginLoad {
            plugin_name: err.plugin_name,
            message: err.failure.to_string(),
        }
    }
}

/// Outcome of a load: the frozen registry plus every plugin that was skipped.
#[derive(Debug)]
pub struct LoadReport {
    pub registry: Arc<ConverterRegistry>,
    pub errors: Vec<PluginLoadError>,
    /// Names of the plugins that registered successfully, in load order.
    pub loaded: Vec<String>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Builds the converter registry from built-in converters and plugin manifests.
#[derive(Debug, Default)]
pub struct PluginLoader {
    builtins: Vec<ConverterDescriptor>,
    manifests: Vec<PluginManifest>,
    disabled: Vec<String>,
}

impl PluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converters registered ahead of every plugin.
    pub fn with_builtins(mut self, descriptors: Vec<ConverterDescriptor>) -> Self {
        self.builtins.extend(descriptors);
        self
    }

    /// Add a plugin package. Plugins load in the order they are added.
    pub fn with_plugin(mut self, manifest: PluginManifest) -> Self {
        self.manifests.push(manifest);
        self
    }

    pub fn with_plugins(mut self, manifests: impl IntoIterator<Item = PluginManifest>) -> Self {
        self.manifests.extend(manifests);
        self
    }

    /// Apply the `[plugins]` configuration section.
    pub fn with_config(mut self, config: &PluginsConfig) -> Self {
        self.disabled.extend(config.disabled.iter().cloned());
        self
    }

    /// Register built-ins, then each plugin, and freeze the registry.
    pub fn load(self) -> LoadReport {
        let mut builder = ConverterRegistryBuilder::new();
        let mut errors = Vec::new();
        let mut loaded = Vec::new();

        for descriptor in self.builtins {
            let id = descriptor.id().to_string();
            if let Err(e) = builder.register(descriptor) {
                tracing::warn!(converter_id = %id, error = %e, "Built-in converter failed to register");
            }
        }

        for manifest in self.manifests {
            if self.disabled.iter().any(|name| name == &manifest.name) {
                tracing::debug!(plugin = %manifest.name, "Plugin disabled by configuration");
                continue;
            }

            match load_plugin(&mut builder, &manifest) {
                Ok(count) => {
                    tracing::debug!(
                        plugin = %manifest.name,
                        version = %manifest.version,
                        converters = count,
                        "Plugin loaded"
                    );
                    loaded.push(manifest.name);
                }
                Err(failure) => {
                    let error = PluginLoadError {
                        plugin_name: manifest.name,
                        failure,
                    };
                    tracing::warn!(plugin = %error.plugin_name, reason = %error.failure, "Plugin failed to load");
                    errors.push(error);
                }
            }
        }

        let registry = builder.build();
        tracing::info!(
            converters = registry.len(),
            plugins_loaded = loaded.len(),
            plugin_errors = errors.len(),
            "Converter registry ready"
        );

        LoadReport {
            registry: Arc::new(registry),
            errors,
            loaded,
        }
    }
}

fn load_plugin(
    builder: &mut ConverterRegistryBuilder,
    manifest: &PluginManifest,
) -> std::result::Result<usize, PluginLoadFailure> {
    let entry_point = manifest.entry_point.ok_or(PluginLoadFailure::MissingEntryPoint)?;

    let descriptors = panic::catch_unwind(entry_point).map_err(|payload| PluginLoadFailure::Panicked {
        message: panic_message(payload.as_ref()),
    })?;

    if descriptors.is_empty() {
        return Err(PluginLoadFailure::EmptyRegistration);
    }

    let count = descriptors.len();
    match panic::catch_unwind(AssertUnwindSafe(|| builder.register_all(descriptors))) {
        Ok(Ok(())) => Ok(count),
        Ok(Err(e)) => Err(PluginLoadFailure::InvalidDescriptor { message: e.to_string() }),
        Err(payload) => Err(PluginLoadFailure::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::core::context::ConversionContext;
    use crate::plugins::Plugin;
    use crate::plugins::converter::{Converter, FormatMatcher};
    use crate::types::{InputDocument, Intermediate};
    use async_trait::async_trait;

    struct NamedConverter(&'static str);

    impl Plugin for NamedConverter {
        fn name(&self) -> &str {
            self.0
        }

        fn version(&self) -> String {
            "1.0.0".to_string()
        }
    }

    #[async_trait]
    impl Converter for NamedConverter {
        async fn convert(&self, _document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
            Ok(Intermediate::new())
        }
    }

    fn descriptor(id: &'static str, format: &str) -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(NamedConverter(id)), FormatMatcher::formats([format]))
    }

    fn good_plugin() -> Vec<ConverterDescriptor> {
        vec![descriptor("good-a", "rtf"), descriptor("good-b", "epub")]
    }

    fn panicking_plugin() -> Vec<ConverterDescriptor> {
        panic!("registration exploded")
    }

    fn duplicate_plugin() -> Vec<ConverterDescriptor> {
        vec![descriptor("dup-ok", "rtf"), descriptor("builtin", "rtf")]
    }

    fn empty_plugin() -> Vec<ConverterDescriptor> {
        Vec::new()
    }

    #[test]
    fn test_load_builtins_and_plugins() {
        let report = PluginLoader::new()
            .with_builtins(vec![descriptor("builtin", "text")])
            .with_plugin(PluginManifest::new("good", "1.0.0", good_plugin))
            .load();

        assert!(report.is_clean());
        assert_eq!(report.loaded, vec!["good"]);
        assert_eq!(report.registry.list(), vec!["builtin", "good-a", "good-b"]);
    }

    #[test]
    fn test_failures_are_isolated() {
        let report = PluginLoader::new()
            .with_builtins(vec![descriptor("builtin", "text")])
            .with_plugin(PluginManifest::without_entry_point("missing", "0.1.0"))
            .with_plugin(PluginManifest::new("panics", "0.1.0", panicking_plugin))
            .with_plugin(PluginManifest::new("dup", "0.1.0", duplicate_plugin))
            .with_plugin(PluginManifest::new("empty", "0.1.0", empty_plugin))
            .with_plugin(PluginManifest::new("good", "1.0.0", good_plugin))
            .load();

        assert_eq!(report.loaded, vec!["good"]);
        assert_eq!(report.errors.len(), 4);
        assert_eq!(report.errors[0].failure, PluginLoadFailure::MissingEntryPoint);
        assert_eq!(
            report.errors[1].failure,
            PluginLoadFailure::Panicked {
                message: "registration exploded".to_string()
            }
        );
        assert!(matches!(report.errors[2].failure, PluginLoadFailure::InvalidDescriptor { .. }));
        assert_eq!(report.errors[3].failure, PluginLoadFailure::EmptyRegistration);

        assert!(report.registry.get("dup-ok").is_none());
        assert_eq!(report.registry.list(), vec!["builtin", "good-a", "good-b"]);
    }

    #[test]
    fn test_disabled_plugins_are_skipped() {
        let config = PluginsConfig {
            disabled: vec!["good".to_string()],
        };
        let report = PluginLoader::new()
            .with_config(&config)
            .with_plugin(PluginManifest::new("good", "1.0.0", good_plugin))
            .load();

        assert!(report.is_clean());
        assert!(report.loaded.is_empty());
        assert!(report.registry.is_empty());
    }

    #[test]
    fn test_load_error_converts_to_docmark_error() {
        let error = PluginLoadError {
            plugin_name: "broken".to_string(),
            failure: PluginLoadFailure::EmptyRegistration,
        };
        assert_eq!(error.to_string(), "plugin 'broken': registration function returned no converters");

        let err: DocmarkError = error.into();
        assert_eq!(err.kind(), "plugin_load_error");
        assert!(err.to_string().contains("broken"));
    }
}
