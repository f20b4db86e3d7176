//! Converter registry.
//!
//! Registration happens on a [`ConverterRegistryBuilder`]; [`ConverterRegistryBuilder::build`]
//! freezes it into a [`ConverterRegistry`] that only offers read operations. The frozen
//! registry is shared as `Arc<ConverterRegistry>` and read concurrently without locks.

use crate::plugins::converter::{ConverterDescriptor, ConverterInfo};
use crate::{DocmarkError, Result};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Validate a converter id.
///
/// # Errors
///
/// Returns `DocmarkError::Validation` if the id is empty or contains whitespace.
pub(crate) fn validate_converter_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(DocmarkError::validation("Converter id cannot be empty"));
    }

    if id.contains(char::is_whitespace) {
        return Err(DocmarkError::validation(format!(
            "Converter id '{}' cannot contain whitespace",
            id
        )));
    }

    Ok(())
}

/// Checks a descriptor on its own, without looking at what is already registered.
pub(crate) fn validate_descriptor(descriptor: &ConverterDescriptor) -> Result<()> {
    validate_converter_id(descriptor.id())?;

    if descriptor.matcher().is_empty() {
        return Err(DocmarkError::validation(format!(
            "Converter '{}' does not accept any format",
            descriptor.id()
        )));
    }

    Ok(())
}

/// Mutable registration phase of the registry.
#[derive(Debug, Default)]
pub struct ConverterRegistryBuilder {
    entries: Vec<Arc<ConverterDescriptor>>,
    index: HashMap<String, usize>,
}

impl ConverterRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter.
    ///
    /// Validates the descriptor, rejects ids that are already registered, and calls the
    /// converter's `initialize` hook before inserting it. Insertion order is kept and used
    /// as the tie-break between equal priorities.
    ///
    /// # Errors
    ///
    /// - `DocmarkError::DuplicateIdentifier` if the id is already registered
    /// - `DocmarkError::Validation` if the id or matcher is invalid
    /// - Any error returned by the converter's `initialize`
    pub fn register(&mut self, descriptor: ConverterDescriptor) -> Result<()> {
        self.register_all(vec![descriptor])
    }

    /// Register a group of converters atomically.
    ///
    /// Either every descriptor is inserted or none is: ids and matchers are validated,
    /// duplicates within the group and against the registry are rejected, and every
    /// converter is initialized before the first insertion. Converters that were already
    /// initialized when a later one fails are shut down again.
    pub fn register_all(&mut self, descriptors: Vec<ConverterDescriptor>) -> Result<()> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            validate_descriptor(descriptor)?;
            if self.index.contains_key(descriptor.id()) || !seen.insert(descriptor.id()) {
                return Err(DocmarkError::DuplicateIdentifier(descriptor.id().to_string()));
            }
        }

        for (position, descriptor) in descriptors.iter().enumerate() {
            if let Err(e) = descriptor.converter().initialize() {
                for initialized in &descriptors[..position] {
                    if let Err(shutdown_err) = initialized.converter().shutdown() {
                        tracing::warn!(
                            converter_id = initialized.id(),
                            error = %shutdown_err,
                            "Converter shutdown failed during rollback"
                        );
                    }
                }
                return Err(e);
            }
        }

        for descriptor in descriptors {
            tracing::debug!(
                converter_id = descriptor.id(),
                priority = descriptor.priority(),
                "Registered converter"
            );
            self.index.insert(descriptor.id().to_string(), self.entries.len());
            self.entries.push(Arc::new(descriptor));
        }

        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the registry.
    pub fn build(self) -> ConverterRegistry {
        ConverterRegistry {
            entries: self.entries,
            index: self.index,
        }
    }
}

/// Immutable set of registered converters.
///
/// # Example
///
/// ```rust,no_run
/// use docmark::plugins::registry::ConverterRegistryBuilder;
///
/// let registry = ConverterRegistryBuilder::new().build();
/// for descriptor in registry.lookup("pdf") {
///     println!("{} (priority {})", descriptor.id(), descriptor.priority());
/// }
/// ```
#[derive(Debug)]
pub struct ConverterRegistry {
    entries: Vec<Arc<ConverterDescriptor>>,
    index: HashMap<String, usize>,
}

impl ConverterRegistry {
    /// Every converter accepting `format`, highest priority first.
    ///
    /// Equal priorities keep registration order, so repeated calls return the same
    /// sequence.
    pub fn lookup(&self, format: &str) -> Vec<Arc<ConverterDescriptor>> {
        let mut matches: Vec<Arc<ConverterDescriptor>> = self
            .entries
            .iter()
            .filter(|descriptor| descriptor.matches(format))
            .cloned()
            .collect();
        matches.sort_by_key(|descriptor| Reverse(descriptor.priority()));
        matches
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConverterDescriptor>> {
        self.index.get(id).map(|&position| Arc::clone(&self.entries[position]))
    }

    /// Converter ids in registration order.
    pub fn list(&self) -> Vec<String> {
        self.entries.iter().map(|descriptor| descriptor.id().to_string()).collect()
    }

    pub fn infos(&self) -> Vec<ConverterInfo> {
        self.entries.iter().map(|descriptor| descriptor.info()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ConverterDescriptor>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for ConverterRegistry {
    fn drop(&mut self) {
        for descriptor in &self.entries {
            if let Err(e) = descriptor.converter().shutdown() {
                tracing::warn!(converter_id = descriptor.id(), error = %e, "Converter shutdown failed");
            }
        }
    }
}
