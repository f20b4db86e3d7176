//! Base plugin trait definition.
//!
//! Every converter implements [`Plugin`], which carries its identity and the lifecycle
//! hooks the registry calls when the converter is registered and when the registry is
//! dropped.

use crate::Result;

/// Base trait that all converters must implement.
///
/// # Thread Safety
///
/// Plugins are shared as `Arc<dyn Converter>` across concurrent conversions and must be
/// `Send + Sync`. Plugins needing mutable state should use interior mutability.
///
/// # Example
///
/// ```rust
/// use docmark::plugins::Plugin;
/// use docmark::Result;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct MyPlugin {
///     initialized: AtomicBool,
/// }
///
/// impl Plugin for MyPlugin {
///     fn name(&self) -> &str {
///         "my-plugin"
///     }
///
///     fn version(&self) -> String {
///         "1.0.0".to_string()
///     }
///
///     fn initialize(&self) -> Result<()> {
///         self.initialized.store(true, Ordering::Release);
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Unique identifier, lowercase with hyphens (e.g. `"pdf-text"`).
    ///
    /// The registry uses this as the converter id and as the namespace for the
    /// converter's metadata keys, so it must not contain whitespace.
    fn name(&self) -> &str;

    /// Semantic version of this plugin (`MAJOR.MINOR.PATCH`).
    fn version(&self) -> String;

    /// Called once when the converter is registered.
    ///
    /// # Errors
    ///
    /// A failing `initialize` rejects the registration. For plugin-supplied converters
    /// this becomes a plugin load error; the rest of the registry is unaffected.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the registry that owns the converter is dropped.
    ///
    /// Errors are logged and otherwise ignored.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Optional plugin description for debugging and logging.
    fn description(&self) -> &str {
        ""
    }

    /// Optional plugin author information.
    fn author(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestPlugin {
        initialized: AtomicBool,
    }

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            "test-plugin"
        }

        fn version(&self) -> String {
            "1.0.0".to_string()
        }

        fn initialize(&self) -> Result<()> {
            self.initialized.store(true, Ordering::Release);
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            self.initialized.store(false, Ordering::Release);
            Ok(())
        }

        fn description(&self) -> &str {
            "A test plugin"
        }
    }

    struct MinimalPlugin;

    impl Plugin for MinimalPlugin {
        fn name(&self) -> &str {
            "minimal"
        }

        fn version(&self) -> String {
            "0.1.0".to_string()
        }
    }

    #[test]
    fn test_plugin_metadata() {
        let plugin = TestPlugin {
            initialized: AtomicBool::new(false),
        };
        assert_eq!(plugin.name(), "test-plugin");
        assert_eq!(plugin.version(), "1.0.0");
        assert_eq!(plugin.description(), "A test plugin");
        assert_eq!(plugin.author(), "");
    }

    #[test]
    fn test_plugin_lifecycle() {
        let plugin = TestPlugin {
            initialized: AtomicBool::new(false),
        };

        plugin.initialize().unwrap();
        assert!(plugin.initialized.load(Ordering::Acquire));

        plugin.shutdown().unwrap();
        assert!(!plugin.initialized.load(Ordering::Acquire));
    }

    #[test]
    fn test_default_lifecycle_hooks_succeed() {
        let plugin = MinimalPlugin;
        assert!(plugin.initialize().is_ok());
        assert!(plugin.shutdown().is_ok());
    }
}
