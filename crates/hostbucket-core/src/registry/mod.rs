//! Plugin-based provider registry
//!
//! The registry allows hostname API providers to be registered dynamically
//! at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hostbucket_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! hostbucket_provider_akamai::register(&registry);
//!
//! let api = registry.create_provider(&config.provider)?;
//! ```

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{HostnameApi, HostnameApiFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Provider registry for plugin-based hostname API creation
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn HostnameApiFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hostname API factory under a provider type name
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn HostnameApiFactory>,
    ) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Create a hostname API from configuration
    ///
    /// Fails if the provider type is not registered or the factory rejects
    /// the configuration.
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn HostnameApi>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// List all registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl HostnameApiFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn HostnameApi>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_provider("mock"));

        registry.register_provider("mock", Box::new(MockProviderFactory));

        assert!(registry.has_provider("mock"));
        assert_eq!(registry.list_providers(), vec!["mock".to_string()]);
    }

    #[test]
    fn test_unknown_provider_is_a_config_error() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::Custom {
            factory: "nope".to_string(),
            config: serde_json::json!({}),
        };

        assert!(matches!(
            registry.create_provider(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_factory_errors_are_returned() {
        let registry = ProviderRegistry::new();
        registry.register_provider("mock", Box::new(MockProviderFactory));
        let config = ProviderConfig::Custom {
            factory: "mock".to_string(),
            config: serde_json::json!({}),
        };

        assert!(matches!(
            registry.create_provider(&config),
            Err(Error::NotFound(_))
        ));
    }
}
