//! Building providers by type name.
//!
//! Configuration lists backends as `{ type, settings }` pairs. Each backend
//! registers a [`ProviderFactory`] under its type name and the registry turns
//! those pairs into live providers.
//!
//! ```ignore
//! let registry = ProviderFactoryRegistry::with_defaults();
//! let gemini = registry.create("gemini", &serde_json::json!({ "model": "gemini-1.5-flash" }))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{Provider, ProviderError, StaticResponseProvider, STATIC_PROVIDER_NAME};

/// Creates one kind of provider from its settings.
pub trait ProviderFactory: Send + Sync {
    /// Type name used in configuration, e.g. "gemini".
    fn provider_type(&self) -> &'static str;

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn Provider>, ProviderError>;

    /// Check settings without building anything.
    ///
    /// Missing credentials are reported as [`ProviderError::NotConfigured`].
    fn validate_config(&self, _settings: &JsonValue) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Settings filled in when the configuration leaves them out.
    fn default_config(&self) -> JsonValue {
        JsonValue::Null
    }

    fn description(&self) -> &'static str;

    /// Whether providers of this type call out over the network.
    fn is_networked(&self) -> bool {
        true
    }
}

/// One row of [`ProviderFactoryRegistry::catalog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactoryInfo {
    pub provider_type: &'static str,
    pub description: &'static str,
    pub networked: bool,
}

/// Builds the offline question-bank provider. Takes no settings.
pub struct StaticProviderFactory;

impl ProviderFactory for StaticProviderFactory {
    fn provider_type(&self) -> &'static str {
        STATIC_PROVIDER_NAME
    }

    fn create(&self, _settings: &JsonValue) -> Result<Arc<dyn Provider>, ProviderError> {
        Ok(Arc::new(StaticResponseProvider::new()))
    }

    fn description(&self) -> &'static str {
        "Offline question bank (always available, last resort)"
    }

    fn is_networked(&self) -> bool {
        false
    }
}

/// Factories keyed by type name.
#[derive(Default)]
pub struct ProviderFactoryRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in backend compiled into this build.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StaticProviderFactory));
        #[cfg(feature = "gemini")]
        registry.register(Arc::new(super::GeminiProviderFactory));
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiProviderFactory));
        registry
    }

    /// Register a factory, returning the one it replaced.
    pub fn register(
        &mut self,
        factory: Arc<dyn ProviderFactory>,
    ) -> Option<Arc<dyn ProviderFactory>> {
        self.factories.insert(factory.provider_type(), factory)
    }

    pub fn create(
        &self,
        provider_type: &str,
        settings: &JsonValue,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        self.factory(provider_type)?.create(settings)
    }

    pub fn validate(&self, provider_type: &str, settings: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(settings)
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    pub fn provider_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn default_config(&self, provider_type: &str) -> Option<JsonValue> {
        self.factories.get(provider_type).map(|f| f.default_config())
    }

    /// What each registered type is, for help output.
    pub fn catalog(&self) -> Vec<FactoryInfo> {
        self.factories
            .values()
            .map(|f| FactoryInfo {
                provider_type: f.provider_type(),
                description: f.description(),
                networked: f.is_networked(),
            })
            .collect()
    }

    fn factory(&self, provider_type: &str) -> Result<&dyn ProviderFactory, ProviderError> {
        self.factories
            .get(provider_type)
            .map(|f| f.as_ref())
            .ok_or_else(|| ProviderError::UnknownType {
                requested: provider_type.to_string(),
                known: self.provider_types().join(", "),
            })
    }
}

impl std::fmt::Debug for ProviderFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// Reject a `base_url` setting that is not an http(s) URL.
#[cfg(any(feature = "gemini", feature = "openai"))]
pub(crate) fn check_base_url(settings: &JsonValue) -> Result<(), ProviderError> {
    match settings["base_url"].as_str() {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => Err(
            ProviderError::NotConfigured(format!("base_url must be an http(s) URL, got '{url}'")),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use socrates_core::RequestContext;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn is_available(&self) -> Result<bool, ProviderError> {
            Ok(true)
        }

        async fn generate_response(
            &self,
            prompt: &str,
            _context: &RequestContext,
        ) -> Result<String, ProviderError> {
            Ok(prompt.to_string())
        }

        fn cost(&self) -> u32 {
            1
        }
    }

    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn provider_type(&self) -> &'static str {
            "echo"
        }

        fn create(&self, settings: &JsonValue) -> Result<Arc<dyn Provider>, ProviderError> {
            self.validate_config(settings)?;
            let name = settings["name"].as_str().unwrap_or("echo").to_string();
            Ok(Arc::new(EchoProvider { name }))
        }

        fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError> {
            if settings["name"].is_number() {
                return Err(ProviderError::NotConfigured("name must be a string".into()));
            }
            Ok(())
        }

        fn description(&self) -> &'static str {
            "Echoes the prompt"
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = ProviderFactoryRegistry::new();
        assert!(registry.register(Arc::new(EchoFactory)).is_none());
        assert!(registry.register(Arc::new(EchoFactory)).is_some());
        assert!(registry.has_provider("echo"));
        assert!(!registry.has_provider("static"));

        let provider = registry
            .create("echo", &serde_json::json!({ "name": "echo-2" }))
            .unwrap();
        assert_eq!(provider.name(), "echo-2");

        assert!(registry.validate("echo", &serde_json::json!({ "name": 7 })).is_err());
    }

    #[test]
    fn test_unknown_type_lists_known_types() {
        let registry = ProviderFactoryRegistry::with_defaults();

        match registry.create("carrier-pigeon", &JsonValue::Null) {
            Err(ProviderError::UnknownType { requested, known }) => {
                assert_eq!(requested, "carrier-pigeon");
                assert!(known.contains("static"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown type was accepted"),
        }
    }

    #[test]
    fn test_defaults_always_include_static() {
        let registry = ProviderFactoryRegistry::with_defaults();

        let provider = registry.create(STATIC_PROVIDER_NAME, &JsonValue::Null).unwrap();
        assert_eq!(provider.cost(), 0);
        assert_eq!(registry.default_config(STATIC_PROVIDER_NAME), Some(JsonValue::Null));
    }

    #[test]
    fn test_catalog_marks_offline_factories() {
        let mut registry = ProviderFactoryRegistry::new();
        registry.register(Arc::new(StaticProviderFactory));
        registry.register(Arc::new(EchoFactory));

        let catalog = registry.catalog();
        assert_eq!(registry.provider_types(), vec!["echo", "static"]);
        assert!(catalog[0].networked);
        assert!(!catalog[1].networked);
        assert_eq!(catalog[1].description, StaticProviderFactory.description());
    }
}
