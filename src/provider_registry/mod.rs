pub mod capabilities;
pub mod catalog;
pub mod registry;

pub use capabilities::{ModelMask, Thinking};
pub use catalog::{CapabilityTriple, ModelInfo, RefreshAdapter, provider_family};
pub use registry::ModelRegistry;

use std::collections::HashMap;
use std::sync::RwLock;

use crate::auth::Provider;
use crate::config::Config;

/// Process-wide model -> `ModelInfo` map and provider -> `CapabilityTriple`
/// map. The capability-triple side is fixed at compile time (every provider
/// this proxy understands has one baked-in translation/refresh strategy);
/// the model side is read-mostly and grows at config reload time as users
/// declare custom OpenAI-compatible or Claude model aliases.
pub struct ProviderRegistry {
    models: RwLock<HashMap<String, ModelInfo>>,
    index: RwLock<ModelRegistry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        let mut models = HashMap::new();
        let mut names = Vec::new();
        for info in catalog::static_catalogues() {
            names.push(info.name.to_string());
            models.insert(info.name.to_string(), info);
        }
        Self {
            models: RwLock::new(models),
            index: RwLock::new(ModelRegistry::new(&names)),
        }
    }

    pub fn model_info(&self, name: &str) -> Option<ModelInfo> {
        self.models.read().unwrap().get(name).cloned()
    }

    pub fn capability_triple(&self, provider: &Provider) -> CapabilityTriple {
        catalog::capability_triple(provider)
    }

    pub fn model_index(&self, name: &str) -> Option<usize> {
        self.index.read().unwrap().get_index(name)
    }

    /// Extends the model catalogue from the config's user-defined OpenAI-
    /// compatible and Claude key entries. Serialised with an exclusive lock,
    /// as §4.7 requires; read paths never block behind it except during the
    /// brief window a reload is in progress.
    pub fn extend_from_config(&self, config: &Config) {
        let mut aliases = Vec::new();
        for entry in &config.keys.openai_compatibility {
            let base_url = entry.base_url.clone().unwrap_or_default();
            for model in &entry.models {
                aliases.push((model.clone(), Provider::Other(base_url.clone())));
            }
        }
        for entry in &config.keys.claude_api_key {
            for model in &entry.models {
                aliases.push((model.clone(), Provider::Claude));
            }
        }

        if aliases.is_empty() {
            return;
        }

        let mut models = self.models.write().unwrap();
        let mut index = self.index.write().unwrap();
        for (name, provider) in aliases {
            if models.contains_key(&name) {
                continue;
            }
            if index.insert(&name).is_none() {
                tracing::warn!(model = %name, "provider registry: model catalogue full, dropping alias");
                continue;
            }
            models.insert(
                name.clone(),
                ModelInfo {
                    name: Box::leak(name.into_boxed_str()),
                    provider,
                    thinking: Thinking::none(),
                },
            );
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_knows_static_models() {
        let registry = ProviderRegistry::new();
        assert!(registry.model_info("gemini-2.5-pro").is_some());
        assert!(registry.model_index("claude-opus-4-1").is_some());
    }

    #[test]
    fn unknown_model_returns_none() {
        let registry = ProviderRegistry::new();
        assert!(registry.model_info("not-a-real-model").is_none());
    }
}
