//! Registry of search providers, keyed by provider id.

use std::collections::HashMap;
use std::sync::Arc;

use super::Provider;
use crate::Error;

/// All providers available to the fetcher
///
/// Bundled providers are registered by [`ProviderRegistry::new`] according to
/// the enabled cargo features; others can be added with
/// [`register`](Self::register).
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create a registry with every bundled provider
    pub fn new() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "source-pubmed")]
        registry.register(Arc::new(super::PubMedProvider::new()));
        #[cfg(feature = "source-acs")]
        registry.register(Arc::new(super::AcsProvider::new()));

        registry
    }

    /// Create a registry without any provider
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider, replacing any provider with the same id
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(id)
    }

    /// Get a provider by id, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Provider>, Error> {
        self.get(id)
            .ok_or_else(|| Error::UnknownProvider(id.to_string()))
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    /// Provider ids in alphabetical order
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn has(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
