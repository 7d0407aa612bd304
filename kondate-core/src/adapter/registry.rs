//! Name-to-adapter lookup.

use std::collections::BTreeMap;

use crate::error::{ConfigError, StoreError};

use super::{SiteAdapter, SiteSettings};

/// Builds a configured adapter.
pub type AdapterFactory = fn(SiteSettings) -> Box<dyn SiteAdapter>;

/// Registry that maps site names to their adapter factories.
pub struct AdapterRegistry {
    factories: BTreeMap<&'static str, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register an adapter factory. A later registration replaces an earlier one.
    pub fn register(&mut self, site_name: &'static str, factory: AdapterFactory) {
        self.factories.insert(site_name, factory);
    }

    pub fn contains(&self, site_name: &str) -> bool {
        self.factories.contains_key(site_name)
    }

    /// Known site names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Create the site's cache directory and build its adapter.
    pub fn configure(&self, settings: SiteSettings) -> Result<Box<dyn SiteAdapter>, ConfigError> {
        let factory = self
            .factories
            .get(settings.site_name.as_str())
            .ok_or_else(|| ConfigError::UnknownSite(settings.site_name.clone()))?;

        std::fs::create_dir_all(&settings.cache_dir)
            .map_err(|e| StoreError::io(&settings.cache_dir, e))?;

        tracing::debug!(
            site = %settings.site_name,
            cache_dir = %settings.cache_dir.display(),
            "configured adapter"
        );
        Ok(factory(settings))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
