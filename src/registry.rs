use std::sync::Arc;

use url::Url;

use crate::config::Config;
use crate::page::host_of;
use crate::sites::{self, SiteAdapter};

/// Ordered set of site adapters. Lookups return the first adapter whose
/// domains match, so position is precedence. Fixed after construction.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    /// Built-in adapters minus the ones listed in `config.disabled_adapters`.
    pub fn builtin(config: &Config) -> Self {
        let adapters = sites::builtin(config)
            .into_iter()
            .filter(|a| !config.disabled_adapters.contains(a.name()))
            .collect();
        Self { adapters }
    }

    pub fn from_adapters(adapters: Vec<Arc<dyn SiteAdapter>>) -> Self {
        Self { adapters }
    }

    /// Adapter for the page at `url`, if any. `None` means the feature is
    /// inactive on that page.
    pub fn resolve(&self, url: &Url) -> Option<Arc<dyn SiteAdapter>> {
        self.resolve_host(&host_of(url)?)
    }

    pub fn resolve_host(&self, host: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.iter().find(|a| a.matches(host)).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SiteAdapter>> {
        self.adapters.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
