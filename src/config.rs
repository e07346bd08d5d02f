//! Registry configuration boundary.
//!
//! Host processes describe their server catalog as data (JSON/TOML via
//! serde) and build a [`ServerRegistry`] from it. Entries are applied in
//! order on top of the builtin catalog unless `use_builtin` is false, so
//! a host can override a single builtin server (same id) without
//! restating the rest.

use serde::Deserialize;

use crate::registry::{ServerDescriptor, ServerRegistry};

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Start from the builtin catalog before applying `servers`.
    #[serde(default = "default_use_builtin")]
    pub use_builtin: bool,
    /// Ordered server entries; later entries with a known id replace the
    /// existing registration.
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,
}

fn default_use_builtin() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            use_builtin: true,
            servers: Vec::new(),
        }
    }
}

impl RegistryConfig {
    pub fn build(self) -> ServerRegistry {
        let mut registry = if self.use_builtin {
            ServerRegistry::with_builtin_servers()
        } else {
            ServerRegistry::new()
        };
        for descriptor in self.servers {
            registry.register(descriptor);
        }
        registry
    }
}
