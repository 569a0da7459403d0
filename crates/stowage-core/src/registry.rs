//! Registry of the cache backends available in the current environment.

use crate::cache::{
    CacheBackend, FileSystemBackend, MemoryStore, SharedMemoryBackend, SharedStore,
};
use crate::config::StowageConfig;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Lookup table from backend identifier to backend.
///
/// The filesystem backend is always present; the shared-memory backend only
/// when a shared store is. The table is computed on first use and reused for
/// the lifetime of the registry.
pub struct CacheRegistry {
    file_system: Arc<FileSystemBackend>,
    shared_memory: Arc<SharedMemoryBackend>,
    backends: OnceLock<Vec<Arc<dyn CacheBackend>>>,
}

impl CacheRegistry {
    /// Create a registry from configuration.
    ///
    /// An in-process [`MemoryStore`] backs the shared-memory backend when
    /// `config.shared_memory` is set.
    pub fn new(config: &StowageConfig) -> Self {
        let store = config
            .shared_memory
            .then(|| Arc::new(MemoryStore::new()) as Arc<dyn SharedStore>);
        Self::with_store(config, store)
    }

    /// Create a registry over an explicit shared store (`None` = no store).
    pub fn with_store(config: &StowageConfig, store: Option<Arc<dyn SharedStore>>) -> Self {
        Self {
            file_system: Arc::new(FileSystemBackend::new(&config.cache_root)),
            shared_memory: Arc::new(SharedMemoryBackend::new(store, &config.instance_id)),
            backends: OnceLock::new(),
        }
    }

    /// The filesystem backend.
    pub fn file_system(&self) -> &FileSystemBackend {
        &self.file_system
    }

    /// The shared-memory backend, whether or not a store is present.
    pub fn shared_memory(&self) -> &SharedMemoryBackend {
        &self.shared_memory
    }

    /// Available backends, filesystem first.
    pub fn backends(&self) -> &[Arc<dyn CacheBackend>] {
        self.backends.get_or_init(|| {
            let mut backends: Vec<Arc<dyn CacheBackend>> =
                vec![Arc::clone(&self.file_system) as Arc<dyn CacheBackend>];
            if self.shared_memory.has_support() {
                backends.push(Arc::clone(&self.shared_memory) as Arc<dyn CacheBackend>);
            }
            debug!(
                "Available cache backends: {:?}",
                backends.iter().map(|b| b.id()).collect::<Vec<_>>()
            );
            backends
        })
    }

    /// Look a backend up by identifier, ignoring case.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn CacheBackend>> {
        self.backends()
            .iter()
            .find(|backend| backend.id().eq_ignore_ascii_case(id))
    }

    /// Identifiers of the available backends.
    pub fn ids(&self) -> Vec<&'static str> {
        self.backends().iter().map(|backend| backend.id()).collect()
    }
}
