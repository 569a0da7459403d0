//! Stowage - pluggable caching with filesystem and shared-memory backends.
//!
//! A cache entry is addressed by a category and a name. Entries are opened
//! through a backend, then read, written and cleared through the [`Cache`]
//! trait; a miss is always `None`, never an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use stowage::{Cache, CacheRegistry, StowageConfig};
//!
//! fn main() -> stowage::Result<()> {
//!     let config = StowageConfig::from_env()?;
//!     let registry = CacheRegistry::new(&config);
//!
//!     let cache = registry.file_system().cache("report", "q1", None)?;
//!     cache.set(&serde_json::json!({"total": 42}))?;
//!     let cached: Option<serde_json::Value> = cache.get();
//!     println!("{cached:?}");
//!
//!     for backend in registry.backends() {
//!         println!("{} has {} entries", backend.id(), backend.list()?.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;

// Re-export commonly used types
pub use cache::{
    Cache, CacheBackend, EntryInfo, FileCache, FileSystemBackend, MemoryStore, Scope,
    SharedMemoryBackend, SharedMemoryCache, SharedStore,
};
pub use config::StowageConfig;
pub use error::{Result, StowageError};
pub use registry::CacheRegistry;
