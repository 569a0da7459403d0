//! Cache traits and shared types.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Visibility of a shared-memory key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Visible to every deployment sharing the store.
    Global,
    /// Suffixed with the instance id so deployments do not collide.
    #[default]
    Instance,
}

/// Metadata reported for a single entry.
///
/// Fields a backend cannot report are left empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Storage key (shared key or file path).
    pub key: String,
    /// Stored size in bytes.
    pub size: u64,
    /// Number of successful reads.
    pub hits: Option<u64>,
    /// Time to live in seconds, 0 for none.
    pub ttl: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub accessed_at: Option<DateTime<Utc>>,
}

/// A handle on one cache entry.
///
/// Lookups never fail: a missing, stale, corrupt or unreachable entry is a
/// miss. Writes report an unavailable backend as `Ok(false)` and only return
/// an error when the storage layer itself is broken.
pub trait Cache: Send + Sync {
    /// Read and deserialize the entry.
    ///
    /// Returns `None` on a miss.
    fn get<T: DeserializeOwned>(&self) -> Option<T>
    where
        Self: Sized;

    /// Serialize and store the entry, replacing any previous value.
    fn set<T: Serialize + ?Sized>(&self, data: &T) -> Result<bool>
    where
        Self: Sized;

    /// Delete the entry.
    fn clear(&self) -> bool;

    /// Category of the entry, `None` for entries not created through stowage.
    fn category(&self) -> Option<&str>;

    /// Name of the entry within its category.
    fn name(&self) -> &str;

    /// Size in bytes, 0 if unknown.
    fn size(&self) -> Result<u64>;

    /// Hit count, `None` if the backend does not count hits.
    fn hits(&self) -> Result<Option<u64>>;
}

/// A kind of cache storage, as opposed to a single entry in it.
pub trait CacheBackend: Send + Sync {
    /// Short identifier used on the command line.
    fn id(&self) -> &'static str;

    /// Human-readable type name.
    fn kind(&self) -> &'static str;

    /// Discover the entries currently present in storage.
    fn list(&self) -> Result<Vec<Box<dyn Cache>>>;

    /// Remove every entry of this backend.
    fn clear_all(&self) -> Result<bool>;
}
