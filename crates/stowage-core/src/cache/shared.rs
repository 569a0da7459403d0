//! Shared-memory cache backend.
//!
//! Values live in a [`SharedStore`] under `<category>.<name>`, suffixed with
//! `@<instance id>` for instance-scoped entries so several deployments can
//! share one store. When no store is available every lookup is a miss and
//! every write reports `false`.

use super::store::SharedStore;
use super::traits::{Cache, CacheBackend, EntryInfo, Scope};
use crate::config::SharedMemoryConfig;
use crate::error::{Result, StowageError};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

// `<key>` optionally followed by `@<instance>`; the instance part holds no '@'
static SHARED_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)(?:@([^@\n]+))?$").unwrap());

/// Build the storage key of an entry.
pub fn shared_key(category: Option<&str>, name: &str, scope: Scope, instance_id: &str) -> String {
    let mut key = match category {
        Some(category) => format!("{}{}{}", category, SharedMemoryConfig::SEPARATOR, name),
        None => name.to_string(),
    };
    if scope == Scope::Instance {
        key.push(SharedMemoryConfig::INSTANCE_MARKER);
        key.push_str(instance_id);
    }
    key
}

/// A storage key split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    pub category: Option<&'a str>,
    pub name: &'a str,
    pub instance_id: Option<&'a str>,
}

/// Split a storage key on its instance suffix and first separator.
///
/// Keys without a separator, or with an empty side, come back without a
/// category and named after their non-empty part: that is how keys written
/// by other applications show up.
pub fn parse_shared_key(raw: &str) -> Option<ParsedKey<'_>> {
    let captures = SHARED_KEY_PATTERN.captures(raw)?;
    let key = captures.get(1)?.as_str();
    let instance_id = captures.get(2).map(|m| m.as_str());

    let (category, name) = match key.split_once(SharedMemoryConfig::SEPARATOR) {
        Some((category, name)) if !category.is_empty() && !name.is_empty() => {
            (Some(category), name)
        }
        // One empty side: the other one is the name
        Some((category, "")) if !category.is_empty() => (None, category),
        Some(("", name)) if !name.is_empty() => (None, name),
        _ => (None, key),
    };

    Some(ParsedKey {
        category,
        name,
        instance_id,
    })
}

/// The shared-memory backend: an optional store plus the current instance id.
#[derive(Clone)]
pub struct SharedMemoryBackend {
    store: Option<Arc<dyn SharedStore>>,
    instance_id: String,
}

impl fmt::Debug for SharedMemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemoryBackend")
            .field("has_support", &self.has_support())
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

impl SharedMemoryBackend {
    /// Identifier of this backend in the registry.
    pub const ID: &'static str = "apc";

    /// Create a backend over `store`; `None` means the host has no store.
    pub fn new(store: Option<Arc<dyn SharedStore>>, instance_id: impl Into<String>) -> Self {
        Self {
            store,
            instance_id: instance_id.into(),
        }
    }

    /// Whether a shared store is present.
    pub fn has_support(&self) -> bool {
        self.store.is_some()
    }

    /// Whether the store can enumerate keys and report their metadata.
    pub fn supports_introspection(&self) -> bool {
        self.store
            .as_ref()
            .is_some_and(|store| store.supports_introspection())
    }

    /// Identifier appended to instance-scoped keys and used to filter listings.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Handle on the entry `name` of `category`.
    ///
    /// `ttl` is in seconds; `None` or 0 keeps the entry until cleared.
    pub fn cache(
        &self,
        category: Option<&str>,
        name: &str,
        ttl: Option<u64>,
        scope: Scope,
    ) -> SharedMemoryCache {
        SharedMemoryCache {
            store: self.store.clone(),
            category: category.map(str::to_string),
            name: name.to_string(),
            key: shared_key(category, name, scope, &self.instance_id),
            ttl: ttl.unwrap_or(0),
            information: None,
        }
    }

    /// Entries visible to this instance: global keys, keys of this instance
    /// and keys written by other applications.
    ///
    /// Each handle carries the metadata fetched in bulk from the store.
    pub fn entries(&self) -> Result<Vec<SharedMemoryCache>> {
        let store = self.introspecting_store("listing entries")?;

        let mut caches = Vec::new();
        for info in store.cache_info()? {
            let Some(parsed) = parse_shared_key(&info.key) else {
                debug!("Skipping unparsable shared key {:?}", info.key);
                continue;
            };
            if parsed
                .instance_id
                .is_some_and(|instance| instance != self.instance_id)
            {
                continue;
            }

            caches.push(SharedMemoryCache {
                store: Some(Arc::clone(store)),
                category: parsed.category.map(str::to_string),
                name: parsed.name.to_string(),
                key: info.key.clone(),
                ttl: info.ttl.unwrap_or(0),
                information: Some(info),
            });
        }

        Ok(caches)
    }

    fn introspecting_store(&self, capability: &str) -> Result<&Arc<dyn SharedStore>> {
        match &self.store {
            Some(store) if store.supports_introspection() => Ok(store),
            Some(_) => Err(StowageError::unsupported(format!(
                "{capability} requires store introspection"
            ))),
            None => Err(StowageError::unsupported(format!(
                "{capability} requires a shared store"
            ))),
        }
    }
}

impl CacheBackend for SharedMemoryBackend {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn kind(&self) -> &'static str {
        "SharedMemoryCache"
    }

    fn list(&self) -> Result<Vec<Box<dyn Cache>>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|cache| Box::new(cache) as Box<dyn Cache>)
            .collect())
    }

    /// Wipes the whole store, including keys other applications wrote.
    fn clear_all(&self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let cleared = store.clear();
        info!("Cleared shared-memory store (instance {})", self.instance_id);
        Ok(cleared)
    }
}

/// A cache entry held in the shared store.
#[derive(Clone)]
pub struct SharedMemoryCache {
    store: Option<Arc<dyn SharedStore>>,
    category: Option<String>,
    name: String,
    key: String,
    ttl: u64,
    information: Option<EntryInfo>,
}

impl fmt::Debug for SharedMemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemoryCache")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SharedMemoryCache {
    /// Storage key of the entry.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Time to live in seconds, 0 for none.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Metadata of the entry, `None` if it is not stored.
    ///
    /// Handles obtained by listing return the metadata captured at listing
    /// time. Fails when the store cannot report metadata.
    pub fn information(&self) -> Result<Option<EntryInfo>> {
        if let Some(info) = &self.information {
            return Ok(Some(info.clone()));
        }
        match &self.store {
            Some(store) if store.supports_introspection() => store.key_info(&self.key),
            Some(_) => Err(StowageError::unsupported(
                "entry information requires store introspection",
            )),
            None => Err(StowageError::unsupported(
                "entry information requires a shared store",
            )),
        }
    }
}

impl Cache for SharedMemoryCache {
    fn get<T: DeserializeOwned>(&self) -> Option<T> {
        let bytes = self.store.as_ref()?.fetch(&self.key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to parse shared entry {}: {}", self.key, e);
                None
            }
        }
    }

    fn set<T: Serialize + ?Sized>(&self, data: &T) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let bytes = serde_json::to_vec(data)?;
        let stored = store.store(&self.key, bytes, self.ttl);
        debug!("Stored shared entry {} (ttl {}s)", self.key, self.ttl);
        Ok(stored)
    }

    fn clear(&self) -> bool {
        self.store
            .as_ref()
            .is_some_and(|store| store.delete(&self.key))
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> Result<u64> {
        Ok(self.information()?.map(|info| info.size).unwrap_or(0))
    }

    fn hits(&self) -> Result<Option<u64>> {
        Ok(self.information()?.and_then(|info| info.hits))
    }
}
