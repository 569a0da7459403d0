//! Cache abstraction for stowage.
//!
//! Two independent backends implement the same contract:
//! - [`FileSystemBackend`]/[`FileCache`]: flat files under a root directory,
//!   validated by a caller-supplied edit time
//! - [`SharedMemoryBackend`]/[`SharedMemoryCache`]: a host-wide key/value
//!   store with optional TTL
//!
//! Values are serialized as JSON, so any `serde` type round-trips.

mod file;
mod shared;
mod store;
mod traits;

pub use file::{FileCache, FileSystemBackend};
pub use shared::{parse_shared_key, shared_key, ParsedKey, SharedMemoryBackend, SharedMemoryCache};
pub use store::{MemoryStore, SharedStore};
pub use traits::{Cache, CacheBackend, EntryInfo, Scope};
