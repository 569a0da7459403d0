//! Filesystem cache backend.
//!
//! Entries live at `<root>/<category>/<name>.cache` and hold
//! `<edit time>|<json payload>`. The edit time is a caller-supplied stamp: a
//! reader that asks for a different stamp than the stored one gets a miss,
//! which lets callers invalidate an entry without hashing its source.

use super::traits::{Cache, CacheBackend, EntryInfo};
use crate::config::FileCacheConfig;
use crate::error::{Result, StowageError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// The filesystem backend: a root directory holding one folder per category.
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    root: PathBuf,
}

impl FileSystemBackend {
    /// Identifier of this backend in the registry.
    pub const ID: &'static str = "fs";

    /// Create a backend rooted at `root`.
    ///
    /// Nothing is created on disk until an entry is opened.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root cache directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding the entries of `category`.
    pub fn category_path(&self, category: &str) -> PathBuf {
        self.root.join(category)
    }

    /// File holding the entry `name` of `category`.
    pub fn file_path(&self, category: &str, name: &str) -> PathBuf {
        let file_name = format!(
            "{}.{}",
            name.replace(&['/', '\\'][..], "_"),
            FileCacheConfig::EXTENSION
        );
        self.category_path(category).join(file_name)
    }

    /// Open the entry `name` of `category`, creating the category folder.
    pub fn cache(&self, category: &str, name: &str, edit_time: Option<i64>) -> Result<FileCache> {
        FileCache::new(self, category, name, edit_time)
    }

    /// All entries currently on disk, ordered by category then name.
    ///
    /// Listed entries carry no edit time, so reading them accepts any stamp.
    pub fn entries(&self) -> Result<Vec<FileCache>> {
        let mut caches = Vec::new();
        if !self.root.is_dir() {
            return Ok(caches);
        }

        for entry in WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable cache path: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FileCacheConfig::EXTENSION) {
                continue;
            }
            let category = path
                .parent()
                .and_then(|parent| parent.file_name())
                .and_then(|name| name.to_str());
            let name = path.file_stem().and_then(|stem| stem.to_str());
            let (Some(category), Some(name)) = (category, name) else {
                debug!("Skipping non UTF-8 cache file {}", path.display());
                continue;
            };

            caches.push(FileCache {
                category: category.to_string(),
                name: name.to_string(),
                path: path.to_path_buf(),
                edit_time: None,
            });
        }

        Ok(caches)
    }

    /// Remove category folders left empty, ignoring the ones that are not.
    fn remove_empty_categories(&self) {
        let Ok(read_dir) = fs::read_dir(&self.root) else {
            return;
        };
        for entry in read_dir.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Err(e) = fs::remove_dir(&path) {
                debug!("Keeping cache folder {}: {}", path.display(), e);
            }
        }
    }
}

impl CacheBackend for FileSystemBackend {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn kind(&self) -> &'static str {
        "FileCache"
    }

    fn list(&self) -> Result<Vec<Box<dyn Cache>>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|cache| Box::new(cache) as Box<dyn Cache>)
            .collect())
    }

    fn clear_all(&self) -> Result<bool> {
        let caches = self.entries()?;
        let cleared = caches.iter().filter(|cache| cache.clear()).count();
        self.remove_empty_categories();

        info!(
            "Cleared {}/{} file cache entries under {}",
            cleared,
            caches.len(),
            self.root.display()
        );
        Ok(true)
    }
}

/// A cache entry stored as a file.
#[derive(Debug, Clone)]
pub struct FileCache {
    category: String,
    name: String,
    path: PathBuf,
    edit_time: Option<i64>,
}

impl FileCache {
    /// Open an entry, creating its category folder (and parents) if missing.
    ///
    /// `edit_time` is the stamp the stored entry must carry to be a hit;
    /// `None` accepts any stamp.
    pub fn new(
        backend: &FileSystemBackend,
        category: &str,
        name: &str,
        edit_time: Option<i64>,
    ) -> Result<Self> {
        let folder = backend.category_path(category);
        if !folder.is_dir() {
            fs::create_dir_all(&folder).map_err(|e| StowageError::UnwritableFolder {
                path: folder.clone(),
                source: e,
            })?;
        }

        Ok(Self {
            category: category.to_string(),
            name: name.to_string(),
            path: backend.file_path(category, name),
            edit_time,
        })
    }

    /// Path of the entry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp required on read, if any.
    pub fn edit_time(&self) -> Option<i64> {
        self.edit_time
    }

    /// Size and timestamps of the entry file.
    pub fn information(&self) -> Result<EntryInfo> {
        let metadata =
            fs::metadata(&self.path).map_err(|e| StowageError::io_with_path(e, &self.path))?;

        Ok(EntryInfo {
            key: self.path.display().to_string(),
            size: metadata.len(),
            hits: None,
            ttl: None,
            created_at: metadata.created().ok().map(DateTime::<Utc>::from),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            accessed_at: metadata.accessed().ok().map(DateTime::<Utc>::from),
        })
    }

    fn write_contents(&self, contents: &[u8]) -> Result<()> {
        let folder = self
            .path
            .parent()
            .ok_or_else(|| StowageError::Io {
                message: "Cache file has no parent folder".into(),
                path: Some(self.path.clone()),
                source: None,
            })?;

        let mut temp =
            NamedTempFile::new_in(folder).map_err(|e| StowageError::io_with_path(e, folder))?;
        temp.write_all(contents)
            .map_err(|e| StowageError::io_with_path(e, temp.path()))?;
        temp.flush()
            .map_err(|e| StowageError::io_with_path(e, temp.path()))?;
        temp.persist(&self.path)
            .map_err(|e| StowageError::io_with_path(e.error, &self.path))?;

        Ok(())
    }
}

/// Read the leading integer of a stored stamp; no digits reads as 0.
fn parse_edit_time(raw: &str) -> i64 {
    let raw = raw.trim_start();
    let sign_len = usize::from(raw.starts_with(['-', '+']));
    let digits_len = raw[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    raw[..sign_len + digits_len].parse().unwrap_or(0)
}

impl Cache for FileCache {
    fn get<T: DeserializeOwned>(&self) -> Option<T> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    debug!("Cannot read cache file {}: {}", self.path.display(), e);
                }
                return None;
            }
        };

        let Some((stamp, payload)) = contents.split_once(FileCacheConfig::DELIMITER) else {
            warn!("Malformed cache file {}", self.path.display());
            return None;
        };

        if let Some(required) = self.edit_time {
            let stored = parse_edit_time(stamp);
            if stored != required {
                debug!(
                    "Stale cache {}.{}: stored edit time {} != {}",
                    self.category, self.name, stored, required
                );
                return None;
            }
        }

        match serde_json::from_str(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to parse cache file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn set<T: Serialize + ?Sized>(&self, data: &T) -> Result<bool> {
        let payload = serde_json::to_string(data)?;
        let stamp = self.edit_time.map(|t| t.to_string()).unwrap_or_default();
        let contents = format!("{}{}{}", stamp, FileCacheConfig::DELIMITER, payload);

        self.write_contents(contents.as_bytes())?;
        debug!("Wrote cache file {}", self.path.display());
        Ok(true)
    }

    fn clear(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed cache file {}", self.path.display());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Failed to remove cache file {}: {}", self.path.display(), e);
                false
            }
        }
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0))
    }

    fn hits(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Report {
        total: i32,
        labels: Vec<String>,
    }

    fn create_test_backend() -> (TempDir, FileSystemBackend) {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().join("cache"));
        (temp_dir, backend)
    }

    #[test]
    fn test_construction_creates_category_folder() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("report", "q1", None).unwrap();

        assert!(backend.category_path("report").is_dir());
        assert_eq!(cache.path(), backend.root().join("report").join("q1.cache"));
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_construction_fails_on_unwritable_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not-a-dir");
        fs::write(&root, b"file").unwrap();

        let backend = FileSystemBackend::new(&root);
        let result = backend.cache("report", "q1", None);
        assert!(matches!(result, Err(StowageError::UnwritableFolder { .. })));
    }

    #[test]
    fn test_name_slashes_become_underscores() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("views", "admin/users/list", None).unwrap();
        assert!(cache.path().ends_with("views/admin_users_list.cache"));
    }

    #[test]
    fn test_set_and_get_struct() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("report", "q1", None).unwrap();
        let report = Report {
            total: 42,
            labels: vec!["a".into(), "b".into()],
        };

        assert!(cache.set(&report).unwrap());
        assert_eq!(cache.get::<Report>(), Some(report));
    }

    #[test]
    fn test_file_layout() {
        let (_temp, backend) = create_test_backend();
        backend
            .cache("report", "q1", Some(1700000000))
            .unwrap()
            .set(&json!({"total": 42}))
            .unwrap();
        backend
            .cache("report", "q2", None)
            .unwrap()
            .set("text")
            .unwrap();

        let stamped = fs::read_to_string(backend.file_path("report", "q1")).unwrap();
        assert_eq!(stamped, r#"1700000000|{"total":42}"#);
        let unstamped = fs::read_to_string(backend.file_path("report", "q2")).unwrap();
        assert_eq!(unstamped, r#"|"text""#);
    }

    #[test]
    fn test_edit_time_mismatch_is_miss() {
        let (_temp, backend) = create_test_backend();
        backend
            .cache("config", "routes", Some(100))
            .unwrap()
            .set(&json!(["home", "about"]))
            .unwrap();

        let stale = backend.cache("config", "routes", Some(200)).unwrap();
        assert_eq!(stale.get::<serde_json::Value>(), None);

        let fresh = backend.cache("config", "routes", Some(100)).unwrap();
        assert_eq!(fresh.get::<serde_json::Value>(), Some(json!(["home", "about"])));

        let any = backend.cache("config", "routes", None).unwrap();
        assert!(any.get::<serde_json::Value>().is_some());
    }

    #[test]
    fn test_empty_stored_stamp_reads_as_zero() {
        let (_temp, backend) = create_test_backend();
        backend.cache("config", "flags", None).unwrap().set(&true).unwrap();

        assert_eq!(backend.cache("config", "flags", Some(0)).unwrap().get::<bool>(), Some(true));
        assert_eq!(backend.cache("config", "flags", Some(5)).unwrap().get::<bool>(), None);
    }

    #[test]
    fn test_stored_stamp_leading_digits() {
        assert_eq!(parse_edit_time("1700000000"), 1700000000);
        assert_eq!(parse_edit_time("12abc"), 12);
        assert_eq!(parse_edit_time("  -5 "), -5);
        assert_eq!(parse_edit_time("+7"), 7);
        assert_eq!(parse_edit_time("abc"), 0);
        assert_eq!(parse_edit_time("-"), 0);
        assert_eq!(parse_edit_time(""), 0);

        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("config", "routes", Some(12)).unwrap();
        fs::write(cache.path(), b"12abc|[1]").unwrap();
        assert_eq!(cache.get::<Vec<i32>>(), Some(vec![1]));
    }

    #[test]
    fn test_get_never_set_is_miss() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("report", "missing", None).unwrap();
        assert_eq!(cache.get::<serde_json::Value>(), None);
    }

    #[test]
    fn test_corrupt_file_is_miss() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("report", "broken", None).unwrap();

        fs::write(cache.path(), b"12|{not json").unwrap();
        assert_eq!(cache.get::<serde_json::Value>(), None);

        fs::write(cache.path(), b"no delimiter at all").unwrap();
        assert_eq!(cache.get::<serde_json::Value>(), None);

        fs::write(cache.path(), [0xff, 0xfe, b'|', 0x00]).unwrap();
        assert_eq!(cache.get::<serde_json::Value>(), None);
    }

    #[test]
    fn test_wrong_type_is_miss() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("report", "q1", None).unwrap();
        cache.set(&json!({"total": "many"})).unwrap();
        assert_eq!(cache.get::<Report>(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("counters", "visits", None).unwrap();
        cache.set(&1).unwrap();
        cache.set(&2).unwrap();
        assert_eq!(cache.get::<i32>(), Some(2));
    }

    #[test]
    fn test_clear() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("report", "q1", None).unwrap();
        cache.set(&json!({"total": 42})).unwrap();

        assert!(cache.clear());
        assert!(!cache.path().exists());
        assert_eq!(cache.get::<serde_json::Value>(), None);
        // Already gone
        assert!(cache.clear());
    }

    #[test]
    fn test_size_and_hits() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("report", "q1", None).unwrap();
        assert_eq!(cache.size().unwrap(), 0);

        cache.set(&json!({"total": 42})).unwrap();
        assert_eq!(cache.size().unwrap(), r#"|{"total":42}"#.len() as u64);
        assert_eq!(cache.hits().unwrap(), None);

        let info = cache.information().unwrap();
        assert_eq!(info.size, cache.size().unwrap());
        assert!(info.modified_at.is_some());
        assert_eq!(info.hits, None);
    }

    #[test]
    fn test_information_on_missing_file_fails() {
        let (_temp, backend) = create_test_backend();
        let cache = backend.cache("report", "q1", None).unwrap();
        assert!(matches!(cache.information(), Err(StowageError::Io { .. })));
    }

    #[test]
    fn test_entries_partitioned_by_category() {
        let (_temp, backend) = create_test_backend();
        for (category, name) in [("report", "q1"), ("report", "q2"), ("views", "home")] {
            backend.cache(category, name, Some(7)).unwrap().set(&name).unwrap();
        }
        fs::write(backend.root().join("stray.cache"), b"|1").unwrap();
        fs::write(backend.category_path("views").join("notes.txt"), b"x").unwrap();

        let entries = backend.entries().unwrap();
        let ids: Vec<(String, String)> = entries
            .iter()
            .map(|c| (c.category().unwrap().to_string(), c.name().to_string()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("report".to_string(), "q1".to_string()),
                ("report".to_string(), "q2".to_string()),
                ("views".to_string(), "home".to_string()),
            ]
        );

        // Listed handles accept whatever stamp is stored
        assert!(entries.iter().all(|c| c.edit_time().is_none()));
        assert_eq!(entries[2].get::<String>(), Some("home".to_string()));
    }

    #[test]
    fn test_entries_on_missing_root() {
        let (_temp, backend) = create_test_backend();
        assert!(backend.entries().unwrap().is_empty());
        assert!(backend.list().unwrap().is_empty());
    }

    #[test]
    fn test_clear_all_removes_entries_and_folders() {
        let (_temp, backend) = create_test_backend();
        backend.cache("report", "q1", None).unwrap().set(&1).unwrap();
        backend.cache("views", "home", None).unwrap().set(&2).unwrap();
        backend.cache("empty", "never-set", None).unwrap();

        assert!(backend.clear_all().unwrap());
        assert!(backend.entries().unwrap().is_empty());
        assert!(!backend.category_path("report").exists());
        assert!(!backend.category_path("views").exists());
        assert!(!backend.category_path("empty").exists());
        assert!(backend.root().is_dir());
    }

    #[test]
    fn test_clear_all_keeps_folders_with_foreign_files() {
        let (_temp, backend) = create_test_backend();
        backend.cache("report", "q1", None).unwrap().set(&1).unwrap();
        fs::write(backend.category_path("report").join("README"), b"keep").unwrap();

        assert!(backend.clear_all().unwrap());
        assert!(backend.entries().unwrap().is_empty());
        assert!(backend.category_path("report").join("README").exists());
    }
}
