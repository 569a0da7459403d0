//! Centralized configuration for stowage.
//!
//! Fixed layout constants live in unit structs; the runtime settings a
//! deployment can change are gathered in [`StowageConfig`].

use crate::error::{Result, StowageError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk layout of the file backend.
pub struct FileCacheConfig;

impl FileCacheConfig {
    /// Extension of entry files, without the dot.
    pub const EXTENSION: &'static str = "cache";
    /// Separates the edit time from the payload inside an entry file.
    pub const DELIMITER: char = '|';
    /// Directory created under the platform cache dir when no root is configured.
    pub const DEFAULT_DIR_NAME: &'static str = "stowage";
}

/// Shared-memory store settings.
pub struct SharedMemoryConfig;

impl SharedMemoryConfig {
    /// Separates category from name in a shared key.
    pub const SEPARATOR: char = '.';
    /// Introduces the instance suffix of a shared key.
    pub const INSTANCE_MARKER: char = '@';
}

/// Environment variable names.
pub struct EnvConfig;

impl EnvConfig {
    pub const CACHE_PATH: &'static str = "STOWAGE_CACHE_PATH";
    pub const INSTANCE_ID: &'static str = "STOWAGE_INSTANCE_ID";
    pub const SHARED_MEMORY: &'static str = "STOWAGE_SHARED_MEMORY";
    pub const DEFAULT_INSTANCE_ID: &'static str = "default";
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StowageConfig {
    /// Root directory of the file backend.
    pub cache_root: PathBuf,
    /// Opaque identifier appended to instance-scoped shared keys.
    pub instance_id: String,
    /// Whether the in-process shared-memory store is made available.
    pub shared_memory: bool,
}

impl Default for StowageConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            instance_id: EnvConfig::DEFAULT_INSTANCE_ID.to_string(),
            shared_memory: false,
        }
    }
}

impl StowageConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(EnvConfig::CACHE_PATH).filter(|p| !p.is_empty()) {
            config.cache_root = PathBuf::from(path);
        }
        if let Some(id) = lookup(EnvConfig::INSTANCE_ID) {
            config.instance_id = id;
        }
        if let Some(flag) = lookup(EnvConfig::SHARED_MEMORY) {
            config.shared_memory = parse_flag(&flag);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the instance id can be told apart inside a shared key.
    pub fn validate(&self) -> Result<()> {
        if self.instance_id.is_empty() {
            return Err(StowageError::Config {
                message: "instance id must not be empty".into(),
            });
        }
        if self.instance_id.contains(SharedMemoryConfig::INSTANCE_MARKER)
            || self.instance_id.contains('\n')
        {
            return Err(StowageError::Config {
                message: format!(
                    "instance id {:?} must not contain '{}' or a newline",
                    self.instance_id,
                    SharedMemoryConfig::INSTANCE_MARKER
                ),
            });
        }
        Ok(())
    }
}

fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(FileCacheConfig::DEFAULT_DIR_NAME)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
