//! `stowage list`: summary of every backend, or the entries of one.

use std::fmt::Write;
use stowage::{CacheRegistry, Result, StowageError};

/// Options of the list report.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Backend identifier to detail; `None` summarizes every backend.
    pub cache: Option<String>,
    /// Include entries without a category.
    pub show_unknown: bool,
}

/// Build the list report.
pub fn list(registry: &CacheRegistry, options: &ListOptions) -> Result<String> {
    match &options.cache {
        Some(id) => entries_output(registry, &id.to_lowercase(), options.show_unknown),
        None => backends_output(registry),
    }
}

fn backends_output(registry: &CacheRegistry) -> Result<String> {
    let mut output = String::from("\nAll caches supported by the current environment:");
    for backend in registry.backends() {
        let items = backend.list()?.len();
        let _ = write!(
            output,
            "\n * {} with {} items using type \"{}\"",
            backend.id(),
            items,
            backend.kind()
        );
    }
    output.push_str("\nTo detail one cache items, use the option \"--cache\".\n");
    Ok(output)
}

fn entries_output(registry: &CacheRegistry, id: &str, show_unknown: bool) -> Result<String> {
    let backend = registry.get(id).ok_or_else(|| {
        StowageError::InvalidArgument(format!(
            "Non-supported cache \"{}\" provided (available: {})",
            id,
            registry.ids().join(", ")
        ))
    })?;

    let mut output = format!("\nFor cache \"{}\", here is all stored items:", backend.id());
    for cache in backend.list()? {
        let is_unknown = cache.category().is_none();
        if is_unknown && !show_unknown {
            continue;
        }
        // Hit counts are left out: the filesystem has none
        let _ = write!(
            output,
            "\n * {}Cache \"{}\" with name \"{}\" has a size of {}.",
            if is_unknown { "[*] " } else { "" },
            cache.category().unwrap_or_default(),
            cache.name(),
            cache.size()?
        );
    }

    if show_unknown {
        output.push_str("\nUnknown cache items are prepended with [*].\n");
    } else {
        output.push_str(
            "\nTo show all cache items, even from other applications, use the option \"--show-unknown\".\n",
        );
    }
    Ok(output)
}
