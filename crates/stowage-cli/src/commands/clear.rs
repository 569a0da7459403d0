//! `stowage clear`: wipe every available backend.

use std::fmt::Write;
use stowage::{CacheRegistry, Result};
use tracing::warn;

/// Options of the clear report.
#[derive(Debug, Clone, Default)]
pub struct ClearOptions {
    /// Emit one line per cleared backend.
    pub verbose: bool,
    /// Count what would be cleared instead of clearing it.
    pub dry_run: bool,
}

/// Clear every backend of the registry and build the report.
pub fn clear(registry: &CacheRegistry, options: &ClearOptions) -> Result<String> {
    let mut output = String::new();
    let mut count = 0;

    for backend in registry.backends() {
        let label = backend.id().to_uppercase();
        if options.dry_run {
            let items = match backend.list() {
                Ok(entries) => entries.len().to_string(),
                Err(e) => {
                    warn!("Cannot count entries of {}: {}", label, e);
                    "an unknown number of".to_string()
                }
            };
            let _ = writeln!(output, "Would clear {items} items of \"{label}\".");
        } else if backend.clear_all()? && options.verbose {
            let _ = writeln!(output, "Cleared all cache of \"{label}\".");
        }
        count += 1;
    }

    if options.dry_run {
        let _ = writeln!(output, "All caches ({count}) would be erased.");
    } else {
        let _ = writeln!(output, "All caches ({count}) were erased.");
    }
    Ok(output)
}
