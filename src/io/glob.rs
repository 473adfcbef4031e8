//! File globbing for locating corpus schema and data files.
//!
//! Corpus prefixes and suffixes are literal text, so callers build patterns
//! with [`literal`] around the parts that must not be interpreted.
//!
//! ```no_run
//! use textdb::io::glob::{expand_glob, literal};
//!
//! let pattern = format!("{}/*-{}-schema.txt", literal("out/corpora"), literal("training"));
//! let schemas = expand_glob(&pattern)?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result};
use glob::{Pattern, glob};
use std::path::{Path, PathBuf};

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Directories are skipped. No match is an empty vector, not an error.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }

    // Sort for deterministic order
    result.sort();

    Ok(result)
}

/// Escape glob metacharacters so `text` only matches itself.
pub fn literal(text: impl AsRef<Path>) -> String {
    Pattern::escape(&text.as_ref().to_string_lossy())
}
