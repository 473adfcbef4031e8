//! Adopting the part files of an external engine run as a corpus.
//!
//! Distributed jobs leave `part-r-00000`, `part-m-00000` or `part-00000`
//! files (optionally compressed) in an output directory, next to markers such
//! as `_SUCCESS` and checksum files. [`merge_and_rename`] moves the parts into
//! the corpus naming layout and writes the schema file next to them.

use crate::io::naming::CorpusName;
use crate::schema::Schema;
use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PART_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^part-(?P<tag>(?:[rm]-)?\d{5,})(?P<ext>\.(?:gz|gzip|bz2|bzip2|zst|zstd|xz))?$")
        .unwrap_or_else(|e| panic!("part file pattern: {e}"))
});

/// One engine output part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartFile {
    pub path: PathBuf,
    /// Corpus part tag: `r-00000`, `m-00000`, or `part-00000` for an untyped engine part.
    pub tag: String,
    /// Compression extension including the dot, or empty.
    pub ext: String,
}

/// Engine part files directly under `source_dir`, sorted by name.
pub fn find_part_files(source_dir: impl AsRef<Path>) -> Result<Vec<PartFile>> {
    let source_dir = source_dir.as_ref();
    let entries = fs::read_dir(source_dir)
        .with_context(|| format!("read directory {}", source_dir.display()))?;

    let mut parts = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read directory {}", source_dir.display()))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.starts_with('_') || name.starts_with('.') {
            debug!("ignoring {name}");
            continue;
        }
        let Some(caps) = PART_FILE.captures(name) else {
            continue;
        };
        if !entry.file_type()?.is_file() {
            continue;
        }
        let tag = &caps["tag"];
        let tag = if tag.starts_with(|c: char| c.is_ascii_digit()) {
            format!("part-{tag}")
        } else {
            tag.to_owned()
        };
        parts.push(PartFile {
            path: entry.path(),
            tag,
            ext: caps.name("ext").map_or("", |m| m.as_str()).to_owned(),
        });
    }
    parts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(parts)
}

/// Move the parts of `source_dir` into the layout of `dest` and write `schema`.
///
/// Fails without touching anything if there are no parts, if `dest` already
/// has a schema file, or if any destination part already exists. Rerunning
/// a successful merge therefore fails instead of duplicating data.
pub fn merge_and_rename(
    source_dir: impl AsRef<Path>,
    dest: &CorpusName,
    schema: &Schema,
) -> Result<Vec<PathBuf>> {
    let source_dir = source_dir.as_ref();
    let parts = find_part_files(source_dir)?;
    if parts.is_empty() {
        bail!("no part files found in {}", source_dir.display());
    }

    let schema_path = dest.schema_path();
    if schema_path.exists() {
        bail!("destination schema {} already exists", schema_path.display());
    }
    let moves: Vec<(PathBuf, PathBuf)> = parts
        .into_iter()
        .map(|p| {
            let target = dest.part_path(&p.tag, &p.ext);
            (p.path, target)
        })
        .collect();
    if let Some((_, target)) = moves.iter().find(|(_, target)| target.exists()) {
        bail!("destination file {} already exists", target.display());
    }

    fs::create_dir_all(dest.dir())
        .with_context(|| format!("mkdir -p {}", dest.dir().display()))?;
    for (from, to) in &moves {
        move_file(from, to)?;
    }

    schema.write(&schema_path)?;
    info!(
        "merged {} parts from {} into {}",
        moves.len(),
        source_dir.display(),
        schema_path.display()
    );
    Ok(moves.into_iter().map(|(_, to)| to).collect())
}

/// Rename, or copy and remove when source and target are on different filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    debug!("moving {} to {}", from.display(), to.display());
    if let Err(e) = fs::rename(from, to) {
        warn!("rename {} failed ({e}), copying instead", from.display());
        fs::copy(from, to)
            .with_context(|| format!("copy {} to {}", from.display(), to.display()))?;
        fs::remove_file(from).with_context(|| format!("remove {}", from.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_file_names() {
        let tag = |name: &str| PART_FILE.captures(name).map(|c| c["tag"].to_owned());
        assert_eq!(tag("part-r-00003").as_deref(), Some("r-00003"));
        assert_eq!(tag("part-m-00000.gz").as_deref(), Some("m-00000"));
        assert_eq!(tag("part-00012.bz2").as_deref(), Some("00012"));
        assert_eq!(tag("part-r-00000.crc"), None);
        assert_eq!(tag("part-r-7"), None);
        assert_eq!(tag("_SUCCESS"), None);
    }
}
