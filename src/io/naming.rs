//! File naming for the single-schema, multi-part corpus layout.
//!
//! For a corpus with prefix `tweets` and suffix `training` in `out/`:
//!
//! | file                         | path                                  |
//! |------------------------------|---------------------------------------|
//! | schema                       | `out/tweets-training-schema.txt`      |
//! | single data file             | `out/tweets-training.txt`             |
//! | locally written part         | `out/tweets-part-00003-training.txt`  |
//! | merged engine part           | `out/tweets-r-00003-training.txt.gz`  |

use crate::io::compression::KNOWN_EXTENSIONS;
use crate::io::glob::{expand_glob, literal};
use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

pub const SCHEMA_FILE_SUFFIX: &str = "-schema.txt";
pub const DATA_FILE_EXTENSION: &str = ".txt";

/// Part tags: `part-00000` (local or untyped engine output), `r-00000` / `m-00000`
/// (merged engine output). A bare number is never a tag, so `tweets-2011` stays
/// a corpus of its own next to `tweets`.
pub const PART_TAG: &str = r"(?:part|[rm])-\d{5,}";

/// Identifies one corpus on disk: a directory, a prefix and a corpus-type suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorpusName {
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

impl CorpusName {
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        let dir = dir.as_ref();
        Self {
            dir: if dir.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                dir.to_path_buf()
            },
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Same prefix, different directory.
    pub fn in_dir(&self, dir: impl AsRef<Path>) -> Self {
        Self::new(dir, self.prefix.clone(), self.suffix.clone())
    }

    pub fn schema_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}-{}{SCHEMA_FILE_SUFFIX}", self.prefix, self.suffix))
    }

    /// Path of the sole data file of a single-part corpus.
    pub fn data_path(&self, compression_ext: &str) -> PathBuf {
        self.dir.join(format!(
            "{}-{}{DATA_FILE_EXTENSION}{compression_ext}",
            self.prefix, self.suffix
        ))
    }

    /// Path of one data part, `tag` being e.g. `part-00000` or `r-00000`.
    pub fn part_path(&self, tag: &str, compression_ext: &str) -> PathBuf {
        self.dir.join(format!(
            "{}-{tag}-{}{DATA_FILE_EXTENSION}{compression_ext}",
            self.prefix, self.suffix
        ))
    }

    /// Tag of the `index`-th locally written part.
    pub fn local_part_tag(index: usize) -> String {
        format!("part-{index:05}")
    }

    fn data_file_regex(&self) -> Result<Regex> {
        let exts = KNOWN_EXTENSIONS
            .iter()
            .map(|e| regex::escape(e))
            .collect::<Vec<_>>()
            .join("|");
        let re = format!(
            r"^{}(?:-(?P<tag>{PART_TAG}))?-{}{}(?:{exts})?$",
            regex::escape(&self.prefix),
            regex::escape(&self.suffix),
            regex::escape(DATA_FILE_EXTENSION),
        );
        Regex::new(&re).with_context(|| format!("build data file pattern {re}"))
    }

    /// Data files belonging to this corpus, sorted by name.
    pub fn data_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}/{}-*{}{DATA_FILE_EXTENSION}*",
            literal(&self.dir),
            literal(&self.prefix),
            literal(&self.suffix)
        );
        let re = self.data_file_regex()?;
        Ok(expand_glob(&pattern)?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| re.is_match(n))
            })
            .collect())
    }

    /// Prefixes of every corpus with `suffix` in `dir`, sorted.
    pub fn discover(dir: impl AsRef<Path>, suffix: &str) -> Result<Vec<String>> {
        let dir = Self::new(dir, "", suffix).dir;
        let tail = format!("-{suffix}{SCHEMA_FILE_SUFFIX}");
        let pattern = format!("{}/*{}", literal(&dir), literal(&tail));
        Ok(expand_glob(&pattern)?
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.strip_suffix(&tail).map(str::to_owned))
            .filter(|prefix| !prefix.is_empty())
            .collect())
    }
}
