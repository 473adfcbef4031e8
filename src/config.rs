//! Run configuration, built once per invocation and passed by reference.

use crate::io::compression::Compression;
use serde::{Deserialize, Serialize};

/// Settings for the row stream processor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Seconds between progress messages; `0` disables them.
    pub progress_secs: u64,
    /// Stop after this many input lines.
    pub max_lines: Option<u64>,
    /// Lines handed to the thread pool at once by parallel processing.
    pub chunk_size: usize,
    /// Worker threads for parallel processing; `None` uses every core.
    pub threads: Option<usize>,
    /// Row errors logged individually before the rest are only counted.
    pub max_logged_errors: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            progress_secs: 15,
            max_lines: None,
            chunk_size: 10_000,
            threads: None,
            max_logged_errors: 100,
        }
    }
}

impl ProcessConfig {
    pub fn with_progress_secs(mut self, secs: u64) -> Self {
        self.progress_secs = secs;
        self
    }

    pub fn with_max_lines(mut self, max_lines: u64) -> Self {
        self.max_lines = Some(max_lines);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    pub fn with_max_logged_errors(mut self, n: u64) -> Self {
        self.max_logged_errors = n;
        self
    }
}

/// Settings for writing a corpus.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterOptions {
    /// Compress data files; the schema file is always plain text.
    pub compression: Option<Compression>,
    /// Rotate to a new `part-NNNNN` file after this many rows.
    pub max_rows_per_part: Option<u64>,
    /// Replace an existing corpus of the same name instead of failing.
    pub overwrite: bool,
}

impl WriterOptions {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_max_rows_per_part(mut self, rows: u64) -> Self {
        self.max_rows_per_part = Some(rows.max(1));
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub(crate) fn compression_ext(&self) -> &'static str {
        self.compression.map_or("", Compression::extension)
    }
}
