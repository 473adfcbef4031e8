//! Reading a corpus back: schema plus every data part, in name order.

use crate::config::ProcessConfig;
use crate::error::TextdbError;
use crate::io::lines::{FileLines, read_lines};
use crate::io::naming::CorpusName;
use crate::row::Row;
use crate::schema::Schema;
use crate::stream::{KeepRow, RowProcessor, RowStream, StreamStats, keep_row};
use anyhow::{Result, bail};
use std::io;
use std::path::{Path, PathBuf};

/// A complete corpus on disk.
#[derive(Clone, Debug)]
pub struct Corpus {
    name: CorpusName,
    schema: Schema,
    data_files: Vec<PathBuf>,
}

impl Corpus {
    /// Locate and parse the schema file of `<dir>/<prefix>-<suffix>` and list its data files.
    pub fn open(dir: impl AsRef<Path>, prefix: &str, suffix: &str) -> Result<Self> {
        Self::from_name(CorpusName::new(dir, prefix, suffix))
    }

    pub fn from_name(name: CorpusName) -> Result<Self> {
        let schema = Schema::read(name.schema_path())?;
        let data_files = name.data_files()?;
        if data_files.is_empty() {
            bail!(
                "corpus {} has a schema but no data files",
                name.schema_path().display()
            );
        }
        Ok(Self {
            name,
            schema,
            data_files,
        })
    }

    /// Prefixes of the corpora with `suffix` in `dir`.
    pub fn discover(dir: impl AsRef<Path>, suffix: &str) -> Result<Vec<String>> {
        CorpusName::discover(dir, suffix)
    }

    pub fn name(&self) -> &CorpusName {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn data_files(&self) -> &[PathBuf] {
        &self.data_files
    }

    /// Every row of every data part, with malformed lines logged and skipped.
    pub fn rows(&self) -> CorpusRows<'_> {
        self.rows_with(ProcessConfig::default())
    }

    pub fn rows_with(&self, config: ProcessConfig) -> CorpusRows<'_> {
        CorpusRows {
            corpus: self,
            processor: RowProcessor::new(&self.schema).with_config(config),
            next_file: 0,
            current: None,
            totals: StreamStats::default(),
        }
    }

    /// Read the whole corpus into memory.
    pub fn read_all(&self) -> Result<(Vec<Row>, StreamStats)> {
        let mut rows = self.rows();
        let collected = rows.by_ref().collect::<Result<Vec<_>, _>>()?;
        Ok((collected, rows.stats()))
    }
}

type FileStream<'a> = RowStream<'a, FileLines, KeepRow>;

/// Row iterator across every data part of a [`Corpus`].
pub struct CorpusRows<'a> {
    corpus: &'a Corpus,
    processor: RowProcessor<'a>,
    next_file: usize,
    current: Option<FileStream<'a>>,
    totals: StreamStats,
}

impl CorpusRows<'_> {
    /// Counters over the files read so far, including the current one.
    pub fn stats(&self) -> StreamStats {
        let mut stats = self.totals;
        if let Some(stream) = &self.current {
            stats.merge(stream.stats());
        }
        stats
    }
}

impl Iterator for CorpusRows<'_> {
    type Item = Result<Row, TextdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(stream) = &mut self.current {
                match stream.next() {
                    Some(Ok(row)) => return Some(Ok(row)),
                    Some(Err(e)) => {
                        self.totals.merge(stream.stats());
                        self.current = None;
                        self.next_file = self.corpus.data_files.len();
                        return Some(Err(e));
                    }
                    None => {
                        self.totals.merge(stream.stats());
                        self.current = None;
                    }
                }
            }

            let path = self.corpus.data_files.get(self.next_file)?;
            self.next_file += 1;
            let lines = match read_lines(path) {
                Ok(lines) => lines,
                Err(e) => {
                    self.next_file = self.corpus.data_files.len();
                    return Some(Err(TextdbError::Io(io::Error::other(format!("{e:#}")))));
                }
            };
            let keep: KeepRow = keep_row;
            self.current = Some(self.processor.stream(path.display().to_string(), lines, keep));
        }
    }
}
