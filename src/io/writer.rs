//! Writing a corpus: data parts first, the schema file last.
//!
//! A reader treats the schema file as the marker of a complete corpus, so
//! [`CorpusWriter::finish`] only writes it after every data part has been
//! flushed and closed. A writer that errors or is aborted leaves no schema
//! behind.

use crate::config::WriterOptions;
use crate::error::TextdbError;
use crate::io::compression::FinishWrite;
use crate::io::lines::create_writer;
use crate::io::naming::CorpusName;
use crate::row::Row;
use crate::schema::Schema;
use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::Serialize;
use std::fs::remove_file;
use std::path::PathBuf;

/// What [`CorpusWriter::finish`] produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CorpusSummary {
    pub schema_path: PathBuf,
    pub data_paths: Vec<PathBuf>,
    pub rows: u64,
}

struct Part {
    path: PathBuf,
    out: Box<dyn FinishWrite>,
    rows: u64,
}

impl Part {
    fn create(path: PathBuf) -> Result<Self> {
        info!("creating {}", path.display());
        let out = create_writer(&path)?;
        Ok(Self { path, out, rows: 0 })
    }

    /// Flush and finish the data file; a failed compression trailer is an error.
    fn close(self) -> Result<PathBuf> {
        self.out
            .finish()
            .with_context(|| format!("finish {}", self.path.display()))?;
        debug!("closed {} ({} rows)", self.path.display(), self.rows);
        Ok(self.path)
    }
}

/// Streams rows into one corpus, rotating parts if configured.
pub struct CorpusWriter {
    name: CorpusName,
    schema: Schema,
    options: WriterOptions,
    current: Option<Part>,
    closed: Vec<PathBuf>,
    rows: u64,
}

impl CorpusWriter {
    /// Prepare a writer; nothing is created on disk until the first row.
    ///
    /// Fails if the corpus already exists, unless `options.overwrite` is set,
    /// in which case its schema and data files are removed first.
    pub fn create(name: CorpusName, schema: Schema, options: WriterOptions) -> Result<Self> {
        let schema_path = name.schema_path();
        let existing = name.data_files()?;
        if schema_path.exists() || !existing.is_empty() {
            if !options.overwrite {
                bail!(
                    "corpus {}/{}-{} already exists",
                    name.dir().display(),
                    name.prefix(),
                    name.suffix()
                );
            }
            for path in existing.iter().chain(Some(&schema_path).filter(|p| p.exists())) {
                info!("removing {}", path.display());
                remove_file(path).with_context(|| format!("remove {}", path.display()))?;
            }
        }
        Ok(Self {
            name,
            schema,
            options,
            current: None,
            closed: Vec::new(),
            rows: 0,
        })
    }

    pub fn name(&self) -> &CorpusName {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    fn next_part_path(&self) -> PathBuf {
        let ext = self.options.compression_ext();
        match self.options.max_rows_per_part {
            Some(_) => self
                .name
                .part_path(&CorpusName::local_part_tag(self.closed.len()), ext),
            None => self.name.data_path(ext),
        }
    }

    /// Append one row. The row must match the schema and hold escaped values.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        self.schema.check_row(row)?;
        if let Some(idx) = row.find_unescaped() {
            return Err(TextdbError::Transform(format!(
                "field '{}' holds an unescaped tab or newline",
                self.schema.fields()[idx]
            ))
            .into());
        }

        let full = match (self.options.max_rows_per_part, &self.current) {
            (Some(limit), Some(part)) => part.rows >= limit,
            _ => false,
        };
        if full && let Some(part) = self.current.take() {
            self.closed.push(part.close()?);
        }
        if self.current.is_none() {
            let path = self.next_part_path();
            self.current = Some(Part::create(path)?);
        }
        let part = self.current.as_mut().context("no open data part")?;

        row.write_line(&mut part.out)
            .with_context(|| format!("write {}", part.path.display()))?;
        part.rows += 1;
        self.rows += 1;
        Ok(())
    }

    /// Close every data part, then write the schema file.
    ///
    /// A corpus with no rows still gets one empty data file.
    pub fn finish(mut self) -> Result<CorpusSummary> {
        match self.current.take() {
            Some(part) => self.closed.push(part.close()?),
            None if self.closed.is_empty() => {
                let path = self.next_part_path();
                self.closed.push(Part::create(path)?.close()?);
            }
            None => {}
        }

        let schema_path = self.name.schema_path();
        self.schema.write(&schema_path)?;
        info!(
            "wrote {} rows in {} file(s), schema {}",
            self.rows,
            self.closed.len(),
            schema_path.display()
        );
        Ok(CorpusSummary {
            schema_path,
            data_paths: self.closed,
            rows: self.rows,
        })
    }

    /// Remove whatever was written so far; no schema file is left behind.
    pub fn abort(mut self) -> Result<()> {
        if let Some(part) = self.current.take() {
            let path = part.path.clone();
            drop(part);
            self.closed.push(path);
        }
        remove_all(&self.closed)
    }
}

fn remove_all(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if path.exists() {
            debug!("removing {}", path.display());
            remove_file(path).with_context(|| format!("remove {}", path.display()))?;
        }
    }
    Ok(())
}

/// Write `rows` as a complete corpus.
pub fn write_corpus<I>(
    name: CorpusName,
    schema: Schema,
    rows: I,
    options: WriterOptions,
) -> Result<CorpusSummary>
where
    I: IntoIterator<Item = Row>,
{
    write_corpus_stream(name, schema, rows.into_iter().map(Ok::<_, TextdbError>), options)
}

/// Write a fallible row stream; on the first error the partial corpus is removed.
pub fn write_corpus_stream<I, E>(
    name: CorpusName,
    schema: Schema,
    rows: I,
    options: WriterOptions,
) -> Result<CorpusSummary>
where
    I: IntoIterator<Item = std::result::Result<Row, E>>,
    E: Into<anyhow::Error>,
{
    let mut writer = CorpusWriter::create(name, schema, options)?;
    for row in rows {
        let written = row.map_err(Into::<anyhow::Error>::into).and_then(|row| writer.write_row(&row));
        if let Err(e) = written {
            writer.abort()?;
            return Err(e);
        }
    }
    writer.finish()
}

/// Write `rows` in parallel, one `part-NNNNN` file per shard.
///
/// Rows are split into `shards` contiguous chunks (default: one per core),
/// so reading the parts back in name order yields the original order.
#[cfg(feature = "parallel-io")]
pub fn write_corpus_par(
    name: CorpusName,
    schema: Schema,
    rows: &[Row],
    shards: Option<usize>,
    options: WriterOptions,
) -> Result<CorpusSummary> {
    use rayon::prelude::*;

    let n = rows.len();
    if n == 0 {
        return CorpusWriter::create(name, schema, options)?.finish();
    }
    // Validate up front so a bad row never leaves half a corpus behind.
    for row in rows {
        schema.check_row(row)?;
    }
    // Pre-flight existence checks and overwrite cleanup.
    drop(CorpusWriter::create(name.clone(), schema.clone(), options.clone())?);

    let shards = shards.unwrap_or_else(|| num_cpus::get().max(2)).clamp(1, n);
    let chunk = n.div_ceil(shards);
    let ext = options.compression_ext();
    let part_paths: Vec<PathBuf> = (0..n.div_ceil(chunk))
        .map(|i| name.part_path(&CorpusName::local_part_tag(i), ext))
        .collect();

    let written = part_paths
        .par_iter()
        .enumerate()
        .try_for_each(|(i, path)| write_part(path, &schema, &rows[i * chunk..((i + 1) * chunk).min(n)]));
    if let Err(e) = written {
        remove_all(&part_paths)?;
        return Err(e);
    }

    let schema_path = name.schema_path();
    schema.write(&schema_path)?;
    info!(
        "wrote {n} rows in {} parts, schema {}",
        part_paths.len(),
        schema_path.display()
    );
    Ok(CorpusSummary {
        schema_path,
        data_paths: part_paths,
        rows: n as u64,
    })
}

#[cfg(feature = "parallel-io")]
fn write_part(path: &std::path::Path, schema: &Schema, rows: &[Row]) -> Result<()> {
    let mut part = Part::create(path.to_path_buf())?;
    for row in rows {
        if let Some(idx) = row.find_unescaped() {
            bail!(
                "{}: field '{}' holds an unescaped tab or newline",
                path.display(),
                schema.fields()[idx]
            );
        }
        row.write_line(&mut part.out)
            .with_context(|| format!("write {}", path.display()))?;
        part.rows += 1;
    }
    part.close()?;
    Ok(())
}
