//! Streaming row transformation with per-row error isolation.
//!
//! A [`RowStream`] pulls raw lines from a lazy source, splits each against the
//! input [`Schema`], hands the row to a user transform and yields what the
//! transform returns. One bad row never aborts the stream:
//!
//! - a line with the wrong number of fields is counted as *malformed*,
//! - a [`TextdbError::Decode`] raised by the transform is counted as *undecodable*,
//! - any other transform error is counted as *failed*,
//!
//! and in each case the row is logged with its source name, line number and
//! raw content, then dropped. A transform returning `Ok(None)` filters the row
//! out. Fatal conditions (a read error on the line source, an unknown field
//! name) are yielded once as `Err` and end the stream.
//!
//! Counters live in a [`StreamContext`] owned by the stream, one per logical
//! input, and are summarised when the stream ends.
//!
//! ```
//! use textdb::{Row, Schema, stream::process};
//!
//! let schema = Schema::from_fields(["word", "count"]).unwrap();
//! let lines = vec!["hello\t5", "broken", "world\t2"]
//!     .into_iter()
//!     .map(|l| Ok(l.to_string()));
//!
//! let mut stream = process(&schema, lines, |schema: &Schema, row: Row| {
//!     let count: i64 = schema.get_field(&row, "count")?.parse()?;
//!     Ok((count > 2).then_some(row))
//! });
//! let rows: Vec<Row> = stream.by_ref().collect::<Result<_, _>>().unwrap();
//!
//! assert_eq!(rows, vec![Row::from(vec!["hello", "5"])]);
//! assert_eq!(stream.stats().malformed, 1);
//! assert_eq!(stream.stats().filtered, 1);
//! ```

use crate::config::ProcessConfig;
use crate::error::TextdbError;
use crate::progress::Progress;
use crate::row::Row;
use crate::schema::Schema;
use anyhow::Context;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// Row counters accumulated over one stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    pub lines_read: u64,
    /// Lines whose field count did not match the schema.
    pub malformed: u64,
    /// Rows dropped because a compound field could not be decoded.
    pub undecodable: u64,
    /// Rows dropped because the transform failed.
    pub failed: u64,
    /// Rows the transform chose to drop.
    pub filtered: u64,
    pub emitted: u64,
}

impl StreamStats {
    /// Rows dropped because of an error.
    pub fn skipped(&self) -> u64 {
        self.malformed + self.undecodable + self.failed
    }

    /// Add `other` into `self`; associative and commutative.
    pub fn merge(&mut self, other: &StreamStats) {
        self.lines_read += other.lines_read;
        self.malformed += other.malformed;
        self.undecodable += other.undecodable;
        self.failed += other.failed;
        self.filtered += other.filtered;
        self.emitted += other.emitted;
    }

    /// Log the end-of-stream summary; at `warn` level if any row was skipped.
    pub fn log_summary(&self, source: &str) {
        if self.skipped() > 0 {
            warn!("{source}: {self}");
        } else {
            info!("{source}: {self}");
        }
    }

    /// Save the counters as pretty JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        serde_json::to_writer_pretty(f, self)
            .with_context(|| format!("write stats to {}", path.display()))?;
        Ok(())
    }
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines read, {} rows emitted, {} filtered, {} skipped \
             ({} malformed, {} undecodable, {} failed)",
            self.lines_read,
            self.emitted,
            self.filtered,
            self.skipped(),
            self.malformed,
            self.undecodable,
            self.failed
        )
    }
}

/// Per-stream state: where the lines come from and what happened to them.
#[derive(Debug, Clone)]
pub struct StreamContext {
    source: String,
    line_no: u64,
    stats: StreamStats,
    max_logged_errors: u64,
}

impl StreamContext {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            line_no: 0,
            stats: StreamStats::default(),
            max_logged_errors: ProcessConfig::default().max_logged_errors,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 1-based number of the last line read.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    fn next_line(&mut self) {
        self.line_no += 1;
        self.stats.lines_read += 1;
    }

    /// Count a row-level error and log it with enough context to reproduce.
    fn report(&mut self, line_no: u64, err: &TextdbError, raw: &str) {
        match err {
            TextdbError::RowShape { .. } => self.stats.malformed += 1,
            TextdbError::Decode(_) => self.stats.undecodable += 1,
            _ => self.stats.failed += 1,
        }
        let logged = self.stats.skipped();
        if logged <= self.max_logged_errors {
            warn!("{}:{line_no}: {err}; skipping line {raw:?}", self.source);
        }
        if logged == self.max_logged_errors {
            warn!("{}: further row errors are counted but not logged", self.source);
        }
    }
}

/// Run one line through split, transform and output checks.
fn apply_line<T>(
    input: &Schema,
    output: Option<&Schema>,
    line: &str,
    transform: T,
) -> Result<Option<Row>, TextdbError>
where
    T: FnOnce(&Schema, Row) -> anyhow::Result<Option<Row>>,
{
    let row = input.parse_row(line)?;
    let Some(out) = transform(input, row).map_err(classify_transform_error)? else {
        return Ok(None);
    };

    let target = output.unwrap_or(input);
    if out.len() != target.len() {
        return Err(TextdbError::Transform(format!(
            "transform produced {} fields, output schema has {}",
            out.len(),
            target.len()
        )));
    }
    if let Some(idx) = out.find_unescaped() {
        return Err(TextdbError::Transform(format!(
            "field '{}' holds an unescaped tab or newline",
            target.fields()[idx]
        )));
    }
    Ok(Some(out))
}

/// Keep domain errors raised inside a transform; wrap everything else.
fn classify_transform_error(err: anyhow::Error) -> TextdbError {
    match err.downcast::<TextdbError>() {
        Ok(e) => e,
        Err(other) => TextdbError::Transform(format!("{other:#}")),
    }
}

/// Lazy, non-restartable stream of transformed rows.
///
/// Built by [`process`] or [`RowProcessor::stream`].
pub struct RowStream<'s, L, F> {
    input: &'s Schema,
    output: Option<&'s Schema>,
    lines: L,
    transform: F,
    ctx: StreamContext,
    progress: Progress,
    max_lines: Option<u64>,
    done: bool,
}

impl<'s, L, F> RowStream<'s, L, F> {
    pub fn context(&self) -> &StreamContext {
        &self.ctx
    }

    pub fn stats(&self) -> &StreamStats {
        &self.ctx.stats
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.ctx.stats.log_summary(&self.ctx.source);
        }
    }
}

impl<'s, L, F> Iterator for RowStream<'s, L, F>
where
    L: Iterator<Item = io::Result<String>>,
    F: FnMut(&Schema, Row) -> anyhow::Result<Option<Row>>,
{
    type Item = Result<Row, TextdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if self
                .max_lines
                .is_some_and(|max| self.ctx.stats.lines_read >= max)
            {
                debug!("{}: line limit reached", self.ctx.source);
                self.finish();
                return None;
            }

            let line = match self.lines.next() {
                None => {
                    self.finish();
                    return None;
                }
                Some(Err(e)) => {
                    error!(
                        "{}: read error after line {}: {e}",
                        self.ctx.source, self.ctx.line_no
                    );
                    self.finish();
                    return Some(Err(TextdbError::Io(e)));
                }
                Some(Ok(line)) => line,
            };

            self.ctx.next_line();
            self.progress.item_processed();

            let transform = &mut self.transform;
            match apply_line(self.input, self.output, &line, |s, r| transform(s, r)) {
                Ok(Some(row)) => {
                    self.ctx.stats.emitted += 1;
                    return Some(Ok(row));
                }
                Ok(None) => self.ctx.stats.filtered += 1,
                Err(e) if e.is_row_recoverable() => {
                    let line_no = self.ctx.line_no;
                    self.ctx.report(line_no, &e, &line);
                }
                Err(e) => {
                    error!("{}:{}: {e}", self.ctx.source, self.ctx.line_no);
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Stream `lines` through `transform` against `schema` with default settings.
///
/// Shorthand for `RowProcessor::new(schema).stream("<input>", lines, transform)`.
pub fn process<'s, I, F>(schema: &'s Schema, lines: I, transform: F) -> RowStream<'s, I::IntoIter, F>
where
    I: IntoIterator<Item = io::Result<String>>,
    F: FnMut(&Schema, Row) -> anyhow::Result<Option<Row>>,
{
    RowProcessor::new(schema).stream("<input>", lines, transform)
}

/// Identity transform, for reading rows unchanged.
pub fn keep_row(_: &Schema, row: Row) -> anyhow::Result<Option<Row>> {
    Ok(Some(row))
}

/// Function-pointer type of [`keep_row`].
pub type KeepRow = fn(&Schema, Row) -> anyhow::Result<Option<Row>>;

/// Binds an input schema, an optional output schema and a [`ProcessConfig`].
#[derive(Clone, Debug)]
pub struct RowProcessor<'s> {
    input: &'s Schema,
    output: Option<&'s Schema>,
    config: ProcessConfig,
}

impl<'s> RowProcessor<'s> {
    pub fn new(input: &'s Schema) -> Self {
        Self {
            input,
            output: None,
            config: ProcessConfig::default(),
        }
    }

    /// Check transformed rows against `output` instead of the input schema.
    pub fn with_output_schema(mut self, output: &'s Schema) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_config(mut self, config: ProcessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    fn context(&self, source: impl Into<String>) -> StreamContext {
        let mut ctx = StreamContext::new(source);
        ctx.max_logged_errors = self.config.max_logged_errors;
        ctx
    }

    /// Lazily stream `lines` through `transform`; `source` names the input in logs.
    pub fn stream<I, F>(
        &self,
        source: impl Into<String>,
        lines: I,
        transform: F,
    ) -> RowStream<'s, I::IntoIter, F>
    where
        I: IntoIterator<Item = io::Result<String>>,
        F: FnMut(&Schema, Row) -> anyhow::Result<Option<Row>>,
    {
        RowStream {
            input: self.input,
            output: self.output,
            lines: lines.into_iter(),
            transform,
            ctx: self.context(source),
            progress: Progress::new("line", self.config.progress_secs),
            max_lines: self.config.max_lines,
            done: false,
        }
    }

    /// Transform `lines` on the rayon pool, `chunk_size` lines at a time.
    ///
    /// Rows reach `sink` in input order; row errors are logged in input order
    /// too. `transform` must not depend on other rows. Fatal errors (read
    /// failures, unknown fields, a failing sink) stop the run.
    pub fn run_par<I, F, S>(
        &self,
        source: impl Into<String>,
        lines: I,
        transform: F,
        mut sink: S,
    ) -> anyhow::Result<StreamStats>
    where
        I: IntoIterator<Item = io::Result<String>>,
        F: Fn(&Schema, Row) -> anyhow::Result<Option<Row>> + Sync,
        S: FnMut(Row) -> anyhow::Result<()>,
    {
        let mut ctx = self.context(source);
        let mut progress = Progress::new("line", self.config.progress_secs);
        let pool = {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if let Some(threads) = self.config.threads {
                builder = builder.num_threads(threads);
            }
            builder.build().context("build worker pool")?
        };

        let mut lines = lines.into_iter();
        let chunk_size = self.config.chunk_size.max(1);
        loop {
            let budget = match self.config.max_lines {
                Some(max) => (max.saturating_sub(ctx.stats.lines_read) as usize).min(chunk_size),
                None => chunk_size,
            };
            if budget == 0 {
                break;
            }

            let mut chunk = Vec::with_capacity(budget);
            for line in lines.by_ref().take(budget) {
                match line {
                    Ok(line) => chunk.push(line),
                    Err(e) => {
                        let after = ctx.line_no + chunk.len() as u64;
                        return Err(e).with_context(|| {
                            format!("{}: read error after line {after}", ctx.source)
                        });
                    }
                }
            }
            if chunk.is_empty() {
                break;
            }

            let input = self.input;
            let output = self.output;
            let outcomes: Vec<Result<Option<Row>, TextdbError>> = pool.install(|| {
                chunk
                    .par_iter()
                    .map(|line| apply_line(input, output, line, |s, r| transform(s, r)))
                    .collect()
            });

            let first_line = ctx.line_no + 1;
            for (offset, (outcome, raw)) in outcomes.into_iter().zip(&chunk).enumerate() {
                let line_no = first_line + offset as u64;
                ctx.next_line();
                match outcome {
                    Ok(Some(row)) => {
                        ctx.stats.emitted += 1;
                        sink(row).with_context(|| format!("{}:{line_no}: write row", ctx.source))?;
                    }
                    Ok(None) => ctx.stats.filtered += 1,
                    Err(e) if e.is_row_recoverable() => ctx.report(line_no, &e, raw),
                    Err(e) => {
                        return Err(e).with_context(|| format!("{}:{line_no}", ctx.source));
                    }
                }
            }
            progress.items_processed(chunk.len() as u64);

            if chunk.len() < budget {
                break;
            }
        }

        ctx.stats.log_summary(&ctx.source);
        Ok(ctx.stats)
    }
}

/// Transform every line in parallel and collect the emitted rows in input order.
pub fn process_par<I, F>(
    schema: &Schema,
    lines: I,
    transform: F,
    config: ProcessConfig,
) -> anyhow::Result<(Vec<Row>, StreamStats)>
where
    I: IntoIterator<Item = io::Result<String>>,
    F: Fn(&Schema, Row) -> anyhow::Result<Option<Row>> + Sync,
{
    let mut rows = Vec::new();
    let stats = RowProcessor::new(schema).with_config(config).run_par(
        "<input>",
        lines,
        transform,
        |row| {
            rows.push(row);
            Ok(())
        },
    )?;
    Ok((rows, stats))
}
