//! Deterministic assignment of rows to training/dev/test style splits.

use crate::config::WriterOptions;
use crate::io::naming::CorpusName;
use crate::io::reader::Corpus;
use crate::io::writer::{CorpusSummary, CorpusWriter};
use anyhow::{Result, bail, ensure};
use log::{info, warn};
use std::path::Path;

/// Yields split indices in proportion to a list of fractions, maximally interleaved.
///
/// Fractions are normalised so the smallest is 1. Splits are visited in
/// order; a split is yielded while its running count is below its fraction.
/// When a whole cycle yields nothing, every fraction is subtracted from its
/// running count, so non-integral remainders carry over and the long-run
/// ratios come out right. `[1, 1, 1]` gives `0, 1, 2, 0, 1, 2, ...`;
/// `[1, 1.5, 1]` gives `0, 1, 2, 1, 0, 1, 2, 0, 1, 2, 1, ...`.
///
/// The sequence is endless unless maximum sizes are set, in which case it
/// ends once every split is full.
#[derive(Clone, Debug)]
pub struct SplitGenerator {
    fractions: Vec<f64>,
    cumulative: Vec<f64>,
    counts: Vec<u64>,
    max_sizes: Vec<Option<u64>>,
    next: usize,
    yielded_this_cycle: bool,
}

impl SplitGenerator {
    pub fn new(fractions: &[f64]) -> Result<Self> {
        ensure!(!fractions.is_empty(), "at least one split fraction is required");
        if let Some(bad) = fractions.iter().find(|f| !f.is_finite() || **f <= 0.0) {
            bail!("split fractions must be positive, got {bad}");
        }
        let min = fractions.iter().copied().fold(f64::INFINITY, f64::min);
        let n = fractions.len();
        Ok(Self {
            fractions: fractions.iter().map(|f| f / min).collect(),
            cumulative: vec![0.0; n],
            counts: vec![0; n],
            max_sizes: vec![None; n],
            next: 0,
            yielded_this_cycle: false,
        })
    }

    /// Cap the number of items per split; `None` leaves a split unbounded.
    pub fn with_max_sizes(mut self, max_sizes: Vec<Option<u64>>) -> Result<Self> {
        ensure!(
            max_sizes.len() == self.fractions.len(),
            "{} maximum sizes given for {} splits",
            max_sizes.len(),
            self.fractions.len()
        );
        self.max_sizes = max_sizes;
        Ok(self)
    }

    /// Normalised fractions (smallest is 1).
    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    /// Items yielded so far, per split.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    fn is_full(&self, split: usize) -> bool {
        self.max_sizes[split].is_some_and(|max| self.counts[split] >= max)
    }
}

impl Iterator for SplitGenerator {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let n = self.fractions.len();
        if (0..n).all(|j| self.is_full(j)) {
            return None;
        }
        loop {
            if self.next == n {
                if !self.yielded_this_cycle {
                    for (cum, frac) in self.cumulative.iter_mut().zip(&self.fractions) {
                        while *cum >= *frac {
                            *cum -= frac;
                        }
                    }
                }
                self.next = 0;
                self.yielded_this_cycle = false;
            }

            let j = self.next;
            self.next += 1;
            if self.is_full(j) || self.cumulative[j] >= self.fractions[j] {
                continue;
            }
            self.cumulative[j] += 1.0;
            self.counts[j] += 1;
            self.yielded_this_cycle = true;
            return Some(j);
        }
    }
}

/// Distribute the rows of `corpus` over one new corpus per split.
///
/// Split `name` is written as `<dest_dir>/<dest_prefix>-<name>-<suffix>`,
/// keeping the source suffix, and its schema gains the fixed field
/// `split=<name>`.
pub fn split_corpus<S: AsRef<str>>(
    corpus: &Corpus,
    dest_dir: impl AsRef<Path>,
    dest_prefix: &str,
    names: &[S],
    fractions: &[f64],
    options: WriterOptions,
) -> Result<Vec<CorpusSummary>> {
    split_corpus_with(
        corpus,
        dest_dir,
        dest_prefix,
        names,
        SplitGenerator::new(fractions)?,
        options,
    )
}

/// Like [`split_corpus`], with a prepared generator (e.g. one with maximum sizes).
///
/// Rows left over once every split is full are read but not written; their
/// number is logged as a warning.
pub fn split_corpus_with<S: AsRef<str>>(
    corpus: &Corpus,
    dest_dir: impl AsRef<Path>,
    dest_prefix: &str,
    names: &[S],
    mut splits: SplitGenerator,
    options: WriterOptions,
) -> Result<Vec<CorpusSummary>> {
    ensure!(
        names.len() == splits.fractions().len(),
        "{} split names given for {} fractions",
        names.len(),
        splits.fractions().len()
    );
    let dest_dir = dest_dir.as_ref();

    let mut writers = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let schema = corpus.schema().clone_with_changes([("split", name)]);
        let dest = CorpusName::new(
            dest_dir,
            format!("{dest_prefix}-{name}"),
            corpus.name().suffix(),
        );
        writers.push(CorpusWriter::create(dest, schema, options.clone())?);
    }

    let mut unassigned = 0u64;
    let mut rows = corpus.rows();
    let written: Result<()> = rows.by_ref().try_for_each(|row| {
        let row = row?;
        match splits.next() {
            Some(split) => writers[split].write_row(&row)?,
            None => unassigned += 1,
        }
        Ok(())
    });
    if let Err(e) = written {
        for writer in writers {
            writer.abort()?;
        }
        return Err(e);
    }

    let stats = rows.stats();
    info!("split {} rows: {stats}", stats.emitted - unassigned);
    if unassigned > 0 {
        warn!("{unassigned} rows left unassigned: every split is full");
    }
    writers.into_iter().map(CorpusWriter::finish).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uneven_fractions_interleave() -> Result<()> {
        let seq: Vec<usize> = SplitGenerator::new(&[1.0, 1.5, 1.0])?.take(11).collect();
        assert_eq!(seq, vec![0, 1, 2, 1, 0, 1, 2, 0, 1, 2, 1]);
        Ok(())
    }

    #[test]
    fn rejects_bad_fractions() {
        assert!(SplitGenerator::new(&[]).is_err());
        assert!(SplitGenerator::new(&[1.0, 0.0]).is_err());
        assert!(SplitGenerator::new(&[1.0, f64::NAN]).is_err());
    }
}
