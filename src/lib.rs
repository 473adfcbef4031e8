//! # textdb
//!
//! Reading, transforming and writing **textdb corpora**: tab-separated text
//! files described by a small schema file.
//!
//! A corpus named `<prefix>-<suffix>` in a directory consists of
//!
//! - a schema file `<prefix>-<suffix>-schema.txt`, whose first line lists the
//!   field names and whose remaining lines hold `key<TAB>value` fixed fields
//!   shared by every row, and
//! - one or more data files `<prefix>[-<part>]-<suffix>.txt[.gz|.bz2|...]`,
//!   one row per line, one escaped value per field.
//!
//! ## Modules
//!
//! - [`codec`]: escaping of scalar strings, count maps and string sequences
//!   so that no value ever contains a tab or newline.
//! - [`schema`]: the field list and fixed fields, schema file I/O, field
//!   lookup and schema derivation.
//! - [`stream`]: lazy per-row transformation with error isolation; a bad row
//!   is logged and counted, never fatal. Sequential and rayon-parallel.
//! - [`io`]: file naming, compression, corpus reader and writer, and adoption
//!   of engine part files.
//! - [`combine`] and [`split`]: keyed aggregation and deterministic
//!   training/dev/test assignment.
//!
//! ## Example
//!
//! ```no_run
//! use textdb::{Corpus, CorpusName, Row, RowProcessor, Schema, WriterOptions, write_corpus_stream};
//!
//! # fn main() -> anyhow::Result<()> {
//! let corpus = Corpus::open("in", "tweets", "unigram-counts")?;
//! let output = corpus.schema().with_fields_removed(["user"])?;
//! let projection = corpus.schema().projection(&output)?;
//!
//! let mut rows = Vec::new();
//! for path in corpus.data_files() {
//!     let lines = textdb::io::lines::read_lines(path)?;
//!     let stream = RowProcessor::new(corpus.schema())
//!         .with_output_schema(&output)
//!         .stream(path.display().to_string(), lines, |_: &Schema, row: Row| {
//!             Ok(Some(projection.apply(&row)?))
//!         });
//!     rows.extend(stream);
//! }
//!
//! let dest = CorpusName::new("out", "tweets-nouser", "unigram-counts");
//! write_corpus_stream(dest, output, rows, WriterOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod combine;
pub mod config;
pub mod error;
pub mod io;
pub mod progress;
pub mod row;
pub mod schema;
pub mod split;
pub mod stream;

pub use codec::{
    decode_count_map, decode_string, decode_string_seq, encode_count_map, encode_string,
    encode_string_seq,
};
pub use combine::{CombineFn, Count, Sum, SumCounts, combine_globally, combine_values, combine_values_par};
pub use config::{ProcessConfig, WriterOptions};
pub use error::TextdbError;
pub use io::compression::Compression;
pub use io::merge::{find_part_files, merge_and_rename};
pub use io::naming::CorpusName;
pub use io::reader::{Corpus, CorpusRows};
#[cfg(feature = "parallel-io")]
pub use io::writer::write_corpus_par;
pub use io::writer::{CorpusSummary, CorpusWriter, write_corpus, write_corpus_stream};
pub use progress::Progress;
pub use row::Row;
pub use schema::{Projection, Schema};
pub use split::{SplitGenerator, split_corpus, split_corpus_with};
pub use stream::{RowProcessor, RowStream, StreamContext, StreamStats, process, process_par};
