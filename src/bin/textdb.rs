use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::{error, info};
use std::path::PathBuf;
use std::process;
use textdb::io::lines::read_lines;
use textdb::{
    Compression, Corpus, CorpusName, CorpusWriter, ProcessConfig, Row, RowProcessor, Schema,
    SplitGenerator, StreamStats, WriterOptions, merge_and_rename, split_corpus_with,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Command {
    /// Read every row of a corpus and report malformed lines
    Check {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// Save row counters as JSON
        #[arg(long)]
        stats_json: Option<PathBuf>,
        #[command(flatten)]
        process: ProcessArgs,
    },
    /// Copy a corpus keeping only some fields
    Select {
        #[command(flatten)]
        corpus: CorpusArgs,
        dest_dir: PathBuf,
        dest_prefix: String,
        /// Comma-separated field names, in output order
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
        #[command(flatten)]
        process: ProcessArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Distribute the rows of a corpus over training/dev/test style splits
    Split {
        #[command(flatten)]
        corpus: CorpusArgs,
        dest_dir: PathBuf,
        dest_prefix: String,
        /// Relative split sizes
        #[arg(long, value_delimiter = ',', default_value = "80,10,10")]
        fractions: Vec<f64>,
        /// Split names, one per fraction
        #[arg(long, value_delimiter = ',', default_value = "training,dev,test")]
        names: Vec<String>,
        /// Maximum rows per split, 0 for no limit; extra rows are dropped
        #[arg(long, value_delimiter = ',')]
        max_rows: Vec<u64>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Adopt the part files of an engine output directory as a corpus
    Merge {
        source_dir: PathBuf,
        dest_dir: PathBuf,
        prefix: String,
        suffix: String,
        /// Schema file describing the part files
        #[arg(long)]
        schema: PathBuf,
    },
}

#[derive(ClapArgs)]
struct CorpusArgs {
    /// Directory holding the corpus
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

#[derive(ClapArgs)]
struct ProcessArgs {
    /// Stop after this many lines per data file
    #[arg(long)]
    max_lines: Option<u64>,
    /// Worker threads
    #[arg(short, long)]
    threads: Option<usize>,
    /// Seconds between progress messages (0 disables them)
    #[arg(long, default_value_t = 15)]
    progress_secs: u64,
}

impl ProcessArgs {
    fn config(&self) -> ProcessConfig {
        let mut config = ProcessConfig::default().with_progress_secs(self.progress_secs);
        if let Some(max) = self.max_lines {
            config = config.with_max_lines(max);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        config
    }
}

#[derive(ClapArgs)]
struct OutputArgs {
    /// Compress data files: gzip, bzip2, zstd or xz
    #[arg(long)]
    compression: Option<Compression>,
    /// Start a new part file after this many rows
    #[arg(long)]
    max_rows_per_part: Option<u64>,
    /// Replace an existing destination corpus
    #[arg(long)]
    overwrite: bool,
}

impl OutputArgs {
    fn options(&self) -> Result<WriterOptions> {
        let mut options = WriterOptions::default().with_overwrite(self.overwrite);
        if let Some(c) = self.compression {
            if !c.is_available() {
                bail!("{c} support was not compiled in");
            }
            options = options.with_compression(c);
        }
        if let Some(rows) = self.max_rows_per_part {
            options = options.with_max_rows_per_part(rows);
        }
        Ok(options)
    }
}

fn open(args: &CorpusArgs) -> Result<Corpus> {
    Corpus::open(&args.dir, &args.prefix, &args.suffix)
}

fn check(corpus: &CorpusArgs, stats_json: Option<&PathBuf>, process: &ProcessArgs) -> Result<bool> {
    let corpus = open(corpus)?;
    let mut rows = corpus.rows_with(process.config());
    for row in rows.by_ref() {
        row?;
    }
    let stats = rows.stats();
    info!("{}: {stats}", corpus.name().schema_path().display());
    if let Some(path) = stats_json {
        stats.save_to_file(path)?;
    }
    Ok(stats.skipped() == 0)
}

fn select(
    corpus: &CorpusArgs,
    dest: CorpusName,
    fields: &[String],
    process: &ProcessArgs,
    output: &OutputArgs,
) -> Result<()> {
    let corpus = open(corpus)?;
    let schema = Schema::new(fields.iter().cloned(), corpus.schema().fixed_fields().clone())?;
    let projection = corpus.schema().projection(&schema)?;
    let processor = RowProcessor::new(corpus.schema())
        .with_output_schema(&schema)
        .with_config(process.config());

    let mut writer = CorpusWriter::create(dest, schema.clone(), output.options()?)?;
    let mut totals = StreamStats::default();
    for path in corpus.data_files() {
        let run = read_lines(path).and_then(|lines| {
            processor.run_par(
                path.display().to_string(),
                lines,
                |_: &Schema, row: Row| Ok(Some(projection.apply(&row)?)),
                |row| writer.write_row(&row),
            )
        });
        match run {
            Ok(stats) => totals.merge(&stats),
            Err(e) => {
                writer.abort()?;
                return Err(e);
            }
        }
    }
    let summary = writer.finish()?;
    info!("selected {} of {} lines: {totals}", summary.rows, totals.lines_read);
    Ok(())
}

fn run(args: &Args) -> Result<bool> {
    match &args.command {
        Command::Check {
            corpus,
            stats_json,
            process,
        } => check(corpus, stats_json.as_ref(), process),
        Command::Select {
            corpus,
            dest_dir,
            dest_prefix,
            fields,
            process,
            output,
        } => {
            let dest = CorpusName::new(dest_dir, dest_prefix.clone(), corpus.suffix.clone());
            select(corpus, dest, fields, process, output)?;
            Ok(true)
        }
        Command::Split {
            corpus,
            dest_dir,
            dest_prefix,
            fractions,
            names,
            max_rows,
            output,
        } => {
            if names.len() != fractions.len() {
                bail!("{} names for {} fractions", names.len(), fractions.len());
            }
            let mut splits = SplitGenerator::new(fractions)?;
            if !max_rows.is_empty() {
                splits = splits
                    .with_max_sizes(max_rows.iter().map(|&m| (m > 0).then_some(m)).collect())?;
            }
            let source = open(corpus)?;
            let summaries =
                split_corpus_with(&source, dest_dir, dest_prefix, names, splits, output.options()?)?;
            for summary in summaries {
                info!("{}: {} rows", summary.schema_path.display(), summary.rows);
            }
            Ok(true)
        }
        Command::Merge {
            source_dir,
            dest_dir,
            prefix,
            suffix,
            schema,
        } => {
            let schema = Schema::read(schema)
                .with_context(|| format!("load schema {}", schema.display()))?;
            let dest = CorpusName::new(dest_dir, prefix.clone(), suffix.clone());
            merge_and_rename(source_dir, &dest, &schema)?;
            Ok(true)
        }
    }
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .format_timestamp_secs()
        .init();
    match run(&args) {
        Ok(true) => (),
        Ok(false) => {
            error!("some rows could not be read");
            process::exit(2);
        }
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    }
}
