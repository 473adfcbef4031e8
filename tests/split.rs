use tempfile::tempdir;
use textdb::{
    Corpus, CorpusName, Row, Schema, SplitGenerator, WriterOptions, split_corpus, split_corpus_with,
    write_corpus,
};

#[test]
fn equal_fractions_cycle() -> anyhow::Result<()> {
    let seq: Vec<usize> = SplitGenerator::new(&[1.0, 1.0, 1.0])?.take(9).collect();
    assert_eq!(seq, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    Ok(())
}

#[test]
fn integral_fractions_interleave() -> anyhow::Result<()> {
    let seq: Vec<usize> = SplitGenerator::new(&[80.0, 10.0, 10.0])?.take(10).collect();
    assert_eq!(seq, vec![0, 1, 2, 0, 0, 0, 0, 0, 0, 0]);
    Ok(())
}

#[test]
fn long_run_matches_ratios() -> anyhow::Result<()> {
    let mut splits = SplitGenerator::new(&[3.0, 1.5, 1.0])?;
    let n = 5500;
    let mut counts = [0u64; 3];
    for split in splits.by_ref().take(n) {
        counts[split] += 1;
    }
    assert_eq!(counts, [3000, 1500, 1000]);
    assert_eq!(splits.counts(), counts);
    Ok(())
}

#[test]
fn full_splits_are_skipped() -> anyhow::Result<()> {
    let seq: Vec<usize> = SplitGenerator::new(&[1.0, 1.0])?
        .with_max_sizes(vec![Some(2), None])?
        .take(6)
        .collect();
    assert_eq!(seq, vec![0, 1, 0, 1, 1, 1]);

    let bounded: Vec<usize> = SplitGenerator::new(&[1.0, 1.0])?
        .with_max_sizes(vec![Some(1), Some(2)])?
        .collect();
    assert_eq!(bounded, vec![0, 1, 1]);
    Ok(())
}

#[test]
fn split_corpus_writes_one_corpus_per_split() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let schema = Schema::new(["id"], [("corpus-type", "generic")])?;
    let rows: Vec<Row> = (0..20).map(|i| Row::from(vec![i.to_string()])).collect();
    write_corpus(CorpusName::new(dir.path(), "all", "docs"), schema, rows, WriterOptions::default())?;

    let source = Corpus::open(dir.path(), "all", "docs")?;
    let out = dir.path().join("splits");
    let summaries = split_corpus(
        &source,
        &out,
        "all",
        &["training", "dev", "test"],
        &[8.0, 1.0, 1.0],
        WriterOptions::default(),
    )?;
    assert_eq!(summaries.iter().map(|s| s.rows).collect::<Vec<_>>(), vec![16, 2, 2]);

    let dev = Corpus::open(&out, "all-dev", "docs")?;
    assert_eq!(dev.schema().get_fixed_field("split"), Some("dev"));
    assert_eq!(dev.schema().get_fixed_field("corpus-type"), Some("generic"));
    let (rows, _) = dev.read_all()?;
    assert_eq!(rows, vec![Row::from(vec!["1"]), Row::from(vec!["11"])]);
    Ok(())
}

#[test]
fn rows_beyond_full_splits_are_not_written() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let schema = Schema::from_fields(["id"])?;
    let rows: Vec<Row> = (0..10).map(|i| Row::from(vec![i.to_string()])).collect();
    write_corpus(CorpusName::new(dir.path(), "all", "docs"), schema, rows, WriterOptions::default())?;

    let source = Corpus::open(dir.path(), "all", "docs")?;
    let splits = SplitGenerator::new(&[1.0, 1.0])?.with_max_sizes(vec![Some(3), Some(2)])?;
    let summaries = split_corpus_with(
        &source,
        dir.path(),
        "capped",
        &["a", "b"],
        splits,
        WriterOptions::default(),
    )?;
    assert_eq!(summaries.iter().map(|s| s.rows).collect::<Vec<_>>(), vec![3, 2]);

    let (a, _) = Corpus::open(dir.path(), "capped-a", "docs")?.read_all()?;
    assert_eq!(a, vec![Row::from(vec!["0"]), Row::from(vec!["2"]), Row::from(vec!["4"])]);
    Ok(())
}
