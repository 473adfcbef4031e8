use anyhow::bail;
use std::io;
use textdb::codec::{decode_count_map, encode_count_map};
use textdb::{ProcessConfig, Row, RowProcessor, Schema, StreamStats, TextdbError, process, process_par};

fn lines(raw: &[&str]) -> Vec<io::Result<String>> {
    raw.iter().map(|l| Ok(l.to_string())).collect()
}

fn quiet() -> ProcessConfig {
    ProcessConfig::default().with_progress_secs(0)
}

#[test]
fn word_count_row() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["word", "count"])?;
    let mut seen = Vec::new();
    let mut stream = process(&schema, lines(&["hello\t5"]), |schema: &Schema, row: Row| {
        seen.push((
            schema.get_field(&row, "word")?.to_string(),
            schema.get_field(&row, "count")?.parse::<i64>()?,
        ));
        Ok(Some(row))
    });
    let rows = stream.by_ref().collect::<Result<Vec<_>, _>>()?;
    drop(stream);
    assert_eq!(rows.len(), 1);
    assert_eq!(seen, vec![("hello".to_string(), 5)]);
    Ok(())
}

#[test]
fn malformed_line_is_skipped() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["a", "b"])?;
    let input = lines(&["1\t2", "3\t4", "only-one", "5\t6", "7\t8\t9"]);
    let mut stream = process(&schema, input, |_: &Schema, row: Row| Ok(Some(row)));
    let rows = stream.by_ref().collect::<Result<Vec<_>, _>>()?;

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], Row::from(vec!["5", "6"]));
    let stats = stream.stats();
    assert_eq!(stats.lines_read, 5);
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.skipped(), 2);
    assert_eq!(stats.emitted, 3);
    assert_eq!(stream.context().line_no(), 5);
    Ok(())
}

#[test]
fn failing_transform_drops_only_its_rows() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["n"])?;
    let raw: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    let input: Vec<io::Result<String>> = raw.iter().cloned().map(Ok).collect();

    let mut stream = process(&schema, input, |_: &Schema, row: Row| {
        let n: u32 = row.values()[0].parse()?;
        if n % 5 == 0 {
            bail!("{n} is a multiple of five");
        }
        Ok(Some(row))
    });
    let rows = stream.by_ref().collect::<Result<Vec<_>, _>>()?;

    assert_eq!(rows.len(), 16);
    assert!(rows.iter().all(|r| r.values()[0].parse::<u32>().is_ok_and(|n| n % 5 != 0)));
    assert_eq!(stream.stats().failed, 4);
    assert_eq!(stream.stats().skipped(), 4);
    Ok(())
}

#[test]
fn decode_failures_are_counted_separately() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["word", "counts"])?;
    let input = lines(&["a\tx:1 y:2", "b\tx:oops", "c\t"]);
    let mut stream = process(&schema, input, |schema: &Schema, row: Row| {
        let counts = decode_count_map(schema.get_field(&row, "counts")?)?;
        let total: i64 = counts.iter().map(|(_, c)| c).sum();
        let word = schema.get_field(&row, "word")?.to_string();
        Ok(Some(Row::from(vec![word, encode_count_map([("total", total)])])))
    });
    let rows = stream.by_ref().collect::<Result<Vec<_>, _>>()?;

    assert_eq!(
        rows,
        vec![
            Row::from(vec!["a", "total:3"]),
            Row::from(vec!["c", "total:0"]),
        ]
    );
    assert_eq!(stream.stats().undecodable, 1);
    assert_eq!(stream.stats().failed, 0);
    Ok(())
}

#[test]
fn filtered_rows_are_not_errors() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["n"])?;
    let mut stream = process(&schema, lines(&["1", "2", "3"]), |_: &Schema, row: Row| {
        Ok((row.values()[0] != "2").then_some(row))
    });
    assert_eq!(stream.by_ref().count(), 2);
    assert_eq!(stream.stats().filtered, 1);
    assert_eq!(stream.stats().skipped(), 0);
    Ok(())
}

#[test]
fn read_error_ends_the_stream() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["n"])?;
    let input: Vec<io::Result<String>> = vec![
        Ok("1".into()),
        Err(io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")),
        Ok("3".into()),
    ];
    let mut stream = process(&schema, input, |_: &Schema, row: Row| Ok(Some(row)));
    assert!(matches!(stream.next(), Some(Ok(_))));
    assert!(matches!(stream.next(), Some(Err(TextdbError::Io(_)))));
    assert!(stream.next().is_none());
    assert_eq!(stream.stats().lines_read, 1);
    Ok(())
}

#[test]
fn unknown_field_is_fatal() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["n"])?;
    let mut stream = process(&schema, lines(&["1", "2"]), |schema: &Schema, row: Row| {
        schema.get_field(&row, "typo")?;
        Ok(Some(row))
    });
    assert!(matches!(stream.next(), Some(Err(TextdbError::UnknownField(_)))));
    assert!(stream.next().is_none());
    Ok(())
}

#[test]
fn output_schema_is_enforced() -> anyhow::Result<()> {
    let input = Schema::from_fields(["a", "b"])?;
    let output = Schema::from_fields(["a"])?;
    let processor = RowProcessor::new(&input).with_output_schema(&output);

    let mut stream = processor.stream("test", lines(&["1\t2", "3\t4"]), |_: &Schema, row: Row| {
        if row.values()[0] == "1" {
            Ok(Some(Row::from(vec![row.values()[0].clone()])))
        } else {
            Ok(Some(row))
        }
    });
    let rows = stream.by_ref().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(rows, vec![Row::from(vec!["1"])]);
    assert_eq!(stream.stats().failed, 1);
    Ok(())
}

#[test]
fn unescaped_output_is_rejected() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["text"])?;
    let mut stream = process(&schema, lines(&["ok"]), |_: &Schema, _row: Row| {
        Ok(Some(Row::from(vec!["two\nlines"])))
    });
    assert_eq!(stream.by_ref().count(), 0);
    assert_eq!(stream.stats().failed, 1);
    Ok(())
}

#[test]
fn max_lines_stops_early() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["n"])?;
    let processor = RowProcessor::new(&schema).with_config(quiet().with_max_lines(2));
    let mut stream = processor.stream("test", lines(&["1", "2", "3", "4"]), |_: &Schema, row: Row| {
        Ok(Some(row))
    });
    assert_eq!(stream.by_ref().count(), 2);
    assert_eq!(stream.stats().lines_read, 2);
    Ok(())
}

#[test]
fn parallel_run_preserves_order_and_stats() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["n", "square"])?;
    let raw: Vec<String> = (0..1000)
        .map(|i| {
            if i % 97 == 0 {
                format!("{i}")
            } else {
                format!("{i}\t")
            }
        })
        .collect();

    let transform = |_: &Schema, mut row: Row| -> anyhow::Result<Option<Row>> {
        let n: u64 = row.values()[0].parse()?;
        if n % 10 == 3 {
            return Ok(None);
        }
        row.set(1, (n * n).to_string());
        Ok(Some(row))
    };

    let config = quiet().with_chunk_size(64).with_threads(4);
    let (par_rows, par_stats) = process_par(
        &schema,
        raw.iter().cloned().map(Ok),
        transform,
        config,
    )?;

    let mut seq = process(&schema, raw.iter().cloned().map(Ok), transform);
    let seq_rows = seq.by_ref().collect::<Result<Vec<_>, _>>()?;

    assert_eq!(par_rows, seq_rows);
    assert_eq!(&par_stats, seq.stats());
    assert_eq!(par_stats.lines_read, 1000);
    assert_eq!(par_stats.malformed, 11);
    Ok(())
}

#[test]
fn run_par_sink_failure_stops_the_run() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["n"])?;
    let mut received = 0;
    let result = RowProcessor::new(&schema)
        .with_config(quiet().with_chunk_size(2))
        .run_par(
            "test",
            lines(&["1", "2", "3", "4", "5"]),
            |_: &Schema, row: Row| Ok(Some(row)),
            |_row| {
                received += 1;
                if received == 3 {
                    bail!("disk full");
                }
                Ok(())
            },
        );
    assert!(result.is_err());
    assert_eq!(received, 3);
    Ok(())
}

#[test]
fn stats_merge_and_serialize() -> anyhow::Result<()> {
    let a = StreamStats {
        lines_read: 10,
        malformed: 1,
        undecodable: 0,
        failed: 2,
        filtered: 3,
        emitted: 4,
    };
    let b = StreamStats {
        lines_read: 5,
        emitted: 5,
        ..Default::default()
    };
    let mut ab = a;
    ab.merge(&b);
    let mut ba = b;
    ba.merge(&a);
    assert_eq!(ab, ba);
    assert_eq!(ab.lines_read, 15);
    assert_eq!(ab.skipped(), 3);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("stats.json");
    ab.save_to_file(&path)?;
    let back: StreamStats = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(back, ab);
    Ok(())
}
