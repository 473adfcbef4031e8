use std::collections::HashMap;
use textdb::codec::{decode_count_map, encode_count_map};
use textdb::{Count, Row, Schema, Sum, SumCounts, combine_globally, combine_values, combine_values_par, process};

#[test]
fn count_per_key() {
    let pairs = vec![("b", ()), ("a", ()), ("b", ())];
    assert_eq!(combine_values(pairs, &Count), vec![("a", 1), ("b", 2)]);
}

#[test]
fn sum_counts_over_a_row_stream() -> anyhow::Result<()> {
    let schema = Schema::from_fields(["user", "counts"])?;
    let lines = vec!["u1\ta:1 b:2", "u2\tb:3", "u1\tc:1 a:4", "bad line"];
    let mut pairs = Vec::new();
    let stream = process(&schema, lines.into_iter().map(|l| Ok(l.to_string())), |schema: &Schema, row: Row| {
        decode_count_map(schema.get_field(&row, "counts")?)?;
        Ok(Some(row))
    });
    for row in stream {
        let row = row?;
        pairs.push((
            schema.get_field(&row, "user")?.to_string(),
            decode_count_map(schema.get_field(&row, "counts")?)?,
        ));
    }

    let combined = combine_values(pairs.clone(), &SumCounts);
    let encoded: Vec<(String, String)> = combined
        .into_iter()
        .map(|(user, counts)| (user, encode_count_map(counts)))
        .collect();
    assert_eq!(
        encoded,
        vec![
            ("u1".to_string(), "a:5 b:2 c:1".to_string()),
            ("u2".to_string(), "b:3".to_string()),
        ]
    );

    let par = combine_values_par(pairs.clone(), &SumCounts);
    assert_eq!(par, combine_values(pairs, &SumCounts));
    Ok(())
}

#[test]
fn parallel_matches_sequential() {
    let pairs: Vec<(u32, i64)> = (0..10_000).map(|i| (i % 37, i as i64)).collect();
    let seq = combine_values(pairs.clone(), &Sum);
    let par = combine_values_par(pairs, &Sum);
    assert_eq!(seq, par);
    assert_eq!(seq.len(), 37);

    let expected: HashMap<u32, i64> = (0..10_000i64).fold(HashMap::new(), |mut m, i| {
        *m.entry((i % 37) as u32).or_insert(0) += i;
        m
    });
    for (k, v) in seq {
        assert_eq!(expected[&k], v);
    }
}

#[test]
fn global_total() {
    assert_eq!(combine_globally(vec![1i64, 2, 3], &Sum), 6);
    assert_eq!(combine_globally(Vec::<i64>::new(), &Sum), 0);
}
