//! Keyed aggregation over rows, e.g. summing count-map fields per key.
//!
//! A [`CombineFn`] describes an aggregation as four steps: create an empty
//! accumulator, fold one value in, merge two accumulators, and finish into
//! an output. `merge` must be associative so [`combine_values_par`] can fold
//! chunks on separate threads and reduce them in any order.

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

pub trait CombineFn<V, A, O>: Send + Sync {
    fn create(&self) -> A;
    fn add_input(&self, acc: &mut A, v: V);
    fn merge(&self, acc: &mut A, other: A);
    fn finish(&self, acc: A) -> O;
}

/// Number of values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Count;

impl<V> CombineFn<V, u64, u64> for Count {
    fn create(&self) -> u64 {
        0
    }
    fn add_input(&self, acc: &mut u64, _v: V) {
        *acc += 1;
    }
    fn merge(&self, acc: &mut u64, other: u64) {
        *acc += other;
    }
    fn finish(&self, acc: u64) -> u64 {
        acc
    }
}

/// Sum of integer values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sum;

impl CombineFn<i64, i64, i64> for Sum {
    fn create(&self) -> i64 {
        0
    }
    fn add_input(&self, acc: &mut i64, v: i64) {
        *acc += v;
    }
    fn merge(&self, acc: &mut i64, other: i64) {
        *acc += other;
    }
    fn finish(&self, acc: i64) -> i64 {
        acc
    }
}

/// Token-wise sum of decoded count maps.
///
/// The output is sorted by token, ready for
/// [`encode_count_map`](crate::codec::encode_count_map). Tokens whose counts
/// sum to zero are kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumCounts;

impl CombineFn<Vec<(String, i64)>, HashMap<String, i64>, Vec<(String, i64)>> for SumCounts {
    fn create(&self) -> HashMap<String, i64> {
        HashMap::new()
    }

    fn add_input(&self, acc: &mut HashMap<String, i64>, v: Vec<(String, i64)>) {
        for (token, count) in v {
            *acc.entry(token).or_insert(0) += count;
        }
    }

    fn merge(&self, acc: &mut HashMap<String, i64>, other: HashMap<String, i64>) {
        if acc.len() < other.len() {
            let small = std::mem::replace(acc, other);
            self.add_input(acc, small.into_iter().collect());
        } else {
            self.add_input(acc, other.into_iter().collect());
        }
    }

    fn finish(&self, acc: HashMap<String, i64>) -> Vec<(String, i64)> {
        let mut out: Vec<_> = acc.into_iter().collect();
        out.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Combine the values of each key; output sorted by key.
pub fn combine_values<K, V, A, O, I, C>(pairs: I, comb: &C) -> Vec<(K, O)>
where
    K: Ord,
    I: IntoIterator<Item = (K, V)>,
    C: CombineFn<V, A, O>,
{
    let mut accs: BTreeMap<K, A> = BTreeMap::new();
    for (k, v) in pairs {
        let acc = accs.entry(k).or_insert_with(|| comb.create());
        comb.add_input(acc, v);
    }
    accs.into_iter().map(|(k, a)| (k, comb.finish(a))).collect()
}

/// Parallel [`combine_values`]: per-thread partial maps reduced with `merge`.
pub fn combine_values_par<K, V, A, O, C>(pairs: Vec<(K, V)>, comb: &C) -> Vec<(K, O)>
where
    K: Ord + Hash + Send,
    V: Send,
    A: Send,
    O: Send,
    C: CombineFn<V, A, O>,
{
    let merged = pairs
        .into_par_iter()
        .fold(HashMap::<K, A>::new, |mut accs, (k, v)| {
            let acc = accs.entry(k).or_insert_with(|| comb.create());
            comb.add_input(acc, v);
            accs
        })
        .reduce(HashMap::new, |mut left, right| {
            for (k, a) in right {
                match left.get_mut(&k) {
                    Some(acc) => comb.merge(acc, a),
                    None => {
                        left.insert(k, a);
                    }
                }
            }
            left
        });

    let mut out: Vec<(K, O)> = merged
        .into_par_iter()
        .map(|(k, a)| (k, comb.finish(a)))
        .collect();
    out.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    out
}

/// Combine every value into one output.
pub fn combine_globally<V, A, O, I, C>(values: I, comb: &C) -> O
where
    I: IntoIterator<Item = V>,
    C: CombineFn<V, A, O>,
{
    let mut acc = comb.create();
    for v in values {
        comb.add_input(&mut acc, v);
    }
    comb.finish(acc)
}
