//! Sorted merge of two position-sorted sequences.
//!
//! The comparator returns `Less` if the query lies before the target, `Greater` if it
//! lies after it and `Equal` for a match.  Both inputs must be sorted ascending; use
//! [`check_sorted`] to verify this where the input is not sorted by construction.

use std::cmp::Ordering;

use crate::err::AnnoError;

/// Fail with `PreconditionViolation` unless `items` is ascending by `key`.
pub fn check_sorted<T, K, F>(items: &[T], what: &str, key: F) -> Result<(), AnnoError>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    for (i, (prev, next)) in items.iter().zip(items.iter().skip(1)).enumerate() {
        if key(prev) > key(next) {
            return Err(AnnoError::PreconditionViolation {
                what: what.to_string(),
                index: i + 1,
            });
        }
    }
    Ok(())
}

/// Compare two closed intervals: before, after or overlapping.
pub fn cmp_interval(query: (i32, i32), target: (i32, i32)) -> Ordering {
    if query.1 < target.0 {
        Ordering::Less
    } else if query.0 > target.1 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Whether `target` covers at least `min_fraction` of `query`.
pub fn passes_min_overlap(query: (i32, i32), target: (i32, i32), min_fraction: f64) -> bool {
    let overlap = crate::common::overlap_len(query, target);
    let len = query.1 - query.0 + 1;
    overlap > 0 && len > 0 && overlap as f64 / len as f64 >= min_fraction
}

/// All `(query index, target index)` pairs comparing `Equal`.
///
/// Queries must be sorted by start, targets by start.  A query stays fixed while all
/// targets from the current cursor on are scanned until one lies after it; targets
/// ending before the current query are dropped for good.
pub fn merge_overlapping<A, B, F>(queries: &[A], targets: &[B], cmp: F) -> Vec<(usize, usize)>
where
    F: Fn(&A, &B) -> Ordering,
{
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < queries.len() && j < targets.len() {
        match cmp(&queries[i], &targets[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                for (k, target) in targets.iter().enumerate().skip(j) {
                    match cmp(&queries[i], target) {
                        Ordering::Less => break,
                        Ordering::Greater => (),
                        Ordering::Equal => result.push((i, k)),
                    }
                }
                i += 1;
            }
        }
    }
    result
}

/// Exact matches against a streamed target sequence.
///
/// Each query matches at most one target; the stream is only advanced when the current
/// target lies before the current query.
pub fn merge_exact<A, B, E, I, F>(
    queries: &[A],
    targets: I,
    cmp: F,
) -> Result<Vec<(usize, B)>, E>
where
    B: Clone,
    I: IntoIterator<Item = Result<B, E>>,
    F: Fn(&A, &B) -> Ordering,
{
    let mut targets = targets.into_iter();
    let mut current = targets.next().transpose()?;
    let mut result = Vec::new();
    let mut i = 0;
    while let (Some(query), Some(target)) = (queries.get(i), current.as_ref()) {
        match cmp(query, target) {
            Ordering::Less => i += 1,
            Ordering::Greater => current = targets.next().transpose()?,
            Ordering::Equal => {
                result.push((i, target.clone()));
                i += 1;
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use std::{cmp::Ordering, convert::Infallible};

    use pretty_assertions::assert_eq;

    use super::{cmp_interval, merge_exact, merge_overlapping};
    use crate::err::AnnoError;

    fn brute_force(queries: &[(i32, i32)], targets: &[(i32, i32)]) -> Vec<(usize, usize)> {
        let mut result = Vec::new();
        for (i, q) in queries.iter().enumerate() {
            for (j, t) in targets.iter().enumerate() {
                if cmp_interval(*q, *t) == Ordering::Equal {
                    result.push((i, j));
                }
            }
        }
        result
    }

    fn random_intervals(rng: &mut fastrand::Rng, count: usize, max_len: i32) -> Vec<(i32, i32)> {
        let mut result = (0..count)
            .map(|_| {
                let start = rng.i32(1..1_000);
                (start, start + rng.i32(0..max_len))
            })
            .collect::<Vec<_>>();
        result.sort();
        result
    }

    #[test]
    fn merge_overlapping_equals_brute_force() {
        let mut rng = fastrand::Rng::with_seed(13);
        for _ in 0..200 {
            let (num_queries, num_targets) = (rng.usize(0..30), rng.usize(0..30));
            let queries = random_intervals(&mut rng, num_queries, 20);
            let targets = random_intervals(&mut rng, num_targets, 200);
            let merged = merge_overlapping(&queries, &targets, |q, t| cmp_interval(*q, *t));
            assert_eq!(merged, brute_force(&queries, &targets));
        }
    }

    #[test]
    fn merge_overlapping_bins() {
        let variants = vec![(5, 5), (12, 25), (40, 40)];
        let bins = vec![(1, 10), (11, 20), (21, 30)];
        let merged = merge_overlapping(&variants, &bins, |q, t| cmp_interval(*q, *t));
        assert_eq!(merged, vec![(0, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn merge_exact_stream() -> Result<(), anyhow::Error> {
        let queries = vec![(1, "A"), (3, "C"), (3, "G"), (7, "T")];
        let targets = vec![(1, "A"), (2, "A"), (3, "G"), (7, "A"), (9, "C")];
        let merged = merge_exact(
            &queries,
            targets.into_iter().map(Ok::<_, Infallible>),
            |q, t| q.cmp(t),
        )?;
        assert_eq!(merged, vec![(0, (1, "A")), (2, (3, "G"))]);

        Ok(())
    }

    #[test]
    fn merge_exact_propagates_error() {
        let queries = vec![1, 2, 3];
        let targets: Vec<Result<i32, String>> = vec![Ok(1), Err("broken".into()), Ok(3)];
        let res = merge_exact(&queries, targets, |q, t| q.cmp(t));
        assert_eq!(res, Err("broken".to_string()));
    }

    #[test]
    fn check_sorted() {
        assert!(super::check_sorted(&[1, 2, 2, 5], "x", |v| *v).is_ok());
        assert_eq!(
            super::check_sorted(&[1, 3, 2], "variants", |v| *v),
            Err(AnnoError::PreconditionViolation {
                what: "variants".into(),
                index: 2
            })
        );
    }

    #[rstest::rstest]
    #[case((10, 19), (15, 100), 0.5, true)]
    #[case((10, 19), (15, 100), 0.6, false)]
    #[case((10, 10), (1, 100), 1.0, true)]
    #[case((10, 19), (20, 100), 0.0, false)]
    fn passes_min_overlap(
        #[case] query: (i32, i32),
        #[case] target: (i32, i32),
        #[case] min_fraction: f64,
        #[case] expected: bool,
    ) {
        assert_eq!(super::passes_min_overlap(query, target, min_fraction), expected);
    }
}
