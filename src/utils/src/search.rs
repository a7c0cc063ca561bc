//! Binary search over an implicit, monotonic sequence of slots.
//!
//! The sequence is never materialized: callers describe it with a `test` closure that
//! compares the search target against the element stored at a slot.

use std::cmp::Ordering;

/// binary_search finds `target` in the slots `[0, n)`.
///
/// `test(slot)` must return the ordering of the target relative to the element at `slot`
/// (`Less` when the target sorts before it), and must be monotonic over the slots.
///
/// Returns `Ok(slot)` with the lowest slot whose element equals the target, or
/// `Err(slot)` with the insertion point: the first slot whose element is greater than
/// the target. An empty range yields `Err(0)`.
pub fn binary_search<F>(n: usize, mut test: F) -> Result<usize, usize>
where
    F: FnMut(usize) -> Ordering,
{
    let mut lo = 0;
    let mut hi = n;
    let mut found = false;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match test(mid) {
            Ordering::Greater => lo = mid + 1,
            Ordering::Equal => {
                // keep looking left, ties resolve to the lowest slot
                found = true;
                hi = mid;
            }
            Ordering::Less => hi = mid,
        }
    }

    if found {
        Ok(lo)
    } else {
        Err(lo)
    }
}

/// result_to_index recovers the lower bound (first slot not less than the target) from a
/// `binary_search` result.
pub fn result_to_index(result: Result<usize, usize>) -> usize {
    match result {
        Ok(idx) | Err(idx) => idx,
    }
}

/// lower_bound returns the first slot in `[0, n)` whose element is not less than the
/// target, or `n` if there is none.
pub fn lower_bound<F>(n: usize, test: F) -> usize
where
    F: FnMut(usize) -> Ordering,
{
    result_to_index(binary_search(n, test))
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use crate::search::{binary_search, lower_bound, result_to_index};

    fn search_in(values: &[u64], target: u64) -> Result<usize, usize> {
        binary_search(values.len(), |i| target.cmp(&values[i]))
    }

    #[test]
    fn test_empty() {
        assert_eq!(search_in(&[], 5), Err(0));
        assert_eq!(result_to_index(search_in(&[], 5)), 0);
    }

    #[test]
    fn test_exact_and_missing() {
        let values = [10, 20, 30, 40];
        assert_eq!(search_in(&values, 30), Ok(2));
        assert_eq!(search_in(&values, 5), Err(0));
        assert_eq!(search_in(&values, 25), Err(2));
        assert_eq!(search_in(&values, 45), Err(4));
    }

    #[test]
    fn test_ties_resolve_to_lowest_slot() {
        let values = [1, 3, 3, 3, 3, 7];
        assert_eq!(search_in(&values, 3), Ok(1));

        let values = [2, 2, 2, 2];
        assert_eq!(search_in(&values, 2), Ok(0));
        assert_eq!(search_in(&values, 3), Err(4));
    }

    quickcheck! {
        fn prop_matches_partition_point(values: Vec<u64>, target: u64) -> bool {
            let mut values = values;
            values.sort();
            let idx = lower_bound(values.len(), |i| target.cmp(&values[i]));
            idx == values.partition_point(|v| *v < target)
        }

        fn prop_exact_match_is_lowest(values: Vec<u8>, pick: usize) -> bool {
            let mut values = values;
            values.sort();
            if values.is_empty() {
                return true;
            }
            let target = values[pick % values.len()];
            match binary_search(values.len(), |i| target.cmp(&values[i])) {
                Ok(idx) => values[idx] == target && (idx == 0 || values[idx - 1] < target),
                Err(_) => false,
            }
        }
    }
}
