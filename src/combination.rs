use crate::error::SearchError;

/// Binomial coefficient C(n, k) with 64-bit accumulators. Dividing inside the
/// product loop keeps every intermediate integral and small enough not to
/// overflow for any search size this crate can realistically enumerate.
pub fn n_over_k(n: u32, k: u32) -> u64 {
    if k == 0 {
        return 1;
    }
    if k > n {
        return 0;
    }

    // If k is larger than n-k it is cheaper to use n-k
    let k = if k > n / 2 { n - k } else { k };
    let mut count: u64 = 1;
    for i in 1..=k as u64 {
        count = count * (n as u64 - i + 1) / i;
    }
    count
}

/// Number of subsets of size 1..=k_max drawn from n candidates.
pub fn count_combinations(n: u32, k_max: u32) -> u64 {
    (1..=k_max).map(|k| n_over_k(n, k)).sum()
}

/// Advance `comb` to its successor in the canonical order: all length-1
/// tuples in lexicographic order, then all length-2 tuples, and so on.
/// The sentinel `[0]` advances to `[1]`, the true first combination.
///
/// The successor of the last length-k tuple is the first tuple of length
/// k + 1; callers bound the walk with a stop cursor (see [`CombinationSet`])
/// and must not step past the last combination of the maximal length.
pub fn next_combination(comb: &mut Vec<u32>, n: u32) {
    let k = comb.len();

    // Rightmost position that can still be incremented
    let mut pivot = k as i64 - 1;
    while pivot >= 0 && comb[pivot as usize] == n + 1 - k as u32 + pivot as u32 {
        pivot -= 1;
    }

    if pivot < 0 {
        // comb was the final tuple of this length; restart one longer
        comb.clear();
        comb.extend(1..=k as u32 + 1);
    } else {
        let p = pivot as usize;
        comb[p] += 1;
        for i in p + 1..k {
            comb[i] = comb[p] + (i - p) as u32;
        }
    }
}

/// The full enumeration setup for given `n` and `k_max`, partitioned into up
/// to `n_batches` contiguous ranges of approximately equal size.
///
/// Batch `b` is delimited by `batch_limits[b]` (exclusive start cursor; the
/// first one is the sentinel `[0]`) and `batch_limits[b + 1]` (inclusive
/// stop). Walking every batch in order with [`next_combination`] visits every
/// combination exactly once, and `batch_sizes[b]` counts the combinations of
/// batch `b`. The realized number of batches may be smaller than requested.
#[derive(Debug, Clone)]
pub struct CombinationSet {
    n: u32,
    k_max: u32,
    n_combinations: u64,
    batch_limits: Vec<Vec<u32>>,
    batch_sizes: Vec<u64>,
}

impl CombinationSet {
    pub fn new(n: u32, k_max: u32, n_batches: usize) -> Result<CombinationSet, SearchError> {
        if n == 0 {
            return Err(SearchError::Config(
                "there must be at least one candidate predictor".to_string(),
            ));
        }
        if k_max == 0 || k_max > n {
            return Err(SearchError::Config(format!(
                "kmax must lie in 1..={}, got {}",
                n, k_max
            )));
        }
        if n_batches == 0 {
            return Err(SearchError::Config(
                "at least one batch is required".to_string(),
            ));
        }

        let n_combinations = count_combinations(n, k_max);

        // Target batch size, shrunk by one when the rounding would otherwise
        // leave nothing for the final batch
        let mut target = n_combinations.div_ceil(n_batches as u64);
        if target > 1 && target * (n_batches as u64 - 1) >= n_combinations {
            target -= 1;
        }

        // Initial limit is the sentinel "[0]": evaluation calls
        // next_combination() first, which turns it into the true first
        // element "[1]"
        let mut batch_limits: Vec<Vec<u32>> = vec![vec![0]];
        let mut batch_sizes: Vec<u64> = Vec::new();

        // Batches are delimited by walking the leading digit: moving it to
        // `first_digit` within length `cur_k` accounts for all
        // C(n - first_digit, cur_k - 1) combinations sharing that prefix.
        let mut first_digit: u32 = 0;
        let mut cur_k: u32 = 1;
        for b in 0..n_batches {
            if b + 1 == n_batches {
                // Final slot takes the whole remainder of the enumeration
                let assigned: u64 = batch_sizes.iter().sum();
                batch_limits.push((n - k_max + 1..=n).collect());
                batch_sizes.push(n_combinations - assigned);
                break;
            }

            let mut cur_size: u64 = 0;
            while cur_size < target {
                if first_digit < n - cur_k + 1 {
                    first_digit += 1;
                } else if cur_k < k_max {
                    // Start with the next larger set of combinations
                    cur_k += 1;
                    first_digit = 1;
                } else {
                    break; // Last combination reached
                }
                cur_size += n_over_k(n - first_digit, cur_k - 1);
            }

            batch_limits.push((first_digit..first_digit + cur_k).collect());
            batch_sizes.push(cur_size);

            // If all combinations are partitioned, stop with fewer batches
            if cur_k == k_max && first_digit == n - cur_k + 1 {
                break;
            }
        }

        Ok(CombinationSet {
            n,
            k_max,
            n_combinations,
            batch_limits,
            batch_sizes,
        })
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn k_max(&self) -> u32 {
        self.k_max
    }

    pub fn n_combinations(&self) -> u64 {
        self.n_combinations
    }

    pub fn n_batches(&self) -> usize {
        self.batch_sizes.len()
    }

    /// `n_batches() + 1` cursors; batch `b` runs from `batch_limits()[b]`
    /// (exclusive) to `batch_limits()[b + 1]` (inclusive).
    pub fn batch_limits(&self) -> &[Vec<u32>] {
        &self.batch_limits
    }

    pub fn batch_sizes(&self) -> &[u64] {
        &self.batch_sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk the full enumeration from the sentinel to the last combination.
    fn enumerate_all(n: u32, k_max: u32) -> Vec<Vec<u32>> {
        let last: Vec<u32> = (n - k_max + 1..=n).collect();
        let mut cursor = vec![0];
        let mut seen = Vec::new();
        while cursor != last {
            next_combination(&mut cursor, n);
            seen.push(cursor.clone());
        }
        seen
    }

    #[test]
    fn n_over_k_reference_values() {
        assert_eq!(n_over_k(5, 0), 1);
        assert_eq!(n_over_k(5, 6), 0);
        assert_eq!(n_over_k(5, 5), 1);
        assert_eq!(n_over_k(6, 2), 15);
        assert_eq!(n_over_k(20, 10), 184_756);
        assert_eq!(n_over_k(64, 32), 1_832_624_140_942_590_534);
    }

    #[test]
    fn count_combinations_matches_powerset_minus_one() {
        // Sum over all lengths 1..=n is 2^n - 1
        for n in 1..=16u32 {
            assert_eq!(count_combinations(n, n), (1u64 << n) - 1);
        }
        assert_eq!(count_combinations(4, 2), 10);
        assert_eq!(count_combinations(10, 3), 10 + 45 + 120);
    }

    #[test]
    fn enumeration_is_complete_and_canonically_ordered() {
        for n in 1..=10u32 {
            for k_max in 1..=n {
                let seen = enumerate_all(n, k_max);
                assert_eq!(
                    seen.len() as u64,
                    count_combinations(n, k_max),
                    "count mismatch for n={} k_max={}",
                    n,
                    k_max
                );
                for comb in &seen {
                    assert!(comb.windows(2).all(|w| w[0] < w[1]));
                    assert!(*comb.last().unwrap() <= n);
                    assert!(comb[0] >= 1);
                }
                for pair in seen.windows(2) {
                    // Length-then-lex order
                    assert!(
                        pair[0].len() < pair[1].len()
                            || (pair[0].len() == pair[1].len() && pair[0] < pair[1])
                    );
                }
            }
        }
    }

    #[test]
    fn sentinel_advances_to_first_combination() {
        let mut cursor = vec![0];
        next_combination(&mut cursor, 7);
        assert_eq!(cursor, vec![1]);
    }

    #[test]
    fn next_combination_grows_length_after_last_tuple() {
        let mut cursor = vec![5, 6, 7];
        next_combination(&mut cursor, 7);
        assert_eq!(cursor, vec![1, 2, 3, 4]);
    }

    #[test]
    fn batches_partition_the_enumeration() {
        for n in [4u32, 7, 11, 15] {
            for k_max in 1..=n.min(6) {
                for n_batches in [1usize, 2, 3, 5, 8, 16, 32] {
                    let set = CombinationSet::new(n, k_max, n_batches).unwrap();
                    assert!(set.n_batches() <= n_batches);
                    assert_eq!(set.batch_limits().len(), set.n_batches() + 1);
                    assert_eq!(
                        set.batch_sizes().iter().sum::<u64>(),
                        set.n_combinations(),
                        "sizes must cover the whole enumeration (n={} k={} b={})",
                        n,
                        k_max,
                        n_batches
                    );

                    // Walking every batch start-to-stop reproduces the
                    // unbatched enumeration
                    let mut walked = Vec::new();
                    for b in 0..set.n_batches() {
                        let mut cursor = set.batch_limits()[b].clone();
                        let stop = &set.batch_limits()[b + 1];
                        let mut steps = 0u64;
                        while &cursor != stop {
                            next_combination(&mut cursor, n);
                            walked.push(cursor.clone());
                            steps += 1;
                        }
                        assert_eq!(
                            steps,
                            set.batch_sizes()[b],
                            "batch {} size mismatch (n={} k={} b={})",
                            b,
                            n,
                            k_max,
                            n_batches
                        );
                    }
                    assert_eq!(walked, enumerate_all(n, k_max));

                    // Stop cursors double as the next batch's start
                    assert_eq!(set.batch_limits()[0], vec![0]);
                    let last: Vec<u32> = (n - k_max + 1..=n).collect();
                    assert_eq!(*set.batch_limits().last().unwrap(), last);
                }
            }
        }
    }

    #[test]
    fn more_batches_than_combinations_realizes_fewer() {
        // 3 combinations cannot fill 8 batches
        let set = CombinationSet::new(3, 1, 8).unwrap();
        assert!(set.n_batches() <= 3);
        assert_eq!(set.batch_sizes().iter().sum::<u64>(), 3);
        assert!(set.batch_sizes().iter().all(|&s| s > 0));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(CombinationSet::new(0, 1, 1).is_err());
        assert!(CombinationSet::new(5, 0, 1).is_err());
        assert!(CombinationSet::new(5, 6, 1).is_err());
        assert!(CombinationSet::new(5, 2, 0).is_err());
    }
}
