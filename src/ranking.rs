use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One evaluated model: its performance score and the 1-based predictor
/// combination that produced it. Lower scores are better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCombination {
    pub score: f64,
    pub combination: Vec<u32>,
}

impl Eq for ScoredCombination {}

impl Ord for ScoredCombination {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.combination.cmp(&other.combination))
    }
}

impl PartialOrd for ScoredCombination {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded collection of the best candidates seen so far. A max-heap keeps
/// the current worst on top, so a full ranking rejects or replaces in
/// O(log capacity) per push.
#[derive(Debug)]
pub struct Ranking {
    heap: BinaryHeap<ScoredCombination>,
    capacity: usize,
}

impl Ranking {
    pub fn new(capacity: usize) -> Ranking {
        Ranking {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert while there is room, otherwise replace the worst element iff
    /// the candidate strictly beats it.
    pub fn push(&mut self, candidate: ScoredCombination) {
        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate.score < worst.score {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The highest-scored element currently retained.
    pub fn peek_worst(&self) -> Option<&ScoredCombination> {
        self.heap.peek()
    }

    /// Consume the ranking, ascending by score.
    pub fn into_sorted(self) -> Vec<ScoredCombination> {
        self.heap.into_sorted_vec()
    }
}

/// Merge per-worker rankings (each paired with the size of the batch it
/// scanned) into a single ranking of `capacity` elements.
///
/// A worker that scanned more combinations than it could retain has discarded
/// candidates, but everything it discarded scored no better than its current
/// worst element. The smallest such per-worker worst is therefore a safe
/// cutoff: any candidate above it is dominated by a full ranking's worth of
/// survivors and cannot belong to the global top. Workers whose batch fit
/// entirely in their ranking never discarded anything, so their worst says
/// nothing and is excluded from the cutoff.
pub fn merge(locals: Vec<(Ranking, u64)>, capacity: usize) -> Ranking {
    let topworst = locals
        .iter()
        .filter(|(_, batch_size)| *batch_size > capacity as u64)
        .filter_map(|(local, _)| local.peek_worst().map(|worst| worst.score))
        .fold(f64::INFINITY, f64::min);

    let mut merged = Ranking::new(capacity);
    for (local, _) in locals {
        for candidate in local.heap {
            if candidate.score <= topworst {
                merged.push(candidate);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scored(score: f64, combination: Vec<u32>) -> ScoredCombination {
        ScoredCombination { score, combination }
    }

    #[test]
    fn push_keeps_the_best_candidates() {
        let mut ranking = Ranking::new(3);
        for (i, score) in [5.0, 1.0, 4.0, 2.0, 3.0].into_iter().enumerate() {
            ranking.push(scored(score, vec![i as u32 + 1]));
        }
        assert_eq!(ranking.len(), 3);
        let sorted = ranking.into_sorted();
        let scores: Vec<f64> = sorted.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn full_ranking_rejects_ties_with_the_worst() {
        let mut ranking = Ranking::new(2);
        ranking.push(scored(1.0, vec![1]));
        ranking.push(scored(2.0, vec![2]));
        ranking.push(scored(2.0, vec![3])); // not strictly better
        let sorted = ranking.into_sorted();
        assert_eq!(sorted[1].combination, vec![2]);
    }

    #[test]
    fn merge_equals_single_ranking_replay() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for n_workers in [1usize, 2, 3, 8] {
            for capacity in [1usize, 5, 20] {
                let stream: Vec<f64> = (0..500).map(|_| rng.gen::<f64>()).collect();

                let mut replay = Ranking::new(capacity);
                for (i, &score) in stream.iter().enumerate() {
                    replay.push(scored(score, vec![i as u32]));
                }

                // Split the stream into uneven contiguous chunks, one per
                // worker, as the batch partitioner would
                let chunk = stream.len() / n_workers;
                let mut locals = Vec::new();
                for w in 0..n_workers {
                    let lo = w * chunk;
                    let hi = if w + 1 == n_workers {
                        stream.len()
                    } else {
                        lo + chunk
                    };
                    let mut local = Ranking::new(capacity);
                    for i in lo..hi {
                        local.push(scored(stream[i], vec![i as u32]));
                    }
                    locals.push((local, (hi - lo) as u64));
                }

                let merged = merge(locals, capacity);
                let merged_scores: Vec<f64> =
                    merged.into_sorted().iter().map(|s| s.score).collect();
                let replay_scores: Vec<f64> =
                    replay.into_sorted().iter().map(|s| s.score).collect();
                assert_eq!(merged_scores, replay_scores);
            }
        }
    }

    #[test]
    fn small_batches_do_not_tighten_the_cutoff() {
        // Worker A scanned far more than its capacity; worker B scanned only
        // two combinations, both bad. B's worst must not mask A-sized gaps.
        let capacity = 3;
        let mut a = Ranking::new(capacity);
        for (i, score) in [1.0, 2.0, 5.0, 7.0, 9.0].into_iter().enumerate() {
            a.push(scored(score, vec![10 + i as u32]));
        }
        let mut b = Ranking::new(capacity);
        b.push(scored(20.0, vec![1]));
        b.push(scored(30.0, vec![2]));

        let merged = merge(vec![(a, 5), (b, 2)], capacity);
        let scores: Vec<f64> = merged.into_sorted().iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![1.0, 2.0, 5.0]);
    }

    #[test]
    fn merge_admits_everything_when_no_worker_overflowed() {
        let capacity = 10;
        let mut a = Ranking::new(capacity);
        a.push(scored(3.0, vec![1]));
        let mut b = Ranking::new(capacity);
        b.push(scored(1.0, vec![2]));

        let merged = merge(vec![(a, 1), (b, 1)], capacity);
        assert_eq!(merged.len(), 2);
    }
}
