//! Random train / held-out partition.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Share of rows held out for evaluation.
pub const TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct Split<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
}

/// Shuffle `rows` with a seeded RNG and hold out `ceil(test_fraction * n)` of them.
pub fn train_test_split<T: Clone>(rows: &[T], test_fraction: f64, seed: u64) -> Split<T> {
    let n = rows.len();
    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n);

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let (test_idx, train_idx) = order.split_at(n_test);
    Split {
        train: train_idx.iter().map(|&i| rows[i].clone()).collect(),
        test: test_idx.iter().map(|&i| rows[i].clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_ceil_of_test_fraction() {
        let rows: Vec<u32> = (0..11).collect();
        let split = train_test_split(&rows, TEST_FRACTION, 1);
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        let rows: Vec<u32> = (0..100).collect();
        let split = train_test_split(&rows, TEST_FRACTION, 42);
        let mut all: Vec<u32> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, rows);
    }

    #[test]
    fn seed_makes_it_reproducible() {
        let rows: Vec<u32> = (0..50).collect();
        assert_eq!(train_test_split(&rows, 0.2, 9), train_test_split(&rows, 0.2, 9));
        assert_ne!(train_test_split(&rows, 0.2, 9), train_test_split(&rows, 0.2, 10));
    }
}
