use std::cmp::Ordering;

use crate::Rank;

/// The share of the population replaced on every exploit/explore pass.
const TRUNCATION_DIVISOR: usize = 5;

/// Returns the amount of members exploited each generation: `ceil(0.2 * population_size)`.
pub fn truncation_size(population_size: usize) -> usize {
    population_size.div_ceil(TRUNCATION_DIVISOR)
}

/// Orders population indices from best to worst score.
///
/// Maximized scores are negated and every key is sorted ascending with a stable sort, so equal
/// scores keep their population order. NaN scores always come last.
pub fn rank_indices(scores: &[f64], rank: Rank) -> Vec<usize> {
    let keys: Vec<f64> = match rank {
        Rank::Maximize => scores.iter().map(|score| -score).collect(),
        Rank::Minimize => scores.to_vec(),
    };

    let mut indices: Vec<usize> = (0..keys.len()).collect();
    indices.sort_by(|&a, &b| compare_nan_last(keys[a], keys[b]));
    indices
}

fn compare_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximize_puts_highest_first() {
        let ranking = rank_indices(&[1.0, 5.0, 3.0, 2.0, 4.0], Rank::Maximize);
        assert_eq!(ranking, vec![1, 4, 2, 3, 0]);
    }

    #[test]
    fn minimize_puts_lowest_first() {
        let ranking = rank_indices(&[1.0, 5.0, 3.0, 2.0, 4.0], Rank::Minimize);
        assert_eq!(ranking, vec![0, 3, 2, 4, 1]);
    }

    #[test]
    fn ties_keep_population_order() {
        let ranking = rank_indices(&[2.0, 7.0, 2.0, 7.0, 0.0, -0.0], Rank::Maximize);
        assert_eq!(ranking, vec![1, 3, 0, 2, 4, 5]);

        let ranking = rank_indices(&[2.0, 7.0, 2.0, 7.0], Rank::Minimize);
        assert_eq!(ranking, vec![0, 2, 1, 3]);
    }

    #[test]
    fn nan_ranks_last_in_both_directions() {
        let scores = [f64::NAN, 1.0, 3.0];
        assert_eq!(rank_indices(&scores, Rank::Maximize), vec![2, 1, 0]);
        assert_eq!(rank_indices(&scores, Rank::Minimize), vec![1, 2, 0]);
    }

    #[test]
    fn truncation_rounds_up() {
        let sizes: Vec<usize> = [1, 4, 5, 6, 10, 11].map(truncation_size).to_vec();
        assert_eq!(sizes, vec![1, 1, 1, 2, 2, 3]);
    }
}
