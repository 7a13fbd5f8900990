//! Gini coefficient
//!
//! Concentration measure over non-negative magnitudes, used for the
//! Geographic Concentration Index.

/// Compute the Gini coefficient of `values`.
///
/// Zero and negative entries are discarded. With fewer than two positive
/// entries the result is 0.0.
///
/// Uses `(2 * Σ(i * x_i)) / (n * Σx) - (n + 1) / n` over the ascending
/// sorted values with 1-based ranks, clamped to [0, 1].
pub fn gini(values: &[f64]) -> f64 {
    let mut positive: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();

    if positive.len() < 2 {
        return 0.0;
    }

    positive.sort_by(|a, b| a.total_cmp(b));

    let n = positive.len() as f64;
    let total: f64 = positive.iter().sum();
    let weighted: f64 = positive
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64 + 1.0) * v)
        .sum();

    let coefficient = (2.0 * weighted) / (n * total) - (n + 1.0) / n;
    coefficient.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_single() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[42.0]), 0.0);
        assert_eq!(gini(&[0.0, 0.0, 42.0]), 0.0);
    }

    #[test]
    fn test_equal_values() {
        assert!(gini(&[5.0, 5.0, 5.0, 5.0]).abs() < 1e-12);
    }

    #[test]
    fn test_negative_entries_discarded() {
        assert_eq!(gini(&[-10.0, 3.0]), 0.0);
        assert!((gini(&[-10.0, 3.0, 3.0])).abs() < 1e-12);
    }

    #[test]
    fn test_known_value() {
        // Sorted [1, 2, 3, 4]: 2 * 30 / (4 * 10) - 5 / 4 = 0.25
        assert!((gini(&[4.0, 1.0, 3.0, 2.0]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_max_concentration_approaches_one() {
        let mut values = vec![1e-9; 999];
        values.push(1e9);
        let g = gini(&values);
        // Upper bound for n values is (n - 1) / n
        assert!(g > 0.99, "gini was {}", g);
        assert!(g <= 1.0);
    }

    #[test]
    fn test_order_independent() {
        let a = gini(&[10.0, 200.0, 35.0, 7.0]);
        let b = gini(&[7.0, 35.0, 200.0, 10.0]);
        assert_eq!(a, b);
    }
}
