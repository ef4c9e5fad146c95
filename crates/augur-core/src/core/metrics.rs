//! Error metrics reported by the evaluation.

/// Mean absolute error between two equal-length sequences.
pub fn mae(reference: &[f64], predicted: &[f64]) -> f64 {
    assert_eq!(
        reference.len(),
        predicted.len(),
        "metric inputs must have equal length"
    );
    if reference.is_empty() {
        return 0.0;
    }
    let sum: f64 = reference
        .iter()
        .zip(predicted)
        .map(|(r, p)| (r - p).abs())
        .sum();
    sum / reference.len() as f64
}

/// Root-mean-square error between two equal-length sequences.
pub fn rmse(reference: &[f64], predicted: &[f64]) -> f64 {
    assert_eq!(
        reference.len(),
        predicted.len(),
        "metric inputs must have equal length"
    );
    if reference.is_empty() {
        return 0.0;
    }
    let sum: f64 = reference
        .iter()
        .zip(predicted)
        .map(|(r, p)| (r - p) * (r - p))
        .sum();
    (sum / reference.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn identical_sequences_have_zero_error() {
        let x = [1.0, -2.5, 3.25];
        assert_eq!(mae(&x, &x), 0.0);
        assert_eq!(rmse(&x, &x), 0.0);
    }

    #[test]
    fn known_residuals() {
        let reference = [0.0, 0.0, 0.0, 0.0];
        let predicted = [1.0, -1.0, 3.0, -3.0];
        assert!(f64_approx_equal(mae(&reference, &predicted), 2.0));
        assert!(f64_approx_equal(rmse(&reference, &predicted), 5.0f64.sqrt()));
    }

    #[test]
    fn rmse_dominates_mae() {
        let reference = [0.2, -1.4, 2.7, 5.0, -0.3];
        let predicted = [0.0, -1.0, 3.5, 4.2, 0.4];
        let mae = mae(&reference, &predicted);
        let rmse = rmse(&reference, &predicted);
        assert!(mae >= 0.0);
        assert!(rmse >= mae);
    }

    #[test]
    #[should_panic(expected = "equal length")]
    fn length_mismatch_panics() {
        mae(&[1.0], &[1.0, 2.0]);
    }
}
