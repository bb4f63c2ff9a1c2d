//! Median/MAD robust standardization

/// Scales MAD to a consistent estimator of σ under normality
pub const MAD_SCALE: f64 = 1.4826;

/// Lower bound substituted for a degenerate MAD.
///
/// A near-constant tier still gets distinct z-scores in raw-score order instead
/// of collapsing to zero.
pub const MIN_MAD: f64 = 1e-9;

/// Median of finite values; mean of the middle pair for even counts
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Median absolute deviation around `center`
pub fn mad(values: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// MAD actually used as the divisor: the floor replaces tiny or non-finite values
pub fn effective_mad(raw: f64) -> f64 {
    if raw.is_finite() && raw >= MIN_MAD {
        raw
    } else {
        MIN_MAD
    }
}

/// `(x - median) / (1.4826 * max(MAD, MIN_MAD))` for each value
pub fn robust_zscores(values: &[f64]) -> Vec<f64> {
    let Some(center) = median(values) else {
        return Vec::new();
    };
    let spread = effective_mad(mad(values, center).unwrap_or(f64::NAN));
    values
        .iter()
        .map(|v| (v - center) / (MAD_SCALE * spread))
        .collect()
}
