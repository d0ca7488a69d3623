//! Order statistics used by the adaptive thresholds and smoothing filters

use std::cmp::Ordering;

fn sorted_finite(values: &[f32]) -> Vec<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Median of the finite values (0.0 if there are none)
pub fn median(values: &[f32]) -> f32 {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

/// Percentile with linear interpolation between ranks
///
/// # Arguments
///
/// * `values` - Input values (non-finite values are ignored)
/// * `p` - Percentile in [0.0, 1.0] (e.g. 0.9 for the 90th percentile)
///
/// # Returns
///
/// The interpolated percentile, or 0.0 for empty input
pub fn percentile(values: &[f32], p: f32) -> f32 {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let rank = p * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[f32::NAN, 5.0]), 5.0);
    }

    #[test]
    fn test_percentile() {
        let values: Vec<f32> = (0..=10).map(|i| i as f32).collect();
        assert_eq!(percentile(&values, 0.0), 0.0);
        assert_eq!(percentile(&values, 1.0), 10.0);
        assert!((percentile(&values, 0.9) - 9.0).abs() < 1e-4);
        assert!((percentile(&values, 0.25) - 2.5).abs() < 1e-6);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }
}
