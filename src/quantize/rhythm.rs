//! Duration quantization
//!
//! Raw beat durations are rounded to the nearest multiple of the grid unit.
//! The rounding residual of each value is carried into the next one
//! (error-feedback quantization), so the cumulative position of every note
//! stays within half a grid unit of its true position. A value that rounds
//! to zero becomes a quarter of the grid unit.

use crate::analysis::result::Segment;

/// Grid unit used when the requested one is unusable
const FALLBACK_UNIT: f64 = 1.0;

/// Convert seconds to beats at `bpm`
pub fn seconds_to_beats(seconds: f64, bpm: f64) -> f64 {
    if !seconds.is_finite() || !bpm.is_finite() || bpm <= 0.0 {
        return 0.0;
    }
    seconds * bpm / 60.0
}

/// Quantize raw beat durations to a grid with carry-over error correction
///
/// # Arguments
///
/// * `raw_beats` - Unquantized durations in beats
/// * `unit` - Grid unit in beats (non-positive or non-finite falls back to 1.0)
///
/// # Returns
///
/// One quantized value per input, each a multiple of `unit` or exactly `unit / 4`
///
/// # Example
///
/// ```
/// use whistle_dsp::quantize::quantize_beats;
///
/// // The first value borrows from the second, which floors to a quarter unit
/// let q = quantize_beats(&[0.3, 0.3, 0.4], 0.5);
/// assert_eq!(q, vec![0.5, 0.125, 0.5]);
/// ```
pub fn quantize_beats(raw_beats: &[f64], unit: f64) -> Vec<f64> {
    let unit = if unit.is_finite() && unit > 0.0 {
        unit
    } else {
        FALLBACK_UNIT
    };
    let floor = unit / 4.0;

    let mut carry = 0.0;
    raw_beats
        .iter()
        .map(|&raw| {
            let raw = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
            let adjusted = raw + carry;
            let steps = (adjusted / unit).round();
            let quantized = if steps >= 1.0 { steps * unit } else { floor };
            carry = adjusted - quantized;
            quantized
        })
        .collect()
}

/// Round a duration to the nearest grid multiple, never below one unit
///
/// Used for generated material, where a zero-length cell is never wanted.
pub fn snap_to_grid(beats: f64, unit: f64) -> f64 {
    let unit = if unit.is_finite() && unit > 0.0 {
        unit
    } else {
        FALLBACK_UNIT
    };
    if !beats.is_finite() {
        return unit;
    }
    ((beats / unit).round() * unit).max(unit)
}

/// Fill in `beats` for every segment
///
/// # Returns
///
/// Total quantized beats
pub fn quantize_segments(segments: &mut [Segment], bpm: f64, unit: f64) -> f64 {
    let raw: Vec<f64> = segments
        .iter()
        .map(|s| seconds_to_beats(s.duration_sec, bpm))
        .collect();
    let quantized = quantize_beats(&raw, unit);
    for (segment, beats) in segments.iter_mut().zip(quantized.iter()) {
        segment.beats = *beats;
    }
    let total: f64 = quantized.iter().sum();
    log::debug!(
        "Quantized {} segments at {:.1} BPM (unit {:.4}): {:.3} beats",
        segments.len(),
        bpm,
        unit,
        total
    );
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_multiple(value: f64, unit: f64) -> bool {
        let steps = value / unit;
        (steps - steps.round()).abs() < 1e-6
    }

    #[test]
    fn test_exact_values_pass_through() {
        assert_eq!(quantize_beats(&[1.0, 0.5, 2.0], 0.5), vec![1.0, 0.5, 2.0]);
    }

    #[test]
    fn test_carry_prevents_drift() {
        // Ten notes of 0.6 beats: 6 beats in total
        let q = quantize_beats(&[0.6; 10], 0.5);
        let total: f64 = q.iter().sum();
        assert!((total - 6.0).abs() <= 0.25 + 1e-9, "Total {}", total);
        assert!(q.iter().all(|&b| is_multiple(b, 0.5)));
    }

    #[test]
    fn test_zero_floors_to_quarter_unit() {
        let q = quantize_beats(&[0.01], 0.5);
        assert_eq!(q, vec![0.125]);
    }

    #[test]
    fn test_invalid_unit_falls_back() {
        assert_eq!(quantize_beats(&[1.2], 0.0), vec![1.0]);
        assert_eq!(quantize_beats(&[1.2], f64::NAN), vec![1.0]);
    }

    #[test]
    fn test_triplet_unit() {
        let unit = 0.5 * 2.0 / 3.0;
        let q = quantize_beats(&[0.35, 0.3, 0.7], unit);
        assert!(q.iter().all(|&b| b >= unit / 4.0 && is_multiple(b, unit)));
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(0.1, 0.5), 0.5);
        assert_eq!(snap_to_grid(1.3, 0.5), 1.5);
        assert_eq!(snap_to_grid(1.2, 0.5), 1.0);
        assert_eq!(snap_to_grid(f64::NAN, 0.25), 0.25);
    }

    #[test]
    fn test_quantize_segments() {
        let mut segments = vec![Segment::voiced(0.0, 0.5, 60.0), Segment::rest(0.5, 0.25)];
        let total = quantize_segments(&mut segments, 120.0, 0.5);
        assert_eq!(segments[0].beats, 1.0);
        assert_eq!(segments[1].beats, 0.5);
        assert_eq!(total, 1.5);
    }

    #[test]
    fn test_seconds_to_beats_guards() {
        assert_eq!(seconds_to_beats(1.0, 120.0), 2.0);
        assert_eq!(seconds_to_beats(1.0, 0.0), 0.0);
        assert_eq!(seconds_to_beats(f64::NAN, 120.0), 0.0);
    }
}
