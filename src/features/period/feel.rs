//! Duplet vs. triplet feel classification
//!
//! Inter-onset intervals (IOIs) are expressed in beats and quantized against
//! duple subdivisions of the beat {1, 2, 4, 8} and triplet subdivisions
//! {3, 6, 12}. If the median triplet error undercuts the median duple error by
//! more than a fixed margin, the material is played with a triplet feel.

use crate::features::stats::median;

/// Shortest IOI considered (seconds)
const MIN_IOI_SEC: f64 = 0.04;

/// Longest IOI considered (seconds)
const MAX_IOI_SEC: f64 = 1.5;

/// Minimum number of usable IOIs
const MIN_INTERVALS: usize = 4;

/// Required advantage of the triplet grid, in beats
const TRIPLET_MARGIN: f32 = 0.03;

const DUPLE_DIVISIONS: [f64; 4] = [1.0, 2.0, 4.0, 8.0];
const TRIPLET_DIVISIONS: [f64; 3] = [3.0, 6.0, 12.0];

/// Feel classification with its evidence
#[derive(Debug, Clone, PartialEq)]
pub struct FeelEstimate {
    /// Whether a triplet grid fits better
    pub triplet: bool,
    /// Median quantization error against duple divisions (beats)
    pub duple_error: f32,
    /// Median quantization error against triplet divisions (beats)
    pub triplet_error: f32,
    /// Number of IOIs used
    pub intervals: usize,
}

/// Smallest distance from `beats` to a multiple of `1/d` for any division `d`
fn grid_error(beats: f64, divisions: &[f64]) -> f32 {
    divisions
        .iter()
        .map(|&d| (beats - (beats * d).round() / d).abs())
        .fold(f64::INFINITY, f64::min) as f32
}

/// Classify the rhythmic feel of a set of onsets
///
/// # Arguments
///
/// * `onsets` - Onset times in seconds, ascending
/// * `bpm` - Tempo used to express intervals in beats
///
/// # Returns
///
/// A straight (duple) estimate when there are too few usable intervals or the
/// tempo is unusable.
pub fn detect_triplet_feel(onsets: &[f64], bpm: f64) -> FeelEstimate {
    let mut estimate = FeelEstimate {
        triplet: false,
        duple_error: 0.0,
        triplet_error: 0.0,
        intervals: 0,
    };
    if !(bpm > 0.0) || !bpm.is_finite() {
        return estimate;
    }
    let sec_per_beat = 60.0 / bpm;

    let beats: Vec<f64> = onsets
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&ioi| (MIN_IOI_SEC..=MAX_IOI_SEC).contains(&ioi))
        .map(|ioi| ioi / sec_per_beat)
        .collect();
    estimate.intervals = beats.len();
    if beats.len() < MIN_INTERVALS {
        return estimate;
    }

    let duple: Vec<f32> = beats.iter().map(|&b| grid_error(b, &DUPLE_DIVISIONS)).collect();
    let triplet: Vec<f32> = beats.iter().map(|&b| grid_error(b, &TRIPLET_DIVISIONS)).collect();
    estimate.duple_error = median(&duple);
    estimate.triplet_error = median(&triplet);
    estimate.triplet = estimate.duple_error - estimate.triplet_error > TRIPLET_MARGIN;

    log::debug!(
        "Feel: {} IOIs, duple error {:.4}, triplet error {:.4} -> {}",
        estimate.intervals,
        estimate.duple_error,
        estimate.triplet_error,
        if estimate.triplet { "triplet" } else { "straight" }
    );
    estimate
}
