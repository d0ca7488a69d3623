//! Key detection algorithm
//!
//! Builds a duration-weighted pitch-class histogram from voiced segments and
//! scores it against all 24 Krumhansl-Kessler templates by dot product.
//!
//! # Reference
//!
//! Krumhansl, C. L., & Kessler, E. J. (1982). Tracing the Dynamic Changes in Perceived
//! Tonal Organization in a Spatial Representation of Musical Keys. *Psychological Review*,
//! 89(4), 334-368.

use super::{templates::KeyTemplates, KeyDetectionResult};
use crate::analysis::result::Segment;
use crate::theory::{pitch_class, Scale, KEY_NAMES};

/// Duration-weighted pitch-class histogram of the voiced segments
pub fn pitch_class_histogram(segments: &[Segment]) -> [f32; 12] {
    let mut histogram = [0.0f32; 12];
    for segment in segments {
        if segment.is_rest {
            continue;
        }
        if let Some(midi) = segment.midi {
            if segment.duration_sec.is_finite() && segment.duration_sec > 0.0 {
                histogram[pitch_class(midi)] += segment.duration_sec as f32;
            }
        }
    }
    histogram
}

/// Detect the key of a pitch-class histogram
///
/// Roots are visited C..B, major before minor; a later key must score
/// strictly higher to win, so an empty histogram resolves to C major.
///
/// # Returns
///
/// Key detection result with the best key, a confidence equal to the
/// normalised margin over the runner-up, and all 24 scores ranked.
///
/// # Example
///
/// ```
/// use whistle_dsp::features::key::{detect_key, KeyTemplates};
/// use whistle_dsp::theory::Scale;
///
/// let mut histogram = [0.0f32; 12];
/// histogram[0] = 1.0;
/// histogram[4] = 1.0;
/// histogram[7] = 1.0;
/// let result = detect_key(&histogram, &KeyTemplates::new());
/// assert_eq!(result.key, "C");
/// assert_eq!(result.scale, Scale::Major);
/// ```
pub fn detect_key(histogram: &[f32; 12], templates: &KeyTemplates) -> KeyDetectionResult {
    let mut scores: Vec<(usize, Scale, f32)> = Vec::with_capacity(24);
    let mut best = (0usize, Scale::Major, f32::NEG_INFINITY);

    for root in 0..12 {
        for scale in [Scale::Major, Scale::Minor] {
            let template = templates.get(root, scale);
            let score: f32 = histogram
                .iter()
                .zip(template.iter())
                .map(|(h, t)| h * t)
                .sum();
            if score > best.2 {
                best = (root, scale, score);
            }
            scores.push((root, scale, score));
        }
    }

    let (root, scale, best_score) = best;
    let runner_up = scores
        .iter()
        .filter(|(r, s, _)| !(*r == root && *s == scale))
        .map(|(_, _, score)| *score)
        .fold(f32::NEG_INFINITY, f32::max);
    let confidence = if best_score > 0.0 && runner_up.is_finite() {
        ((best_score - runner_up) / best_score).clamp(0.0, 1.0)
    } else {
        0.0
    };

    scores.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    log::debug!(
        "Detected key {} {} (score {:.3}, confidence {:.3})",
        KEY_NAMES[root],
        scale.name(),
        best_score,
        confidence
    );

    KeyDetectionResult {
        key: KEY_NAMES[root].to_string(),
        root,
        scale,
        confidence,
        all_scores: scores,
    }
}

/// Detect the key of a segment sequence
pub fn detect_key_from_segments(segments: &[Segment], templates: &KeyTemplates) -> KeyDetectionResult {
    detect_key(&pitch_class_histogram(segments), templates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_major_triad() {
        let mut histogram = [0.0f32; 12];
        for pc in [0, 4, 7] {
            histogram[pc] = 2.0;
        }
        let result = detect_key(&histogram, &KeyTemplates::new());
        assert_eq!(result.key, "C");
        assert_eq!(result.scale, Scale::Major);
        assert!(result.confidence > 0.0);
        assert_eq!(result.all_scores.len(), 24);
        assert_eq!(result.all_scores[0].0, 0);
    }

    #[test]
    fn test_single_pitch_class_is_tonic() {
        let mut histogram = [0.0f32; 12];
        histogram[9] = 1.0;
        let result = detect_key(&histogram, &KeyTemplates::new());
        assert_eq!(result.key, "A");
        assert_eq!(result.root, 9);
    }

    #[test]
    fn test_a_minor_melody() {
        // A C E with G, F and D as passing tones
        let mut histogram = [0.0f32; 12];
        histogram[9] = 4.0;
        histogram[0] = 2.0;
        histogram[4] = 2.5;
        histogram[7] = 0.5;
        histogram[5] = 1.0;
        histogram[2] = 0.5;
        let result = detect_key(&histogram, &KeyTemplates::new());
        assert_eq!(result.key, "A");
        assert_eq!(result.scale, Scale::Minor);
    }

    #[test]
    fn test_empty_histogram_defaults_to_c_major() {
        let result = detect_key(&[0.0; 12], &KeyTemplates::new());
        assert_eq!(result.key, "C");
        assert_eq!(result.scale, Scale::Major);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_histogram_ignores_rests() {
        let segments = vec![
            Segment::voiced(0.0, 0.5, 60.0),
            Segment::rest(0.5, 2.0),
            Segment::voiced(2.5, 0.25, 72.0),
            Segment::voiced(2.75, 0.25, 67.0),
        ];
        let histogram = pitch_class_histogram(&segments);
        assert!((histogram[0] - 0.75).abs() < 1e-6);
        assert!((histogram[7] - 0.25).abs() < 1e-6);
        assert_eq!(histogram.iter().sum::<f32>(), 1.0);
    }
}
