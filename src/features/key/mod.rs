//! Key detection modules
//!
//! Detect musical key using:
//! - Krumhansl-Kessler templates (24 keys)
//! - Template matching against a duration-weighted pitch-class histogram

pub mod detector;
pub mod templates;

pub use detector::{detect_key, detect_key_from_segments, pitch_class_histogram};
pub use templates::KeyTemplates;

use crate::theory::Scale;

/// Key detection result
#[derive(Debug, Clone)]
pub struct KeyDetectionResult {
    /// Key name (e.g. "C", "Eb", "F#")
    pub key: String,

    /// Tonic pitch class (0 = C ... 11 = B)
    pub root: usize,

    /// Detected scale
    pub scale: Scale,

    /// Normalised margin over the runner-up (0.0-1.0)
    pub confidence: f32,

    /// All 24 key scores as (root, scale, score), highest first
    pub all_scores: Vec<(usize, Scale, f32)>,
}
