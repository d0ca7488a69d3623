//! Period estimation modules
//!
//! Convert the energy-flux onset function to a tempo and a rhythmic feel:
//! - Autocorrelation tempo estimation
//! - Duplet/triplet feel classification

pub mod autocorrelation;
pub mod feel;

pub use autocorrelation::{estimate_bpm_from_flux, fold_bpm};
pub use feel::{detect_triplet_feel, FeelEstimate};

/// Slowest tempo considered
pub const MIN_BPM: f64 = 60.0;

/// Fastest tempo considered
pub const MAX_BPM: f64 = 200.0;

/// BPM candidate with confidence
#[derive(Debug, Clone)]
pub struct BpmCandidate {
    /// BPM estimate
    pub bpm: f32,

    /// Confidence score (0.0-1.0)
    pub confidence: f32,
}
