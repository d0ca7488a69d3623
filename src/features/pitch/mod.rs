//! Frame-level pitch estimation
//!
//! Two estimators share the same framing (2048-sample frames, 512-sample hop):
//! - [`mcleod`]: McLeod Pitch Method for monophonic material (voice, whistle)
//! - [`harmonic_sum`]: Goertzel harmonic summation for a predominant voice in a full mix
//!
//! [`source`] wraps them behind the [`PitchTrackSource`] capability, alongside
//! a precomputed track supplied by an external estimator, and [`frames`]
//! aligns any track with per-hop energy to produce [`Frame`]s.

pub mod frames;
pub mod harmonic_sum;
pub mod mcleod;
pub mod source;

pub use frames::{analyze_frames, Frame};
pub use source::{
    ExternalPitchResult, HarmonicSumTrackSource, McLeodTrackSource, PitchTrack,
    PitchTrackSource, PrecomputedPitchTrack,
};

/// Analysis frame length in samples
pub const FRAME_SIZE: usize = 2048;

/// Hop between consecutive frames in samples
pub const HOP_SIZE: usize = 512;

/// Pitch and clarity of a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Fundamental frequency in Hz (0.0 when unpitched)
    pub hz: f32,
    /// Periodicity strength in [0.0, 1.0]
    pub clarity: f32,
}

impl PitchEstimate {
    /// Estimate for an unpitched frame
    pub fn none() -> Self {
        Self { hz: 0.0, clarity: 0.0 }
    }
}

/// Number of hops covering `len` samples
///
/// A buffer shorter than one frame still yields a single (zero-padded) frame.
pub fn frame_count(len: usize) -> usize {
    if len == 0 {
        0
    } else if len <= FRAME_SIZE {
        1
    } else {
        (len - FRAME_SIZE) / HOP_SIZE + 1
    }
}

/// Copy frame `index` of `samples` into `out`, zero-padding past the end
pub fn fill_frame(samples: &[f32], index: usize, out: &mut [f32]) {
    let start = index * HOP_SIZE;
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = samples.get(start + i).copied().unwrap_or(0.0);
    }
}
