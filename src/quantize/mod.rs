//! Quantization of segment durations and pitches
//!
//! - [`rhythm`]: seconds to grid-aligned beats with error feedback
//! - [`pitch_snap`]: scale snapping under a jump guard, plus full-mix octave
//!   normalization

pub mod pitch_snap;
pub mod rhythm;

pub use pitch_snap::{jump_guard_fires, resolve_snap, PitchQuantizer};
pub use rhythm::{quantize_beats, quantize_segments, seconds_to_beats, snap_to_grid};
