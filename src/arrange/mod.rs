//! Retro arrangement
//!
//! Turns a quantized melody into a small chiptune-style arrangement and
//! post-processes its rests:
//! - Track, tone preset and style types
//! - Lead simplification and accompaniment generation
//! - Rest continuity (bridging, capping, fills)

pub mod arranger;
pub mod continuity;
pub mod tracks;

pub use arranger::build_arrangement;
pub use continuity::{
    apply_continuity, apply_continuity_to_melody, ContinuityMode, ContinuityOptions,
    ContinuityResult, ContinuityStats,
};
pub use tracks::{
    tone_params, Arrangement, ArrangementTrack, OutputStyle, RetroStyle, TonePreset, ToneParams,
    TrackRole, Waveform,
};
