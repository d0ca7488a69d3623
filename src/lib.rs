//! # Whistle DSP
//!
//! Melody transcription and retro-style arrangement for hummed, whistled or
//! sung audio, with a full-mix mode that follows the lead line of a song.
//!
//! ## Features
//!
//! - **Transcription**: McLeod pitch frames, adaptive voicing, segmentation,
//!   key detection, scale snapping and grid quantization
//! - **Settings suggestion**: tempo, triplet feel, grid and voicing thresholds
//!   estimated from the recording
//! - **Arrangement**: lead, bass, harmony and drum tracks in NES or SNES-lite style
//! - **Continuity**: rest bridging and accompaniment fills
//!
//! ## Quick Start
//!
//! ```no_run
//! use whistle_dsp::{analyze, AnalysisOptions};
//!
//! // Mono samples, normalized to [-1.0, 1.0]
//! let samples: Vec<f32> = vec![];
//! let sample_rate = 44100;
//!
//! let result = analyze(&samples, sample_rate, &AnalysisOptions::default(), None)?;
//!
//! println!("Key: {} {}", result.suggested_key, result.suggested_scale.name());
//! for step in &result.melody {
//!     println!("{} x {:.3}", step.note, step.beats);
//! }
//! # Ok::<(), whistle_dsp::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Audio Input → Pitch Frames → Voicing → Segments → Key → Quantization → Melody
//! Melody → Arrangement → Continuity
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod arrange;
pub mod config;
pub mod error;
pub mod features;
pub mod preprocessing;
pub mod quantize;
pub mod theory;

// Re-export main types
pub use analysis::result::{
    AnalysisDebug, AnalyzeResult, MelodyStep, Segment, SuggestedAnalysisSettings, TempoSource,
};
pub use analysis::{analyze, suggest_settings};
pub use arrange::{
    apply_continuity, build_arrangement, Arrangement, ContinuityMode, ContinuityOptions,
    ContinuityResult, ContinuityStats, OutputStyle, RetroStyle,
};
pub use config::{AnalysisMode, AnalysisOptions, GridType, KeyMode};
pub use error::AnalysisError;
pub use features::pitch::ExternalPitchResult;
pub use theory::Scale;
