//! Transcription and settings analysis
//!
//! Combines the feature extraction stages into the public pipelines:
//! - Result types
//! - Melodic transcription
//! - Settings suggestion (tempo, feel, mode, thresholds)

pub mod result;
pub mod settings;
pub mod transcribe;

pub use settings::suggest_settings;
pub use transcribe::analyze;
