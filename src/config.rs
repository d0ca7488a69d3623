//! Configuration parameters for transcription

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::theory::Scale;

/// Rhythmic grid used for duration quantization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridType {
    /// Quarter notes (1 beat)
    Quarter,
    /// Eighth notes (1/2 beat)
    #[default]
    Eighth,
    /// Sixteenth notes (1/4 beat)
    Sixteenth,
}

impl GridType {
    /// Grid unit in beats, scaled by 2/3 for triplet feel
    ///
    /// # Example
    ///
    /// ```
    /// use whistle_dsp::config::GridType;
    ///
    /// assert_eq!(GridType::Eighth.unit_beats(false), 0.5);
    /// assert!((GridType::Quarter.unit_beats(true) - 2.0 / 3.0).abs() < 1e-12);
    /// ```
    pub fn unit_beats(&self, triplets: bool) -> f64 {
        let base = match self {
            GridType::Quarter => 1.0,
            GridType::Eighth => 0.5,
            GridType::Sixteenth => 0.25,
        };
        if triplets {
            base * (2.0 / 3.0)
        } else {
            base
        }
    }
}

/// Frame analysis strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Single voice (whistle, hum, solo instrument): autocorrelation pitch
    #[default]
    Monophonic,
    /// Lead over accompaniment: harmonic-summation predominant pitch
    FullMix,
}

/// Where the key used for snapping comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// Use the detected key
    #[default]
    Auto,
    /// Use `key`/`scale` from the options
    Manual,
}

/// Transcription options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Tempo used to convert seconds to beats (default: 120.0)
    pub bpm: f64,

    /// Quantization grid (default: eighth)
    pub grid: GridType,

    /// Triplet grid (default: false)
    pub triplets: bool,

    /// Frame analysis strategy (default: monophonic)
    pub analysis_mode: AnalysisMode,

    /// Minimum frame RMS for a frame to count as voiced (default: 0.02)
    pub rms_threshold: f32,

    /// Minimum pitch clarity for a frame to count as voiced (default: 0.75)
    pub clarity_threshold: f32,

    /// Notes and rests shorter than this are merged away (default: 80 ms)
    pub min_note_ms: f64,

    /// Key source (default: auto)
    pub key_mode: KeyMode,

    /// Manual key name, e.g. "C", "F#", "Bb" (default: "C")
    pub key: String,

    /// Manual scale (default: major)
    pub scale: Scale,

    /// Snap pitches to the active scale (default: true)
    pub snap_enabled: bool,

    /// Maximum deviation accepted when snapping (default: 50 cents)
    pub snap_tolerance_cents: f32,

    /// Lowest accepted pitch in Hz (default: 200.0)
    pub min_hz: f32,

    /// Highest accepted pitch in Hz (default: 2500.0)
    pub max_hz: f32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            grid: GridType::Eighth,
            triplets: false,
            analysis_mode: AnalysisMode::Monophonic,
            rms_threshold: 0.02,
            clarity_threshold: 0.75,
            min_note_ms: 80.0,
            key_mode: KeyMode::Auto,
            key: "C".to_string(),
            scale: Scale::Major,
            snap_enabled: true,
            snap_tolerance_cents: 50.0,
            min_hz: 200.0,
            max_hz: 2500.0,
        }
    }
}

impl AnalysisOptions {
    /// Check options that would make the pipeline meaningless
    ///
    /// Soft problems (odd thresholds, zero BPM) are tolerated by the pipeline and
    /// replaced by safe defaults; only structurally invalid bands are rejected.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.min_hz.is_finite() || !self.max_hz.is_finite() {
            return Err(AnalysisError::InvalidInput(format!(
                "Frequency band must be finite, got [{}, {}]",
                self.min_hz, self.max_hz
            )));
        }
        if self.min_hz <= 0.0 || self.max_hz <= self.min_hz {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid frequency band: [{:.1}, {:.1}] Hz",
                self.min_hz, self.max_hz
            )));
        }
        Ok(())
    }

    /// Tempo to use for beat conversion; non-finite or non-positive values fall back to 120
    pub fn effective_bpm(&self) -> f64 {
        sanitize_bpm(self.bpm)
    }

    /// Grid unit in beats for the configured grid and triplet setting
    pub fn grid_unit(&self) -> f64 {
        self.grid.unit_beats(self.triplets)
    }
}

/// Fallback tempo used when no usable tempo is available
pub const DEFAULT_BPM: f64 = 120.0;

/// Replace unusable tempo values with [`DEFAULT_BPM`]
pub fn sanitize_bpm(bpm: f64) -> f64 {
    if bpm.is_finite() && bpm > 0.0 {
        bpm
    } else {
        DEFAULT_BPM
    }
}
