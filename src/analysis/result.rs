//! Analysis result types

use serde::{Deserialize, Serialize};

use crate::config::{AnalysisMode, AnalysisOptions, GridType};
use crate::theory::{midi_to_note_name, note_name_to_midi, Scale, REST};

/// Velocity assumed for steps that do not carry one
pub const DEFAULT_VELOCITY: u8 = 100;

/// Maximal run of frames with consistent voicing and (if voiced) pitch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Whether the segment is a rest
    pub is_rest: bool,

    /// Start time in seconds
    pub start_sec: f64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// Quantized duration in beats (0.0 until quantization)
    pub beats: f64,

    /// Integer MIDI pitch (voiced segments only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi: Option<i32>,

    /// Mean fractional MIDI pitch (voiced segments only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_float: Option<f32>,

    /// Scientific pitch name, or `"REST"`
    pub note_name: String,
}

impl Segment {
    /// Create a rest segment
    pub fn rest(start_sec: f64, duration_sec: f64) -> Self {
        Self {
            is_rest: true,
            start_sec,
            duration_sec,
            beats: 0.0,
            midi: None,
            midi_float: None,
            note_name: REST.to_string(),
        }
    }

    /// Create a voiced segment from a fractional pitch
    pub fn voiced(start_sec: f64, duration_sec: f64, midi_float: f32) -> Self {
        let midi = midi_float.round() as i32;
        Self {
            is_rest: false,
            start_sec,
            duration_sec,
            beats: 0.0,
            midi: Some(midi),
            midi_float: Some(midi_float),
            note_name: midi_to_note_name(midi, false),
        }
    }

    /// End time in seconds
    pub fn end_sec(&self) -> f64 {
        self.start_sec + self.duration_sec
    }

    /// Replace the pitch of a voiced segment, keeping the name in sync
    pub fn set_pitch(&mut self, midi: i32, midi_float: f32) {
        self.is_rest = false;
        self.midi = Some(midi);
        self.midi_float = Some(midi_float);
        self.note_name = midi_to_note_name(midi, false);
    }

    /// Re-spell the note name with sharps or flats
    pub fn respell(&mut self, prefer_flats: bool) {
        if let Some(midi) = self.midi {
            self.note_name = midi_to_note_name(midi, prefer_flats);
        }
    }

    /// Whether two segments would be indistinguishable once merged
    pub fn same_event(&self, other: &Segment) -> bool {
        self.is_rest == other.is_rest && (self.is_rest || self.midi == other.midi)
    }
}

/// One step of a melody: a note or a rest with a duration in beats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodyStep {
    /// Scientific pitch name, or `"REST"`
    pub note: String,

    /// Duration in beats
    pub beats: f64,

    /// MIDI velocity (1-127); `None` plays at the default velocity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<u8>,
}

impl MelodyStep {
    /// Note step without an explicit velocity
    pub fn note(note: impl Into<String>, beats: f64) -> Self {
        Self {
            note: note.into(),
            beats,
            velocity: None,
        }
    }

    /// Note step for a MIDI pitch
    pub fn midi(midi: i32, beats: f64, velocity: u8) -> Self {
        Self {
            note: midi_to_note_name(midi, false),
            beats,
            velocity: Some(velocity),
        }
    }

    /// Rest step
    pub fn rest(beats: f64) -> Self {
        Self {
            note: REST.to_string(),
            beats,
            velocity: None,
        }
    }

    /// Same step with an explicit velocity
    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = Some(velocity);
        self
    }

    /// Whether this step is a rest
    pub fn is_rest(&self) -> bool {
        self.note == REST
    }

    /// MIDI pitch of a note step (`None` for rests and unparseable names)
    pub fn midi_note(&self) -> Option<i32> {
        if self.is_rest() {
            None
        } else {
            note_name_to_midi(&self.note)
        }
    }

    /// Velocity used for playback and for merge decisions
    pub fn effective_velocity(&self) -> u8 {
        self.velocity.unwrap_or(DEFAULT_VELOCITY)
    }

    fn merges_with(&self, other: &MelodyStep) -> bool {
        self.note == other.note
            && (self.is_rest() || self.effective_velocity() == other.effective_velocity())
    }
}

/// Merge adjacent steps with the same note and velocity and drop empty steps
///
/// Adjacent rests always merge. Durations are summed exactly.
pub fn coalesce_steps(steps: Vec<MelodyStep>) -> Vec<MelodyStep> {
    let mut out: Vec<MelodyStep> = Vec::with_capacity(steps.len());
    for step in steps {
        if !(step.beats > 0.0) {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.merges_with(&step) => last.beats += step.beats,
            _ => out.push(step),
        }
    }
    out
}

/// Total duration of a step sequence in beats
pub fn total_beats(steps: &[MelodyStep]) -> f64 {
    steps.iter().map(|s| s.beats).sum()
}

/// Diagnostics describing how a transcription was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDebug {
    /// Number of analysed frames
    pub frame_count: usize,

    /// Voiced-frame ratio with the initial thresholds
    pub initial_voiced_ratio: f32,

    /// Voiced-frame ratio after adaptive recovery and gap filling
    pub voiced_ratio: f32,

    /// RMS threshold finally applied
    pub rms_threshold: f32,

    /// Clarity threshold finally applied
    pub clarity_threshold: f32,

    /// Thresholds were relaxed from the observed distributions
    pub adaptive_thresholds_used: bool,

    /// Number of rest frames converted to voiced by gap filling
    pub gap_filled_frames: usize,

    /// Backend that produced the pitch track
    pub frame_source: String,

    /// Normalised margin between the best and second-best key
    pub key_confidence: f32,

    /// Key reported by an external estimator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_key: Option<String>,

    /// Scale reported by an external estimator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_scale: Option<String>,

    /// Key strength reported by an external estimator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_key_strength: Option<f32>,

    /// Tempo reported by an external estimator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_bpm: Option<f64>,
}

/// Complete transcription result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResult {
    /// Quantized melody
    pub melody: Vec<MelodyStep>,

    /// Quantized segments (beats populated)
    pub segments: Vec<Segment>,

    /// Detected key name (e.g. "A", "Eb")
    pub suggested_key: String,

    /// Detected scale
    pub suggested_scale: Scale,

    /// Advisory message about the input (sparse voicing, likely polyphony, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    /// Diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<AnalysisDebug>,

    /// Why a supplied external estimator result was not used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimator_error: Option<String>,
}

/// Where a suggested tempo came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoSource {
    /// Energy-flux autocorrelation
    Flux,
    /// Confident external estimator
    External,
    /// No usable estimate; the configured tempo is kept
    Configured,
}

/// Recommended transcription settings for a buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAnalysisSettings {
    /// Suggested tempo
    pub bpm: f64,

    /// Confidence of the tempo estimate (0.0-1.0 for flux, estimator scale for external)
    pub bpm_confidence: f32,

    /// Origin of `bpm`
    pub tempo_source: TempoSource,

    /// Suggested grid
    pub grid: GridType,

    /// Whether a triplet grid fits the onsets better
    pub triplets: bool,

    /// Suggested frame analysis strategy
    pub analysis_mode: AnalysisMode,

    /// Suggested RMS threshold
    pub rms_threshold: f32,

    /// Suggested clarity threshold
    pub clarity_threshold: f32,

    /// Suggested lower band edge in Hz
    pub min_hz: f32,

    /// Suggested upper band edge in Hz
    pub max_hz: f32,

    /// Suggested minimum note length in milliseconds
    pub min_note_ms: f64,

    /// Why a supplied external estimator result was not used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimator_error: Option<String>,
}

impl SuggestedAnalysisSettings {
    /// Copy of `options` with every suggested field applied
    pub fn apply_to(&self, options: &AnalysisOptions) -> AnalysisOptions {
        AnalysisOptions {
            bpm: self.bpm,
            grid: self.grid,
            triplets: self.triplets,
            analysis_mode: self.analysis_mode,
            rms_threshold: self.rms_threshold,
            clarity_threshold: self.clarity_threshold,
            min_hz: self.min_hz,
            max_hz: self.max_hz,
            min_note_ms: self.min_note_ms,
            ..options.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_constructors() {
        let rest = Segment::rest(0.0, 0.5);
        assert!(rest.is_rest);
        assert_eq!(rest.note_name, "REST");

        let mut note = Segment::voiced(0.5, 0.25, 69.2);
        assert_eq!(note.midi, Some(69));
        assert_eq!(note.note_name, "A4");
        assert!((note.end_sec() - 0.75).abs() < 1e-12);

        note.set_pitch(70, 70.1);
        note.respell(true);
        assert_eq!(note.note_name, "Bb4");
    }

    #[test]
    fn test_coalesce_merges_equal_note_and_velocity() {
        let steps = vec![
            MelodyStep::note("C4", 1.0),
            MelodyStep::note("C4", 0.5).with_velocity(100),
            MelodyStep::note("C4", 0.5).with_velocity(56),
            MelodyStep::rest(0.25),
            MelodyStep::rest(0.25),
            MelodyStep::note("D4", 0.0),
        ];
        let merged = coalesce_steps(steps);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].beats, 1.5);
        assert_eq!(merged[1].velocity, Some(56));
        assert_eq!(merged[2], MelodyStep::rest(0.5));
        assert_eq!(total_beats(&merged), 2.5);
    }

    #[test]
    fn test_step_midi() {
        assert_eq!(MelodyStep::note("A4", 1.0).midi_note(), Some(69));
        assert_eq!(MelodyStep::rest(1.0).midi_note(), None);
        assert_eq!(MelodyStep::midi(60, 1.0, 90).note, "C4");
    }

    #[test]
    fn test_velocity_omitted_in_json() {
        let json = serde_json::to_string(&MelodyStep::note("E5", 0.5)).unwrap();
        assert_eq!(json, r#"{"note":"E5","beats":0.5}"#);
        let parsed: MelodyStep = serde_json::from_str(r#"{"note":"REST","beats":1.0}"#).unwrap();
        assert!(parsed.is_rest());
    }
}
