//! Arrangement data model and tone presets

use serde::{Deserialize, Serialize};

use crate::analysis::result::{total_beats, MelodyStep};
use crate::theory::Scale;

/// Musical role of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackRole {
    /// Simplified transcribed melody
    Lead,
    /// Triad arpeggio or pad
    Harmony,
    /// Root pulse two octaves below the lead
    Bass,
    /// Kick/snare/hat pattern (General MIDI drum notes)
    Drums,
}

/// Console-inspired sound palette for derived tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetroStyle {
    /// Pulse channels; harmony arpeggiates in quarter-beat cells
    Nes,
    /// Softer voices; harmony sustains third and fifth
    #[default]
    SnesLite,
}

/// Which tracks an arrangement contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStyle {
    /// Only the simplified lead
    LeadOnly,
    /// Lead, bass, harmony and drums
    #[default]
    AutoArrange,
}

/// Named synthesiser voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TonePreset {
    /// Thin square lead
    PulseLead,
    /// Rounder square lead
    WarmSquare,
    /// Mellow sawtooth
    SoftSaw,
    /// Percussive bell
    FmBell,
    /// Plucked triangle bass
    BassPick,
    /// Slow sine pad
    SnesPad,
    /// Noise-tinted percussion
    NoiseKit,
}

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    /// Pure sine
    Sine,
    /// Square / pulse
    Square,
    /// Sawtooth
    Sawtooth,
    /// Triangle
    Triangle,
}

/// Oscillator and envelope parameters for an external synthesiser
///
/// Times are in seconds, frequencies in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneParams {
    /// Oscillator shape
    pub waveform: Waveform,
    /// Attack time
    pub attack: f32,
    /// Decay time
    pub decay: f32,
    /// Sustain level (0.0-1.0)
    pub sustain: f32,
    /// Release time
    pub release: f32,
    /// Vibrato rate
    pub vibrato_hz: f32,
    /// Vibrato depth in cents
    pub vibrato_cents: f32,
    /// High-pass cutoff
    pub highpass_hz: f32,
    /// Formant (band-pass) centre
    pub formant_hz: f32,
    /// Formant Q
    pub formant_q: f32,
    /// Level of the added second harmonic
    pub second_harmonic: f32,
    /// Level of added noise
    pub noise_amount: f32,
}

#[allow(clippy::too_many_arguments)]
const fn params(
    waveform: Waveform,
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
    vibrato_hz: f32,
    vibrato_cents: f32,
    highpass_hz: f32,
    formant_hz: f32,
    formant_q: f32,
    second_harmonic: f32,
    noise_amount: f32,
) -> ToneParams {
    ToneParams {
        waveform,
        attack,
        decay,
        sustain,
        release,
        vibrato_hz,
        vibrato_cents,
        highpass_hz,
        formant_hz,
        formant_q,
        second_harmonic,
        noise_amount,
    }
}

/// Synthesis parameters of a preset
pub fn tone_params(preset: TonePreset) -> ToneParams {
    use Waveform::*;
    match preset {
        TonePreset::PulseLead => params(Square, 0.002, 0.04, 0.4, 0.03, 5.0, 4.0, 180.0, 1600.0, 3.0, 0.06, 0.0),
        TonePreset::WarmSquare => params(Square, 0.005, 0.06, 0.45, 0.08, 4.5, 5.0, 140.0, 1450.0, 3.2, 0.12, 0.0),
        TonePreset::SoftSaw => params(Sawtooth, 0.01, 0.09, 0.35, 0.12, 4.2, 3.0, 120.0, 1200.0, 2.8, 0.16, 0.0),
        TonePreset::FmBell => params(Triangle, 0.001, 0.12, 0.1, 0.1, 6.0, 2.0, 230.0, 2300.0, 5.0, 0.35, 0.0),
        TonePreset::BassPick => params(Triangle, 0.002, 0.09, 0.3, 0.08, 3.5, 1.0, 70.0, 950.0, 2.2, 0.18, 0.0),
        TonePreset::SnesPad => params(Sine, 0.03, 0.12, 0.72, 0.18, 4.2, 2.5, 90.0, 1100.0, 2.0, 0.1, 0.0),
        TonePreset::NoiseKit => params(Triangle, 0.001, 0.04, 0.05, 0.03, 1.0, 0.0, 300.0, 2400.0, 1.5, 0.1, 0.06),
    }
}

/// One instrument line of an arrangement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangementTrack {
    /// Musical role
    pub role: TrackRole,
    /// Display name
    pub name: String,
    /// Voice used for playback
    pub tone_preset: TonePreset,
    /// MIDI channel (0-based; 9 is the GM drum channel)
    pub midi_channel: u8,
    /// General MIDI program, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_program: Option<u8>,
    /// Note/rest sequence
    pub steps: Vec<MelodyStep>,
    /// Stereo position (-64..63 style offset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<i8>,
}

impl ArrangementTrack {
    /// Total duration in beats
    pub fn total_beats(&self) -> f64 {
        total_beats(&self.steps)
    }
}

/// Multi-track arrangement derived from a melody
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    /// Tempo
    pub bpm: f64,
    /// Key name
    pub key: String,
    /// Scale
    pub scale: Scale,
    /// Tracks, lead first
    pub tracks: Vec<ArrangementTrack>,
}

impl Arrangement {
    /// First track with the given role
    pub fn track(&self, role: TrackRole) -> Option<&ArrangementTrack> {
        self.tracks.iter().find(|t| t.role == role)
    }
}
