//! Automatic settings advisor
//!
//! Estimates tempo and rhythmic feel from the energy flux, decides between
//! monophonic and full-mix analysis from the McLeod clarity distribution, and
//! proposes thresholds, band and minimum note length for the chosen mode.

use crate::analysis::result::{SuggestedAnalysisSettings, TempoSource};
use crate::config::{AnalysisMode, AnalysisOptions, GridType};
use crate::error::AnalysisError;
use crate::features::onset::{compute_energy_flux, detect_flux_onsets};
use crate::features::period::{detect_triplet_feel, estimate_bpm_from_flux, fold_bpm, MAX_BPM, MIN_BPM};
use crate::features::pitch::{analyze_frames, ExternalPitchResult, Frame, McLeodTrackSource, PitchTrackSource};
use crate::features::stats::{median, percentile};

/// External tempo is trusted at or above this confidence
pub const EXTERNAL_BPM_MIN_CONFIDENCE: f64 = 1.0;

/// Frames at or above this RMS count as carrying signal
const ENERGETIC_RMS: f32 = 0.01;

/// Frames at or above this clarity count as clearly pitched
const CLEAR_CLARITY: f32 = 0.85;

/// Full-mix rule: share of energetic frames at or above which the take is dense
const DENSE_ENERGY_RATIO: f32 = 0.6;

/// Full-mix rule: median clarity below which a dense take is a mix
const MIX_MEDIAN_CLARITY: f32 = 0.7;

/// Full-mix rule: clear-frame share below which a dense take is a mix
const MIX_CLEAR_RATIO: f32 = 0.45;

/// Onsets per beat above which a sixteenth grid is suggested
const SIXTEENTH_DENSITY: f64 = 1.5;

/// Clear frames needed to derive the band from observed pitches
const MIN_BAND_FRAMES: usize = 10;

/// Half an octave, applied either side of the observed pitch range
const BAND_MARGIN: f32 = std::f32::consts::SQRT_2;

/// Clarity/RMS statistics of a McLeod pass over the buffer
#[derive(Debug, Clone, PartialEq)]
struct FrameProfile {
    energetic_ratio: f32,
    median_clarity: f32,
    clear_ratio: f32,
    median_rms: f32,
    clear_pitches: Vec<f32>,
}

impl FrameProfile {
    fn from_frames(frames: &[Frame]) -> Self {
        let energetic: Vec<&Frame> = frames.iter().filter(|f| f.rms >= ENERGETIC_RMS).collect();
        let clarities: Vec<f32> = energetic.iter().map(|f| f.clarity).collect();
        let rms: Vec<f32> = energetic.iter().map(|f| f.rms).collect();
        let clear_pitches: Vec<f32> = energetic
            .iter()
            .filter(|f| f.clarity >= CLEAR_CLARITY)
            .filter_map(|f| f.pitch_hz)
            .collect();

        let ratio = |n: usize, d: usize| if d == 0 { 0.0 } else { n as f32 / d as f32 };
        Self {
            energetic_ratio: ratio(energetic.len(), frames.len()),
            median_clarity: median(&clarities),
            clear_ratio: ratio(clear_pitches.len(), energetic.len()),
            median_rms: median(&rms),
            clear_pitches,
        }
    }

    fn suggested_mode(&self) -> AnalysisMode {
        let dense = self.energetic_ratio >= DENSE_ENERGY_RATIO;
        let murky = self.median_clarity < MIX_MEDIAN_CLARITY || self.clear_ratio < MIX_CLEAR_RATIO;
        if dense && murky {
            AnalysisMode::FullMix
        } else {
            AnalysisMode::Monophonic
        }
    }
}

/// Per-mode threshold, band and note-length recommendations
struct ModeSettings {
    rms_threshold: f32,
    clarity_threshold: f32,
    min_hz: f32,
    max_hz: f32,
    min_note_ms: f64,
}

fn mode_settings(mode: AnalysisMode, profile: &FrameProfile) -> ModeSettings {
    match mode {
        AnalysisMode::Monophonic => {
            let rms_threshold = if profile.median_rms > 0.0 {
                (0.25 * profile.median_rms).clamp(0.005, 0.05)
            } else {
                0.02
            };
            let clarity_threshold = if profile.median_clarity >= CLEAR_CLARITY { 0.75 } else { 0.65 };
            let (min_hz, max_hz) = if profile.clear_pitches.len() >= MIN_BAND_FRAMES {
                let low = percentile(&profile.clear_pitches, 0.05) / BAND_MARGIN;
                let high = percentile(&profile.clear_pitches, 0.95) * BAND_MARGIN;
                (low.max(60.0), high.min(5000.0).max(low.max(60.0) * 2.0))
            } else {
                (200.0, 2500.0)
            };
            ModeSettings {
                rms_threshold,
                clarity_threshold,
                min_hz,
                max_hz,
                min_note_ms: 80.0,
            }
        }
        AnalysisMode::FullMix => ModeSettings {
            rms_threshold: if profile.median_rms > 0.0 {
                (0.2 * profile.median_rms).clamp(0.01, 0.05)
            } else {
                0.02
            },
            clarity_threshold: 0.6,
            min_hz: 150.0,
            max_hz: 1400.0,
            min_note_ms: 110.0,
        },
    }
}

/// Recommend transcription settings for a buffer
///
/// # Arguments
///
/// * `samples` - Mono samples
/// * `sample_rate` - Sample rate in Hz
/// * `options` - Current options; the configured tempo is kept when no tempo
///   can be estimated
/// * `external` - Optional external estimate; its tempo wins when its
///   confidence is at least [`EXTERNAL_BPM_MIN_CONFIDENCE`]
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for an empty buffer or a zero sample rate
pub fn suggest_settings(
    samples: &[f32],
    sample_rate: u32,
    options: &AnalysisOptions,
    external: Option<&ExternalPitchResult>,
) -> Result<SuggestedAnalysisSettings, AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::InvalidInput("Empty audio samples".to_string()));
    }
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("Invalid sample rate".to_string()));
    }

    // Tempo
    let flux = compute_energy_flux(samples, sample_rate)?;
    let flux_tempo = estimate_bpm_from_flux(&flux, MIN_BPM, MAX_BPM)?;
    let external_tempo = external.and_then(|e| {
        e.confident_bpm(EXTERNAL_BPM_MIN_CONFIDENCE)
            .map(|bpm| (fold_bpm(bpm, MIN_BPM, MAX_BPM), e.bpm_confidence.unwrap_or(0.0) as f32))
    });
    let (bpm, bpm_confidence, tempo_source) = match (external_tempo, flux_tempo) {
        (Some((bpm, conf)), _) => (bpm, conf, TempoSource::External),
        (None, Some(candidate)) => (
            (candidate.bpm as f64 * 10.0).round() / 10.0,
            candidate.confidence,
            TempoSource::Flux,
        ),
        (None, None) => (options.effective_bpm(), 0.0, TempoSource::Configured),
    };

    // Feel and grid
    let onsets = detect_flux_onsets(&flux);
    let feel = detect_triplet_feel(&onsets, bpm);
    let duration_beats = samples.len() as f64 / sample_rate as f64 * bpm / 60.0;
    let density = if duration_beats > 0.0 {
        onsets.len() as f64 / duration_beats
    } else {
        0.0
    };
    let grid = if density > SIXTEENTH_DENSITY {
        GridType::Sixteenth
    } else {
        GridType::Eighth
    };

    // Mode and thresholds
    let track = McLeodTrackSource.track(samples, sample_rate, options.min_hz, options.max_hz)?;
    let frames = analyze_frames(samples, sample_rate, &track);
    let profile = FrameProfile::from_frames(&frames);
    let analysis_mode = profile.suggested_mode();
    let mode = mode_settings(analysis_mode, &profile);

    let estimator_error = external.and_then(|e| e.validate().err()).map(|e| {
        log::warn!("External estimate unusable: {}", e);
        e.to_string()
    });

    log::debug!(
        "Suggested settings: {:.1} BPM ({:?}), {:?} grid, triplets {}, {:?} (energetic {:.2}, median clarity {:.2}, clear {:.2})",
        bpm,
        tempo_source,
        grid,
        feel.triplet,
        analysis_mode,
        profile.energetic_ratio,
        profile.median_clarity,
        profile.clear_ratio
    );

    Ok(SuggestedAnalysisSettings {
        bpm,
        bpm_confidence,
        tempo_source,
        grid,
        triplets: feel.triplet,
        analysis_mode,
        rms_threshold: mode.rms_threshold,
        clarity_threshold: mode.clarity_threshold,
        min_hz: mode.min_hz,
        max_hz: mode.max_hz,
        min_note_ms: mode.min_note_ms,
        estimator_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kick_pattern(seconds: f32, bpm: f32, sample_rate: u32) -> Vec<f32> {
        let sr = sample_rate as f32;
        let n = (seconds * sr) as usize;
        let interval = (60.0 / bpm * sr) as usize;
        let kick = (0.1 * sr) as usize;
        let mut samples = vec![0.0f32; n];
        let mut pos = 0;
        while pos < n {
            for i in pos..(pos + kick).min(n) {
                let t = (i - pos) as f32 / kick as f32;
                samples[i] = 0.8 * (-t * 5.0).exp() * (2.0 * std::f32::consts::PI * 60.0 * (i - pos) as f32 / sr).sin();
            }
            pos += interval;
        }
        samples
    }

    fn noise(seconds: f32, sample_rate: u32) -> Vec<f32> {
        let mut state: u32 = 0x1234_5678;
        (0..(seconds * sample_rate as f32) as usize)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((state >> 8) as f32 / (1u32 << 24) as f32 - 0.5) * 0.6
            })
            .collect()
    }

    #[test]
    fn test_rejects_invalid_input() {
        let options = AnalysisOptions::default();
        assert!(suggest_settings(&[], 44100, &options, None).is_err());
        assert!(suggest_settings(&[0.0; 10], 0, &options, None).is_err());
    }

    #[test]
    fn test_kick_pattern_tempo() {
        let samples = kick_pattern(8.0, 120.0, 44100);
        let settings = suggest_settings(&samples, 44100, &AnalysisOptions::default(), None).unwrap();
        assert_eq!(settings.tempo_source, TempoSource::Flux);
        assert!((settings.bpm - 120.0).abs() < 3.0, "BPM {}", settings.bpm);
        assert!(!settings.triplets);
    }

    #[test]
    fn test_silence_keeps_configured_tempo() {
        let options = AnalysisOptions {
            bpm: 96.0,
            ..AnalysisOptions::default()
        };
        let settings = suggest_settings(&vec![0.0f32; 44100 * 2], 44100, &options, None).unwrap();
        assert_eq!(settings.tempo_source, TempoSource::Configured);
        assert_eq!(settings.bpm, 96.0);
        assert_eq!(settings.analysis_mode, AnalysisMode::Monophonic);
    }

    #[test]
    fn test_confident_external_tempo_wins() {
        let samples = kick_pattern(4.0, 120.0, 44100);
        let external = ExternalPitchResult {
            backend: "worker".to_string(),
            hop_seconds: 0.01,
            pitch_hz: vec![0.0; 4],
            pitch_confidence: vec![0.0; 4],
            bpm: Some(45.0),
            bpm_confidence: Some(2.5),
            ..ExternalPitchResult::default()
        };
        let settings =
            suggest_settings(&samples, 44100, &AnalysisOptions::default(), Some(&external)).unwrap();
        assert_eq!(settings.tempo_source, TempoSource::External);
        // Folded into range
        assert_eq!(settings.bpm, 90.0);
        assert!(settings.estimator_error.is_none());
    }

    #[test]
    fn test_pure_tone_is_monophonic_with_narrow_band() {
        let sr = 44100;
        let samples: Vec<f32> = (0..sr)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin())
            .collect();
        let settings = suggest_settings(&samples, sr, &AnalysisOptions::default(), None).unwrap();
        assert_eq!(settings.analysis_mode, AnalysisMode::Monophonic);
        assert!(settings.min_hz < 440.0 && settings.max_hz > 440.0);
        assert!(settings.max_hz < 1000.0);
    }

    #[test]
    fn test_dense_noise_suggests_full_mix() {
        let samples = noise(2.0, 44100);
        let settings = suggest_settings(&samples, 44100, &AnalysisOptions::default(), None).unwrap();
        assert_eq!(settings.analysis_mode, AnalysisMode::FullMix);
        assert_eq!(settings.min_note_ms, 110.0);
    }

    #[test]
    fn test_apply_to_keeps_key_options() {
        let samples = vec![0.0f32; 44100];
        let options = AnalysisOptions {
            key: "Eb".to_string(),
            ..AnalysisOptions::default()
        };
        let settings = suggest_settings(&samples, 44100, &options, None).unwrap();
        let applied = settings.apply_to(&options);
        assert_eq!(applied.key, "Eb");
        assert_eq!(applied.analysis_mode, settings.analysis_mode);
    }
}
