//! Melodic transcription pipeline
//!
//! samples → pitch track → frames → voicing → segments → key → snapped,
//! quantized melody

use crate::analysis::result::{coalesce_steps, AnalysisDebug, AnalyzeResult, MelodyStep, Segment};
use crate::config::{AnalysisMode, AnalysisOptions, KeyMode};
use crate::error::AnalysisError;
use crate::features::key::{detect_key_from_segments, KeyTemplates};
use crate::features::pitch::{
    analyze_frames, ExternalPitchResult, Frame, HarmonicSumTrackSource, McLeodTrackSource,
    PitchTrack, PitchTrackSource, PrecomputedPitchTrack,
};
use crate::features::segmentation::{
    cleanup_segments, coalesce_segments, deglitch_segments, segment_frames, smooth_contour,
};
use crate::features::voicing::{classify_frames, VoicingReport};
use crate::quantize::{quantize_segments, PitchQuantizer};
use crate::theory::{key_to_pitch_class, prefers_flats, Scale};

/// Voiced ratio below which a monophonic take is reported as mostly silence
const LOW_VOICED_MONOPHONIC: f32 = 0.2;

/// Voiced ratio below which a full mix is reported as lacking a lead line
const LOW_VOICED_FULL_MIX: f32 = 0.15;

/// Voiced ratio above which the input is probably polyphonic
const HIGH_VOICED: f32 = 0.95;

const LOW_VOICED_MONOPHONIC_WARNING: &str =
    "Large portions look like silence or breath, try lowering RMS threshold.";
const LOW_VOICED_FULL_MIX_WARNING: &str =
    "Little of the mix carries a clear lead line, try lowering thresholds or narrowing the frequency band.";
const HIGH_VOICED_WARNING: &str =
    "Very dense voiced audio, if this is polyphonic audio transcription quality may be poor.";
const RECOVERY_NOTE: &str =
    "Voicing recovery was applied (relaxed thresholds or filled gaps); check short notes and rests.";

/// Pitch track plus the reason an external track was rejected, if any
struct TrackSelection {
    track: PitchTrack,
    estimator_error: Option<String>,
}

/// Choose and run the frame source
///
/// Full-mix mode prefers an external result and falls back to the built-in
/// harmonic-summation source when it is malformed. Monophonic mode always
/// uses the McLeod source.
fn select_pitch_track(
    samples: &[f32],
    sample_rate: u32,
    options: &AnalysisOptions,
    external: Option<&ExternalPitchResult>,
) -> Result<TrackSelection, AnalysisError> {
    let (min_hz, max_hz) = (options.min_hz, options.max_hz);

    if options.analysis_mode == AnalysisMode::Monophonic {
        let track = McLeodTrackSource.track(samples, sample_rate, min_hz, max_hz)?;
        return Ok(TrackSelection {
            track,
            estimator_error: None,
        });
    }

    let mut estimator_error = None;
    if let Some(result) = external {
        let source = PrecomputedPitchTrack::new(result.clone());
        match source.track(samples, sample_rate, min_hz, max_hz) {
            Ok(track) => {
                log::debug!(
                    "Using external pitch track from '{}' ({} hops)",
                    track.backend,
                    track.pitch_hz.len()
                );
                return Ok(TrackSelection {
                    track,
                    estimator_error: None,
                });
            }
            Err(e) => {
                log::warn!("External pitch track rejected, using built-in estimator: {}", e);
                estimator_error = Some(e.to_string());
            }
        }
    }

    let track = HarmonicSumTrackSource.track(samples, sample_rate, min_hz, max_hz)?;
    Ok(TrackSelection {
        track,
        estimator_error,
    })
}

/// Segment classified frames and run the cleanup passes for the mode
fn build_segments(
    frames: &[Frame],
    total_duration_sec: f64,
    options: &AnalysisOptions,
) -> Vec<Segment> {
    let raw = segment_frames(frames, total_duration_sec);
    let cleaned = cleanup_segments(raw, options.min_note_ms);
    match options.analysis_mode {
        AnalysisMode::Monophonic => cleaned,
        AnalysisMode::FullMix => {
            let min_sec = options.min_note_ms.max(0.0) / 1000.0;
            smooth_contour(deglitch_segments(cleaned, min_sec))
        }
    }
}

/// Advisory message for the voicing outcome
fn voicing_warning(report: &VoicingReport, mode: AnalysisMode) -> Option<String> {
    let low = match mode {
        AnalysisMode::Monophonic => (LOW_VOICED_MONOPHONIC, LOW_VOICED_MONOPHONIC_WARNING),
        AnalysisMode::FullMix => (LOW_VOICED_FULL_MIX, LOW_VOICED_FULL_MIX_WARNING),
    };
    if report.voiced_ratio < low.0 {
        Some(low.1.to_string())
    } else if report.voiced_ratio > HIGH_VOICED {
        Some(HIGH_VOICED_WARNING.to_string())
    } else if report.recovery_used() {
        Some(RECOVERY_NOTE.to_string())
    } else {
        None
    }
}

/// Transcribe a mono buffer into a quantized melody
///
/// # Arguments
///
/// * `samples` - Mono samples in [-1.0, 1.0]
/// * `sample_rate` - Sample rate in Hz
/// * `options` - Transcription options
/// * `external` - Optional external pitch/tempo/key estimate (full-mix frame source)
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for an empty buffer, a zero sample
/// rate or an invalid frequency band. A malformed external estimate is not an
/// error: it is reported in `AnalyzeResult::estimator_error`.
pub fn analyze(
    samples: &[f32],
    sample_rate: u32,
    options: &AnalysisOptions,
    external: Option<&ExternalPitchResult>,
) -> Result<AnalyzeResult, AnalysisError> {
    log::debug!(
        "Starting transcription: {} samples at {} Hz ({:?})",
        samples.len(),
        sample_rate,
        options.analysis_mode
    );

    if samples.is_empty() {
        return Err(AnalysisError::InvalidInput("Empty audio samples".to_string()));
    }
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("Invalid sample rate".to_string()));
    }
    options.validate()?;

    // Frames and voicing
    let selection = select_pitch_track(samples, sample_rate, options, external)?;
    let mut frames = analyze_frames(samples, sample_rate, &selection.track);
    let hop_seconds = frames.first().map(|f| f.duration_sec).unwrap_or(0.0);
    let report = classify_frames(&mut frames, options, hop_seconds);

    // Segments
    let total_duration_sec = samples.len() as f64 / sample_rate as f64;
    let mut segments = build_segments(&frames, total_duration_sec, options);

    // Key
    let detected = detect_key_from_segments(&segments, &KeyTemplates::new());
    let (key, root_pc, scale): (String, usize, Scale) = match options.key_mode {
        KeyMode::Auto => (detected.key.clone(), detected.root, detected.scale),
        KeyMode::Manual => (
            options.key.clone(),
            key_to_pitch_class(&options.key),
            options.scale,
        ),
    };

    // Pitch and rhythm quantization
    PitchQuantizer::new(options, root_pc, scale).apply(&mut segments);
    let mut segments = coalesce_segments(segments);
    quantize_segments(&mut segments, options.effective_bpm(), options.grid_unit());

    let flats = prefers_flats(&key);
    for segment in segments.iter_mut() {
        segment.respell(flats);
    }

    let melody = coalesce_steps(
        segments
            .iter()
            .map(|s| {
                if s.is_rest {
                    MelodyStep::rest(s.beats)
                } else {
                    MelodyStep::note(s.note_name.clone(), s.beats)
                }
            })
            .collect(),
    );

    let warning = voicing_warning(&report, options.analysis_mode);
    if report.recovery_used() {
        log::warn!(
            "Voicing recovery used (adaptive: {}, gap-filled frames: {})",
            report.adaptive_used,
            report.gap_filled_frames
        );
    }

    let debug = AnalysisDebug {
        frame_count: frames.len(),
        initial_voiced_ratio: report.initial_voiced_ratio,
        voiced_ratio: report.voiced_ratio,
        rms_threshold: report.thresholds.rms,
        clarity_threshold: report.thresholds.clarity,
        adaptive_thresholds_used: report.adaptive_used,
        gap_filled_frames: report.gap_filled_frames,
        frame_source: selection.track.backend.clone(),
        key_confidence: detected.confidence,
        external_key: external.and_then(|e| e.key.clone()),
        external_scale: external.and_then(|e| e.scale.clone()),
        external_key_strength: external.and_then(|e| e.key_strength),
        external_bpm: external.and_then(|e| e.bpm),
    };

    log::debug!(
        "Transcription done: {} segments, {} melody steps, key {} {} (using {} {})",
        segments.len(),
        melody.len(),
        detected.key,
        detected.scale.name(),
        key,
        scale.name()
    );

    Ok(AnalyzeResult {
        melody,
        segments,
        suggested_key: detected.key,
        suggested_scale: detected.scale,
        warning,
        debug: Some(debug),
        estimator_error: selection.estimator_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::result::total_beats;
    use crate::theory::midi_to_freq;

    fn tone(freqs: &[(f32, f32)], sample_rate: u32) -> Vec<f32> {
        let mut out = Vec::new();
        for &(freq, seconds) in freqs {
            let n = (seconds * sample_rate as f32) as usize;
            out.extend((0..n).map(|i| {
                if freq > 0.0 {
                    0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
                } else {
                    0.0
                }
            }));
        }
        out
    }

    #[test]
    fn test_rejects_empty_and_zero_rate() {
        let options = AnalysisOptions::default();
        assert!(matches!(
            analyze(&[], 44100, &options, None),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            analyze(&[0.0; 100], 0, &options, None),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_silence_gives_rest_and_warning() {
        let samples = vec![0.0f32; 88200];
        let result = analyze(&samples, 44100, &AnalysisOptions::default(), None).unwrap();
        assert!(result.melody.iter().all(|s| s.is_rest()));
        assert!(result.melody.len() <= 1);
        assert_eq!(result.warning.as_deref(), Some(LOW_VOICED_MONOPHONIC_WARNING));
        assert_eq!(result.suggested_key, "C");
        assert_eq!(result.suggested_scale, Scale::Major);
    }

    #[test]
    fn test_two_note_melody() {
        let sr = 44100;
        let samples = tone(&[(midi_to_freq(67.0), 0.5), (midi_to_freq(72.0), 0.5)], sr);
        let result = analyze(&samples, sr, &AnalysisOptions::default(), None).unwrap();

        let notes: Vec<&str> = result
            .melody
            .iter()
            .filter(|s| !s.is_rest())
            .map(|s| s.note.as_str())
            .collect();
        assert_eq!(notes, vec!["G4", "C5"]);
        let segment_beats: f64 = result.segments.iter().map(|s| s.beats).sum();
        assert!((total_beats(&result.melody) - segment_beats).abs() < 1e-6);
        assert_eq!(result.debug.as_ref().map(|d| d.frame_source.as_str()), Some("mcleod"));
    }

    #[test]
    fn test_manual_key_changes_spelling_only() {
        let sr = 44100;
        let samples = tone(&[(midi_to_freq(70.0), 0.6)], sr);
        let options = AnalysisOptions {
            key_mode: KeyMode::Manual,
            key: "F".to_string(),
            ..AnalysisOptions::default()
        };
        let result = analyze(&samples, sr, &options, None).unwrap();
        assert!(result.melody.iter().any(|s| s.note == "Bb4"));
        // Suggested key still comes from detection
        assert_eq!(result.suggested_key, "Bb");
    }

    #[test]
    fn test_malformed_external_falls_back() {
        let sr = 44100;
        let samples = tone(&[(440.0, 0.5)], sr);
        let external = ExternalPitchResult {
            backend: "worker".to_string(),
            hop_seconds: 0.01,
            pitch_hz: vec![440.0; 10],
            pitch_confidence: vec![0.9; 5],
            ..ExternalPitchResult::default()
        };
        let options = AnalysisOptions {
            analysis_mode: AnalysisMode::FullMix,
            ..AnalysisOptions::default()
        };
        let result = analyze(&samples, sr, &options, Some(&external)).unwrap();
        assert!(result.estimator_error.is_some());
        assert_eq!(
            result.debug.as_ref().map(|d| d.frame_source.as_str()),
            Some("harmonic_sum")
        );
    }

    #[test]
    fn test_external_track_is_used_in_full_mix() {
        let sr = 44100;
        let samples = tone(&[(440.0, 1.0)], sr);
        let hops = 100;
        let external = ExternalPitchResult {
            backend: "worker".to_string(),
            hop_seconds: 0.01,
            pitch_hz: vec![440.0; hops],
            pitch_confidence: vec![0.9; hops],
            key: Some("A".to_string()),
            ..ExternalPitchResult::default()
        };
        let options = AnalysisOptions {
            analysis_mode: AnalysisMode::FullMix,
            ..AnalysisOptions::default()
        };
        let result = analyze(&samples, sr, &options, Some(&external)).unwrap();
        assert!(result.estimator_error.is_none());
        let debug = result.debug.unwrap();
        assert_eq!(debug.frame_source, "worker");
        assert_eq!(debug.external_key.as_deref(), Some("A"));
        assert!(result.melody.iter().any(|s| s.note == "A4"));
    }
}
