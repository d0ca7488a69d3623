//! Voicing classification
//!
//! A frame is voiced when its energy, clarity and pitch all pass their gates:
//! `rms >= rms_threshold && clarity >= clarity_threshold && min_hz <= pitch <= max_hz`.
//!
//! Two recovery passes follow the initial classification:
//! 1. **Adaptive thresholds**: when too little of the buffer is voiced, the
//!    thresholds are relaxed from percentiles of the observed RMS and clarity
//!    distributions and every frame is classified again (once)
//! 2. **Gap filling**: short internal runs of rest frames between two voiced
//!    frames of similar pitch are interpolated back into a voiced line

use crate::config::{AnalysisMode, AnalysisOptions};
use crate::features::pitch::Frame;
use crate::features::stats::percentile;
use crate::theory::{freq_to_midi_float, midi_to_freq};

/// Full-mix RMS multiplier (harmonic-sum frames are quieter after emphasis)
const FULL_MIX_RMS_SCALE: f32 = 0.15;

/// Full-mix clarity multiplier (harmonic-sum confidence runs lower than MPM clarity)
const FULL_MIX_CLARITY_SCALE: f32 = 0.25;

/// Maximum gap (seconds) bridged in full-mix mode
const FULL_MIX_MAX_GAP_SEC: f64 = 0.22;

/// Maximum gap (frames) bridged in monophonic mode
const MONOPHONIC_MAX_GAP_FRAMES: usize = 2;

/// Effective voicing gates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoicingThresholds {
    /// Minimum RMS energy
    pub rms: f32,
    /// Minimum clarity
    pub clarity: f32,
    /// Lowest accepted pitch in Hz
    pub min_hz: f32,
    /// Highest accepted pitch in Hz
    pub max_hz: f32,
}

impl VoicingThresholds {
    /// Thresholds for the configured analysis mode
    pub fn from_options(options: &AnalysisOptions) -> Self {
        let (rms_scale, clarity_scale) = match options.analysis_mode {
            AnalysisMode::Monophonic => (1.0, 1.0),
            AnalysisMode::FullMix => (FULL_MIX_RMS_SCALE, FULL_MIX_CLARITY_SCALE),
        };
        Self {
            rms: options.rms_threshold.max(0.0) * rms_scale,
            clarity: options.clarity_threshold.max(0.0) * clarity_scale,
            min_hz: options.min_hz,
            max_hz: options.max_hz,
        }
    }

    /// Whether a frame passes all gates
    pub fn is_voiced(&self, frame: &Frame) -> bool {
        let in_band = frame
            .pitch_hz
            .map(|hz| hz >= self.min_hz && hz <= self.max_hz)
            .unwrap_or(false);
        frame.rms >= self.rms && frame.clarity >= self.clarity && in_band
    }
}

/// Per-mode parameters of the adaptive fallback and gap filler
#[derive(Debug, Clone, Copy, PartialEq)]
struct RecoveryParams {
    trigger_ratio: f32,
    rms_percentile: f32,
    rms_scale: f32,
    rms_floor: f32,
    clarity_percentile: f32,
    clarity_scale: f32,
    clarity_floor: f32,
    max_gap_jump: f32,
}

impl RecoveryParams {
    fn for_mode(mode: AnalysisMode) -> Self {
        match mode {
            AnalysisMode::Monophonic => Self {
                trigger_ratio: 0.20,
                rms_percentile: 0.28,
                rms_scale: 0.75,
                rms_floor: 0.001,
                clarity_percentile: 0.40,
                clarity_scale: 0.9,
                clarity_floor: 0.5,
                max_gap_jump: 2.0,
            },
            AnalysisMode::FullMix => Self {
                trigger_ratio: 0.22,
                rms_percentile: 0.35,
                rms_scale: 0.9,
                rms_floor: 0.0005,
                clarity_percentile: 0.40,
                clarity_scale: 0.9,
                clarity_floor: 0.05,
                max_gap_jump: 2.5,
            },
        }
    }
}

/// Outcome of voicing classification
#[derive(Debug, Clone, PartialEq)]
pub struct VoicingReport {
    /// Thresholds finally applied
    pub thresholds: VoicingThresholds,
    /// Voiced ratio with the initial thresholds
    pub initial_voiced_ratio: f32,
    /// Voiced ratio after recovery
    pub voiced_ratio: f32,
    /// Whether the adaptive thresholds replaced the configured ones
    pub adaptive_used: bool,
    /// Rest frames converted to voiced by gap filling
    pub gap_filled_frames: usize,
}

impl VoicingReport {
    /// Whether any recovery pass changed the classification
    pub fn recovery_used(&self) -> bool {
        self.adaptive_used || self.gap_filled_frames > 0
    }
}

/// Classify every frame against fixed thresholds
///
/// Voiced frames get `midi_float` from their pitch; rest frames lose it.
///
/// # Returns
///
/// Number of voiced frames
pub fn classify(frames: &mut [Frame], thresholds: &VoicingThresholds) -> usize {
    let mut voiced = 0;
    for frame in frames.iter_mut() {
        let midi = if thresholds.is_voiced(frame) {
            frame.pitch_hz.and_then(freq_to_midi_float)
        } else {
            None
        };
        frame.is_rest = midi.is_none();
        frame.midi_float = midi;
        if midi.is_some() {
            voiced += 1;
        }
    }
    voiced
}

/// Fraction of frames that are voiced (0.0 for no frames)
pub fn voiced_ratio(frames: &[Frame]) -> f32 {
    if frames.is_empty() {
        return 0.0;
    }
    frames.iter().filter(|f| !f.is_rest).count() as f32 / frames.len() as f32
}

/// Thresholds relaxed from the observed RMS/clarity distributions
///
/// The result never exceeds the current thresholds.
pub fn adaptive_thresholds(
    frames: &[Frame],
    current: &VoicingThresholds,
    mode: AnalysisMode,
) -> VoicingThresholds {
    let params = RecoveryParams::for_mode(mode);
    let rms_values: Vec<f32> = frames.iter().map(|f| f.rms).collect();
    let clarity_values: Vec<f32> = frames.iter().map(|f| f.clarity).collect();

    let rms = (percentile(&rms_values, params.rms_percentile) * params.rms_scale)
        .max(params.rms_floor)
        .min(current.rms);
    let clarity = (percentile(&clarity_values, params.clarity_percentile) * params.clarity_scale)
        .max(params.clarity_floor)
        .min(current.clarity);

    VoicingThresholds {
        rms,
        clarity,
        ..*current
    }
}

/// Convert short internal rest runs back to voiced frames
///
/// A run of at most `max_gap` rest frames with voiced frames on both sides is
/// filled by linear interpolation of `midi_float`, provided the flanking
/// pitches are within `max_jump` semitones. Leading and trailing rests are
/// never filled.
///
/// # Returns
///
/// Number of frames filled
pub fn fill_gaps(frames: &mut [Frame], max_gap: usize, max_jump: f32) -> usize {
    let mut filled = 0;
    let mut i = 0;
    while i < frames.len() {
        if !frames[i].is_rest {
            i += 1;
            continue;
        }
        let start = i;
        while i < frames.len() && frames[i].is_rest {
            i += 1;
        }
        let len = i - start;
        if start == 0 || i == frames.len() || len > max_gap {
            continue;
        }
        let (a, b) = match (frames[start - 1].midi_float, frames[i].midi_float) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        if (a - b).abs() > max_jump {
            continue;
        }
        for (k, frame) in frames[start..i].iter_mut().enumerate() {
            let t = (k + 1) as f32 / (len + 1) as f32;
            let midi = a + (b - a) * t;
            frame.midi_float = Some(midi);
            frame.pitch_hz = Some(midi_to_freq(midi));
            frame.is_rest = false;
        }
        filled += len;
    }
    filled
}

/// Run classification, adaptive recovery and gap filling
///
/// # Arguments
///
/// * `frames` - Unclassified frames (modified in place)
/// * `options` - Analysis options (thresholds, band, mode)
/// * `hop_seconds` - Frame hop, used to convert the full-mix gap cap to frames
pub fn classify_frames(
    frames: &mut [Frame],
    options: &AnalysisOptions,
    hop_seconds: f64,
) -> VoicingReport {
    let mode = options.analysis_mode;
    let params = RecoveryParams::for_mode(mode);
    let mut thresholds = VoicingThresholds::from_options(options);

    classify(frames, &thresholds);
    let initial_voiced_ratio = voiced_ratio(frames);

    let mut adaptive_used = false;
    if !frames.is_empty() && initial_voiced_ratio < params.trigger_ratio {
        let relaxed = adaptive_thresholds(frames, &thresholds, mode);
        if relaxed != thresholds {
            log::debug!(
                "Voiced ratio {:.3} below {:.2}; relaxing thresholds rms {:.4} -> {:.4}, clarity {:.3} -> {:.3}",
                initial_voiced_ratio,
                params.trigger_ratio,
                thresholds.rms,
                relaxed.rms,
                thresholds.clarity,
                relaxed.clarity
            );
            thresholds = relaxed;
            let before = frames.iter().filter(|f| !f.is_rest).count();
            let after = classify(frames, &thresholds);
            adaptive_used = after > before;
        }
    }

    let max_gap = match mode {
        AnalysisMode::Monophonic => MONOPHONIC_MAX_GAP_FRAMES,
        AnalysisMode::FullMix => {
            if hop_seconds > 0.0 {
                (FULL_MIX_MAX_GAP_SEC / hop_seconds).round() as usize
            } else {
                0
            }
        }
    };
    let gap_filled_frames = fill_gaps(frames, max_gap, params.max_gap_jump);

    let report = VoicingReport {
        thresholds,
        initial_voiced_ratio,
        voiced_ratio: voiced_ratio(frames),
        adaptive_used,
        gap_filled_frames,
    };

    log::debug!(
        "Voicing: {:.3} -> {:.3} voiced (adaptive: {}, gap-filled frames: {})",
        report.initial_voiced_ratio,
        report.voiced_ratio,
        report.adaptive_used,
        report.gap_filled_frames
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(rms: f32, clarity: f32, hz: Option<f32>) -> Frame {
        Frame {
            time_sec: 0.0,
            duration_sec: 0.01,
            rms,
            clarity,
            pitch_hz: hz,
            midi_float: None,
            is_rest: true,
        }
    }

    fn voiced_at(midi: f32) -> Frame {
        let mut f = frame(0.1, 0.9, Some(midi_to_freq(midi)));
        f.midi_float = Some(midi);
        f.is_rest = false;
        f
    }

    #[test]
    fn test_gates() {
        let th = VoicingThresholds::from_options(&AnalysisOptions::default());
        assert!(th.is_voiced(&frame(0.05, 0.9, Some(440.0))));
        assert!(!th.is_voiced(&frame(0.01, 0.9, Some(440.0))));
        assert!(!th.is_voiced(&frame(0.05, 0.5, Some(440.0))));
        assert!(!th.is_voiced(&frame(0.05, 0.9, Some(100.0))));
        assert!(!th.is_voiced(&frame(0.05, 0.9, None)));
    }

    #[test]
    fn test_full_mix_relaxed_multipliers() {
        let options = AnalysisOptions {
            analysis_mode: AnalysisMode::FullMix,
            ..Default::default()
        };
        let th = VoicingThresholds::from_options(&options);
        assert!((th.rms - 0.003).abs() < 1e-6);
        assert!((th.clarity - 0.1875).abs() < 1e-6);
    }

    #[test]
    fn test_classify_sets_midi() {
        let th = VoicingThresholds::from_options(&AnalysisOptions::default());
        let mut frames = vec![frame(0.05, 0.9, Some(440.0)), frame(0.0, 0.0, None)];
        assert_eq!(classify(&mut frames, &th), 1);
        assert!((frames[0].midi_float.unwrap() - 69.0).abs() < 1e-3);
        assert!(frames[1].is_rest);
        assert_eq!(frames[1].midi_float, None);
        assert!((voiced_ratio(&frames) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_adaptive_thresholds_only_relax() {
        let frames: Vec<Frame> = (0..10).map(|_| frame(0.5, 0.99, Some(440.0))).collect();
        let current = VoicingThresholds::from_options(&AnalysisOptions::default());
        let relaxed = adaptive_thresholds(&frames, &current, AnalysisMode::Monophonic);
        assert_eq!(relaxed.rms, current.rms);
        assert_eq!(relaxed.clarity, current.clarity);
    }

    #[test]
    fn test_adaptive_recovery_for_quiet_input() {
        // Quiet but clean tone: below the default RMS gate
        let mut frames: Vec<Frame> = (0..20).map(|_| frame(0.008, 0.95, Some(440.0))).collect();
        let report = classify_frames(&mut frames, &AnalysisOptions::default(), 0.0116);
        assert_eq!(report.initial_voiced_ratio, 0.0);
        assert!(report.adaptive_used);
        assert_eq!(report.voiced_ratio, 1.0);
        assert!(report.thresholds.rms < 0.02);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut frames: Vec<Frame> = (0..20).map(|_| frame(0.0, 0.0, None)).collect();
        let report = classify_frames(&mut frames, &AnalysisOptions::default(), 0.0116);
        assert_eq!(report.voiced_ratio, 0.0);
        assert!(!report.recovery_used());
    }

    #[test]
    fn test_fill_gaps_interpolates_short_internal_runs() {
        let mut frames = vec![
            voiced_at(60.0),
            frame(0.0, 0.0, None),
            frame(0.0, 0.0, None),
            voiced_at(61.5),
        ];
        assert_eq!(fill_gaps(&mut frames, 2, 2.0), 2);
        assert!((frames[1].midi_float.unwrap() - 60.5).abs() < 1e-5);
        assert!((frames[2].midi_float.unwrap() - 61.0).abs() < 1e-5);
        assert!(frames.iter().all(|f| !f.is_rest));
    }

    #[test]
    fn test_fill_gaps_respects_caps() {
        // Too long
        let mut frames = vec![voiced_at(60.0), frame(0.0, 0.0, None), frame(0.0, 0.0, None), frame(0.0, 0.0, None), voiced_at(60.0)];
        assert_eq!(fill_gaps(&mut frames, 2, 2.0), 0);

        // Too far apart
        let mut frames = vec![voiced_at(60.0), frame(0.0, 0.0, None), voiced_at(64.0)];
        assert_eq!(fill_gaps(&mut frames, 2, 2.0), 0);

        // Leading and trailing rests
        let mut frames = vec![frame(0.0, 0.0, None), voiced_at(60.0), frame(0.0, 0.0, None)];
        assert_eq!(fill_gaps(&mut frames, 2, 2.0), 0);
        assert!(frames[0].is_rest && frames[2].is_rest);
    }
}
