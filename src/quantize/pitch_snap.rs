//! Scale snapping and full-mix octave normalization
//!
//! Each voiced segment is snapped to the scale tone closest (in cents) to its
//! unrounded pitch, searched within ±3 semitones. A snap is rejected when it
//! misses the tolerance, or when the jump guard fires: the snapped note would
//! leap more than an octave from the previous note while the raw pitch stays
//! within a fifth of it.
//!
//! In full-mix mode every pitch is first folded into the melodic range
//! implied by the frequency band (nearest octave to the previous note), very
//! short segments are never snapped, and the final interval to the previous
//! note is clamped to ±7 semitones.

use crate::analysis::result::Segment;
use crate::config::{AnalysisMode, AnalysisOptions};
use crate::theory::{clamp_jump, fold_octave, nearest_scale_midi, scale_pitch_classes, MidiRange, Scale};

/// Semitones searched either side of the rounded pitch for a scale tone
pub const SNAP_SEARCH_RADIUS: i32 = 3;

/// Jump guard: snapped interval above which a snap is suspicious (tunable)
pub const GUARD_SNAPPED_JUMP: i32 = 12;

/// Jump guard: raw interval at or below which the snapped leap is rejected (tunable)
pub const GUARD_RAW_JUMP: i32 = 7;

/// Largest interval between consecutive notes in full-mix mode
const FULL_MIX_MAX_JUMP: i32 = 7;

/// Full-mix segments shorter than this multiple of the minimum note length are not snapped
const FULL_MIX_SNAP_VETO: f64 = 1.35;

/// Whether a snap from `raw` to `snapped` would invent an octave leap
///
/// # Example
///
/// ```
/// use whistle_dsp::quantize::jump_guard_fires;
///
/// assert!(jump_guard_fires(Some(60), 61, 73));
/// assert!(!jump_guard_fires(Some(60), 61, 62));
/// assert!(!jump_guard_fires(None, 61, 73));
/// ```
pub fn jump_guard_fires(previous: Option<i32>, raw: i32, snapped: i32) -> bool {
    match previous {
        Some(prev) => (snapped - prev).abs() > GUARD_SNAPPED_JUMP && (raw - prev).abs() <= GUARD_RAW_JUMP,
        None => false,
    }
}

/// Decide between the rounded raw pitch and a scale candidate
///
/// # Arguments
///
/// * `raw_midi_float` - Unrounded pitch estimate
/// * `candidate` - Nearest scale tone
/// * `cents` - Deviation of the candidate from the raw estimate
/// * `previous` - Previous note, if any
/// * `tolerance_cents` - Largest accepted deviation
///
/// # Returns
///
/// The candidate if it is within tolerance and the jump guard stays quiet,
/// otherwise the rounded raw pitch
pub fn resolve_snap(
    raw_midi_float: f32,
    candidate: i32,
    cents: f32,
    previous: Option<i32>,
    tolerance_cents: f32,
) -> i32 {
    let raw = raw_midi_float.round() as i32;
    if !(cents <= tolerance_cents) {
        return raw;
    }
    if jump_guard_fires(previous, raw, candidate) {
        log::debug!(
            "Jump guard kept {} instead of {} (previous {:?})",
            raw,
            candidate,
            previous
        );
        return raw;
    }
    candidate
}

/// Segment pitch quantizer for one transcription
#[derive(Debug, Clone)]
pub struct PitchQuantizer {
    scale_pcs: Option<[usize; 7]>,
    tolerance_cents: f32,
    full_mix: bool,
    range: MidiRange,
    min_snap_sec: f64,
}

impl PitchQuantizer {
    /// Build a quantizer for the active key
    ///
    /// Snapping is disabled when `options.snap_enabled` is false; full-mix
    /// octave normalization still applies.
    pub fn new(options: &AnalysisOptions, root_pc: usize, scale: Scale) -> Self {
        let min_note_sec = if options.min_note_ms.is_finite() {
            options.min_note_ms.max(0.0) / 1000.0
        } else {
            0.0
        };
        let tolerance = if options.snap_tolerance_cents.is_finite() {
            options.snap_tolerance_cents.max(0.0)
        } else {
            0.0
        };
        Self {
            scale_pcs: options
                .snap_enabled
                .then(|| scale_pitch_classes(root_pc % 12, scale)),
            tolerance_cents: tolerance,
            full_mix: options.analysis_mode == AnalysisMode::FullMix,
            range: MidiRange::from_hz(options.min_hz, options.max_hz),
            min_snap_sec: FULL_MIX_SNAP_VETO * min_note_sec,
        }
    }

    /// Final pitch of one voiced segment
    ///
    /// # Returns
    ///
    /// `(midi, midi_float)` where `midi_float` is the unsnapped (but octave
    /// folded) estimate, or `None` for rests
    pub fn quantize_segment(&self, segment: &Segment, previous: Option<i32>) -> Option<(i32, f32)> {
        if segment.is_rest {
            return None;
        }
        let mut raw_float = segment
            .midi_float
            .or_else(|| segment.midi.map(|m| m as f32))?;

        if self.full_mix {
            let raw = raw_float.round() as i32;
            let folded = fold_octave(raw, previous, self.range, None);
            raw_float += (folded - raw) as f32;
        }

        let snap_allowed = !self.full_mix || segment.duration_sec >= self.min_snap_sec;
        let mut midi = match (&self.scale_pcs, snap_allowed) {
            (Some(pcs), true) => {
                let (candidate, cents) = nearest_scale_midi(raw_float, pcs, SNAP_SEARCH_RADIUS);
                resolve_snap(raw_float, candidate, cents, previous, self.tolerance_cents)
            }
            _ => raw_float.round() as i32,
        };

        if self.full_mix {
            if let Some(prev) = previous {
                midi = clamp_jump(midi, prev, FULL_MIX_MAX_JUMP);
            }
        }
        Some((midi, raw_float))
    }

    /// Quantize every voiced segment in place
    ///
    /// The previous note is carried across rests.
    ///
    /// # Returns
    ///
    /// Number of segments whose integer pitch changed
    pub fn apply(&self, segments: &mut [Segment]) -> usize {
        let mut previous: Option<i32> = None;
        let mut changed = 0;
        for segment in segments.iter_mut() {
            if let Some((midi, midi_float)) = self.quantize_segment(segment, previous) {
                if segment.midi != Some(midi) {
                    changed += 1;
                }
                segment.set_pitch(midi, midi_float);
                previous = Some(midi);
            }
        }
        log::debug!(
            "Pitch quantization: {} of {} segments moved (snap {}, full mix {})",
            changed,
            segments.len(),
            self.scale_pcs.is_some(),
            self.full_mix
        );
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(mode: AnalysisMode) -> AnalysisOptions {
        AnalysisOptions {
            analysis_mode: mode,
            ..AnalysisOptions::default()
        }
    }

    #[test]
    fn test_jump_guard_scenario() {
        // Previous 60, raw 61, scale candidate 73: guard fires, raw kept
        assert!(jump_guard_fires(Some(60), 61, 73));
        assert_eq!(resolve_snap(61.0, 73, 0.0, Some(60), 50.0), 61);
        // Without a previous note the candidate is accepted
        assert_eq!(resolve_snap(61.0, 73, 0.0, None, 50.0), 73);
    }

    #[test]
    fn test_guard_quiet_when_raw_leap_is_real() {
        // Raw leap of 9 semitones supports a 13-semitone snap
        assert!(!jump_guard_fires(Some(60), 69, 73));
    }

    #[test]
    fn test_tolerance_rejects_far_candidates() {
        assert_eq!(resolve_snap(61.4, 62, 60.0, None, 50.0), 61);
        assert_eq!(resolve_snap(61.6, 62, 40.0, None, 50.0), 62);
        assert_eq!(resolve_snap(61.6, 62, f32::INFINITY, None, 50.0), 62);
    }

    #[test]
    fn test_monophonic_snaps_to_c_major() {
        let quantizer = PitchQuantizer::new(&options(AnalysisMode::Monophonic), 0, Scale::Major);
        let mut segments = vec![
            Segment::voiced(0.0, 0.3, 61.7),
            Segment::rest(0.3, 0.2),
            Segment::voiced(0.5, 0.3, 64.1),
        ];
        let changed = quantizer.apply(&mut segments);
        assert_eq!(segments[0].midi, Some(62));
        assert_eq!(segments[0].note_name, "D4");
        // Unsnapped estimate is preserved
        assert!((segments[0].midi_float.unwrap() - 61.7).abs() < 1e-5);
        assert_eq!(segments[2].midi, Some(64));
        assert_eq!(changed, 0);
        assert!(segments[1].is_rest);
    }

    #[test]
    fn test_snap_disabled_rounds() {
        let mut opts = options(AnalysisMode::Monophonic);
        opts.snap_enabled = false;
        let quantizer = PitchQuantizer::new(&opts, 0, Scale::Major);
        let mut segments = vec![Segment::voiced(0.0, 0.3, 61.2)];
        quantizer.apply(&mut segments);
        assert_eq!(segments[0].midi, Some(61));
    }

    #[test]
    fn test_full_mix_folds_octave_and_clamps() {
        let mut opts = options(AnalysisMode::FullMix);
        opts.snap_enabled = false;
        let quantizer = PitchQuantizer::new(&opts, 0, Scale::Major);
        let mut segments = vec![
            Segment::voiced(0.0, 0.4, 57.0),
            // The octave below leaves the range, so the leap is clamped to seven
            Segment::voiced(0.4, 0.4, 67.0),
            // Nearest octave to the previous note wins
            Segment::voiced(0.8, 0.4, 81.0),
        ];
        quantizer.apply(&mut segments);
        assert_eq!(segments[1].midi, Some(64));
        assert!((segments[1].midi_float.unwrap() - 67.0).abs() < 1e-5);
        assert_eq!(segments[2].midi, Some(69));
        assert!((segments[2].midi_float.unwrap() - 69.0).abs() < 1e-5);
    }

    #[test]
    fn test_full_mix_short_segments_not_snapped() {
        let quantizer = PitchQuantizer::new(&options(AnalysisMode::FullMix), 0, Scale::Major);
        // 0.1 s is below 1.35 * 80 ms
        let mut short = vec![Segment::voiced(0.0, 0.1, 61.0)];
        quantizer.apply(&mut short);
        assert_eq!(short[0].midi, Some(61));

        let mut long = vec![Segment::voiced(0.0, 0.3, 61.6)];
        quantizer.apply(&mut long);
        assert_eq!(long[0].midi, Some(62));
    }
}
