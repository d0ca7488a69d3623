//! Octave folding
//!
//! One utility backs every "stay near the previous note" heuristic in the
//! crate: full-mix octave normalization, bass register folding and the lead
//! and full-mix jump clamps.

use super::freq_to_midi_float;

/// Inclusive MIDI note range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiRange {
    /// Lowest allowed note
    pub low: i32,
    /// Highest allowed note
    pub high: i32,
}

impl MidiRange {
    /// Create a range; bounds are reordered if given backwards
    pub fn new(low: i32, high: i32) -> Self {
        Self {
            low: low.min(high),
            high: low.max(high),
        }
    }

    /// Melodic range implied by a frequency band, widened to at least one octave
    ///
    /// Invalid frequencies fall back to C3..C6.
    pub fn from_hz(min_hz: f32, max_hz: f32) -> Self {
        let low = freq_to_midi_float(min_hz).map(|m| m.ceil() as i32);
        let high = freq_to_midi_float(max_hz).map(|m| m.floor() as i32);
        match (low, high) {
            (Some(low), Some(high)) => {
                let range = Self::new(low, high);
                if range.high - range.low < 12 {
                    Self::new(range.low, range.low + 12)
                } else {
                    range
                }
            }
            _ => Self::new(48, 84),
        }
    }

    /// Whether `midi` lies inside the range
    pub fn contains(&self, midi: i32) -> bool {
        midi >= self.low && midi <= self.high
    }
}

/// Transpose by octaves into `range`, clamping if the range is narrower than an octave
pub fn fold_into_range(midi: i32, range: MidiRange) -> i32 {
    let mut out = midi;
    while out < range.low {
        out += 12;
    }
    while out > range.high {
        out -= 12;
    }
    out.clamp(range.low, range.high)
}

/// Limit the interval from `previous` to at most `max_jump` semitones
pub fn clamp_jump(midi: i32, previous: i32, max_jump: i32) -> i32 {
    let max_jump = max_jump.abs();
    midi.clamp(previous - max_jump, previous + max_jump)
}

/// Fold a candidate note into `range`, preferring the octave nearest `previous`
///
/// 1. Transpose the candidate into the range by octaves.
/// 2. If a previous note exists, try one octave down and up (staying inside the
///    range) and keep whichever is closest to it.
/// 3. If `max_jump` is given, clamp the remaining interval to `±max_jump`.
///
/// # Example
///
/// ```
/// use whistle_dsp::theory::{fold_octave, MidiRange};
///
/// let range = MidiRange::new(48, 84);
/// // 79 (G5) after 62 (D4): G4 (67) is the nearer octave
/// assert_eq!(fold_octave(79, Some(62), range, None), 67);
/// // Jump clamp applies after octave choice
/// assert_eq!(fold_octave(79, Some(55), range, Some(7)), 62);
/// ```
pub fn fold_octave(
    candidate: i32,
    previous: Option<i32>,
    range: MidiRange,
    max_jump: Option<i32>,
) -> i32 {
    let mut folded = fold_into_range(candidate, range);

    if let Some(prev) = previous {
        for shifted in [folded - 12, folded + 12] {
            if range.contains(shifted) && (shifted - prev).abs() < (folded - prev).abs() {
                folded = shifted;
            }
        }
        if let Some(max_jump) = max_jump {
            folded = clamp_jump(folded, prev, max_jump);
        }
    }

    folded
}
