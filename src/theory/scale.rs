//! Diatonic scales and scale snapping

use serde::{Deserialize, Serialize};

use super::pitch_class;

const MAJOR_INTERVALS: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_INTERVALS: [usize; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Scale type (mode) of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Ionian major scale
    #[default]
    Major,
    /// Natural minor scale
    Minor,
}

impl Scale {
    /// Scale degrees in semitones above the tonic
    pub fn intervals(&self) -> &'static [usize; 7] {
        match self {
            Scale::Major => &MAJOR_INTERVALS,
            Scale::Minor => &MINOR_INTERVALS,
        }
    }

    /// Size of the third above the tonic in semitones
    pub fn third(&self) -> i32 {
        match self {
            Scale::Major => 4,
            Scale::Minor => 3,
        }
    }

    /// Lowercase name ("major" / "minor")
    pub fn name(&self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
        }
    }

    /// Parse a scale name, case-insensitively
    pub fn from_name(name: &str) -> Option<Scale> {
        match name.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" => Some(Scale::Major),
            "minor" | "min" => Some(Scale::Minor),
            _ => None,
        }
    }
}

/// Pitch classes of the scale rooted at `root_pc`, tonic first
pub fn scale_pitch_classes(root_pc: usize, scale: Scale) -> [usize; 7] {
    let mut pcs = [0usize; 7];
    for (slot, interval) in pcs.iter_mut().zip(scale.intervals()) {
        *slot = (interval + root_pc) % 12;
    }
    pcs
}

/// Find the scale tone closest (in cents) to a fractional MIDI pitch
///
/// Searches `radius` semitones either side of the rounded pitch. Ties resolve
/// to the lower note.
///
/// # Returns
///
/// `(midi, cents)` of the best scale tone; `(rounded, f32::INFINITY)` if no
/// scale tone lies inside the search window.
pub fn nearest_scale_midi(midi_float: f32, pcs: &[usize], radius: i32) -> (i32, f32) {
    let center = midi_float.round() as i32;
    let mut best_midi = center;
    let mut best_cents = f32::INFINITY;

    for m in (center - radius)..=(center + radius) {
        if !pcs.contains(&pitch_class(m)) {
            continue;
        }
        let cents = ((midi_float - m as f32) * 100.0).abs();
        if cents < best_cents {
            best_cents = cents;
            best_midi = m;
        }
    }

    (best_midi, best_cents)
}

/// Snap an integer MIDI note to the nearest scale tone within `radius` semitones
pub fn nearest_scale_tone(midi: i32, pcs: &[usize], radius: i32) -> i32 {
    let mut best = midi;
    let mut best_diff = i32::MAX;
    for n in (midi - radius)..=(midi + radius) {
        if !pcs.contains(&pitch_class(n)) {
            continue;
        }
        let diff = (n - midi).abs();
        if diff < best_diff {
            best = n;
            best_diff = diff;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_pitch_classes() {
        assert_eq!(scale_pitch_classes(0, Scale::Major), [0, 2, 4, 5, 7, 9, 11]);
        assert_eq!(scale_pitch_classes(9, Scale::Minor), [9, 11, 0, 2, 4, 5, 7]);
        assert_eq!(scale_pitch_classes(7, Scale::Major)[6], 6); // F# leading tone
    }

    #[test]
    fn test_nearest_scale_midi() {
        let c_major = scale_pitch_classes(0, Scale::Major);

        // C#4 slightly sharp snaps up to D4
        let (midi, cents) = nearest_scale_midi(61.3, &c_major, 3);
        assert_eq!(midi, 62);
        assert!((cents - 70.0).abs() < 0.1);

        // In-scale pitch stays put
        let (midi, cents) = nearest_scale_midi(64.1, &c_major, 3);
        assert_eq!(midi, 64);
        assert!(cents < 11.0);
    }

    #[test]
    fn test_nearest_scale_tone_prefers_lower_on_tie() {
        let c_major = scale_pitch_classes(0, Scale::Major);
        // C#4 is equidistant from C4 and D4
        assert_eq!(nearest_scale_tone(61, &c_major, 5), 60);
        assert_eq!(nearest_scale_tone(62, &c_major, 5), 62);
    }

    #[test]
    fn test_scale_serde_names() {
        assert_eq!(Scale::Minor.name(), "minor");
        assert_eq!(Scale::Major.third(), 4);
        assert_eq!(Scale::Minor.third(), 3);
    }
}
