//! Music theory helpers shared by the transcription and arrangement stages
//!
//! - MIDI <-> frequency conversion
//! - Scientific pitch notation (sharp and flat spellings)
//! - Key name parsing
//! - Scales and scale snapping
//! - Octave folding

pub mod octave;
pub mod scale;

pub use octave::{clamp_jump, fold_into_range, fold_octave, MidiRange};
pub use scale::{nearest_scale_midi, nearest_scale_tone, scale_pitch_classes, Scale};

/// Marker used for rest steps in melody sequences
pub const REST: &str = "REST";

/// Reference pitch for MIDI note 69 (A4)
const A4_HZ: f32 = 440.0;

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Key names used when reporting a detected key (mixed sharp/flat spelling)
pub const KEY_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Keys whose notes read better with flat spellings
const FLAT_KEYS: [&str; 6] = ["F", "Bb", "Eb", "Ab", "Db", "Gb"];

/// Convert a (fractional) MIDI note number to frequency in Hz
pub fn midi_to_freq(midi: f32) -> f32 {
    A4_HZ * 2.0f32.powf((midi - 69.0) / 12.0)
}

/// Convert a frequency in Hz to a fractional MIDI note number
///
/// Returns `None` for non-positive or non-finite frequencies.
pub fn freq_to_midi_float(freq: f32) -> Option<f32> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    Some(69.0 + 12.0 * (freq / A4_HZ).log2())
}

/// Pitch class (0 = C ... 11 = B) of a MIDI note, valid for negative notes too
pub fn pitch_class(midi: i32) -> usize {
    midi.rem_euclid(12) as usize
}

/// Format a MIDI note in scientific pitch notation (e.g. 69 -> "A4")
///
/// # Example
///
/// ```
/// use whistle_dsp::theory::midi_to_note_name;
///
/// assert_eq!(midi_to_note_name(69, false), "A4");
/// assert_eq!(midi_to_note_name(70, true), "Bb4");
/// assert_eq!(midi_to_note_name(61, false), "C#4");
/// ```
pub fn midi_to_note_name(midi: i32, prefer_flats: bool) -> String {
    let octave = midi.div_euclid(12) - 1;
    let names = if prefer_flats {
        &NOTE_NAMES_FLAT
    } else {
        &NOTE_NAMES_SHARP
    };
    format!("{}{}", names[pitch_class(midi)], octave)
}

/// Parse a note in scientific pitch notation (e.g. "C#4", "Bb3", "C-1")
///
/// Returns `None` if the string is not a note name.
pub fn note_name_to_midi(note: &str) -> Option<i32> {
    let mut chars = note.chars();
    let letter = chars.next()?;
    let base: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = &note[1..];
    let (offset, octave_str) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let digits = octave_str.strip_prefix('-').unwrap_or(octave_str);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let octave: i32 = octave_str.parse().ok()?;
    octave.checked_add(1)?.checked_mul(12)?.checked_add(base + offset)
}

/// Resolve a key name ("C#", "Db", "A", ...) to its pitch class
///
/// Unknown names resolve to C (0).
pub fn key_to_pitch_class(key: &str) -> usize {
    NOTE_NAMES_SHARP
        .iter()
        .position(|&n| n == key)
        .or_else(|| NOTE_NAMES_FLAT.iter().position(|&n| n == key))
        .unwrap_or(0)
}

/// Whether notes in `key` should be spelled with flats
pub fn prefers_flats(key: &str) -> bool {
    FLAT_KEYS.contains(&key)
}
