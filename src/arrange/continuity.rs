//! Rest continuity post-processing
//!
//! In seamless mode the lead line loses its short gaps and long silences,
//! and the accompaniment tracks get their rests replaced by generated
//! material. Natural mode returns the arrangement unchanged.
//!
//! Lead rules, scaled by intensity (0-100):
//! - a rest of at most 160-320 ms between two notes is removed; equal
//!   neighbours merge into one note, otherwise the previous note absorbs the
//!   rest and takes the continuation pitch
//! - a leading or trailing rest is clamped to half a beat
//! - a rest longer than 0.75-1.5 beats is cut to the cap and the remainder is
//!   filled with a quieter repeat of the previous note

use serde::{Deserialize, Serialize};

use crate::analysis::result::{coalesce_steps, MelodyStep};
use crate::config::{sanitize_bpm, GridType};
use crate::quantize::snap_to_grid;
use crate::theory::key_to_pitch_class;

use super::arranger::{drum_hit, HAT};
use super::tracks::{Arrangement, ArrangementTrack, TrackRole};

/// Default intensity
pub const DEFAULT_INTENSITY: f64 = 50.0;

/// Longest leading/trailing lead rest in beats
const EDGE_REST_BEATS: f64 = 0.5;

/// Tempo floor used when converting rest lengths to milliseconds
const MIN_CONTINUITY_BPM: f64 = 30.0;

/// Intensity at or above which fills use sixteenth cells
const DENSE_FILL_INTENSITY: f64 = 70.0;

/// Velocity of the note continuing into a shortened rest
const CONTINUATION_VELOCITY: u8 = 56;

const HARMONY_FILL_VELOCITY: u8 = 62;
const BASS_FILL_VELOCITY: u8 = 72;
const DRUM_FILL_VELOCITY: u8 = 86;
const HAT_FILL_VELOCITY: u8 = 54;

const EPSILON: f64 = 1e-9;

/// Rest-handling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuityMode {
    /// Bridge lead gaps and fill accompaniment rests
    #[default]
    Seamless,
    /// Leave rests as transcribed
    Natural,
}

/// Continuity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuityOptions {
    /// Policy (default: seamless)
    pub mode: ContinuityMode,

    /// Strength from 0 to 100 (default: 50)
    pub intensity: f64,

    /// Grid the accompaniment is re-quantized to (default: eighth)
    pub grid: GridType,

    /// Triplet grid (default: false)
    pub triplets: bool,
}

impl Default for ContinuityOptions {
    fn default() -> Self {
        Self {
            mode: ContinuityMode::Seamless,
            intensity: DEFAULT_INTENSITY,
            grid: GridType::Eighth,
            triplets: false,
        }
    }
}

impl ContinuityOptions {
    /// Intensity clamped to [0, 100]; non-finite values use the default
    pub fn clamped_intensity(&self) -> f64 {
        if self.intensity.is_finite() {
            self.intensity.clamp(0.0, 100.0)
        } else {
            DEFAULT_INTENSITY
        }
    }

    /// Longest lead rest (ms) that is bridged: 160 ms at 0, 320 ms at 100
    pub fn bridge_ms(&self) -> f64 {
        (160.0 + self.clamped_intensity() / 100.0 * 160.0).round()
    }

    /// Longest lead rest (beats) kept intact: 0.75 at 0, 1.5 at 100
    pub fn max_lead_rest_beats(&self) -> f64 {
        0.75 + self.clamped_intensity() / 100.0 * 0.75
    }

    /// Cell length of generated fills before grid quantization
    pub fn fill_density(&self) -> f64 {
        if self.clamped_intensity() >= DENSE_FILL_INTENSITY {
            0.25
        } else {
            0.5
        }
    }

    /// Grid unit in beats
    pub fn unit(&self) -> f64 {
        self.grid.unit_beats(self.triplets)
    }
}

/// What the continuity pass changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContinuityStats {
    /// Lead rests bridged away
    pub rests_removed: usize,
    /// Lead rests clamped or cut
    pub rests_shortened: usize,
    /// Lead continuation notes plus filled accompaniment rests
    pub fills_inserted: usize,
}

/// Continuity output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuityResult {
    /// Adjusted arrangement
    pub arrangement: Arrangement,
    /// Counters
    pub stats: ContinuityStats,
}

/// Pitch the previous note continues with when a gap is bridged
///
/// Neighbours within a whole tone keep whichever note is longer (the previous
/// one on ties); wider intervals keep the previous pitch.
pub fn choose_continuation_pitch(prev: &MelodyStep, next: &MelodyStep) -> String {
    match (prev.midi_note(), next.midi_note()) {
        (Some(p), Some(n)) if (p - n).abs() <= 2 && next.beats > prev.beats => next.note.clone(),
        _ => prev.note.clone(),
    }
}

/// Bridge, clamp and cap the rests of a lead line
///
/// # Arguments
///
/// * `steps` - Lead steps
/// * `bpm` - Tempo, used to measure rests in milliseconds
/// * `options` - Continuity settings
/// * `stats` - Counters to update
pub fn apply_continuity_to_melody(
    steps: &[MelodyStep],
    bpm: f64,
    options: &ContinuityOptions,
    stats: &mut ContinuityStats,
) -> Vec<MelodyStep> {
    if options.mode == ContinuityMode::Natural {
        return steps.to_vec();
    }
    let ms_per_beat = 60_000.0 / sanitize_bpm(bpm).max(MIN_CONTINUITY_BPM);
    let bridge_ms = options.bridge_ms();
    let mut out = steps.to_vec();

    let mut i = 0;
    while i < out.len() {
        if !out[i].is_rest() {
            i += 1;
            continue;
        }
        let has_prev = i > 0 && !out[i - 1].is_rest();
        let has_next = i + 1 < out.len() && !out[i + 1].is_rest();

        if has_prev && has_next && out[i].beats * ms_per_beat <= bridge_ms {
            let rest = out.remove(i);
            if out[i - 1].note == out[i].note {
                let next = out.remove(i);
                out[i - 1].beats += rest.beats + next.beats;
            } else {
                let pitch = choose_continuation_pitch(&out[i - 1], &out[i]);
                let prev = &mut out[i - 1];
                prev.note = pitch;
                prev.beats += rest.beats;
            }
            stats.rests_removed += 1;
            // Re-examine from the extended note
            i -= 1;
            continue;
        }

        let at_edge = i == 0 || i + 1 == out.len();
        if at_edge && out[i].beats > EDGE_REST_BEATS {
            out[i].beats = EDGE_REST_BEATS;
            stats.rests_shortened += 1;
        }
        i += 1;
    }

    let merged = coalesce_steps(out);
    let cap = options.max_lead_rest_beats();
    let unit = options.unit();
    let keep = ((cap / unit).floor() * unit).max(unit);

    let mut capped = Vec::with_capacity(merged.len());
    for (idx, step) in merged.iter().enumerate() {
        let leftover = step.beats - keep;
        if !step.is_rest() || step.beats <= cap || leftover <= EPSILON {
            capped.push(step.clone());
            continue;
        }
        stats.rests_shortened += 1;
        capped.push(MelodyStep::rest(keep));
        let previous = idx.checked_sub(1).map(|p| &merged[p]).filter(|p| !p.is_rest());
        if let Some(prev) = previous {
            capped.push(MelodyStep::note(prev.note.clone(), leftover).with_velocity(CONTINUATION_VELOCITY));
            stats.fills_inserted += 1;
        }
    }

    coalesce_steps(capped)
}

/// Arpeggio over root, fifth, third, fifth in the octave above middle C
fn harmony_fill(beats: f64, root_pc: i32, third: i32, cell: f64) -> Vec<MelodyStep> {
    let pattern = [0, 7, third, 7];
    let mut steps = Vec::new();
    let mut remaining = beats;
    let mut index = 0;
    while remaining > EPSILON {
        let b = cell.min(remaining);
        let midi = 72 + (root_pc + pattern[index % pattern.len()]) % 12;
        steps.push(MelodyStep::midi(midi, b, HARMONY_FILL_VELOCITY));
        remaining -= b;
        index += 1;
    }
    steps
}

/// Sustained tonic in the bass register
fn bass_fill(beats: f64, root_pc: i32) -> Vec<MelodyStep> {
    vec![MelodyStep::midi(36 + root_pc, beats, BASS_FILL_VELOCITY)]
}

/// Kick/snare/hat pattern restarted at the start of the rest
fn drum_fill(beats: f64, cell: f64) -> Vec<MelodyStep> {
    let mut steps = Vec::new();
    let mut cursor = 0.0;
    while beats - cursor > EPSILON {
        let b = cell.min(beats - cursor);
        let (note, _) = drum_hit(cursor);
        let velocity = if note == HAT { HAT_FILL_VELOCITY } else { DRUM_FILL_VELOCITY };
        steps.push(MelodyStep::midi(note, b, velocity));
        cursor += b;
    }
    steps
}

/// Replace every rest with fill material and re-quantize to the grid
///
/// # Returns
///
/// The new steps and the number of rests filled
fn fill_track_rests(
    track: &ArrangementTrack,
    unit: f64,
    make_fill: impl Fn(f64) -> Vec<MelodyStep>,
) -> (Vec<MelodyStep>, usize) {
    let mut steps = Vec::with_capacity(track.steps.len());
    let mut fills = 0;
    for step in &track.steps {
        if step.is_rest() {
            steps.extend(make_fill(step.beats).into_iter().map(|mut s| {
                s.beats = snap_to_grid(s.beats, unit);
                s
            }));
            fills += 1;
        } else {
            let mut s = step.clone();
            s.beats = snap_to_grid(s.beats, unit);
            steps.push(s);
        }
    }
    (coalesce_steps(steps), fills)
}

/// Apply the continuity policy to every track of an arrangement
///
/// # Example
///
/// ```
/// use whistle_dsp::analysis::result::MelodyStep;
/// use whistle_dsp::arrange::{apply_continuity, build_arrangement, ContinuityOptions, OutputStyle, RetroStyle};
/// use whistle_dsp::theory::Scale;
///
/// let melody = vec![MelodyStep::note("C4", 1.0), MelodyStep::rest(0.2), MelodyStep::note("C4", 1.0)];
/// let arrangement = build_arrangement(&melody, 120.0, "C", Scale::Major, OutputStyle::LeadOnly, RetroStyle::Nes);
/// let result = apply_continuity(&arrangement, &ContinuityOptions::default());
/// assert_eq!(result.arrangement.tracks[0].steps.len(), 1);
/// assert_eq!(result.stats.rests_removed, 1);
/// ```
pub fn apply_continuity(arrangement: &Arrangement, options: &ContinuityOptions) -> ContinuityResult {
    let mut stats = ContinuityStats::default();
    if options.mode == ContinuityMode::Natural {
        return ContinuityResult {
            arrangement: arrangement.clone(),
            stats,
        };
    }

    let unit = options.unit();
    let cell = snap_to_grid(options.fill_density(), unit);
    let root_pc = key_to_pitch_class(&arrangement.key) as i32;
    let third = arrangement.scale.third();

    let tracks = arrangement
        .tracks
        .iter()
        .map(|track| {
            let steps = match track.role {
                TrackRole::Lead => {
                    apply_continuity_to_melody(&track.steps, arrangement.bpm, options, &mut stats)
                }
                TrackRole::Harmony => {
                    let (steps, fills) =
                        fill_track_rests(track, unit, |b| harmony_fill(b, root_pc, third, cell));
                    stats.fills_inserted += fills;
                    steps
                }
                TrackRole::Bass => {
                    let (steps, fills) = fill_track_rests(track, unit, |b| bass_fill(b, root_pc));
                    stats.fills_inserted += fills;
                    steps
                }
                TrackRole::Drums => {
                    let (steps, fills) = fill_track_rests(track, unit, |b| drum_fill(b, cell));
                    stats.fills_inserted += fills;
                    steps
                }
            };
            ArrangementTrack {
                steps,
                ..track.clone()
            }
        })
        .collect();

    log::debug!(
        "Continuity (intensity {:.0}): {} rests removed, {} shortened, {} fills",
        options.clamped_intensity(),
        stats.rests_removed,
        stats.rests_shortened,
        stats.fills_inserted
    );

    ContinuityResult {
        arrangement: Arrangement {
            tracks,
            ..arrangement.clone()
        },
        stats,
    }
}
