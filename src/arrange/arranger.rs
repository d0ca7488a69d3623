//! Derive lead, bass, harmony and drum tracks from a quantized melody
//!
//! Every generator walks the same lead timeline, so each track spans the
//! lead's total duration. Rests stay rests (the continuity engine may fill
//! them later); unparseable note names are treated as rests.

use crate::analysis::result::{coalesce_steps, total_beats, MelodyStep};
use crate::config::sanitize_bpm;
use crate::theory::{
    clamp_jump, fold_into_range, key_to_pitch_class, nearest_scale_tone, scale_pitch_classes,
    MidiRange, Scale,
};

use super::tracks::{Arrangement, ArrangementTrack, OutputStyle, RetroStyle, TonePreset, TrackRole};

/// Lead register: A3..E6
const LEAD_RANGE: MidiRange = MidiRange { low: 57, high: 88 };

/// Bass register: C2..G3
const BASS_RANGE: MidiRange = MidiRange { low: 36, high: 55 };

/// Register the harmony triad is built in: G3..G5
const HARMONY_RANGE: MidiRange = MidiRange { low: 55, high: 79 };

/// Largest interval between consecutive lead notes
const LEAD_MAX_JUMP: i32 = 8;

/// Semitones searched either side for a scale tone
const SCALE_SEARCH: i32 = 5;

const LEAD_VELOCITY: u8 = 104;
const BASS_VELOCITY: u8 = 84;
const ARP_VELOCITY: u8 = 74;
const PAD_VELOCITY: u8 = 70;

/// NES arpeggio cell in beats
const ARP_CELL: f64 = 0.25;

/// Drum pattern cell in beats
const DRUM_CELL: f64 = 0.5;

/// General MIDI drum notes
pub(crate) const KICK: i32 = 36;
pub(crate) const SNARE: i32 = 38;
pub(crate) const HAT: i32 = 42;

const EPSILON: f64 = 1e-9;

/// Key context shared by the generators
#[derive(Debug, Clone, Copy)]
struct KeyContext {
    pcs: [usize; 7],
    scale: Scale,
}

impl KeyContext {
    fn new(key: &str, scale: Scale) -> Self {
        Self {
            pcs: scale_pitch_classes(key_to_pitch_class(key), scale),
            scale,
        }
    }

    fn snap(&self, midi: i32) -> i32 {
        nearest_scale_tone(midi, &self.pcs, SCALE_SEARCH)
    }

    /// Root, third and fifth built on the scale tone nearest `midi`
    fn triad(&self, midi: i32) -> [i32; 3] {
        let root = self.snap(midi);
        [root, self.snap(root + self.scale.third()), self.snap(root + 7)]
    }
}

/// Clamp to the lead register, snap to the scale and limit leaps
fn simplify_lead(melody: &[MelodyStep], ctx: &KeyContext) -> Vec<MelodyStep> {
    let mut previous: Option<i32> = None;
    let steps = melody
        .iter()
        .map(|step| match step.midi_note() {
            None => MelodyStep::rest(step.beats),
            Some(midi) => {
                let mut target = ctx.snap(fold_into_range(midi, LEAD_RANGE));
                if let Some(prev) = previous {
                    target = clamp_jump(target, prev, LEAD_MAX_JUMP);
                }
                previous = Some(target);
                MelodyStep::midi(target, step.beats, LEAD_VELOCITY)
            }
        })
        .collect();
    coalesce_steps(steps)
}

/// Lead two octaves down, pulsed once per beat under sustained notes
fn make_bass(lead: &[MelodyStep], ctx: &KeyContext) -> Vec<MelodyStep> {
    let mut steps = Vec::with_capacity(lead.len());
    for step in lead {
        let Some(midi) = step.midi_note() else {
            steps.push(MelodyStep::rest(step.beats));
            continue;
        };
        let bass = ctx.snap(fold_into_range(midi - 24, BASS_RANGE));
        let chunks = step.beats.round().max(1.0) as usize;
        let chunk = step.beats / chunks as f64;
        steps.extend((0..chunks).map(|_| MelodyStep::midi(bass, chunk, BASS_VELOCITY)));
    }
    coalesce_steps(steps)
}

/// Triad per lead note: arpeggio cells (NES) or sustained third and fifth
fn make_harmony(lead: &[MelodyStep], ctx: &KeyContext, style: RetroStyle) -> Vec<MelodyStep> {
    let mut steps = Vec::new();
    for step in lead {
        let Some(midi) = step.midi_note() else {
            steps.push(MelodyStep::rest(step.beats));
            continue;
        };
        let triad = ctx.triad(fold_into_range(midi, HARMONY_RANGE));
        match style {
            RetroStyle::Nes => {
                let mut remaining = step.beats;
                let mut index = 0;
                while remaining > EPSILON {
                    let cell = ARP_CELL.min(remaining);
                    steps.push(MelodyStep::midi(triad[index % 3], cell, ARP_VELOCITY));
                    remaining -= cell;
                    index += 1;
                }
            }
            RetroStyle::SnesLite => {
                let half = step.beats * 0.5;
                steps.push(MelodyStep::midi(triad[1], half, PAD_VELOCITY));
                steps.push(MelodyStep::midi(triad[2], half, PAD_VELOCITY));
            }
        }
    }
    coalesce_steps(steps)
}

/// Drum note and velocity at a beat position within a 4-beat bar
pub(crate) fn drum_hit(position: f64) -> (i32, u8) {
    let beat_in_bar = position.rem_euclid(4.0);
    let on = |b: f64| (beat_in_bar - b).abs() < 1e-3;
    if on(0.0) || on(2.0) {
        (KICK, 94)
    } else if on(1.0) || on(3.0) {
        (SNARE, 86)
    } else {
        (HAT, 60)
    }
}

/// Fixed kick/snare/hat pattern spanning `total` beats
fn make_drums(total: f64) -> Vec<MelodyStep> {
    let mut steps = Vec::new();
    let mut cursor = 0.0;
    while total - cursor > EPSILON {
        let cell = DRUM_CELL.min(total - cursor);
        let (note, velocity) = drum_hit(cursor);
        steps.push(MelodyStep::midi(note, cell, velocity));
        cursor += DRUM_CELL;
    }
    coalesce_steps(steps)
}

fn track(
    role: TrackRole,
    name: &str,
    tone_preset: TonePreset,
    midi_channel: u8,
    midi_program: Option<u8>,
    steps: Vec<MelodyStep>,
    pan: i8,
) -> ArrangementTrack {
    ArrangementTrack {
        role,
        name: name.to_string(),
        tone_preset,
        midi_channel,
        midi_program,
        steps,
        pan: Some(pan),
    }
}

/// Build an arrangement from a quantized melody
///
/// # Arguments
///
/// * `melody` - Quantized melody (note names in scientific pitch notation)
/// * `bpm` - Tempo (non-positive values fall back to 120)
/// * `key` - Key name, e.g. "C", "F#", "Bb"
/// * `scale` - Scale of the key
/// * `output_style` - Lead only, or the full four-track arrangement
/// * `retro_style` - Sound palette and harmony style
///
/// # Returns
///
/// Tracks in the order lead, bass, harmony, drums
///
/// # Example
///
/// ```
/// use whistle_dsp::analysis::result::MelodyStep;
/// use whistle_dsp::arrange::{build_arrangement, OutputStyle, RetroStyle, TrackRole};
/// use whistle_dsp::theory::Scale;
///
/// let melody = vec![MelodyStep::note("E4", 1.0), MelodyStep::note("G4", 1.0)];
/// let arrangement = build_arrangement(
///     &melody,
///     120.0,
///     "C",
///     Scale::Major,
///     OutputStyle::AutoArrange,
///     RetroStyle::Nes,
/// );
/// assert_eq!(arrangement.tracks.len(), 4);
/// assert_eq!(arrangement.tracks[0].role, TrackRole::Lead);
/// ```
pub fn build_arrangement(
    melody: &[MelodyStep],
    bpm: f64,
    key: &str,
    scale: Scale,
    output_style: OutputStyle,
    retro_style: RetroStyle,
) -> Arrangement {
    let ctx = KeyContext::new(key, scale);
    let nes = retro_style == RetroStyle::Nes;
    let lead = simplify_lead(melody, &ctx);

    let mut tracks = Vec::with_capacity(4);
    let lead_preset = if nes { TonePreset::PulseLead } else { TonePreset::WarmSquare };
    if output_style == OutputStyle::AutoArrange {
        let bass = make_bass(&lead, &ctx);
        let harmony = make_harmony(&lead, &ctx, retro_style);
        let drums = make_drums(total_beats(&lead));
        tracks.push(track(TrackRole::Lead, "Lead", lead_preset, 0, Some(80), lead, -6));
        tracks.push(track(TrackRole::Bass, "Bass", TonePreset::BassPick, 2, Some(38), bass, -2));
        tracks.push(track(
            TrackRole::Harmony,
            "Harmony",
            if nes { TonePreset::PulseLead } else { TonePreset::SnesPad },
            1,
            Some(if nes { 80 } else { 50 }),
            harmony,
            10,
        ));
        tracks.push(track(TrackRole::Drums, "Drums", TonePreset::NoiseKit, 9, None, drums, 0));
    } else {
        tracks.push(track(TrackRole::Lead, "Lead", lead_preset, 0, Some(80), lead, -6));
    }

    log::debug!(
        "Arrangement in {} {}: {}",
        key,
        scale.name(),
        tracks
            .iter()
            .map(|t| format!("{:?} {} steps / {:.2} beats", t.role, t.steps.len(), t.total_beats()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Arrangement {
        bpm: sanitize_bpm(bpm),
        key: key.to_string(),
        scale,
        tracks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::note_name_to_midi;

    fn melody(notes: &[(&str, f64)]) -> Vec<MelodyStep> {
        notes
            .iter()
            .map(|&(n, b)| if n == "REST" { MelodyStep::rest(b) } else { MelodyStep::note(n, b) })
            .collect()
    }

    fn midis(steps: &[MelodyStep]) -> Vec<Option<i32>> {
        steps.iter().map(|s| s.midi_note()).collect()
    }

    #[test]
    fn test_lead_register_scale_and_leaps() {
        let ctx = KeyContext::new("C", Scale::Major);
        // C3 folds up to C4, C#4 snaps down to C4 and merges, C7 folds to C6
        // and is then limited to an eight-semitone leap
        let lead = simplify_lead(&melody(&[("C3", 1.0), ("C#4", 1.0), ("C7", 1.0)]), &ctx);
        assert_eq!(midis(&lead), vec![Some(60), Some(68)]);
        assert_eq!(lead[0].beats, 2.0);
        assert!(lead.iter().all(|s| s.velocity == Some(LEAD_VELOCITY)));
        assert_eq!(total_beats(&lead), 3.0);
    }

    #[test]
    fn test_bass_pulses_two_octaves_down() {
        let ctx = KeyContext::new("C", Scale::Major);
        let lead = simplify_lead(&melody(&[("E4", 2.0), ("REST", 1.0)]), &ctx);
        let bass = make_bass(&lead, &ctx);
        // Equal pulses coalesce back into one sustained note
        assert_eq!(bass.len(), 2);
        assert_eq!(bass[0].midi_note(), Some(40));
        assert_eq!(bass[0].beats, 2.0);
        assert!(bass[1].is_rest());
    }

    #[test]
    fn test_harmony_styles() {
        let ctx = KeyContext::new("A", Scale::Minor);
        let lead = simplify_lead(&melody(&[("A4", 1.0)]), &ctx);

        let arp = make_harmony(&lead, &ctx, RetroStyle::Nes);
        assert_eq!(arp.len(), 4);
        assert_eq!(midis(&arp), vec![Some(69), Some(72), Some(76), Some(69)]);

        let pad = make_harmony(&lead, &ctx, RetroStyle::SnesLite);
        assert_eq!(midis(&pad), vec![Some(72), Some(76)]);
        assert_eq!(total_beats(&pad), 1.0);
    }

    #[test]
    fn test_drum_pattern() {
        let drums = make_drums(4.25);
        let notes: Vec<i32> = drums.iter().filter_map(|s| s.midi_note()).collect();
        assert_eq!(notes, vec![KICK, HAT, SNARE, HAT, KICK, HAT, SNARE, HAT, KICK]);
        assert!((total_beats(&drums) - 4.25).abs() < 1e-9);
        assert_eq!(drums.last().map(|s| s.beats), Some(0.25));
    }

    #[test]
    fn test_four_tracks_same_length() {
        let input = melody(&[("E4", 1.0), ("REST", 0.5), ("G4", 1.5), ("C5", 1.0)]);
        let arrangement = build_arrangement(
            &input,
            120.0,
            "C",
            Scale::Major,
            OutputStyle::AutoArrange,
            RetroStyle::SnesLite,
        );
        let roles: Vec<TrackRole> = arrangement.tracks.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![TrackRole::Lead, TrackRole::Bass, TrackRole::Harmony, TrackRole::Drums]
        );
        for track in &arrangement.tracks {
            assert!(!track.steps.is_empty());
            assert!((track.total_beats() - 4.0).abs() < 1e-9, "{:?}", track.role);
        }
        assert_eq!(arrangement.track(TrackRole::Drums).map(|t| t.midi_channel), Some(9));
    }

    #[test]
    fn test_lead_only_and_bad_names() {
        let input = vec![MelodyStep::note("H4", 1.0), MelodyStep::note("D4", 1.0)];
        let arrangement =
            build_arrangement(&input, 0.0, "D", Scale::Major, OutputStyle::LeadOnly, RetroStyle::Nes);
        assert_eq!(arrangement.tracks.len(), 1);
        assert_eq!(arrangement.bpm, 120.0);
        let lead = &arrangement.tracks[0];
        assert!(lead.steps[0].is_rest());
        assert_eq!(lead.steps[1].midi_note(), note_name_to_midi("D4"));
        assert_eq!(lead.tone_preset, TonePreset::PulseLead);
    }

    #[test]
    fn test_out_of_range_octave_becomes_rest() {
        let input = vec![MelodyStep::note("C999999999", 1.0), MelodyStep::note("E4", 1.0)];
        let arrangement =
            build_arrangement(&input, 120.0, "C", Scale::Major, OutputStyle::AutoArrange, RetroStyle::Nes);
        assert_eq!(arrangement.tracks.len(), 4);
        let lead = &arrangement.tracks[0];
        assert!(lead.steps[0].is_rest());
        assert_eq!(lead.steps[0].beats, 1.0);
        assert_eq!(lead.steps[1].midi_note(), Some(64));
        for track in &arrangement.tracks {
            assert!((track.total_beats() - 2.0).abs() < 1e-9, "{:?}", track.role);
        }
    }
}
