//! Pitch-contour repair for full-mix transcriptions
//!
//! Predominant-pitch tracks of dense mixes jump to accompaniment notes for a
//! few frames at a time. Two passes clean the segment sequence:
//!
//! 1. **De-glitch**: a short voiced segment that leaps away (≥ 4 semitones)
//!    from two neighbours which agree with each other (≤ 2 semitones) takes
//!    the neighbours' average pitch
//! 2. **Contour smoothing**: a median filter over the voiced pitch sequence
//!    (rests are skipped positionally). The window is 5 for jumpy contours
//!    (75th percentile interval ≥ 3 semitones) and 3 otherwise.

use crate::analysis::result::Segment;
use crate::features::stats::{median, percentile};

use super::cleanup::coalesce_segments;

/// Neighbours must agree within this many semitones
const NEIGHBOUR_AGREEMENT: i32 = 2;

/// A glitch leaps at least this far from both neighbours
const GLITCH_LEAP: i32 = 4;

/// Shortest duration (seconds) never considered a glitch
const GLITCH_MIN_SEC: f64 = 0.15;

/// Interval percentile above which the contour counts as jumpy
const JUMPY_INTERVAL: f32 = 3.0;

/// Replace short outlier pitches with their neighbours' average
///
/// Segments shorter than `max(2.5 · min_sec, 0.15 s)` qualify. Equal
/// neighbours are coalesced afterwards.
pub fn deglitch_segments(mut segments: Vec<Segment>, min_sec: f64) -> Vec<Segment> {
    let limit = (2.5 * min_sec).max(GLITCH_MIN_SEC);
    let mut fixed = 0;

    for i in 1..segments.len().saturating_sub(1) {
        let (prev, cur, next) = (&segments[i - 1], &segments[i], &segments[i + 1]);
        if cur.is_rest || prev.is_rest || next.is_rest || cur.duration_sec >= limit {
            continue;
        }
        let (Some(p), Some(c), Some(n)) = (prev.midi, cur.midi, next.midi) else {
            continue;
        };
        if (p - n).abs() > NEIGHBOUR_AGREEMENT
            || (c - p).abs() < GLITCH_LEAP
            || (c - n).abs() < GLITCH_LEAP
        {
            continue;
        }
        let pf = prev.midi_float.unwrap_or(p as f32);
        let nf = next.midi_float.unwrap_or(n as f32);
        let average = (pf + nf) * 0.5;
        segments[i].set_pitch(average.round() as i32, average);
        fixed += 1;
    }

    if fixed > 0 {
        log::debug!("De-glitched {} segments", fixed);
    }
    coalesce_segments(segments)
}

/// Median-filter the pitches of voiced segments
///
/// Rests keep their positions but are not part of the filtered sequence.
pub fn smooth_contour(mut segments: Vec<Segment>) -> Vec<Segment> {
    let voiced: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_rest && s.midi.is_some())
        .map(|(i, _)| i)
        .collect();
    if voiced.len() < 3 {
        return segments;
    }

    let pitches: Vec<i32> = voiced.iter().filter_map(|&i| segments[i].midi).collect();
    let intervals: Vec<f32> = pitches
        .windows(2)
        .map(|w| (w[1] - w[0]).abs() as f32)
        .collect();
    let radius = if percentile(&intervals, 0.75) >= JUMPY_INTERVAL { 2 } else { 1 };

    let mut changed = 0;
    for (k, &idx) in voiced.iter().enumerate() {
        // Symmetric window, shrinking at the ends
        let half = radius.min(k).min(pitches.len() - 1 - k);
        let window: Vec<f32> = pitches[k - half..=k + half].iter().map(|&p| p as f32).collect();
        let smoothed = median(&window).round() as i32;
        if Some(smoothed) != segments[idx].midi {
            segments[idx].set_pitch(smoothed, smoothed as f32);
            changed += 1;
        }
    }

    log::debug!(
        "Contour smoothing (window {}): {} of {} voiced segments changed",
        2 * radius + 1,
        changed,
        voiced.len()
    );
    coalesce_segments(segments)
}
