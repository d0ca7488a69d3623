//! Segment cleanup passes
//!
//! - [`merge_tiny_segments`]: close up short blips and short rests that sit
//!   between two voiced segments of the same pitch
//! - [`absorb_short_segments`]: fold every remaining short segment into its
//!   neighbour, then re-coalesce
//!
//! [`cleanup_segments`] runs both; its output contains no segment shorter than
//! the minimum (unless the whole buffer is), so running it again is a no-op.

use crate::analysis::result::Segment;

/// Merge `next` into `into`, keeping a duration-weighted mean pitch
fn extend_segment(into: &mut Segment, next: &Segment) {
    if let (Some(a), Some(b)) = (into.midi_float, next.midi_float) {
        let total = into.duration_sec + next.duration_sec;
        if total > 0.0 {
            let mean = (a as f64 * into.duration_sec + b as f64 * next.duration_sec) / total;
            into.midi_float = Some(mean as f32);
        }
    }
    into.duration_sec += next.duration_sec;
    into.beats = 0.0;
}

/// Merge adjacent segments that describe the same event and drop empty ones
pub fn coalesce_segments(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if !(segment.duration_sec > 0.0) {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.same_event(&segment) => extend_segment(last, &segment),
            _ => out.push(segment),
        }
    }
    out
}

/// Close up tiny gaps between voiced segments of equal pitch
///
/// A segment shorter than `min_sec` is merged away (together with the
/// following segment) when both neighbours are voiced with the same MIDI
/// pitch. This covers a short rest inside a held note and a short foreign
/// pitch inside a held note. Repeats until nothing changes.
pub fn merge_tiny_segments(segments: Vec<Segment>, min_sec: f64) -> Vec<Segment> {
    let mut current = segments;
    loop {
        if current.len() < 3 {
            return current;
        }
        let mut out: Vec<Segment> = Vec::with_capacity(current.len());
        let mut changed = false;
        let mut iter = current.into_iter().peekable();

        while let Some(cur) = iter.next() {
            let bridges = match (out.last(), iter.peek()) {
                (Some(prev), Some(next)) => {
                    cur.duration_sec < min_sec
                        && !prev.is_rest
                        && !next.is_rest
                        && prev.midi.is_some()
                        && prev.midi == next.midi
                }
                _ => false,
            };
            if bridges {
                if let (Some(prev), Some(next)) = (out.last_mut(), iter.next()) {
                    // The blip's duration belongs to the held note, not its pitch
                    prev.duration_sec += cur.duration_sec;
                    extend_segment(prev, &next);
                    changed = true;
                }
                continue;
            }
            out.push(cur);
        }

        if !changed {
            return out;
        }
        current = out;
    }
}

/// Fold every segment shorter than `min_sec` into its neighbour
///
/// Short segments join the previous segment; a short first segment joins the
/// next one (which then starts earlier). Equal neighbours are re-coalesced.
pub fn absorb_short_segments(segments: Vec<Segment>, min_sec: f64) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    let mut pending: Option<Segment> = None;

    for mut segment in segments {
        if segment.duration_sec < min_sec {
            if let Some(prev) = out.last_mut() {
                prev.duration_sec += segment.duration_sec;
                prev.beats = 0.0;
                continue;
            }
            match pending.as_mut() {
                Some(p) => p.duration_sec += segment.duration_sec,
                None => pending = Some(segment),
            }
            continue;
        }
        if let Some(p) = pending.take() {
            segment.start_sec = p.start_sec;
            segment.duration_sec += p.duration_sec;
        }
        out.push(segment);
    }

    // Everything was short: keep the first event spanning the whole range
    if let Some(p) = pending {
        if out.is_empty() {
            out.push(p);
        }
    }

    coalesce_segments(out)
}

/// Full cleanup: tiny-segment merge followed by short-segment absorption
///
/// # Arguments
///
/// * `segments` - Raw segments in time order
/// * `min_note_ms` - Minimum note duration in milliseconds
pub fn cleanup_segments(segments: Vec<Segment>, min_note_ms: f64) -> Vec<Segment> {
    let min_sec = if min_note_ms.is_finite() {
        min_note_ms.max(0.0) / 1000.0
    } else {
        0.0
    };
    let before = segments.len();
    let merged = merge_tiny_segments(coalesce_segments(segments), min_sec);
    let cleaned = absorb_short_segments(merged, min_sec);
    log::debug!(
        "Segment cleanup ({:.0} ms floor): {} -> {} segments",
        min_note_ms,
        before,
        cleaned.len()
    );
    cleaned
}
