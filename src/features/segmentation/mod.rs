//! Frame-to-segment conversion
//!
//! Voiced frames are smoothed with a ±2-frame median filter (rest frames are
//! ignored inside the window), rounded to integer MIDI pitches and collapsed
//! into runs. Rests merge with adjacent rests regardless of length.
//!
//! Cleanup lives in [`cleanup`] (tiny-segment merge, short-segment absorb)
//! and, for full mixes, [`contour`] (de-glitch, contour smoothing).

pub mod cleanup;
pub mod contour;

pub use cleanup::{absorb_short_segments, cleanup_segments, coalesce_segments, merge_tiny_segments};
pub use contour::{deglitch_segments, smooth_contour};

use crate::analysis::result::Segment;
use crate::features::pitch::Frame;
use crate::features::stats::median;

/// Half-width of the frame-level median filter
const MEDIAN_RADIUS: usize = 2;

/// Median-smoothed `midi_float` of every voiced frame (`None` for rests)
pub fn smooth_frame_pitches(frames: &[Frame]) -> Vec<Option<f32>> {
    (0..frames.len())
        .map(|i| {
            frames[i].midi_float?;
            let lo = i.saturating_sub(MEDIAN_RADIUS);
            let hi = (i + MEDIAN_RADIUS + 1).min(frames.len());
            let window: Vec<f32> = frames[lo..hi].iter().filter_map(|f| f.midi_float).collect();
            Some(median(&window))
        })
        .collect()
}

struct SegmentBuilder {
    start_sec: f64,
    duration_sec: f64,
    midi: Option<i32>,
    midi_sum: f64,
    count: usize,
}

impl SegmentBuilder {
    fn new(frame: &Frame, midi_float: Option<f32>) -> Self {
        let mut builder = Self {
            start_sec: frame.time_sec,
            duration_sec: 0.0,
            midi: midi_float.map(|m| m.round() as i32),
            midi_sum: 0.0,
            count: 0,
        };
        builder.push(frame, midi_float);
        builder
    }

    fn accepts(&self, midi_float: Option<f32>) -> bool {
        self.midi == midi_float.map(|m| m.round() as i32)
    }

    fn push(&mut self, frame: &Frame, midi_float: Option<f32>) {
        self.duration_sec += frame.duration_sec;
        if let Some(m) = midi_float {
            self.midi_sum += m as f64;
            self.count += 1;
        }
    }

    fn finish(self) -> Segment {
        match self.midi {
            Some(_) if self.count > 0 => {
                let mean = (self.midi_sum / self.count as f64) as f32;
                let mut segment = Segment::voiced(self.start_sec, self.duration_sec, mean);
                if let Some(midi) = self.midi {
                    segment.set_pitch(midi, mean);
                }
                segment
            }
            _ => Segment::rest(self.start_sec, self.duration_sec),
        }
    }
}

/// Collapse classified frames into segments
///
/// # Arguments
///
/// * `frames` - Classified frames
/// * `total_duration_sec` - Buffer duration; the last segment is extended to
///   reach it so segments cover the whole buffer
///
/// # Returns
///
/// Contiguous segments in time order (empty for no frames)
pub fn segment_frames(frames: &[Frame], total_duration_sec: f64) -> Vec<Segment> {
    let smoothed = smooth_frame_pitches(frames);
    let mut segments = Vec::new();
    let mut current: Option<SegmentBuilder> = None;

    for (frame, &midi_float) in frames.iter().zip(smoothed.iter()) {
        match current.as_mut() {
            Some(builder) if builder.accepts(midi_float) => builder.push(frame, midi_float),
            _ => {
                if let Some(done) = current.take() {
                    segments.push(done.finish());
                }
                current = Some(SegmentBuilder::new(frame, midi_float));
            }
        }
    }
    if let Some(done) = current {
        segments.push(done.finish());
    }

    if let Some(last) = segments.last_mut() {
        if total_duration_sec > last.end_sec() {
            last.duration_sec = total_duration_sec - last.start_sec;
        }
    }

    log::debug!("Segmented {} frames into {} segments", frames.len(), segments.len());
    segments
}
