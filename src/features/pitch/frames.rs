//! Per-hop frame analysis
//!
//! Combines a [`PitchTrack`] with per-hop RMS energy of the signal. Frames
//! start out unclassified (`is_rest = true`, no `midi_float`); the voicing
//! stage decides which of them carry a note.

use super::source::PitchTrack;
use super::{frame_count, FRAME_SIZE, HOP_SIZE};

/// Analysis of one hop
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame start time in seconds
    pub time_sec: f64,
    /// Hop duration in seconds
    pub duration_sec: f64,
    /// RMS energy of the frame
    pub rms: f32,
    /// Pitch confidence in [0.0, 1.0]
    pub clarity: f32,
    /// Estimated pitch in Hz, if any
    pub pitch_hz: Option<f32>,
    /// Fractional MIDI pitch, set only for voiced frames
    pub midi_float: Option<f32>,
    /// Whether the frame is classified as a rest
    pub is_rest: bool,
}

/// Root-mean-square energy of a slice (0.0 for an empty slice)
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Build one frame per hop
///
/// # Arguments
///
/// * `samples` - Mono samples
/// * `sample_rate` - Sample rate in Hz (must be > 0)
/// * `track` - Pitch track, aligned to frame start times by nearest hop
///
/// # Returns
///
/// Unclassified frames; empty input gives no frames
pub fn analyze_frames(samples: &[f32], sample_rate: u32, track: &PitchTrack) -> Vec<Frame> {
    let count = frame_count(samples.len());
    let sr = sample_rate.max(1) as f64;
    let duration_sec = HOP_SIZE as f64 / sr;

    let frames: Vec<Frame> = (0..count)
        .map(|i| {
            let start = i * HOP_SIZE;
            let end = (start + FRAME_SIZE).min(samples.len());
            let time_sec = start as f64 / sr;
            let estimate = track.at_time(time_sec).unwrap_or_else(super::PitchEstimate::none);
            let pitch_hz = if estimate.hz.is_finite() && estimate.hz > 0.0 {
                Some(estimate.hz)
            } else {
                None
            };
            Frame {
                time_sec,
                duration_sec,
                rms: rms(&samples[start..end]),
                clarity: if estimate.clarity.is_finite() {
                    estimate.clarity.clamp(0.0, 1.0)
                } else {
                    0.0
                },
                pitch_hz,
                midi_float: None,
                is_rest: true,
            }
        })
        .collect();

    log::debug!(
        "Analyzed {} frames from {} samples ({} backend)",
        frames.len(),
        samples.len(),
        track.backend
    );

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_track(len: usize, hz: f32, hop_seconds: f64) -> PitchTrack {
        PitchTrack {
            backend: "test".to_string(),
            hop_seconds,
            pitch_hz: vec![hz; len],
            confidence: vec![0.9; len],
        }
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_frames_align_with_hops() {
        let samples = vec![0.5f32; 44100];
        let hop = HOP_SIZE as f64 / 44100.0;
        let count = frame_count(samples.len());
        let frames = analyze_frames(&samples, 44100, &flat_track(count, 440.0, hop));
        assert_eq!(frames.len(), count);
        assert!((frames[1].time_sec - hop).abs() < 1e-12);
        assert!(frames.iter().all(|f| f.is_rest && f.midi_float.is_none()));
        assert!(frames.iter().all(|f| (f.rms - 0.5).abs() < 1e-5));
        assert_eq!(frames[0].pitch_hz, Some(440.0));
    }

    #[test]
    fn test_short_track_leaves_tail_unpitched() {
        let samples = vec![0.1f32; 44100];
        let hop = HOP_SIZE as f64 / 44100.0;
        let frames = analyze_frames(&samples, 44100, &flat_track(3, 440.0, hop));
        assert_eq!(frames[2].pitch_hz, Some(440.0));
        assert_eq!(frames[10].pitch_hz, None);
        assert_eq!(frames[10].clarity, 0.0);
    }

    #[test]
    fn test_short_buffer_single_frame() {
        let frames = analyze_frames(&[0.2; 100], 44100, &flat_track(1, 0.0, 0.01));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pitch_hz, None);
    }
}
