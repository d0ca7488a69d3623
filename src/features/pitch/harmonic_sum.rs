//! Harmonic-summation predominant pitch estimator for full mixes
//!
//! Every candidate is a MIDI note inside the configured band. For each frame:
//!
//! 1. Apply a Hann window
//! 2. Measure power at the candidate fundamental and its 2nd and 3rd
//!    harmonics with one Goertzel resonator per frequency
//! 3. Score = `P(f) + 0.5·P(2f) + 0.33·P(3f)`, scaled by a register bias
//!    centred on the upper-mid melodic range and by a continuity prior
//!    relative to the previous frame's pitch
//! 4. Confidence = `(best - second) / best`, where the runner-up excludes
//!    candidates within two semitones of the winner
//!
//! The winning candidate is refined to a fractional MIDI value by parabolic
//! interpolation over its neighbours' scores.

use crate::theory::{freq_to_midi_float, midi_to_freq};

use super::PitchEstimate;

/// (harmonic number, weight) pairs summed per candidate
const HARMONICS: [(f32, f32); 3] = [(1.0, 1.0), (2.0, 0.5), (3.0, 0.33)];

/// Centre of the register bias in Hz
const REGISTER_CENTER_HZ: f32 = 520.0;

/// Width (standard deviation) of the register bias in octaves
const REGISTER_WIDTH_OCTAVES: f32 = 1.0;

/// Maximum boost given by the register bias
const REGISTER_BIAS: f32 = 0.3;

/// Span of the continuity prior in semitones
const CONTINUITY_SPAN_SEMITONES: f32 = 8.0;

/// Candidates this close to the winner are ignored when picking the runner-up
const RUNNER_UP_EXCLUSION_SEMITONES: i32 = 2;

/// Harmonic score (relative to frame energy) below which no candidate is viable
const MIN_VIABLE_SCORE: f32 = 1e-6;

const EPSILON: f32 = 1e-10;

struct Candidate {
    midi: i32,
    /// (Goertzel coefficient `2·cos(ω)`, harmonic weight) per audible harmonic
    resonators: Vec<(f32, f32)>,
    register_bias: f32,
}

/// Predominant-pitch estimator over MIDI-spaced candidates
pub struct HarmonicSumEstimator {
    candidates: Vec<Candidate>,
    window: Vec<f32>,
}

impl HarmonicSumEstimator {
    /// Build the candidate set for a band
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Sample rate in Hz
    /// * `frame_size` - Frame length in samples (Hann window length)
    /// * `min_hz` / `max_hz` - Band of candidate fundamentals
    pub fn new(sample_rate: u32, frame_size: usize, min_hz: f32, max_hz: f32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let nyquist = sr * 0.5;

        let low = freq_to_midi_float(min_hz).map(|m| m.ceil() as i32);
        let high = freq_to_midi_float(max_hz.min(nyquist * 0.95)).map(|m| m.floor() as i32);

        let mut candidates = Vec::new();
        if let (Some(low), Some(high)) = (low, high) {
            for midi in low..=high {
                let hz = midi_to_freq(midi as f32);
                let resonators: Vec<(f32, f32)> = HARMONICS
                    .iter()
                    .filter(|(h, _)| hz * h < nyquist * 0.95)
                    .map(|&(h, weight)| {
                        let omega = 2.0 * std::f32::consts::PI * hz * h / sr;
                        (2.0 * omega.cos(), weight)
                    })
                    .collect();
                if resonators.is_empty() {
                    continue;
                }
                let octaves = (hz / REGISTER_CENTER_HZ).log2() / REGISTER_WIDTH_OCTAVES;
                let register_bias = 1.0 + REGISTER_BIAS * (-0.5 * octaves * octaves).exp();
                candidates.push(Candidate {
                    midi,
                    resonators,
                    register_bias,
                });
            }
        }

        let n = frame_size.max(1);
        let window = (0..n)
            .map(|i| {
                0.5 - 0.5
                    * (2.0 * std::f32::consts::PI * i as f32 / (n.max(2) - 1) as f32).cos()
            })
            .collect();

        log::debug!(
            "Harmonic-sum estimator: {} candidates in [{:.1}, {:.1}] Hz",
            candidates.len(),
            min_hz,
            max_hz
        );

        Self { candidates, window }
    }

    /// Number of candidate notes
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Estimate the predominant pitch of one frame
    ///
    /// # Arguments
    ///
    /// * `frame` - Frame samples (ideally lead-emphasized)
    /// * `previous_midi` - Pitch of the previous voiced frame, for the continuity prior
    ///
    /// # Returns
    ///
    /// `None` when no candidate is viable (silent frame, empty candidate set)
    pub fn estimate(&self, frame: &[f32], previous_midi: Option<f32>) -> Option<PitchEstimate> {
        if self.candidates.is_empty() || frame.is_empty() {
            return None;
        }

        let windowed: Vec<f32> = frame
            .iter()
            .zip(self.window.iter())
            .map(|(&x, &w)| x * w)
            .collect();
        let energy: f32 = windowed.iter().map(|x| x * x).sum();
        if energy <= EPSILON {
            return None;
        }
        let norm = 1.0 / (energy * windowed.len() as f32);

        let scores: Vec<f32> = self
            .candidates
            .iter()
            .map(|c| {
                let harmonic: f32 = c
                    .resonators
                    .iter()
                    .map(|&(coeff, weight)| weight * goertzel_power(&windowed, coeff))
                    .sum();
                harmonic * norm * c.register_bias * continuity_prior(c.midi, previous_midi)
            })
            .collect();

        let (best_idx, best) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });
        if !(best > MIN_VIABLE_SCORE) {
            return None;
        }

        let best_midi = self.candidates[best_idx].midi;
        let second = self
            .candidates
            .iter()
            .zip(scores.iter())
            .filter(|(c, _)| (c.midi - best_midi).abs() > RUNNER_UP_EXCLUSION_SEMITONES)
            .map(|(_, &s)| s)
            .fold(0.0f32, f32::max);
        let confidence = ((best - second) / best).clamp(0.0, 1.0);

        let midi_float = best_midi as f32 + refine_offset(&scores, best_idx);

        Some(PitchEstimate {
            hz: midi_to_freq(midi_float),
            clarity: confidence,
        })
    }
}

/// Goertzel power of `samples` at the frequency encoded by `coeff = 2·cos(ω)`
fn goertzel_power(samples: &[f32], coeff: f32) -> f32 {
    let mut s1 = 0.0f32;
    let mut s2 = 0.0f32;
    for &x in samples {
        let s0 = x + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    (s1 * s1 + s2 * s2 - coeff * s1 * s2).max(0.0)
}

/// Continuity prior: exponential decay over ±8 semitones, flat floor beyond
fn continuity_prior(midi: i32, previous_midi: Option<f32>) -> f32 {
    match previous_midi {
        Some(prev) => {
            let distance = (midi as f32 - prev).abs();
            if distance <= CONTINUITY_SPAN_SEMITONES {
                0.5 + 0.5 * (-distance / CONTINUITY_SPAN_SEMITONES).exp()
            } else {
                0.5
            }
        }
        None => 1.0,
    }
}

/// Fractional semitone offset of the score peak around `idx`, in [-0.5, 0.5]
fn refine_offset(scores: &[f32], idx: usize) -> f32 {
    if idx == 0 || idx + 1 >= scores.len() {
        return 0.0;
    }
    let (a, b, c) = (scores[idx - 1], scores[idx], scores[idx + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() <= EPSILON {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harmonic_tone(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let w = 2.0 * std::f32::consts::PI * freq * t;
                0.5 * w.sin() + 0.25 * (2.0 * w).sin() + 0.12 * (3.0 * w).sin()
            })
            .collect()
    }

    #[test]
    fn test_finds_harmonic_fundamental() {
        let estimator = HarmonicSumEstimator::new(44100, 2048, 200.0, 2500.0);
        let frame = harmonic_tone(659.26, 44100, 2048); // E5
        let estimate = estimator.estimate(&frame, None).unwrap();
        let midi = freq_to_midi_float(estimate.hz).unwrap();
        assert_eq!(midi.round() as i32, 76, "Detected {:.2} Hz", estimate.hz);
        assert!(estimate.clarity > 0.0);
    }

    #[test]
    fn test_silence_not_viable() {
        let estimator = HarmonicSumEstimator::new(44100, 2048, 200.0, 2500.0);
        assert!(estimator.estimate(&vec![0.0f32; 2048], None).is_none());
    }

    #[test]
    fn test_empty_band_has_no_candidates() {
        let estimator = HarmonicSumEstimator::new(8000, 2048, 5000.0, 6000.0);
        assert_eq!(estimator.candidate_count(), 0);
        let frame = harmonic_tone(440.0, 8000, 2048);
        assert!(estimator.estimate(&frame, None).is_none());
    }

    #[test]
    fn test_continuity_prior_decays() {
        assert_eq!(continuity_prior(60, None), 1.0);
        assert!((continuity_prior(60, Some(60.0)) - 1.0).abs() < 1e-6);
        assert!(continuity_prior(64, Some(60.0)) > continuity_prior(67, Some(60.0)));
        assert_eq!(continuity_prior(80, Some(60.0)), 0.5);
    }

    #[test]
    fn test_goertzel_peaks_at_tone() {
        let sr = 44100.0;
        let tone: Vec<f32> = (0..2048)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr).sin())
            .collect();
        let on = goertzel_power(&tone, 2.0 * (2.0 * std::f32::consts::PI * 1000.0 / sr).cos());
        let off = goertzel_power(&tone, 2.0 * (2.0 * std::f32::consts::PI * 1500.0 / sr).cos());
        assert!(on > off * 100.0);
    }
}
