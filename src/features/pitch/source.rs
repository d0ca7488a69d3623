//! Pitch-track sources
//!
//! A pitch track is a parallel pair of per-hop arrays (`pitch_hz`,
//! `confidence`). The transcription pipeline does not care where it comes
//! from, so every producer implements [`PitchTrackSource`]:
//!
//! - [`McLeodTrackSource`]: built-in monophonic detector (always available)
//! - [`HarmonicSumTrackSource`]: built-in predominant-pitch estimator for full mixes
//! - [`PrecomputedPitchTrack`]: result of an external estimator, validated before use

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::preprocessing::emphasize_lead;

use super::harmonic_sum::HarmonicSumEstimator;
use super::mcleod::McLeodDetector;
use super::{fill_frame, frame_count, PitchEstimate, FRAME_SIZE, HOP_SIZE};
use crate::theory::freq_to_midi_float;

/// Frequency above which the fallback comparison favours a candidate
const REGISTER_BONUS_FLOOR_HZ: f32 = 180.0;

/// Per-hop pitch and confidence values
#[derive(Debug, Clone, PartialEq)]
pub struct PitchTrack {
    /// Name of the estimator that produced the track
    pub backend: String,
    /// Time between consecutive values in seconds
    pub hop_seconds: f64,
    /// Pitch per hop in Hz (0.0 = unpitched)
    pub pitch_hz: Vec<f32>,
    /// Confidence per hop in [0.0, 1.0]
    pub confidence: Vec<f32>,
}

impl PitchTrack {
    /// Pitch and confidence nearest to `time_sec`, or `None` past the end of the track
    pub fn at_time(&self, time_sec: f64) -> Option<PitchEstimate> {
        if self.hop_seconds <= 0.0 || !time_sec.is_finite() || time_sec < 0.0 {
            return None;
        }
        let index = (time_sec / self.hop_seconds).round() as usize;
        let hz = *self.pitch_hz.get(index)?;
        let clarity = self.confidence.get(index).copied().unwrap_or(0.0);
        Some(PitchEstimate { hz, clarity })
    }
}

/// Capability: produce a pitch track for a mono buffer
pub trait PitchTrackSource {
    /// Short backend name reported in diagnostics
    fn backend(&self) -> &str;

    /// Estimate the pitch track
    ///
    /// # Arguments
    ///
    /// * `samples` - Mono samples
    /// * `sample_rate` - Sample rate in Hz
    /// * `min_hz` / `max_hz` - Band of interest
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::EstimatorFailure` when the estimator cannot
    /// produce a usable track.
    fn track(
        &self,
        samples: &[f32],
        sample_rate: u32,
        min_hz: f32,
        max_hz: f32,
    ) -> Result<PitchTrack, AnalysisError>;
}

/// Built-in McLeod Pitch Method source
#[derive(Debug, Clone, Copy, Default)]
pub struct McLeodTrackSource;

impl PitchTrackSource for McLeodTrackSource {
    fn backend(&self) -> &str {
        "mcleod"
    }

    fn track(
        &self,
        samples: &[f32],
        sample_rate: u32,
        _min_hz: f32,
        _max_hz: f32,
    ) -> Result<PitchTrack, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidInput("Invalid sample rate".to_string()));
        }

        let frames = frame_count(samples.len());
        let mut detector = McLeodDetector::new(FRAME_SIZE);
        let mut frame = vec![0.0f32; FRAME_SIZE];
        let mut pitch_hz = Vec::with_capacity(frames);
        let mut confidence = Vec::with_capacity(frames);

        for i in 0..frames {
            fill_frame(samples, i, &mut frame);
            let estimate = detector.find_pitch(&frame, sample_rate);
            pitch_hz.push(estimate.hz);
            confidence.push(estimate.clarity);
        }

        Ok(PitchTrack {
            backend: self.backend().to_string(),
            hop_seconds: HOP_SIZE as f64 / sample_rate as f64,
            pitch_hz,
            confidence,
        })
    }
}

/// Built-in predominant-pitch source for full mixes
///
/// Runs harmonic summation on the lead-emphasized signal. Frames where no
/// candidate is viable fall back to the McLeod detector on both the emphasized
/// and the raw frame, keeping whichever wins after a register bonus.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarmonicSumTrackSource;

impl PitchTrackSource for HarmonicSumTrackSource {
    fn backend(&self) -> &str {
        "harmonic_sum"
    }

    fn track(
        &self,
        samples: &[f32],
        sample_rate: u32,
        min_hz: f32,
        max_hz: f32,
    ) -> Result<PitchTrack, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidInput("Invalid sample rate".to_string()));
        }

        let emphasized = emphasize_lead(samples, sample_rate);
        let estimator = HarmonicSumEstimator::new(sample_rate, FRAME_SIZE, min_hz, max_hz);
        let mut detector = McLeodDetector::new(FRAME_SIZE);

        let frames = frame_count(samples.len());
        let mut lead_frame = vec![0.0f32; FRAME_SIZE];
        let mut raw_frame = vec![0.0f32; FRAME_SIZE];
        let mut pitch_hz = Vec::with_capacity(frames);
        let mut confidence = Vec::with_capacity(frames);
        let mut previous_midi: Option<f32> = None;
        let mut fallback_frames = 0usize;

        for i in 0..frames {
            fill_frame(&emphasized, i, &mut lead_frame);
            let estimate = match estimator.estimate(&lead_frame, previous_midi) {
                Some(estimate) => estimate,
                None => {
                    fallback_frames += 1;
                    fill_frame(samples, i, &mut raw_frame);
                    let lead = detector.find_pitch(&lead_frame, sample_rate);
                    let raw = detector.find_pitch(&raw_frame, sample_rate);
                    if fallback_score(&raw) > fallback_score(&lead) {
                        raw
                    } else {
                        lead
                    }
                }
            };

            let in_band = estimate.hz >= min_hz && estimate.hz <= max_hz;
            if in_band {
                previous_midi = freq_to_midi_float(estimate.hz).or(previous_midi);
                pitch_hz.push(estimate.hz);
                confidence.push(estimate.clarity);
            } else {
                pitch_hz.push(0.0);
                confidence.push(0.0);
            }
        }

        log::debug!(
            "Harmonic-sum track: {} frames, {} via McLeod fallback",
            frames,
            fallback_frames
        );

        Ok(PitchTrack {
            backend: self.backend().to_string(),
            hop_seconds: HOP_SIZE as f64 / sample_rate as f64,
            pitch_hz,
            confidence,
        })
    }
}

/// Clarity scaled by a log-frequency bonus for the melodic register
fn fallback_score(estimate: &PitchEstimate) -> f32 {
    if estimate.hz <= 0.0 {
        return 0.0;
    }
    let bonus = if estimate.hz >= REGISTER_BONUS_FLOOR_HZ {
        0.1 + 0.1 * (estimate.hz / REGISTER_BONUS_FLOOR_HZ).log2().min(1.0)
    } else {
        0.0
    };
    estimate.clarity * (1.0 + bonus)
}

/// Result of an external pitch/key/tempo estimator
///
/// Field names follow the camelCase wire shape the estimator produces.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalPitchResult {
    /// Estimator name
    pub backend: String,
    /// Time between consecutive values in seconds
    pub hop_seconds: f64,
    /// Pitch per hop in Hz (0.0 = unpitched)
    pub pitch_hz: Vec<f32>,
    /// Confidence per hop in [0.0, 1.0]
    pub pitch_confidence: Vec<f32>,
    /// Tempo estimate
    pub bpm: Option<f64>,
    /// Tempo confidence (estimator-specific scale)
    pub bpm_confidence: Option<f64>,
    /// Key estimate (e.g. "A", "Eb")
    pub key: Option<String>,
    /// Scale estimate ("major" / "minor")
    pub scale: Option<String>,
    /// Key strength (estimator-specific scale)
    pub key_strength: Option<f32>,
    /// Failure reported by the estimator itself
    pub error: Option<String>,
}

impl ExternalPitchResult {
    /// Check the result is structurally usable as a pitch track
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::EstimatorFailure` if the estimator reported an
    /// error, the hop is not positive, the arrays are empty or of different
    /// lengths, or any value is non-finite or negative.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if let Some(error) = &self.error {
            return Err(AnalysisError::EstimatorFailure(format!(
                "{} reported: {}",
                self.backend_name(),
                error
            )));
        }
        if !self.hop_seconds.is_finite() || self.hop_seconds <= 0.0 {
            return Err(AnalysisError::EstimatorFailure(format!(
                "Invalid hop size: {}",
                self.hop_seconds
            )));
        }
        if self.pitch_hz.is_empty() {
            return Err(AnalysisError::EstimatorFailure(
                "Empty pitch track".to_string(),
            ));
        }
        if self.pitch_hz.len() != self.pitch_confidence.len() {
            return Err(AnalysisError::EstimatorFailure(format!(
                "Pitch/confidence length mismatch: {} vs {}",
                self.pitch_hz.len(),
                self.pitch_confidence.len()
            )));
        }
        let malformed = self
            .pitch_hz
            .iter()
            .chain(self.pitch_confidence.iter())
            .any(|v| !v.is_finite() || *v < 0.0);
        if malformed {
            return Err(AnalysisError::EstimatorFailure(
                "Pitch track contains non-finite or negative values".to_string(),
            ));
        }
        Ok(())
    }

    /// Backend name, or "external" when the estimator did not name itself
    pub fn backend_name(&self) -> &str {
        if self.backend.is_empty() {
            "external"
        } else {
            &self.backend
        }
    }

    /// Tempo hint when the estimator is confident enough to trust it
    pub fn confident_bpm(&self, min_confidence: f64) -> Option<f64> {
        match (self.bpm, self.bpm_confidence) {
            (Some(bpm), Some(conf)) if bpm.is_finite() && bpm > 0.0 && conf >= min_confidence => {
                Some(bpm)
            }
            _ => None,
        }
    }
}

/// Pitch track computed elsewhere (e.g. a worker running a heavier model)
#[derive(Debug, Clone)]
pub struct PrecomputedPitchTrack {
    result: ExternalPitchResult,
}

impl PrecomputedPitchTrack {
    /// Wrap an external result
    pub fn new(result: ExternalPitchResult) -> Self {
        Self { result }
    }

    /// The wrapped result (tempo and key hints included)
    pub fn result(&self) -> &ExternalPitchResult {
        &self.result
    }
}

impl PitchTrackSource for PrecomputedPitchTrack {
    fn backend(&self) -> &str {
        self.result.backend_name()
    }

    fn track(
        &self,
        _samples: &[f32],
        _sample_rate: u32,
        min_hz: f32,
        max_hz: f32,
    ) -> Result<PitchTrack, AnalysisError> {
        self.result.validate()?;

        // Out-of-band values are unpitched for the voicing stage
        let (pitch_hz, confidence) = self
            .result
            .pitch_hz
            .iter()
            .zip(self.result.pitch_confidence.iter())
            .map(|(&hz, &conf)| {
                if hz >= min_hz && hz <= max_hz {
                    (hz, conf.min(1.0))
                } else {
                    (0.0, 0.0)
                }
            })
            .unzip();

        Ok(PitchTrack {
            backend: self.backend().to_string(),
            hop_seconds: self.result.hop_seconds,
            pitch_hz,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn external(pitch: Vec<f32>, conf: Vec<f32>) -> ExternalPitchResult {
        ExternalPitchResult {
            backend: "worker".to_string(),
            hop_seconds: 0.01,
            pitch_hz: pitch,
            pitch_confidence: conf,
            ..Default::default()
        }
    }

    #[test]
    fn test_mcleod_source_tracks_tone() {
        let samples = sine(440.0, 44100, 0.5);
        let track = McLeodTrackSource.track(&samples, 44100, 200.0, 2500.0).unwrap();
        assert_eq!(track.backend, "mcleod");
        assert_eq!(track.pitch_hz.len(), frame_count(samples.len()));
        let mid = track.pitch_hz[track.pitch_hz.len() / 2];
        assert!((mid - 440.0).abs() < 3.0, "Got {:.2} Hz", mid);
    }

    #[test]
    fn test_harmonic_sum_source_silence() {
        let samples = vec![0.0f32; 8192];
        let track = HarmonicSumTrackSource
            .track(&samples, 44100, 200.0, 2500.0)
            .unwrap();
        assert!(track.pitch_hz.iter().all(|&hz| hz == 0.0));
        assert!(track.confidence.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(McLeodTrackSource.track(&[0.0; 10], 0, 200.0, 2500.0).is_err());
    }

    #[test]
    fn test_external_validation() {
        assert!(external(vec![440.0], vec![0.9]).validate().is_ok());
        assert!(external(vec![], vec![]).validate().is_err());
        assert!(external(vec![440.0, 0.0], vec![0.9]).validate().is_err());
        assert!(external(vec![f32::NAN], vec![0.9]).validate().is_err());

        let mut failed = external(vec![440.0], vec![0.9]);
        failed.error = Some("model not loaded".to_string());
        match failed.validate() {
            Err(AnalysisError::EstimatorFailure(msg)) => assert!(msg.contains("model not loaded")),
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_precomputed_track_gates_band() {
        let source = PrecomputedPitchTrack::new(external(vec![100.0, 440.0], vec![0.8, 1.4]));
        let track = source.track(&[], 44100, 200.0, 2500.0).unwrap();
        assert_eq!(track.backend, "worker");
        assert_eq!(track.pitch_hz, vec![0.0, 440.0]);
        assert_eq!(track.confidence, vec![0.0, 1.0]);
    }

    #[test]
    fn test_at_time_nearest_hop() {
        let track = PitchTrack {
            backend: "t".to_string(),
            hop_seconds: 0.1,
            pitch_hz: vec![100.0, 200.0, 300.0],
            confidence: vec![0.1, 0.2, 0.3],
        };
        assert_eq!(track.at_time(0.14).map(|e| e.hz), Some(200.0));
        assert_eq!(track.at_time(0.26).map(|e| e.hz), Some(300.0));
        assert!(track.at_time(0.5).is_none());
    }

    #[test]
    fn test_external_json_shape() {
        let json = r#"{"backend":"essentia","hopSeconds":0.0116,"pitchHz":[0,440],
            "pitchConfidence":[0,0.9],"bpm":98.5,"bpmConfidence":2.1,"key":"A","scale":"minor"}"#;
        let parsed: ExternalPitchResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.pitch_hz, vec![0.0, 440.0]);
        assert_eq!(parsed.confident_bpm(1.0), Some(98.5));
        assert_eq!(parsed.key.as_deref(), Some("A"));
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_fallback_score_prefers_register() {
        let low = PitchEstimate { hz: 120.0, clarity: 0.8 };
        let high = PitchEstimate { hz: 400.0, clarity: 0.8 };
        assert!(fallback_score(&high) > fallback_score(&low));
        assert_eq!(fallback_score(&PitchEstimate::none()), 0.0);
    }
}
