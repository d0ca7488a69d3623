//! Energy flux onset detection
//!
//! Detects onsets by finding peaks in the frame-by-frame energy derivative.
//!
//! Algorithm:
//! 1. Divide audio into overlapping frames (1024-sample window, 512-sample hop)
//! 2. Compute RMS energy per frame
//! 3. Compute energy derivative (flux): `E_flux[n] = max(0, E[n] - E[n-1])`
//! 4. Smooth the flux with a 3-tap moving average
//! 5. Onsets are local flux maxima above the 90th percentile
//!
//! # Example
//!
//! ```no_run
//! use whistle_dsp::features::onset::energy_flux::{compute_energy_flux, detect_flux_onsets};
//!
//! let samples = vec![0.0f32; 44100 * 10];
//! let flux = compute_energy_flux(&samples, 44100)?;
//! let onsets = detect_flux_onsets(&flux);
//! println!("Found {} onsets", onsets.len());
//! # Ok::<(), whistle_dsp::AnalysisError>(())
//! ```

use crate::error::AnalysisError;
use crate::features::stats::percentile;

use super::FluxEnvelope;

/// Envelope window in samples
pub const ENVELOPE_WINDOW: usize = 1024;

/// Envelope hop in samples
pub const ENVELOPE_HOP: usize = 512;

/// Percentile a flux peak must exceed to count as an onset
const ONSET_PERCENTILE: f32 = 0.9;

/// Numerical stability epsilon
const EPSILON: f32 = 1e-10;

/// RMS energy envelope
///
/// # Arguments
///
/// * `samples` - Mono samples
/// * `frame_size` - Window length in samples
/// * `hop_size` - Hop between windows in samples
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if `frame_size` or `hop_size` is zero
pub fn energy_envelope(
    samples: &[f32],
    frame_size: usize,
    hop_size: usize,
) -> Result<Vec<f32>, AnalysisError> {
    if frame_size == 0 {
        return Err(AnalysisError::InvalidInput(
            "Frame size must be > 0".to_string(),
        ));
    }
    if hop_size == 0 {
        return Err(AnalysisError::InvalidInput(
            "Hop size must be > 0".to_string(),
        ));
    }
    if samples.len() < frame_size {
        return Ok(Vec::new());
    }

    let num_frames = (samples.len() - frame_size) / hop_size + 1;
    let envelope = (0..num_frames)
        .map(|i| {
            let start = i * hop_size;
            let frame = &samples[start..start + frame_size];
            let sum_sq: f32 = frame.iter().map(|&x| x * x).sum();
            (sum_sq / frame_size as f32).sqrt()
        })
        .collect();
    Ok(envelope)
}

/// Positive first difference of an envelope, smoothed with a 3-tap average
///
/// The output has the same length as the envelope; index 0 is always 0.
pub fn positive_flux(envelope: &[f32]) -> Vec<f32> {
    if envelope.len() < 2 {
        return vec![0.0; envelope.len()];
    }
    let mut raw = Vec::with_capacity(envelope.len());
    raw.push(0.0f32);
    for i in 1..envelope.len() {
        raw.push((envelope[i] - envelope[i - 1]).max(0.0));
    }

    (0..raw.len())
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 2).min(raw.len());
            raw[lo..hi].iter().sum::<f32>() / (hi - lo) as f32
        })
        .collect()
}

/// Compute the smoothed energy flux of a buffer
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero sample rate
pub fn compute_energy_flux(samples: &[f32], sample_rate: u32) -> Result<FluxEnvelope, AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("Invalid sample rate".to_string()));
    }
    let envelope = energy_envelope(samples, ENVELOPE_WINDOW, ENVELOPE_HOP)?;
    let flux = positive_flux(&envelope);

    log::debug!(
        "Energy flux: {} frames from {} samples",
        flux.len(),
        samples.len()
    );

    Ok(FluxEnvelope {
        flux,
        hop_seconds: ENVELOPE_HOP as f64 / sample_rate as f64,
    })
}

/// Onset times (seconds) at local flux maxima above the 90th percentile
pub fn detect_flux_onsets(envelope: &FluxEnvelope) -> Vec<f64> {
    let flux = &envelope.flux;
    if flux.len() < 3 {
        return Vec::new();
    }
    let threshold = percentile(flux, ONSET_PERCENTILE).max(EPSILON);

    let onsets: Vec<f64> = (1..flux.len() - 1)
        .filter(|&i| flux[i] > threshold && flux[i] > flux[i - 1] && flux[i] >= flux[i + 1])
        .map(|i| i as f64 * envelope.hop_seconds)
        .collect();

    log::debug!(
        "Energy flux detected {} onsets (threshold {:.5})",
        onsets.len(),
        threshold
    );
    onsets
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generate a synthetic kick pattern at specified BPM
    /// Creates 4-on-floor pattern (kick every beat)
    fn generate_kick_pattern(duration_seconds: f32, bpm: f32, sample_rate: f32) -> Vec<f32> {
        let num_samples = (duration_seconds * sample_rate) as usize;
        let mut samples = vec![0.0f32; num_samples];
        let beat_interval = (60.0 / bpm * sample_rate) as usize;
        let kick_samples = (0.1 * sample_rate) as usize;

        let mut pos = 0;
        while pos < num_samples {
            let end = (pos + kick_samples).min(num_samples);
            for i in pos..end {
                let t = (i - pos) as f32 / kick_samples as f32;
                samples[i] = 0.8 * (-t * 5.0).exp();
            }
            pos += beat_interval;
        }
        samples
    }

    #[test]
    fn test_envelope_step() {
        let mut samples = vec![0.0f32; 8192];
        for s in samples[4096..].iter_mut() {
            *s = 0.5;
        }
        let envelope = energy_envelope(&samples, 1024, 512).unwrap();
        assert_eq!(envelope[0], 0.0);
        assert!((envelope.last().copied().unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_envelope_invalid_parameters() {
        assert!(energy_envelope(&[0.0; 10], 0, 512).is_err());
        assert!(energy_envelope(&[0.0; 10], 1024, 0).is_err());
        assert!(energy_envelope(&[0.0; 10], 1024, 512).unwrap().is_empty());
    }

    #[test]
    fn test_positive_flux_ignores_decay() {
        let flux = positive_flux(&[0.0, 1.0, 0.5, 0.0, 0.0]);
        assert_eq!(flux.len(), 5);
        assert!(flux[1] > 0.0);
        assert_eq!(flux[4], 0.0);
    }

    #[test]
    fn test_kick_pattern_onsets() {
        let samples = generate_kick_pattern(4.0, 120.0, 44100.0);
        let flux = compute_energy_flux(&samples, 44100).unwrap();
        let onsets = detect_flux_onsets(&flux);
        assert!(onsets.len() >= 6, "Found {} onsets", onsets.len());
        for pair in onsets.windows(2) {
            let ioi = pair[1] - pair[0];
            assert!((ioi - 0.5).abs() < 0.05, "IOI {:.3}", ioi);
        }
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let flux = compute_energy_flux(&vec![0.0f32; 44100], 44100).unwrap();
        assert!(detect_flux_onsets(&flux).is_empty());
    }
}
