//! Autocorrelation-based BPM estimation
//!
//! Finds periodicity in the energy-flux onset function using FFT-accelerated
//! autocorrelation.
//!
//! # Algorithm
//!
//! 1. Remove the mean of the flux signal
//! 2. Compute autocorrelation using FFT acceleration: `ACF = IFFT(|FFT(signal)|²)`
//! 3. Normalise by `ACF[0]`
//! 4. Score every lag whose tempo lies in [min_bpm, max_bpm], weighted by a
//!    mild log-tempo prior centred on 120 BPM
//! 5. Refine the best lag by parabolic interpolation and convert:
//!    `BPM = 60 / (lag * hop_seconds)`
//!
//! # Reference
//!
//! Ellis, D. P. W., & Pikrakis, A. (2006). Real-time Beat Induction.
//! *Proceedings of the International Conference on Music Information Retrieval*.
//!
//! # Example
//!
//! ```no_run
//! use whistle_dsp::features::onset::compute_energy_flux;
//! use whistle_dsp::features::period::autocorrelation::estimate_bpm_from_flux;
//!
//! let samples = vec![0.0f32; 44100 * 10];
//! let flux = compute_energy_flux(&samples, 44100)?;
//! if let Some(candidate) = estimate_bpm_from_flux(&flux, 60.0, 200.0)? {
//!     println!("BPM: {:.1}", candidate.bpm);
//! }
//! # Ok::<(), whistle_dsp::AnalysisError>(())
//! ```

use super::BpmCandidate;
use crate::error::AnalysisError;
use crate::features::onset::FluxEnvelope;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

const EPSILON: f32 = 1e-10;

/// Centre of the tempo prior in BPM
const PRIOR_CENTER_BPM: f64 = 120.0;

/// Estimate BPM from the autocorrelation of an energy-flux signal
///
/// # Arguments
///
/// * `envelope` - Smoothed energy flux
/// * `min_bpm` - Minimum BPM to consider (typically 60.0)
/// * `max_bpm` - Maximum BPM to consider (typically 200.0)
///
/// # Returns
///
/// The best candidate, or `None` when the signal has no periodic structure
/// (silence, too short for the slowest tempo)
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if the BPM range or hop is invalid
pub fn estimate_bpm_from_flux(
    envelope: &FluxEnvelope,
    min_bpm: f64,
    max_bpm: f64,
) -> Result<Option<BpmCandidate>, AnalysisError> {
    if !(min_bpm > 0.0) || !(max_bpm > min_bpm) {
        return Err(AnalysisError::InvalidInput(format!(
            "Invalid BPM range: [{}, {}]",
            min_bpm, max_bpm
        )));
    }
    if !(envelope.hop_seconds > 0.0) {
        return Err(AnalysisError::InvalidInput(format!(
            "Invalid hop: {}",
            envelope.hop_seconds
        )));
    }

    let hop = envelope.hop_seconds;
    let min_lag = ((60.0 / (max_bpm * hop)).ceil() as usize).max(1);
    let max_lag = ((60.0 / (min_bpm * hop)).floor() as usize).max(min_lag);
    if envelope.flux.len() <= max_lag + 1 {
        log::debug!(
            "Flux too short for tempo estimation: {} frames, need > {}",
            envelope.flux.len(),
            max_lag + 1
        );
        return Ok(None);
    }

    let mean = envelope.flux.iter().sum::<f32>() / envelope.flux.len() as f32;
    let centered: Vec<f32> = envelope.flux.iter().map(|&x| x - mean).collect();
    let acf = compute_autocorrelation_fft(&centered);
    if acf[0] <= EPSILON {
        return Ok(None);
    }
    let norm: Vec<f32> = acf.iter().map(|&v| v / acf[0]).collect();

    let mut best: Option<(usize, f64)> = None;
    for lag in min_lag..=max_lag {
        let bpm = 60.0 / (lag as f64 * hop);
        let score = norm[lag] as f64 * tempo_prior(bpm);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((lag, score));
        }
    }
    let (lag, score) = match best {
        Some(b) if b.1 > 0.0 => b,
        _ => return Ok(None),
    };

    let refined_lag = lag as f64 + parabolic_offset(&norm, lag);
    let bpm = fold_bpm(60.0 / (refined_lag * hop), min_bpm, max_bpm);

    log::debug!(
        "Autocorrelation tempo: lag {:.2} frames -> {:.2} BPM (score {:.3})",
        refined_lag,
        bpm,
        score
    );

    Ok(Some(BpmCandidate {
        bpm: bpm as f32,
        confidence: norm[lag].clamp(0.0, 1.0),
    }))
}

/// Mild preference for tempi near 120 BPM (1.0 at the centre, 0.8 far away)
fn tempo_prior(bpm: f64) -> f64 {
    let octaves = (bpm / PRIOR_CENTER_BPM).log2();
    0.8 + 0.2 * (-0.5 * octaves * octaves).exp()
}

/// Fold a tempo into [min_bpm, max_bpm] by doubling or halving
pub fn fold_bpm(bpm: f64, min_bpm: f64, max_bpm: f64) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 || min_bpm <= 0.0 || max_bpm < 2.0 * min_bpm {
        return bpm;
    }
    let mut bpm = bpm;
    while bpm < min_bpm {
        bpm *= 2.0;
    }
    while bpm > max_bpm {
        bpm /= 2.0;
    }
    bpm
}

/// Fractional offset of the vertex of the parabola through `values[i-1..=i+1]`
fn parabolic_offset(values: &[f32], i: usize) -> f64 {
    if i == 0 || i + 1 >= values.len() {
        return 0.0;
    }
    let (a, b, c) = (values[i - 1] as f64, values[i] as f64, values[i + 1] as f64);
    let denom = a - 2.0 * b + c;
    if denom.abs() <= EPSILON as f64 {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
}

/// Linear autocorrelation via zero-padded FFT
fn compute_autocorrelation_fft(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();

    // FFT size: next power of 2 >= 2*n (for zero-padding)
    let fft_size = (2 * n).next_power_of_two();

    let mut fft_input: Vec<Complex<f32>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft_input.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut fft_input);

    // Compute |FFT|²
    for x in &mut fft_input {
        *x = *x * x.conj();
    }

    let ifft = planner.plan_fft_inverse(fft_size);
    ifft.process(&mut fft_input);

    let scale = 1.0 / (fft_size as f32);
    fft_input[..n].iter().map(|x| x.re * scale).collect()
}
