//! McLeod Pitch Method (MPM) for monophonic frames
//!
//! Algorithm:
//! 1. Autocorrelation `r(τ)` via FFT: `IFFT(|FFT(x)|²)`
//! 2. Normalized square difference `n(τ) = 2·r(τ) / m(τ)` where
//!    `m(τ) = Σ x[i]² + x[i+τ]²` is updated incrementally
//! 3. Key maxima: the highest peak between each pair of positive-going and
//!    negative-going zero crossings
//! 4. Pick the first key maximum within 90% of the highest one
//! 5. Parabolic interpolation gives the period and the clarity (peak height)
//!
//! # Reference
//!
//! McLeod, P., & Wyvill, G. (2005). A Smarter Way to Find Pitch.
//! *Proceedings of the International Computer Music Conference*.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::PitchEstimate;

/// Fraction of the highest key maximum a peak must reach to be selected
const KEY_MAXIMUM_CUTOFF: f32 = 0.9;

/// Numerical stability epsilon
const EPSILON: f32 = 1e-10;

/// Reusable MPM detector for frames of a fixed maximum size
pub struct McLeodDetector {
    frame_size: usize,
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    nsdf: Vec<f32>,
}

impl McLeodDetector {
    /// Create a detector for frames of up to `frame_size` samples
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(4);
        let fft_size = (2 * frame_size).next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            frame_size,
            fft_size,
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            nsdf: vec![0.0; frame_size / 2],
        }
    }

    /// Estimate pitch and clarity of one frame
    ///
    /// # Arguments
    ///
    /// * `frame` - Frame samples (truncated to the detector's frame size)
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    ///
    /// [`PitchEstimate`] with `hz = 0.0` and `clarity = 0.0` when no periodic
    /// structure is found (silence, noise, too-short frames).
    pub fn find_pitch(&mut self, frame: &[f32], sample_rate: u32) -> PitchEstimate {
        let n = frame.len().min(self.frame_size);
        if n < 4 || sample_rate == 0 {
            return PitchEstimate::none();
        }
        let frame = &frame[..n];

        // Step 1: autocorrelation via FFT
        for (slot, &x) in self.buffer.iter_mut().zip(frame.iter()) {
            *slot = Complex::new(x, 0.0);
        }
        for slot in self.buffer[n..].iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }
        self.forward.process(&mut self.buffer);
        for x in self.buffer.iter_mut() {
            *x = *x * x.conj();
        }
        self.inverse.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let r0 = self.buffer[0].re * scale;
        if r0 <= EPSILON {
            return PitchEstimate::none();
        }

        // Step 2: NSDF with incremental m(τ)
        let max_lag = n / 2;
        let nsdf = &mut self.nsdf[..max_lag];
        let mut m = 2.0 * r0;
        nsdf[0] = 1.0;
        for tau in 1..max_lag {
            m -= frame[tau - 1] * frame[tau - 1] + frame[n - tau] * frame[n - tau];
            let r = self.buffer[tau].re * scale;
            nsdf[tau] = if m > EPSILON { 2.0 * r / m } else { 0.0 };
        }

        // Step 3: key maxima
        let maxima = key_maxima(nsdf);
        if maxima.is_empty() {
            return PitchEstimate::none();
        }

        // Step 4: first maximum above the cutoff
        let highest = maxima
            .iter()
            .map(|&i| nsdf[i])
            .fold(f32::NEG_INFINITY, f32::max);
        let cutoff = highest * KEY_MAXIMUM_CUTOFF;
        let chosen = match maxima.iter().copied().find(|&i| nsdf[i] >= cutoff) {
            Some(i) => i,
            None => return PitchEstimate::none(),
        };

        // Step 5: parabolic interpolation
        let (period, peak) = parabolic_peak(nsdf, chosen);
        if period <= 0.0 {
            return PitchEstimate::none();
        }

        PitchEstimate {
            hz: sample_rate as f32 / period,
            clarity: peak.clamp(0.0, 1.0),
        }
    }
}

/// Find key maxima of an NSDF curve
///
/// The initial positive lobe around τ = 0 is skipped; afterwards, the highest
/// local maximum of every positive region is reported.
fn key_maxima(nsdf: &[f32]) -> Vec<usize> {
    let len = nsdf.len();
    let mut maxima = Vec::new();
    if len < 3 {
        return maxima;
    }

    let mut pos = 0;
    while pos < len - 1 && nsdf[pos] > 0.0 {
        pos += 1;
    }
    while pos < len - 1 && nsdf[pos] <= 0.0 {
        pos += 1;
    }
    pos = pos.max(1);

    let mut current: Option<usize> = None;
    while pos < len - 1 {
        if nsdf[pos] > nsdf[pos - 1] && nsdf[pos] >= nsdf[pos + 1] {
            match current {
                Some(c) if nsdf[c] >= nsdf[pos] => {}
                _ => current = Some(pos),
            }
        }
        pos += 1;
        if pos < len - 1 && nsdf[pos] <= 0.0 {
            if let Some(c) = current.take() {
                maxima.push(c);
            }
            while pos < len - 1 && nsdf[pos] <= 0.0 {
                pos += 1;
            }
        }
    }
    if let Some(c) = current {
        maxima.push(c);
    }
    maxima
}

/// Parabolic interpolation around index `i`
///
/// # Returns
///
/// `(position, value)` of the interpolated vertex
fn parabolic_peak(values: &[f32], i: usize) -> (f32, f32) {
    if i == 0 || i + 1 >= values.len() {
        return (i as f32, values[i]);
    }
    let a = values[i - 1];
    let b = values[i];
    let c = values[i + 1];
    let denom = a - 2.0 * b + c;
    if denom.abs() <= EPSILON {
        return (i as f32, b);
    }
    let delta = 0.5 * (a - c) / denom;
    let peak = b - 0.25 * (a - c) * delta;
    (i as f32 + delta, peak)
}
