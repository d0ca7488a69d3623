//! Lead-emphasis filter for dense mixes
//!
//! Bass and kick energy dominate the low end of a full mix and pull harmonic
//! pitch estimators toward the accompaniment. The emphasis chain removes that
//! energy and compresses peaks so the melodic register stands out:
//!
//! 1. Second-order high-pass (RBJ biquad, Q = 0.707)
//! 2. Peak normalization
//! 3. `tanh` soft clip, rescaled so full scale maps to full scale

/// High-pass cutoff in Hz
pub const LEAD_EMPHASIS_CUTOFF_HZ: f32 = 180.0;

/// Soft-clip drive
const SOFT_CLIP_DRIVE: f32 = 2.0;

const EPSILON: f32 = 1e-10;

/// Second-order high-pass filter (Direct Form II transposed)
struct HighPassFilter {
    x1: f32,
    x2: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl HighPassFilter {
    fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        // Keep the cutoff below Nyquist for very low sample rates
        let cutoff = cutoff_hz.min(sample_rate * 0.45);
        let w0 = 2.0 * std::f32::consts::PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * 0.707);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            x1: 0.0,
            x2: 0.0,
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    fn process(&mut self, sample: f32) -> f32 {
        let output = self.b0 * sample + self.x1;
        self.x1 = self.b1 * sample + self.x2 - self.a1 * output;
        self.x2 = self.b2 * sample - self.a2 * output;
        output
    }
}

/// Apply the lead-emphasis chain to a mono buffer
///
/// # Arguments
///
/// * `samples` - Mono samples
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// Filtered samples in [-1.0, 1.0], same length as the input. Silent input
/// stays silent.
pub fn emphasize_lead(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    if samples.is_empty() || sample_rate == 0 {
        return samples.to_vec();
    }

    let mut filter = HighPassFilter::new(LEAD_EMPHASIS_CUTOFF_HZ, sample_rate as f32);
    let mut filtered: Vec<f32> = samples.iter().map(|&s| filter.process(s)).collect();

    let peak = filtered.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak <= EPSILON {
        return filtered;
    }

    let gain = 1.0 / peak;
    let norm = SOFT_CLIP_DRIVE.tanh();
    for s in &mut filtered {
        *s = (*s * gain * SOFT_CLIP_DRIVE).tanh() / norm;
    }

    log::debug!(
        "Lead emphasis: {} samples, peak before clip {:.4}",
        samples.len(),
        peak
    );

    filtered
}
