//! Onset detection
//!
//! Energy-flux onset function shared by tempo and feel estimation.

pub mod energy_flux;

pub use energy_flux::{compute_energy_flux, detect_flux_onsets};

/// Smoothed positive energy flux, one value per envelope hop
#[derive(Debug, Clone, PartialEq)]
pub struct FluxEnvelope {
    /// Flux values
    pub flux: Vec<f32>,

    /// Time between consecutive values in seconds
    pub hop_seconds: f64,
}
