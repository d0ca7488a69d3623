//! Feature extraction modules
//!
//! This module contains all feature extraction algorithms:
//! - Pitch estimation (McLeod, harmonic summation, external tracks)
//! - Voicing classification with adaptive recovery
//! - Segmentation and segment cleanup
//! - Key detection
//! - Onset detection (energy flux)
//! - Period estimation (BPM and feel)

pub mod key;
pub mod onset;
pub mod period;
pub mod pitch;
pub mod segmentation;
pub mod stats;
pub mod voicing;
