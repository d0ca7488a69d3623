//! Signal preparation
//!
//! Utilities for preparing decoded PCM for frame analysis:
//! - Channel mixing (multichannel to mono)
//! - Lead emphasis for dense mixes (high-pass + soft clip)

pub mod channel_mixer;
pub mod lead_emphasis;

pub use channel_mixer::{deinterleave_to_mono, downmix};
pub use lead_emphasis::emphasize_lead;
