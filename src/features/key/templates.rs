//! Krumhansl-Kessler key templates
//!
//! Defines tonal profiles for 24 keys (12 major + 12 minor). Each template is
//! the C-rooted profile rotated so that index `pc` holds the weight of pitch
//! class `pc` relative to the key's tonic.

use crate::theory::Scale;

/// Krumhansl-Kessler C major probe-tone profile
pub const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler C minor probe-tone profile
pub const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.6, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Key templates for all 24 keys
#[derive(Debug, Clone)]
pub struct KeyTemplates {
    /// Major key templates (12 keys: C, C#, D, ..., B)
    pub major: [[f32; 12]; 12],

    /// Minor key templates (12 keys: C, C#, D, ..., B)
    pub minor: [[f32; 12]; 12],
}

impl KeyTemplates {
    /// Create templates from the Krumhansl-Kessler profiles
    pub fn new() -> Self {
        let mut major = [[0.0f32; 12]; 12];
        let mut minor = [[0.0f32; 12]; 12];
        for root in 0..12 {
            major[root] = rotate(&MAJOR_PROFILE, root);
            minor[root] = rotate(&MINOR_PROFILE, root);
        }
        Self { major, minor }
    }

    /// Template for a key
    pub fn get(&self, root: usize, scale: Scale) -> &[f32; 12] {
        match scale {
            Scale::Major => &self.major[root % 12],
            Scale::Minor => &self.minor[root % 12],
        }
    }
}

impl Default for KeyTemplates {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotate a C-rooted profile so that `root` carries the tonic weight
fn rotate(profile: &[f32; 12], root: usize) -> [f32; 12] {
    let mut out = [0.0f32; 12];
    for (pc, slot) in out.iter_mut().enumerate() {
        *slot = profile[(pc + 12 - root % 12) % 12];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tonic_weight_follows_root() {
        let templates = KeyTemplates::new();
        for root in 0..12 {
            assert_eq!(templates.get(root, Scale::Major)[root], MAJOR_PROFILE[0]);
            assert_eq!(templates.get(root, Scale::Minor)[root], MINOR_PROFILE[0]);
        }
        // Dominant of A major is E
        assert_eq!(templates.get(9, Scale::Major)[4], MAJOR_PROFILE[7]);
    }
}
