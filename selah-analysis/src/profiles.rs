//! Krumhansl-Schmuckler reference key profiles
//!
//! Two canonical templates (major and minor), indexed by scale degree with
//! index 0 = tonic. All 24 keys are derived by rotating these on demand.

use crate::error::KeyError;
use serde::Serialize;
use std::fmt;

/// Pitch-class labels, index 0 = C
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Krumhansl-Kessler major key profile
const MAJOR_PROFILE: [f32; 12] = [
    6.35, // Tonic (I)
    2.23, // Minor 2nd
    3.48, // Major 2nd
    2.33, // Minor 3rd
    4.38, // Major 3rd
    4.09, // Perfect 4th
    2.52, // Tritone
    5.19, // Perfect 5th
    2.39, // Minor 6th
    3.66, // Major 6th
    2.29, // Minor 7th
    2.88, // Major 7th
];

/// Krumhansl-Kessler minor key profile
const MINOR_PROFILE: [f32; 12] = [
    6.33, // Tonic (i)
    2.68, // Minor 2nd
    3.52, // Major 2nd
    5.38, // Minor 3rd
    2.60, // Major 3rd
    3.53, // Perfect 4th
    2.54, // Tritone
    4.75, // Perfect 5th
    3.98, // Minor 6th
    2.69, // Major 6th
    3.34, // Minor 7th
    3.17, // Major 7th
];

/// Label for a pitch class (wraps modulo 12)
pub fn pitch_class_label(pitch_class: usize) -> &'static str {
    PITCH_CLASSES[pitch_class % 12]
}

/// Key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Major,
    Minor,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Mode::Major => "Major",
            Mode::Minor => "Minor",
        })
    }
}

/// A 12-weight correlation template for one mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyProfile {
    mode: Mode,
    weights: [f32; 12],
}

impl KeyProfile {
    /// Build a profile from arbitrary weights
    ///
    /// Fails with [`KeyError::InvalidProfile`] unless exactly 12 finite
    /// weights are supplied.
    pub fn new(mode: Mode, weights: &[f32]) -> Result<Self, KeyError> {
        let weights: [f32; 12] = weights.try_into().map_err(|_| KeyError::InvalidProfile {
            mode,
            reason: format!("expected 12 weights, got {}", weights.len()),
        })?;

        if let Some(idx) = weights.iter().position(|w| !w.is_finite()) {
            return Err(KeyError::InvalidProfile {
                mode,
                reason: format!("weight {} is not finite", idx),
            });
        }

        Ok(Self { mode, weights })
    }

    /// The canonical major profile
    pub fn major() -> Self {
        Self {
            mode: Mode::Major,
            weights: MAJOR_PROFILE,
        }
    }

    /// The canonical minor profile
    pub fn minor() -> Self {
        Self {
            mode: Mode::Minor,
            weights: MINOR_PROFILE,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Unrotated weights (index 0 = tonic)
    pub fn weights(&self) -> &[f32; 12] {
        &self.weights
    }

    /// Profile with its tonic moved onto `tonic`
    ///
    /// Cyclic shift to the right: `rotated[(j + tonic) % 12] == weights[j]`.
    pub fn rotated(&self, tonic: usize) -> [f32; 12] {
        let mut rotated = [0.0f32; 12];
        for (degree, &weight) in self.weights.iter().enumerate() {
            rotated[(degree + tonic) % 12] = weight;
        }
        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(pitch_class_label(0), "C");
        assert_eq!(pitch_class_label(9), "A");
        assert_eq!(pitch_class_label(11), "B");
        assert_eq!(pitch_class_label(13), "C#");
    }

    #[test]
    fn test_rotate_by_zero_is_identity() {
        let profile = KeyProfile::major();
        assert_eq!(&profile.rotated(0), profile.weights());
    }

    #[test]
    fn test_rotate_moves_tonic() {
        let profile = KeyProfile::minor();
        let rotated = profile.rotated(9);
        assert_eq!(rotated[9], 6.33); // A is the tonic
        assert_eq!(rotated[0], 5.38); // C is the minor 3rd of A
        assert_eq!(rotated[4], 4.75); // E is the 5th
    }

    #[test]
    fn test_rotation_wraps() {
        let profile = KeyProfile::major();
        let rotated = profile.rotated(11);
        assert_eq!(rotated[11], 6.35);
        assert_eq!(rotated[10], 2.88);
        assert_eq!(profile.rotated(12), profile.rotated(0));
    }

    #[test]
    fn test_profile_wrong_length() {
        let err = KeyProfile::new(Mode::Major, &[1.0; 11]).unwrap_err();
        assert!(matches!(err, KeyError::InvalidProfile { mode: Mode::Major, .. }));

        let err = KeyProfile::new(Mode::Minor, &[1.0; 13]).unwrap_err();
        assert!(matches!(err, KeyError::InvalidProfile { mode: Mode::Minor, .. }));
    }

    #[test]
    fn test_profile_non_finite() {
        let mut weights = [1.0f32; 12];
        weights[3] = f32::NAN;
        assert!(KeyProfile::new(Mode::Major, &weights).is_err());
    }

    #[test]
    fn test_custom_profile() {
        let weights = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0];
        let profile = KeyProfile::new(Mode::Major, &weights).unwrap();
        assert_eq!(profile.mode(), Mode::Major);
        assert_eq!(profile.weights(), &weights);
    }
}
