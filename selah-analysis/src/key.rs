//! Key-finding via chroma/profile correlation
//!
//! Implements the Krumhansl-Schmuckler procedure:
//! 1. Correlate the chroma vector with all 12 rotations of the major and
//!    minor profiles (Pearson correlation)
//! 2. Pick the best (tonic, mode) pair, preferring major on an exact tie
//! 3. Rank all 24 candidates by score

use crate::chroma::{variance, ChromaVector};
use crate::error::KeyError;
use crate::profiles::{pitch_class_label, KeyProfile, Mode};
use serde::Serialize;
use std::fmt;

/// Variance below which a chroma vector or profile is treated as flat
pub const MIN_VARIANCE: f64 = 1e-12;

/// Correlation scores for all 24 keys, indexed by tonic pitch class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyScores {
    pub major: [f32; 12],
    pub minor: [f32; 12],
}

/// A scored key hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyCandidate {
    /// Tonic pitch class (0 = C)
    pub tonic: u8,
    /// Tonic label, e.g. "F#"
    pub key: &'static str,
    pub mode: Mode,
    /// Pearson correlation coefficient in [-1, 1]
    pub score: f32,
}

impl KeyCandidate {
    pub fn new(tonic: u8, mode: Mode, score: f32) -> Self {
        Self {
            tonic: tonic % 12,
            key: pitch_class_label(tonic as usize),
            mode,
            score,
        }
    }

    pub fn label(&self) -> &'static str {
        self.key
    }
}

impl fmt::Display for KeyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({:.3})", self.key, self.mode, self.score)
    }
}

/// Pearson correlation coefficient between two 12-element vectors
///
/// Returns `None` when either vector has zero variance.
pub fn pearson(a: &[f32; 12], b: &[f32; 12]) -> Option<f32> {
    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / 12.0;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / 12.0;

    let mut numerator = 0.0f64;
    let mut denom_a = 0.0f64;
    let mut denom_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let da = x as f64 - mean_a;
        let db = y as f64 - mean_b;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denom = (denom_a * denom_b).sqrt();
    if denom > 0.0 {
        Some((numerator / denom) as f32)
    } else {
        None
    }
}

fn check_profile(profile: &KeyProfile, expected: Mode) -> Result<(), KeyError> {
    if profile.mode() != expected {
        return Err(KeyError::InvalidProfile {
            mode: profile.mode(),
            reason: format!("expected a {} profile", expected),
        });
    }
    if variance(profile.weights()) < MIN_VARIANCE {
        return Err(KeyError::InvalidProfile {
            mode: expected,
            reason: "weights have zero variance".to_string(),
        });
    }
    Ok(())
}

/// Correlate a chroma vector against every rotation of both profiles
///
/// Score index `i` treats pitch class `i` as the tonic. A flat chroma vector
/// (zero variance) fails with [`KeyError::DegenerateChroma`].
pub fn correlate(
    chroma: &ChromaVector,
    major: &KeyProfile,
    minor: &KeyProfile,
) -> Result<KeyScores, KeyError> {
    check_profile(major, Mode::Major)?;
    check_profile(minor, Mode::Minor)?;

    let values = chroma.values();
    let spread = chroma.variance();
    if spread < MIN_VARIANCE {
        return Err(KeyError::DegenerateChroma(format!(
            "chroma variance {:e} is near zero",
            spread
        )));
    }

    let mut scores = KeyScores {
        major: [0.0; 12],
        minor: [0.0; 12],
    };

    for tonic in 0..12 {
        for (profile, slot) in [(major, &mut scores.major), (minor, &mut scores.minor)] {
            slot[tonic] = pearson(values, &profile.rotated(tonic)).ok_or_else(|| {
                KeyError::DegenerateChroma("correlation is undefined".to_string())
            })?;
        }
    }

    Ok(scores)
}

/// Index and value of the first maximum
fn argmax(scores: &[f32; 12]) -> (usize, f32) {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = i;
        }
    }
    (best, scores[best])
}

/// Best-scoring key; an exact tie between the best major and best minor
/// score goes to major
pub fn select_primary(scores: &KeyScores) -> KeyCandidate {
    let (major_idx, major_best) = argmax(&scores.major);
    let (minor_idx, minor_best) = argmax(&scores.minor);

    if major_best >= minor_best {
        KeyCandidate::new(major_idx as u8, Mode::Major, major_best)
    } else {
        KeyCandidate::new(minor_idx as u8, Mode::Minor, minor_best)
    }
}

/// All 24 candidates sorted by descending score, truncated to `top_n`
///
/// Equal scores keep their original order: majors C..B, then minors C..B.
pub fn rank(scores: &KeyScores, top_n: usize) -> Vec<KeyCandidate> {
    let mut candidates: Vec<KeyCandidate> = scores
        .major
        .iter()
        .enumerate()
        .map(|(i, &s)| KeyCandidate::new(i as u8, Mode::Major, s))
        .chain(
            scores
                .minor
                .iter()
                .enumerate()
                .map(|(i, &s)| KeyCandidate::new(i as u8, Mode::Minor, s)),
        )
        .collect();

    // `sort_by` is stable
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(top_n);
    candidates
}

/// Primary key and the `top_n` ranking in one call
pub fn select(scores: &KeyScores, top_n: usize) -> (KeyCandidate, Vec<KeyCandidate>) {
    (select_primary(scores), rank(scores, top_n))
}
