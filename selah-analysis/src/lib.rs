//! Audio analysis for Selah
//!
//! Estimates the musical key of a decoded recording: constant-Q chroma
//! extraction followed by Krumhansl-Schmuckler profile correlation.

mod chroma;
mod cqt;
mod error;
mod estimator;
mod key;
mod preprocess;
mod profiles;

pub use chroma::{
    aggregate_chroma, bin_pitch_class, segment_count, ChromaAggregator, ChromaVector,
    MIN_CHROMA_NORM,
};
pub use cqt::{ConstantQ, CqtSpectrogram, BINS_PER_OCTAVE, FMIN_C1, MAX_OCTAVES};
pub use error::KeyError;
pub use estimator::{estimate_key, KeyConfig, KeyEstimationResult, KeyEstimator};
pub use key::{correlate, pearson, rank, select, select_primary, KeyCandidate, KeyScores};
pub use preprocess::{downmix, prepare, prepare_with, trim_silence, Signal, TrimConfig};
pub use profiles::{pitch_class_label, KeyProfile, Mode, PITCH_CLASSES};
