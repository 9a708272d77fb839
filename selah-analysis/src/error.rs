//! Error types for key detection

use crate::profiles::Mode;
use thiserror::Error;

/// Errors that can occur during key estimation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyError {
    /// No samples left after preprocessing
    #[error("Audio buffer is empty after preprocessing")]
    EmptySignal,
    /// Chroma vector has near-zero norm or near-zero variance
    #[error("Degenerate chroma vector: {0}")]
    DegenerateChroma(String),
    /// A reference profile is malformed
    #[error("Invalid {mode} key profile: {reason}")]
    InvalidProfile { mode: Mode, reason: String },
    /// Analysis parameter out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
