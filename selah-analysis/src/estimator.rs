//! End-to-end key estimation
//!
//! Preprocess → chroma aggregation → profile correlation → selection.

use crate::chroma::{ChromaAggregator, ChromaVector};
use crate::error::KeyError;
use crate::key::{correlate, select, KeyCandidate, KeyScores};
use crate::preprocess::{prepare_with, Signal, TrimConfig};
use crate::profiles::KeyProfile;
use serde::Serialize;
use tracing::debug;

/// Key estimation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyConfig {
    /// Segment length for chroma averaging
    pub segment_seconds: f32,
    /// CQT hop length in samples
    pub hop_length: usize,
    /// Number of ranked candidates to return
    pub top_n: usize,
    /// Trim leading/trailing silence before analysis
    pub trim: bool,
    /// Silence threshold below the loudest frame, in dB
    pub trim_top_db: f32,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            segment_seconds: 10.0,
            hop_length: 512,
            top_n: 5,
            trim: true,
            trim_top_db: 60.0,
        }
    }
}

impl KeyConfig {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), KeyError> {
        if !self.segment_seconds.is_finite() || self.segment_seconds <= 0.0 {
            return Err(KeyError::InvalidParameter(format!(
                "segment_seconds must be positive, got {}",
                self.segment_seconds
            )));
        }
        if self.hop_length == 0 {
            return Err(KeyError::InvalidParameter(
                "hop_length must be positive".to_string(),
            ));
        }
        if !self.trim_top_db.is_finite() || self.trim_top_db <= 0.0 {
            return Err(KeyError::InvalidParameter(format!(
                "trim_top_db must be positive, got {}",
                self.trim_top_db
            )));
        }
        Ok(())
    }

    fn trim_config(&self) -> Option<TrimConfig> {
        self.trim.then(|| TrimConfig {
            top_db: self.trim_top_db,
            ..TrimConfig::default()
        })
    }
}

/// Result of one key estimation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEstimationResult {
    /// Best-scoring key
    pub primary: KeyCandidate,
    /// Top candidates by descending score
    pub ranked: Vec<KeyCandidate>,
    /// Unit-norm chroma vector the scores were computed from
    pub chroma: ChromaVector,
    /// Raw scores for all 24 keys
    pub scores: KeyScores,
    /// Number of segments averaged
    pub segments: usize,
    /// Duration of the analysed (trimmed, mono) signal
    pub duration_secs: f32,
}

/// Key estimator holding configuration and reference profiles
#[derive(Debug, Clone)]
pub struct KeyEstimator {
    config: KeyConfig,
    major: KeyProfile,
    minor: KeyProfile,
}

impl KeyEstimator {
    /// Create an estimator with the canonical profiles
    pub fn new(config: KeyConfig) -> Result<Self, KeyError> {
        Self::with_profiles(config, KeyProfile::major(), KeyProfile::minor())
    }

    /// Create an estimator with custom profiles
    pub fn with_profiles(
        config: KeyConfig,
        major: KeyProfile,
        minor: KeyProfile,
    ) -> Result<Self, KeyError> {
        config.validate()?;
        Ok(Self {
            config,
            major,
            minor,
        })
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// Estimate the key of a decoded signal
    pub fn estimate(&self, signal: Signal) -> Result<KeyEstimationResult, KeyError> {
        debug!(
            "Estimating key: {} samples, {} channel(s) at {} Hz",
            signal.samples().len(),
            signal.channels(),
            signal.sample_rate()
        );

        let trim = self.config.trim_config();
        let signal = prepare_with(signal, trim.as_ref())?;

        let aggregator = ChromaAggregator::new(
            signal.sample_rate(),
            self.config.segment_seconds,
            self.config.hop_length,
        )?;
        let segments = aggregator.segment_count(signal.samples().len());
        let chroma = aggregator.aggregate(signal.samples())?;

        let scores = correlate(&chroma, &self.major, &self.minor)?;
        let (primary, ranked) = select(&scores, self.config.top_n);

        debug!("Primary key {} over {} segment(s)", primary, segments);

        Ok(KeyEstimationResult {
            primary,
            ranked,
            chroma,
            scores,
            segments,
            duration_secs: signal.duration_secs(),
        })
    }
}

/// Estimate the key of a signal with the canonical profiles
pub fn estimate_key(signal: Signal, config: &KeyConfig) -> Result<KeyEstimationResult, KeyError> {
    KeyEstimator::new(*config)?.estimate(signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = KeyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.segment_seconds, 10.0);
        assert_eq!(config.hop_length, 512);
        assert_eq!(config.top_n, 5);
        assert!(config.trim);
    }

    #[test]
    fn test_invalid_configs() {
        let bad = [
            KeyConfig {
                segment_seconds: 0.0,
                ..KeyConfig::default()
            },
            KeyConfig {
                segment_seconds: f32::INFINITY,
                ..KeyConfig::default()
            },
            KeyConfig {
                hop_length: 0,
                ..KeyConfig::default()
            },
            KeyConfig {
                trim_top_db: -5.0,
                ..KeyConfig::default()
            },
        ];
        for config in bad {
            assert!(KeyEstimator::new(config).is_err(), "{:?}", config);
        }
    }

    #[test]
    fn test_trim_config_follows_flag() {
        let config = KeyConfig {
            trim: false,
            ..KeyConfig::default()
        };
        assert!(config.trim_config().is_none());

        let config = KeyConfig {
            trim_top_db: 40.0,
            ..KeyConfig::default()
        };
        assert_eq!(config.trim_config().map(|t| t.top_db), Some(40.0));
    }

    #[test]
    fn test_zero_top_n_returns_empty_ranking() {
        let config = KeyConfig {
            top_n: 0,
            ..KeyConfig::default()
        };
        assert!(config.validate().is_ok());

        let samples: Vec<f32> = (0..22050)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22050.0).sin() * 0.5)
            .collect();
        let result = estimate_key(Signal::mono(samples, 22050), &config).unwrap();
        assert!(result.ranked.is_empty());
        assert_eq!(result.primary.key, "A");
    }

    #[test]
    fn test_empty_signal() {
        let result = estimate_key(Signal::mono(vec![], 22050), &KeyConfig::default());
        assert_eq!(result, Err(KeyError::EmptySignal));
    }
}
