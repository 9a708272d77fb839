//! Segment-averaged chroma extraction
//!
//! The signal is cut into fixed-length segments, each segment is reduced to a
//! 12-bin pitch-class profile via the constant-Q transform, and the profiles
//! are averaged and L2-normalised into a single [`ChromaVector`].

use crate::cqt::{ConstantQ, CqtSpectrogram, BINS_PER_OCTAVE};
use crate::error::KeyError;
use crate::profiles::PITCH_CLASSES;
use serde::Serialize;
use tracing::debug;

/// Norm below which the aggregated chroma is rejected
pub const MIN_CHROMA_NORM: f32 = 1e-12;

/// CQT bins merged into one semitone
const BINS_PER_SEMITONE: usize = BINS_PER_OCTAVE / 12;

/// Unit-norm 12-bin pitch-class energy profile, index 0 = C
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChromaVector([f32; 12]);

impl ChromaVector {
    /// L2-normalise raw pitch-class energies
    ///
    /// Fails with [`KeyError::DegenerateChroma`] when the norm is below
    /// [`MIN_CHROMA_NORM`] or any value is not finite.
    pub fn from_energies(energies: [f32; 12]) -> Result<Self, KeyError> {
        if energies.iter().any(|v| !v.is_finite()) {
            return Err(KeyError::DegenerateChroma(
                "chroma contains non-finite values".to_string(),
            ));
        }

        let norm = l2_norm(&energies);
        if norm < MIN_CHROMA_NORM {
            return Err(KeyError::DegenerateChroma(format!(
                "chroma norm {:e} is near zero",
                norm
            )));
        }

        let mut values = energies;
        for v in &mut values {
            *v /= norm;
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f32; 12] {
        &self.0
    }

    /// Energy of one pitch class (0 = C)
    pub fn get(&self, pitch_class: usize) -> f32 {
        self.0[pitch_class % 12]
    }

    pub fn norm(&self) -> f32 {
        l2_norm(&self.0)
    }

    /// Population variance of the 12 values, accumulated in f64
    pub fn variance(&self) -> f64 {
        variance(&self.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.0.iter().copied()
    }

    /// `(label, value)` pairs in pitch-class order
    pub fn labelled(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        PITCH_CLASSES.iter().copied().zip(self.iter())
    }

    /// Pitch class with the highest energy (first on ties)
    pub fn dominant(&self) -> usize {
        let mut best = 0;
        for (i, &v) in self.0.iter().enumerate() {
            if v > self.0[best] {
                best = i;
            }
        }
        best
    }
}

pub(crate) fn variance(values: &[f32; 12]) -> f64 {
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / 12.0;
    values
        .iter()
        .map(|&v| (v as f64 - mean) * (v as f64 - mean))
        .sum::<f64>()
        / 12.0
}

fn l2_norm(values: &[f32; 12]) -> f32 {
    values
        .iter()
        .map(|&v| v as f64 * v as f64)
        .sum::<f64>()
        .sqrt() as f32
}

/// Pitch class of a CQT bin (bins counted from C1)
///
/// Each semitone owns the bin on its centre frequency and one on each side.
pub fn bin_pitch_class(bin: usize) -> usize {
    ((bin + BINS_PER_SEMITONE / 2) / BINS_PER_SEMITONE) % 12
}

/// Number of segments analysed for `len` samples
///
/// Floor division with a minimum of one: a signal shorter than one segment
/// is analysed whole, while a trailing partial segment of a longer signal is
/// dropped.
pub fn segment_count(len: usize, segment_len: usize) -> usize {
    if segment_len == 0 {
        return 1;
    }
    (len / segment_len).max(1)
}

/// Averaged chroma profile of a spectrogram
///
/// Each frame is normalised by its maximum before averaging; frames with no
/// energy stay zero.
pub fn frame_average(spectrogram: &CqtSpectrogram) -> [f32; 12] {
    let mut sum = [0.0f64; 12];
    let n_frames = spectrogram.n_frames();

    for frame in spectrogram.frames() {
        let mut chroma = [0.0f32; 12];
        for (bin, &magnitude) in frame.iter().enumerate() {
            chroma[bin_pitch_class(bin)] += magnitude;
        }

        let peak = chroma.iter().cloned().fold(0.0f32, f32::max);
        if peak < f32::MIN_POSITIVE {
            continue;
        }
        for (acc, value) in sum.iter_mut().zip(chroma) {
            *acc += (value / peak) as f64;
        }
    }

    let mut mean = [0.0f32; 12];
    if n_frames > 0 {
        for (m, s) in mean.iter_mut().zip(sum) {
            *m = (s / n_frames as f64) as f32;
        }
    }
    mean
}

/// Chroma aggregator for one sample rate and segment length
pub struct ChromaAggregator {
    cqt: ConstantQ,
    segment_len: usize,
}

impl ChromaAggregator {
    /// Create an aggregator
    ///
    /// `segment_seconds * sample_rate` must be at least one sample.
    pub fn new(
        sample_rate: u32,
        segment_seconds: f32,
        hop_length: usize,
    ) -> Result<Self, KeyError> {
        if !segment_seconds.is_finite() || segment_seconds <= 0.0 {
            return Err(KeyError::InvalidParameter(format!(
                "segment length must be positive, got {} s",
                segment_seconds
            )));
        }

        let segment_len = (sample_rate as f64 * segment_seconds as f64) as usize;
        if segment_len == 0 {
            return Err(KeyError::InvalidParameter(format!(
                "segment of {} s at {} Hz holds no samples",
                segment_seconds, sample_rate
            )));
        }

        Ok(Self {
            cqt: ConstantQ::new(sample_rate, hop_length)?,
            segment_len,
        })
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    pub fn segment_count(&self, len: usize) -> usize {
        segment_count(len, self.segment_len)
    }

    /// Pitch-class profile of one segment
    pub fn segment_chroma(&self, segment: &[f32]) -> [f32; 12] {
        frame_average(&self.cqt.magnitudes(segment))
    }

    /// Aggregate a mono signal into a unit-norm chroma vector
    pub fn aggregate(&self, samples: &[f32]) -> Result<ChromaVector, KeyError> {
        if samples.is_empty() {
            return Err(KeyError::EmptySignal);
        }

        let num_segments = self.segment_count(samples.len());
        let mut sum = [0.0f32; 12];

        for i in 0..num_segments {
            let start = i * self.segment_len;
            let end = samples.len().min((i + 1) * self.segment_len);
            let chroma = self.segment_chroma(&samples[start..end]);
            for (acc, value) in sum.iter_mut().zip(chroma) {
                *acc += value;
            }
        }

        let mut mean = sum;
        for v in &mut mean {
            *v /= num_segments as f32;
        }

        debug!(
            "Aggregated chroma over {} segment(s) of {} samples",
            num_segments, self.segment_len
        );

        ChromaVector::from_energies(mean)
    }
}

/// Compute the chroma vector of a mono signal in one call
pub fn aggregate_chroma(
    samples: &[f32],
    sample_rate: u32,
    segment_seconds: f32,
    hop_length: usize,
) -> Result<ChromaVector, KeyError> {
    ChromaAggregator::new(sample_rate, segment_seconds, hop_length)?.aggregate(samples)
}
