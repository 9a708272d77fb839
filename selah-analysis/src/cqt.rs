//! Constant-Q transform
//!
//! Octave-by-octave implementation: the spectral kernels of the top octave
//! are computed once, and each lower octave reuses them on a copy of the
//! signal that has been low-passed and decimated by two. Every octave hops by
//! `hop_length >> level`, so all octaves yield the same frame grid.

use crate::error::KeyError;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::debug;

/// Centre frequency of the lowest bin (C1)
pub const FMIN_C1: f32 = 32.703_197;

/// Bins per octave (three per semitone)
pub const BINS_PER_OCTAVE: usize = 36;

/// Octaves analysed when the sample rate allows
pub const MAX_OCTAVES: usize = 7;

/// Highest usable centre frequency as a fraction of Nyquist
const NYQUIST_MARGIN: f32 = 0.95;

/// Spectral kernel entries below this fraction of the kernel peak are dropped
const SPARSITY: f32 = 0.01;

/// Anti-aliasing filter length for the decimation stages
const LOWPASS_TAPS: usize = 63;

/// Low-pass cutoff in cycles per sample (new Nyquist is 0.25)
const LOWPASS_CUTOFF: f32 = 0.22;

/// Frequency-domain kernel of a single CQT bin, non-zero entries only
#[derive(Debug, Clone)]
struct SparseKernel {
    entries: Vec<(usize, Complex<f32>)>,
}

/// Magnitude spectrogram produced by [`ConstantQ::magnitudes`]
#[derive(Debug, Clone, PartialEq)]
pub struct CqtSpectrogram {
    n_bins: usize,
    n_frames: usize,
    /// Frame-major magnitudes: `data[frame * n_bins + bin]`
    data: Vec<f32>,
}

impl CqtSpectrogram {
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Magnitudes of all bins in one frame
    pub fn frame(&self, index: usize) -> &[f32] {
        let start = index * self.n_bins;
        &self.data[start..start + self.n_bins]
    }

    /// Iterate over frames in time order
    pub fn frames(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.n_bins.max(1))
    }
}

/// Constant-Q analyzer for one sample rate and hop length
///
/// Holds only immutable planning state, so a single instance can be shared
/// across threads.
pub struct ConstantQ {
    sample_rate: u32,
    hop_length: usize,
    octaves: usize,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    /// Kernels of the top octave, lowest frequency first
    kernels: Vec<SparseKernel>,
    lowpass: Vec<f32>,
}

impl ConstantQ {
    /// Plan a transform for the given sample rate and hop length
    ///
    /// The number of octaves is reduced below [`MAX_OCTAVES`] when the top
    /// octave would not fit under Nyquist. `hop_length` must be divisible by
    /// `2^(octaves - 1)`.
    pub fn new(sample_rate: u32, hop_length: usize) -> Result<Self, KeyError> {
        if sample_rate == 0 {
            return Err(KeyError::InvalidParameter(
                "sample rate must be positive".to_string(),
            ));
        }
        if hop_length == 0 {
            return Err(KeyError::InvalidParameter(
                "hop length must be positive".to_string(),
            ));
        }

        let limit = NYQUIST_MARGIN * sample_rate as f32 / 2.0;
        let octaves = (1..=MAX_OCTAVES)
            .rev()
            .find(|&n| Self::bin_frequency(n * BINS_PER_OCTAVE - 1) < limit)
            .ok_or_else(|| {
                KeyError::InvalidParameter(format!(
                    "sample rate {} Hz is too low for constant-Q analysis",
                    sample_rate
                ))
            })?;

        let decimation = 1usize << (octaves - 1);
        if hop_length % decimation != 0 {
            return Err(KeyError::InvalidParameter(format!(
                "hop length {} must be divisible by {} for {} octaves",
                hop_length, decimation, octaves
            )));
        }

        let q = 1.0 / (2.0f32.powf(1.0 / BINS_PER_OCTAVE as f32) - 1.0);
        let top_base = (octaves - 1) * BINS_PER_OCTAVE;
        let frequencies: Vec<f32> = (0..BINS_PER_OCTAVE)
            .map(|k| Self::bin_frequency(top_base + k))
            .collect();

        // The lowest top-octave bin has the longest kernel
        let longest = (q * sample_rate as f32 / frequencies[0]).ceil() as usize;
        let fft_size = longest.next_power_of_two();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let kernels = frequencies
            .iter()
            .map(|&freq| Self::spectral_kernel(freq, q, sample_rate, fft_size, &fft))
            .collect();

        debug!(
            "Planned constant-Q: {} Hz, hop {}, {} octaves, fft size {}",
            sample_rate,
            hop_length,
            octaves,
            fft_size
        );

        Ok(Self {
            sample_rate,
            hop_length,
            octaves,
            fft_size,
            fft,
            kernels,
            lowpass: Self::design_lowpass(),
        })
    }

    /// Centre frequency of bin `bin` counted from C1
    pub fn bin_frequency(bin: usize) -> f32 {
        FMIN_C1 * 2.0f32.powf(bin as f32 / BINS_PER_OCTAVE as f32)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn octaves(&self) -> usize {
        self.octaves
    }

    pub fn n_bins(&self) -> usize {
        self.octaves * BINS_PER_OCTAVE
    }

    /// Number of frames produced for `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Build the FFT of one Hann-windowed complex exponential
    fn spectral_kernel(
        freq: f32,
        q: f32,
        sample_rate: u32,
        fft_size: usize,
        fft: &Arc<dyn Fft<f32>>,
    ) -> SparseKernel {
        let length = ((q * sample_rate as f32 / freq).ceil() as usize).min(fft_size);
        let offset = (fft_size - length) / 2;
        let norm = 1.0 / length as f32;

        let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_size];
        for n in 0..length {
            let window = 0.5 * (1.0 - (2.0 * PI * n as f32 / length as f32).cos());
            let phase = 2.0 * PI * freq * (n as f32 - length as f32 / 2.0) / sample_rate as f32;
            buffer[offset + n] = Complex::from_polar(window * norm, phase);
        }

        fft.process(&mut buffer);

        let peak = buffer.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
        let entries = buffer
            .iter()
            .enumerate()
            .filter(|(_, c)| c.norm() >= peak * SPARSITY)
            // Pre-conjugated and scaled for the inner product in `analyze_octave`
            .map(|(i, c)| (i, c.conj() / fft_size as f32))
            .collect();

        SparseKernel { entries }
    }

    /// Blackman-windowed sinc low-pass with unit DC gain
    fn design_lowpass() -> Vec<f32> {
        let center = (LOWPASS_TAPS - 1) as f32 / 2.0;
        let mut taps: Vec<f32> = (0..LOWPASS_TAPS)
            .map(|i| {
                let x = i as f32 - center;
                let sinc = if x == 0.0 {
                    2.0 * LOWPASS_CUTOFF
                } else {
                    (2.0 * PI * LOWPASS_CUTOFF * x).sin() / (PI * x)
                };
                let phase = 2.0 * PI * i as f32 / (LOWPASS_TAPS - 1) as f32;
                let window = 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos();
                sinc * window
            })
            .collect();

        let gain: f32 = taps.iter().sum();
        for tap in &mut taps {
            *tap /= gain;
        }
        taps
    }

    /// Low-pass filter (zero phase) and keep every other sample
    fn decimate(&self, samples: &[f32]) -> Vec<f32> {
        let half = (self.lowpass.len() / 2) as isize;
        let len = samples.len() as isize;

        (0..samples.len())
            .step_by(2)
            .map(|n| {
                let mut acc = 0.0f32;
                for (i, &tap) in self.lowpass.iter().enumerate() {
                    let idx = n as isize + i as isize - half;
                    if idx >= 0 && idx < len {
                        acc += tap * samples[idx as usize];
                    }
                }
                acc
            })
            .collect()
    }

    /// Compute CQT magnitudes of one octave into `out`
    fn analyze_octave(
        &self,
        samples: &[f32],
        hop: usize,
        n_frames: usize,
        first_bin: usize,
        out: &mut [f32],
        buffer: &mut [Complex<f32>],
    ) {
        let n_bins = self.n_bins();
        let half = self.fft_size / 2;

        for frame in 0..n_frames {
            let center = frame * hop;
            for (j, slot) in buffer.iter_mut().enumerate() {
                let value = (center + j)
                    .checked_sub(half)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex::new(value, 0.0);
            }

            self.fft.process(buffer);

            let offset = frame * n_bins + first_bin;
            let row = &mut out[offset..offset + BINS_PER_OCTAVE];
            for (value, kernel) in row.iter_mut().zip(&self.kernels) {
                let coefficient: Complex<f32> = kernel
                    .entries
                    .iter()
                    .map(|&(bin, weight)| buffer[bin] * weight)
                    .sum();
                *value = coefficient.norm();
            }
        }
    }

    /// Magnitude constant-Q spectrogram of a mono signal
    pub fn magnitudes(&self, samples: &[f32]) -> CqtSpectrogram {
        let n_bins = self.n_bins();
        let n_frames = self.frame_count(samples.len());
        let mut data = vec![0.0f32; n_frames * n_bins];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];

        let mut level_samples = samples.to_vec();
        for level in 0..self.octaves {
            if level > 0 {
                level_samples = self.decimate(&level_samples);
            }
            let first_bin = (self.octaves - 1 - level) * BINS_PER_OCTAVE;
            let hop = self.hop_length >> level;
            self.analyze_octave(
                &level_samples,
                hop,
                n_frames,
                first_bin,
                &mut data,
                &mut buffer,
            );
        }

        CqtSpectrogram {
            n_bins,
            n_frames,
            data,
        }
    }
}
