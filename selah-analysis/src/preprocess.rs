//! Signal preprocessing: down-mix to mono and silence trimming

use crate::error::KeyError;
use tracing::debug;

/// Power floor used when converting frame energy to dB
const AMIN: f64 = 1e-10;

/// A decoded audio signal
///
/// Samples are interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl Signal {
    /// Create a mono signal
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::interleaved(samples, sample_rate, 1)
    }

    /// Create a signal from interleaved multi-channel samples
    pub fn interleaved(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Silence trimming parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimConfig {
    /// Frames quieter than the loudest frame by more than this are silent
    pub top_db: f32,
    /// RMS frame length in samples
    pub frame_length: usize,
    /// Hop between RMS frames in samples
    pub hop_length: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            top_db: 60.0,
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

/// Average interleaved channels into a mono signal
///
/// A trailing partial frame is dropped.
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Compute per-frame RMS power in dB relative to the loudest frame
///
/// Frames are centred on `t * hop_length` with zero padding at the edges.
fn frame_db(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f64> {
    // Prefix sums of squares so each frame costs O(1)
    let mut energy = Vec::with_capacity(samples.len() + 1);
    energy.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in samples {
        acc += s as f64 * s as f64;
        energy.push(acc);
    }

    let n_frames = 1 + samples.len() / hop_length;
    let half = frame_length / 2;

    let power: Vec<f64> = (0..n_frames)
        .map(|t| {
            let center = t * hop_length;
            let start = center.saturating_sub(half).min(samples.len());
            let end = (center + frame_length - half).min(samples.len());
            (energy[end] - energy[start]) / frame_length as f64
        })
        .collect();

    let reference = power.iter().cloned().fold(0.0f64, f64::max).max(AMIN);
    power
        .iter()
        .map(|&p| 10.0 * (p.max(AMIN) / reference).log10())
        .collect()
}

/// Trim leading and trailing silence
///
/// Returns the retained sample range. A frame counts as non-silent when its
/// RMS level is within `top_db` of the loudest frame; the kept range runs from
/// the first non-silent frame's start to the end of the last one.
pub fn trim_silence(samples: &[f32], config: &TrimConfig) -> std::ops::Range<usize> {
    if samples.is_empty() || config.hop_length == 0 || config.frame_length == 0 {
        return 0..samples.len();
    }

    let levels = frame_db(samples, config.frame_length, config.hop_length);
    let threshold = -(config.top_db as f64);

    let first = levels.iter().position(|&db| db > threshold);
    let last = levels.iter().rposition(|&db| db > threshold);

    match (first, last) {
        (Some(first), Some(last)) => {
            let start = (first * config.hop_length).min(samples.len());
            let end = ((last + 1) * config.hop_length).min(samples.len());
            start..end
        }
        _ => 0..0,
    }
}

/// Normalize a signal to mono and optionally trim silence
///
/// Fails with [`KeyError::EmptySignal`] when no samples remain.
pub fn prepare(signal: Signal, trim: bool) -> Result<Signal, KeyError> {
    let trim_config = trim.then(TrimConfig::default);
    prepare_with(signal, trim_config.as_ref())
}

/// [`prepare`] with explicit trimming parameters (`None` disables trimming)
pub fn prepare_with(signal: Signal, trim: Option<&TrimConfig>) -> Result<Signal, KeyError> {
    if signal.sample_rate == 0 {
        return Err(KeyError::InvalidParameter(
            "sample rate must be positive".to_string(),
        ));
    }
    if signal.channels == 0 {
        return Err(KeyError::InvalidParameter(
            "channel count must be positive".to_string(),
        ));
    }

    let sample_rate = signal.sample_rate;
    let channels = signal.channels as usize;
    let mut mono = if channels > 1 {
        downmix(&signal.samples, channels)
    } else {
        signal.into_samples()
    };

    if let Some(config) = trim {
        let original_len = mono.len();
        let range = trim_silence(&mono, config);
        mono.truncate(range.end);
        mono.drain(..range.start);
        debug!(
            "Trimmed silence: kept {}..{} of {} samples",
            range.start, range.end, original_len
        );
    }

    if mono.is_empty() {
        return Err(KeyError::EmptySignal);
    }

    Ok(Signal::mono(mono, sample_rate))
}
