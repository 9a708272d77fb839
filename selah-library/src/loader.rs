//! Audio file loading and decoding

use selah_analysis::Signal;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during track loading
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// Track metadata
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: String,
    /// Empty when the file carries no artist tag
    pub artist: String,
    /// Full source duration, before any analysis window is applied
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A decoded audio excerpt ready for analysis
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    /// Interleaved samples (f32, normalized to -1.0 to 1.0)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Track metadata
    pub metadata: TrackMetadata,
}

impl LoadedTrack {
    /// Duration of the decoded excerpt in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels as usize) as f64 / self.sample_rate as f64
    }

    /// Hand the samples over as an analysis signal
    pub fn into_signal(self) -> Signal {
        Signal::interleaved(self.samples, self.sample_rate, self.channels)
    }
}

/// Audio file loader using Symphonia
#[derive(Debug, Clone, Default)]
pub struct TrackLoader {
    /// Resample to this rate; `None` keeps the source rate
    target_sample_rate: Option<u32>,
    /// Keep only the first N seconds; `None` decodes everything
    max_duration_secs: Option<f64>,
}

impl TrackLoader {
    /// Create a loader that keeps the source rate and full length
    pub fn new() -> Self {
        Self::default()
    }

    /// Resample decoded audio to `sample_rate`
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.target_sample_rate = Some(sample_rate);
        self
    }

    /// Limit decoding to the first `seconds` of audio (non-positive disables)
    pub fn with_max_duration(mut self, seconds: f64) -> Self {
        self.max_duration_secs = (seconds > 0.0).then_some(seconds);
        self
    }

    /// Load and decode an audio file
    pub fn load(&self, path: &Path) -> Result<LoadedTrack, LoadError> {
        // Open the file
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create hint from file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        // Probe the format
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        // Find first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let source_sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("unknown sample rate".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut metadata = Self::extract_metadata(&mut format, path);
        metadata.sample_rate = source_sample_rate;
        metadata.channels = channels;

        // Frames needed for the analysis window (decode past it for duration only)
        let frame_limit = self
            .max_duration_secs
            .map(|secs| (secs * source_sample_rate as f64) as usize);

        let mut samples: Vec<f32> = Vec::new();
        let mut total_frames = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Stopping decode of {}: {}", path.display(), e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(e) => {
                    debug!("Skipping undecodable packet: {}", e);
                    continue;
                }
            };

            let spec = *decoded.spec();
            let packet_channels = spec.channels.count();
            let frames = decoded.frames();
            total_frames += frames;

            let wanted = match frame_limit {
                Some(limit) => limit.saturating_sub(samples.len() / channels.max(1) as usize),
                None => frames,
            };
            if wanted == 0 {
                continue;
            }

            // Convert to f32 interleaved
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            let take = wanted.min(frames) * packet_channels;
            samples.extend_from_slice(&sample_buf.samples()[..take]);
        }

        metadata.duration_secs = total_frames as f64 / source_sample_rate as f64;

        let (samples, sample_rate) = match self.target_sample_rate {
            Some(target) if target != source_sample_rate => (
                resample(&samples, source_sample_rate, target, channels)?,
                target,
            ),
            _ => (samples, source_sample_rate),
        };

        debug!(
            "Loaded {}: {:.1}s of {:.1}s, {} channel(s) at {} Hz",
            path.display(),
            (samples.len() / channels.max(1) as usize) as f64 / sample_rate as f64,
            metadata.duration_secs,
            channels,
            sample_rate
        );

        Ok(LoadedTrack {
            samples,
            sample_rate,
            channels,
            metadata,
        })
    }

    /// Extract metadata from format reader
    fn extract_metadata(
        format: &mut Box<dyn symphonia::core::formats::FormatReader>,
        path: &Path,
    ) -> TrackMetadata {
        let mut metadata = TrackMetadata {
            title: path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string(),
            artist: String::new(),
            ..Default::default()
        };

        if let Some(meta) = format.metadata().current() {
            for tag in meta.tags() {
                match tag.std_key {
                    Some(symphonia::core::meta::StandardTagKey::TrackTitle) => {
                        metadata.title = tag.value.to_string();
                    }
                    Some(symphonia::core::meta::StandardTagKey::Artist) => {
                        metadata.artist = tag.value.to_string();
                    }
                    _ => {}
                }
            }
        }

        metadata
    }
}

/// Resample interleaved audio to a new rate
pub fn resample(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
    channels: u16,
) -> Result<Vec<f32>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    let channels_usize = channels.max(1) as usize;
    let frames = samples.len() / channels_usize;
    if frames == 0 {
        return Ok(Vec::new());
    }

    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        1024,
        channels_usize,
    )
    .map_err(|e| LoadError::Resample(e.to_string()))?;

    // Deinterleave
    let deinterleaved: Vec<Vec<f32>> = (0..channels_usize)
        .map(|ch| {
            (0..frames)
                .map(|f| samples[f * channels_usize + ch])
                .collect()
        })
        .collect();

    let chunk_size = resampler.input_frames_next();
    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels_usize];

    let mut pos = 0;
    while pos + chunk_size <= frames {
        let input_refs: Vec<&[f32]> = deinterleaved
            .iter()
            .map(|ch| &ch[pos..pos + chunk_size])
            .collect();

        let resampled = resampler
            .process(&input_refs, None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;

        for (ch, data) in resampled.into_iter().enumerate() {
            output[ch].extend(data);
        }

        pos += chunk_size;
    }

    // Zero-pad the tail and keep only its proportional share of output
    if pos < frames {
        let remaining = frames - pos;
        let padded: Vec<Vec<f32>> = deinterleaved
            .iter()
            .map(|ch| {
                let mut v = ch[pos..].to_vec();
                v.resize(chunk_size, 0.0);
                v
            })
            .collect();

        let input_refs: Vec<&[f32]> = padded.iter().map(|v| v.as_slice()).collect();
        let resampled = resampler
            .process(&input_refs, None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;

        let output_frames = (remaining * target_rate as usize) / source_rate as usize;
        for (ch, data) in resampled.into_iter().enumerate() {
            output[ch].extend(&data[..output_frames.min(data.len())]);
        }
    }

    // Reinterleave
    let output_frames = output[0].len();
    let mut interleaved = Vec::with_capacity(output_frames * channels_usize);
    for frame_idx in 0..output_frames {
        for channel in &output {
            interleaved.push(channel[frame_idx]);
        }
    }

    Ok(interleaved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use std::f32::consts::PI;

    fn write_sine_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32, freq: f32) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let frames = (sample_rate as f32 * seconds) as usize;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = ((2.0 * PI * freq * t).sin() * 0.5 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let loader = TrackLoader::new();
        let result = loader.load(Path::new("/definitely/not/here.wav"));
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn test_load_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 22050, 2, 1.0, 440.0);

        let track = TrackLoader::new().load(&path).unwrap();
        assert_eq!(track.sample_rate, 22050);
        assert_eq!(track.channels, 2);
        assert_eq!(track.samples.len(), 22050 * 2);
        assert_eq!(track.metadata.title, "tone");
        assert!((track.metadata.duration_secs - 1.0).abs() < 1e-6);
        assert!(track.samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_max_duration_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_sine_wav(&path, 8000, 1, 3.0, 440.0);

        let track = TrackLoader::new().with_max_duration(1.5).load(&path).unwrap();
        assert_eq!(track.samples.len(), 12000);
        assert!((track.duration_secs() - 1.5).abs() < 1e-6);
        // Source duration is still reported in full
        assert!((track.metadata.duration_secs - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_max_duration_disabled() {
        let loader = TrackLoader::new().with_max_duration(0.0);
        assert_eq!(loader.max_duration_secs, None);
    }

    #[test]
    fn test_resample_length() {
        let samples = vec![0.0f32; 44100 * 2];
        let resampled = resample(&samples, 44100, 22050, 2).unwrap();
        let frames = resampled.len() / 2;
        // FFT resampler adds a small delay; length tracks the rate ratio
        assert!((frames as i64 - 22050).abs() < 1100, "{} frames", frames);
    }

    #[test]
    fn test_load_with_resample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44100, 1, 1.0, 440.0);

        let track = TrackLoader::new().with_sample_rate(22050).load(&path).unwrap();
        assert_eq!(track.sample_rate, 22050);
        assert_eq!(track.metadata.sample_rate, 44100);
    }

    #[test]
    fn test_into_signal() {
        let track = LoadedTrack {
            samples: vec![0.5, -0.5, 0.25, -0.25],
            sample_rate: 22050,
            channels: 2,
            metadata: TrackMetadata::default(),
        };
        let signal = track.into_signal();
        assert_eq!(signal.channels(), 2);
        assert_eq!(signal.frames(), 2);
    }
}
