//! End-to-end key estimation on synthetic signals

use selah_analysis::{
    aggregate_chroma, correlate, estimate_key, KeyConfig, KeyError, KeyEstimator, KeyProfile,
    Mode, Signal,
};
use std::f32::consts::PI;

const SAMPLE_RATE: u32 = 22050;

/// Sum of equal-amplitude sines
fn tones(freqs: &[f32], sample_rate: u32, seconds: f32) -> Vec<f32> {
    let len = (sample_rate as f32 * seconds) as usize;
    let scale = 0.5 / freqs.len() as f32;
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() * scale
        })
        .collect()
}

#[test]
fn test_a440_detects_a() {
    let signal = Signal::mono(tones(&[440.0], SAMPLE_RATE, 5.0), SAMPLE_RATE);
    let result = estimate_key(signal, &KeyConfig::default()).unwrap();

    assert_eq!(result.primary.key, "A");
    assert_eq!(result.chroma.dominant(), 9);
    assert_eq!(result.segments, 1);
}

#[test]
fn test_c_major_triad() {
    // C4 + E4 + G4
    let signal = Signal::mono(
        tones(&[261.63, 329.63, 392.00], SAMPLE_RATE, 4.0),
        SAMPLE_RATE,
    );
    let result = estimate_key(signal, &KeyConfig::default()).unwrap();

    assert_eq!(result.primary.key, "C");
    assert_eq!(result.primary.mode, Mode::Major);
}

#[test]
fn test_chroma_is_unit_norm() {
    let signal = Signal::mono(tones(&[293.66, 369.99], SAMPLE_RATE, 3.0), SAMPLE_RATE);
    let result = estimate_key(signal, &KeyConfig::default()).unwrap();
    assert!((result.chroma.norm() - 1.0).abs() < 1e-6);
    assert!(result.chroma.iter().all(|v| v >= 0.0));
}

#[test]
fn test_rank_completeness_and_order() {
    let samples = tones(&[220.0, 277.18, 329.63], SAMPLE_RATE, 3.0);

    for top_n in [0, 1, 5, 10, 24, 40] {
        let config = KeyConfig {
            top_n,
            ..KeyConfig::default()
        };
        let result = estimate_key(Signal::mono(samples.clone(), SAMPLE_RATE), &config).unwrap();

        assert_eq!(result.ranked.len(), top_n.min(24));
        assert_eq!(result.scores.major.len(), 12);
        assert_eq!(result.scores.minor.len(), 12);
        for pair in result.ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        if let Some(first) = result.ranked.first() {
            assert_eq!(first.score, result.primary.score);
        }
    }
}

#[test]
fn test_deterministic() {
    let samples = tones(&[246.94, 311.13, 369.99], SAMPLE_RATE, 3.0);
    let estimator = KeyEstimator::new(KeyConfig::default()).unwrap();

    let first = estimator
        .estimate(Signal::mono(samples.clone(), SAMPLE_RATE))
        .unwrap();
    let second = estimator.estimate(Signal::mono(samples, SAMPLE_RATE)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_short_signal_yields_one_segment() {
    let signal = Signal::mono(tones(&[392.0], SAMPLE_RATE, 1.5), SAMPLE_RATE);
    let result = estimate_key(signal, &KeyConfig::default()).unwrap();

    assert_eq!(result.segments, 1);
    assert!((result.chroma.norm() - 1.0).abs() < 1e-6);
    assert_eq!(result.primary.key, "G");
}

#[test]
fn test_multiple_segments() {
    let config = KeyConfig {
        segment_seconds: 1.0,
        ..KeyConfig::default()
    };
    // 3.5 s: three full segments, the last half second is not analysed
    let signal = Signal::mono(tones(&[329.63], SAMPLE_RATE, 3.5), SAMPLE_RATE);
    let result = estimate_key(signal, &config).unwrap();
    assert_eq!(result.segments, 3);
    assert_eq!(result.primary.key, "E");
}

#[test]
fn test_silence_rejected() {
    let signal = Signal::mono(vec![0.0; SAMPLE_RATE as usize * 2], SAMPLE_RATE);
    let result = estimate_key(signal, &KeyConfig::default());
    assert!(
        matches!(
            result,
            Err(KeyError::EmptySignal) | Err(KeyError::DegenerateChroma(_))
        ),
        "{:?}",
        result
    );
}

#[test]
fn test_silence_rejected_without_trim() {
    let config = KeyConfig {
        trim: false,
        ..KeyConfig::default()
    };
    let signal = Signal::mono(vec![0.0; SAMPLE_RATE as usize], SAMPLE_RATE);
    assert!(matches!(
        estimate_key(signal, &config),
        Err(KeyError::DegenerateChroma(_))
    ));
}

#[test]
fn test_trimmed_padding_does_not_change_key() {
    let tone = tones(&[440.0], SAMPLE_RATE, 2.0);
    let mut padded = vec![0.0f32; SAMPLE_RATE as usize];
    padded.extend_from_slice(&tone);
    padded.extend(vec![0.0f32; SAMPLE_RATE as usize]);

    let result = estimate_key(Signal::mono(padded, SAMPLE_RATE), &KeyConfig::default()).unwrap();
    assert_eq!(result.primary.key, "A");
    // Trimmed to roughly the tone itself
    assert!(result.duration_secs < 2.5, "{}", result.duration_secs);
}

#[test]
fn test_stereo_input_is_downmixed() {
    let mono = tones(&[440.0], SAMPLE_RATE, 2.0);
    let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();

    let from_mono = estimate_key(Signal::mono(mono, SAMPLE_RATE), &KeyConfig::default()).unwrap();
    let from_stereo =
        estimate_key(Signal::interleaved(stereo, SAMPLE_RATE, 2), &KeyConfig::default()).unwrap();

    assert_eq!(from_mono.primary.key, from_stereo.primary.key);
    for (a, b) in from_mono.chroma.iter().zip(from_stereo.chroma.iter()) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn test_profile_rotation_through_public_api() {
    let major = KeyProfile::major();
    let chroma = selah_analysis::ChromaVector::from_energies(*major.weights()).unwrap();
    let scores = correlate(&chroma, &major, &KeyProfile::minor()).unwrap();

    let best = scores
        .major
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(best, 0);
}

#[test]
fn test_symmetric_profiles_tie_to_major() {
    let weights = KeyProfile::minor().weights().to_vec();
    let major = KeyProfile::new(Mode::Major, &weights).unwrap();
    let minor = KeyProfile::new(Mode::Minor, &weights).unwrap();

    let estimator = KeyEstimator::with_profiles(KeyConfig::default(), major, minor).unwrap();
    let signal = Signal::mono(tones(&[261.63, 311.13, 392.0], SAMPLE_RATE, 3.0), SAMPLE_RATE);
    let result = estimator.estimate(signal).unwrap();

    assert_eq!(result.primary.mode, Mode::Major);
    assert_eq!(result.scores.major, result.scores.minor);
}

#[test]
fn test_aggregate_chroma_matches_estimator() {
    let samples = tones(&[349.23], SAMPLE_RATE, 2.0);
    let chroma = aggregate_chroma(&samples, SAMPLE_RATE, 10.0, 512).unwrap();

    let config = KeyConfig {
        trim: false,
        ..KeyConfig::default()
    };
    let result = estimate_key(Signal::mono(samples, SAMPLE_RATE), &config).unwrap();
    assert_eq!(chroma, result.chroma);
}

#[test]
fn test_result_serializes() {
    let signal = Signal::mono(tones(&[440.0], SAMPLE_RATE, 1.0), SAMPLE_RATE);
    let result = estimate_key(signal, &KeyConfig::default()).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["primary"]["key"], "A");
    assert_eq!(json["chroma"].as_array().map(|a| a.len()), Some(12));
    assert_eq!(json["scores"]["major"].as_array().map(|a| a.len()), Some(12));
    assert_eq!(json["ranked"].as_array().map(|a| a.len()), Some(5));
}
