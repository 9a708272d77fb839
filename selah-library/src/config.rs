//! Simple configuration persistence for Selah
//!
//! Stores analysis defaults in a `key=value` file under the user config dir.

use selah_analysis::KeyConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line}: invalid value {value:?} for {key}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Segment length for chroma averaging
    pub segment_seconds: f32,
    /// Number of ranked candidates to show
    pub top_n: usize,
    /// Only the first N seconds of a file are analysed (0 = whole file)
    pub max_duration_secs: f64,
    /// Resample decoded audio to this rate before analysis
    pub sample_rate: Option<u32>,
    /// Trim leading/trailing silence
    pub trim: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_seconds: 10.0,
            top_n: 10,
            max_duration_secs: 30.0,
            sample_rate: None,
            trim: true,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.serialize();
        fs::write(path, content)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("selah")
            .join("config.txt")
    }

    /// Key estimation parameters derived from this config
    pub fn key_config(&self) -> KeyConfig {
        KeyConfig {
            segment_seconds: self.segment_seconds,
            top_n: self.top_n,
            trim: self.trim,
            ..KeyConfig::default()
        }
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let line_no = idx + 1;

            match key {
                "segment_seconds" => config.segment_seconds = parse_value(line_no, key, value)?,
                "top_n" => config.top_n = parse_value(line_no, key, value)?,
                "max_duration_secs" => config.max_duration_secs = parse_value(line_no, key, value)?,
                "sample_rate" => {
                    config.sample_rate = if value.is_empty() {
                        None
                    } else {
                        Some(parse_value(line_no, key, value)?)
                    };
                }
                "trim" => config.trim = parse_value(line_no, key, value)?,
                _ => {} // Ignore unknown keys
            }
        }

        Ok(config)
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec![
            "# Selah Configuration".to_string(),
            format!("segment_seconds={}", self.segment_seconds),
            format!("top_n={}", self.top_n),
            format!("max_duration_secs={}", self.max_duration_secs),
        ];

        if let Some(rate) = self.sample_rate {
            lines.push(format!("sample_rate={}", rate));
        }
        lines.push(format!("trim={}", self.trim));

        lines.join("\n")
    }
}

fn parse_value<T: FromStr>(line: usize, key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        line,
        key: key.to_string(),
        value: value.to_string(),
    })
}
