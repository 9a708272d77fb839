//! Track loading and configuration for Selah

mod config;
mod loader;

pub use config::{Config, ConfigError};
pub use loader::{resample, LoadError, LoadedTrack, TrackLoader, TrackMetadata};
