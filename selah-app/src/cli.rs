//! Command-line arguments

use clap::Parser;
use selah_library::Config;
use std::path::PathBuf;

/// selah - estimate the musical key of an audio file
///
/// Decodes the opening of the file, builds a constant-Q chroma profile and
/// correlates it against the Krumhansl-Kessler major and minor key profiles.
#[derive(Parser, Debug)]
#[command(name = "selah")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Audio file to analyse
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Number of ranked keys to show (at most 24)
    #[arg(short = 'n', long, value_name = "N")]
    pub top_n: Option<usize>,

    /// Segment length in seconds for chroma averaging
    #[arg(long, value_name = "SECONDS")]
    pub segment_seconds: Option<f32>,

    /// Analyse only the first SECONDS of the file (0 = whole file)
    #[arg(long, value_name = "SECONDS")]
    pub max_duration: Option<f64>,

    /// Keep leading and trailing silence
    #[arg(long, default_value = "false")]
    pub no_trim: bool,

    /// Resample to this rate before analysis
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Print the full result as JSON
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Store the effective settings as the new defaults
    #[arg(long, default_value = "false")]
    pub save_config: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Cli {
    /// Overlay command-line values on top of the stored config
    pub fn apply(&self, config: &mut Config) {
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(seconds) = self.segment_seconds {
            config.segment_seconds = seconds;
        }
        if let Some(seconds) = self.max_duration {
            config.max_duration_secs = seconds;
        }
        if self.no_trim {
            config.trim = false;
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = Some(rate);
        }
    }

    /// Default tracing filter from the verbosity flags
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
