//! Selah
//!
//! Estimates the musical key of an audio file from the command line.

mod cli;
mod report;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use selah_analysis::estimate_key;
use selah_library::{Config, TrackLoader};

use crate::cli::Cli;
use crate::report::ReportJson;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    cli.apply(&mut config);

    if cli.save_config {
        config
            .save()
            .with_context(|| format!("Failed to save {}", Config::config_path().display()))?;
        info!("Saved settings to {}", Config::config_path().display());
    }

    let mut loader = TrackLoader::new().with_max_duration(config.max_duration_secs);
    if let Some(rate) = config.sample_rate {
        loader = loader.with_sample_rate(rate);
    }

    let track = loader
        .load(&cli.file)
        .with_context(|| format!("Failed to load {}", cli.file.display()))?;
    let metadata = track.metadata.clone();
    info!(
        "Decoded {:.1}s of {:.1}s at {} Hz",
        track.duration_secs(),
        metadata.duration_secs,
        track.sample_rate
    );

    let result = estimate_key(track.into_signal(), &config.key_config())
        .with_context(|| format!("Key estimation failed for {}", cli.file.display()))?;

    let path = cli.file.display().to_string();
    if cli.json {
        let report = ReportJson::new(path, &metadata, &result);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::render_text(&path, &metadata, &result));
    }

    Ok(())
}
