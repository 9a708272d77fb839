//! Text and JSON rendering of an estimation result

use selah_analysis::KeyEstimationResult;
use selah_library::TrackMetadata;
use serde::Serialize;
use std::fmt::Write;

/// Width of a full chroma bar in characters
const BAR_WIDTH: usize = 40;

/// JSON document printed with `--json`
#[derive(Debug, Serialize)]
pub struct ReportJson<'a> {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<&'a str>,
    /// Length of the decoded source, not just the analysed excerpt
    pub source_duration_secs: f64,
    #[serde(flatten)]
    pub result: &'a KeyEstimationResult,
}

impl<'a> ReportJson<'a> {
    pub fn new(path: String, metadata: &'a TrackMetadata, result: &'a KeyEstimationResult) -> Self {
        Self {
            path,
            title: non_empty(&metadata.title),
            artist: non_empty(&metadata.artist),
            source_duration_secs: metadata.duration_secs,
            result,
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// "A Minor (correlation = 0.812)"
pub fn headline(result: &KeyEstimationResult) -> String {
    format!(
        "{} {} (correlation = {:.3})",
        result.primary.key, result.primary.mode, result.primary.score
    )
}

/// Horizontal bar chart of the chroma vector, scaled to its largest bin
pub fn chroma_chart(result: &KeyEstimationResult) -> String {
    let max = result.chroma.iter().fold(0.0f32, f32::max);
    let mut out = String::new();

    for (label, value) in result.chroma.labelled() {
        let filled = if max > 0.0 {
            ((value / max) * BAR_WIDTH as f32).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{:<2} {:<width$} {:.3}",
            label,
            "#".repeat(filled.min(BAR_WIDTH)),
            value,
            width = BAR_WIDTH
        );
    }
    out
}

/// Ranked candidates as a fixed-width table
pub fn ranking_table(result: &KeyEstimationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>4}  {:<3} {:<6} {:>7}", "Rank", "Key", "Mode", "Score");
    for (i, candidate) in result.ranked.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:<3} {:<6} {:>7.3}",
            i + 1,
            candidate.key,
            candidate.mode,
            candidate.score
        );
    }
    out
}

/// Full human-readable report
pub fn render_text(path: &str, metadata: &TrackMetadata, result: &KeyEstimationResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", path);
    if !metadata.title.is_empty() {
        if metadata.artist.is_empty() {
            let _ = writeln!(out, "  {}", metadata.title);
        } else {
            let _ = writeln!(out, "  {} - {}", metadata.artist, metadata.title);
        }
    }
    let _ = writeln!(
        out,
        "  analysed {:.1}s in {} segment(s)",
        result.duration_secs, result.segments
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Key: {}", headline(result));
    let _ = writeln!(out);
    let _ = writeln!(out, "Chroma");
    out.push_str(&chroma_chart(result));
    let _ = writeln!(out);
    out.push_str(&ranking_table(result));
    out
}
