//! Elite and track persistence.
//!
//! Individuals are stored one genome per line as a JSON array of numbers,
//! which also accepts files written as plain bracketed lists. Tracks are a
//! single JSON object. Missing files read as empty.

use anyhow::{Context, Result};
use racing_core::{Genome, Track};
use std::fs;
use std::path::Path;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
    }
    Ok(())
}

pub fn read_individuals(path: &Path) -> Result<Vec<Genome>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no individuals file, starting empty");
        return Ok(Vec::new());
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed reading individuals {}", path.display()))?;
    let mut individuals = Vec::new();
    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let genome: Genome = serde_json::from_str(trimmed).with_context(|| {
            format!(
                "invalid individual on line {} of {}",
                line_no + 1,
                path.display()
            )
        })?;
        individuals.push(genome);
    }
    Ok(individuals)
}

pub fn save_individuals(path: &Path, individuals: &[Genome]) -> Result<()> {
    ensure_parent(path)?;
    let mut out = String::new();
    for genome in individuals {
        out.push_str(&serde_json::to_string(genome).context("failed to serialize individual")?);
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("failed writing {}", path.display()))
}

pub fn load_track(path: &Path) -> Result<Track> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no track file, using an empty track");
        return Ok(Track::default());
    }
    let raw = fs::read(path).with_context(|| format!("failed reading track {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("invalid track json {}", path.display()))
}

pub fn save_track(path: &Path, track: &Track) -> Result<()> {
    ensure_parent(path)?;
    let encoded = serde_json::to_vec_pretty(track).context("failed to serialize track")?;
    fs::write(path, encoded).with_context(|| format!("failed writing {}", path.display()))
}

/// Track at `path`, or the built-in circuit when the file is missing or empty.
pub fn load_track_or_reference(path: &Path) -> Result<Track> {
    let track = load_track(path)?;
    if track.is_empty() {
        tracing::info!(path = %path.display(), "track file missing or empty, using reference circuit");
        return Ok(Track::reference());
    }
    track
        .validate()
        .with_context(|| format!("track {} is malformed", path.display()))?;
    Ok(track)
}
