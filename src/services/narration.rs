use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::error::{BuildError, BuildResult};
use crate::core::io::{read_json, Storage};
use crate::core::manuscript::{Gender, Manuscript};
use crate::utils::audio::wav_duration_seconds;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OverviewAudio {
    pub transcript: String,
    pub wav_file_path: PathBuf,
}

/// Synthesised speech for one manuscript content, in manuscript order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SegmentAudio {
    pub speaker_id: String,
    pub speaker_gender: Gender,
    pub transcript: String,
    pub wav_file_path: PathBuf,
}

/// `narration.json`, written by the speech synthesis step of a job.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Narration {
    pub overview: OverviewAudio,
    pub contents: Vec<SegmentAudio>,
}

impl Narration {
    pub fn check_against(&self, manuscript: &Manuscript) -> BuildResult<()> {
        manuscript.validate()?;
        if self.contents.len() != manuscript.contents.len() {
            return Err(BuildError::NarrationMismatch {
                contents: manuscript.contents.len(),
                narration: self.contents.len(),
            });
        }
        Ok(())
    }

    /// Distinct speaker genders, in order of first appearance.
    pub fn genders(&self) -> Vec<Gender> {
        let mut genders = Vec::new();
        for segment in &self.contents {
            if !genders.contains(&segment.speaker_gender) {
                genders.push(segment.speaker_gender);
            }
        }
        genders
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        resolve(&mut self.overview.wav_file_path);
        for segment in &mut self.contents {
            resolve(&mut segment.wav_file_path);
        }
    }
}

/// Loads a narration manifest; relative audio paths are taken relative to
/// the manifest's directory.
pub async fn load_narration(storage: &dyn Storage, manifest: &Path) -> Result<Narration> {
    let mut narration: Narration = read_json(storage, manifest).await?;
    if let Some(dir) = manifest.parent() {
        narration.resolve_relative_to(dir);
    }
    Ok(narration)
}

/// Reads the playing time of an audio asset, in seconds.
pub trait DurationProbe: Send + Sync {
    fn duration(&self, path: &Path) -> Result<f64>;
}

pub struct WavDurationProbe;

impl DurationProbe for WavDurationProbe {
    fn duration(&self, path: &Path) -> Result<f64> {
        wav_duration_seconds(path)
    }
}
