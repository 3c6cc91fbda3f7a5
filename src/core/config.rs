use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::services::llm::LlmConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_build")]
    pub build_folder: String,

    pub llm: LlmConfig,

    #[serde(default)]
    pub manuscript: ManuscriptConfig,

    #[serde(default)]
    pub resources: ResourceConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub layout: LayoutConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ManuscriptConfig {
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default = "default_min_contents")]
    pub min_contents: usize,
}

impl Default for ManuscriptConfig {
    fn default() -> Self {
        Self {
            themes: Vec::new(),
            min_contents: default_min_contents(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResourceConfig {
    #[serde(default = "default_man_images")]
    pub man_images: PathBuf,
    #[serde(default = "default_woman_images")]
    pub woman_images: PathBuf,
    #[serde(default = "default_backgrounds")]
    pub backgrounds: PathBuf,
    #[serde(default = "default_music")]
    pub music: PathBuf,
    #[serde(default = "default_font_path")]
    pub font_path: PathBuf,
    /// Fixes every random draw when set.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            man_images: default_man_images(),
            woman_images: default_woman_images(),
            backgrounds: default_backgrounds(),
            music: default_music(),
            font_path: default_font_path(),
            seed: None,
        }
    }
}

/// Timing, gain and output parameters of the short-form format.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default = "default_max_duration")]
    pub max_duration: f64,
    #[serde(default = "default_subtitle_chunk_chars")]
    pub subtitle_chunk_chars: usize,
    #[serde(default = "default_overview_duration")]
    pub overview_duration: f64,
    #[serde(default = "default_bgm_gain")]
    pub bgm_gain: f64,
    #[serde(default = "default_speech_gain")]
    pub speech_gain: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_duration: default_max_duration(),
            subtitle_chunk_chars: default_subtitle_chunk_chars(),
            overview_duration: default_overview_duration(),
            bgm_gain: default_bgm_gain(),
            speech_gain: default_speech_gain(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

/// Pixel geometry of the per-segment layers, in output frame coordinates.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub title_height: u32,
    pub panel_edge_size: (u32, u32),
    pub panel_edge_color: (u8, u8, u8),
    pub panel_fill_size: (u32, u32),
    pub panel_fill_color: (u8, u8, u8),
    pub panel_top: f64,
    pub font_size: u32,
    pub text_color: String,
    pub single_line_top: f64,
    pub multi_line_top: f64,
    pub line_height: f64,
    pub speaker_height: u32,
    pub bob_base: f64,
    pub bob_amplitude: f64,
    pub bob_frequency: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            title_height: 1920,
            panel_edge_size: (1000, 550),
            panel_edge_color: (222, 184, 135),
            panel_fill_size: (960, 530),
            panel_fill_color: (255, 255, 255),
            panel_top: 1300.0,
            font_size: 50,
            text_color: "black".to_string(),
            single_line_top: 1500.0,
            multi_line_top: 1400.0,
            line_height: 70.0,
            speaker_height: 900,
            bob_base: 300.0,
            bob_amplitude: 50.0,
            bob_frequency: 1.0,
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_build() -> String {
    "build".to_string()
}
fn default_min_contents() -> usize {
    30
}
fn default_man_images() -> PathBuf {
    PathBuf::from("resources/images/man")
}
fn default_woman_images() -> PathBuf {
    PathBuf::from("resources/images/woman")
}
fn default_backgrounds() -> PathBuf {
    PathBuf::from("resources/bgv")
}
fn default_music() -> PathBuf {
    PathBuf::from("resources/bgm")
}
fn default_font_path() -> PathBuf {
    PathBuf::from("resources/fonts/font.ttf")
}
fn default_max_duration() -> f64 {
    60.0
}
fn default_subtitle_chunk_chars() -> usize {
    18
}
fn default_overview_duration() -> f64 {
    3.0
}
fn default_bgm_gain() -> f64 {
    0.1
}
fn default_speech_gain() -> f64 {
    1.0
}
fn default_width() -> u32 {
    1080
}
fn default_height() -> u32 {
    1920
}
fn default_fps() -> u32 {
    30
}
fn default_video_codec() -> String {
    "libx264".to_string()
}
fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.yml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.build_folder)?;
        Ok(())
    }

    /// Scratch directory holding one job's manuscript and narration.
    pub fn job_build_dir(&self, job_id: &str) -> PathBuf {
        Path::new(&self.build_folder).join(job_id)
    }

    pub fn job_output_dir(&self, job_id: &str) -> PathBuf {
        Path::new(&self.output_folder).join(job_id)
    }

    pub fn output_video_path(&self, job_id: &str) -> PathBuf {
        self.job_output_dir(job_id).join("short.mp4")
    }

    pub fn title_image_path(&self, job_id: &str) -> PathBuf {
        self.job_output_dir(job_id).join("thumbnail_original.png")
    }
}
