use anyhow::Result;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::config::ResourceConfig;
use crate::core::error::{BuildError, BuildResult};
use crate::core::manuscript::Gender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    ManImages,
    WomanImages,
    BackgroundVideos,
    BackgroundMusic,
}

impl Pool {
    pub fn images(gender: Gender) -> Self {
        match gender {
            Gender::Man => Pool::ManImages,
            Gender::Woman => Pool::WomanImages,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pool::ManImages => "man image",
            Pool::WomanImages => "woman image",
            Pool::BackgroundVideos => "background video",
            Pool::BackgroundMusic => "background music",
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Pool::ManImages | Pool::WomanImages => &["png", "jpg", "jpeg", "webp"],
            Pool::BackgroundVideos => &["mp4", "mov", "webm", "mkv"],
            Pool::BackgroundMusic => &["mp3", "wav", "m4a", "aac", "ogg", "flac"],
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Random access to the asset pools a short is assembled from.
pub trait ResourceProvider: Send + Sync {
    fn draw(&self, pool: Pool) -> BuildResult<PathBuf>;
    fn pool_size(&self, pool: Pool) -> usize;
    fn font(&self) -> PathBuf;

    fn random_man_image(&self) -> BuildResult<PathBuf> {
        self.draw(Pool::ManImages)
    }

    fn random_woman_image(&self) -> BuildResult<PathBuf> {
        self.draw(Pool::WomanImages)
    }

    fn random_image(&self, gender: Gender) -> BuildResult<PathBuf> {
        match gender {
            Gender::Man => self.random_man_image(),
            Gender::Woman => self.random_woman_image(),
        }
    }

    fn random_background_video(&self) -> BuildResult<PathBuf> {
        self.draw(Pool::BackgroundVideos)
    }

    fn random_background_music(&self) -> BuildResult<PathBuf> {
        self.draw(Pool::BackgroundMusic)
    }

    /// The image pool of every gender in `genders` needs two distinct
    /// entries so a speaker change can always get a different picture.
    /// Pools of genders nobody speaks in are not consulted.
    fn check_pools(&self, genders: &[Gender]) -> BuildResult<()> {
        for &gender in genders {
            let found = self.pool_size(Pool::images(gender));
            if found < 2 {
                return Err(BuildError::ImagePoolTooSmall { gender, found });
            }
        }
        for pool in [Pool::BackgroundVideos, Pool::BackgroundMusic] {
            if self.pool_size(pool) == 0 {
                return Err(BuildError::EmptyPool(pool.name()));
            }
        }
        Ok(())
    }
}

pub struct DirectoryResources {
    man_images: Vec<PathBuf>,
    woman_images: Vec<PathBuf>,
    backgrounds: Vec<PathBuf>,
    music: Vec<PathBuf>,
    font: PathBuf,
    rng: Mutex<StdRng>,
}

impl DirectoryResources {
    pub fn from_config(config: &ResourceConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            man_images: scan_pool(&config.man_images, Pool::ManImages)?,
            woman_images: scan_pool(&config.woman_images, Pool::WomanImages)?,
            backgrounds: scan_pool(&config.backgrounds, Pool::BackgroundVideos)?,
            music: scan_pool(&config.music, Pool::BackgroundMusic)?,
            font: config.font_path.clone(),
            rng: Mutex::new(rng),
        })
    }

    fn entries(&self, pool: Pool) -> &[PathBuf] {
        match pool {
            Pool::ManImages => &self.man_images,
            Pool::WomanImages => &self.woman_images,
            Pool::BackgroundVideos => &self.backgrounds,
            Pool::BackgroundMusic => &self.music,
        }
    }
}

fn scan_pool(dir: &Path, pool: Pool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!("{} directory {} does not exist", pool, dir.display());
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| pool.extensions().contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && matches {
            entries.push(path);
        }
    }
    // read_dir order is platform dependent; sort so seeded draws repeat
    entries.sort();
    debug!("Found {} {} assets in {}", entries.len(), pool, dir.display());
    Ok(entries)
}

impl ResourceProvider for DirectoryResources {
    fn draw(&self, pool: Pool) -> BuildResult<PathBuf> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        self.entries(pool)
            .choose(&mut *rng)
            .cloned()
            .ok_or_else(|| BuildError::EmptyPool(pool.name()))
    }

    fn pool_size(&self, pool: Pool) -> usize {
        self.entries(pool).len()
    }

    fn font(&self) -> PathBuf {
        self.font.clone()
    }
}
