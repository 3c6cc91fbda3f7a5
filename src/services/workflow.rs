use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::io::{read_json, write_json, Storage};
use crate::core::manuscript::Manuscript;
use crate::services::encoder::MediaEncoder;
use crate::services::narration::{load_narration, DurationProbe};
use crate::services::publisher::Publisher;
use crate::services::resources::ResourceProvider;
use crate::services::script::ManuscriptGenerator;
use crate::timeline::{composite, TimelineBuilder};

/// Ticks a progress bar for every audio file the timeline probes.
struct ProgressProbe<'a> {
    inner: &'a dyn DurationProbe,
    pb: ProgressBar,
}

impl DurationProbe for ProgressProbe<'_> {
    fn duration(&self, path: &Path) -> Result<f64> {
        let secs = self.inner.duration(path)?;
        self.pb.inc(1);
        Ok(secs)
    }
}

pub struct WorkflowManager {
    config: Config,
    generator: Box<dyn ManuscriptGenerator>,
    resources: Box<dyn ResourceProvider>,
    probe: Box<dyn DurationProbe>,
    encoder: Box<dyn MediaEncoder>,
    publisher: Box<dyn Publisher>,
    storage: Arc<dyn Storage>,
}

impl WorkflowManager {
    pub fn new(
        config: Config,
        generator: Box<dyn ManuscriptGenerator>,
        resources: Box<dyn ResourceProvider>,
        probe: Box<dyn DurationProbe>,
        encoder: Box<dyn MediaEncoder>,
        publisher: Box<dyn Publisher>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            config,
            generator,
            resources,
            probe,
            encoder,
            publisher,
            storage,
        }
    }

    /// Renders one job end to end and returns the path of the short.
    pub async fn run(&self, job_id: &str) -> Result<PathBuf> {
        info!("Starting job {}", job_id);
        let build_dir = self.config.job_build_dir(job_id);

        let manuscript = self.manuscript(&build_dir).await?;

        let manifest = build_dir.join("narration.json");
        let narration = load_narration(self.storage.as_ref(), &manifest)
            .await
            .with_context(|| format!("No narration for job {} at {}", job_id, manifest.display()))?;

        self.resources.check_pools(&narration.genders())?;

        let pb = ProgressBar::new(narration.contents.len() as u64 + 1);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?,
        );
        pb.set_message("Probing narration");
        let probe = ProgressProbe {
            inner: self.probe.as_ref(),
            pb: pb.clone(),
        };

        let title_image = self.config.title_image_path(job_id);
        let timeline = TimelineBuilder::new(
            &self.config.video,
            &self.config.layout,
            self.resources.as_ref(),
            &probe,
        )
        .build(&manuscript, &narration, &title_image);
        pb.finish_and_clear();
        let timeline = timeline?;

        info!(
            "Timeline: {:.2}s, {} segment(s) kept, {} dropped",
            timeline.total_duration, timeline.included_segments, timeline.dropped_segments
        );

        let background_video = self.resources.random_background_video()?;
        let background_music = self.resources.random_background_music()?;
        let tracks = composite(&timeline, &background_video, &background_music, &self.config.video);

        let output = self.config.output_video_path(job_id);
        self.encoder
            .encode(&tracks, &output)
            .await
            .with_context(|| format!("Failed to render {}", output.display()))?;

        self.publisher.register(job_id).await?;
        info!("Job {} done: {}", job_id, output.display());
        Ok(output)
    }

    async fn manuscript(&self, build_dir: &Path) -> Result<Manuscript> {
        let path = build_dir.join("manuscript.json");
        if self.storage.exists(&path).await? {
            info!("Loading cached manuscript from {:?}", path);
            let manuscript: Manuscript = read_json(self.storage.as_ref(), &path).await?;
            manuscript.validate()?;
            return Ok(manuscript);
        }

        info!("Generating manuscript...");
        let manuscript = self.generator.generate().await?;
        write_json(self.storage.as_ref(), &path, &manuscript).await?;
        Ok(manuscript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::BuildError;
    use crate::core::io::NativeStorage;
    use crate::core::manuscript::Gender;
    use crate::services::llm::LlmConfig;
    use crate::services::narration::{Narration, OverviewAudio, SegmentAudio, WavDurationProbe};
    use crate::services::publisher::UploadQueue;
    use crate::services::script::tests::MockLlmClient;
    use crate::services::script::BulletinBoardGenerator;
    use crate::timeline::builder::tests::CyclingResources;
    use crate::timeline::Tracks;
    use crate::utils::audio::tests::create_dummy_wav;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct RecordingEncoder {
        rendered: Arc<Mutex<Vec<(PathBuf, f64)>>>,
    }

    #[async_trait]
    impl MediaEncoder for RecordingEncoder {
        async fn encode(&self, tracks: &Tracks, output: &Path) -> Result<()> {
            self.rendered
                .lock()
                .unwrap()
                .push((output.to_path_buf(), tracks.duration));
            Ok(())
        }
    }

    const MANUSCRIPT: &str = r#"{"title": "t", "overview": "o",
        "contents": [{"speaker_id": "id1", "text": "a"},
                     {"speaker_id": "id2", "text": "b"}]}"#;

    fn config(dir: &TempDir) -> Config {
        let root = dir.path().to_string_lossy();
        Config::parse(&format!(
            "output_folder: {root}/output\nbuild_folder: {root}/build\nllm:\n  provider: mock\n"
        ))
        .unwrap()
    }

    async fn write_narration(config: &Config, job_id: &str, seconds: &[u32]) -> Result<()> {
        let build_dir = config.job_build_dir(job_id);
        std::fs::create_dir_all(&build_dir)?;
        std::fs::write(build_dir.join("overview.wav"), create_dummy_wav(16000, 16000, 1))?;
        let mut contents = Vec::new();
        for (i, secs) in seconds.iter().enumerate() {
            let name = format!("content_{:04}.wav", i);
            std::fs::write(build_dir.join(&name), create_dummy_wav(16000 * secs, 16000, 1))?;
            contents.push(SegmentAudio {
                speaker_id: format!("id{}", i + 1),
                speaker_gender: if i % 2 == 0 { Gender::Man } else { Gender::Woman },
                transcript: "x".to_string(),
                wav_file_path: PathBuf::from(name),
            });
        }
        let narration = Narration {
            overview: OverviewAudio {
                transcript: "o".to_string(),
                wav_file_path: PathBuf::from("overview.wav"),
            },
            contents,
        };
        write_json(&NativeStorage::new(), &build_dir.join("narration.json"), &narration).await
    }

    fn manager(
        config: &Config,
        llm: MockLlmClient,
        rendered: Arc<Mutex<Vec<(PathBuf, f64)>>>,
    ) -> WorkflowManager {
        let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
        let llm_config = LlmConfig {
            retry_count: 0,
            ..config.llm.clone()
        };
        let generator = BulletinBoardGenerator::new(Box::new(llm), &config.manuscript, &llm_config);
        WorkflowManager::new(
            config.clone(),
            Box::new(generator),
            Box::new(CyclingResources::new()),
            Box::new(WavDurationProbe),
            Box::new(RecordingEncoder { rendered }),
            Box::new(UploadQueue::new(&config.build_folder, storage.clone())),
            storage,
        )
    }

    #[tokio::test]
    async fn test_run_generates_renders_and_queues() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        config.ensure_directories()?;
        write_narration(&config, "job1", &[2, 3]).await?;

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let wm = manager(&config, MockLlmClient::new(&[MANUSCRIPT]), rendered.clone());
        let output = wm.run("job1").await?;

        assert_eq!(output, config.output_video_path("job1"));
        assert_eq!(*rendered.lock().unwrap(), vec![(output.clone(), 8.0)]);
        assert!(config.job_build_dir("job1").join("manuscript.json").exists());

        let queue = UploadQueue::new(&config.build_folder, Arc::new(NativeStorage::new()));
        assert_eq!(queue.pending().await?, vec!["job1"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_cached_manuscript_skips_generation() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        write_narration(&config, "job2", &[1, 1]).await?;
        std::fs::write(
            config.job_build_dir("job2").join("manuscript.json"),
            MANUSCRIPT,
        )?;

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let llm = MockLlmClient::new(&[]);
        let calls = llm.call_count.clone();
        let wm = manager(&config, llm, rendered.clone());
        wm.run("job2").await?;

        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(rendered.lock().unwrap()[0].1, 5.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_narration_must_cover_every_content() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);
        write_narration(&config, "job3", &[1]).await?;

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let wm = manager(&config, MockLlmClient::new(&[MANUSCRIPT]), rendered.clone());
        let err = wm.run("job3").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::NarrationMismatch { contents: 2, narration: 1 })
        ));
        assert!(rendered.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_narration_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let config = config(&dir);

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let wm = manager(&config, MockLlmClient::new(&[MANUSCRIPT]), rendered);
        let err = wm.run("job4").await.unwrap_err();
        assert!(err.to_string().contains("No narration for job job4"));
        Ok(())
    }
}
