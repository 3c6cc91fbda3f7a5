use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use script2shorts::core::config::Config;
use script2shorts::core::io::{NativeStorage, Storage};
use script2shorts::services::encoder::FfmpegEncoder;
use script2shorts::services::llm::create_llm;
use script2shorts::services::narration::WavDurationProbe;
use script2shorts::services::publisher::UploadQueue;
use script2shorts::services::resources::DirectoryResources;
use script2shorts::services::script::BulletinBoardGenerator;
use script2shorts::services::workflow::WorkflowManager;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    let job_id = match std::env::args().nth(1) {
        Some(id) => id,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the UNIX epoch")?
            .as_secs()
            .to_string(),
    };

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());

    let llm = create_llm(&config.llm)?;
    let generator = BulletinBoardGenerator::new(llm, &config.manuscript, &config.llm);
    let resources = DirectoryResources::from_config(&config.resources)?;
    let encoder = FfmpegEncoder::new(&config.video, config.job_build_dir(&job_id));
    let publisher = UploadQueue::new(&config.build_folder, storage.clone());

    let manager = WorkflowManager::new(
        config.clone(),
        Box::new(generator),
        Box::new(resources),
        Box::new(WavDurationProbe),
        Box::new(encoder),
        Box::new(publisher),
        storage,
    );
    let output = manager.run(&job_id).await?;

    println!("Short rendered: {}", output.display());
    Ok(())
}
