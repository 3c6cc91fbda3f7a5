use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;

/// Seconds of audio in a WAV file, rounded to hundredths.
pub fn wav_duration_seconds(path: &Path) -> Result<f64> {
    let reader =
        WavReader::open(path).with_context(|| format!("Failed to read WAV {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        anyhow::bail!("Invalid sample rate 0 in {}", path.display());
    }
    // duration() counts frames, i.e. samples per channel
    let raw = reader.duration() as f64 / spec.sample_rate as f64;
    Ok((raw * 100.0).round() / 100.0)
}
