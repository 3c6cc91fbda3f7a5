use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::core::config::VideoConfig;
use crate::timeline::layer::{Horizontal, LayerKind, TimedLayer, Vertical};
use crate::timeline::Tracks;

/// Turns composed tracks into a finished media file.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    async fn encode(&self, tracks: &Tracks, output: &Path) -> Result<()>;
}

/// Everything needed to run one ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub args: Vec<String>,
    /// drawtext reads subtitles from files to avoid filtergraph escaping.
    pub text_files: Vec<(PathBuf, String)>,
}

pub struct FfmpegEncoder {
    ffmpeg: String,
    fps: u32,
    video_codec: String,
    audio_codec: String,
    scratch_dir: PathBuf,
}

fn secs(value: f64) -> String {
    format!("{:.3}", value)
}

/// Quotes a path for a filter option value.
fn filter_path(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "'\\''");
    format!("'{}'", escaped)
}

fn enable(layer: &TimedLayer) -> String {
    format!("enable='gte(t,{})*lt(t,{})'", secs(layer.start), secs(layer.end()))
}

/// `y` as an expression in the render clock `t`.
fn y_expr(layer: &TimedLayer) -> String {
    match layer.placement.y {
        Vertical::Fixed(y) => secs(y),
        Vertical::Bob(bob) => format!(
            "{}+{}*sin(2*PI*{}*(t-{}))",
            secs(bob.base),
            secs(bob.amplitude),
            secs(bob.frequency),
            secs(layer.start)
        ),
    }
}

impl FfmpegEncoder {
    pub fn new(video: &VideoConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: video.ffmpeg_path.clone(),
            fps: video.fps,
            video_codec: video.video_codec.clone(),
            audio_codec: video.audio_codec.clone(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn plan(&self, tracks: &Tracks, output: &Path) -> RenderPlan {
        let total = secs(tracks.duration);
        let fps = self.fps.to_string();
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];
        let mut filters: Vec<String> = Vec::new();
        let mut text_files = Vec::new();
        let mut input_idx = 0usize;

        let mut push_input = |args: &mut Vec<String>, pre: &[&str], path: &Path| -> usize {
            args.extend(pre.iter().map(|s| s.to_string()));
            args.push("-i".into());
            args.push(path.to_string_lossy().to_string());
            input_idx += 1;
            input_idx - 1
        };

        // Video: the background first, then every overlay bottom to top
        let mut current = "base".to_string();
        match tracks.video.first().map(|l| &l.kind) {
            Some(LayerKind::BackgroundVideo {
                path,
                width,
                height,
            }) => {
                let idx = push_input(&mut args, &["-stream_loop", "-1"], path);
                filters.push(format!(
                    "[{idx}:v]scale={width}:{height},setsar=1,fps={fps},trim=duration={total},setpts=PTS-STARTPTS[base]"
                ));
            }
            _ => filters.push(format!(
                "color=c=black:s={}x{}:r={fps}:d={total}[base]",
                tracks.width, tracks.height
            )),
        }

        for (n, layer) in tracks.video.iter().enumerate() {
            let next = format!("v{n}");
            match &layer.kind {
                LayerKind::BackgroundVideo { .. } => continue,
                LayerKind::TitleImage { path, height } | LayerKind::SpeakerImage { path, height } => {
                    let idx = push_input(
                        &mut args,
                        &["-loop", "1", "-framerate", fps.as_str(), "-t", total.as_str()],
                        path,
                    );
                    let x = match layer.placement.x {
                        Horizontal::Left => "0".to_string(),
                        Horizontal::Center => "(main_w-overlay_w)/2".to_string(),
                    };
                    filters.push(format!("[{idx}:v]scale=-1:{height}[img{n}]"));
                    filters.push(format!(
                        "[{current}][img{n}]overlay=x={x}:y='{y}':{enable}[{next}]",
                        y = y_expr(layer),
                        enable = enable(layer)
                    ));
                }
                LayerKind::Panel {
                    width,
                    height,
                    color: (r, g, b),
                    ..
                } => {
                    let x = match layer.placement.x {
                        Horizontal::Left => "0".to_string(),
                        Horizontal::Center => format!("(iw-{width})/2"),
                    };
                    filters.push(format!(
                        "[{current}]drawbox=x={x}:y={y}:w={width}:h={height}:color=0x{r:02X}{g:02X}{b:02X}:t=fill:{enable}[{next}]",
                        y = y_expr(layer),
                        enable = enable(layer)
                    ));
                }
                LayerKind::Subtitle {
                    text,
                    font,
                    font_size,
                    color,
                } => {
                    let file = self.scratch_dir.join(format!("subtitle_{n:04}.txt"));
                    let x = match layer.placement.x {
                        Horizontal::Left => "0".to_string(),
                        Horizontal::Center => "(w-text_w)/2".to_string(),
                    };
                    filters.push(format!(
                        "[{current}]drawtext=fontfile={font}:textfile={file}:expansion=none:fontsize={font_size}:fontcolor={color}:x={x}:y={y}:{enable}[{next}]",
                        font = filter_path(font),
                        file = filter_path(&file),
                        y = y_expr(layer),
                        enable = enable(layer)
                    ));
                    text_files.push((file, text.clone()));
                }
                LayerKind::BackgroundAudio { .. } | LayerKind::Speech { .. } => continue,
            }
            current = next;
        }
        filters.push(format!("[{current}]format=yuv420p[vout]"));

        // Audio: quiet looping music under every speech clip at its offset
        let mut mix_inputs = Vec::new();
        for (n, layer) in tracks.audio.iter().enumerate() {
            match &layer.kind {
                LayerKind::BackgroundAudio { path, gain } => {
                    let idx = push_input(&mut args, &["-stream_loop", "-1"], path);
                    filters.push(format!(
                        "[{idx}:a]atrim=duration={total},asetpts=PTS-STARTPTS,volume={gain}[a{n}]"
                    ));
                }
                LayerKind::Speech { path, gain } => {
                    let idx = push_input(&mut args, &[], path);
                    let delay_ms = (layer.start * 1000.0).round() as u64;
                    filters.push(format!(
                        "[{idx}:a]atrim=duration={},asetpts=PTS-STARTPTS,adelay=delays={delay_ms}:all=1,volume={gain}[a{n}]",
                        secs(layer.duration)
                    ));
                }
                _ => continue,
            }
            mix_inputs.push(format!("[a{n}]"));
        }
        if mix_inputs.is_empty() {
            filters.push(format!("anullsrc=r=44100:cl=stereo,atrim=duration={total}[aout]"));
        } else {
            filters.push(format!(
                "{}amix=inputs={}:duration=longest:normalize=0[aout]",
                mix_inputs.concat(),
                mix_inputs.len()
            ));
        }

        args.push("-filter_complex".into());
        args.push(filters.join(";"));
        args.extend(
            [
                "-map",
                "[vout]",
                "-map",
                "[aout]",
                "-c:v",
                self.video_codec.as_str(),
                "-r",
                fps.as_str(),
                "-c:a",
                self.audio_codec.as_str(),
                "-t",
                total.as_str(),
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(output.to_string_lossy().to_string());

        RenderPlan { args, text_files }
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn encode(&self, tracks: &Tracks, output: &Path) -> Result<()> {
        let plan = self.plan(tracks, output);

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        for (path, text) in &plan.text_files {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        if tokio::fs::try_exists(output).await? {
            tokio::fs::remove_file(output).await?;
        }

        info!("Encoding {:.2}s short to {}", tracks.duration, output.display());
        debug!("ffmpeg {}", plan.args.join(" "));

        let result = tokio::process::Command::new(&self.ffmpeg)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.ffmpeg));

        for (path, _) in &plan.text_files {
            let _ = tokio::fs::remove_file(path).await;
        }

        let result = result?;
        if !result.status.success() {
            // Partial output
            let _ = tokio::fs::remove_file(output).await;
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(anyhow!(
                "ffmpeg exited with {}: {}",
                result.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LayoutConfig;
    use crate::core::manuscript::Gender;
    use crate::timeline::builder::tests::{fixture, CyclingResources};
    use crate::timeline::{composite, TimelineBuilder};

    fn sample_tracks() -> Tracks {
        let (manuscript, narration, probe) = fixture(&[
            ("id1", Gender::Man, "あいうえおかきくけこさしすせそたちつてとなに", 10.0),
            ("id2", Gender::Woman, "ウブすぎてわろた", 10.0),
            ("id3", Gender::Man, "too long", 45.0),
        ]);
        let video = VideoConfig::default();
        let layout = LayoutConfig::default();
        let resources = CyclingResources::new();
        let timeline = TimelineBuilder::new(&video, &layout, &resources, &probe)
            .build(&manuscript, &narration, Path::new("thumb.png"))
            .unwrap();
        composite(&timeline, Path::new("bgv.mp4"), Path::new("bgm.mp3"), &video)
    }

    fn graph(plan: &RenderPlan) -> &str {
        let pos = plan.args.iter().position(|a| a == "-filter_complex").unwrap();
        &plan.args[pos + 1]
    }

    #[test]
    fn test_plan_inputs_and_output_options() {
        let encoder = FfmpegEncoder::new(&VideoConfig::default(), "scratch");
        let plan = encoder.plan(&sample_tracks(), Path::new("out/short.mp4"));
        let inputs: Vec<&String> = plan
            .args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| &w[1])
            .collect();

        // background, title, two speakers, music, two speech clips
        assert_eq!(
            inputs,
            vec!["bgv.mp4", "thumb.png", "man_0.png", "woman_1.png", "bgm.mp3", "content_0000.wav", "content_0001.wav"]
        );
        assert_eq!(plan.args.last().unwrap(), "out/short.mp4");
        assert_eq!(plan.args.iter().filter(|a| *a == "-loop").count(), 3);
        assert_eq!(plan.args.iter().filter(|a| *a == "-stream_loop").count(), 2);
        let last_t = plan.args.iter().rposition(|a| a == "-t").unwrap();
        assert_eq!(plan.args[last_t + 1], "23.000");
        assert!(plan.args.contains(&"libx264".to_string()));
        assert!(plan.args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_plan_filter_graph() {
        let encoder = FfmpegEncoder::new(&VideoConfig::default(), "scratch");
        let plan = encoder.plan(&sample_tracks(), Path::new("short.mp4"));
        let g = graph(&plan);

        assert!(g.starts_with("[0:v]scale=1080:1920,setsar=1,fps=30,trim=duration=23.000"));
        assert!(g.contains("drawbox=x=(iw-1000)/2:y=1300.000:w=1000:h=550:color=0xDEB887:t=fill"));
        assert!(g.contains("color=0xFFFFFF:t=fill:enable='gte(t,3.000)*lt(t,13.000)'"));
        assert!(g.contains("y='300.000+50.000*sin(2*PI*1.000*(t-13.000))'"));
        assert!(g.contains("[4:a]atrim=duration=23.000,asetpts=PTS-STARTPTS,volume=0.1"));
        assert!(g.contains("adelay=delays=3000:all=1,volume=1"));
        assert!(g.contains("adelay=delays=13000:all=1"));
        assert!(g.contains("amix=inputs=3:duration=longest:normalize=0[aout]"));
        assert_eq!(g.matches("drawtext=").count(), 3);
        assert!(g.ends_with("[aout]"));
    }

    #[test]
    fn test_subtitles_go_through_text_files() {
        let encoder = FfmpegEncoder::new(&VideoConfig::default(), "scratch");
        let plan = encoder.plan(&sample_tracks(), Path::new("short.mp4"));
        let texts: Vec<&str> = plan.text_files.iter().map(|(_, t)| t.as_str()).collect();

        assert_eq!(
            texts,
            vec!["あいうえおかきくけこさしすせそたちつ", "てとなに", "ウブすぎてわろた"]
        );
        assert!(plan.text_files.iter().all(|(p, _)| p.starts_with("scratch")));
    }

    #[test]
    fn test_subtitle_text_is_not_expanded() {
        let (manuscript, narration, probe) = fixture(&[
            ("id1", Gender::Man, "50%オフやんけ", 2.0),
            ("id2", Gender::Woman, "C:\\の中身", 2.0),
        ]);
        let video = VideoConfig::default();
        let layout = LayoutConfig::default();
        let resources = CyclingResources::new();
        let timeline = TimelineBuilder::new(&video, &layout, &resources, &probe)
            .build(&manuscript, &narration, Path::new("thumb.png"))
            .unwrap();
        let tracks = composite(&timeline, Path::new("bgv.mp4"), Path::new("bgm.mp3"), &video);

        let encoder = FfmpegEncoder::new(&video, "scratch");
        let plan = encoder.plan(&tracks, Path::new("short.mp4"));
        let g = graph(&plan);

        assert_eq!(g.matches("drawtext=").count(), 2);
        assert_eq!(g.matches(":expansion=none:").count(), 2);
        let texts: Vec<&str> = plan.text_files.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["50%オフやんけ", "C:\\の中身"]);
    }

    #[test]
    fn test_filter_path_escaping() {
        assert_eq!(filter_path(Path::new("fonts/a.ttf")), "'fonts/a.ttf'");
        assert_eq!(filter_path(Path::new("C:/fonts/a.ttf")), "'C\\:/fonts/a.ttf'");
    }

    #[tokio::test]
    async fn test_encode_failure_propagates_and_clears_old_output() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let output = temp_dir.path().join("short.mp4");
        std::fs::write(&output, b"stale")?;

        let video = VideoConfig {
            ffmpeg_path: temp_dir.path().join("no-ffmpeg-here").to_string_lossy().to_string(),
            ..VideoConfig::default()
        };
        let encoder = FfmpegEncoder::new(&video, temp_dir.path().join("scratch"));

        assert!(encoder.encode(&sample_tracks(), &output).await.is_err());
        assert!(!output.exists());
        assert!(!temp_dir.path().join("scratch").join("subtitle_0004.txt").exists());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_render_leaves_no_partial_output() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir()?;
        let output = temp_dir.path().join("short.mp4");

        // Writes something to its last argument, then fails
        let fake = temp_dir.path().join("fake-ffmpeg.sh");
        std::fs::write(
            &fake,
            "#!/bin/sh\nfor last; do :; done\necho partial > \"$last\"\necho 'Stray % near' >&2\nexit 1\n",
        )?;
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755))?;

        let video = VideoConfig {
            ffmpeg_path: fake.to_string_lossy().to_string(),
            ..VideoConfig::default()
        };
        let encoder = FfmpegEncoder::new(&video, temp_dir.path().join("scratch"));

        let err = encoder.encode(&sample_tracks(), &output).await.unwrap_err();
        assert!(err.to_string().contains("Stray % near"));
        assert!(!output.exists());
        Ok(())
    }
}
