use std::path::Path;

use crate::core::config::VideoConfig;
use crate::timeline::builder::Timeline;
use crate::timeline::layer::{LayerKind, PanelRole, Placement, TimedLayer};

/// The two tracks handed to the encoder. `video` is listed bottom to top.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracks {
    pub video: Vec<TimedLayer>,
    pub audio: Vec<TimedLayer>,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl Tracks {
    pub fn speech(&self) -> impl Iterator<Item = &TimedLayer> {
        self.audio
            .iter()
            .filter(|l| matches!(l.kind, LayerKind::Speech { .. }))
    }
}

fn z_rank(kind: &LayerKind) -> u8 {
    match kind {
        LayerKind::BackgroundVideo { .. } => 0,
        LayerKind::TitleImage { .. } => 1,
        LayerKind::Panel {
            role: PanelRole::Edge,
            ..
        } => 2,
        LayerKind::Panel {
            role: PanelRole::Fill,
            ..
        } => 3,
        LayerKind::Subtitle { .. } => 4,
        LayerKind::SpeakerImage { .. } => 5,
        LayerKind::BackgroundAudio { .. } | LayerKind::Speech { .. } => u8::MAX,
    }
}

/// Lays the looping background video and music under a timeline. Both
/// backgrounds span exactly `total_duration`.
pub fn composite(
    timeline: &Timeline,
    background_video: &Path,
    background_music: &Path,
    video: &VideoConfig,
) -> Tracks {
    let total = timeline.total_duration;

    let mut visuals = vec![TimedLayer {
        start: 0.0,
        duration: total,
        placement: Placement::origin(),
        kind: LayerKind::BackgroundVideo {
            path: background_video.to_path_buf(),
            width: video.width,
            height: video.height,
        },
    }];
    let mut sounds = vec![TimedLayer {
        start: 0.0,
        duration: total,
        placement: Placement::origin(),
        kind: LayerKind::BackgroundAudio {
            path: background_music.to_path_buf(),
            gain: video.bgm_gain,
        },
    }];

    for layer in &timeline.layers {
        if layer.kind.is_audio() {
            sounds.push(layer.clone());
        } else {
            visuals.push(layer.clone());
        }
    }

    // Stable: chunks of the same subtitle keep their line order
    visuals.sort_by(|a, b| {
        a.start
            .total_cmp(&b.start)
            .then_with(|| z_rank(&a.kind).cmp(&z_rank(&b.kind)))
    });
    sounds[1..].sort_by(|a, b| a.start.total_cmp(&b.start));

    Tracks {
        video: visuals,
        audio: sounds,
        duration: total,
        width: video.width,
        height: video.height,
    }
}
