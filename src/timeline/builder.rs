use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::core::config::{LayoutConfig, VideoConfig};
use crate::core::error::{BuildError, BuildResult};
use crate::core::manuscript::Manuscript;
use crate::services::narration::{DurationProbe, Narration, SegmentAudio};
use crate::services::resources::ResourceProvider;
use crate::timeline::budget::admit;
use crate::timeline::layer::{Bob, Horizontal, LayerKind, PanelRole, Placement, TimedLayer, Vertical};
use crate::timeline::selector::{next_turn, Turn};
use crate::timeline::subtitle::{chunk_lines, line_top};

/// Every timed visual and speech layer of one short, before the looping
/// background is laid underneath.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub layers: Vec<TimedLayer>,
    pub total_duration: f64,
    /// Manuscript contents that made it onto the timeline.
    pub included_segments: usize,
    /// Contents dropped by the duration ceiling.
    pub dropped_segments: usize,
}

/// State carried from one segment to the next.
#[derive(Debug, Clone, Default)]
struct BuildState {
    layers: Vec<TimedLayer>,
    cursor: f64,
    previous: Option<Turn>,
    included: usize,
}

enum Step {
    Continue(BuildState),
    Stop(BuildState),
}

pub struct TimelineBuilder<'a> {
    video: &'a VideoConfig,
    layout: &'a LayoutConfig,
    resources: &'a dyn ResourceProvider,
    probe: &'a dyn DurationProbe,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(
        video: &'a VideoConfig,
        layout: &'a LayoutConfig,
        resources: &'a dyn ResourceProvider,
        probe: &'a dyn DurationProbe,
    ) -> Self {
        Self {
            video,
            layout,
            resources,
            probe,
        }
    }

    pub fn build(
        &self,
        manuscript: &Manuscript,
        narration: &Narration,
        title_image: &Path,
    ) -> BuildResult<Timeline> {
        narration.check_against(manuscript)?;
        self.resources.check_pools(&narration.genders())?;

        let mut state = self.open_with_title(narration, title_image)?;
        for segment in &narration.contents {
            match self.step(state, segment)? {
                Step::Continue(next) => state = next,
                Step::Stop(last) => {
                    state = last;
                    break;
                }
            }
        }

        let dropped = narration.contents.len() - state.included;
        if dropped > 0 {
            info!(
                "Short capped at {:.2}s: kept {} of {} contents",
                state.cursor,
                state.included,
                narration.contents.len()
            );
        }

        Ok(Timeline {
            layers: state.layers,
            total_duration: state.cursor,
            included_segments: state.included,
            dropped_segments: dropped,
        })
    }

    /// The title image always takes the fixed overview slot, whatever the
    /// overview narration actually lasts.
    fn open_with_title(&self, narration: &Narration, title_image: &Path) -> BuildResult<BuildState> {
        let slot = self.video.overview_duration;
        let actual = self.probe_duration(&narration.overview.wav_file_path)?;
        if (actual - slot).abs() >= 0.01 {
            debug!(
                "Overview narration lasts {:.2}s but the title slot is fixed at {:.2}s",
                actual, slot
            );
        }

        let title = TimedLayer {
            start: 0.0,
            duration: slot,
            placement: Placement::origin(),
            kind: LayerKind::TitleImage {
                path: title_image.to_path_buf(),
                height: self.layout.title_height,
            },
        };
        Ok(BuildState {
            layers: vec![title],
            cursor: slot,
            previous: None,
            included: 0,
        })
    }

    fn step(&self, mut state: BuildState, segment: &SegmentAudio) -> BuildResult<Step> {
        let turn = next_turn(
            self.resources,
            state.previous.as_ref(),
            &segment.speaker_id,
            segment.speaker_gender,
        )?;
        let lines = chunk_lines(&segment.transcript, self.video.subtitle_chunk_chars);
        let duration = self.probe_duration(&segment.wav_file_path)?;

        if !admit(state.cursor, duration, self.video.max_duration) {
            debug!(
                "Content by {} ({:.2}s) does not fit after {:.2}s",
                segment.speaker_id, duration, state.cursor
            );
            return Ok(Step::Stop(state));
        }

        let start = state.cursor;
        let layers = self.segment_layers(start, duration, &lines, &turn.image, segment);
        state.layers.extend(layers);
        state.cursor += duration;
        state.included += 1;
        state.previous = Some(turn);
        Ok(Step::Continue(state))
    }

    /// Layers of one segment, bottom to top, all on `[start, start + duration)`.
    fn segment_layers(
        &self,
        start: f64,
        duration: f64,
        lines: &[&str],
        image: &Path,
        segment: &SegmentAudio,
    ) -> Vec<TimedLayer> {
        let layout = self.layout;
        let at = |placement: Placement, kind: LayerKind| TimedLayer {
            start,
            duration,
            placement,
            kind,
        };

        let mut layers = Vec::with_capacity(lines.len() + 4);
        layers.push(at(
            Placement::centered(layout.panel_top),
            LayerKind::Panel {
                role: PanelRole::Edge,
                width: layout.panel_edge_size.0,
                height: layout.panel_edge_size.1,
                color: layout.panel_edge_color,
            },
        ));
        layers.push(at(
            Placement::centered(layout.panel_top),
            LayerKind::Panel {
                role: PanelRole::Fill,
                width: layout.panel_fill_size.0,
                height: layout.panel_fill_size.1,
                color: layout.panel_fill_color,
            },
        ));

        let font = self.resources.font();
        for (i, line) in lines.iter().enumerate() {
            layers.push(at(
                Placement::centered(line_top(layout, i, lines.len())),
                LayerKind::Subtitle {
                    text: line.to_string(),
                    font: font.clone(),
                    font_size: layout.font_size,
                    color: layout.text_color.clone(),
                },
            ));
        }

        layers.push(at(
            Placement {
                x: Horizontal::Center,
                y: Vertical::Bob(Bob {
                    base: layout.bob_base,
                    amplitude: layout.bob_amplitude,
                    frequency: layout.bob_frequency,
                }),
            },
            LayerKind::SpeakerImage {
                path: image.to_path_buf(),
                height: layout.speaker_height,
            },
        ));
        layers.push(at(
            Placement::origin(),
            LayerKind::Speech {
                path: segment.wav_file_path.clone(),
                gain: self.video.speech_gain,
            },
        ));
        layers
    }

    fn probe_duration(&self, path: &Path) -> BuildResult<f64> {
        self.probe.duration(path).map_err(|source| BuildError::Duration {
            path: PathBuf::from(path),
            source,
        })
    }
}
