use serde::Serialize;
use std::f64::consts::PI;
use std::path::PathBuf;

/// Vertical "talking" bob: `base + amplitude * sin(2π · frequency · t)`
/// where `t` is seconds since the layer started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bob {
    pub base: f64,
    pub amplitude: f64,
    pub frequency: f64,
}

impl Bob {
    pub fn at(&self, elapsed: f64) -> f64 {
        self.base + self.amplitude * (2.0 * PI * self.frequency * elapsed).sin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Vertical {
    /// Top edge in pixels.
    Fixed(f64),
    Bob(Bob),
}

impl Vertical {
    pub fn at(&self, elapsed: f64) -> f64 {
        match self {
            Vertical::Fixed(y) => *y,
            Vertical::Bob(bob) => bob.at(elapsed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Horizontal {
    /// Pinned to the left edge of the frame.
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub x: Horizontal,
    pub y: Vertical,
}

impl Placement {
    pub fn origin() -> Self {
        Self {
            x: Horizontal::Left,
            y: Vertical::Fixed(0.0),
        }
    }

    pub fn centered(top: f64) -> Self {
        Self {
            x: Horizontal::Center,
            y: Vertical::Fixed(top),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PanelRole {
    Edge,
    Fill,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LayerKind {
    BackgroundVideo {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    BackgroundAudio {
        path: PathBuf,
        gain: f64,
    },
    TitleImage {
        path: PathBuf,
        height: u32,
    },
    Panel {
        role: PanelRole,
        width: u32,
        height: u32,
        color: (u8, u8, u8),
    },
    Subtitle {
        text: String,
        font: PathBuf,
        font_size: u32,
        color: String,
    },
    SpeakerImage {
        path: PathBuf,
        height: u32,
    },
    Speech {
        path: PathBuf,
        gain: f64,
    },
}

impl LayerKind {
    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            LayerKind::BackgroundAudio { .. } | LayerKind::Speech { .. }
        )
    }
}

/// One element of the composition, active on `[start, start + duration)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedLayer {
    pub start: f64,
    pub duration: f64,
    pub placement: Placement,
    pub kind: LayerKind,
}

impl TimedLayer {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Vertical position at absolute render time `t`.
    pub fn top_at(&self, t: f64) -> f64 {
        self.placement.y.at(t - self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_bob_oscillates_around_base() {
        let bob = Bob {
            base: 300.0,
            amplitude: 50.0,
            frequency: 1.0,
        };
        assert!(approx(bob.at(0.0), 300.0));
        assert!(approx(bob.at(0.25), 350.0));
        assert!(approx(bob.at(0.5), 300.0));
        assert!(approx(bob.at(0.75), 250.0));
        assert!(approx(bob.at(1.0), 300.0));
    }

    #[test]
    fn test_bob_is_evaluated_in_layer_local_time() {
        let layer = TimedLayer {
            start: 3.0,
            duration: 2.0,
            placement: Placement {
                x: Horizontal::Center,
                y: Vertical::Bob(Bob {
                    base: 300.0,
                    amplitude: 50.0,
                    frequency: 1.0,
                }),
            },
            kind: LayerKind::SpeakerImage {
                path: PathBuf::from("a.png"),
                height: 900,
            },
        };
        assert!(approx(layer.top_at(3.0), 300.0));
        assert!(approx(layer.top_at(3.25), 350.0));
        assert!(approx(layer.end(), 5.0));
    }
}
