use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PreviewError, Result};

/// A point in playfield coordinates. Serialised as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Pos {
    pub x: f64,
    pub y: f64,
}

impl Pos {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Pos {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Pos> for [f64; 2] {
    fn from(pos: Pos) -> Self {
        [pos.x, pos.y]
    }
}

/// Game mode of a beatmap. Selects the renderer variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Mode {
    Standard,
    Taiko,
    Catch,
    Mania,
}

impl Mode {
    /// Fails with [`PreviewError::UnsupportedMode`] for ids outside 0..=3.
    pub fn from_id(id: u8) -> Result<Self> {
        Self::try_from(id).map_err(|_| PreviewError::UnsupportedMode { mode: id })
    }

    pub fn id(self) -> u8 {
        match self {
            Mode::Standard => 0,
            Mode::Taiko => 1,
            Mode::Catch => 2,
            Mode::Mania => 3,
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::Standard),
            1 => Ok(Mode::Taiko),
            2 => Ok(Mode::Catch),
            3 => Ok(Mode::Mania),
            other => Err(format!("unknown beatmap mode {other}")),
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        mode.id()
    }
}

/// Kind-specific payload of a hit object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum HitObjectKind {
    Circle {
        pos: Pos,
    },
    Slider {
        #[serde(default)]
        pos: Pos,
        distance: f64,
        repetitions: u32,
    },
    Spinner {
        #[serde(alias = "endTime")]
        end_time: f64,
    },
    Hold {
        #[serde(default)]
        pos: Pos,
        #[serde(alias = "endTime")]
        end_time: f64,
    },
}

/// One raw hit object as stored in the beatmap, before timing is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitObject {
    pub time: f64,
    #[serde(flatten)]
    pub kind: HitObjectKind,
}

impl HitObject {
    pub fn circle(time: f64, pos: Pos) -> Self {
        Self {
            time,
            kind: HitObjectKind::Circle { pos },
        }
    }

    pub fn slider(time: f64, pos: Pos, distance: f64, repetitions: u32) -> Self {
        Self {
            time,
            kind: HitObjectKind::Slider {
                pos,
                distance,
                repetitions,
            },
        }
    }

    pub fn spinner(time: f64, end_time: f64) -> Self {
        Self {
            time,
            kind: HitObjectKind::Spinner { end_time },
        }
    }

    pub fn hold(time: f64, pos: Pos, end_time: f64) -> Self {
        Self {
            time,
            kind: HitObjectKind::Hold { pos, end_time },
        }
    }
}

/// A tempo segment starting at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    pub time: f64,
    #[serde(alias = "msPerBeat")]
    pub ms_per_beat: f64,
}

impl TimingPoint {
    pub fn new(time: f64, ms_per_beat: f64) -> Self {
        Self { time, ms_per_beat }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beatmap {
    pub mode: Mode,
    pub objects: Vec<HitObject>,
    pub timing_points: Vec<TimingPoint>,
    pub sv: f64,
}

/// Wire shape of a beatmap, with the mode still a bare id.
#[derive(Deserialize)]
struct RawBeatmap {
    mode: u8,
    objects: Vec<HitObject>,
    timing_points: Vec<TimingPoint>,
    sv: f64,
}

impl Beatmap {
    /// Parses a beatmap. Malformed JSON is a [`PreviewError::Json`]; a well-formed
    /// mode id with no known mode is a [`PreviewError::UnsupportedMode`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawBeatmap = serde_json::from_str(json)?;
        if raw.sv.is_nan() || raw.sv <= 0.0 {
            return Err(PreviewError::msg(format!(
                "scroll velocity must be positive, got {}",
                raw.sv
            )));
        }
        Ok(Beatmap {
            mode: Mode::from_id(raw.mode)?,
            objects: raw.objects,
            timing_points: raw.timing_points,
            sv: raw.sv,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
