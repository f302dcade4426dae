use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{beatmap::Pos, Result};

/// Top-level configuration for a preview session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Audio/clock disagreement (ms) tolerated before the clock re-anchors.
    pub drift_threshold_ms: f64,
    /// Fraction of the total duration used when no preview time is given.
    pub default_preview_fraction: f64,
    pub playfield: PlayfieldConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            drift_threshold_ms: 100.0,
            default_preview_fraction: 0.42,
            playfield: PlayfieldConfig::default(),
        }
    }
}

impl PreviewConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Playfield geometry in beatmap coordinates and its offset on the canvas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayfieldConfig {
    pub width: f64,
    pub height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for PlayfieldConfig {
    fn default() -> Self {
        Self {
            width: 512.0,
            height: 384.0,
            offset_x: 64.0,
            offset_y: 48.0,
        }
    }
}

impl PlayfieldConfig {
    /// Fixed anchor for spinners and holds.
    pub fn center(&self) -> Pos {
        Pos::new(self.width / 2.0, self.height / 2.0)
    }
}
