//! Difficulty presets and the knobs they set

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named difficulty levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Noob,
    Easy,
    #[default]
    Medium,
    Hard,
    Hardcore,
}

/// Simulation knobs driven by the difficulty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultySettings {
    /// Milliseconds between two spawns
    pub spawn_interval_ms: f32,
    /// Share of eligible roads that get a signal post, in `[0, 1]`
    pub signal_fraction: f32,
    /// Scales every elapsed time fed to vehicle motion
    pub speed_multiplier: f32,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Noob,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Hardcore,
    ];

    pub fn settings(self) -> DifficultySettings {
        let (spawn_interval_ms, signal_fraction, speed_multiplier) = match self {
            Difficulty::Noob => (6000.0, 1.0, 1.0),
            Difficulty::Easy => (5000.0, 0.75, 1.25),
            Difficulty::Medium => (3000.0, 0.5, 1.5),
            Difficulty::Hard => (2000.0, 0.25, 2.0),
            Difficulty::Hardcore => (1000.0, 0.0, 3.0),
        };
        DifficultySettings {
            spawn_interval_ms,
            signal_fraction,
            speed_multiplier,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Noob => "noob",
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Hardcore => "hardcore",
        };
        f.write_str(name)
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Unknown difficulty '{}'", s))
    }
}

impl Default for DifficultySettings {
    fn default() -> Self {
        Difficulty::default().settings()
    }
}

impl From<Difficulty> for DifficultySettings {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.settings()
    }
}

impl DifficultySettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.spawn_interval_ms.is_finite() && self.spawn_interval_ms > 0.0) {
            bail!("Spawn interval must be positive, got {}", self.spawn_interval_ms);
        }
        if !(0.0..=1.0).contains(&self.signal_fraction) {
            bail!("Signal fraction must lie in [0, 1], got {}", self.signal_fraction);
        }
        if !(self.speed_multiplier.is_finite() && self.speed_multiplier > 0.0) {
            bail!("Speed multiplier must be positive, got {}", self.speed_multiplier);
        }
        Ok(())
    }
}
