//! Run settings and preferences
//!
//! Stored as pretty JSON next to the roster file.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{LEVEL_HEIGHT_TILES, LEVEL_WIDTH_TILES, MAX_PLAYERS, STARTING_LIVES, TILE_SIZE};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] io::Error),
    #[error("malformed settings file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown quality preset {0:?}")]
    UnknownPreset(String),
}

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    /// Maximum live particles for this preset
    pub fn max_particles(&self) -> usize {
        match self {
            QualityPreset::Low => 64,
            QualityPreset::Medium => 256,
            QualityPreset::High => 1024,
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityPreset::Low => "low",
            QualityPreset::Medium => "medium",
            QualityPreset::High => "high",
        })
    }
}

impl FromStr for QualityPreset {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(QualityPreset::Low),
            "medium" | "med" => Ok(QualityPreset::Medium),
            "high" => Ok(QualityPreset::High),
            _ => Err(SettingsError::UnknownPreset(s.to_string())),
        }
    }
}

/// Size of generated levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelDimensions {
    /// Pixels per tile
    pub tile_size: f32,
    pub width_tiles: usize,
    pub height_tiles: usize,
}

impl Default for LevelDimensions {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            width_tiles: LEVEL_WIDTH_TILES,
            height_tiles: LEVEL_HEIGHT_TILES,
        }
    }
}

impl LevelDimensions {
    /// Narrowest level that still fits the start zone and the end arena
    pub const MIN_WIDTH_TILES: usize = 48;
    pub const MIN_HEIGHT_TILES: usize = 20;
    pub const MIN_TILE_SIZE: f32 = 8.0;

    /// Dimensions raised to the generator's minimums
    pub fn sanitized(&self) -> Self {
        let tile_size = if self.tile_size.is_finite() && self.tile_size >= Self::MIN_TILE_SIZE {
            self.tile_size
        } else {
            TILE_SIZE
        };
        let clean = Self {
            tile_size,
            width_tiles: self.width_tiles.max(Self::MIN_WIDTH_TILES),
            height_tiles: self.height_tiles.max(Self::MIN_HEIGHT_TILES),
        };
        if clean != *self {
            log::warn!("level dimensions {self:?} raised to {clean:?}");
        }
        clean
    }
}

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset (caps particles)
    pub quality: QualityPreset,
    /// Particle effects (explosions, sparks, etc.)
    pub particles: bool,
    /// Seed for level generation; the same seed replays the same levels
    pub run_seed: u64,
    /// Shared squad lives at the start of a run
    pub starting_lives: u32,
    /// Player slots offered in the lobby
    pub player_slots: usize,
    pub level: LevelDimensions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,
            particles: true,
            run_seed: 0x00C0_FFEE,
            starting_lives: STARTING_LIVES,
            player_slots: MAX_PLAYERS,
            level: LevelDimensions::default(),
        }
    }
}

impl Settings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Effective particle count cap
    pub fn max_particles(&self) -> usize {
        if !self.particles {
            0
        } else {
            self.quality.max_particles()
        }
    }

    /// Lobby slot count clamped to 1..=MAX_PLAYERS
    pub fn slot_count(&self) -> usize {
        self.player_slots.clamp(1, MAX_PLAYERS)
    }

    /// Load settings from `path`, using defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => {
                let settings = serde_json::from_str(&json)?;
                log::info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("Using default settings");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::info!("Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("mutt-brigade-no-such-settings.json");
        let _ = fs::remove_file(&path);
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.starting_lives, STARTING_LIVES);
        assert_eq!(settings.level, LevelDimensions::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("mutt-brigade-bad-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse(_))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_then_load_keeps_seed() {
        let path = std::env::temp_dir().join(format!("mutt-brigade-settings-{}.json", std::process::id()));
        let settings = Settings {
            run_seed: 42,
            ..Settings::from_preset(QualityPreset::High)
        };
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.run_seed, 42);
        assert_eq!(loaded.quality, QualityPreset::High);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "run_seed": 7 }"#).unwrap();
        assert_eq!(settings.run_seed, 7);
        assert_eq!(settings.player_slots, MAX_PLAYERS);
    }

    #[test]
    fn test_quality_preset_parses() {
        assert_eq!("High".parse::<QualityPreset>().unwrap(), QualityPreset::High);
        assert_eq!(" med ".parse::<QualityPreset>().unwrap(), QualityPreset::Medium);
        assert!(matches!("ultra".parse::<QualityPreset>(), Err(SettingsError::UnknownPreset(_))));
        for preset in [QualityPreset::Low, QualityPreset::Medium, QualityPreset::High] {
            assert_eq!(preset.to_string().parse::<QualityPreset>().unwrap(), preset);
        }
    }

    #[test]
    fn test_sanitized_dimensions() {
        let dims = LevelDimensions {
            tile_size: f32::NAN,
            width_tiles: 10,
            height_tiles: 100,
        }
        .sanitized();
        assert_eq!(dims.tile_size, TILE_SIZE);
        assert_eq!(dims.width_tiles, LevelDimensions::MIN_WIDTH_TILES);
        assert_eq!(dims.height_tiles, 100);
        assert_eq!(dims.sanitized(), dims);
        assert_eq!(Settings::default().max_particles(), 256);
    }
}
