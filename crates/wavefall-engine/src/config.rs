//! Engine configuration.
//!
//! Provides configurable parameters for content, saves, logging, the
//! autopilot and combat pacing. Configuration can be loaded from and saved
//! to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use wavefall_gameplay::CombatConfig;

use crate::catalog_loader::DEFAULT_CATALOG_PATH;
use crate::save_manager::DEFAULT_SAVE_DIR;

/// Configuration file name.
pub const CONFIG_FILE: &str = "wavefall.toml";

/// Encoding used for save files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    /// Pretty JSON, readable and editable.
    Json,
    /// Magic-prefixed bincode.
    Binary,
}

/// Engine configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Logging ===
    /// Tracing filter directive (overridden by RUST_LOG)
    pub log_filter: String,

    // === Content ===
    /// Directory holding the catalog tables
    pub catalog_dir: PathBuf,

    // === Saves ===
    /// Directory for save files
    pub save_dir: PathBuf,
    /// Save slot name
    pub save_name: String,
    /// Save file encoding
    pub save_format: SaveFormat,
    /// Save every N cleared waves (0 = only at exit)
    pub autosave_waves: u32,

    // === Run ===
    /// Player name for new runs
    pub player_name: String,
    /// Game seed for new runs (None = random)
    pub game_seed: Option<u64>,
    /// Seed for combat rolls (None = random)
    pub rng_seed: Option<u64>,

    // === Autopilot ===
    /// Simulated seconds per tick
    pub tick_seconds: f64,
    /// Stop after this many ticks
    pub max_ticks: u64,
    /// Stop once this wave is reached (0 = play until death)
    pub max_wave: u32,

    // === Combat ===
    /// Pacing and balance
    pub combat: CombatConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Logging
            log_filter: "wavefall=info".to_string(),

            // Content
            catalog_dir: PathBuf::from(DEFAULT_CATALOG_PATH),

            // Saves
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            save_name: "run".to_string(),
            save_format: SaveFormat::Json,
            autosave_waves: 5,

            // Run
            player_name: "Wanderer".to_string(),
            game_seed: None,
            rng_seed: None,

            // Autopilot
            tick_seconds: 0.1,
            max_ticks: 200_000,
            max_wave: 0,

            // Combat
            combat: CombatConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|contents| toml::from_str::<Self>(&contents).map_err(|e| e.to_string()));

        let mut config = match parsed {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Ignoring config file {}: {e}", path.display());
                Self::default()
            },
        };
        config.validate();
        config
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        if self.log_filter.trim().is_empty() {
            self.log_filter = Self::default().log_filter;
        }
        if self.save_name.trim().is_empty() {
            self.save_name = Self::default().save_name;
        }
        if self.player_name.trim().is_empty() {
            self.player_name = Self::default().player_name;
        }

        // Autopilot
        if !self.tick_seconds.is_finite() {
            self.tick_seconds = 0.1;
        }
        self.tick_seconds = self.tick_seconds.clamp(0.01, 5.0);
        self.max_ticks = self.max_ticks.clamp(1, 10_000_000);

        // Combat
        self.combat.validate();
    }
}
