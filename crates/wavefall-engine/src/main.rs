//! # Wavefall
//!
//! Headless entry point: loads the configuration, the content catalog and
//! the saved run, then lets the autopilot play until the run ends or a limit
//! is reached.
//!
//! Usage: `wavefall [config.toml]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wavefall_engine::{
    Autopilot, AutopilotSettings, Autosave, CatalogLoader, EngineConfig, GameSession, SaveError, SaveManager,
    StopReason, CONFIG_FILE,
};
use wavefall_gameplay::{CombatController, Player};

/// Main entry point.
fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = EngineConfig::load_from(&config_path);

    // RUST_LOG wins over the configured filter
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)?,
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    info!("Wavefall starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let catalog = CatalogLoader::new(&config.catalog_dir).load();
    let saves = SaveManager::new(&config.save_dir, config.save_format);

    let game_seed = config.game_seed.unwrap_or_else(|| fastrand::u64(..));
    let rng = config.rng_seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
    let player = Player::new(config.player_name.as_str(), game_seed);

    let controller = match saves.load_bytes(&config.save_name) {
        Ok(bytes) => CombatController::resume_or_start(catalog, config.combat.clone(), &bytes, player, rng),
        Err(SaveError::SlotNotFound(_)) => {
            info!("No saved run in slot {}, starting fresh", config.save_name);
            CombatController::with_rng(catalog, config.combat.clone(), player, rng)
        },
        Err(e) => {
            warn!("Could not read saved run: {e}");
            CombatController::with_rng(catalog, config.combat.clone(), player, rng)
        },
    };

    let session = GameSession::new(controller);
    let mut autopilot = Autopilot::new(AutopilotSettings::from(&config));
    let summary = autopilot.run(
        &session,
        Some(Autosave {
            manager: &saves,
            slot: &config.save_name,
        }),
    );

    if summary.reason == StopReason::GameOver && saves.slot_exists(&config.save_name) {
        saves.delete_slot(&config.save_name)?;
    }

    info!(
        "Run ended on wave {} (best {}), level {}, {} gold",
        summary.wave, summary.highest_wave, summary.level, summary.gold
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("Wavefall shutdown complete");
    Ok(())
}
