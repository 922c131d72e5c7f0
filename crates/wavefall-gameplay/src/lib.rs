//! # Wavefall Gameplay
//!
//! The simulation core for Wavefall.
//!
//! This crate provides the turn-based combat and progression systems:
//! - Stats, mitigation and overcrit
//! - Status effects (buffs, debuffs, counters, damage over time)
//! - Enemy generation and wave scaling
//! - Skills (multi-hit, elemental effectiveness, lifesteal)
//! - Player progression, equipment, inventory and crafting
//! - Loot, shop and challenge-coin economy
//! - The turn controller, its event streams and run snapshots

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod catalog;
pub mod combat;
pub mod config;
pub mod crafting;
pub mod crit;
pub mod damage;
pub mod economy;
pub mod effects;
pub mod enemy;
pub mod events;
pub mod inventory;
pub mod loot;
pub mod player;
pub mod skills;
pub mod snapshot;
pub mod spawn;
pub mod stats;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::catalog::*;
    pub use crate::combat::*;
    pub use crate::config::*;
    pub use crate::crafting::*;
    pub use crate::crit::*;
    pub use crate::damage::*;
    pub use crate::economy::*;
    pub use crate::effects::*;
    pub use crate::enemy::*;
    pub use crate::events::*;
    pub use crate::inventory::*;
    pub use crate::loot::*;
    pub use crate::player::*;
    pub use crate::skills::*;
    pub use crate::snapshot::*;
    pub use crate::spawn::*;
    pub use crate::stats::*;
}

pub use prelude::*;
