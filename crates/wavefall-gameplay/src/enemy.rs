//! Enemy entities.

use serde::{Deserialize, Serialize};
use wavefall_common::{EnemyId, EntityId};

use crate::catalog::{Classification, DropEntry};
use crate::stats::{Combatant, Stats};

/// A concrete enemy for one wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    /// Stable id for effect bookkeeping.
    pub id: EntityId,
    /// Template it was generated from (None for the generic fallback).
    pub template_id: Option<EnemyId>,
    /// Display name, including the wave level.
    pub name: String,
    /// Rarity tier.
    pub classification: Classification,
    /// Faction/element tag.
    pub category: String,
    /// Scaled stats.
    pub stats: Stats,
    /// Gold reward.
    pub gold: u64,
    /// XP reward.
    pub xp: u64,
    /// Wave the enemy was scaled for.
    pub wave: u32,
    /// Loot table.
    pub drops: Vec<DropEntry>,
}

impl Enemy {
    /// Bosses and minibosses.
    #[must_use]
    pub fn is_boss(&self) -> bool {
        self.classification.is_boss()
    }

    /// Template id as a string (empty for the fallback enemy).
    #[must_use]
    pub fn template_key(&self) -> &str {
        self.template_id.as_ref().map_or("", EnemyId::as_str)
    }
}

impl Combatant for Enemy {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    fn category(&self) -> Option<&str> {
        if self.category.is_empty() {
            None
        } else {
            Some(&self.category)
        }
    }
}
