//! Tunables for the turn controller.

use serde::{Deserialize, Serialize};

use crate::events::DEFAULT_LOG_CAPACITY;
use crate::loot::SKILL_UNLOCK_CHANCE;
use crate::spawn::ELITE_WEIGHT;

/// Combat pacing and balance parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === Pacing ===
    /// Seconds between the player's action and the enemy's reply
    pub enemy_turn_delay: f64,
    /// Seconds after a kill before the next enemy may act
    pub post_kill_delay: f64,
    /// Seconds the player must wait between two actions
    pub player_action_cooldown: f64,

    // === Balance ===
    /// Flat defense granted by blocking, for one enemy attack
    pub block_defense_bonus: f64,
    /// Chance of a shop on waves that are not a multiple of 10
    pub shop_chance: f64,
    /// Spawn weight of elite enemies against normal ones (1.0)
    pub elite_weight: f64,
    /// Chance that a boss or miniboss kill teaches a skill
    pub skill_unlock_chance: f64,

    // === Output ===
    /// Combat log lines kept
    pub log_capacity: usize,
    /// Damage events buffered before new ones are dropped
    pub damage_event_capacity: usize,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            enemy_turn_delay: 0.9,
            post_kill_delay: 0.3,
            player_action_cooldown: 0.5,
            block_defense_bonus: 300.0,
            shop_chance: 0.1,
            elite_weight: ELITE_WEIGHT,
            skill_unlock_chance: SKILL_UNLOCK_CHANCE,
            log_capacity: DEFAULT_LOG_CAPACITY,
            damage_event_capacity: 256,
        }
    }
}

impl CombatConfig {
    /// Configuration without pacing delays, for tests and headless runs.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            enemy_turn_delay: 0.0,
            post_kill_delay: 0.0,
            player_action_cooldown: 0.0,
            ..Self::default()
        }
    }

    /// Validate and clamp values to sensible ranges.
    pub fn validate(&mut self) {
        let non_negative = |v: f64, fallback: f64| if v.is_finite() { v.max(0.0) } else { fallback };
        let chance = |v: f64, fallback: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback };

        // Pacing
        self.enemy_turn_delay = non_negative(self.enemy_turn_delay, 0.9).min(10.0);
        self.post_kill_delay = non_negative(self.post_kill_delay, 0.3).min(10.0);
        self.player_action_cooldown = non_negative(self.player_action_cooldown, 0.5).min(10.0);

        // Balance
        self.block_defense_bonus = non_negative(self.block_defense_bonus, 300.0);
        self.shop_chance = chance(self.shop_chance, 0.1);
        self.elite_weight = non_negative(self.elite_weight, ELITE_WEIGHT);
        self.skill_unlock_chance = chance(self.skill_unlock_chance, SKILL_UNLOCK_CHANCE);

        // Output
        self.log_capacity = self.log_capacity.clamp(1, 10_000);
        self.damage_event_capacity = self.damage_event_capacity.clamp(1, 65_536);
    }
}
