//! Procedural enemy selection and wave scaling.

use std::sync::Arc;

use tracing::{debug, warn};
use wavefall_common::EntityId;

use crate::catalog::{Classification, EnemyDef, GameCatalog};
use crate::enemy::Enemy;
use crate::stats::{Stats, BASE_CRIT_DAMAGE};

/// Bosses appear on multiples of this wave.
pub const BOSS_WAVE_INTERVAL: u32 = 10;
/// Minibosses appear on multiples of this wave.
pub const MINIBOSS_WAVE_INTERVAL: u32 = 5;
/// Spawn weight of a normal enemy.
pub const NORMAL_WEIGHT: f64 = 1.0;
/// Default spawn weight of an elite enemy.
pub const ELITE_WEIGHT: f64 = 0.15;
/// Per-wave growth multiplier kept by non-boss classifications.
pub const NON_BOSS_SCALING_FACTOR: f64 = 0.6;
/// Per-wave growth of defense and magic defense.
pub const DEFENSE_SCALING: f64 = 0.015;
/// Per-wave growth of gold rewards.
pub const GOLD_SCALING: f64 = 0.05;
/// Per-wave growth of xp rewards.
pub const XP_SCALING: f64 = 0.06;
/// Waves between flat bonus steps.
pub const FLAT_BONUS_INTERVAL: u32 = 5;

/// Scale a base stat for a wave.
///
/// `max(1, round(base * (1 + pct * wave) + floor(wave / 5) * flat))`, where
/// `pct` is reduced by 40% for normal and elite enemies.
#[must_use]
pub fn scale_stat(
    base: f64,
    per_wave_pct: f64,
    wave: u32,
    flat_bonus: f64,
    classification: Classification,
) -> f64 {
    let pct = if classification.is_boss() {
        per_wave_pct
    } else {
        per_wave_pct * NON_BOSS_SCALING_FACTOR
    };
    let steps = f64::from(wave / FLAT_BONUS_INTERVAL);
    let scaled = base * (1.0 + pct * f64::from(wave)) + steps * flat_bonus;
    scaled.round().max(1.0)
}

/// Scale a gold reward.
#[must_use]
pub fn scale_gold(base: f64, wave: u32) -> u64 {
    (base.max(0.0) * (1.0 + f64::from(wave) * GOLD_SCALING)).round() as u64
}

/// Scale an xp reward.
#[must_use]
pub fn scale_xp(base: f64, wave: u32) -> u64 {
    (base.max(0.0) * (1.0 + f64::from(wave) * XP_SCALING)).round() as u64
}

/// Build a concrete enemy from a template.
#[must_use]
pub fn spawn_from(def: &EnemyDef, wave: u32) -> Enemy {
    let class = def.classification;
    let hp = scale_stat(def.hp_base, def.hp_scaling, wave, def.hp_flat_bonus, class);
    let stats = Stats {
        hp,
        max_hp: hp,
        atk: scale_stat(def.atk_base, def.atk_scaling, wave, def.atk_flat_bonus, class),
        defense: scale_stat(def.def_base, DEFENSE_SCALING, wave, 0.0, class),
        magic_defense: scale_stat(def.magic_def_base, DEFENSE_SCALING, wave, 0.0, class),
        penetration: def.pen_base.max(0.0),
        critchance: def.critchance,
        critdamage: BASE_CRIT_DAMAGE,
        dodge_chance: def.dodge_chance,
        ..Stats::zeroed()
    };

    Enemy {
        id: EntityId::new(),
        template_id: Some(def.id.clone()),
        name: format!("{} Lv.{wave}", def.name),
        classification: class,
        category: def.category.clone(),
        stats,
        gold: scale_gold(def.gold_base, wave),
        xp: scale_xp(def.xp_base, wave),
        wave,
        drops: def.drops.clone(),
    }
}

/// Generic enemy used when no catalog data is available.
#[must_use]
pub fn fallback_slime(wave: u32) -> Enemy {
    let w = f64::from(wave);
    let hp = 20.0 + w * 5.0;
    Enemy {
        id: EntityId::new(),
        template_id: None,
        name: format!("Slime Lv.{wave}"),
        classification: Classification::Normal,
        category: String::new(),
        stats: Stats {
            hp,
            max_hp: hp,
            atk: 5.0 + w * 2.0,
            defense: (w / 2.0).floor(),
            critdamage: BASE_CRIT_DAMAGE,
            gold_modifier: 1.0,
            ..Stats::zeroed()
        },
        gold: 10 + u64::from(wave) * 3,
        xp: 10 + u64::from(wave) * 4,
        wave,
        drops: Vec::new(),
    }
}

/// Selects and scales enemies for waves.
#[derive(Debug, Clone)]
pub struct EnemyGenerator {
    catalog: Arc<GameCatalog>,
    elite_weight: f64,
}

impl EnemyGenerator {
    /// Create a generator over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<GameCatalog>) -> Self {
        Self {
            catalog,
            elite_weight: ELITE_WEIGHT,
        }
    }

    /// Override the elite spawn weight.
    #[must_use]
    pub fn with_elite_weight(mut self, weight: f64) -> Self {
        self.elite_weight = weight.max(0.0);
        self
    }

    /// Produce an enemy for `wave`, optionally restricted to zone categories.
    pub fn random_enemy(
        &self,
        wave: u32,
        allowed_categories: Option<&[String]>,
        rng: &mut fastrand::Rng,
    ) -> Enemy {
        match self.select_template(wave, allowed_categories, rng) {
            Some(def) => {
                debug!("Wave {wave}: spawning {} ({:?})", def.id, def.classification);
                spawn_from(def, wave)
            },
            None => {
                warn!("Wave {wave}: no enemy data available, spawning fallback slime");
                fallback_slime(wave)
            },
        }
    }

    /// Pick a template following the boss / miniboss / weighted-pool policy.
    fn select_template(
        &self,
        wave: u32,
        allowed_categories: Option<&[String]>,
        rng: &mut fastrand::Rng,
    ) -> Option<&EnemyDef> {
        let enemies = self.catalog.enemies();
        let pool = |class: Classification| -> Vec<&EnemyDef> {
            enemies
                .iter()
                .filter(|e| e.classification == class)
                .filter(|e| e.is_eligible(wave) && e.is_allowed(allowed_categories))
                .collect()
        };

        if wave % BOSS_WAVE_INTERVAL == 0 {
            let bosses = pool(Classification::Boss);
            if !bosses.is_empty() {
                return Some(bosses[rng.usize(..bosses.len())]);
            }
        }
        if wave % MINIBOSS_WAVE_INTERVAL == 0 {
            let minibosses = pool(Classification::Miniboss);
            if !minibosses.is_empty() {
                return Some(minibosses[rng.usize(..minibosses.len())]);
            }
        }

        let weighted: Vec<(&EnemyDef, f64)> = pool(Classification::Normal)
            .into_iter()
            .map(|e| (e, NORMAL_WEIGHT))
            .chain(
                pool(Classification::Elite)
                    .into_iter()
                    .map(|e| (e, self.elite_weight)),
            )
            .filter(|(_, w)| *w > 0.0)
            .collect();
        if let Some(def) = pick_weighted(&weighted, rng) {
            return Some(def);
        }

        // Ignore wave range and zone filters before giving up on the catalog.
        let normals: Vec<&EnemyDef> = enemies
            .iter()
            .filter(|e| e.classification == Classification::Normal)
            .collect();
        if normals.is_empty() {
            None
        } else {
            Some(normals[rng.usize(..normals.len())])
        }
    }
}

/// Sample proportionally to weight.
fn pick_weighted<'a>(entries: &[(&'a EnemyDef, f64)], rng: &mut fastrand::Rng) -> Option<&'a EnemyDef> {
    let total: f64 = entries.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let mut roll = rng.f64() * total;
    for (def, weight) in entries {
        if roll < *weight {
            return Some(def);
        }
        roll -= weight;
    }
    entries.last().map(|(def, _)| *def)
}
