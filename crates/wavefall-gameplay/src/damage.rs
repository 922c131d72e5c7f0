//! Damage calculation system.
//!
//! This module provides:
//! - Elements and damage types
//! - The shared hit pipeline used by basic attacks, enemy attacks and skills

use serde::{Deserialize, Serialize};

use crate::crit::{roll_crit, CritRoll};
use crate::stats::{mitigate_damage, Stats};

// ============================================================================
// Elements
// ============================================================================

/// Element of a skill or an equipment damage bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    /// No element.
    #[default]
    Neutral,
    /// Physical damage.
    Physical,
    /// Fire damage.
    Fire,
    /// Ice/frost damage.
    Ice,
    /// Lightning/electric damage.
    Lightning,
    /// Poison damage.
    Poison,
    /// Holy/light damage.
    Holy,
    /// Dark/shadow damage.
    Dark,
    /// Arcane damage.
    Arcane,
}

impl Element {
    /// Check if this element is elemental (not neutral/physical).
    #[must_use]
    pub fn is_elemental(&self) -> bool {
        !matches!(self, Self::Neutral | Self::Physical)
    }
}

/// Which defense/penetration pair a hit is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Uses defense / penetration.
    #[default]
    Physical,
    /// Uses magic defense / magic penetration.
    #[serde(alias = "magic")]
    Magical,
}

impl DamageType {
    /// Defense value of `defender` that applies to this damage type.
    #[must_use]
    pub fn defense_of(self, defender: &Stats) -> f64 {
        match self {
            Self::Physical => defender.defense,
            Self::Magical => defender.magic_defense,
        }
    }

    /// Penetration value of `attacker` that applies to this damage type.
    #[must_use]
    pub fn penetration_of(self, attacker: &Stats) -> f64 {
        match self {
            Self::Physical => attacker.penetration,
            Self::Magical => attacker.magic_penetration,
        }
    }
}

// ============================================================================
// Hit Resolution
// ============================================================================

/// Result of resolving one hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    /// Final damage after mitigation.
    pub damage: u32,
    /// Raw damage before crit and mitigation.
    pub raw: f64,
    /// Crit outcome.
    pub crit: CritRoll,
}

impl HitResult {
    /// Whether the hit crit.
    #[must_use]
    pub fn is_crit(&self) -> bool {
        self.crit.is_crit
    }
}

/// Resolve a hit: crit roll, then mitigation against the matching defense.
///
/// `attacker` and `defender` are effective stat views (effects already
/// applied).
pub fn resolve_hit(
    raw: f64,
    attacker: &Stats,
    defender: &Stats,
    damage_type: DamageType,
    rng: &mut fastrand::Rng,
) -> HitResult {
    let crit = roll_crit(attacker.critchance, attacker.critdamage, rng);
    let boosted = raw * crit.multiplier;
    let damage = mitigate_damage(
        boosted,
        damage_type.defense_of(defender),
        damage_type.penetration_of(attacker),
    );
    HitResult { damage, raw, crit }
}
