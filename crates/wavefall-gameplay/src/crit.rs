//! Critical hits and overcrit.
//!
//! Crit chance above 100% is not wasted: the excess ("overcrit") becomes
//! extra crit damage, plus a chance for the hit to deal triple damage on top
//! of the boosted multiplier.

use serde::{Deserialize, Serialize};

/// Multiplier applied on a triple-damage overcrit.
pub const TRIPLE_DAMAGE_MULTIPLIER: f64 = 3.0;

/// Fraction of overcrit converted into triple-damage chance.
pub const TRIPLE_CHANCE_PER_OVERCRIT: f64 = 0.5;

/// Expected crit behaviour for a given crit chance/damage pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CritProfile {
    /// Probability of a crit (capped at 1.0).
    pub crit_probability: f64,
    /// Multiplier on a regular crit.
    pub multiplier: f64,
    /// Probability that a crit becomes a triple-damage crit.
    pub triple_chance: f64,
}

impl CritProfile {
    /// Derive the profile from raw stats.
    #[must_use]
    pub fn from_stats(critchance: f64, critdamage: f64) -> Self {
        if critchance > 1.0 {
            let overcrit = critchance - 1.0;
            Self {
                crit_probability: 1.0,
                multiplier: critdamage + overcrit,
                triple_chance: (overcrit * TRIPLE_CHANCE_PER_OVERCRIT).min(1.0),
            }
        } else {
            Self {
                crit_probability: critchance.max(0.0),
                multiplier: critdamage,
                triple_chance: 0.0,
            }
        }
    }

    /// Whether the overcrit tier is engaged.
    #[must_use]
    pub fn is_overcrit(&self) -> bool {
        self.triple_chance > 0.0
    }
}

/// Outcome of a single crit roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CritRoll {
    /// Whether the hit crit.
    pub is_crit: bool,
    /// Whether the triple-damage overcrit fired.
    pub is_triple: bool,
    /// Damage multiplier to apply (1.0 when no crit).
    pub multiplier: f64,
}

impl CritRoll {
    /// A non-critical roll.
    pub const NONE: Self = Self {
        is_crit: false,
        is_triple: false,
        multiplier: 1.0,
    };
}

/// Roll a crit for one hit.
pub fn roll_crit(critchance: f64, critdamage: f64, rng: &mut fastrand::Rng) -> CritRoll {
    let profile = CritProfile::from_stats(critchance, critdamage);

    let is_crit = profile.crit_probability >= 1.0 || rng.f64() < profile.crit_probability;
    if !is_crit {
        return CritRoll::NONE;
    }

    if profile.is_overcrit() && rng.f64() < profile.triple_chance {
        return CritRoll {
            is_crit: true,
            is_triple: true,
            multiplier: profile.multiplier * TRIPLE_DAMAGE_MULTIPLIER,
        };
    }

    CritRoll {
        is_crit: true,
        is_triple: false,
        multiplier: profile.multiplier,
    }
}
