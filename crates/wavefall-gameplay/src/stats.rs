//! Combat stats and the mitigation formula.
//!
//! This module provides:
//! - The shared stat block carried by players and enemies
//! - Per-stat deltas produced by active buffs and debuffs
//! - The [`Combatant`] capability trait
//! - Soft/hard capped defense mitigation

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use wavefall_common::EntityId;

use crate::damage::Element;

// ============================================================================
// Stat Kinds
// ============================================================================

/// Type of stat that can be modified by items, upgrades or effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Maximum HP.
    MaxHp,
    /// Physical attack power.
    #[serde(alias = "attack")]
    Atk,
    /// Physical defense.
    Defense,
    /// Magic power.
    MagicPower,
    /// Magic defense.
    MagicDefense,
    /// Physical penetration.
    Penetration,
    /// Magic penetration.
    MagicPenetration,
    /// Critical hit chance (1.0 = 100%, may exceed 1.0).
    #[serde(alias = "critchance")]
    CritChance,
    /// Critical hit damage multiplier.
    #[serde(alias = "critdamage")]
    CritDamage,
    /// Chance to dodge an incoming attack.
    #[serde(alias = "dodge")]
    DodgeChance,
    /// Fraction of damage dealt returned as healing.
    Lifesteal,
    /// HP restored at the start of each own turn.
    HpRegen,
    /// Maximum mana.
    MaxMana,
    /// Mana restored at the start of each own turn.
    ManaRegen,
    /// Gold reward multiplier.
    GoldModifier,
}

impl StatKind {
    /// All stat kinds, in display order.
    pub const ALL: [Self; 15] = [
        Self::MaxHp,
        Self::Atk,
        Self::Defense,
        Self::MagicPower,
        Self::MagicDefense,
        Self::Penetration,
        Self::MagicPenetration,
        Self::CritChance,
        Self::CritDamage,
        Self::DodgeChance,
        Self::Lifesteal,
        Self::HpRegen,
        Self::MaxMana,
        Self::ManaRegen,
        Self::GoldModifier,
    ];

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MaxHp => "Max HP",
            Self::Atk => "ATK",
            Self::Defense => "DEF",
            Self::MagicPower => "Magic Power",
            Self::MagicDefense => "Magic DEF",
            Self::Penetration => "Penetration",
            Self::MagicPenetration => "Magic Penetration",
            Self::CritChance => "Crit Chance",
            Self::CritDamage => "Crit Damage",
            Self::DodgeChance => "Dodge",
            Self::Lifesteal => "Lifesteal",
            Self::HpRegen => "HP Regen",
            Self::MaxMana => "Max Mana",
            Self::ManaRegen => "Mana Regen",
            Self::GoldModifier => "Gold Find",
        }
    }
}

// ============================================================================
// Stat Block
// ============================================================================

/// Core combat statistics shared by players and enemies.
///
/// Every field is always present; additive stats default to 0 and
/// multiplicative ones to their neutral value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Current health points.
    pub hp: f64,
    /// Maximum health points.
    pub max_hp: f64,
    /// Physical attack power.
    pub atk: f64,
    /// Physical defense.
    pub defense: f64,
    /// Magic power.
    pub magic_power: f64,
    /// Magic defense.
    pub magic_defense: f64,
    /// Physical penetration.
    pub penetration: f64,
    /// Magic penetration.
    pub magic_penetration: f64,
    /// Critical hit chance (1.0 = 100%).
    pub critchance: f64,
    /// Critical hit damage multiplier.
    pub critdamage: f64,
    /// Dodge chance (0.0-1.0).
    pub dodge_chance: f64,
    /// Lifesteal fraction.
    pub lifesteal: f64,
    /// HP regenerated per turn.
    pub hp_regen: f64,
    /// Maximum mana.
    pub max_mana: f64,
    /// Mana regenerated per turn.
    pub mana_regen: f64,
    /// Gold reward multiplier.
    pub gold_modifier: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            hp: 100.0,
            max_hp: 100.0,
            atk: 10.0,
            defense: 0.0,
            magic_power: 0.0,
            magic_defense: 0.0,
            penetration: 0.0,
            magic_penetration: 0.0,
            critchance: 0.05,
            critdamage: BASE_CRIT_DAMAGE,
            dodge_chance: 0.0,
            lifesteal: 0.0,
            hp_regen: 0.0,
            max_mana: 0.0,
            mana_regen: 0.0,
            gold_modifier: 1.0,
        }
    }
}

/// Base critical damage multiplier.
pub const BASE_CRIT_DAMAGE: f64 = 1.5;

impl Stats {
    /// Create stats with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zeroed block (every stat 0), used to accumulate bonuses.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            hp: 0.0,
            max_hp: 0.0,
            atk: 0.0,
            defense: 0.0,
            magic_power: 0.0,
            magic_defense: 0.0,
            penetration: 0.0,
            magic_penetration: 0.0,
            critchance: 0.0,
            critdamage: 0.0,
            dodge_chance: 0.0,
            lifesteal: 0.0,
            hp_regen: 0.0,
            max_mana: 0.0,
            mana_regen: 0.0,
            gold_modifier: 0.0,
        }
    }

    /// Set HP (current and maximum).
    #[must_use]
    pub fn with_hp(mut self, hp: f64) -> Self {
        self.hp = hp;
        self.max_hp = hp;
        self
    }

    /// Set attack power.
    #[must_use]
    pub fn with_atk(mut self, atk: f64) -> Self {
        self.atk = atk;
        self
    }

    /// Set defense value.
    #[must_use]
    pub fn with_defense(mut self, defense: f64) -> Self {
        self.defense = defense;
        self
    }

    /// Set magic power.
    #[must_use]
    pub fn with_magic_power(mut self, magic_power: f64) -> Self {
        self.magic_power = magic_power;
        self
    }

    /// Set crit chance and damage.
    #[must_use]
    pub fn with_crit(mut self, chance: f64, damage: f64) -> Self {
        self.critchance = chance;
        self.critdamage = damage;
        self
    }

    /// Read a stat by kind.
    #[must_use]
    pub fn get(&self, kind: StatKind) -> f64 {
        match kind {
            StatKind::MaxHp => self.max_hp,
            StatKind::Atk => self.atk,
            StatKind::Defense => self.defense,
            StatKind::MagicPower => self.magic_power,
            StatKind::MagicDefense => self.magic_defense,
            StatKind::Penetration => self.penetration,
            StatKind::MagicPenetration => self.magic_penetration,
            StatKind::CritChance => self.critchance,
            StatKind::CritDamage => self.critdamage,
            StatKind::DodgeChance => self.dodge_chance,
            StatKind::Lifesteal => self.lifesteal,
            StatKind::HpRegen => self.hp_regen,
            StatKind::MaxMana => self.max_mana,
            StatKind::ManaRegen => self.mana_regen,
            StatKind::GoldModifier => self.gold_modifier,
        }
    }

    /// Mutable access to a stat by kind.
    pub fn get_mut(&mut self, kind: StatKind) -> &mut f64 {
        match kind {
            StatKind::MaxHp => &mut self.max_hp,
            StatKind::Atk => &mut self.atk,
            StatKind::Defense => &mut self.defense,
            StatKind::MagicPower => &mut self.magic_power,
            StatKind::MagicDefense => &mut self.magic_defense,
            StatKind::Penetration => &mut self.penetration,
            StatKind::MagicPenetration => &mut self.magic_penetration,
            StatKind::CritChance => &mut self.critchance,
            StatKind::CritDamage => &mut self.critdamage,
            StatKind::DodgeChance => &mut self.dodge_chance,
            StatKind::Lifesteal => &mut self.lifesteal,
            StatKind::HpRegen => &mut self.hp_regen,
            StatKind::MaxMana => &mut self.max_mana,
            StatKind::ManaRegen => &mut self.mana_regen,
            StatKind::GoldModifier => &mut self.gold_modifier,
        }
    }

    /// Add a flat amount to a stat.
    pub fn add(&mut self, kind: StatKind, value: f64) {
        *self.get_mut(kind) += value;
    }

    /// Add every stat of `other` onto this block (hp excluded).
    pub fn add_all(&mut self, other: &Self) {
        for kind in StatKind::ALL {
            self.add(kind, other.get(kind));
        }
    }

    /// Returns a copy with effect deltas applied, for one damage calculation.
    #[must_use]
    pub fn with_deltas(&self, deltas: &StatDeltas) -> Self {
        let mut view = self.clone();
        for (kind, value) in deltas.iter() {
            view.add(kind, value);
        }
        view.sanitize();
        view
    }

    /// Clamp stats to sensible floors and keep hp inside `[0, max_hp]`.
    pub fn sanitize(&mut self) {
        self.max_hp = self.max_hp.max(1.0);
        self.atk = self.atk.max(0.0);
        self.defense = self.defense.max(0.0);
        self.magic_power = self.magic_power.max(0.0);
        self.magic_defense = self.magic_defense.max(0.0);
        self.penetration = self.penetration.max(0.0);
        self.magic_penetration = self.magic_penetration.max(0.0);
        self.critchance = self.critchance.max(0.0);
        self.critdamage = self.critdamage.max(1.0);
        self.dodge_chance = self.dodge_chance.clamp(0.0, MAX_DODGE_CHANCE);
        self.lifesteal = self.lifesteal.max(0.0);
        self.hp_regen = self.hp_regen.max(0.0);
        self.max_mana = self.max_mana.max(0.0);
        self.mana_regen = self.mana_regen.max(0.0);
        self.gold_modifier = self.gold_modifier.max(0.0);
        self.clamp_hp();
    }

    /// Keep hp inside `[0, max_hp]`.
    pub fn clamp_hp(&mut self) {
        if !self.hp.is_finite() {
            self.hp = 0.0;
        }
        self.hp = self.hp.clamp(0.0, self.max_hp.max(0.0));
    }

    /// Check if dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
    }

    /// Check if alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Get HP fraction (0.0-1.0).
    #[must_use]
    pub fn hp_fraction(&self) -> f64 {
        if self.max_hp <= 0.0 {
            0.0
        } else {
            (self.hp / self.max_hp).clamp(0.0, 1.0)
        }
    }

    /// Take damage (returns actual damage taken).
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let before = self.hp;
        self.hp = (self.hp - f64::from(amount)).max(0.0);
        self.clamp_hp();
        (before - self.hp).round() as u32
    }

    /// Heal HP (returns actual amount healed).
    pub fn heal(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 || !amount.is_finite() {
            return 0.0;
        }
        let before = self.hp;
        self.hp = (self.hp + amount).min(self.max_hp);
        self.clamp_hp();
        self.hp - before
    }
}

/// Dodge chance ceiling.
pub const MAX_DODGE_CHANCE: f64 = 0.75;

// ============================================================================
// Stat Deltas
// ============================================================================

/// Summed buff/debuff deltas per stat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatDeltas {
    values: AHashMap<StatKind, f64>,
}

impl StatDeltas {
    /// Create empty deltas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delta for a stat.
    pub fn add(&mut self, kind: StatKind, value: f64) {
        *self.values.entry(kind).or_insert(0.0) += value;
    }

    /// Get the delta for a stat (0 when absent).
    #[must_use]
    pub fn get(&self, kind: StatKind) -> f64 {
        self.values.get(&kind).copied().unwrap_or(0.0)
    }

    /// Check if no stat is modified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.values().all(|v| *v == 0.0)
    }

    /// Iterate over modified stats.
    pub fn iter(&self) -> impl Iterator<Item = (StatKind, f64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }
}

// ============================================================================
// Combatant
// ============================================================================

/// Capabilities shared by everything that fights: it has stats, takes damage
/// and is addressable by a stable id for effect bookkeeping.
pub trait Combatant {
    /// Stable entity id.
    fn id(&self) -> EntityId;

    /// Display name.
    fn name(&self) -> &str;

    /// Current derived stats.
    fn stats(&self) -> &Stats;

    /// Mutable derived stats.
    fn stats_mut(&mut self) -> &mut Stats;

    /// Faction/element tag used by skill effectiveness.
    fn category(&self) -> Option<&str> {
        None
    }

    /// Percent damage bonus for an element (from equipment).
    fn element_bonus(&self, _element: Element) -> f64 {
        0.0
    }

    /// Check if alive.
    fn is_alive(&self) -> bool {
        self.stats().is_alive()
    }

    /// Apply damage, returning the amount actually removed.
    fn take_damage(&mut self, amount: u32) -> u32 {
        self.stats_mut().take_damage(amount)
    }

    /// Heal, returning the amount actually restored.
    fn heal(&mut self, amount: f64) -> f64 {
        self.stats_mut().heal(amount)
    }
}

// ============================================================================
// Mitigation
// ============================================================================

/// Defense soft cap (1:1 below).
pub const DEFENSE_SOFT_CAP: f64 = 30.0;
/// Defense hard cap (no gain above).
pub const DEFENSE_HARD_CAP: f64 = 75.0;
/// Penetration soft cap.
pub const PENETRATION_SOFT_CAP: f64 = 50.0;
/// Penetration hard cap.
pub const PENETRATION_HARD_CAP: f64 = 75.0;
/// Conversion rate between the soft and hard caps.
pub const DIMINISHING_RATE: f64 = 0.5;

/// Apply soft/hard cap diminishing returns to a raw stat.
#[must_use]
pub fn soft_scale(raw: f64, soft_cap: f64, hard_cap: f64) -> f64 {
    let raw = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
    if raw <= soft_cap {
        raw
    } else if raw <= hard_cap {
        soft_cap + (raw - soft_cap) * DIMINISHING_RATE
    } else {
        soft_cap + (hard_cap - soft_cap) * DIMINISHING_RATE
    }
}

/// Final defense percentage (0-52.5) after penetration.
#[must_use]
pub fn final_defense_percent(defense: f64, penetration: f64) -> f64 {
    let defense_eff = soft_scale(defense, DEFENSE_SOFT_CAP, DEFENSE_HARD_CAP);
    let pen_eff = soft_scale(penetration, PENETRATION_SOFT_CAP, PENETRATION_HARD_CAP);
    defense_eff * (1.0 - pen_eff / 100.0)
}

/// Effective mitigation as a fraction in `[0, 1)`.
#[must_use]
pub fn effective_mitigation(defense: f64, penetration: f64) -> f64 {
    final_defense_percent(defense, penetration) / 100.0
}

/// Damage taken after mitigation. Positive raw damage always deals at least 1.
#[must_use]
pub fn mitigate_damage(raw_damage: f64, defense: f64, penetration: f64) -> u32 {
    if !raw_damage.is_finite() || raw_damage <= 0.0 {
        return 0;
    }
    let percent = final_defense_percent(defense, penetration);
    let taken = (raw_damage * (1.0 - percent / 100.0)).floor();
    taken.max(1.0).min(f64::from(u32::MAX)) as u32
}

// ============================================================================
// Tests
// ============================================================================
