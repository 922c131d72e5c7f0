//! The player character: base stats, equipment, progression and resources.
//!
//! Derived stats are never mutated cumulatively. Any change to base stats,
//! equipment or permanent upgrades goes through [`Player::recalculate_stats`],
//! which rebuilds them from scratch.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use wavefall_common::{CoreError, CoreResult, EntityId, ItemId, SkillId, UpgradeId};

use crate::catalog::{GameCatalog, ItemKind};
use crate::damage::Element;
use crate::inventory::Inventory;
use crate::stats::{Combatant, StatKind, Stats};

// ============================================================================
// Equipment Slots
// ============================================================================

/// Equipment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    /// Main weapon.
    Weapon,
    /// Body armor.
    Armor,
    /// Shield or secondary item.
    Offhand,
    /// First relic slot.
    Relic1,
    /// Second relic slot.
    Relic2,
    /// Third relic slot.
    Relic3,
}

impl EquipSlot {
    /// All slots in display order.
    pub const ALL: [Self; 6] = [
        Self::Weapon,
        Self::Armor,
        Self::Offhand,
        Self::Relic1,
        Self::Relic2,
        Self::Relic3,
    ];

    /// Slots that accept an item kind, in fill order.
    #[must_use]
    pub fn for_kind(kind: ItemKind) -> &'static [Self] {
        match kind {
            ItemKind::Weapon => &[Self::Weapon],
            ItemKind::Armor => &[Self::Armor],
            ItemKind::Offhand => &[Self::Offhand],
            ItemKind::Relic => &[Self::Relic1, Self::Relic2, Self::Relic3],
            ItemKind::Consumable | ItemKind::Material => &[],
        }
    }
}

// ============================================================================
// Progression constants
// ============================================================================

/// Points granted per level-up.
pub const POINTS_PER_LEVEL: u32 = 3;
/// Base max HP granted per level-up.
pub const MAX_HP_PER_LEVEL: f64 = 10.0;
/// Base max mana granted per level-up.
pub const MAX_MANA_PER_LEVEL: f64 = 5.0;
/// Starting max mana.
pub const STARTING_MAX_MANA: f64 = 50.0;
/// Starting mana regeneration per turn.
pub const STARTING_MANA_REGEN: f64 = 2.0;

/// XP needed to advance from `level` to `level + 1`.
#[must_use]
pub fn xp_for_level(level: u32) -> u64 {
    (100.0 * f64::from(level.max(1)).powf(1.5)).floor() as u64
}

/// Base stat gain for one allocated point, or `None` if the stat cannot be
/// trained directly.
#[must_use]
pub const fn point_value(stat: StatKind) -> Option<f64> {
    match stat {
        StatKind::Atk | StatKind::MagicPower => Some(2.0),
        StatKind::Defense | StatKind::MagicDefense => Some(1.0),
        StatKind::MaxHp => Some(15.0),
        StatKind::MaxMana => Some(10.0),
        StatKind::CritChance => Some(0.01),
        StatKind::DodgeChance => Some(0.005),
        _ => None,
    }
}

// ============================================================================
// Player
// ============================================================================

/// The player character for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Stable id for effect bookkeeping.
    #[serde(skip, default = "EntityId::new")]
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Canonical base stats (levelling and allocation write here).
    pub base: Stats,
    /// Derived stats; `stats.hp` is the current HP.
    #[serde(default)]
    pub stats: Stats,
    /// Character level (starts at 1).
    pub level: u32,
    /// XP towards the next level.
    pub xp: u64,
    /// Gold.
    pub gold: u64,
    /// Unspent stat points.
    pub unspent_points: u32,
    /// Item ledger.
    #[serde(default)]
    pub inventory: Inventory,
    /// Equipped items by slot.
    #[serde(default)]
    pub equipment: BTreeMap<EquipSlot, ItemId>,
    /// Unlocked skills.
    #[serde(default)]
    pub skills: BTreeSet<SkillId>,
    /// Per-skill level (absent = 1).
    #[serde(default)]
    pub skill_levels: BTreeMap<SkillId, u32>,
    /// Remaining cooldown turns per skill.
    #[serde(default)]
    pub skill_cooldowns: BTreeMap<SkillId, u32>,
    /// Current mana.
    pub current_mana: f64,
    /// Meta-currency for permanent upgrades.
    #[serde(default)]
    pub challenge_coins: u64,
    /// Purchased upgrade levels.
    #[serde(default)]
    pub permanent_upgrades: BTreeMap<UpgradeId, u32>,
    /// Seed for price drift and shop offers.
    pub game_seed: u64,
    /// Accumulated shop price increase (0.1 = +10%).
    #[serde(default)]
    pub cumulative_price_increase: f64,
    /// Element bonuses summed over equipment, refreshed on recalculation.
    #[serde(skip)]
    element_bonuses: AHashMap<Element, f64>,
}

impl Player {
    /// Creates a level 1 player at full health and mana.
    #[must_use]
    pub fn new(name: impl Into<String>, game_seed: u64) -> Self {
        let base = Stats {
            max_mana: STARTING_MAX_MANA,
            mana_regen: STARTING_MANA_REGEN,
            ..Stats::default()
        };
        Self {
            id: EntityId::new(),
            name: name.into(),
            stats: base.clone(),
            current_mana: base.max_mana,
            base,
            level: 1,
            xp: 0,
            gold: 0,
            unspent_points: 0,
            inventory: Inventory::new(),
            equipment: BTreeMap::new(),
            skills: BTreeSet::new(),
            skill_levels: BTreeMap::new(),
            skill_cooldowns: BTreeMap::new(),
            challenge_coins: 0,
            permanent_upgrades: BTreeMap::new(),
            game_seed,
            cumulative_price_increase: 0.0,
            element_bonuses: AHashMap::new(),
        }
    }

    // === Derived stats ===

    /// Rebuild derived stats from base + equipment + permanent upgrades.
    ///
    /// Idempotent. Current HP and mana are kept, clamped to the new maxima.
    pub fn recalculate_stats(&mut self, catalog: &GameCatalog) {
        let hp = self.stats.hp;

        let mut derived = self.base.clone();
        derived.add_all(&catalog.equipment_bonus(self.equipment.values()));
        for (id, &level) in &self.permanent_upgrades {
            if let Some(upgrade) = catalog.upgrade(id.as_str()) {
                derived.add(upgrade.stat, upgrade.per_level * f64::from(level));
            }
        }
        derived.hp = hp;
        derived.sanitize();
        self.stats = derived;

        self.element_bonuses.clear();
        for id in self.equipment.values() {
            if let Some(item) = catalog.item(id.as_str()) {
                for (&element, &bonus) in &item.damage_type_bonuses {
                    *self.element_bonuses.entry(element).or_insert(0.0) += bonus;
                }
            }
        }

        self.clamp_mana();
    }

    /// Maximum mana from derived stats.
    #[must_use]
    pub fn max_mana(&self) -> f64 {
        self.stats.max_mana
    }

    fn clamp_mana(&mut self) {
        if !self.current_mana.is_finite() {
            self.current_mana = 0.0;
        }
        self.current_mana = self.current_mana.clamp(0.0, self.max_mana().max(0.0));
    }

    /// Restore HP and mana to full.
    pub fn restore_full(&mut self) {
        self.stats.hp = self.stats.max_hp;
        self.current_mana = self.max_mana();
    }

    // === Progression ===

    /// Add XP and process every level-up it pays for. Returns levels gained.
    pub fn gain_xp(&mut self, amount: u64, catalog: &GameCatalog) -> u32 {
        self.xp = self.xp.saturating_add(amount);
        let mut gained = 0;
        loop {
            let needed = xp_for_level(self.level);
            if self.xp < needed {
                break;
            }
            self.xp -= needed;
            self.level += 1;
            self.unspent_points += POINTS_PER_LEVEL;
            self.base.max_hp += MAX_HP_PER_LEVEL;
            self.base.max_mana += MAX_MANA_PER_LEVEL;
            gained += 1;
        }

        if gained > 0 {
            self.recalculate_stats(catalog);
            self.restore_full();
            info!("{} reached level {}", self.name, self.level);
        }
        gained
    }

    /// Spend one unspent point on a base stat.
    pub fn allocate_point(&mut self, stat: StatKind, catalog: &GameCatalog) -> CoreResult<()> {
        let Some(value) = point_value(stat) else {
            return Err(CoreError::InvalidAction(format!(
                "{} cannot be trained",
                stat.label()
            )));
        };
        if self.unspent_points == 0 {
            return Err(CoreError::InsufficientResource("no unspent points".into()));
        }

        self.unspent_points -= 1;
        self.base.add(stat, value);
        self.recalculate_stats(catalog);
        // Raising a maximum also fills the new headroom.
        match stat {
            StatKind::MaxHp => {
                self.stats.heal(value);
            },
            StatKind::MaxMana => self.restore_mana(value),
            _ => {},
        }
        Ok(())
    }

    // === Equipment ===

    /// Item in a slot.
    #[must_use]
    pub fn equipped(&self, slot: EquipSlot) -> Option<&ItemId> {
        self.equipment.get(&slot)
    }

    /// Move an item from the inventory into its slot. A displaced item goes
    /// back to the inventory. Relics take the first free relic slot, or
    /// replace the first one when all are taken.
    pub fn equip(&mut self, item_id: &str, catalog: &GameCatalog) -> CoreResult<EquipSlot> {
        if !self.inventory.has(item_id, 1) {
            return Err(CoreError::InvalidAction(format!("{item_id} is not in the inventory")));
        }
        let item = catalog.require_item(item_id)?;
        let slots = EquipSlot::for_kind(item.kind);
        let slot = slots
            .iter()
            .copied()
            .find(|s| !self.equipment.contains_key(s))
            .or_else(|| slots.first().copied())
            .ok_or_else(|| CoreError::InvalidAction(format!("{item_id} cannot be equipped")))?;

        self.inventory.remove(item_id, 1)?;
        if let Some(previous) = self.equipment.insert(slot, item.id.clone()) {
            self.inventory.add(previous, 1);
        }
        self.recalculate_stats(catalog);
        debug!("Equipped {item_id} in {slot:?}");
        Ok(slot)
    }

    /// Move the item in `slot` back to the inventory.
    pub fn unequip(&mut self, slot: EquipSlot, catalog: &GameCatalog) -> CoreResult<ItemId> {
        let item = self
            .equipment
            .remove(&slot)
            .ok_or_else(|| CoreError::InvalidAction(format!("{slot:?} is empty")))?;
        self.inventory.add(item.clone(), 1);
        self.recalculate_stats(catalog);
        Ok(item)
    }

    // === Mana ===

    /// Deduct mana, failing without change if there is not enough.
    pub fn spend_mana(&mut self, amount: f64) -> CoreResult<()> {
        if amount > self.current_mana + f64::EPSILON {
            return Err(CoreError::InsufficientResource(format!(
                "need {amount} mana, have {}",
                self.current_mana.floor()
            )));
        }
        self.current_mana = (self.current_mana - amount.max(0.0)).max(0.0);
        Ok(())
    }

    /// Restore mana up to the maximum.
    pub fn restore_mana(&mut self, amount: f64) {
        if amount > 0.0 {
            self.current_mana += amount;
            self.clamp_mana();
        }
    }

    /// Apply per-turn HP and mana regeneration. Returns `(hp, mana)` gained.
    pub fn apply_regen(&mut self) -> (f64, f64) {
        let healed = self.stats.heal(self.stats.hp_regen);
        let before = self.current_mana;
        self.restore_mana(self.stats.mana_regen);
        (healed, self.current_mana - before)
    }

    // === Skills ===

    /// Whether a skill is unlocked.
    #[must_use]
    pub fn has_skill(&self, id: &str) -> bool {
        self.skills.contains(id)
    }

    /// Unlock a skill. Returns false if it was already known.
    pub fn learn_skill(&mut self, id: impl Into<SkillId>) -> bool {
        self.skills.insert(id.into())
    }

    /// Level of a skill (1 when never upgraded).
    #[must_use]
    pub fn skill_level(&self, id: &str) -> u32 {
        self.skill_levels.get(id).copied().unwrap_or(1).max(1)
    }

    /// Set a skill's level.
    pub fn set_skill_level(&mut self, id: impl Into<SkillId>, level: u32) {
        self.skill_levels.insert(id.into(), level.max(1));
    }

    /// Remaining cooldown of a skill.
    #[must_use]
    pub fn cooldown(&self, id: &str) -> u32 {
        self.skill_cooldowns.get(id).copied().unwrap_or(0)
    }

    /// Put a skill on cooldown.
    pub fn set_cooldown(&mut self, id: impl Into<SkillId>, turns: u32) {
        let id = id.into();
        if turns == 0 {
            self.skill_cooldowns.remove(&id);
        } else {
            self.skill_cooldowns.insert(id, turns);
        }
    }

    /// Decrement every cooldown by one turn.
    pub fn tick_cooldowns(&mut self) {
        self.skill_cooldowns.retain(|_, turns| {
            *turns = turns.saturating_sub(1);
            *turns > 0
        });
    }

    // === Consumables ===

    /// Consume one unit of a consumable. Returns `(hp, mana)` restored.
    pub fn use_consumable(&mut self, item_id: &str, catalog: &GameCatalog) -> CoreResult<(f64, f64)> {
        let item = catalog.require_item(item_id)?;
        if item.kind != ItemKind::Consumable {
            return Err(CoreError::InvalidAction(format!("{item_id} is not consumable")));
        }
        self.inventory.remove(item_id, 1)?;

        let healed = self.stats.heal(item.heal);
        let before = self.current_mana;
        self.restore_mana(item.mana);
        Ok((healed, self.current_mana - before))
    }

    // === Gold ===

    /// Add gold.
    pub fn earn_gold(&mut self, amount: u64) {
        self.gold = self.gold.saturating_add(amount);
    }
}

impl Combatant for Player {
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

    fn element_bonus(&self, element: Element) -> f64 {
        self.element_bonuses.get(&element).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogTables, ItemDef, UpgradeDef};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn item(id: &str, kind: ItemKind, stats: &[(StatKind, f64)]) -> ItemDef {
        ItemDef {
            id: ItemId::new(id),
            name: id.into(),
            kind,
            stats: stats.iter().copied().collect(),
            price: 10,
            droppable: false,
            dropped_by: Vec::new(),
            drop_chance: 0.0,
            damage_type_bonuses: HashMap::new(),
            heal: 0.0,
            mana: 0.0,
        }
    }

    fn catalog() -> GameCatalog {
        let mut flame = item("flame_ring", ItemKind::Relic, &[(StatKind::MagicPower, 3.0)]);
        flame.damage_type_bonuses.insert(Element::Fire, 20.0);
        let mut potion = item("potion", ItemKind::Consumable, &[]);
        potion.heal = 30.0;
        potion.mana = 10.0;
        GameCatalog::from_tables(CatalogTables {
            items: vec![
                item("sword", ItemKind::Weapon, &[(StatKind::Atk, 5.0)]),
                item("axe", ItemKind::Weapon, &[(StatKind::Atk, 8.0)]),
                item("plate", ItemKind::Armor, &[(StatKind::MaxHp, 50.0), (StatKind::Defense, 4.0)]),
                flame,
                potion,
                item("herb", ItemKind::Material, &[]),
            ],
            upgrades: vec![UpgradeDef {
                id: UpgradeId::new("might"),
                name: "Might".into(),
                stat: StatKind::Atk,
                cost: 1,
                max_level: 5,
                per_level: 1.5,
            }],
            ..CatalogTables::default()
        })
    }

    #[test]
    fn test_new_player_defaults() {
        let p = Player::new("Hero", 7);
        assert_eq!(p.level, 1);
        assert_eq!(p.stats.hp, 100.0);
        assert_eq!(p.current_mana, STARTING_MAX_MANA);
        assert_eq!(p.stats.critdamage, 1.5);
        assert_eq!(p.stats.gold_modifier, 1.0);
    }

    #[test]
    fn test_xp_curve() {
        assert_eq!(xp_for_level(1), 100);
        assert_eq!(xp_for_level(2), 282);
        assert_eq!(xp_for_level(4), 800);
    }

    #[test]
    fn test_gain_xp_multiple_levels() {
        let catalog = catalog();
        let mut p = Player::new("Hero", 1);
        p.stats.hp = 10.0;
        let gained = p.gain_xp(100 + 282 + 5, &catalog);
        assert_eq!(gained, 2);
        assert_eq!(p.level, 3);
        assert_eq!(p.xp, 5);
        assert_eq!(p.unspent_points, 6);
        assert_eq!(p.stats.max_hp, 120.0);
        assert_eq!(p.stats.hp, 120.0);
        assert_eq!(p.current_mana, STARTING_MAX_MANA + 10.0);
    }

    #[test]
    fn test_allocate_point() {
        let catalog = catalog();
        let mut p = Player::new("Hero", 1);
        assert!(matches!(
            p.allocate_point(StatKind::Atk, &catalog),
            Err(CoreError::InsufficientResource(_))
        ));
        p.unspent_points = 2;
        p.allocate_point(StatKind::Atk, &catalog).unwrap();
        assert_eq!(p.stats.atk, 12.0);
        p.allocate_point(StatKind::MaxHp, &catalog).unwrap();
        assert_eq!(p.stats.max_hp, 115.0);
        assert_eq!(p.stats.hp, 115.0);
        assert!(matches!(
            p.allocate_point(StatKind::Lifesteal, &catalog),
            Err(CoreError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_equip_swaps_and_recalculates() {
        let catalog = catalog();
        let mut p = Player::new("Hero", 1);
        p.inventory.add("sword", 1);
        p.inventory.add("axe", 1);

        assert_eq!(p.equip("sword", &catalog).unwrap(), EquipSlot::Weapon);
        assert_eq!(p.stats.atk, 15.0);
        assert_eq!(p.inventory.count("sword"), 0);

        p.equip("axe", &catalog).unwrap();
        assert_eq!(p.stats.atk, 18.0);
        assert_eq!(p.inventory.count("sword"), 1);
        assert_eq!(p.equipped(EquipSlot::Weapon).map(ItemId::as_str), Some("axe"));
    }

    #[test]
    fn test_equip_rejections() {
        let catalog = catalog();
        let mut p = Player::new("Hero", 1);
        assert!(matches!(p.equip("sword", &catalog), Err(CoreError::InvalidAction(_))));
        p.inventory.add("herb", 1);
        assert!(matches!(p.equip("herb", &catalog), Err(CoreError::InvalidAction(_))));
        assert_eq!(p.inventory.count("herb"), 1);
    }

    #[test]
    fn test_relics_fill_slots_in_order() {
        let catalog = catalog();
        let mut p = Player::new("Hero", 1);
        p.inventory.add("flame_ring", 2);
        assert_eq!(p.equip("flame_ring", &catalog).unwrap(), EquipSlot::Relic1);
        assert_eq!(p.equip("flame_ring", &catalog).unwrap(), EquipSlot::Relic2);
        assert_eq!(p.element_bonus(Element::Fire), 40.0);
        assert_eq!(p.element_bonus(Element::Ice), 0.0);
    }

    #[test]
    fn test_unequip_clamps_hp() {
        let catalog = catalog();
        let mut p = Player::new("Hero", 1);
        p.inventory.add("plate", 1);
        p.equip("plate", &catalog).unwrap();
        p.restore_full();
        assert_eq!(p.stats.hp, 150.0);
        p.unequip(EquipSlot::Armor, &catalog).unwrap();
        assert_eq!(p.stats.hp, 100.0);
        assert_eq!(p.inventory.count("plate"), 1);
    }

    #[test]
    fn test_upgrades_apply_per_level() {
        let catalog = catalog();
        let mut p = Player::new("Hero", 1);
        p.permanent_upgrades.insert(UpgradeId::new("might"), 2);
        p.recalculate_stats(&catalog);
        assert_eq!(p.stats.atk, 13.0);
    }

    #[test]
    fn test_use_consumable() {
        let catalog = catalog();
        let mut p = Player::new("Hero", 1);
        p.stats.hp = 50.0;
        p.current_mana = 45.0;
        p.inventory.add("potion", 1);
        let (hp, mana) = p.use_consumable("potion", &catalog).unwrap();
        assert_eq!(hp, 30.0);
        assert_eq!(mana, 5.0);
        assert!(matches!(
            p.use_consumable("potion", &catalog),
            Err(CoreError::InsufficientResource(_))
        ));
    }

    #[test]
    fn test_cooldowns_tick_and_clear() {
        let mut p = Player::new("Hero", 1);
        p.set_cooldown("fireball", 2);
        p.tick_cooldowns();
        assert_eq!(p.cooldown("fireball"), 1);
        p.tick_cooldowns();
        assert_eq!(p.cooldown("fireball"), 0);
        assert!(p.skill_cooldowns.is_empty());
    }

    #[test]
    fn test_spend_mana_insufficient() {
        let mut p = Player::new("Hero", 1);
        p.current_mana = 5.0;
        assert!(p.spend_mana(10.0).is_err());
        assert_eq!(p.current_mana, 5.0);
        p.spend_mana(5.0).unwrap();
        assert_eq!(p.current_mana, 0.0);
    }

    proptest! {
        #[test]
        fn prop_recalculate_is_idempotent(atk in 0.0f64..100.0, hp in 0.0f64..500.0, equip_plate in any::<bool>()) {
            let catalog = catalog();
            let mut p = Player::new("Hero", 1);
            p.base.atk = atk;
            p.stats.hp = hp;
            if equip_plate {
                p.inventory.add("plate", 1);
                p.equip("plate", &catalog).unwrap();
            }
            p.recalculate_stats(&catalog);
            let once = p.stats.clone();
            p.recalculate_stats(&catalog);
            prop_assert_eq!(&p.stats, &once);
            prop_assert!(p.stats.hp >= 0.0 && p.stats.hp <= p.stats.max_hp);
        }
    }
}
