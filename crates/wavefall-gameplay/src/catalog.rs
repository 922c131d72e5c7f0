//! Read-only content catalog.
//!
//! The catalog is built once (usually by the engine's loader) and then shared
//! behind an `Arc` by every system that needs lookups. Nothing in the
//! simulation mutates it.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;
use wavefall_common::{
    CoreError, CoreResult, EnemyId, EntityId, ItemId, RecipeId, SkillId, UpgradeId, ZoneId,
};

use crate::damage::{DamageType, Element};
use crate::effects::{Effect, EffectKind};
use crate::stats::{StatKind, Stats};

// ============================================================================
// Enemies
// ============================================================================

/// Enemy rarity/role tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Regular enemy.
    #[default]
    Normal,
    /// Rare, stronger enemy.
    Elite,
    /// Mid-tier boss (every 5th wave).
    #[serde(alias = "mini_boss")]
    Miniboss,
    /// Boss (every 10th wave).
    Boss,
}

impl Classification {
    /// Bosses and minibosses count as bosses for rewards and scaling.
    #[must_use]
    pub const fn is_boss(self) -> bool {
        matches!(self, Self::Boss | Self::Miniboss)
    }
}

/// A loot table entry on an enemy template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEntry {
    /// Item dropped.
    pub item_id: ItemId,
    /// Drop chance (0.0-1.0).
    #[serde(default)]
    pub chance: f64,
    /// Minimum quantity.
    #[serde(default = "default_one")]
    pub qty_min: u32,
    /// Maximum quantity.
    #[serde(default = "default_one")]
    pub qty_max: u32,
}

const fn default_one() -> u32 {
    1
}

/// Enemy template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyDef {
    /// Template id.
    pub id: EnemyId,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    #[serde(default)]
    pub classification: Classification,
    /// Faction/element tag.
    #[serde(default)]
    pub category: String,
    /// Base HP.
    pub hp_base: f64,
    /// Base attack.
    pub atk_base: f64,
    /// Base defense.
    #[serde(default)]
    pub def_base: f64,
    /// Base magic defense.
    #[serde(default)]
    pub magic_def_base: f64,
    /// Penetration (does not scale with wave).
    #[serde(default)]
    pub pen_base: f64,
    /// Base gold reward.
    #[serde(default)]
    pub gold_base: f64,
    /// Base xp reward.
    #[serde(default)]
    pub xp_base: f64,
    /// First eligible wave (0 = unbounded).
    #[serde(default)]
    pub min_wave: u32,
    /// Last eligible wave (0 = unbounded).
    #[serde(default)]
    pub max_wave: u32,
    /// Only spawns on multiples of this wave (0 = any wave).
    #[serde(default)]
    pub spawn_on_wave_multiple_of: u32,
    /// HP growth per wave.
    #[serde(default = "default_hp_scaling")]
    pub hp_scaling: f64,
    /// ATK growth per wave.
    #[serde(default = "default_atk_scaling")]
    pub atk_scaling: f64,
    /// Flat HP added every 5 waves.
    #[serde(default)]
    pub hp_flat_bonus: f64,
    /// Flat ATK added every 5 waves.
    #[serde(default)]
    pub atk_flat_bonus: f64,
    /// Crit chance.
    #[serde(default = "default_enemy_crit")]
    pub critchance: f64,
    /// Dodge chance.
    #[serde(default)]
    pub dodge_chance: f64,
    /// Loot table.
    #[serde(default)]
    pub drops: Vec<DropEntry>,
}

fn default_hp_scaling() -> f64 {
    0.10
}

fn default_atk_scaling() -> f64 {
    0.08
}

fn default_enemy_crit() -> f64 {
    0.05
}

impl EnemyDef {
    /// Check wave-range and divisibility eligibility.
    #[must_use]
    pub fn is_eligible(&self, wave: u32) -> bool {
        if self.min_wave != 0 && wave < self.min_wave {
            return false;
        }
        if self.max_wave != 0 && wave > self.max_wave {
            return false;
        }
        if self.spawn_on_wave_multiple_of != 0 && wave % self.spawn_on_wave_multiple_of != 0 {
            return false;
        }
        true
    }

    /// Check the zone category filter.
    #[must_use]
    pub fn is_allowed(&self, allowed_categories: Option<&[String]>) -> bool {
        allowed_categories.map_or(true, |allowed| {
            allowed.iter().any(|c| c.eq_ignore_ascii_case(&self.category))
        })
    }
}

// ============================================================================
// Items
// ============================================================================

/// Kind of item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Equips into the weapon slot.
    Weapon,
    /// Equips into the armor slot.
    Armor,
    /// Equips into the offhand slot.
    Offhand,
    /// Equips into one of the relic slots.
    Relic,
    /// Single-use restoration item.
    Consumable,
    /// Crafting material.
    #[default]
    Material,
}

impl ItemKind {
    /// Whether items of this kind can be equipped.
    #[must_use]
    pub const fn is_equippable(self) -> bool {
        matches!(
            self,
            Self::Weapon | Self::Armor | Self::Offhand | Self::Relic
        )
    }
}

/// Item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    /// Item id.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Item kind.
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: ItemKind,
    /// Flat stat bonuses while equipped.
    #[serde(default)]
    pub stats: HashMap<StatKind, f64>,
    /// Base shop price in gold (0 = not sold).
    #[serde(default)]
    pub price: u64,
    /// Whether the item can drop from enemies.
    #[serde(default)]
    pub droppable: bool,
    /// Enemy ids or categories that drop this item.
    #[serde(default)]
    pub dropped_by: Vec<String>,
    /// Drop chance when dropped by a matching enemy.
    #[serde(default)]
    pub drop_chance: f64,
    /// Percent damage bonus per element.
    #[serde(default)]
    pub damage_type_bonuses: HashMap<Element, f64>,
    /// HP restored when consumed.
    #[serde(default)]
    pub heal: f64,
    /// Mana restored when consumed.
    #[serde(default)]
    pub mana: f64,
}

impl ItemDef {
    /// Bonus for one stat.
    #[must_use]
    pub fn bonus(&self, stat: StatKind) -> f64 {
        self.stats.get(&stat).copied().unwrap_or(0.0)
    }

    /// Whether an enemy with this id/category can drop the item.
    #[must_use]
    pub fn is_dropped_by(&self, enemy_id: &str, category: &str) -> bool {
        self.droppable
            && self
                .dropped_by
                .iter()
                .any(|d| d == enemy_id || (!category.is_empty() && d.eq_ignore_ascii_case(category)))
    }
}

// ============================================================================
// Skills
// ============================================================================

/// What a skill does on cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    /// Deals damage to the enemy.
    #[default]
    Damage,
    /// Restores caster HP.
    Heal,
    /// Only applies effects.
    #[serde(alias = "buff", alias = "debuff")]
    Support,
}

/// Multi-hit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiHit {
    /// Number of hits.
    pub hits: u32,
    /// Fraction of power per hit.
    #[serde(alias = "damage_per_hit")]
    pub damage_fraction: f64,
}

/// Category lists for skill effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Effectiveness {
    /// Categories taking 1.5x damage.
    #[serde(default)]
    pub strong_vs: Vec<String>,
    /// Categories taking 0.5x damage.
    #[serde(default)]
    pub weak_vs: Vec<String>,
}

/// Multiplier when the target is in `strong_vs`.
pub const STRONG_MULTIPLIER: f64 = 1.5;
/// Multiplier when the target is in `weak_vs`.
pub const WEAK_MULTIPLIER: f64 = 0.5;

impl Effectiveness {
    /// Damage multiplier against a target category.
    #[must_use]
    pub fn multiplier(&self, category: Option<&str>) -> f64 {
        let Some(category) = category else {
            return 1.0;
        };
        if self.strong_vs.iter().any(|c| c.eq_ignore_ascii_case(category)) {
            STRONG_MULTIPLIER
        } else if self.weak_vs.iter().any(|c| c.eq_ignore_ascii_case(category)) {
            WEAK_MULTIPLIER
        } else {
            1.0
        }
    }
}

/// Effect variant tag as authored in content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTag {
    /// Stat increase on the caster.
    Buff,
    /// Stat decrease on the target.
    Debuff,
    /// Damage reflection on the caster.
    Counter,
    /// Damage over time on the target.
    #[serde(alias = "damage_over_time")]
    Dot,
}

/// Effect as authored on a skill. Fields are optional so that one malformed
/// effect degrades only itself, not the whole skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    /// Variant.
    #[serde(rename = "type")]
    pub tag: EffectTag,
    /// Stat for buffs/debuffs.
    #[serde(default)]
    pub stat: Option<StatKind>,
    /// Value for buffs/debuffs.
    #[serde(default)]
    pub value: Option<f64>,
    /// Duration in owner turns.
    #[serde(default)]
    pub duration: Option<i32>,
    /// Base per-tick damage for DoTs.
    #[serde(default)]
    pub damage: Option<f64>,
    /// DoT damage type.
    #[serde(default)]
    pub damage_type: DamageType,
    /// Reflected fraction for counters.
    #[serde(default)]
    pub damage_percent: Option<f64>,
}

/// Default counter duration.
pub const DEFAULT_COUNTER_DURATION: i32 = 2;

impl EffectSpec {
    /// Whether the effect lands on the caster (otherwise on the target).
    #[must_use]
    pub const fn targets_caster(&self) -> bool {
        matches!(self.tag, EffectTag::Buff | EffectTag::Counter)
    }

    /// Build a concrete effect for `target`.
    pub fn to_effect(&self, target: EntityId, source: &str) -> CoreResult<Effect> {
        let missing =
            |field: &str| CoreError::ContentDataMissing(format!("{source}: effect missing `{field}`"));

        let kind = match self.tag {
            EffectTag::Buff => EffectKind::Buff {
                stat: self.stat.ok_or_else(|| missing("stat"))?,
                value: self.value.ok_or_else(|| missing("value"))?,
            },
            EffectTag::Debuff => EffectKind::Debuff {
                stat: self.stat.ok_or_else(|| missing("stat"))?,
                value: self.value.ok_or_else(|| missing("value"))?,
            },
            EffectTag::Counter => EffectKind::Counter {
                damage_percent: self.damage_percent.ok_or_else(|| missing("damage_percent"))?,
            },
            EffectTag::Dot => EffectKind::DamageOverTime {
                damage: self.damage.ok_or_else(|| missing("damage"))?,
                damage_type: self.damage_type,
            },
        };

        let duration = match (self.tag, self.duration) {
            (_, Some(d)) => d,
            (EffectTag::Counter, None) => DEFAULT_COUNTER_DURATION,
            (_, None) => return Err(missing("duration")),
        };

        Ok(Effect::new(target, kind, duration, source))
    }
}

/// Skill definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    /// Skill id.
    pub id: SkillId,
    /// Display name.
    pub name: String,
    /// Behaviour on cast.
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: SkillKind,
    /// Base power.
    #[serde(default)]
    pub power: f64,
    /// Stat added to power.
    #[serde(default = "default_scaling_stat")]
    pub scaling_stat: StatKind,
    /// Element for equipment bonuses.
    #[serde(default)]
    pub element: Element,
    /// Base mana cost.
    #[serde(default)]
    pub mana_cost: f64,
    /// Cooldown in player turns.
    #[serde(default)]
    pub cooldown: u32,
    /// Multi-hit configuration.
    #[serde(default)]
    pub multi_hit: Option<MultiHit>,
    /// Effects applied once after resolution.
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
    /// Strong/weak category lists.
    #[serde(default)]
    pub effectiveness: Option<Effectiveness>,
    /// Minimum player level to learn it from a boss.
    #[serde(default)]
    pub required_level: u32,
}

const fn default_scaling_stat() -> StatKind {
    StatKind::Atk
}

impl SkillDef {
    /// Damage type derived from the scaling stat.
    #[must_use]
    pub fn damage_type(&self) -> DamageType {
        if self.scaling_stat == StatKind::MagicPower {
            DamageType::Magical
        } else {
            DamageType::Physical
        }
    }
}

// ============================================================================
// Recipes, Zones, Upgrades
// ============================================================================

/// Recipe ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Item consumed.
    pub item_id: ItemId,
    /// Quantity consumed.
    pub quantity: u32,
}

impl Ingredient {
    /// Creates a new ingredient requirement.
    #[must_use]
    pub fn new(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// Crafting recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDef {
    /// Recipe id.
    pub id: RecipeId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Minimum player level.
    #[serde(default)]
    pub required_level: u32,
    /// Ingredients, in check order.
    pub ingredients: Vec<Ingredient>,
    /// Produced item.
    pub result: ItemId,
    /// Produced quantity.
    #[serde(default = "default_one")]
    pub result_quantity: u32,
}

/// Zone definition restricting enemy categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDef {
    /// Zone id.
    pub id: ZoneId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Enemy categories that may spawn.
    pub allowed_categories: Vec<String>,
    /// First wave the zone can be active.
    #[serde(default)]
    pub min_wave: u32,
    /// Chance per wave that the zone becomes active.
    #[serde(default = "default_spawn_chance")]
    pub spawn_chance: f64,
}

fn default_spawn_chance() -> f64 {
    1.0
}

/// Permanent upgrade bought with challenge coins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    /// Upgrade id.
    pub id: UpgradeId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Stat improved.
    pub stat: StatKind,
    /// Challenge coins per level.
    pub cost: u64,
    /// Maximum level.
    pub max_level: u32,
    /// Bonus per level.
    pub per_level: f64,
}

// ============================================================================
// Catalog
// ============================================================================

/// Raw catalog tables, as loaded from content files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogTables {
    /// Enemy templates.
    pub enemies: Vec<EnemyDef>,
    /// Items.
    pub items: Vec<ItemDef>,
    /// Skills.
    pub skills: Vec<SkillDef>,
    /// Recipes.
    pub recipes: Vec<RecipeDef>,
    /// Zones.
    pub zones: Vec<ZoneDef>,
    /// Upgrades.
    pub upgrades: Vec<UpgradeDef>,
}

/// Immutable, indexed content catalog.
#[derive(Debug, Clone, Default)]
pub struct GameCatalog {
    tables: CatalogTables,
    items_by_id: AHashMap<ItemId, usize>,
    skills_by_id: AHashMap<SkillId, usize>,
    recipes_by_id: AHashMap<RecipeId, usize>,
    upgrades_by_id: AHashMap<UpgradeId, usize>,
}

impl GameCatalog {
    /// Creates an empty catalog (every lookup falls back).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build and index a catalog from raw tables. Duplicate ids keep the first
    /// definition.
    #[must_use]
    pub fn from_tables(tables: CatalogTables) -> Self {
        fn index<K, T>(rows: &[T], key: impl Fn(&T) -> &K, table: &str) -> AHashMap<K, usize>
        where
            K: Clone + Eq + std::hash::Hash + std::fmt::Display,
        {
            let mut map = AHashMap::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                let id = key(row);
                if map.contains_key(id) {
                    warn!("Duplicate {table} id `{id}`, keeping first definition");
                    continue;
                }
                map.insert(id.clone(), i);
            }
            map
        }

        let items_by_id = index(&tables.items, |i| &i.id, "item");
        let skills_by_id = index(&tables.skills, |s| &s.id, "skill");
        let recipes_by_id = index(&tables.recipes, |r| &r.id, "recipe");
        let upgrades_by_id = index(&tables.upgrades, |u| &u.id, "upgrade");

        Self {
            tables,
            items_by_id,
            skills_by_id,
            recipes_by_id,
            upgrades_by_id,
        }
    }

    /// Raw tables.
    #[must_use]
    pub fn tables(&self) -> &CatalogTables {
        &self.tables
    }

    /// Whether no content at all is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.enemies.is_empty()
            && self.tables.items.is_empty()
            && self.tables.skills.is_empty()
            && self.tables.recipes.is_empty()
    }

    /// All enemy templates.
    #[must_use]
    pub fn enemies(&self) -> &[EnemyDef] {
        &self.tables.enemies
    }

    /// All items.
    #[must_use]
    pub fn items(&self) -> &[ItemDef] {
        &self.tables.items
    }

    /// All skills.
    #[must_use]
    pub fn skills(&self) -> &[SkillDef] {
        &self.tables.skills
    }

    /// All recipes.
    #[must_use]
    pub fn recipes(&self) -> &[RecipeDef] {
        &self.tables.recipes
    }

    /// All zones.
    #[must_use]
    pub fn zones(&self) -> &[ZoneDef] {
        &self.tables.zones
    }

    /// All upgrades.
    #[must_use]
    pub fn upgrades(&self) -> &[UpgradeDef] {
        &self.tables.upgrades
    }

    /// Look up an item.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items_by_id.get(id).map(|&i| &self.tables.items[i])
    }

    /// Look up a skill.
    #[must_use]
    pub fn skill(&self, id: &str) -> Option<&SkillDef> {
        self.skills_by_id.get(id).map(|&i| &self.tables.skills[i])
    }

    /// Look up a recipe.
    #[must_use]
    pub fn recipe(&self, id: &str) -> Option<&RecipeDef> {
        self.recipes_by_id.get(id).map(|&i| &self.tables.recipes[i])
    }

    /// Look up an upgrade.
    #[must_use]
    pub fn upgrade(&self, id: &str) -> Option<&UpgradeDef> {
        self.upgrades_by_id.get(id).map(|&i| &self.tables.upgrades[i])
    }

    /// Look up an item or report it as missing content.
    pub fn require_item(&self, id: &str) -> CoreResult<&ItemDef> {
        self.item(id)
            .ok_or_else(|| CoreError::ContentDataMissing(format!("item `{id}`")))
    }

    /// Look up a skill or report it as missing content.
    pub fn require_skill(&self, id: &str) -> CoreResult<&SkillDef> {
        self.skill(id)
            .ok_or_else(|| CoreError::ContentDataMissing(format!("skill `{id}`")))
    }

    /// Sum of equipment bonuses for a set of equipped item ids. Unknown ids
    /// contribute nothing.
    #[must_use]
    pub fn equipment_bonus<'a>(&self, equipped: impl IntoIterator<Item = &'a ItemId>) -> Stats {
        let mut total = Stats::zeroed();
        for id in equipped {
            if let Some(item) = self.item(id.as_str()) {
                for (&stat, &value) in &item.stats {
                    total.add(stat, value);
                }
            }
        }
        total
    }

    /// Report dangling references between tables.
    #[must_use]
    pub fn validate(&self) -> Vec<CoreError> {
        let mut problems = Vec::new();

        for enemy in &self.tables.enemies {
            for drop in &enemy.drops {
                if self.item(drop.item_id.as_str()).is_none() {
                    problems.push(CoreError::ContentDataMissing(format!(
                        "enemy `{}` drops unknown item `{}`",
                        enemy.id, drop.item_id
                    )));
                }
            }
        }

        for recipe in &self.tables.recipes {
            let unknown = recipe
                .ingredients
                .iter()
                .map(|i| &i.item_id)
                .chain(std::iter::once(&recipe.result))
                .filter(|id| self.item(id.as_str()).is_none());
            for id in unknown {
                problems.push(CoreError::ContentDataMissing(format!(
                    "recipe `{}` references unknown item `{id}`",
                    recipe.id
                )));
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword() -> ItemDef {
        ItemDef {
            id: ItemId::new("iron_sword"),
            name: "Iron Sword".into(),
            kind: ItemKind::Weapon,
            stats: HashMap::from([(StatKind::Atk, 5.0), (StatKind::CritChance, 0.02)]),
            price: 50,
            droppable: true,
            dropped_by: vec!["goblin".into()],
            drop_chance: 0.1,
            damage_type_bonuses: HashMap::new(),
            heal: 0.0,
            mana: 0.0,
        }
    }

    #[test]
    fn test_item_lookup_and_bonus() {
        let catalog = GameCatalog::from_tables(CatalogTables {
            items: vec![sword()],
            ..CatalogTables::default()
        });
        let item = catalog.item("iron_sword").unwrap();
        assert_eq!(item.bonus(StatKind::Atk), 5.0);
        assert_eq!(item.bonus(StatKind::Defense), 0.0);
        assert!(catalog.item("missing").is_none());
        assert!(matches!(
            catalog.require_item("missing"),
            Err(CoreError::ContentDataMissing(_))
        ));
    }

    #[test]
    fn test_equipment_bonus_sums() {
        let catalog = GameCatalog::from_tables(CatalogTables {
            items: vec![sword()],
            ..CatalogTables::default()
        });
        let ids = [ItemId::new("iron_sword"), ItemId::new("iron_sword"), ItemId::new("ghost")];
        let bonus = catalog.equipment_bonus(ids.iter());
        assert_eq!(bonus.atk, 10.0);
        assert!((bonus.critchance - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_enemy_eligibility() {
        let json = r#"{"id":"ogre","name":"Ogre","hp_base":50,"atk_base":8,
            "min_wave":5,"max_wave":20,"spawn_on_wave_multiple_of":5}"#;
        let ogre: EnemyDef = serde_json::from_str(json).unwrap();
        assert!(!ogre.is_eligible(4));
        assert!(ogre.is_eligible(5));
        assert!(!ogre.is_eligible(6));
        assert!(!ogre.is_eligible(25));
        assert!((ogre.hp_scaling - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_effect_spec_missing_field() {
        let spec: EffectSpec = serde_json::from_str(r#"{"type":"buff","stat":"atk","duration":3}"#).unwrap();
        let err = spec.to_effect(EntityId::new(), "war_cry").unwrap_err();
        assert!(matches!(err, CoreError::ContentDataMissing(_)));
    }

    #[test]
    fn test_counter_default_duration() {
        let spec: EffectSpec =
            serde_json::from_str(r#"{"type":"counter","damage_percent":0.5}"#).unwrap();
        let effect = spec.to_effect(EntityId::new(), "riposte").unwrap();
        assert_eq!(effect.duration, DEFAULT_COUNTER_DURATION);
    }

    #[test]
    fn test_effectiveness_multiplier() {
        let eff = Effectiveness {
            strong_vs: vec!["undead".into()],
            weak_vs: vec!["fire".into()],
        };
        assert_eq!(eff.multiplier(Some("Undead")), 1.5);
        assert_eq!(eff.multiplier(Some("fire")), 0.5);
        assert_eq!(eff.multiplier(Some("beast")), 1.0);
        assert_eq!(eff.multiplier(None), 1.0);
    }

    #[test]
    fn test_validate_reports_dangling_drop() {
        let catalog = GameCatalog::from_tables(CatalogTables {
            enemies: vec![EnemyDef {
                drops: vec![DropEntry {
                    item_id: ItemId::new("ghost_item"),
                    chance: 1.0,
                    qty_min: 1,
                    qty_max: 1,
                }],
                ..serde_json::from_str(r#"{"id":"rat","name":"Rat","hp_base":5,"atk_base":1}"#)
                    .unwrap()
            }],
            ..CatalogTables::default()
        });
        assert_eq!(catalog.validate().len(), 1);
    }
}
