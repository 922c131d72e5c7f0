//! Skill resolution.
//!
//! This module provides:
//! - The per-hit skill damage pipeline (scaling, effectiveness, element
//!   bonus, crit, mitigation)
//! - Whole-cast resolution: multi-hit sequencing, heals, lifesteal,
//!   counters, effect application and cooldowns
//!
//! Mana is never touched here; the caller pays the cost before casting.

use tracing::{debug, warn};
use wavefall_common::{CoreError, CoreResult, SkillId};

use crate::catalog::{GameCatalog, SkillDef, SkillKind};
use crate::crit::CritRoll;
use crate::damage::{resolve_hit, HitResult};
use crate::effects::{Effect, EffectManager};
use crate::enemy::Enemy;
use crate::player::Player;
use crate::stats::{Combatant, StatKind, Stats};

/// Damage bonus per skill level above 1.
pub const LEVEL_DAMAGE_SCALING: f64 = 0.25;
/// Mana cost increase per skill level above 1.
pub const LEVEL_MANA_SCALING: f64 = 0.2;
/// Multiplier on magic power when it is the scaling stat.
pub const MAGIC_SCALING_MULTIPLIER: f64 = 1.5;

/// Damage multiplier for a skill level.
#[must_use]
pub fn level_multiplier(level: u32) -> f64 {
    1.0 + f64::from(level.max(1) - 1) * LEVEL_DAMAGE_SCALING
}

/// Mana cost of a skill at a level.
#[must_use]
pub fn scaled_mana_cost(skill: &SkillDef, level: u32) -> f64 {
    (skill.mana_cost.max(0.0) * (1.0 + f64::from(level.max(1) - 1) * LEVEL_MANA_SCALING)).round()
}

/// Stats of `combatant` with its active effect deltas applied.
#[must_use]
pub fn effective_stats<C: Combatant + ?Sized>(combatant: &C, effects: &EffectManager) -> Stats {
    combatant
        .stats()
        .with_deltas(&effects.apply_active_effects(combatant.id()))
}

/// Pre-mitigation amount for a given power: `(power + scaling) * level`.
fn scaled_amount(skill: &SkillDef, power: f64, level: u32, caster_view: &Stats) -> f64 {
    let mut scaling = caster_view.get(skill.scaling_stat);
    if skill.scaling_stat == StatKind::MagicPower {
        scaling *= MAGIC_SCALING_MULTIPLIER;
    }
    (power + scaling) * level_multiplier(level)
}

/// Damage of one hit of `skill` using `power` as its base.
pub fn calculate_hit_damage<C, T>(
    skill: &SkillDef,
    power: f64,
    level: u32,
    caster: &C,
    target: &T,
    effects: &EffectManager,
    rng: &mut fastrand::Rng,
) -> HitResult
where
    C: Combatant + ?Sized,
    T: Combatant + ?Sized,
{
    let caster_view = effective_stats(caster, effects);
    let target_view = effective_stats(target, effects);

    let effectiveness = skill
        .effectiveness
        .as_ref()
        .map_or(1.0, |e| e.multiplier(target.category()));
    let element = 1.0 + caster.element_bonus(skill.element) / 100.0;
    let raw = scaled_amount(skill, power, level, &caster_view) * effectiveness * element;

    resolve_hit(raw, &caster_view, &target_view, skill.damage_type(), rng)
}

/// Damage of a single full-power hit of `skill`.
pub fn calculate_skill_damage<C, T>(
    skill: &SkillDef,
    level: u32,
    caster: &C,
    target: &T,
    effects: &EffectManager,
    rng: &mut fastrand::Rng,
) -> (u32, bool)
where
    C: Combatant + ?Sized,
    T: Combatant + ?Sized,
{
    let hit = calculate_hit_damage(skill, skill.power, level, caster, target, effects, rng);
    (hit.damage, hit.is_crit())
}

// ============================================================================
// Cast resolution
// ============================================================================

/// One resolved hit of a cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillHit {
    /// Damage dealt.
    pub damage: u32,
    /// Crit outcome.
    pub crit: CritRoll,
    /// HP the caster healed from lifesteal.
    pub lifesteal: f64,
}

/// Everything that happened during one cast.
#[derive(Debug, Clone, Default)]
pub struct SkillOutcome {
    /// Skill cast.
    pub skill_id: SkillId,
    /// Display name of the skill.
    pub skill_name: String,
    /// Damage hits, in order.
    pub hits: Vec<SkillHit>,
    /// HP restored to the caster by a heal skill.
    pub healed: f64,
    /// Effects applied after the hits.
    pub applied: Vec<Effect>,
    /// Damage reflected back by the target's counter.
    pub counter_reflected: Option<u32>,
    /// Effect entries that could not be applied.
    pub errors: Vec<CoreError>,
}

impl SkillOutcome {
    /// Sum of damage over all hits.
    #[must_use]
    pub fn total_damage(&self) -> u32 {
        self.hits.iter().map(|h| h.damage).sum()
    }
}

/// Check that `player` may cast `skill_id` right now and return the skill,
/// its level and mana cost. Nothing is mutated.
pub fn prepare_cast<'c>(
    player: &Player,
    skill_id: &str,
    catalog: &'c GameCatalog,
) -> CoreResult<(&'c SkillDef, u32, f64)> {
    if !player.has_skill(skill_id) {
        return Err(CoreError::InvalidAction(format!("{skill_id} is not unlocked")));
    }
    let skill = catalog.require_skill(skill_id)?;
    let remaining = player.cooldown(skill_id);
    if remaining > 0 {
        return Err(CoreError::InvalidAction(format!(
            "{} is on cooldown for {remaining} turns",
            skill.name
        )));
    }
    let level = player.skill_level(skill_id);
    let cost = scaled_mana_cost(skill, level);
    if player.current_mana + f64::EPSILON < cost {
        return Err(CoreError::InsufficientResource(format!(
            "{} needs {cost} mana",
            skill.name
        )));
    }
    Ok((skill, level, cost))
}

/// Resolve a cast of `skill` by `caster` against `target`.
///
/// Multi-hit skills run the full damage pipeline per hit. Effects apply once
/// after the last hit; a malformed effect entry is recorded in
/// [`SkillOutcome::errors`] and skipped. The cooldown is always set.
pub fn cast_skill(
    skill: &SkillDef,
    level: u32,
    caster: &mut Player,
    target: &mut Enemy,
    effects: &mut EffectManager,
    rng: &mut fastrand::Rng,
) -> SkillOutcome {
    let mut outcome = SkillOutcome {
        skill_id: skill.id.clone(),
        skill_name: skill.name.clone(),
        ..SkillOutcome::default()
    };

    match skill.kind {
        SkillKind::Damage => resolve_damage(skill, level, caster, target, effects, rng, &mut outcome),
        SkillKind::Heal => {
            let view = effective_stats(&*caster, effects);
            let amount = scaled_amount(skill, skill.power, level, &view);
            outcome.healed = caster.heal(amount);
        },
        SkillKind::Support => {},
    }

    apply_skill_effects(skill, caster, target, effects, &mut outcome);
    caster.set_cooldown(skill.id.clone(), skill.cooldown);

    debug!(
        "{} cast {} (lv {level}): {} damage over {} hits, {} healed",
        caster.name,
        skill.name,
        outcome.total_damage(),
        outcome.hits.len(),
        outcome.healed
    );
    outcome
}

fn resolve_damage(
    skill: &SkillDef,
    level: u32,
    caster: &mut Player,
    target: &mut Enemy,
    effects: &mut EffectManager,
    rng: &mut fastrand::Rng,
    outcome: &mut SkillOutcome,
) {
    let (hits, power) = match skill.multi_hit {
        Some(multi) => (multi.hits.max(1), skill.power * multi.damage_fraction),
        None => (1, skill.power),
    };

    for _ in 0..hits {
        if !target.is_alive() {
            break;
        }
        let hit = calculate_hit_damage(skill, power, level, &*caster, &*target, effects, rng);
        target.take_damage(hit.damage);

        let lifesteal = if caster.stats.lifesteal > 0.0 {
            caster.heal((f64::from(hit.damage) * caster.stats.lifesteal).floor())
        } else {
            0.0
        };

        if outcome.counter_reflected.is_none() && hit.damage > 0 {
            outcome.counter_reflected =
                effects.trigger_counter(target.id, &mut caster.stats, hit.damage);
        }

        outcome.hits.push(SkillHit {
            damage: hit.damage,
            crit: hit.crit,
            lifesteal,
        });
    }
}

fn apply_skill_effects(
    skill: &SkillDef,
    caster: &Player,
    target: &Enemy,
    effects: &mut EffectManager,
    outcome: &mut SkillOutcome,
) {
    if skill.effects.is_empty() {
        return;
    }
    let caster_view = effective_stats(caster, effects);

    for spec in &skill.effects {
        let target_id = if spec.targets_caster() {
            caster.id
        } else {
            if !target.is_alive() {
                continue;
            }
            target.id
        };
        match spec.to_effect(target_id, &skill.name) {
            Ok(effect) => {
                let stored = effects.add_effect(target_id, effect, Some(&caster_view));
                outcome.applied.push(stored);
            },
            Err(err) => {
                warn!("Skipping effect on skill {}: {err}", skill.id);
                outcome.errors.push(err);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogTables, EffectSpec, EffectTag, Effectiveness, ItemDef, ItemKind, MultiHit};
    use crate::damage::Element;
    use crate::spawn::fallback_slime;
    use std::collections::HashMap;

    fn skill(json: &str) -> SkillDef {
        serde_json::from_str(json).unwrap()
    }

    fn hero() -> Player {
        let mut p = Player::new("Hero", 1);
        p.stats.critchance = 0.0;
        p
    }

    fn dummy() -> Enemy {
        let mut e = fallback_slime(1);
        e.stats.hp = 10_000.0;
        e.stats.max_hp = 10_000.0;
        e
    }

    #[test]
    fn test_basic_damage_formula() {
        let s = skill(r#"{"id":"slash","name":"Slash","power":20}"#);
        let mut rng = fastrand::Rng::with_seed(1);
        let effects = EffectManager::new();
        let (dmg, crit) = calculate_skill_damage(&s, 1, &hero(), &dummy(), &effects, &mut rng);
        assert_eq!(dmg, 30);
        assert!(!crit);
        let (dmg, _) = calculate_skill_damage(&s, 3, &hero(), &dummy(), &effects, &mut rng);
        assert_eq!(dmg, 45);
    }

    #[test]
    fn test_magic_scaling_uses_magic_defense() {
        let s = skill(r#"{"id":"bolt","name":"Bolt","power":10,"scaling_stat":"magic_power"}"#);
        let mut caster = hero();
        caster.stats.magic_power = 20.0;
        let mut target = dummy();
        target.stats.defense = 75.0;
        let effects = EffectManager::new();
        let mut rng = fastrand::Rng::with_seed(1);
        let (dmg, _) = calculate_skill_damage(&s, 1, &caster, &target, &effects, &mut rng);
        assert_eq!(dmg, 40);

        target.stats.magic_defense = 30.0;
        let (dmg, _) = calculate_skill_damage(&s, 1, &caster, &target, &effects, &mut rng);
        assert_eq!(dmg, 28);
    }

    #[test]
    fn test_effectiveness_and_element_bonus() {
        let mut s = skill(r#"{"id":"smite","name":"Smite","power":20,"element":"fire"}"#);
        s.effectiveness = Some(Effectiveness {
            strong_vs: vec!["undead".into()],
            weak_vs: vec![],
        });
        let mut ring: ItemDef = serde_json::from_str(r#"{"id":"ring","name":"Ring","type":"relic"}"#).unwrap();
        ring.damage_type_bonuses = HashMap::from([(Element::Fire, 20.0)]);
        assert_eq!(ring.kind, ItemKind::Relic);
        let catalog = GameCatalog::from_tables(CatalogTables {
            items: vec![ring],
            ..CatalogTables::default()
        });

        let mut caster = hero();
        caster.inventory.add("ring", 1);
        caster.equip("ring", &catalog).unwrap();
        caster.stats.critchance = 0.0;
        let mut target = dummy();
        target.category = "undead".into();

        let effects = EffectManager::new();
        let mut rng = fastrand::Rng::with_seed(1);
        // 30 * 1.5 * 1.2 = 54
        let (dmg, _) = calculate_skill_damage(&s, 1, &caster, &target, &effects, &mut rng);
        assert_eq!(dmg, 54);
    }

    #[test]
    fn test_buffs_feed_scaling_stat() {
        let s = skill(r#"{"id":"slash","name":"Slash","power":20}"#);
        let caster = hero();
        let mut effects = EffectManager::new();
        effects.add_effect(caster.id, Effect::buff(caster.id, StatKind::Atk, 10.0, 2), None);
        let mut rng = fastrand::Rng::with_seed(1);
        let (dmg, _) = calculate_skill_damage(&s, 1, &caster, &dummy(), &effects, &mut rng);
        assert_eq!(dmg, 40);
    }

    #[test]
    fn test_mana_cost_scaling() {
        let s = skill(r#"{"id":"bolt","name":"Bolt","mana_cost":10}"#);
        assert_eq!(scaled_mana_cost(&s, 1), 10.0);
        assert_eq!(scaled_mana_cost(&s, 3), 14.0);
        assert_eq!(scaled_mana_cost(&s, 0), 10.0);
    }

    #[test]
    fn test_multi_hit_applies_effects_once() {
        let mut s = skill(r#"{"id":"flurry","name":"Flurry","power":20,"cooldown":3}"#);
        s.multi_hit = Some(MultiHit {
            hits: 3,
            damage_fraction: 0.5,
        });
        s.effects = vec![EffectSpec {
            tag: EffectTag::Dot,
            stat: None,
            value: None,
            duration: Some(2),
            damage: Some(4.0),
            damage_type: crate::damage::DamageType::Physical,
            damage_percent: None,
        }];
        let mut caster = hero();
        let mut target = dummy();
        let mut effects = EffectManager::new();
        let mut rng = fastrand::Rng::with_seed(2);

        let outcome = cast_skill(&s, 1, &mut caster, &mut target, &mut effects, &mut rng);
        assert_eq!(outcome.hits.len(), 3);
        // (10 + 10) per hit
        assert!(outcome.hits.iter().all(|h| h.damage == 20));
        assert_eq!(outcome.total_damage(), 60);
        assert_eq!(effects.active_count(target.id), 1);
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(caster.cooldown("flurry"), 3);
        assert_eq!(target.stats.hp, 10_000.0 - 60.0);
    }

    #[test]
    fn test_multi_hit_triggers_counter_once() {
        let mut s = skill(r#"{"id":"flurry","name":"Flurry","power":20}"#);
        s.multi_hit = Some(MultiHit {
            hits: 2,
            damage_fraction: 0.5,
        });
        let mut caster = hero();
        let mut target = dummy();
        let mut effects = EffectManager::new();
        effects.add_effect(target.id, Effect::counter(target.id, 0.5, 2), None);
        let mut rng = fastrand::Rng::with_seed(2);

        let outcome = cast_skill(&s, 1, &mut caster, &mut target, &mut effects, &mut rng);
        assert_eq!(outcome.counter_reflected, Some(10));
        assert_eq!(caster.stats.hp, 90.0);
        assert!(!effects.has_counter_effect(target.id));
    }

    #[test]
    fn test_heal_skill_caps_at_max() {
        let s = skill(r#"{"id":"mend","name":"Mend","type":"heal","power":15,"scaling_stat":"magic_power"}"#);
        let mut caster = hero();
        caster.stats.magic_power = 10.0;
        caster.stats.hp = 60.0;
        let mut target = dummy();
        let mut effects = EffectManager::new();
        let mut rng = fastrand::Rng::with_seed(2);

        let outcome = cast_skill(&s, 1, &mut caster, &mut target, &mut effects, &mut rng);
        assert_eq!(outcome.healed, 30.0);
        assert!(outcome.hits.is_empty());

        let outcome = cast_skill(&s, 1, &mut caster, &mut target, &mut effects, &mut rng);
        assert_eq!(outcome.healed, 10.0);
        assert_eq!(caster.stats.hp, 100.0);
    }

    #[test]
    fn test_lifesteal_per_hit() {
        let s = skill(r#"{"id":"slash","name":"Slash","power":20}"#);
        let mut caster = hero();
        caster.stats.hp = 50.0;
        caster.stats.lifesteal = 0.25;
        let mut target = dummy();
        let mut effects = EffectManager::new();
        let mut rng = fastrand::Rng::with_seed(2);

        let outcome = cast_skill(&s, 1, &mut caster, &mut target, &mut effects, &mut rng);
        assert_eq!(outcome.hits[0].lifesteal, 7.0);
        assert_eq!(caster.stats.hp, 57.0);
    }

    #[test]
    fn test_malformed_effect_is_skipped() {
        let mut s = skill(r#"{"id":"cry","name":"War Cry","type":"support"}"#);
        s.effects = vec![
            serde_json::from_str(r#"{"type":"buff","stat":"atk","duration":3}"#).unwrap(),
            serde_json::from_str(r#"{"type":"buff","stat":"defense","value":5,"duration":3}"#).unwrap(),
        ];
        let mut caster = hero();
        let mut target = dummy();
        let mut effects = EffectManager::new();
        let mut rng = fastrand::Rng::with_seed(2);

        let outcome = cast_skill(&s, 1, &mut caster, &mut target, &mut effects, &mut rng);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(effects.apply_active_effects(caster.id).get(StatKind::Defense), 5.0);
    }

    #[test]
    fn test_prepare_cast_checks() {
        let catalog = GameCatalog::from_tables(CatalogTables {
            skills: vec![skill(r#"{"id":"bolt","name":"Bolt","mana_cost":60}"#)],
            ..CatalogTables::default()
        });
        let mut p = hero();
        assert!(matches!(prepare_cast(&p, "bolt", &catalog), Err(CoreError::InvalidAction(_))));
        p.learn_skill("bolt");
        assert!(matches!(
            prepare_cast(&p, "bolt", &catalog),
            Err(CoreError::InsufficientResource(_))
        ));
        p.current_mana = 60.0;
        p.base.max_mana = 60.0;
        assert!(prepare_cast(&p, "bolt", &catalog).is_ok());
        p.set_cooldown("bolt", 1);
        assert!(matches!(prepare_cast(&p, "bolt", &catalog), Err(CoreError::InvalidAction(_))));
    }
}
