//! Kill rewards: item drops and boss skill unlocks or level-ups.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wavefall_common::{ItemId, SkillId};

use crate::catalog::GameCatalog;
use crate::enemy::Enemy;
use crate::player::Player;

/// Default chance that a boss or miniboss kill teaches a new skill.
pub const SKILL_UNLOCK_CHANCE: f64 = 0.3;

/// One rolled drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDrop {
    /// Item dropped.
    pub item_id: ItemId,
    /// Quantity dropped.
    pub quantity: u32,
}

/// Roll every drop source for a killed enemy.
///
/// The enemy's own table rolls each entry's chance with a uniform quantity in
/// `[qty_min, qty_max]`. Droppable catalog items naming the enemy id or its
/// category in `dropped_by` then roll their `drop_chance` for one unit.
/// Entries pointing at unknown items are skipped.
pub fn roll_drops(enemy: &Enemy, catalog: &GameCatalog, rng: &mut fastrand::Rng) -> Vec<LootDrop> {
    let mut drops: Vec<LootDrop> = Vec::new();
    let mut push = |item_id: &ItemId, quantity: u32| {
        if quantity == 0 {
            return;
        }
        match drops.iter_mut().find(|d| &d.item_id == item_id) {
            Some(existing) => existing.quantity += quantity,
            None => drops.push(LootDrop {
                item_id: item_id.clone(),
                quantity,
            }),
        }
    };

    for entry in &enemy.drops {
        if catalog.item(entry.item_id.as_str()).is_none() {
            warn!("{} drops unknown item {}, skipping", enemy.name, entry.item_id);
            continue;
        }
        if rng.f64() >= entry.chance {
            continue;
        }
        let lo = entry.qty_min.min(entry.qty_max);
        let hi = entry.qty_min.max(entry.qty_max);
        push(&entry.item_id, rng.u32(lo..=hi));
    }

    let template = enemy.template_key();
    for item in catalog.items() {
        if item.is_dropped_by(template, &enemy.category) && rng.f64() < item.drop_chance {
            push(&item.id, 1);
        }
    }

    if !drops.is_empty() {
        debug!("{} dropped {} item stacks", enemy.name, drops.len());
    }
    drops
}

/// Skill progress from a boss kill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillReward {
    /// A new skill was unlocked.
    Learned(SkillId),
    /// A known skill reached a new level.
    LevelUp(SkillId, u32),
}

/// Highest level a skill can reach through boss rewards.
pub const MAX_SKILL_LEVEL: u32 = 5;

/// Roll a skill reward after a boss or miniboss kill.
///
/// Candidates are catalog skills the player lacks whose required level the
/// player meets. When there are none, a known skill below
/// [`MAX_SKILL_LEVEL`] gains a level instead.
pub fn roll_skill_unlock(
    enemy: &Enemy,
    player: &mut Player,
    catalog: &GameCatalog,
    chance: f64,
    rng: &mut fastrand::Rng,
) -> Option<SkillReward> {
    if !enemy.is_boss() || rng.f64() >= chance {
        return None;
    }
    let candidates: Vec<&SkillId> = catalog
        .skills()
        .iter()
        .filter(|s| !player.has_skill(s.id.as_str()) && s.required_level <= player.level)
        .map(|s| &s.id)
        .collect();
    if !candidates.is_empty() {
        let skill = candidates[rng.usize(..candidates.len())].clone();
        player.learn_skill(skill.clone());
        return Some(SkillReward::Learned(skill));
    }

    let known: Vec<SkillId> = player
        .skills
        .iter()
        .filter(|id| player.skill_level(id.as_str()) < MAX_SKILL_LEVEL)
        .cloned()
        .collect();
    if known.is_empty() {
        return None;
    }
    let skill = known[rng.usize(..known.len())].clone();
    let level = player.skill_level(skill.as_str()) + 1;
    player.set_skill_level(skill.clone(), level);
    Some(SkillReward::LevelUp(skill, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogTables, Classification, DropEntry, ItemDef, SkillDef};
    use crate::spawn::fallback_slime;

    fn catalog() -> GameCatalog {
        let items: Vec<ItemDef> = serde_json::from_str(
            r#"[
                {"id":"gel","name":"Gel"},
                {"id":"fang","name":"Fang","droppable":true,"dropped_by":["beast"],"drop_chance":1.0},
                {"id":"crown","name":"Crown","droppable":false,"dropped_by":["beast"],"drop_chance":1.0}
            ]"#,
        )
        .unwrap();
        let skills: Vec<SkillDef> = serde_json::from_str(
            r#"[
                {"id":"fireball","name":"Fireball"},
                {"id":"meteor","name":"Meteor","required_level":50}
            ]"#,
        )
        .unwrap();
        GameCatalog::from_tables(CatalogTables {
            items,
            skills,
            ..CatalogTables::default()
        })
    }

    fn beast() -> Enemy {
        let mut e = fallback_slime(3);
        e.category = "beast".into();
        e.drops = vec![
            DropEntry {
                item_id: ItemId::new("gel"),
                chance: 1.0,
                qty_min: 2,
                qty_max: 4,
            },
            DropEntry {
                item_id: ItemId::new("ghost"),
                chance: 1.0,
                qty_min: 1,
                qty_max: 1,
            },
        ];
        e
    }

    #[test]
    fn test_guaranteed_drops() {
        let mut rng = fastrand::Rng::with_seed(4);
        let drops = roll_drops(&beast(), &catalog(), &mut rng);
        assert_eq!(drops.len(), 2);
        let gel = drops.iter().find(|d| d.item_id.as_str() == "gel").unwrap();
        assert!((2..=4).contains(&gel.quantity));
        assert!(drops.iter().any(|d| d.item_id.as_str() == "fang"));
        assert!(!drops.iter().any(|d| d.item_id.as_str() == "crown"));
    }

    #[test]
    fn test_zero_chance_never_drops() {
        let mut enemy = beast();
        enemy.category = "plant".into();
        enemy.drops[0].chance = 0.0;
        let mut rng = fastrand::Rng::with_seed(4);
        for _ in 0..50 {
            assert!(roll_drops(&enemy, &catalog(), &mut rng).is_empty());
        }
    }

    #[test]
    fn test_skill_unlock_only_for_bosses() {
        let catalog = catalog();
        let mut player = Player::new("Hero", 1);
        let mut rng = fastrand::Rng::with_seed(4);
        let mut enemy = beast();
        assert!(roll_skill_unlock(&enemy, &mut player, &catalog, 1.0, &mut rng).is_none());

        enemy.classification = Classification::Miniboss;
        let learned = roll_skill_unlock(&enemy, &mut player, &catalog, 1.0, &mut rng);
        assert_eq!(learned, Some(SkillReward::Learned(SkillId::new("fireball"))));
        assert!(player.has_skill("fireball"));

        // Meteor needs level 50, so known skills level up instead.
        for level in 2..=MAX_SKILL_LEVEL {
            let reward = roll_skill_unlock(&enemy, &mut player, &catalog, 1.0, &mut rng);
            assert_eq!(reward, Some(SkillReward::LevelUp(SkillId::new("fireball"), level)));
        }
        assert_eq!(player.skill_level("fireball"), MAX_SKILL_LEVEL);
        assert!(roll_skill_unlock(&enemy, &mut player, &catalog, 1.0, &mut rng).is_none());
    }
}
