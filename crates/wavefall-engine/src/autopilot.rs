//! Scripted player for headless runs.
//!
//! The autopilot drives a [`GameSession`] on a [`SimClock`]:
//! - In a fight it heals when low, casts ready damage skills, blocks when a
//!   hit would be lethal and otherwise attacks
//! - Between turns it spends stat points, crafts, equips into empty slots
//!   and buys permanent upgrades
//! - In the shop it stocks up on potions and gear, then leaves
//!
//! Runs stop on game over, a wave limit or a tick limit, and can autosave
//! every few waves.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wavefall_gameplay::{
    scaled_mana_cost, CombatController, EquipSlot, ItemKind, PlayerAction, SkillKind, StatKind,
};

use crate::config::EngineConfig;
use crate::save_manager::SaveManager;
use crate::session::GameSession;
use crate::timing::SimClock;

/// Heal below this fraction of max hp.
pub const HEAL_THRESHOLD: f64 = 0.35;

/// Potions kept in stock when shopping.
pub const POTION_STOCK: u32 = 3;

/// Stat point rotation.
pub const POINT_ROTATION: [StatKind; 3] = [StatKind::Atk, StatKind::MaxHp, StatKind::Defense];

/// Limits for one autopilot run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutopilotSettings {
    /// Simulated seconds per tick.
    pub tick_seconds: f64,
    /// Stop after this many ticks.
    pub max_ticks: u64,
    /// Stop once this wave is reached (0 = no limit).
    pub max_wave: u32,
    /// Save every N waves (0 = never).
    pub autosave_waves: u32,
}

impl Default for AutopilotSettings {
    fn default() -> Self {
        Self {
            tick_seconds: 0.1,
            max_ticks: 200_000,
            max_wave: 0,
            autosave_waves: 0,
        }
    }
}

impl From<&EngineConfig> for AutopilotSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            tick_seconds: config.tick_seconds,
            max_ticks: config.max_ticks,
            max_wave: config.max_wave,
            autosave_waves: config.autosave_waves,
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The player died.
    GameOver,
    /// The wave limit was reached.
    WaveLimit,
    /// The tick limit was reached.
    TickLimit,
}

/// Outcome of an autopilot run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Why the run stopped.
    pub reason: StopReason,
    /// Ticks simulated.
    pub ticks: u64,
    /// Simulated seconds.
    pub elapsed: f64,
    /// Wave at the end.
    pub wave: u32,
    /// Highest wave reached.
    pub highest_wave: u32,
    /// Player level at the end.
    pub level: u32,
    /// Gold at the end.
    pub gold: u64,
    /// Player actions accepted.
    pub actions: u64,
    /// Autosaves written.
    pub saves: u32,
}

/// Where autosaves go.
#[derive(Debug, Clone, Copy)]
pub struct Autosave<'a> {
    /// Save manager.
    pub manager: &'a SaveManager,
    /// Slot name.
    pub slot: &'a str,
}

/// Drives a session until it stops.
#[derive(Debug)]
pub struct Autopilot {
    settings: AutopilotSettings,
    clock: SimClock,
    actions: u64,
    saves: u32,
}

impl Autopilot {
    /// Create an autopilot.
    #[must_use]
    pub fn new(settings: AutopilotSettings) -> Self {
        Self {
            clock: SimClock::new(settings.tick_seconds),
            settings,
            actions: 0,
            saves: 0,
        }
    }

    /// Simulated clock.
    #[must_use]
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Play until game over or a limit is hit.
    pub fn run(&mut self, session: &GameSession, autosave: Option<Autosave<'_>>) -> RunSummary {
        let mut last_saved_wave = session.status().wave;
        info!("Autopilot starting on wave {}", last_saved_wave);

        let reason = loop {
            let now = self.clock.now();
            let (game_over, wave, acted, enemy_due) = session.with_lock(|c| {
                let acted = step(c, now);
                (c.is_game_over(), c.wave(), acted, c.enemy_turn_due())
            });
            if acted {
                self.actions += 1;
            }

            if game_over {
                break StopReason::GameOver;
            }
            if self.settings.max_wave > 0 && wave >= self.settings.max_wave {
                break StopReason::WaveLimit;
            }
            if self.clock.ticks() >= self.settings.max_ticks {
                break StopReason::TickLimit;
            }

            if let Some(target) = autosave {
                let every = self.settings.autosave_waves;
                if every > 0 && wave >= last_saved_wave + every {
                    last_saved_wave = wave;
                    self.save(session, target);
                }
            }

            // Skip idle ticks while waiting on the enemy
            match enemy_due.filter(|due| *due > now + self.clock.step()) {
                Some(due) => {
                    self.clock.advance_to(due);
                },
                None => {
                    self.clock.tick();
                },
            }
        };

        // A finished run is not worth resuming
        if let Some(target) = autosave.filter(|_| reason != StopReason::GameOver) {
            self.save(session, target);
        }

        let status = session.status();
        let summary = RunSummary {
            reason,
            ticks: self.clock.ticks(),
            elapsed: self.clock.now(),
            wave: status.wave,
            highest_wave: status.highest_wave,
            level: status.level,
            gold: status.gold,
            actions: self.actions,
            saves: self.saves,
        };
        info!(
            "Autopilot stopped ({:?}) on wave {} after {} actions",
            summary.reason, summary.wave, summary.actions
        );
        summary
    }

    fn save(&mut self, session: &GameSession, target: Autosave<'_>) {
        match session.save(target.manager, target.slot) {
            Ok(_) => self.saves += 1,
            Err(e) => warn!("Autosave failed: {e}"),
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// One poll of the controller. Returns whether a player action was taken.
pub fn step(controller: &mut CombatController, now: f64) -> bool {
    controller.update(now);
    if controller.is_game_over() {
        return false;
    }

    if controller.in_shop() {
        manage(controller);
        shop(controller);
        controller.leave_shop(now);
        return false;
    }

    if !controller.can_act(now) {
        return false;
    }
    manage(controller);
    match choose_action(controller) {
        Some(action) => {
            debug!("Autopilot chose {:?}", action);
            controller.perform(&action, now)
        },
        None => false,
    }
}

/// Pick the next combat action.
#[must_use]
pub fn choose_action(controller: &CombatController) -> Option<PlayerAction> {
    let enemy = controller.enemy()?;
    let player = controller.player();
    let catalog = controller.catalog();
    let hp_fraction = if player.stats.max_hp > 0.0 {
        player.stats.hp / player.stats.max_hp
    } else {
        0.0
    };

    if hp_fraction < HEAL_THRESHOLD {
        let potion = player
            .inventory
            .iter()
            .filter_map(|(id, _)| catalog.item(id.as_str()))
            .filter(|item| item.kind == ItemKind::Consumable && item.heal > 0.0)
            .max_by(|a, b| a.heal.total_cmp(&b.heal));
        if let Some(potion) = potion {
            return Some(PlayerAction::UseItem(potion.id.to_string()));
        }
    }

    let ready = player.skills.iter().filter_map(|id| catalog.skill(id.as_str())).filter(|skill| {
        player.cooldown(skill.id.as_str()) == 0
            && player.current_mana >= scaled_mana_cost(skill, player.skill_level(skill.id.as_str()))
    });
    let mut best_damage: Option<(f64, &str)> = None;
    for skill in ready {
        match skill.kind {
            SkillKind::Heal if hp_fraction < HEAL_THRESHOLD => {
                return Some(PlayerAction::CastSkill(skill.id.to_string()));
            },
            SkillKind::Damage => {
                let power = skill.power * f64::from(skill.multi_hit.map_or(1, |m| m.hits.max(1)));
                if best_damage.map_or(true, |(p, _)| power > p) {
                    best_damage = Some((power, skill.id.as_str()));
                }
            },
            _ => {},
        }
    }
    if let Some((_, id)) = best_damage {
        return Some(PlayerAction::CastSkill(id.to_string()));
    }

    // Brace when the next hit could be lethal and the enemy will survive ours
    if enemy.stats.atk >= player.stats.hp && enemy.stats.hp > player.stats.atk * 2.0 {
        return Some(PlayerAction::Block);
    }

    Some(PlayerAction::Attack)
}

/// Spend points, craft, equip and buy upgrades. Returns the number of
/// changes made.
pub fn manage(controller: &mut CombatController) -> u32 {
    let mut changes = 0;

    let mut rotation = POINT_ROTATION.iter().cycle();
    while controller.player().unspent_points > 0 {
        let Some(&stat) = rotation.next() else { break };
        if !controller.allocate_point(stat) {
            break;
        }
        changes += 1;
    }

    for recipe in craftable_recipes(controller) {
        if controller.craft(&recipe) {
            changes += 1;
        }
    }

    for item in equippable_upgrades(controller) {
        if controller.equip(&item) {
            changes += 1;
        }
    }

    loop {
        let Some(upgrade) = affordable_upgrade(controller) else { break };
        if !controller.purchase_upgrade(&upgrade) {
            break;
        }
        changes += 1;
    }

    changes
}

/// Buy potions up to the stock level and gear for empty slots. Returns the
/// number of purchases.
pub fn shop(controller: &mut CombatController) -> u32 {
    let mut bought = 0;

    let wanted: Vec<String> = {
        let player = controller.player();
        let catalog = controller.catalog();
        let mut wanted = Vec::new();
        for offer in controller.shop_offers() {
            let Some(item) = catalog.item(offer.item_id.as_str()) else {
                continue;
            };
            let want = match item.kind {
                ItemKind::Consumable => item.heal > 0.0 && player.inventory.count(item.id.as_str()) < POTION_STOCK,
                kind if kind.is_equippable() => {
                    EquipSlot::for_kind(kind).iter().any(|slot| player.equipped(*slot).is_none())
                        && player.inventory.count(item.id.as_str()) == 0
                },
                _ => false,
            };
            if want {
                wanted.push(offer.item_id.to_string());
            }
        }
        wanted
    };

    for item in wanted {
        let affordable = controller
            .shop_offers()
            .iter()
            .any(|o| o.item_id.as_str() == item && o.price <= controller.player().gold);
        if affordable && controller.buy(&item) {
            bought += 1;
        }
    }

    if bought > 0 {
        manage(controller);
    }
    bought
}

fn equippable_upgrades(controller: &CombatController) -> Vec<String> {
    let player = controller.player();
    let catalog = controller.catalog();
    let mut free: Vec<EquipSlot> = EquipSlot::ALL
        .into_iter()
        .filter(|slot| player.equipped(*slot).is_none())
        .collect();

    let mut picks = Vec::new();
    for (id, _) in player.inventory.iter() {
        let Some(item) = catalog.item(id.as_str()) else {
            continue;
        };
        if let Some(pos) = free.iter().position(|slot| EquipSlot::for_kind(item.kind).contains(slot)) {
            free.remove(pos);
            picks.push(id.to_string());
        }
    }
    picks
}

fn craftable_recipes(controller: &CombatController) -> Vec<String> {
    let player = controller.player();
    controller
        .catalog()
        .recipes()
        .iter()
        .filter(|recipe| {
            player.level >= recipe.required_level
                && recipe
                    .ingredients
                    .iter()
                    .all(|i| player.inventory.has(i.item_id.as_str(), i.quantity))
        })
        .map(|recipe| recipe.id.to_string())
        .collect()
}

fn affordable_upgrade(controller: &CombatController) -> Option<String> {
    let player = controller.player();
    controller
        .catalog()
        .upgrades()
        .iter()
        .filter(|u| {
            let level = player.permanent_upgrades.get(u.id.as_str()).copied().unwrap_or(0);
            level < u.max_level && u.cost <= player.challenge_coins
        })
        .min_by_key(|u| u.cost)
        .map(|u| u.id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use wavefall_gameplay::{CatalogTables, CombatConfig, GameCatalog, Player, RunSnapshot};

    use crate::config::SaveFormat;

    fn catalog() -> Arc<GameCatalog> {
        let tables: CatalogTables = serde_json::from_str(
            r#"{
                "items": [
                    {"id": "potion", "name": "Potion", "type": "consumable", "heal": 40, "price": 5},
                    {"id": "blade", "name": "Blade", "type": "weapon", "stats": {"atk": 4}, "price": 30},
                    {"id": "ore", "name": "Ore"}
                ],
                "skills": [
                    {"id": "slash", "name": "Slash", "type": "damage", "power": 12, "mana_cost": 10, "cooldown": 1},
                    {"id": "mend", "name": "Mend", "type": "heal", "power": 30, "mana_cost": 10}
                ],
                "recipes": [
                    {"id": "forge_blade", "ingredients": [{"item_id": "ore", "quantity": 2}], "result": "blade"}
                ],
                "upgrades": [
                    {"id": "vigor", "stat": "max_hp", "cost": 2, "max_level": 3, "per_level": 10}
                ]
            }"#,
        )
        .expect("tables");
        Arc::new(GameCatalog::from_tables(tables))
    }

    fn controller(player: Player) -> CombatController {
        CombatController::with_rng(catalog(), CombatConfig::instant(), player, fastrand::Rng::with_seed(11))
    }

    #[test]
    fn test_attacks_by_default() {
        let c = controller(Player::new("Bot", 1));
        assert_eq!(choose_action(&c), Some(PlayerAction::Attack));
    }

    #[test]
    fn test_heals_with_potion_when_low() {
        let mut player = Player::new("Bot", 1);
        player.stats.hp = 10.0;
        player.inventory.add("potion", 1);
        let c = controller(player);
        assert_eq!(choose_action(&c), Some(PlayerAction::UseItem("potion".into())));
    }

    #[test]
    fn test_prefers_ready_damage_skill() {
        let mut player = Player::new("Bot", 1);
        player.learn_skill("slash");
        let c = controller(player);
        assert_eq!(choose_action(&c), Some(PlayerAction::CastSkill("slash".into())));

        let mut player = Player::new("Bot", 1);
        player.learn_skill("slash");
        player.set_cooldown("slash", 1);
        let c = controller(player);
        assert_eq!(choose_action(&c), Some(PlayerAction::Attack));
    }

    #[test]
    fn test_heal_skill_when_low_without_potion() {
        let mut player = Player::new("Bot", 1);
        player.learn_skill("mend");
        player.stats.hp = 5.0;
        let c = controller(player);
        assert_eq!(choose_action(&c), Some(PlayerAction::CastSkill("mend".into())));
    }

    #[test]
    fn test_manage_spends_everything() {
        let mut player = Player::new("Bot", 1);
        player.unspent_points = 4;
        player.inventory.add("ore", 2);
        player.challenge_coins = 5;
        let mut c = controller(player);

        let changes = manage(&mut c);
        let player = c.player();
        assert_eq!(player.unspent_points, 0);
        assert_eq!(player.equipped(EquipSlot::Weapon).map(|id| id.as_str()), Some("blade"));
        assert_eq!(player.inventory.count("ore"), 0);
        assert_eq!(player.permanent_upgrades.get("vigor").copied(), Some(2));
        assert_eq!(player.challenge_coins, 1);
        // 4 points, 1 craft, 1 equip, 2 upgrades
        assert_eq!(changes, 8);
    }

    #[test]
    fn test_run_stops_at_game_over_or_limit() {
        let session = GameSession::new(controller(Player::new("Bot", 3)));
        let mut autopilot = Autopilot::new(AutopilotSettings {
            tick_seconds: 1.0,
            max_ticks: 50_000,
            ..AutopilotSettings::default()
        });

        let summary = autopilot.run(&session, None);
        assert_eq!(summary.reason, StopReason::GameOver);
        assert!(summary.highest_wave > 1);
        assert!(summary.actions > 0);
        assert_eq!(summary.saves, 0);
    }

    #[test]
    fn test_wave_limit_and_autosave() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = SaveManager::new(temp_dir.path(), SaveFormat::Binary);
        let session = GameSession::new(controller(Player::new("Bot", 4)));
        let mut autopilot = Autopilot::new(AutopilotSettings {
            tick_seconds: 1.0,
            max_ticks: 50_000,
            max_wave: 3,
            autosave_waves: 1,
        });

        let summary = autopilot.run(
            &session,
            Some(Autosave {
                manager: &manager,
                slot: "auto",
            }),
        );

        if summary.reason == StopReason::WaveLimit {
            assert_eq!(summary.wave, 3);
        }
        assert!(summary.saves >= 1);
        let saved: RunSnapshot = manager.load("auto").expect("load");
        assert_eq!(saved.wave, summary.wave);
    }

    #[test]
    fn test_tick_limit() {
        let session = GameSession::new(controller(Player::new("Bot", 5)));
        let mut autopilot = Autopilot::new(AutopilotSettings {
            tick_seconds: 1.0,
            max_ticks: 3,
            ..AutopilotSettings::default()
        });
        let summary = autopilot.run(&session, None);
        assert_eq!(summary.reason, StopReason::TickLimit);
        assert_eq!(summary.ticks, 3);
    }
}
