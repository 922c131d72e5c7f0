//! Turn controller for one run.
//!
//! This module provides:
//! - The player/enemy turn state machine, polled with the current time
//! - Player actions (attack, block, skills, consumables)
//! - Kill rewards, wave advancement, zones and the shop
//! - Snapshot capture and restore
//!
//! Every recoverable failure inside a turn is logged (tracing and the combat
//! log) and swallowed so the state machine stays live.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wavefall_common::{CoreError, EntityId, ZoneId};

use crate::catalog::{GameCatalog, ZoneDef};
use crate::config::CombatConfig;
use crate::crafting::CraftingEngine;
use crate::damage::{resolve_hit, DamageType};
use crate::economy::{self, ShopOffer};
use crate::effects::{Effect, EffectManager};
use crate::enemy::Enemy;
use crate::events::{CombatLog, DamageEvent, DamageEventQueue, DamageKind, LogCategory};
use crate::loot::{roll_drops, roll_skill_unlock, SkillReward};
use crate::player::{EquipSlot, Player};
use crate::skills::{self, effective_stats, prepare_cast};
use crate::snapshot::RunSnapshot;
use crate::spawn::{EnemyGenerator, BOSS_WAVE_INTERVAL};
use crate::stats::{Combatant, StatKind, MAX_DODGE_CHANCE};

// ============================================================================
// State
// ============================================================================

/// Phase of the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatState {
    /// Waiting for a player action.
    PlayerTurn,
    /// The enemy acts once its delay has elapsed.
    EnemyTurn,
    /// Shopping between fights; there is no enemy.
    Shop,
    /// Advancing to the next wave.
    WaveTransition,
    /// The player is dead.
    GameOver,
}

/// A player command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Basic physical attack.
    Attack,
    /// Raise defense for the next enemy attack.
    Block,
    /// Cast an unlocked skill.
    CastSkill(String),
    /// Use a consumable from the inventory.
    UseItem(String),
}

// ============================================================================
// Controller
// ============================================================================

/// Owns the player, the current enemy and all effects of one run.
#[derive(Debug)]
pub struct CombatController {
    catalog: Arc<GameCatalog>,
    config: CombatConfig,
    player: Player,
    enemy: Option<Enemy>,
    effects: EffectManager,
    generator: EnemyGenerator,
    crafting: CraftingEngine,
    log: CombatLog,
    damage_events: DamageEventQueue,
    rng: fastrand::Rng,
    state: CombatState,
    wave: u32,
    highest_wave: u32,
    shop_offers: Vec<ShopOffer>,
    active_zone: Option<ZoneId>,
    /// Time of the last action that started a delay
    last_action_time: f64,
    /// Delay before the pending enemy turn may run
    action_delay: f64,
    player_action_cooldown_until: f64,
    /// Extra defense for the next enemy attack
    block_bonus: f64,
    enemy_turn_processed: bool,
    /// Time of the call being processed, for log timestamps
    now: f64,
}

impl CombatController {
    /// Start a run on wave 1 with an unseeded random source.
    #[must_use]
    pub fn new(catalog: Arc<GameCatalog>, config: CombatConfig, player: Player) -> Self {
        Self::with_rng(catalog, config, player, fastrand::Rng::new())
    }

    /// Start a run on wave 1 with the given random source.
    #[must_use]
    pub fn with_rng(catalog: Arc<GameCatalog>, config: CombatConfig, player: Player, rng: fastrand::Rng) -> Self {
        let mut controller = Self::assemble(catalog, config, player, rng);
        controller.wave = 1;
        controller.highest_wave = 1;
        controller.note(format!("{} enters the arena", controller.player.name), LogCategory::Wave);
        controller.spawn_wave_enemy();
        controller
    }

    /// Resume a run from a snapshot. The snapshot is repaired first and the
    /// player's derived stats are rebuilt from the catalog.
    #[must_use]
    pub fn restore(
        catalog: Arc<GameCatalog>,
        config: CombatConfig,
        mut snapshot: RunSnapshot,
        rng: fastrand::Rng,
    ) -> Self {
        snapshot.repair();
        let RunSnapshot {
            player,
            wave,
            highest_wave,
            in_shop,
            enemy,
            ..
        } = snapshot;

        let mut controller = Self::assemble(catalog, config, player, rng);
        let catalog = Arc::clone(&controller.catalog);
        controller.player.recalculate_stats(&catalog);
        controller.wave = wave;
        controller.highest_wave = highest_wave;

        if in_shop {
            controller.enter_shop();
        } else if let Some(mut enemy) = enemy.filter(Enemy::is_alive) {
            // Saved ids belong to another process
            enemy.id = EntityId::new();
            controller.enemy = Some(enemy);
            controller.state = CombatState::PlayerTurn;
        } else {
            controller.spawn_wave_enemy();
        }
        info!(
            "Restored run of {} on wave {} (best {})",
            controller.player.name, controller.wave, controller.highest_wave
        );
        controller
    }

    /// Resume from encoded snapshot bytes (JSON or binary). Unreadable data
    /// starts a fresh run for `fallback` instead.
    #[must_use]
    pub fn resume_or_start(
        catalog: Arc<GameCatalog>,
        config: CombatConfig,
        bytes: &[u8],
        fallback: Player,
        rng: fastrand::Rng,
    ) -> Self {
        match RunSnapshot::decode(bytes) {
            Ok(snapshot) => Self::restore(catalog, config, snapshot, rng),
            Err(err) => {
                let err = CoreError::from(err);
                warn!("{err}; starting a fresh run");
                let mut controller = Self::with_rng(catalog, config, fallback, rng);
                controller.note("Saved run could not be loaded, starting fresh", LogCategory::Warning);
                controller
            },
        }
    }

    fn assemble(catalog: Arc<GameCatalog>, mut config: CombatConfig, player: Player, rng: fastrand::Rng) -> Self {
        config.validate();
        Self {
            generator: EnemyGenerator::new(Arc::clone(&catalog)).with_elite_weight(config.elite_weight),
            crafting: CraftingEngine::new(Arc::clone(&catalog)),
            log: CombatLog::new(config.log_capacity),
            damage_events: DamageEventQueue::new(config.damage_event_capacity),
            catalog,
            config,
            player,
            enemy: None,
            effects: EffectManager::new(),
            rng,
            state: CombatState::WaveTransition,
            wave: 0,
            highest_wave: 0,
            shop_offers: Vec::new(),
            active_zone: None,
            last_action_time: 0.0,
            action_delay: 0.0,
            player_action_cooldown_until: 0.0,
            block_bonus: 0.0,
            enemy_turn_processed: false,
            now: 0.0,
        }
    }

    /// Capture the persistent part of the run.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot::new(
            self.player.clone(),
            self.wave,
            self.highest_wave,
            self.state == CombatState::Shop,
            self.enemy.clone(),
        )
    }

    // === Accessors ===

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> CombatState {
        self.state
    }

    /// The player.
    #[must_use]
    pub const fn player(&self) -> &Player {
        &self.player
    }

    /// The enemy being fought, if any.
    #[must_use]
    pub const fn enemy(&self) -> Option<&Enemy> {
        self.enemy.as_ref()
    }

    /// Current wave.
    #[must_use]
    pub const fn wave(&self) -> u32 {
        self.wave
    }

    /// Highest wave reached this run.
    #[must_use]
    pub const fn highest_wave(&self) -> u32 {
        self.highest_wave
    }

    /// Whether the shop is open.
    #[must_use]
    pub fn in_shop(&self) -> bool {
        self.state == CombatState::Shop
    }

    /// Whether the run has ended.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.state == CombatState::GameOver
    }

    /// Items for sale while the shop is open.
    #[must_use]
    pub fn shop_offers(&self) -> &[ShopOffer] {
        &self.shop_offers
    }

    /// Zone restricting the current wave's enemy.
    #[must_use]
    pub const fn active_zone(&self) -> Option<&ZoneId> {
        self.active_zone.as_ref()
    }

    /// Defense bonus waiting for the next enemy attack.
    #[must_use]
    pub const fn block_bonus(&self) -> f64 {
        self.block_bonus
    }

    /// Active effects.
    #[must_use]
    pub const fn effects(&self) -> &EffectManager {
        &self.effects
    }

    /// The combat log.
    #[must_use]
    pub const fn log(&self) -> &CombatLog {
        &self.log
    }

    /// Damage events for the presentation layer.
    #[must_use]
    pub const fn damage_events(&self) -> &DamageEventQueue {
        &self.damage_events
    }

    /// Content catalog.
    #[must_use]
    pub fn catalog(&self) -> &GameCatalog {
        &self.catalog
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Whether a player action would be accepted at `now`.
    #[must_use]
    pub fn can_act(&self, now: f64) -> bool {
        self.state == CombatState::PlayerTurn && self.enemy.is_some() && now >= self.player_action_cooldown_until
    }

    /// Time at which the pending enemy turn becomes due, if one is pending.
    #[must_use]
    pub fn enemy_turn_due(&self) -> Option<f64> {
        (self.state == CombatState::EnemyTurn && !self.enemy_turn_processed)
            .then_some(self.last_action_time + self.action_delay)
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Advance timed transitions. A no-op until the enemy's delay elapses.
    pub fn update(&mut self, now: f64) {
        if self.state != CombatState::EnemyTurn || self.enemy_turn_processed {
            return;
        }
        if now - self.last_action_time < self.action_delay {
            return;
        }
        self.now = now;
        self.run_enemy_turn(now);
    }

    // ========================================================================
    // Player actions
    // ========================================================================

    /// Perform a player action. Returns whether it was accepted.
    pub fn perform(&mut self, action: &PlayerAction, now: f64) -> bool {
        match action {
            PlayerAction::Attack => self.attack(now),
            PlayerAction::Block => self.block(now),
            PlayerAction::CastSkill(id) => self.cast_skill(id, now),
            PlayerAction::UseItem(id) => self.use_item(id, now),
        }
    }

    /// Basic physical attack.
    pub fn attack(&mut self, now: f64) -> bool {
        self.act(now, Self::resolve_attack)
    }

    /// Brace for the next enemy attack.
    pub fn block(&mut self, now: f64) -> bool {
        self.act(now, |this, _| {
            this.block_bonus = this.config.block_defense_bonus;
            let message = format!("{} braces for impact", this.player.name);
            this.note(message, LogCategory::Player);
            Ok(())
        })
    }

    /// Cast an unlocked skill at the current enemy.
    pub fn cast_skill(&mut self, skill_id: &str, now: f64) -> bool {
        self.act(now, |this, enemy| this.resolve_cast(skill_id, enemy))
    }

    /// Use a consumable. Takes the player's turn.
    pub fn use_item(&mut self, item_id: &str, now: f64) -> bool {
        self.act(now, |this, _| {
            let catalog = Arc::clone(&this.catalog);
            let (hp, mana) = this.player.use_consumable(item_id, &catalog)?;
            if hp > 0.0 {
                this.emit(this.player.id, hp as u32, DamageKind::Heal);
            }
            let name = catalog.item(item_id).map_or(item_id, |i| i.name.as_str());
            this.note(
                format!("{} uses {name}: +{hp:.0} HP, +{mana:.0} mana", this.player.name),
                LogCategory::Heal,
            );
            Ok(())
        })
    }

    /// Gate, run and finish one player action.
    fn act<F>(&mut self, now: f64, resolve: F) -> bool
    where
        F: FnOnce(&mut Self, &mut Enemy) -> Result<(), CoreError>,
    {
        if self.state != CombatState::PlayerTurn || now < self.player_action_cooldown_until {
            debug!("Ignoring player input in {:?} at {now:.2}", self.state);
            return false;
        }
        self.now = now;
        let Some(mut enemy) = self.enemy.take() else {
            debug!("Player turn without an enemy, nothing to act on");
            self.state = CombatState::PlayerTurn;
            return false;
        };

        match resolve(self, &mut enemy) {
            Ok(()) => {
                self.finish_player_action(enemy, now);
                true
            },
            Err(err) => {
                self.enemy = Some(enemy);
                self.report(&err);
                false
            },
        }
    }

    fn resolve_attack(&mut self, enemy: &mut Enemy) -> Result<(), CoreError> {
        let attacker = effective_stats(&self.player, &self.effects);
        let defender = effective_stats(&*enemy, &self.effects);

        if self.rng.f64() < defender.dodge_chance.clamp(0.0, MAX_DODGE_CHANCE) {
            self.emit(enemy.id, 0, DamageKind::Dodge);
            self.note(format!("{} dodges the attack", enemy.name), LogCategory::Enemy);
            return Ok(());
        }

        let hit = resolve_hit(attacker.atk, &attacker, &defender, DamageType::Physical, &mut self.rng);
        enemy.take_damage(hit.damage);
        let kind = if hit.is_crit() { DamageKind::Crit } else { DamageKind::Hit };
        self.emit(enemy.id, hit.damage, kind);
        let message = match (hit.crit.is_triple, hit.crit.is_crit) {
            (true, _) => format!("TRIPLE CRIT! {} hits {} for {}", self.player.name, enemy.name, hit.damage),
            (false, true) => format!("Critical! {} hits {} for {}", self.player.name, enemy.name, hit.damage),
            _ => format!("{} hits {} for {}", self.player.name, enemy.name, hit.damage),
        };
        self.note(message, if hit.is_crit() { LogCategory::Crit } else { LogCategory::Player });

        if self.player.stats.lifesteal > 0.0 {
            let healed = self.player.heal((f64::from(hit.damage) * self.player.stats.lifesteal).floor());
            if healed > 0.0 {
                self.emit(self.player.id, healed as u32, DamageKind::Heal);
            }
        }

        if let Some(reflected) = self.effects.trigger_counter(enemy.id, &mut self.player.stats, hit.damage) {
            self.emit(self.player.id, reflected, DamageKind::Counter);
            self.note(
                format!("{} counters for {reflected}", enemy.name),
                LogCategory::Effect,
            );
        }
        Ok(())
    }

    fn resolve_cast(&mut self, skill_id: &str, enemy: &mut Enemy) -> Result<(), CoreError> {
        let catalog = Arc::clone(&self.catalog);
        let (skill, level, cost) = prepare_cast(&self.player, skill_id, &catalog)?;
        self.player.spend_mana(cost)?;

        let outcome = skills::cast_skill(skill, level, &mut self.player, enemy, &mut self.effects, &mut self.rng);

        let count = outcome.hits.len();
        for (index, hit) in outcome.hits.iter().enumerate() {
            let kind = if hit.crit.is_crit { DamageKind::Crit } else { DamageKind::Hit };
            self.emit(enemy.id, hit.damage, kind);

            let prefix = match (hit.crit.is_triple, hit.crit.is_crit) {
                (true, _) => "TRIPLE CRIT! ",
                (false, true) => "Critical! ",
                _ => "",
            };
            let strike = if count > 1 {
                format!(" (hit {}/{count})", index + 1)
            } else {
                String::new()
            };
            self.note(
                format!(
                    "{prefix}{} casts {} on {} for {}{strike}",
                    self.player.name, outcome.skill_name, enemy.name, hit.damage
                ),
                if hit.crit.is_crit { LogCategory::Crit } else { LogCategory::Player },
            );
        }
        if count == 0 && outcome.healed > 0.0 {
            self.emit(self.player.id, outcome.healed as u32, DamageKind::Heal);
            self.note(
                format!("{} casts {} and heals {:.0}", self.player.name, outcome.skill_name, outcome.healed),
                LogCategory::Heal,
            );
        } else if count == 0 {
            self.note(
                format!("{} casts {}", self.player.name, outcome.skill_name),
                LogCategory::Player,
            );
        }

        for effect in &outcome.applied {
            self.note(effect_line(effect, "gains"), LogCategory::Effect);
        }
        if let Some(reflected) = outcome.counter_reflected {
            self.emit(self.player.id, reflected, DamageKind::Counter);
            self.note(format!("{} counters for {reflected}", enemy.name), LogCategory::Effect);
        }
        for err in &outcome.errors {
            self.report(err);
        }
        Ok(())
    }

    fn finish_player_action(&mut self, enemy: Enemy, now: f64) {
        self.player_action_cooldown_until = now + self.config.player_action_cooldown;

        if !self.player.is_alive() {
            self.enemy = Some(enemy);
            self.game_over();
            return;
        }
        if !enemy.is_alive() {
            self.defeat_enemy(enemy, now);
            return;
        }

        self.enemy = Some(enemy);
        self.state = CombatState::EnemyTurn;
        self.enemy_turn_processed = false;
        self.last_action_time = now;
        self.action_delay = self.config.enemy_turn_delay;
    }

    // ========================================================================
    // Enemy turn
    // ========================================================================

    fn run_enemy_turn(&mut self, now: f64) {
        self.enemy_turn_processed = true;
        let Some(mut enemy) = self.enemy.take() else {
            debug!("Enemy turn without an enemy, returning to the player");
            self.block_bonus = 0.0;
            self.state = CombatState::PlayerTurn;
            return;
        };

        let dot = self.effects.process_dot_effects(enemy.id, &mut enemy.stats);
        if dot > 0 {
            self.emit(enemy.id, dot, DamageKind::Dot);
            self.note(format!("{} takes {dot} damage over time", enemy.name), LogCategory::Effect);
        }
        for expired in self.effects.tick_effects(enemy.id) {
            self.note(effect_line(&expired, "loses"), LogCategory::Effect);
        }

        if !enemy.is_alive() {
            self.block_bonus = 0.0;
            self.defeat_enemy(enemy, now);
            return;
        }

        self.enemy_attack(&mut enemy);
        self.block_bonus = 0.0;

        if !self.player.is_alive() {
            self.enemy = Some(enemy);
            self.game_over();
            return;
        }
        if !enemy.is_alive() {
            self.defeat_enemy(enemy, now);
            return;
        }
        self.enemy = Some(enemy);
        self.start_player_turn();
    }

    fn enemy_attack(&mut self, enemy: &mut Enemy) {
        let attacker = effective_stats(&*enemy, &self.effects);
        let mut defender = effective_stats(&self.player, &self.effects);

        if self.rng.f64() < defender.dodge_chance.clamp(0.0, MAX_DODGE_CHANCE) {
            self.emit(self.player.id, 0, DamageKind::Dodge);
            self.note(format!("{} dodges {}", self.player.name, enemy.name), LogCategory::Player);
            return;
        }

        defender.defense += self.block_bonus;
        let hit = resolve_hit(attacker.atk, &attacker, &defender, DamageType::Physical, &mut self.rng);
        self.player.take_damage(hit.damage);
        let kind = if hit.is_crit() { DamageKind::Crit } else { DamageKind::Hit };
        self.emit(self.player.id, hit.damage, kind);
        let blocked = if self.block_bonus > 0.0 { " (blocked)" } else { "" };
        self.note(
            format!("{} hits {} for {}{blocked}", enemy.name, self.player.name, hit.damage),
            if hit.is_crit() { LogCategory::Crit } else { LogCategory::Enemy },
        );

        if let Some(reflected) = self.effects.trigger_counter(self.player.id, &mut enemy.stats, hit.damage) {
            self.emit(enemy.id, reflected, DamageKind::Counter);
            self.note(
                format!("{} counters for {reflected}", self.player.name),
                LogCategory::Effect,
            );
        }
    }

    /// Start-of-turn upkeep for the player: DoT, effect ticks, cooldowns, regen.
    fn start_player_turn(&mut self) {
        let id = self.player.id;
        let dot = self.effects.process_dot_effects(id, &mut self.player.stats);
        if dot > 0 {
            self.emit(id, dot, DamageKind::Dot);
            self.note(format!("{} takes {dot} damage over time", self.player.name), LogCategory::Effect);
        }
        for expired in self.effects.tick_effects(id) {
            self.note(effect_line(&expired, "loses"), LogCategory::Effect);
        }
        if !self.player.is_alive() {
            self.game_over();
            return;
        }

        self.player.tick_cooldowns();
        let (hp, mana) = self.player.apply_regen();
        if hp > 0.0 || mana > 0.0 {
            debug!("Regen: +{hp:.1} HP, +{mana:.1} mana");
        }
        self.state = CombatState::PlayerTurn;
    }

    fn game_over(&mut self) {
        self.state = CombatState::GameOver;
        self.effects.clear();
        self.block_bonus = 0.0;
        info!("{} fell on wave {} (best {})", self.player.name, self.wave, self.highest_wave);
        self.note(
            format!("{} has fallen on wave {}", self.player.name, self.wave),
            LogCategory::Warning,
        );
    }

    // ========================================================================
    // Rewards and waves
    // ========================================================================

    fn defeat_enemy(&mut self, enemy: Enemy, now: f64) {
        let catalog = Arc::clone(&self.catalog);

        let gold = (enemy.gold as f64 * self.player.stats.gold_modifier.max(0.0)).floor() as u64;
        self.player.earn_gold(gold);
        let levels = self.player.gain_xp(enemy.xp, &catalog);
        self.note(
            format!("{} defeated! +{gold} gold, +{} XP", enemy.name, enemy.xp),
            LogCategory::Reward,
        );
        if levels > 0 {
            self.note(
                format!("{} reached level {}", self.player.name, self.player.level),
                LogCategory::Reward,
            );
        }

        let reward = roll_skill_unlock(
            &enemy,
            &mut self.player,
            &catalog,
            self.config.skill_unlock_chance,
            &mut self.rng,
        );
        if let Some(reward) = reward {
            let (id, message) = match &reward {
                SkillReward::Learned(id) => (id, "Learned".to_string()),
                SkillReward::LevelUp(id, level) => (id, format!("Level {level}:")),
            };
            let name = catalog.skill(id.as_str()).map_or(id.as_str(), |s| s.name.as_str());
            self.note(format!("{message} {name}"), LogCategory::Reward);
        }

        for drop in roll_drops(&enemy, &catalog, &mut self.rng) {
            let name = catalog
                .item(drop.item_id.as_str())
                .map_or(drop.item_id.as_str(), |i| i.name.as_str());
            self.note(format!("Loot: {name} x{}", drop.quantity), LogCategory::Reward);
            self.player.inventory.add(drop.item_id, drop.quantity);
        }

        self.effects.clear();
        info!("Wave {} cleared: {} defeated", self.wave, enemy.name);

        self.next_wave();
        self.last_action_time = now;
        self.action_delay = self.config.post_kill_delay;
        // The kill delay replaces the regular action cooldown
        self.player_action_cooldown_until = now + self.config.post_kill_delay;
    }

    /// Advance to the next wave: economy, shop roll, zone roll, spawn.
    fn next_wave(&mut self) {
        self.state = CombatState::WaveTransition;
        self.enemy = None;
        self.block_bonus = 0.0;
        self.wave += 1;
        self.highest_wave = self.highest_wave.max(self.wave);

        let paid = economy::apply_wave_economy(&mut self.player, self.wave);
        if paid.coins > 0 {
            self.note(format!("+{} challenge coins", paid.coins), LogCategory::Reward);
        }

        let shop = self.wave % BOSS_WAVE_INTERVAL == 0 || self.rng.f64() < self.config.shop_chance;
        if shop {
            self.enter_shop();
        } else {
            self.spawn_wave_enemy();
        }
    }

    fn enter_shop(&mut self) {
        self.enemy = None;
        self.state = CombatState::Shop;
        self.shop_offers = economy::shop_offers(
            &self.catalog,
            self.player.game_seed,
            self.wave,
            self.player.cumulative_price_increase,
        );
        debug!("Shop on wave {} with {} offers", self.wave, self.shop_offers.len());
        self.note(format!("Wave {}: a merchant appears", self.wave), LogCategory::Wave);
    }

    /// Pick the zone for the current wave and spawn its enemy.
    fn spawn_wave_enemy(&mut self) {
        let catalog = Arc::clone(&self.catalog);
        let zone = roll_zone(catalog.zones(), self.wave, &mut self.rng);
        self.active_zone = zone.map(|z| z.id.clone());
        let allowed = zone.map(|z| z.allowed_categories.as_slice());

        let enemy = self.generator.random_enemy(self.wave, allowed, &mut self.rng);
        let zone_name = zone.map_or(String::new(), |z| format!(" in {}", z.name));
        self.note(
            format!("Wave {}{zone_name}: {} appears", self.wave, enemy.name),
            LogCategory::Wave,
        );
        self.enemy = Some(enemy);
        self.state = CombatState::PlayerTurn;
    }

    // ========================================================================
    // Shop and management
    // ========================================================================

    /// Close the shop and start the current wave's fight.
    pub fn leave_shop(&mut self, now: f64) -> bool {
        if self.state != CombatState::Shop {
            return false;
        }
        self.now = now;
        self.shop_offers.clear();
        self.spawn_wave_enemy();
        true
    }

    /// Buy one unit of a shop offer.
    pub fn buy(&mut self, item_id: &str) -> bool {
        if self.state != CombatState::Shop {
            return false;
        }
        let Some(offer) = self.shop_offers.iter().find(|o| o.item_id.as_str() == item_id).cloned() else {
            self.report(&CoreError::InvalidAction(format!("{item_id} is not for sale")));
            return false;
        };
        match economy::buy_offer(&mut self.player, &offer) {
            Ok(()) => {
                self.note(format!("Bought {} for {} gold", offer.name, offer.price), LogCategory::Reward);
                true
            },
            Err(err) => {
                self.report(&err.into());
                false
            },
        }
    }

    /// Buy a permanent upgrade level with challenge coins.
    pub fn purchase_upgrade(&mut self, upgrade_id: &str) -> bool {
        if self.is_game_over() {
            return false;
        }
        let catalog = Arc::clone(&self.catalog);
        match economy::purchase_upgrade(&mut self.player, &catalog, upgrade_id) {
            Ok(level) => {
                self.note(format!("{upgrade_id} upgraded to level {level}"), LogCategory::Reward);
                true
            },
            Err(err) => {
                self.report(&err.into());
                false
            },
        }
    }

    /// Craft a recipe from the player's inventory.
    pub fn craft(&mut self, recipe_id: &str) -> bool {
        if self.is_game_over() {
            return false;
        }
        match self.crafting.craft_item(recipe_id, &mut self.player.inventory, self.player.level) {
            Ok(item) => {
                self.note(format!("Crafted {item}"), LogCategory::Reward);
                true
            },
            Err(err) => {
                self.report(&err.into());
                false
            },
        }
    }

    /// Equip an item from the inventory.
    pub fn equip(&mut self, item_id: &str) -> bool {
        if self.is_game_over() {
            return false;
        }
        let catalog = Arc::clone(&self.catalog);
        match self.player.equip(item_id, &catalog) {
            Ok(slot) => {
                self.note(format!("Equipped {item_id} ({slot:?})"), LogCategory::Info);
                true
            },
            Err(err) => {
                self.report(&err);
                false
            },
        }
    }

    /// Return an equipped item to the inventory.
    pub fn unequip(&mut self, slot: EquipSlot) -> bool {
        if self.is_game_over() {
            return false;
        }
        let catalog = Arc::clone(&self.catalog);
        match self.player.unequip(slot, &catalog) {
            Ok(item) => {
                self.note(format!("Unequipped {item}"), LogCategory::Info);
                true
            },
            Err(err) => {
                self.report(&err);
                false
            },
        }
    }

    /// Spend an unspent stat point.
    pub fn allocate_point(&mut self, stat: StatKind) -> bool {
        if self.is_game_over() {
            return false;
        }
        let catalog = Arc::clone(&self.catalog);
        match self.player.allocate_point(stat, &catalog) {
            Ok(()) => {
                self.note(format!("+1 {}", stat.label()), LogCategory::Info);
                true
            },
            Err(err) => {
                self.report(&err);
                false
            },
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    fn note(&mut self, message: impl Into<String>, category: LogCategory) {
        self.log.push(message, category, self.now);
    }

    fn emit(&self, target: EntityId, amount: u32, kind: DamageKind) {
        self.damage_events.publish(DamageEvent {
            target,
            amount,
            kind,
            timestamp: self.now,
        });
    }

    fn report(&mut self, err: &CoreError) {
        if err.is_player_facing() {
            warn!("{err}");
            self.note(err.to_string(), LogCategory::Warning);
        } else {
            debug!("{err}");
        }
    }
}

/// Among zones open on `wave`, highest `min_wave` first, the first to pass
/// its spawn roll.
fn roll_zone<'a>(zones: &'a [ZoneDef], wave: u32, rng: &mut fastrand::Rng) -> Option<&'a ZoneDef> {
    let mut open: Vec<&ZoneDef> = zones.iter().filter(|z| z.min_wave <= wave).collect();
    open.sort_by(|a, b| b.min_wave.cmp(&a.min_wave));
    open.into_iter().find(|z| rng.f64() < z.spawn_chance)
}

fn effect_line(effect: &Effect, verb: &str) -> String {
    format!("{} {verb} {}", effect.source, effect.describe())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogTables;
    use crate::spawn::fallback_slime;
    use crate::stats::Stats;

    fn controller_with(catalog: GameCatalog, config: CombatConfig) -> CombatController {
        CombatController::with_rng(
            Arc::new(catalog),
            config,
            Player::new("Hero", 7),
            fastrand::Rng::with_seed(11),
        )
    }

    fn controller() -> CombatController {
        let config = CombatConfig {
            shop_chance: 0.0,
            ..CombatConfig::default()
        };
        controller_with(GameCatalog::empty(), config)
    }

    fn dummy(hp: f64, atk: f64) -> Enemy {
        let mut enemy = fallback_slime(1);
        enemy.stats = Stats {
            hp,
            max_hp: hp,
            atk,
            ..Stats::zeroed()
        };
        enemy
    }

    fn sturdy(controller: &mut CombatController) {
        controller.player.base.max_hp = 1000.0;
        controller.player.base.critchance = 0.0;
        let catalog = Arc::clone(&controller.catalog);
        controller.player.recalculate_stats(&catalog);
        controller.player.stats.hp = 1000.0;
    }

    #[test]
    fn test_starts_on_wave_one() {
        let c = controller();
        assert_eq!(c.wave(), 1);
        assert_eq!(c.highest_wave(), 1);
        assert_eq!(c.state(), CombatState::PlayerTurn);
        assert_eq!(c.enemy().map(|e| e.name.as_str()), Some("Slime Lv.1"));
    }

    #[test]
    fn test_enemy_replies_after_delay() {
        let mut c = controller();
        assert!(c.attack(0.0));
        assert_eq!(c.state(), CombatState::EnemyTurn);
        assert!(!c.attack(0.1), "input out of turn is ignored");

        c.update(0.5);
        assert_eq!(c.state(), CombatState::EnemyTurn);
        assert_eq!(c.player().stats.hp, 100.0);

        c.update(1.0);
        assert_eq!(c.state(), CombatState::PlayerTurn);
        // Slime Lv.1 hits for 7 and never crits.
        assert_eq!(c.player().stats.hp, 93.0);

        // Processed once: a later poll changes nothing.
        c.update(5.0);
        assert_eq!(c.player().stats.hp, 93.0);
    }

    #[test]
    fn test_player_turn_start_regenerates_mana() {
        let mut c = controller();
        c.player.current_mana = 10.0;
        c.attack(0.0);
        c.update(1.0);
        assert_eq!(c.player().current_mana, 12.0);
    }

    #[test]
    fn test_block_lasts_one_enemy_turn() {
        let mut c = controller_with(GameCatalog::empty(), CombatConfig::instant());
        sturdy(&mut c);
        c.enemy = Some(dummy(10_000.0, 100.0));

        assert!(c.block(0.0));
        assert_eq!(c.block_bonus(), 300.0);
        c.update(0.0);
        let blocked = 1000.0 - c.player().stats.hp;
        assert!(blocked > 0.0 && blocked < 100.0, "blocked hit took {blocked}");
        assert_eq!(c.block_bonus(), 0.0);

        let before = c.player().stats.hp;
        assert!(c.attack(0.0));
        c.update(0.0);
        assert_eq!(before - c.player().stats.hp, 100.0);
    }

    #[test]
    fn test_block_bonus_gone_on_consecutive_enemy_turn() {
        let mut c = controller_with(GameCatalog::empty(), CombatConfig::instant());
        sturdy(&mut c);
        c.enemy = Some(dummy(10_000.0, 100.0));

        assert!(c.block(0.0));
        c.run_enemy_turn(0.0);
        let blocked = 1000.0 - c.player().stats.hp;
        assert!(blocked < 100.0, "blocked hit took {blocked}");

        // Second enemy turn with no player action in between.
        let before = c.player().stats.hp;
        c.run_enemy_turn(0.0);
        assert_eq!(c.block_bonus(), 0.0);
        assert_eq!(before - c.player().stats.hp, 100.0);
    }

    #[test]
    fn test_block_cleared_even_when_enemy_dies_to_dot() {
        let mut c = controller_with(GameCatalog::empty(), CombatConfig::instant());
        let enemy = dummy(5.0, 50.0);
        let id = enemy.id;
        c.enemy = Some(enemy);
        c.effects.add_effect(
            id,
            Effect::dot(id, 10.0, DamageType::Physical, 3),
            None,
        );

        assert!(c.block(0.0));
        c.update(0.0);
        assert_eq!(c.block_bonus(), 0.0);
        assert_eq!(c.wave(), 2);
        assert_eq!(c.player().stats.hp, 100.0, "dead enemy does not attack");
        assert_eq!(c.player().gold, 13);
        assert_eq!(c.effects().active_count(id), 0);
    }

    #[test]
    fn test_kill_advances_wave_and_pays() {
        let mut c = controller();
        c.enemy = Some(dummy(1.0, 1.0));
        c.player.stats.gold_modifier = 2.0;

        assert!(c.attack(0.0));
        assert_eq!(c.wave(), 2);
        assert_eq!(c.state(), CombatState::PlayerTurn);
        assert_eq!(c.player().gold, 26);
        assert_eq!(c.player().xp, 14);
        assert_eq!(c.enemy().map(|e| e.name.as_str()), Some("Slime Lv.2"));

        // Post-kill pacing is 0.3 s, not the 0.5 s action cooldown.
        assert!(!c.can_act(0.1));
        assert!(!c.can_act(0.29));
        assert!(c.can_act(0.35));
    }

    #[test]
    fn test_game_over_stops_the_run() {
        let mut c = controller_with(GameCatalog::empty(), CombatConfig::instant());
        c.player.stats.hp = 1.0;
        c.enemy = Some(dummy(10_000.0, 100.0));

        assert!(c.attack(0.0));
        c.update(0.0);
        assert!(c.is_game_over());
        assert!(!c.attack(1.0));
        assert!(!c.block(1.0));
        assert!(c.log().last().is_some_and(|e| e.category == LogCategory::Warning));
    }

    #[test]
    fn test_player_action_cooldown() {
        let config = CombatConfig {
            enemy_turn_delay: 0.0,
            post_kill_delay: 0.0,
            player_action_cooldown: 0.5,
            shop_chance: 0.0,
            ..CombatConfig::default()
        };
        let mut c = controller_with(GameCatalog::empty(), config);
        sturdy(&mut c);
        c.enemy = Some(dummy(10_000.0, 1.0));

        assert!(c.attack(0.0));
        c.update(0.0);
        assert_eq!(c.state(), CombatState::PlayerTurn);
        assert!(!c.attack(0.2));
        assert!(c.attack(0.6));
    }

    #[test]
    fn test_missing_enemy_is_a_noop() {
        let mut c = controller();
        c.enemy = None;
        assert!(!c.attack(0.0));
        assert_eq!(c.state(), CombatState::PlayerTurn);
    }

    #[test]
    fn test_failed_cast_keeps_turn() {
        let tables: CatalogTables = serde_json::from_str(
            r#"{"skills": [{"id":"fireball","name":"Fireball","power":20,"mana_cost":30}]}"#,
        )
        .unwrap();
        let mut c = controller_with(GameCatalog::from_tables(tables), CombatConfig::instant());

        // Locked skills are ignored quietly.
        assert!(!c.cast_skill("fireball", 0.0));
        assert_eq!(c.state(), CombatState::PlayerTurn);
        assert!(!c.log().last().is_some_and(|e| e.category == LogCategory::Warning));

        // Missing mana is surfaced.
        c.player.learn_skill("fireball");
        c.player.current_mana = 5.0;
        assert!(!c.cast_skill("fireball", 0.0));
        assert_eq!(c.state(), CombatState::PlayerTurn);
        assert!(c.log().last().is_some_and(|e| e.category == LogCategory::Warning));
        assert_eq!(c.player().current_mana, 5.0);

        c.player.current_mana = 50.0;
        assert!(c.cast_skill("fireball", 0.0));
        assert_eq!(c.player().current_mana, 20.0);
        assert_eq!(c.player().cooldown("fireball"), 0);
    }

    #[test]
    fn test_multi_hit_cast_logs_each_hit() {
        let tables: CatalogTables = serde_json::from_str(
            r#"{"skills": [{"id":"flurry","name":"Flurry","power":20,
                "multi_hit":{"hits":3,"damage_fraction":0.5}}]}"#,
        )
        .unwrap();
        let mut c = controller_with(GameCatalog::from_tables(tables), CombatConfig::instant());
        sturdy(&mut c);
        c.player.learn_skill("flurry");
        c.enemy = Some(dummy(10_000.0, 1.0));

        assert!(c.cast_skill("flurry", 0.0));
        let lines: Vec<&str> = c
            .log()
            .entries()
            .map(|e| e.message.as_str())
            .filter(|m| m.contains("Flurry"))
            .collect();
        assert_eq!(lines.len(), 3, "{lines:?}");
        assert!(lines[0].ends_with("(hit 1/3)"));
        assert!(lines[2].ends_with("(hit 3/3)"));
    }

    #[test]
    fn test_shop_on_tenth_wave_then_boss_fight() {
        let mut c = controller_with(GameCatalog::empty(), CombatConfig::instant());
        c.wave = 9;
        c.enemy = Some(dummy(1.0, 1.0));

        assert!(c.attack(0.0));
        assert_eq!(c.wave(), 10);
        assert!(c.in_shop());
        assert!(c.enemy().is_none());
        assert!(!c.attack(0.0));

        assert!(c.leave_shop(0.0));
        assert_eq!(c.wave(), 10);
        assert_eq!(c.state(), CombatState::PlayerTurn);
        let slime = c.enemy().map(|e| (e.name.clone(), e.stats.hp));
        assert_eq!(slime, Some(("Slime Lv.10".to_string(), 70.0)));
        // Wave 10 pays one challenge coin.
        assert_eq!(c.player().challenge_coins, 1);
    }

    #[test]
    fn test_zone_filter_applies() {
        let tables: CatalogTables = serde_json::from_str(
            r#"{
                "enemies": [
                    {"id":"wolf","name":"Wolf","category":"beast","hp_base":30,"atk_base":5},
                    {"id":"imp","name":"Imp","category":"demon","hp_base":30,"atk_base":5}
                ],
                "zones": [
                    {"id":"den","name":"Den","allowed_categories":["demon"],"min_wave":1,"spawn_chance":1.0}
                ]
            }"#,
        )
        .unwrap();
        let c = controller_with(GameCatalog::from_tables(tables), CombatConfig::default());
        assert_eq!(c.active_zone().map(ZoneId::as_str), Some("den"));
        assert_eq!(c.enemy().map(|e| e.category.as_str()), Some("demon"));
    }

    #[test]
    fn test_damage_events_published() {
        let mut c = controller_with(GameCatalog::empty(), CombatConfig::instant());
        c.enemy = Some(dummy(10_000.0, 1.0));
        c.attack(0.0);
        c.update(0.0);
        let events = c.damage_events().drain();
        assert_eq!(events.len(), 2);
        assert!(c.damage_events().drain().is_empty());
    }

    #[test]
    fn test_snapshot_restore_keeps_progress() {
        let mut c = controller();
        c.enemy = Some(dummy(1.0, 1.0));
        c.attack(0.0);
        let snapshot = c.snapshot();

        let restored = CombatController::restore(
            Arc::new(GameCatalog::empty()),
            CombatConfig::default(),
            snapshot,
            fastrand::Rng::with_seed(1),
        );
        assert_eq!(restored.wave(), 2);
        assert_eq!(restored.player().gold, c.player().gold);
        assert_eq!(restored.enemy().map(|e| e.name.as_str()), Some("Slime Lv.2"));
        assert_eq!(restored.state(), CombatState::PlayerTurn);
    }

    #[test]
    fn test_restore_gives_enemy_a_fresh_id() {
        let c = controller();
        let mut snapshot = c.snapshot();
        // Ids restart in every process, so a saved enemy id can match the player's.
        if let Some(enemy) = snapshot.enemy.as_mut() {
            enemy.id = snapshot.player.id;
        }

        let mut restored = CombatController::restore(
            Arc::new(GameCatalog::empty()),
            CombatConfig::default(),
            snapshot,
            fastrand::Rng::with_seed(1),
        );
        let player_id = restored.player().id;
        let enemy_id = restored.enemy().map(|e| e.id).expect("enemy restored");
        assert_ne!(player_id, enemy_id);

        restored
            .effects
            .add_effect(enemy_id, Effect::dot(enemy_id, 10.0, DamageType::Physical, 3), None);
        assert_eq!(restored.effects().active_count(player_id), 0);
        assert_eq!(restored.effects().active_count(enemy_id), 1);
    }

    #[test]
    fn test_corrupt_snapshot_starts_fresh() {
        let c = CombatController::resume_or_start(
            Arc::new(GameCatalog::empty()),
            CombatConfig::default(),
            b"WFSV garbage",
            Player::new("Fresh", 3),
            fastrand::Rng::with_seed(1),
        );
        assert_eq!(c.wave(), 1);
        assert_eq!(c.player().name, "Fresh");
        assert!(c.log().last().is_some_and(|e| e.category == LogCategory::Warning));
    }

    #[test]
    fn test_restored_shop_regenerates_offers() {
        let tables: CatalogTables = serde_json::from_str(
            r#"{"items": [{"id":"potion","name":"Potion","kind":"consumable","price":10,"heal":30}]}"#,
        )
        .unwrap();
        let catalog = Arc::new(GameCatalog::from_tables(tables));
        let snapshot = RunSnapshot::new(Player::new("Hero", 5), 10, 10, true, None);
        let mut c = CombatController::restore(catalog, CombatConfig::instant(), snapshot, fastrand::Rng::with_seed(2));
        assert!(c.in_shop());
        assert_eq!(c.shop_offers().len(), 1);

        c.player.gold = 100;
        assert!(c.buy("potion"));
        assert_eq!(c.player().inventory.count("potion"), 1);
        assert!(c.player().gold < 100);
    }
}
