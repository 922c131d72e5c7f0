//! Shared game session.
//!
//! A [`GameSession`] owns one [`CombatController`] behind a
//! `parking_lot::Mutex`. Every command and poll goes through the lock, so
//! drivers on several threads (input, timer, autosave) see one consistent
//! writer. Cloning the session clones the handle, not the run.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use wavefall_gameplay::{CombatController, CombatState, DamageEvent, PlayerAction, RunSnapshot};

use crate::save_manager::{SaveManager, SaveResult};

/// Summary of a run at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    /// Turn phase.
    pub state: CombatState,
    /// Current wave.
    pub wave: u32,
    /// Highest wave reached.
    pub highest_wave: u32,
    /// Player level.
    pub level: u32,
    /// Player hp.
    pub hp: f64,
    /// Player max hp.
    pub max_hp: f64,
    /// Gold held.
    pub gold: u64,
    /// Enemy name, when one is present.
    pub enemy: Option<String>,
}

/// Thread-safe handle to a running game.
#[derive(Debug, Clone)]
pub struct GameSession {
    inner: Arc<Mutex<CombatController>>,
}

impl GameSession {
    /// Wrap a controller.
    #[must_use]
    pub fn new(controller: CombatController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut CombatController) -> R) -> R {
        let mut controller = self.inner.lock();
        f(&mut controller)
    }

    /// Perform a player action. Returns whether it was accepted.
    pub fn perform(&self, action: &PlayerAction, now: f64) -> bool {
        self.with_lock(|c| c.perform(action, now))
    }

    /// Advance timed transitions.
    pub fn update(&self, now: f64) {
        self.with_lock(|c| c.update(now));
    }

    /// Close the shop.
    pub fn leave_shop(&self, now: f64) -> bool {
        self.with_lock(|c| c.leave_shop(now))
    }

    /// Whether the run has ended.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.with_lock(|c| c.is_game_over())
    }

    /// Current summary.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.with_lock(|c| SessionStatus {
            state: c.state(),
            wave: c.wave(),
            highest_wave: c.highest_wave(),
            level: c.player().level,
            hp: c.player().stats.hp,
            max_hp: c.player().stats.max_hp,
            gold: c.player().gold,
            enemy: c.enemy().map(|e| e.name.clone()),
        })
    }

    /// Capture the persistent part of the run.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.with_lock(|c| c.snapshot())
    }

    /// Take every pending damage event.
    #[must_use]
    pub fn drain_damage_events(&self) -> Vec<DamageEvent> {
        self.with_lock(|c| c.damage_events().drain())
    }

    /// Snapshot under the lock and write it outside the lock.
    pub fn save(&self, manager: &SaveManager, slot_name: &str) -> SaveResult<PathBuf> {
        let snapshot = self.snapshot();
        debug!("Saving session at wave {}", snapshot.wave);
        manager.save(slot_name, &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaveFormat;
    use std::thread;
    use tempfile::TempDir;
    use wavefall_gameplay::{CombatConfig, GameCatalog, Player};

    fn session(seed: u64) -> GameSession {
        GameSession::new(CombatController::with_rng(
            Arc::new(GameCatalog::empty()),
            CombatConfig::instant(),
            Player::new("Hero", seed),
            fastrand::Rng::with_seed(seed),
        ))
    }

    #[test]
    fn test_status_reflects_controller() {
        let session = session(1);
        let status = session.status();
        assert_eq!(status.state, CombatState::PlayerTurn);
        assert_eq!(status.wave, 1);
        assert_eq!(status.hp, status.max_hp);
        assert_eq!(status.enemy.as_deref(), Some("Slime Lv.1"));
    }

    #[test]
    fn test_clones_share_one_run() {
        let a = session(2);
        let b = a.clone();
        assert!(a.perform(&PlayerAction::Attack, 0.0));
        assert_eq!(b.status().state, CombatState::EnemyTurn);
        // The attack is not accepted twice
        assert!(!b.perform(&PlayerAction::Attack, 0.0));
    }

    #[test]
    fn test_concurrent_drivers_keep_invariants() {
        let session = session(3);

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let session = session.clone();
                thread::spawn(move || {
                    for step in 0..500 {
                        let now = f64::from(step);
                        if worker == 0 {
                            session.update(now);
                        } else if !session.perform(&PlayerAction::Attack, now) {
                            session.leave_shop(now);
                        }
                        let status = session.status();
                        assert!(status.hp >= 0.0 && status.hp <= status.max_hp);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker panicked");
        }

        let status = session.status();
        assert!(status.highest_wave >= status.wave);
    }

    #[test]
    fn test_damage_events_drain_once() {
        let session = session(4);
        session.perform(&PlayerAction::Attack, 0.0);
        assert!(!session.drain_damage_events().is_empty());
        assert!(session.drain_damage_events().is_empty());
    }

    #[test]
    fn test_save_through_session() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = SaveManager::new(temp_dir.path(), SaveFormat::Json);
        let session = session(5);

        session.save(&manager, "run").expect("save");
        let loaded = manager.load("run").expect("load");
        assert_eq!(loaded.wave, 1);
        assert_eq!(loaded.player.name, "Hero");
    }
}
