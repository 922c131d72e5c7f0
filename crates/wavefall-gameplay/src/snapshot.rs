//! Serializable run state.
//!
//! A snapshot holds what survives a restart: the player, wave progress,
//! whether the shop is open and the enemy being fought. Effects, the combat
//! log and pacing timers are not persisted.
//!
//! Two encodings are supported: JSON text and a binary form made of the
//! `WFSV` magic followed by bincode.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use wavefall_common::{CoreError, MagicBytes, SchemaVersion};

use crate::enemy::Enemy;
use crate::player::{Player, STARTING_MANA_REGEN, STARTING_MAX_MANA};
use crate::stats::{StatKind, Stats};

/// Errors reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Binary data without the snapshot magic bytes.
    #[error("Invalid snapshot format")]
    InvalidFormat,

    /// Written by an incompatible schema.
    #[error("Incompatible snapshot version: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build reads
        expected: SchemaVersion,
        /// Version found in the data
        found: SchemaVersion,
    },

    /// Encoding failed.
    #[error("Snapshot serialization failed: {0}")]
    Serialization(String),

    /// Decoding failed.
    #[error("Snapshot corrupted: {0}")]
    Corrupted(String),
}

impl From<SnapshotError> for CoreError {
    fn from(err: SnapshotError) -> Self {
        Self::CorruptPersistedState(err.to_string())
    }
}

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Persistable state of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Schema version.
    pub version: SchemaVersion,
    /// The player.
    pub player: Player,
    /// Current wave.
    pub wave: u32,
    /// Highest wave reached.
    pub highest_wave: u32,
    /// Whether the shop was open.
    #[serde(default)]
    pub in_shop: bool,
    /// Enemy being fought (absent in the shop).
    #[serde(default)]
    pub enemy: Option<Enemy>,
}

impl RunSnapshot {
    /// Creates a snapshot at the current schema version.
    #[must_use]
    pub fn new(player: Player, wave: u32, highest_wave: u32, in_shop: bool, enemy: Option<Enemy>) -> Self {
        Self {
            version: SchemaVersion::RUN_SNAPSHOT,
            player,
            wave,
            highest_wave,
            in_shop,
            enemy,
        }
    }

    // === Encoding ===

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> SnapshotResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    /// Deserializes from JSON and checks the version.
    pub fn from_json(text: &str) -> SnapshotResult<Self> {
        let snapshot: Self = serde_json::from_str(text).map_err(|e| SnapshotError::Corrupted(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Serializes to the binary form.
    pub fn to_bytes(&self) -> SnapshotResult<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(MagicBytes::SNAPSHOT.bytes());
        let data = bincode::serialize(self).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        buffer.extend(data);
        Ok(buffer)
    }

    /// Deserializes from the binary form and checks the version.
    pub fn from_bytes(bytes: &[u8]) -> SnapshotResult<Self> {
        if !MagicBytes::SNAPSHOT.matches(bytes) {
            return Err(SnapshotError::InvalidFormat);
        }
        let snapshot: Self =
            bincode::deserialize(&bytes[4..]).map_err(|e| SnapshotError::Corrupted(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Decodes either form, picking binary when the magic bytes are present.
    pub fn decode(bytes: &[u8]) -> SnapshotResult<Self> {
        if MagicBytes::SNAPSHOT.matches(bytes) {
            return Self::from_bytes(bytes);
        }
        let text = std::str::from_utf8(bytes).map_err(|_| SnapshotError::InvalidFormat)?;
        Self::from_json(text)
    }

    fn check_version(&self) -> SnapshotResult<()> {
        if SchemaVersion::RUN_SNAPSHOT.can_read(&self.version) {
            Ok(())
        } else {
            Err(SnapshotError::VersionMismatch {
                expected: SchemaVersion::RUN_SNAPSHOT,
                found: self.version,
            })
        }
    }

    // === Repair ===

    /// Bring out-of-range values back into range. Returns the number of
    /// fields changed.
    ///
    /// Non-finite or negative player stats fall back to their starting
    /// values; hp is kept at least 1, level at least 1 and mana at least 0.
    pub fn repair(&mut self) -> u32 {
        let mut fixed = 0;

        let starting = Stats {
            max_mana: STARTING_MAX_MANA,
            mana_regen: STARTING_MANA_REGEN,
            ..Stats::default()
        };
        let player = &mut self.player;
        fixed += repair_stats(&mut player.base, &starting);
        fixed += repair_stats(&mut player.stats, &starting);

        if !player.stats.hp.is_finite() || player.stats.hp < 1.0 {
            player.stats.hp = 1.0;
            fixed += 1;
        }
        if player.level == 0 {
            player.level = 1;
            fixed += 1;
        }
        if !player.current_mana.is_finite() || player.current_mana < 0.0 {
            player.current_mana = 0.0;
            fixed += 1;
        }
        if !player.cumulative_price_increase.is_finite() || player.cumulative_price_increase < 0.0 {
            player.cumulative_price_increase = 0.0;
            fixed += 1;
        }
        player.inventory.prune();
        player.skill_levels.retain(|_, level| *level > 0);

        if self.wave == 0 {
            self.wave = 1;
            fixed += 1;
        }
        if self.highest_wave < self.wave {
            self.highest_wave = self.wave;
            fixed += 1;
        }

        if let Some(enemy) = self.enemy.as_mut() {
            let before = enemy.stats.clone();
            enemy.stats.sanitize();
            if enemy.stats != before {
                fixed += 1;
            }
        }
        if self.in_shop && self.enemy.take().is_some() {
            fixed += 1;
        }

        if fixed > 0 {
            warn!("Repaired {fixed} out-of-range fields in run snapshot");
        } else {
            debug!("Run snapshot needed no repair");
        }
        fixed
    }
}

/// Replace non-finite or negative stats with their defaults. Current hp is
/// handled by the caller.
fn repair_stats(stats: &mut Stats, defaults: &Stats) -> u32 {
    let mut fixed = 0;
    for kind in StatKind::ALL {
        let value = stats.get(kind);
        if !value.is_finite() || value < 0.0 {
            *stats.get_mut(kind) = defaults.get(kind);
            fixed += 1;
        }
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::fallback_slime;

    fn snapshot() -> RunSnapshot {
        let mut player = Player::new("Hero", 42);
        player.gold = 120;
        player.level = 4;
        player.inventory.add("potion", 3);
        player.learn_skill("fireball");
        RunSnapshot::new(player, 12, 15, false, Some(fallback_slime(12)))
    }

    #[test]
    fn test_json_round_trip() {
        let original = snapshot();
        let text = original.to_json().unwrap();
        let loaded = RunSnapshot::from_json(&text).unwrap();
        assert_eq!(loaded.wave, 12);
        assert_eq!(loaded.highest_wave, 15);
        assert_eq!(loaded.player.gold, 120);
        assert_eq!(loaded.player.inventory.count("potion"), 3);
        assert!(loaded.player.has_skill("fireball"));
        assert_eq!(loaded.enemy, original.enemy);
    }

    #[test]
    fn test_binary_round_trip() {
        let bytes = snapshot().to_bytes().unwrap();
        assert!(MagicBytes::SNAPSHOT.matches(&bytes));
        let loaded = RunSnapshot::decode(&bytes).unwrap();
        assert_eq!(loaded.player.level, 4);
        assert_eq!(loaded.player.game_seed, 42);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let err = RunSnapshot::from_bytes(b"NOPE0000").unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidFormat));
        assert!(matches!(CoreError::from(err), CoreError::CorruptPersistedState(_)));
    }

    #[test]
    fn test_truncated_binary_is_corrupt() {
        let bytes = snapshot().to_bytes().unwrap();
        let err = RunSnapshot::from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupted(_)));
    }

    #[test]
    fn test_future_major_version_rejected() {
        let mut s = snapshot();
        s.version = SchemaVersion::new(2, 0, 0);
        let text = s.to_json().unwrap();
        let err = RunSnapshot::from_json(&text).unwrap_err();
        assert!(matches!(err, SnapshotError::VersionMismatch { .. }));
    }

    #[test]
    fn test_garbage_json_is_corrupt() {
        assert!(matches!(
            RunSnapshot::decode(b"{ not json"),
            Err(SnapshotError::Corrupted(_))
        ));
    }

    #[test]
    fn test_repair_fixes_out_of_range_values() {
        let mut s = snapshot();
        s.player.stats.hp = -5.0;
        s.player.level = 0;
        s.player.current_mana = f64::NAN;
        s.player.base.atk = -3.0;
        s.player.base.gold_modifier = f64::NAN;
        s.wave = 0;
        s.highest_wave = 0;

        assert!(s.repair() > 0);
        assert_eq!(s.player.stats.hp, 1.0);
        assert_eq!(s.player.level, 1);
        assert_eq!(s.player.current_mana, 0.0);
        assert_eq!(s.player.base.atk, 10.0);
        assert_eq!(s.player.base.gold_modifier, 1.0);
        assert_eq!(s.wave, 1);
        assert_eq!(s.highest_wave, 1);

        assert_eq!(s.repair(), 0);
    }

    #[test]
    fn test_shop_snapshot_drops_enemy() {
        let mut s = snapshot();
        s.in_shop = true;
        s.repair();
        assert!(s.enemy.is_none());
    }
}
