//! Transient status effects.
//!
//! This module provides:
//! - Buffs and debuffs (flat stat deltas)
//! - One-shot counters that reflect incoming damage
//! - Damage over time, snapshotted from the caster at application
//!
//! Effects live in the [`EffectManager`], keyed by the owning entity's
//! [`EntityId`]. Entities never hold their own effect lists.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wavefall_common::EntityId;

use crate::damage::DamageType;
use crate::stats::{StatDeltas, StatKind, Stats};

/// Share of caster ATK added to physical DoT damage.
pub const PHYSICAL_DOT_SCALING: f64 = 0.2;
/// Share of caster magic power added to magical DoT damage.
pub const MAGICAL_DOT_SCALING: f64 = 0.3;

// ============================================================================
// Effect
// ============================================================================

/// Variant payload of an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Raises a stat.
    Buff {
        /// Stat modified.
        stat: StatKind,
        /// Amount added.
        value: f64,
    },
    /// Lowers a stat.
    Debuff {
        /// Stat modified.
        stat: StatKind,
        /// Amount removed (sign is ignored).
        value: f64,
    },
    /// Reflects a share of the next incoming hit back at the attacker.
    Counter {
        /// Fraction of incoming damage reflected.
        damage_percent: f64,
    },
    /// Deals flat damage at the start of each owner turn.
    DamageOverTime {
        /// Damage per tick (already scaled from the caster once stored).
        damage: f64,
        /// Damage type.
        damage_type: DamageType,
    },
}

/// An active effect on one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Entity the effect is attached to.
    pub target: EntityId,
    /// Owner turns remaining.
    pub duration: i32,
    /// Origin label (skill id, item id...).
    pub source: String,
    /// Variant payload.
    pub kind: EffectKind,
}

impl Effect {
    /// Create an effect.
    #[must_use]
    pub fn new(target: EntityId, kind: EffectKind, duration: i32, source: impl Into<String>) -> Self {
        Self {
            target,
            duration,
            source: source.into(),
            kind,
        }
    }

    /// Stat buff.
    #[must_use]
    pub fn buff(target: EntityId, stat: StatKind, value: f64, duration: i32) -> Self {
        Self::new(target, EffectKind::Buff { stat, value }, duration, "buff")
    }

    /// Stat debuff.
    #[must_use]
    pub fn debuff(target: EntityId, stat: StatKind, value: f64, duration: i32) -> Self {
        Self::new(target, EffectKind::Debuff { stat, value }, duration, "debuff")
    }

    /// Damage reflection counter.
    #[must_use]
    pub fn counter(target: EntityId, damage_percent: f64, duration: i32) -> Self {
        Self::new(target, EffectKind::Counter { damage_percent }, duration, "counter")
    }

    /// Damage over time.
    #[must_use]
    pub fn dot(target: EntityId, damage: f64, damage_type: DamageType, duration: i32) -> Self {
        Self::new(
            target,
            EffectKind::DamageOverTime {
                damage,
                damage_type,
            },
            duration,
            "dot",
        )
    }

    /// Check if expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.duration <= 0
    }

    /// Check if this is a counter.
    #[must_use]
    pub fn is_counter(&self) -> bool {
        matches!(self.kind, EffectKind::Counter { .. })
    }

    /// Short description for the combat log.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.kind {
            EffectKind::Buff { stat, value } => format!("{} +{value}", stat.label()),
            EffectKind::Debuff { stat, value } => format!("{} -{}", stat.label(), value.abs()),
            EffectKind::Counter { damage_percent } => {
                format!("Counter {:.0}%", damage_percent * 100.0)
            },
            EffectKind::DamageOverTime { damage, .. } => format!("{damage} damage per turn"),
        }
    }
}

// ============================================================================
// Effect Manager
// ============================================================================

/// Owns every active effect, keyed by entity.
#[derive(Debug, Clone, Default)]
pub struct EffectManager {
    effects: AHashMap<EntityId, Vec<Effect>>,
}

impl EffectManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an effect to `target`.
    ///
    /// DoT damage is scaled from the caster's current stats here and stored
    /// as a flat value; later changes to the caster do not affect it.
    /// Returns a copy of the stored effect.
    pub fn add_effect(&mut self, target: EntityId, mut effect: Effect, caster: Option<&Stats>) -> Effect {
        effect.target = target;

        if let EffectKind::DamageOverTime {
            damage,
            damage_type,
        } = &mut effect.kind
        {
            let bonus = caster.map_or(0.0, |c| match damage_type {
                DamageType::Physical => c.atk * PHYSICAL_DOT_SCALING,
                DamageType::Magical => c.magic_power * MAGICAL_DOT_SCALING,
            });
            *damage = (*damage + bonus).floor().max(1.0);
        }

        debug!(
            "Effect {} ({}) added to {target} for {} turns",
            effect.source,
            effect.describe(),
            effect.duration
        );
        self.effects.entry(target).or_default().push(effect.clone());
        effect
    }

    /// Active effects on an entity.
    #[must_use]
    pub fn effects_for(&self, entity: EntityId) -> &[Effect] {
        self.effects.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of active effects on an entity.
    #[must_use]
    pub fn active_count(&self, entity: EntityId) -> usize {
        self.effects_for(entity).len()
    }

    /// Decrement every effect on `entity` by one turn and drop expired ones.
    /// Returns the expired effects.
    pub fn tick_effects(&mut self, entity: EntityId) -> Vec<Effect> {
        let Some(list) = self.effects.get_mut(&entity) else {
            return Vec::new();
        };

        for effect in list.iter_mut() {
            effect.duration -= 1;
        }
        let (expired, active): (Vec<_>, Vec<_>) = list.drain(..).partition(Effect::is_expired);
        *list = active;
        if list.is_empty() {
            self.effects.remove(&entity);
        }
        expired
    }

    /// Sum of buff/debuff deltas per stat. Non-destructive.
    #[must_use]
    pub fn apply_active_effects(&self, entity: EntityId) -> StatDeltas {
        let mut deltas = StatDeltas::new();
        for effect in self.effects_for(entity) {
            match effect.kind {
                EffectKind::Buff { stat, value } => deltas.add(stat, value),
                EffectKind::Debuff { stat, value } => deltas.add(stat, -value.abs()),
                EffectKind::Counter { .. } | EffectKind::DamageOverTime { .. } => {},
            }
        }
        deltas
    }

    /// Apply every active DoT on `entity` to `stats.hp` (floored at 0) and
    /// return the total damage.
    pub fn process_dot_effects(&self, entity: EntityId, stats: &mut Stats) -> u32 {
        let total: u32 = self
            .effects_for(entity)
            .iter()
            .filter_map(|e| match e.kind {
                EffectKind::DamageOverTime { damage, .. } => Some(damage.max(0.0) as u32),
                _ => None,
            })
            .sum();

        if total > 0 {
            stats.take_damage(total);
        }
        total
    }

    /// Whether a counter is active on `entity`.
    #[must_use]
    pub fn has_counter_effect(&self, entity: EntityId) -> bool {
        self.effects_for(entity).iter().any(Effect::is_counter)
    }

    /// Consume the first counter on `entity`, reflecting part of
    /// `incoming_damage` onto `attacker`. Returns the reflected amount.
    pub fn trigger_counter(
        &mut self,
        entity: EntityId,
        attacker: &mut Stats,
        incoming_damage: u32,
    ) -> Option<u32> {
        let list = self.effects.get_mut(&entity)?;
        let index = list.iter().position(Effect::is_counter)?;
        let counter = list.remove(index);
        if list.is_empty() {
            self.effects.remove(&entity);
        }

        let EffectKind::Counter { damage_percent } = counter.kind else {
            return None;
        };
        let reflected = (f64::from(incoming_damage) * damage_percent.max(0.0)).floor() as u32;
        attacker.take_damage(reflected);
        debug!("Counter on {entity} reflected {reflected} damage");
        Some(reflected)
    }

    /// Drop every effect on `entity` (on death).
    pub fn clear_entity_effects(&mut self, entity: EntityId) {
        self.effects.remove(&entity);
    }

    /// Drop every effect.
    pub fn clear(&mut self) {
        self.effects.clear();
    }
}
