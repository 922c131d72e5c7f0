//! Outbound streams for the presentation layer: the combat log and the
//! damage-event queue.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

use wavefall_common::EntityId;

// ============================================================================
// Combat Log
// ============================================================================

/// Default number of log entries kept.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Category of a log line, used by the UI for coloring and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// General information.
    Info,
    /// Something the player did.
    Player,
    /// Something the enemy did.
    Enemy,
    /// Critical hit.
    Crit,
    /// Healing or regeneration.
    Heal,
    /// Effect applied, expired or triggered.
    Effect,
    /// Gold, xp, coins, loot, skills.
    Reward,
    /// Wave progression and shop.
    Wave,
    /// A recoverable problem the player should see.
    Warning,
}

/// One combat log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Text.
    pub message: String,
    /// Category.
    pub category: LogCategory,
    /// Time the entry was written.
    pub timestamp: f64,
}

/// Append-only log keeping the most recent entries.
#[derive(Debug, Clone)]
pub struct CombatLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for CombatLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl CombatLog {
    /// Creates a log keeping at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, message: impl Into<String>, category: LogCategory, timestamp: f64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            message: message.into(),
            category,
            timestamp,
        });
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter()
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ============================================================================
// Damage Events
// ============================================================================

/// What a damage event shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// Regular hit.
    Hit,
    /// Critical hit.
    Crit,
    /// Healing.
    Heal,
    /// Attack dodged (amount is 0).
    Dodge,
    /// Damage over time tick.
    Dot,
    /// Counter reflection.
    Counter,
}

/// A floating-number event for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Entity the number appears on.
    pub target: EntityId,
    /// Amount.
    pub amount: u32,
    /// Kind.
    pub kind: DamageKind,
    /// Time of the event.
    pub timestamp: f64,
}

/// Bounded queue of damage events. Each event is delivered once.
#[derive(Debug)]
pub struct DamageEventQueue {
    /// Sender for publishing events
    sender: Sender<DamageEvent>,
    /// Receiver for draining events
    receiver: Receiver<DamageEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for DamageEventQueue {
    fn default() -> Self {
        Self::new(256)
    }
}

impl DamageEventQueue {
    /// Creates a new queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event. If the consumer has fallen behind and the queue is
    /// full, the event is dropped.
    pub fn publish(&self, event: DamageEvent) {
        if self.sender.try_send(event).is_err() {
            trace!("Damage event queue full, dropping {:?}", event.kind);
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<DamageEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new receiver handle, for a consumer on another thread.
    #[must_use]
    pub fn receiver(&self) -> Receiver<DamageEvent> {
        self.receiver.clone()
    }
}
