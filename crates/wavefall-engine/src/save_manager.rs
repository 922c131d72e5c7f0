//! Save file management.
//!
//! This module provides:
//! - SaveManager: write, read, list and delete run snapshots
//! - Atomic save operations (temp file + sync + rename)
//! - JSON or binary encoding, detected on read

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info, warn};
use wavefall_common::{CoreError, MagicBytes};
use wavefall_gameplay::{RunSnapshot, SnapshotError};

use crate::config::SaveFormat;

/// Default save directory name.
pub const DEFAULT_SAVE_DIR: &str = "saves";

/// Save file extension.
pub const SAVE_EXTENSION: &str = "sav";

/// Errors that can occur during save operations.
#[derive(Debug, Error)]
pub enum SaveError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding or decoding failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Save slot not found.
    #[error("Save slot not found: {0}")]
    SlotNotFound(String),

    /// Invalid slot name.
    #[error("Invalid slot name: {0}")]
    InvalidSlotName(String),

    /// Atomic write failed.
    #[error("Atomic write failed: {0}")]
    AtomicWriteFailed(String),
}

impl From<SaveError> for CoreError {
    fn from(err: SaveError) -> Self {
        match err {
            SaveError::Snapshot(e) => e.into(),
            other => Self::CorruptPersistedState(other.to_string()),
        }
    }
}

/// Result type for save operations.
pub type SaveResult<T> = Result<T, SaveError>;

/// Listing entry for one save slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSlotInfo {
    /// Slot name (file stem).
    pub name: String,
    /// Encoding found on disk.
    pub format: SaveFormat,
    /// File size.
    pub size_bytes: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
}

/// Reads and writes run snapshots in a save directory.
#[derive(Debug, Clone)]
pub struct SaveManager {
    save_dir: PathBuf,
    format: SaveFormat,
}

impl Default for SaveManager {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_DIR, SaveFormat::Json)
    }
}

impl SaveManager {
    /// Creates a new save manager writing `format`.
    #[must_use]
    pub fn new(save_dir: impl AsRef<Path>, format: SaveFormat) -> Self {
        Self {
            save_dir: save_dir.as_ref().to_path_buf(),
            format,
        }
    }

    /// Returns the save directory path.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Encoding used for new saves.
    #[must_use]
    pub const fn format(&self) -> SaveFormat {
        self.format
    }

    /// Ensures the save directory exists.
    pub fn ensure_save_dir(&self) -> SaveResult<()> {
        if !self.save_dir.exists() {
            fs::create_dir_all(&self.save_dir)?;
            info!("Created save directory: {:?}", self.save_dir);
        }
        Ok(())
    }

    /// Returns the path for a save slot.
    #[must_use]
    pub fn slot_path(&self, slot_name: &str) -> PathBuf {
        self.save_dir.join(format!("{slot_name}.{SAVE_EXTENSION}"))
    }

    /// Returns the temp path for atomic writes.
    fn temp_path(&self, slot_name: &str) -> PathBuf {
        self.save_dir.join(format!("{slot_name}.{SAVE_EXTENSION}.tmp"))
    }

    /// Validates a slot name.
    fn validate_slot_name(slot_name: &str) -> SaveResult<()> {
        if slot_name.trim().is_empty() {
            return Err(SaveError::InvalidSlotName("Empty slot name".to_string()));
        }

        let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
        if let Some(c) = slot_name.chars().find(|c| invalid_chars.contains(c)) {
            return Err(SaveError::InvalidSlotName(format!(
                "Invalid character '{c}' in slot name"
            )));
        }
        if slot_name.starts_with('.') {
            return Err(SaveError::InvalidSlotName(format!("Hidden slot name {slot_name}")));
        }

        Ok(())
    }

    /// Encode a snapshot in the configured format.
    pub fn encode(&self, snapshot: &RunSnapshot) -> SaveResult<Vec<u8>> {
        Ok(match self.format {
            SaveFormat::Json => snapshot.to_json()?.into_bytes(),
            SaveFormat::Binary => snapshot.to_bytes()?,
        })
    }

    /// Saves a snapshot to a slot. Returns the written path.
    pub fn save(&self, slot_name: &str, snapshot: &RunSnapshot) -> SaveResult<PathBuf> {
        Self::validate_slot_name(slot_name)?;
        self.ensure_save_dir()?;

        let bytes = self.encode(snapshot)?;
        let path = self.atomic_write(slot_name, &bytes)?;
        info!(
            "Saved run to slot {} (wave {}, {} bytes)",
            slot_name,
            snapshot.wave,
            bytes.len()
        );
        Ok(path)
    }

    /// Performs atomic write (temp file + rename).
    fn atomic_write(&self, slot_name: &str, bytes: &[u8]) -> SaveResult<PathBuf> {
        let temp_path = self.temp_path(slot_name);
        let final_path = self.slot_path(slot_name);

        {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &final_path).map_err(|e| {
            // Clean up temp file on failure
            let _ = fs::remove_file(&temp_path);
            SaveError::AtomicWriteFailed(e.to_string())
        })?;

        debug!("Atomic write complete for slot: {}", slot_name);
        Ok(final_path)
    }

    /// Raw bytes of a slot, undecoded.
    pub fn load_bytes(&self, slot_name: &str) -> SaveResult<Vec<u8>> {
        Self::validate_slot_name(slot_name)?;

        let path = self.slot_path(slot_name);
        if !path.exists() {
            return Err(SaveError::SlotNotFound(slot_name.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Loads and decodes a slot. Either encoding is accepted.
    pub fn load(&self, slot_name: &str) -> SaveResult<RunSnapshot> {
        let bytes = self.load_bytes(slot_name)?;
        let snapshot = RunSnapshot::decode(&bytes).map_err(|e| {
            warn!("Save slot {} is unreadable: {}", slot_name, e);
            e
        })?;
        info!("Loaded run from slot: {}", slot_name);
        Ok(snapshot)
    }

    /// Checks if a slot exists.
    #[must_use]
    pub fn slot_exists(&self, slot_name: &str) -> bool {
        self.slot_path(slot_name).is_file()
    }

    /// Deletes a save slot.
    pub fn delete_slot(&self, slot_name: &str) -> SaveResult<()> {
        Self::validate_slot_name(slot_name)?;

        let path = self.slot_path(slot_name);
        if !path.exists() {
            return Err(SaveError::SlotNotFound(slot_name.to_string()));
        }
        fs::remove_file(&path)?;

        info!("Deleted save slot: {}", slot_name);
        Ok(())
    }

    /// Lists all save slots, sorted by name. A missing directory has none.
    pub fn list_slots(&self) -> SaveResult<Vec<SaveSlotInfo>> {
        if !self.save_dir.exists() {
            return Ok(Vec::new());
        }

        let mut slots = Vec::new();
        for entry in fs::read_dir(&self.save_dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == SAVE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem() else {
                continue;
            };

            let metadata = fs::metadata(&path)?;
            let mut head = [0_u8; 4];
            let format = match File::open(&path).and_then(|mut f| std::io::Read::read_exact(&mut f, &mut head)) {
                Ok(()) if MagicBytes::SNAPSHOT.matches(&head) => SaveFormat::Binary,
                _ => SaveFormat::Json,
            };

            slots.push(SaveSlotInfo {
                name: stem.to_string_lossy().to_string(),
                format,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }

        slots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(slots)
    }
}
