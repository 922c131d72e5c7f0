//! Catalog content loading.
//!
//! This module provides:
//! - Loading the six catalog tables from `<dir>/<table>.json` or `.ron`
//! - Per-entry validation, skipping bad entries with a warning
//! - Building the immutable, `Arc`-shared [`GameCatalog`]
//!
//! Nothing here is fatal. A missing table loads as empty and a malformed
//! entry is dropped, so a broken content directory still yields a playable
//! (if sparse) catalog.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};
use wavefall_common::CoreError;
use wavefall_gameplay::{CatalogTables, EnemyDef, GameCatalog, ItemDef, RecipeDef, SkillDef, UpgradeDef, ZoneDef};

/// Default asset path for catalog tables.
pub const DEFAULT_CATALOG_PATH: &str = "assets/catalog";

/// File extensions tried for each table, in order.
pub const TABLE_EXTENSIONS: [&str; 2] = ["json", "ron"];

/// Errors that can occur while loading a catalog table.
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    /// No file exists for the table.
    #[error("Catalog table not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read file.
    #[error("Failed to read catalog file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The file is not a list of entries.
    #[error("Failed to parse catalog file {path}: {message}")]
    ParseError {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// An entry parsed but is unusable.
    #[error("Catalog validation error: {0}")]
    ValidationError(String),
}

impl From<CatalogLoadError> for CoreError {
    fn from(err: CatalogLoadError) -> Self {
        Self::ContentDataMissing(err.to_string())
    }
}

/// Result type for catalog loading operations.
pub type CatalogLoadResult<T> = Result<T, CatalogLoadError>;

// ============================================================================
// Entries
// ============================================================================

/// A row type stored in one catalog table.
pub trait CatalogEntry: DeserializeOwned {
    /// Table (and file stem) name.
    const TABLE: &'static str;

    /// Entry id, used in diagnostics.
    fn entry_id(&self) -> &str;

    /// Check the entry after parsing.
    fn validate(&self) -> CatalogLoadResult<()> {
        if self.entry_id().trim().is_empty() {
            return Err(CatalogLoadError::ValidationError(format!(
                "{} entry has an empty id",
                Self::TABLE
            )));
        }
        Ok(())
    }
}

impl CatalogEntry for EnemyDef {
    const TABLE: &'static str = "enemies";

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }

    fn validate(&self) -> CatalogLoadResult<()> {
        if self.id.is_empty() {
            return Err(CatalogLoadError::ValidationError("enemy has an empty id".into()));
        }
        if !self.hp_base.is_finite() || self.hp_base <= 0.0 {
            return Err(CatalogLoadError::ValidationError(format!(
                "enemy `{}` has invalid hp_base {}",
                self.id, self.hp_base
            )));
        }
        if self.max_wave != 0 && self.max_wave < self.min_wave {
            return Err(CatalogLoadError::ValidationError(format!(
                "enemy `{}` has max_wave {} below min_wave {}",
                self.id, self.max_wave, self.min_wave
            )));
        }
        Ok(())
    }
}

impl CatalogEntry for ItemDef {
    const TABLE: &'static str = "items";

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

impl CatalogEntry for SkillDef {
    const TABLE: &'static str = "skills";

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }

    fn validate(&self) -> CatalogLoadResult<()> {
        if self.id.is_empty() {
            return Err(CatalogLoadError::ValidationError("skill has an empty id".into()));
        }
        if let Some(multi) = self.multi_hit {
            if multi.hits == 0 {
                return Err(CatalogLoadError::ValidationError(format!(
                    "skill `{}` has a multi-hit with zero hits",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

impl CatalogEntry for RecipeDef {
    const TABLE: &'static str = "recipes";

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }

    fn validate(&self) -> CatalogLoadResult<()> {
        if self.id.is_empty() {
            return Err(CatalogLoadError::ValidationError("recipe has an empty id".into()));
        }
        if self.result_quantity == 0 {
            return Err(CatalogLoadError::ValidationError(format!(
                "recipe `{}` has zero result quantity",
                self.id
            )));
        }
        Ok(())
    }
}

impl CatalogEntry for ZoneDef {
    const TABLE: &'static str = "zones";

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

impl CatalogEntry for UpgradeDef {
    const TABLE: &'static str = "upgrades";

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Statistics for the catalog loader.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CatalogLoaderStats {
    /// Number of files loaded.
    pub files_loaded: u32,
    /// Number of entries kept.
    pub entries_loaded: u32,
    /// Number of entries skipped as malformed or invalid.
    pub validation_errors: u32,
    /// Number of tables with no usable file.
    pub missing_tables: u32,
}

/// Loads catalog tables from a content directory.
#[derive(Debug)]
pub struct CatalogLoader {
    /// Directory holding the table files.
    base_path: PathBuf,
    /// Statistics.
    stats: CatalogLoaderStats,
}

impl CatalogLoader {
    /// Creates a new catalog loader.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        debug!("Initializing catalog loader at: {:?}", base_path);

        Self {
            base_path,
            stats: CatalogLoaderStats::default(),
        }
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns loader statistics.
    #[must_use]
    pub fn stats(&self) -> &CatalogLoaderStats {
        &self.stats
    }

    /// Load every table and build the catalog.
    pub fn load(&mut self) -> Arc<GameCatalog> {
        let tables = CatalogTables {
            enemies: self.load_table(),
            items: self.load_table(),
            skills: self.load_table(),
            recipes: self.load_table(),
            zones: self.load_table(),
            upgrades: self.load_table(),
        };

        let catalog = GameCatalog::from_tables(tables);
        for problem in catalog.validate() {
            warn!("{problem}");
        }

        info!(
            "Loaded {} catalog entries from {} files ({} skipped, {} tables missing)",
            self.stats.entries_loaded,
            self.stats.files_loaded,
            self.stats.validation_errors,
            self.stats.missing_tables
        );

        Arc::new(catalog)
    }

    /// Load one table. A missing or unreadable table yields no entries.
    pub fn load_table<T: CatalogEntry>(&mut self) -> Vec<T> {
        let result = self.find_table(T::TABLE).and_then(|path| self.load_file::<T>(&path));
        match result {
            Ok(entries) => entries,
            Err(err) => {
                let err = CoreError::from(err);
                warn!("{err}; using an empty {} table", T::TABLE);
                self.stats.missing_tables += 1;
                Vec::new()
            },
        }
    }

    /// Path of the first existing file for `table`.
    pub fn find_table(&self, table: &str) -> CatalogLoadResult<PathBuf> {
        TABLE_EXTENSIONS
            .iter()
            .map(|ext| self.base_path.join(format!("{table}.{ext}")))
            .find(|path| path.is_file())
            .ok_or_else(|| CatalogLoadError::NotFound(self.base_path.join(format!("{table}.json"))))
    }

    /// Loads entries from a single file, skipping invalid ones.
    pub fn load_file<T: CatalogEntry>(&mut self, path: &Path) -> CatalogLoadResult<Vec<T>> {
        debug!("Loading catalog file: {:?}", path);

        let content = fs::read_to_string(path)?;
        let is_ron = path.extension().is_some_and(|ext| ext == "ron");
        let (parsed, mut skipped) = if is_ron {
            parse_ron::<T>(path, &content)?
        } else {
            parse_json::<T>(path, &content)?
        };

        let mut entries = Vec::with_capacity(parsed.len());
        for entry in parsed {
            if let Err(e) = entry.validate() {
                warn!("Invalid entry in {:?}: {}", path, e);
                skipped += 1;
                continue;
            }
            entries.push(entry);
        }

        self.stats.files_loaded += 1;
        self.stats.validation_errors += skipped;
        self.stats.entries_loaded += entries.len() as u32;
        debug!("Loaded {} {} from {:?}", entries.len(), T::TABLE, path);

        Ok(entries)
    }
}

/// Entries of a parsed file plus the count of entries that failed to parse.
type Parsed<T> = (Vec<T>, u32);

/// JSON tables are a list of entries, or an object holding that list under
/// the table name.
fn parse_json<T: CatalogEntry>(path: &Path, content: &str) -> CatalogLoadResult<Parsed<T>> {
    let value: serde_json::Value = serde_json::from_str(content).map_err(|e| CatalogLoadError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let rows = match value {
        serde_json::Value::Array(rows) => rows,
        serde_json::Value::Object(mut map) => match map.remove(T::TABLE) {
            Some(serde_json::Value::Array(rows)) => rows,
            _ => {
                return Err(CatalogLoadError::ParseError {
                    path: path.to_path_buf(),
                    message: format!("expected a `{}` list", T::TABLE),
                })
            },
        },
        _ => {
            return Err(CatalogLoadError::ParseError {
                path: path.to_path_buf(),
                message: "expected a list of entries".into(),
            })
        },
    };

    Ok(entries_from_values(path, rows))
}

/// RON tables use struct syntax. When the list as a whole does not parse,
/// entries are retried one by one so a single bad entry is dropped alone.
fn parse_ron<T: CatalogEntry>(path: &Path, content: &str) -> CatalogLoadResult<Parsed<T>> {
    if let Ok(entries) = ron::from_str::<Vec<T>>(content) {
        return Ok((entries, 0));
    }

    let rows: Vec<serde_json::Value> = ron::from_str(content).map_err(|e| CatalogLoadError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(entries_from_values(path, rows))
}

fn entries_from_values<T: CatalogEntry>(path: &Path, rows: Vec<serde_json::Value>) -> Parsed<T> {
    let mut entries = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<T>(row) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!("Skipping malformed {} entry #{index} in {:?}: {e}", T::TABLE, path);
                skipped += 1;
            },
        }
    }
    (entries, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wavefall_gameplay::Classification;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).expect("write table");
    }

    #[test]
    fn test_missing_directory_gives_empty_catalog() {
        let mut loader = CatalogLoader::new("/nonexistent/wavefall/catalog");
        let catalog = loader.load();
        assert!(catalog.is_empty());
        assert_eq!(loader.stats().missing_tables, 6);
        assert_eq!(loader.stats().files_loaded, 0);
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(
            &dir,
            "enemies.json",
            r#"[
                {"id": "goblin", "name": "Goblin", "hp_base": 30, "atk_base": 6, "category": "beast"},
                {"id": "broken", "name": "Broken"},
                {"id": "ghost", "name": "Ghost", "hp_base": 0, "atk_base": 4}
            ]"#,
        );

        let mut loader = CatalogLoader::new(dir.path());
        let enemies: Vec<EnemyDef> = loader.load_table();
        assert_eq!(enemies.len(), 1);
        assert_eq!(enemies[0].id.as_str(), "goblin");
        assert_eq!(loader.stats().validation_errors, 2);
        assert_eq!(loader.stats().entries_loaded, 1);
    }

    #[test]
    fn test_json_object_keyed_by_table() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(
            &dir,
            "items.json",
            r#"{"items": [{"id": "potion", "name": "Potion", "type": "consumable", "heal": 50, "price": 20}]}"#,
        );

        let mut loader = CatalogLoader::new(dir.path());
        let items: Vec<ItemDef> = loader.load_table();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].heal, 50.0);
    }

    #[test]
    fn test_unparseable_file_counts_as_missing() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(&dir, "zones.json", "{ not json");

        let mut loader = CatalogLoader::new(dir.path());
        let zones: Vec<ZoneDef> = loader.load_table();
        assert!(zones.is_empty());
        assert_eq!(loader.stats().missing_tables, 1);
    }

    #[test]
    fn test_ron_table() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(
            &dir,
            "enemies.ron",
            r#"[
                (
                    id: "warlord",
                    name: "Warlord",
                    classification: boss,
                    category: "humanoid",
                    hp_base: 200.0,
                    atk_base: 20.0,
                    spawn_on_wave_multiple_of: 10,
                ),
            ]"#,
        );

        let mut loader = CatalogLoader::new(dir.path());
        let enemies: Vec<EnemyDef> = loader.load_table();
        assert_eq!(enemies.len(), 1);
        assert_eq!(enemies[0].classification, Classification::Boss);
        assert_eq!(enemies[0].spawn_on_wave_multiple_of, 10);
    }

    #[test]
    fn test_json_preferred_over_ron() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(&dir, "upgrades.json", r#"[{"id": "vigor", "stat": "max_hp", "cost": 5, "max_level": 10, "per_level": 10}]"#);
        write(&dir, "upgrades.ron", "[]");

        let loader = CatalogLoader::new(dir.path());
        let path = loader.find_table("upgrades").expect("table present");
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
    }

    #[test]
    fn test_load_error_maps_to_content_missing() {
        let err = CoreError::from(CatalogLoadError::NotFound(PathBuf::from("skills.json")));
        assert!(matches!(err, CoreError::ContentDataMissing(_)));
    }

    #[test]
    fn test_bundled_catalog_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/catalog");
        let mut loader = CatalogLoader::new(dir);
        let catalog = loader.load();

        assert_eq!(loader.stats().missing_tables, 0);
        assert_eq!(loader.stats().validation_errors, 0);
        assert!(catalog.validate().is_empty());
        assert!(catalog.item("health_potion").is_some());
        assert!(catalog.skill("fireball").is_some());
        assert!(!catalog.enemies().is_empty());
    }
}
