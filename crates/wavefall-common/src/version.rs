//! Version types for persisted data.

use serde::{Deserialize, Serialize};

/// Schema version using semantic versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u16,
    /// Minor version (backwards-compatible additions)
    pub minor: u16,
    /// Patch version (bug fixes)
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a new schema version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Current run snapshot version.
    pub const RUN_SNAPSHOT: Self = Self::new(1, 0, 0);

    /// Whether data written at `data_version` can be read. Only a major
    /// bump breaks compatibility; newer minors add defaulted fields.
    #[must_use]
    pub const fn can_read(&self, data_version: &Self) -> bool {
        self.major == data_version.major
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Magic bytes for file format identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicBytes(pub [u8; 4]);

impl MagicBytes {
    /// Binary run snapshot magic bytes.
    pub const SNAPSHOT: Self = Self(*b"WFSV");

    /// Returns the raw bytes.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Checks whether `data` starts with these magic bytes.
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= 4 && data[..4] == self.0
    }
}
