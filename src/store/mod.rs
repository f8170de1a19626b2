//! Persistent storage of learned filename patterns.
//!
//! The store is pure data access: no parsing happens here. Reads are safe to
//! run concurrently; writes rely on the storage layer's uniqueness constraints
//! on `pattern` and on the learning key (group + title pattern).

mod sqlite;

pub use sqlite::SqlitePatternStore;

use crate::models::mapping::{FilenameMapping, PatternStats};
use crate::Result;
use chrono::{DateTime, Utc};

/// Data access for learned mappings.
pub trait PatternStore: Send + Sync {
    /// Insert a new mapping.
    ///
    /// Fails with [`crate::Error::DuplicatePattern`] when the pattern or the
    /// learning key is already taken.
    fn insert(&self, mapping: &FilenameMapping) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<FilenameMapping>>;

    /// Look up a mapping by its normalized filename.
    fn find_by_pattern(&self, pattern: &str) -> Result<Option<FilenameMapping>>;

    /// Look up a mapping by group + title pattern key.
    fn find_by_learning_key(&self, key: &str) -> Result<Option<FilenameMapping>>;

    /// Mappings carrying a regex for a group (or for names without one),
    /// most used first, then most recently used.
    fn regex_candidates(&self, fansub_group: Option<&str>) -> Result<Vec<FilenameMapping>>;

    /// All mappings, most used first.
    fn list(&self) -> Result<Vec<FilenameMapping>>;

    fn stats(&self) -> Result<PatternStats>;

    /// Bump `use_count` and set `last_used_at`.
    fn record_use(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Delete a mapping; unknown ids fail with [`crate::Error::NotFound`].
    fn delete(&self, id: &str) -> Result<()>;
}
