//! SQLite-backed pattern store.

use super::PatternStore;
use crate::models::mapping::{FilenameMapping, PatternStats};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS filename_mappings (
    id            TEXT PRIMARY KEY,
    pattern       TEXT NOT NULL UNIQUE,
    pattern_type  TEXT NOT NULL,
    pattern_regex TEXT,
    fansub_group  TEXT,
    group_key     TEXT,
    title_pattern TEXT,
    learning_key  TEXT NOT NULL UNIQUE,
    metadata_type TEXT NOT NULL,
    metadata_id   TEXT NOT NULL,
    tmdb_id       INTEGER,
    confidence    REAL NOT NULL DEFAULT 1.0,
    use_count     INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    last_used_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_mappings_group ON filename_mappings(group_key);
CREATE INDEX IF NOT EXISTS idx_mappings_usage ON filename_mappings(use_count DESC, last_used_at DESC);
"#;

const COLUMNS: &str = "id, pattern, pattern_type, pattern_regex, fansub_group, title_pattern, \
     metadata_type, metadata_id, tmdb_id, confidence, use_count, created_at, last_used_at";

/// Pattern store on a single SQLite connection.
pub struct SqlitePatternStore {
    conn: Mutex<Connection>,
}

impl SqlitePatternStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=5000;
        ",
        )?;
        tracing::debug!("Opened pattern store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::other("pattern store connection lock poisoned"))
    }

    fn find_one(&self, column: &str, value: &str) -> Result<Option<FilenameMapping>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM filename_mappings WHERE {} = ?1",
            COLUMNS, column
        );
        let mapping = conn
            .query_row(&sql, params![value], row_to_mapping)
            .optional()?;
        Ok(mapping)
    }

    fn query_all(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<FilenameMapping>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_mapping)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn conversion_error(index: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn row_to_mapping(row: &Row<'_>) -> rusqlite::Result<FilenameMapping> {
    let pattern_type: String = row.get(2)?;
    let metadata_type: String = row.get(6)?;
    Ok(FilenameMapping {
        id: row.get(0)?,
        pattern: row.get(1)?,
        pattern_type: pattern_type.parse().map_err(|e| conversion_error(2, e))?,
        pattern_regex: row.get(3)?,
        fansub_group: row.get(4)?,
        title_pattern: row.get(5)?,
        metadata_type: metadata_type.parse().map_err(|e| conversion_error(6, e))?,
        metadata_id: row.get(7)?,
        tmdb_id: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
        confidence: row.get::<_, f64>(9)? as f32,
        use_count: row.get::<_, i64>(10)?.max(0) as u64,
        created_at: row.get(11)?,
        last_used_at: row.get(12)?,
    })
}

/// Case-folded group used to scope regex candidates; matches the learning key.
fn group_key(group: &str) -> String {
    group.trim().to_lowercase()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
}

impl PatternStore for SqlitePatternStore {
    fn insert(&self, mapping: &FilenameMapping) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO filename_mappings (id, pattern, pattern_type, pattern_regex, fansub_group,
                group_key, title_pattern, learning_key, metadata_type, metadata_id, tmdb_id,
                confidence, use_count, created_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                mapping.id,
                mapping.pattern,
                mapping.pattern_type.as_str(),
                mapping.pattern_regex,
                mapping.fansub_group,
                mapping.fansub_group.as_deref().map(group_key),
                mapping.title_pattern,
                mapping.learning_key(),
                mapping.metadata_type.as_str(),
                mapping.metadata_id,
                mapping.tmdb_id.map(|v| v as i64),
                mapping.confidence as f64,
                mapping.use_count as i64,
                mapping.created_at,
                mapping.last_used_at,
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::DuplicatePattern(mapping.pattern.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, id: &str) -> Result<Option<FilenameMapping>> {
        self.find_one("id", id)
    }

    fn find_by_pattern(&self, pattern: &str) -> Result<Option<FilenameMapping>> {
        self.find_one("pattern", pattern)
    }

    fn find_by_learning_key(&self, key: &str) -> Result<Option<FilenameMapping>> {
        self.find_one("learning_key", key)
    }

    fn regex_candidates(&self, fansub_group: Option<&str>) -> Result<Vec<FilenameMapping>> {
        let order = "ORDER BY use_count DESC, last_used_at DESC, created_at DESC";
        match fansub_group {
            Some(group) => self.query_all(
                &format!(
                    "SELECT {} FROM filename_mappings
                     WHERE pattern_regex IS NOT NULL AND group_key = ?1 {}",
                    COLUMNS, order
                ),
                params![group_key(group)],
            ),
            None => self.query_all(
                &format!(
                    "SELECT {} FROM filename_mappings
                     WHERE pattern_regex IS NOT NULL AND fansub_group IS NULL {}",
                    COLUMNS, order
                ),
                [],
            ),
        }
    }

    fn list(&self) -> Result<Vec<FilenameMapping>> {
        self.query_all(
            &format!(
                "SELECT {} FROM filename_mappings ORDER BY use_count DESC, created_at DESC",
                COLUMNS
            ),
            [],
        )
    }

    fn stats(&self) -> Result<PatternStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(use_count), 0),
                    COALESCE(SUM(pattern_type = 'exact'), 0),
                    COALESCE(SUM(pattern_type = 'fansub'), 0),
                    COALESCE(SUM(pattern_type = 'standard'), 0)
             FROM filename_mappings",
            [],
            |row| {
                Ok(PatternStats {
                    total_patterns: row.get::<_, i64>(0)? as u64,
                    total_applied: row.get::<_, i64>(1)? as u64,
                    exact_patterns: row.get::<_, i64>(2)? as u64,
                    fansub_patterns: row.get::<_, i64>(3)? as u64,
                    standard_patterns: row.get::<_, i64>(4)? as u64,
                })
            },
        )?;
        Ok(stats)
    }

    fn record_use(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE filename_mappings SET use_count = use_count + 1, last_used_at = ?2 WHERE id = ?1",
            params![id, at],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("pattern {}", id)));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM filename_mappings WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("pattern {}", id)));
        }
        tracing::info!("Deleted pattern {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mapping::PatternType;
    use crate::models::media::MetadataType;
    use chrono::Duration;

    fn mapping(id: &str, pattern: &str, group: Option<&str>, title: &str) -> FilenameMapping {
        FilenameMapping {
            id: id.to_string(),
            pattern: pattern.to_string(),
            pattern_type: if group.is_some() {
                PatternType::Fansub
            } else {
                PatternType::Standard
            },
            pattern_regex: Some(format!("(?i)^{}$", regex::escape(pattern))),
            fansub_group: group.map(String::from),
            title_pattern: Some(title.to_string()),
            metadata_type: MetadataType::Series,
            metadata_id: format!("series-{}", id),
            tmdb_id: Some(1396),
            confidence: 1.0,
            use_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        let m = mapping("a", "[subsplease] dandadan - 07.mkv", Some("SubsPlease"), "dandadan");
        store.insert(&m).unwrap();

        let by_id = store.get("a").unwrap().unwrap();
        assert_eq!(by_id.pattern, m.pattern);
        assert_eq!(by_id.tmdb_id, Some(1396));
        assert_eq!(by_id.pattern_type, PatternType::Fansub);

        let by_key = store.find_by_learning_key(&m.learning_key()).unwrap();
        assert_eq!(by_key.map(|m| m.id), Some("a".to_string()));
        assert!(store.find_by_pattern("nothing").unwrap().is_none());
    }

    #[test]
    fn test_unique_constraints() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        store.insert(&mapping("a", "p1", Some("ANi"), "frieren")).unwrap();

        let same_pattern = mapping("b", "p1", Some("Other"), "other");
        assert!(matches!(store.insert(&same_pattern), Err(Error::DuplicatePattern(_))));

        let same_key = mapping("c", "p2", Some("ani"), "frieren");
        assert!(matches!(store.insert(&same_key), Err(Error::DuplicatePattern(_))));

        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_regex_candidates_scoped_and_ordered() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        store.insert(&mapping("a", "p1", Some("ANi"), "one")).unwrap();
        store.insert(&mapping("b", "p2", Some("ANi"), "two")).unwrap();
        store.insert(&mapping("c", "p3", None, "three")).unwrap();

        let now = Utc::now();
        store.record_use("b", now).unwrap();

        let scoped = store.regex_candidates(Some("ani")).unwrap();
        let ids: Vec<_> = scoped.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let ungrouped = store.regex_candidates(None).unwrap();
        assert_eq!(ungrouped.len(), 1);
        assert_eq!(ungrouped[0].id, "c");

        store.record_use("a", now - Duration::hours(1)).unwrap();
        store.record_use("a", now - Duration::hours(1)).unwrap();
        let ids: Vec<_> = store
            .regex_candidates(Some("ANi"))
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_regex_candidates_fold_non_ascii_groups() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        store.insert(&mapping("a", "p1", Some("ÉCLAIR-Subs"), "one")).unwrap();

        let ids: Vec<_> = store
            .regex_candidates(Some("éclair-subs"))
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["a"]);

        let same_key = mapping("b", "p2", Some("éclair-SUBS"), "one");
        assert!(matches!(store.insert(&same_key), Err(Error::DuplicatePattern(_))));
    }

    #[test]
    fn test_other_constraint_failures_are_not_duplicates() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        store.insert(&mapping("a", "p1", None, "one")).unwrap();

        // Same primary key, fresh pattern and learning key.
        let same_id = mapping("a", "p2", None, "two");
        assert!(matches!(store.insert(&same_id), Err(Error::Database(_))));
    }

    #[test]
    fn test_record_use_and_stats() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        store.insert(&mapping("a", "p1", Some("ANi"), "one")).unwrap();
        store.insert(&mapping("b", "p2", None, "two")).unwrap();

        store.record_use("a", Utc::now()).unwrap();
        store.record_use("a", Utc::now()).unwrap();

        let a = store.get("a").unwrap().unwrap();
        assert_eq!(a.use_count, 2);
        assert!(a.last_used_at.is_some());

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_patterns, 2);
        assert_eq!(stats.total_applied, 2);
        assert_eq!(stats.fansub_patterns, 1);
        assert_eq!(stats.standard_patterns, 1);
        assert_eq!(stats.exact_patterns, 0);

        assert!(matches!(store.record_use("missing", Utc::now()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_delete() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        store.insert(&mapping("a", "p1", None, "one")).unwrap();

        store.delete("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert!(matches!(store.delete("a"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_empty_stats() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        assert_eq!(store.stats().unwrap(), PatternStats::default());
        assert!(store.list().unwrap().is_empty());
    }
}
