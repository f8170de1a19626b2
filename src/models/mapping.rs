//! Learned filename pattern models.

use super::media::MetadataType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a learned mapping generalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Literal, single-use match on the normalized filename.
    Exact,
    /// Generalizes over episodes of a fansub/release group's naming habit.
    Fansub,
    /// Generalizes over episodes of a name without a group tag.
    Standard,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Exact => "exact",
            PatternType::Fansub => "fansub",
            PatternType::Standard => "standard",
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "exact" => Ok(PatternType::Exact),
            "fansub" => Ok(PatternType::Fansub),
            "standard" => Ok(PatternType::Standard),
            other => Err(crate::Error::other(format!("unknown pattern type: {}", other))),
        }
    }
}

/// A learned mapping from a filename shape to a confirmed metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilenameMapping {
    pub id: String,
    /// Normalized filename used for exact lookup. Globally unique.
    pub pattern: String,
    pub pattern_type: PatternType,
    /// Anchored regex matching sibling episodes (fansub/standard only).
    pub pattern_regex: Option<String>,
    pub fansub_group: Option<String>,
    /// Normalized title key, independent of episode numbering.
    pub title_pattern: Option<String>,
    pub metadata_type: MetadataType,
    pub metadata_id: String,
    pub tmdb_id: Option<u64>,
    pub confidence: f32,
    pub use_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl FilenameMapping {
    /// Deduplication key: group and title pattern.
    pub fn learning_key(&self) -> String {
        learning_key(
            self.fansub_group.as_deref(),
            self.title_pattern.as_deref().unwrap_or(&self.pattern),
        )
    }

    /// Whether this mapping generalizes beyond its literal filename.
    pub fn is_generalized(&self) -> bool {
        self.pattern_type != PatternType::Exact
    }
}

/// Build the deduplication key for a group and title pattern.
///
/// Groups compare case-insensitively; the unit separator cannot occur in a
/// normalized title, so keys never collide across groups.
pub fn learning_key(fansub_group: Option<&str>, title_pattern: &str) -> String {
    let group = fansub_group.map(|g| g.trim().to_lowercase()).unwrap_or_default();
    format!("{}\u{1f}{}", group, title_pattern)
}

/// The confirmed metadata a filename should map to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnTarget {
    pub metadata_type: MetadataType,
    pub metadata_id: String,
    pub tmdb_id: Option<u64>,
}

impl LearnTarget {
    pub fn new(metadata_type: MetadataType, metadata_id: impl Into<String>) -> Self {
        Self {
            metadata_type,
            metadata_id: metadata_id.into(),
            tmdb_id: None,
        }
    }

    pub fn with_tmdb_id(mut self, tmdb_id: u64) -> Self {
        self.tmdb_id = Some(tmdb_id);
        self
    }
}

/// Learn request as received from an outer interface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnRequest {
    pub filename: Option<String>,
    pub metadata_id: Option<String>,
    pub metadata_type: Option<String>,
    pub tmdb_id: Option<u64>,
}

impl LearnRequest {
    /// Validate required fields and convert into a filename + target pair.
    pub fn into_parts(self) -> crate::Result<(String, LearnTarget)> {
        let filename = self
            .filename
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .ok_or_else(|| crate::Error::validation("filename is required"))?;
        let metadata_id = self
            .metadata_id
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| crate::Error::validation("metadataId is required"))?;
        let metadata_type: MetadataType = self
            .metadata_type
            .ok_or_else(|| crate::Error::validation("metadataType is required"))?
            .parse()?;

        Ok((
            filename,
            LearnTarget {
                metadata_type,
                metadata_id,
                tmdb_id: self.tmdb_id,
            },
        ))
    }
}

/// Aggregate counters over the pattern store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternStats {
    pub total_patterns: u64,
    /// Sum of `use_count` over all mappings.
    pub total_applied: u64,
    pub exact_patterns: u64,
    pub fansub_patterns: u64,
    pub standard_patterns: u64,
}

/// Listing of all mappings plus aggregate counters.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternListing {
    pub patterns: Vec<FilenameMapping>,
    pub stats: PatternStats,
}
