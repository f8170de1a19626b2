//! Pattern learning from user-confirmed filename mappings.
//!
//! A confirmed filename becomes a [`FilenameMapping`]: its normalized name for
//! exact lookup plus, when a title can be isolated, a regex that also matches
//! sibling episodes of the same release.

use super::rules::{Analysis, RuleParser};
use crate::models::mapping::{learning_key, FilenameMapping, LearnTarget, PatternType};
use crate::services::collaborators::MetadataCatalog;
use crate::store::PatternStore;
use crate::utils::chinese;
use crate::{Error, Result};
use chrono::Utc;
use regex::Regex;
use std::ops::Range;
use std::sync::Arc;

/// Wildcard for an episode number and an optional `v2` style revision.
const EPISODE_WILDCARD: &str = r"\d{1,4}(?:v\d)?";
const CHECKSUM_WILDCARD: &str = "[0-9A-Fa-f]{8}";
const SEPARATOR_WILDCARD: &str = r"[\s._-]+";

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '.' | '_' | '-') || c.is_whitespace()
}

/// Length of a `v2` style revision suffix at the start of `s`, if any.
fn revision_len(s: &str) -> usize {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some('v' | 'V'), Some(d)) if d.is_ascii_digit() => 2,
        _ => 0,
    }
}

/// Build an anchored, case-insensitive regex matching names shaped like the
/// analyzed one.
///
/// Episode numbers and the checksum become wildcards, separator runs match
/// any separator run, everything else is matched literally.
pub fn synthesize_regex(analysis: &Analysis) -> String {
    let name = analysis.name.as_str();
    let wildcard_at = |pos: usize| -> Option<(Range<usize>, &'static str)> {
        if let Some(span) = analysis.episode_spans.iter().find(|s| s.start == pos) {
            let end = span.end + revision_len(&name[span.end..]);
            return Some((span.start..end, EPISODE_WILDCARD));
        }
        analysis
            .checksum_span
            .clone()
            .filter(|s| s.start == pos)
            .map(|s| (s, CHECKSUM_WILDCARD))
    };

    let mut out = String::from("(?i)^");
    let mut pos = 0;
    while pos < name.len() {
        if let Some((span, wildcard)) = wildcard_at(pos) {
            out.push_str(wildcard);
            pos = span.end;
            continue;
        }

        let Some(c) = name[pos..].chars().next() else {
            break;
        };
        if is_separator(c) {
            let run: usize = name[pos..]
                .chars()
                .take_while(|&c| is_separator(c))
                .map(char::len_utf8)
                .sum();
            out.push_str(SEPARATOR_WILDCARD);
            pos += run;
            continue;
        }

        let mut buf = [0u8; 4];
        out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        pos += c.len_utf8();
    }
    out.push('$');
    out
}

/// Title key of an analysis: the normalized title, or the normalized
/// romanized title when the main title is empty.
pub fn title_pattern(analysis: &Analysis) -> Option<String> {
    let result = &analysis.result;
    std::iter::once(result.title.as_str())
        .chain(result.title_romanized.as_deref())
        .map(chinese::normalize)
        .find(|t| !t.is_empty())
}

/// Turns confirmed mappings into stored patterns.
pub struct PatternLearner {
    store: Arc<dyn PatternStore>,
    parser: Arc<RuleParser>,
    catalog: Option<Arc<dyn MetadataCatalog>>,
}

impl PatternLearner {
    pub fn new(store: Arc<dyn PatternStore>, parser: Arc<RuleParser>) -> Self {
        Self {
            store,
            parser,
            catalog: None,
        }
    }

    /// Verify learn targets against the confirmed metadata catalog.
    pub fn with_catalog(mut self, catalog: Arc<dyn MetadataCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Learn a mapping from a filename to a confirmed metadata record.
    ///
    /// Idempotent: learning a name whose pattern (or group + title key) is
    /// already stored returns the stored mapping unchanged.
    pub async fn learn(&self, filename: &str, target: &LearnTarget) -> Result<FilenameMapping> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(Error::validation("filename is required"));
        }
        let metadata_id = target.metadata_id.trim();
        if metadata_id.is_empty() {
            return Err(Error::validation("metadataId is required"));
        }

        if let Some(catalog) = &self.catalog {
            if !catalog.exists(target.metadata_type, metadata_id).await? {
                return Err(Error::validation(format!(
                    "unknown {} metadataId '{}'",
                    target.metadata_type, metadata_id
                )));
            }
        }

        let analysis = self.parser.analyze(filename);
        let pattern = chinese::normalize(&analysis.name);
        if pattern.is_empty() {
            return Err(Error::validation("filename is required"));
        }
        let title_pattern = title_pattern(&analysis);
        let fansub_group = analysis
            .group
            .as_ref()
            .map(|g| g.name.trim().to_string())
            .filter(|g| !g.is_empty());

        let pattern_type = match (&title_pattern, &fansub_group) {
            (None, _) => PatternType::Exact,
            (Some(_), Some(_)) => PatternType::Fansub,
            (Some(_), None) => PatternType::Standard,
        };
        let key = learning_key(
            fansub_group.as_deref(),
            title_pattern.as_deref().unwrap_or(&pattern),
        );

        if let Some(existing) = self.existing(&key, &pattern)? {
            tracing::debug!("Pattern for '{}' already learned ({})", filename, existing.id);
            return Ok(existing);
        }

        let pattern_regex = match pattern_type {
            PatternType::Exact => None,
            _ => {
                let regex = synthesize_regex(&analysis);
                Regex::new(&regex)?;
                Some(regex)
            }
        };

        let mapping = FilenameMapping {
            id: uuid::Uuid::new_v4().to_string(),
            pattern,
            pattern_type,
            pattern_regex,
            fansub_group,
            title_pattern,
            metadata_type: target.metadata_type,
            metadata_id: metadata_id.to_string(),
            tmdb_id: target.tmdb_id,
            confidence: 1.0,
            use_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
        };

        match self.store.insert(&mapping) {
            Ok(()) => {
                tracing::info!(
                    "Learned {} pattern '{}' -> {} {}",
                    mapping.pattern_type,
                    mapping.pattern,
                    mapping.metadata_type,
                    mapping.metadata_id
                );
                Ok(mapping)
            }
            // A concurrent learn of the same release won the insert.
            Err(Error::DuplicatePattern(p)) => self
                .existing(&key, &mapping.pattern)?
                .ok_or(Error::DuplicatePattern(p)),
            Err(e) => Err(e),
        }
    }

    fn existing(&self, key: &str, pattern: &str) -> Result<Option<FilenameMapping>> {
        if let Some(mapping) = self.store.find_by_learning_key(key)? {
            return Ok(Some(mapping));
        }
        self.store.find_by_pattern(pattern)
    }
}
