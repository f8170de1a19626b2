//! Lookup of learned patterns for incoming filenames.

use super::learner::title_pattern;
use super::rules::RuleParser;
use crate::models::mapping::{learning_key, FilenameMapping};
use crate::store::PatternStore;
use crate::utils::{chinese, fs};
use crate::Result;
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Finds the learned mapping for a filename, if any.
///
/// Lookup order: exact normalized name, then group + title key, then the
/// regexes learned for the same group (most used first).
pub struct PatternMatcher {
    store: Arc<dyn PatternStore>,
    parser: Arc<RuleParser>,
    /// Compiled candidate regexes by mapping id.
    compiled: Mutex<HashMap<String, Regex>>,
}

impl PatternMatcher {
    pub fn new(store: Arc<dyn PatternStore>, parser: Arc<RuleParser>) -> Self {
        Self {
            store,
            parser,
            compiled: Mutex::new(HashMap::new()),
        }
    }

    /// Find and record a use of the mapping for `filename`.
    ///
    /// The returned mapping already reflects the recorded use.
    pub fn find_match(&self, filename: &str) -> Result<Option<FilenameMapping>> {
        let name = fs::file_name(filename.trim());
        if name.is_empty() {
            return Ok(None);
        }

        let Some(mapping) = self.lookup(name)? else {
            tracing::debug!("No learned pattern for '{}'", name);
            return Ok(None);
        };
        Ok(Some(self.touch(mapping)))
    }

    fn lookup(&self, name: &str) -> Result<Option<FilenameMapping>> {
        if let Some(mapping) = self.store.find_by_pattern(&chinese::normalize(name))? {
            tracing::debug!("Exact pattern hit for '{}'", name);
            return Ok(Some(mapping));
        }

        let analysis = self.parser.analyze(name);
        let group = analysis.group.as_ref().map(|g| g.name.trim());

        if let Some(title) = title_pattern(&analysis) {
            let key = learning_key(group, &title);
            if let Some(mapping) = self
                .store
                .find_by_learning_key(&key)?
                .filter(FilenameMapping::is_generalized)
            {
                tracing::debug!("Title pattern hit for '{}'", name);
                return Ok(Some(mapping));
            }
        }

        for candidate in self.store.regex_candidates(group)? {
            let Some(source) = candidate.pattern_regex.as_deref() else {
                continue;
            };
            match self.is_match(&candidate.id, source, name) {
                Ok(true) => {
                    tracing::debug!("Regex pattern {} hit for '{}'", candidate.id, name);
                    return Ok(Some(candidate));
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Skipping pattern {} with invalid regex: {}", candidate.id, e),
            }
        }

        Ok(None)
    }

    /// Match `name` against a candidate regex, compiling it once per mapping.
    fn is_match(&self, id: &str, source: &str, name: &str) -> Result<bool> {
        let mut compiled = self
            .compiled
            .lock()
            .map_err(|_| crate::Error::other("regex cache lock poisoned"))?;
        if let Some(regex) = compiled.get(id).filter(|r| r.as_str() == source) {
            return Ok(regex.is_match(name));
        }
        let regex = Regex::new(source)?;
        let matched = regex.is_match(name);
        compiled.insert(id.to_string(), regex);
        Ok(matched)
    }

    /// Record a use; a failed update does not fail the match.
    fn touch(&self, mut mapping: FilenameMapping) -> FilenameMapping {
        let now = Utc::now();
        match self.store.record_use(&mapping.id, now) {
            Ok(()) => {
                mapping.use_count += 1;
                mapping.last_used_at = Some(now);
            }
            Err(e) => tracing::warn!("Failed to record use of pattern {}: {}", mapping.id, e),
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::learner::PatternLearner;
    use crate::models::mapping::{LearnTarget, PatternType};
    use crate::models::media::MetadataType;
    use crate::store::SqlitePatternStore;

    fn setup() -> (PatternLearner, PatternMatcher, Arc<SqlitePatternStore>) {
        let store = Arc::new(SqlitePatternStore::open_in_memory().unwrap());
        let parser = Arc::new(RuleParser::new().unwrap());
        (
            PatternLearner::new(store.clone(), parser.clone()),
            PatternMatcher::new(store.clone(), parser),
            store,
        )
    }

    #[tokio::test]
    async fn test_exact_then_sibling_match() {
        let (learner, matcher, store) = setup();
        let target = LearnTarget::new(MetadataType::Series, "series-1");
        let learned = learner
            .learn("[SubsPlease] Dandadan - 07 (1080p) [A1B2C3D4].mkv", &target)
            .await
            .unwrap();

        let hit = matcher
            .find_match("/tv/[SubsPlease] Dandadan - 07 (1080p) [A1B2C3D4].mkv")
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, learned.id);
        assert_eq!(hit.use_count, 1);
        assert!(hit.last_used_at.is_some());

        let sibling = matcher
            .find_match("[SubsPlease] Dandadan - 08 (1080p) [0F9E8D7C].mkv")
            .unwrap()
            .unwrap();
        assert_eq!(sibling.id, learned.id);
        assert_eq!(sibling.use_count, 2);
        assert_eq!(store.get(&learned.id).unwrap().unwrap().use_count, 2);
    }

    #[tokio::test]
    async fn test_sibling_match_with_different_separators() {
        let (learner, matcher, _) = setup();
        let target = LearnTarget::new(MetadataType::Series, "bb");
        learner
            .learn("Breaking.Bad.S01E02.720p.BluRay.x264-DEMAND.mkv", &target)
            .await
            .unwrap();

        let hit = matcher
            .find_match("Breaking Bad S01E05 720p BluRay x264-DEMAND.mkv")
            .unwrap();
        assert_eq!(hit.map(|m| m.metadata_id), Some("bb".to_string()));
    }

    #[test]
    fn test_candidate_regexes_compiled_once() {
        let (_, matcher, store) = setup();
        let mapping = FilenameMapping {
            id: "regex-only".to_string(),
            pattern: "[subsplease] dandadan - 01.mkv".to_string(),
            pattern_type: PatternType::Fansub,
            pattern_regex: Some(r"(?i)^\[SubsPlease\][\s._-]+Dandadan[\s._-]+\d{1,4}\.mkv$".to_string()),
            fansub_group: Some("SubsPlease".to_string()),
            title_pattern: Some("dandadan season one".to_string()),
            metadata_type: MetadataType::Series,
            metadata_id: "series-1".to_string(),
            tmdb_id: None,
            confidence: 1.0,
            use_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
        };
        store.insert(&mapping).unwrap();

        for episode in ["02", "03", "04"] {
            let name = format!("[SubsPlease] Dandadan - {}.mkv", episode);
            let hit = matcher.find_match(&name).unwrap();
            assert_eq!(hit.map(|m| m.id), Some(mapping.id.clone()));
        }

        let compiled = matcher.compiled.lock().unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(
            compiled.get(&mapping.id).map(|r| r.as_str()),
            mapping.pattern_regex.as_deref()
        );
    }

    #[tokio::test]
    async fn test_no_match_across_groups() {
        let (learner, matcher, _) = setup();
        let target = LearnTarget::new(MetadataType::Series, "series-1");
        learner
            .learn("[SubsPlease] Dandadan - 07 (1080p) [A1B2C3D4].mkv", &target)
            .await
            .unwrap();

        assert!(matcher
            .find_match("[Erai-raws] Kaiju No. 8 - 03 [1080p].mkv")
            .unwrap()
            .is_none());
        assert!(matcher.find_match("").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exact_mapping_only_matches_literally() {
        let (learner, matcher, store) = setup();
        let target = LearnTarget::new(MetadataType::Movie, "m1");
        let learned = learner.learn("[1080p].mkv", &target).await.unwrap();
        assert_eq!(learned.pattern_type, PatternType::Exact);
        assert!(learned.pattern_regex.is_none());

        assert!(matcher.find_match("[1080P].MKV").unwrap().is_some());
        assert!(matcher.find_match("[720p].mkv").unwrap().is_none());
        assert_eq!(store.stats().unwrap().exact_patterns, 1);
    }
}
