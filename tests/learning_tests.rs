//! Integration tests for pattern learning and matching.
//!
//! Tests cover:
//! - Idempotent learning across episodes of one release
//! - Learn -> match round trip on an on-disk store
//! - Concurrent learning of the same release
//! - Listing, statistics and deletion

use async_trait::async_trait;
use media_parser::core::learner::PatternLearner;
use media_parser::core::matcher::PatternMatcher;
use media_parser::core::rules::RuleParser;
use media_parser::models::mapping::{LearnTarget, PatternType};
use media_parser::models::media::MetadataType;
use media_parser::services::collaborators::MetadataCatalog;
use media_parser::store::{PatternStore, SqlitePatternStore};
use media_parser::{Error, Result};
use std::sync::Arc;
use tempfile::TempDir;

const EP07: &str = "[SubsPlease] Dandadan - 07 (1080p) [A1B2C3D4].mkv";
const EP08: &str = "[SubsPlease] Dandadan - 08 (1080p) [0F9E8D7C].mkv";

fn components(store: Arc<dyn PatternStore>) -> (PatternLearner, PatternMatcher) {
    let parser = Arc::new(RuleParser::new().unwrap());
    (
        PatternLearner::new(store.clone(), parser.clone()),
        PatternMatcher::new(store, parser),
    )
}

fn memory_store() -> Arc<dyn PatternStore> {
    Arc::new(SqlitePatternStore::open_in_memory().unwrap())
}

fn series(id: &str) -> LearnTarget {
    LearnTarget::new(MetadataType::Series, id).with_tmdb_id(240411)
}

// ========== LEARNING TESTS ==========

#[tokio::test]
async fn test_learn_twice_same_release_same_id() {
    let store = memory_store();
    let (learner, _) = components(store.clone());

    let first = learner.learn(EP07, &series("dandadan")).await.unwrap();
    let second = learner.learn(EP08, &series("dandadan")).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.pattern_type, PatternType::Fansub);
    assert_eq!(first.confidence, 1.0);
    assert_eq!(store.list().unwrap().len(), 1);
}

#[tokio::test]
async fn test_existing_mapping_is_never_rewritten() {
    let store = memory_store();
    let (learner, _) = components(store.clone());

    let first = learner.learn(EP07, &series("dandadan")).await.unwrap();
    let again = learner.learn(EP08, &series("something-else")).await.unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(again.metadata_id, "dandadan");
    assert_eq!(again.pattern_regex, first.pattern_regex);
}

#[tokio::test]
async fn test_hyphenated_title_learns_without_group() {
    let store = memory_store();
    let (learner, matcher) = components(store.clone());

    let learned = learner
        .learn("Ant-Man.mkv", &LearnTarget::new(MetadataType::Movie, "ant-man"))
        .await
        .unwrap();
    assert_eq!(learned.pattern_type, PatternType::Standard);
    assert!(learned.fansub_group.is_none());
    assert_eq!(learned.title_pattern.as_deref(), Some("ant-man"));

    let hit = matcher.find_match("Ant-Man.2015.1080p.mkv").unwrap();
    assert_eq!(hit.map(|m| m.id), Some(learned.id));
}

#[tokio::test]
async fn test_same_title_different_groups_are_separate() {
    let store = memory_store();
    let (learner, _) = components(store.clone());

    let a = learner.learn(EP07, &series("dandadan")).await.unwrap();
    let b = learner
        .learn("[Erai-raws] Dandadan - 07 [1080p].mkv", &series("dandadan"))
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(store.stats().unwrap().fansub_patterns, 2);
}

#[tokio::test]
async fn test_learn_rejects_unknown_metadata() {
    struct EmptyCatalog;

    #[async_trait]
    impl MetadataCatalog for EmptyCatalog {
        async fn exists(&self, _: MetadataType, _: &str) -> Result<bool> {
            Ok(false)
        }
    }

    let (learner, _) = components(memory_store());
    let learner = learner.with_catalog(Arc::new(EmptyCatalog));

    let err = learner.learn(EP07, &series("missing")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_learning_converges() {
    let store = memory_store();
    let (learner, _) = components(store.clone());
    let learner = Arc::new(learner);

    let mut handles = Vec::new();
    for episode in 1..=8 {
        let learner = learner.clone();
        let filename = format!("[SubsPlease] Dandadan - {:02} (1080p) [A1B2C3D4].mkv", episode);
        handles.push(tokio::spawn(async move {
            learner.learn(&filename, &series("dandadan")).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(store.stats().unwrap().total_patterns, 1);
}

// ========== ROUND TRIP TESTS ==========

#[tokio::test]
async fn test_round_trip_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("patterns.db");

    let learned = {
        let store: Arc<dyn PatternStore> = Arc::new(SqlitePatternStore::open(&db_path).unwrap());
        let (learner, _) = components(store);
        learner.learn(EP07, &series("dandadan")).await.unwrap()
    };
    assert!(db_path.exists());

    let store: Arc<dyn PatternStore> = Arc::new(SqlitePatternStore::open(&db_path).unwrap());
    let (_, matcher) = components(store.clone());

    let hit = matcher.find_match(EP08).unwrap().unwrap();
    assert_eq!(hit.id, learned.id);
    assert_eq!(hit.metadata_type, MetadataType::Series);
    assert_eq!(hit.metadata_id, "dandadan");
    assert_eq!(hit.tmdb_id, Some(240411));
    assert!(hit.use_count >= 1);

    let stored = store.get(&learned.id).unwrap().unwrap();
    assert!(stored.use_count >= 1);
    assert!(stored.last_used_at.is_some());
    assert_eq!(store.stats().unwrap().total_applied, stored.use_count);
}

#[tokio::test]
async fn test_regex_scoped_to_group() {
    let store = memory_store();
    let (learner, matcher) = components(store);
    learner.learn(EP07, &series("dandadan")).await.unwrap();

    assert!(matcher
        .find_match("[SubsPlease] Sakamoto Days - 07 (1080p) [A1B2C3D4].mkv")
        .unwrap()
        .is_none());
    assert!(matcher
        .find_match("Dandadan - 07 (1080p) [A1B2C3D4].mkv")
        .unwrap()
        .is_none());
}

// ========== MANAGEMENT TESTS ==========

#[tokio::test]
async fn test_list_ordered_by_use_count() {
    let store = memory_store();
    let (learner, matcher) = components(store.clone());

    let dandadan = learner.learn(EP07, &series("dandadan")).await.unwrap();
    let inception = learner
        .learn(
            "Inception.2010.1080p.BluRay.x264-SPARKS.mkv",
            &LearnTarget::new(MetadataType::Movie, "inception"),
        )
        .await
        .unwrap();

    matcher.find_match("Inception.2010.1080p.BluRay.x264-SPARKS.mkv").unwrap();
    matcher.find_match("Inception.2010.1080p.BluRay.x264-SPARKS.mkv").unwrap();
    matcher.find_match(EP08).unwrap();

    let ids: Vec<_> = store.list().unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![inception.id, dandadan.id]);

    let stats = store.stats().unwrap();
    assert_eq!(stats.total_patterns, 2);
    assert_eq!(stats.total_applied, 3);
}

#[tokio::test]
async fn test_delete_removes_from_list_and_match() {
    let store = memory_store();
    let (learner, matcher) = components(store.clone());
    let learned = learner.learn(EP07, &series("dandadan")).await.unwrap();

    store.delete(&learned.id).unwrap();

    assert!(store.list().unwrap().is_empty());
    assert!(matcher.find_match(EP07).unwrap().is_none());
    assert!(matcher.find_match(EP08).unwrap().is_none());
    assert!(matches!(store.delete(&learned.id), Err(Error::NotFound(_))));

    let relearned = learner.learn(EP07, &series("dandadan")).await.unwrap();
    assert_ne!(relearned.id, learned.id);
}
