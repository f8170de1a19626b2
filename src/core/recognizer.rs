//! Filename recognition entry point.
//!
//! Combines the learned patterns, the rule parser and the optional AI
//! fallback:
//! 1. A learned pattern hit wins outright.
//! 2. Otherwise the rules parse the name.
//! 3. Results the rules are unsure about go to the AI when one is configured.

use super::ai::AiFallback;
use super::learner::PatternLearner;
use super::matcher::PatternMatcher;
use super::rules::RuleParser;
use crate::models::config::Config;
use crate::models::mapping::{FilenameMapping, LearnRequest, PatternListing, PatternStats};
use crate::models::media::{ParseResult, ParseStatus};
use crate::services::collaborators::{
    DeferredLookup, LoggingRetryQueue, MetadataCatalog, ProgressSink, RetryQueue,
    TracingProgressSink,
};
use crate::services::completion::CompletionProvider;
use crate::store::PatternStore;
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default number of filenames recognized concurrently in a batch.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Which stage produced a recognition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionSource {
    LearnedPattern,
    Rules,
    Ai,
}

impl std::fmt::Display for RecognitionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionSource::LearnedPattern => write!(f, "learned pattern"),
            RecognitionSource::Rules => write!(f, "rules"),
            RecognitionSource::Ai => write!(f, "ai"),
        }
    }
}

/// Result of recognizing one filename.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    pub result: ParseResult,
    pub source: RecognitionSource,
    /// The learned mapping that matched, for `learned_pattern` results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<FilenameMapping>,
    /// Why the AI stage did not contribute, if it was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Recognition {
    fn new(result: ParseResult, source: RecognitionSource) -> Self {
        Self {
            result,
            source,
            mapping: None,
            error: None,
        }
    }

    fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Recognizes filenames and manages learned patterns.
pub struct Recognizer {
    parser: Arc<RuleParser>,
    store: Arc<dyn PatternStore>,
    matcher: PatternMatcher,
    learner: PatternLearner,
    ai: Option<AiFallback>,
    retry_queue: Arc<dyn RetryQueue>,
    progress: Arc<dyn ProgressSink>,
    max_concurrent: usize,
}

impl Recognizer {
    pub fn new(store: Arc<dyn PatternStore>, parser: Arc<RuleParser>) -> Self {
        Self {
            matcher: PatternMatcher::new(store.clone(), parser.clone()),
            learner: PatternLearner::new(store.clone(), parser.clone()),
            parser,
            store,
            ai: None,
            retry_queue: Arc::new(LoggingRetryQueue),
            progress: Arc::new(TracingProgressSink),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Build a recognizer from configuration. The AI stage is wired only when
    /// a provider is given and `[ai] enabled` is set.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn PatternStore>,
        provider: Option<Arc<dyn CompletionProvider>>,
    ) -> Result<Self> {
        config.validate()?;
        let parser = Arc::new(RuleParser::with_threshold(config.parser.min_confidence)?);
        let mut recognizer =
            Self::new(store, parser).with_max_concurrent(config.batch.max_concurrent);
        if let Some(provider) = provider.filter(|_| config.ai.enabled) {
            recognizer = recognizer.with_ai(provider, Duration::from_secs(config.ai.timeout_secs));
        }
        Ok(recognizer)
    }

    /// Enable the AI fallback.
    pub fn with_ai(mut self, provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        self.ai = Some(AiFallback::new(
            provider,
            timeout,
            self.parser.min_confidence(),
        ));
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn MetadataCatalog>) -> Self {
        self.learner = self.learner.with_catalog(catalog);
        self
    }

    pub fn with_retry_queue(mut self, retry_queue: Arc<dyn RetryQueue>) -> Self {
        self.retry_queue = retry_queue;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    /// Recognize a single filename.
    pub async fn recognize(&self, filename: &str) -> Result<Recognition> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(Error::validation("filename is required"));
        }

        match self.matcher.find_match(filename) {
            Ok(Some(mapping)) => return Ok(self.learned(filename, mapping)),
            Ok(None) => {}
            // Pattern lookup is an accelerator; the rules still work without it.
            Err(e) => tracing::warn!("Pattern lookup failed for '{}': {}", filename, e),
        }

        let parsed = self.parser.parse(filename);
        if parsed.is_success() {
            return Ok(Recognition::new(parsed, RecognitionSource::Rules));
        }
        let Some(ai) = &self.ai else {
            return Ok(Recognition::new(parsed, RecognitionSource::Rules));
        };

        match ai.resolve(filename).await {
            Ok(result) => Ok(Recognition::new(result, RecognitionSource::Ai)),
            Err(e) if e.is_retryable() => {
                tracing::warn!("AI unavailable for '{}': {}", filename, e);
                let lookup = DeferredLookup::new(filename, e.to_string());
                if let Err(defer_err) = self.retry_queue.defer(lookup).await {
                    tracing::warn!("Failed to defer '{}': {}", filename, defer_err);
                }
                Ok(Recognition::new(parsed, RecognitionSource::Rules).with_error(e))
            }
            Err(e) => {
                let mut failed = parsed;
                failed.status = ParseStatus::Failed;
                Ok(Recognition::new(failed, RecognitionSource::Ai).with_error(e))
            }
        }
    }

    fn learned(&self, filename: &str, mapping: FilenameMapping) -> Recognition {
        let mut result = self.parser.parse(filename);
        if result.title.is_empty() {
            result.title = mapping.title_pattern.clone().unwrap_or_default();
        }
        result.media_type = mapping.metadata_type.into();
        result.set_confidence(mapping.confidence);
        result.status = ParseStatus::Success;

        Recognition {
            result,
            source: RecognitionSource::LearnedPattern,
            mapping: Some(mapping),
            error: None,
        }
    }

    /// Recognize many filenames with bounded concurrency.
    ///
    /// Results come back in input order. A filename that cannot be recognized
    /// yields a `failed` entry instead of failing the batch.
    pub async fn recognize_batch(&self, filenames: &[String]) -> Result<Vec<Recognition>> {
        if filenames.is_empty() {
            return Err(Error::validation("filenames must not be empty"));
        }

        let total = filenames.len();
        let completed = AtomicUsize::new(0);
        tracing::info!(
            "Recognizing {} filenames ({} concurrent)",
            total,
            self.max_concurrent
        );

        let recognitions: Vec<Recognition> = stream::iter(filenames)
            .map(|filename| {
                let completed = &completed;
                async move {
                    let recognition = match self.recognize(filename).await {
                        Ok(recognition) => recognition,
                        Err(e) => {
                            let mut result = ParseResult::new(filename);
                            result.status = ParseStatus::Failed;
                            Recognition::new(result, RecognitionSource::Rules).with_error(e)
                        }
                    };
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.progress.emit(
                        "batch.progress",
                        json!({
                            "completed": done,
                            "total": total,
                            "filename": filename,
                            "status": recognition.result.status,
                        }),
                    );
                    recognition
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let succeeded = recognitions
            .iter()
            .filter(|r| r.result.is_success())
            .count();
        self.progress.emit(
            "batch.completed",
            json!({
                "total": total,
                "succeeded": succeeded,
                "unresolved": total - succeeded,
            }),
        );

        Ok(recognitions)
    }

    /// Learn a confirmed mapping from an unvalidated request.
    pub async fn learn(&self, request: LearnRequest) -> Result<FilenameMapping> {
        let (filename, target) = request.into_parts()?;
        self.learner.learn(&filename, &target).await
    }

    /// Look up the learned mapping for a filename, recording a use on a hit.
    pub fn find_match(&self, filename: &str) -> Result<Option<FilenameMapping>> {
        self.matcher.find_match(filename)
    }

    pub fn list_patterns(&self) -> Result<PatternListing> {
        Ok(PatternListing {
            patterns: self.store.list()?,
            stats: self.store.stats()?,
        })
    }

    pub fn stats(&self) -> Result<PatternStats> {
        self.store.stats()
    }

    pub fn delete_pattern(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }
}
