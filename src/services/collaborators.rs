//! Interfaces to collaborators owned outside the recognition core.
//!
//! The confirmed-metadata store, the retry/backoff queue and the progress
//! event sink live elsewhere; the core only needs these narrow seams.

use crate::models::media::MetadataType;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Confirmed metadata records (movies, series) owned by the CRUD layer.
#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    /// Whether a confirmed record with this id exists.
    async fn exists(&self, metadata_type: MetadataType, metadata_id: &str) -> Result<bool>;
}

/// A failed AI or metadata lookup handed off for a later retry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredLookup {
    pub filename: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl DeferredLookup {
    pub fn new(filename: &str, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Retry/backoff queue for failed external lookups.
#[async_trait]
pub trait RetryQueue: Send + Sync {
    async fn defer(&self, lookup: DeferredLookup) -> Result<()>;
}

/// Receiver of named progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

/// Retry queue that only records the hand-off in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRetryQueue;

#[async_trait]
impl RetryQueue for LoggingRetryQueue {
    async fn defer(&self, lookup: DeferredLookup) -> Result<()> {
        tracing::info!(
            "Deferred lookup for '{}' ({})",
            lookup.filename,
            lookup.reason
        );
        Ok(())
    }
}

/// Progress sink that writes events to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn emit(&self, event: &str, payload: Value) {
        tracing::debug!("{}: {}", event, payload);
    }
}
