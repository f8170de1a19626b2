//! CLI command implementations.

pub mod learn;
pub mod parse;
pub mod patterns;

use crate::core::Recognizer;
use crate::models::config::Config;
use crate::services::completion::CompletionProvider;
use crate::services::ollama::OllamaClient;
use crate::store::{PatternStore, SqlitePatternStore};
use crate::Result;
use std::sync::Arc;

/// Open the pattern store and wire a recognizer for a command.
pub fn open_recognizer(config: &Config, use_ai: bool) -> Result<Recognizer> {
    let store: Arc<dyn PatternStore> = Arc::new(SqlitePatternStore::open(&config.store.database)?);
    let provider: Option<Arc<dyn CompletionProvider>> = if use_ai {
        Some(Arc::new(OllamaClient::new()))
    } else {
        None
    };
    Recognizer::from_config(config, store, provider)
}
