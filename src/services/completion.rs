//! Text-completion capability used by the AI fallback.

use crate::Result;
use async_trait::async_trait;

/// An external model that turns a prompt into raw text.
///
/// Implementations must not hold locks across the call; the caller may drop
/// the future at any time to cancel it.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send a prompt and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Name used in log lines.
    fn name(&self) -> &str {
        "completion"
    }
}
