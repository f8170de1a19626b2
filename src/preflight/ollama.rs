//! Ollama preflight check.

use super::CheckResult;
use crate::services::ollama::OllamaClient;

/// Check that Ollama is running and serves the configured model.
pub async fn check() -> CheckResult {
    let client = OllamaClient::new();

    match client.health_check().await {
        Ok(true) => match client.list_models().await {
            Ok(models) => {
                let wanted = client.model();
                if models.iter().any(|m| m.name == wanted) {
                    CheckResult::ok("Ollama", &format!("running (model: {})", wanted))
                } else {
                    CheckResult::fail(
                        "Ollama",
                        &format!("running but model {} is not pulled", wanted),
                        &format!("Pull the model: ollama pull {}, or pass --no-ai", wanted),
                    )
                }
            }
            Err(_) => CheckResult::ok("Ollama", "running"),
        },
        Ok(false) | Err(_) => CheckResult::fail(
            "Ollama",
            "not running",
            "Start Ollama: ollama serve, or pass --no-ai",
        ),
    }
}
