//! Preflight checks module.

mod ollama;
mod store;

use crate::models::config::Config;
use colored::Colorize;

/// Result of a preflight check.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    pub fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn fail(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }
}

/// Run the checks a command needs. Ollama is only checked when the command
/// may call the AI fallback.
pub async fn run_preflight_checks(config: &Config, check_ai: bool) -> Vec<CheckResult> {
    let mut results = vec![store::check(&config.store.database)];

    if check_ai {
        results.push(ollama::check().await);
    }

    results
}

/// Print preflight check results.
pub fn print_results(results: &[CheckResult]) {
    for result in results {
        if result.success {
            println!(
                "{} {}: {}",
                "[OK]".green(),
                result.name.bold(),
                result.message
            );
        } else {
            println!(
                "{} {}: {}",
                "[FAIL]".red(),
                result.name.bold(),
                result.message
            );
            if let Some(ref hint) = result.hint {
                println!("  {} {}", "->".yellow(), hint);
            }
        }
    }
}

/// Check if all preflight checks passed.
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_check_only_without_ai() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.database = dir.path().join("patterns.db");

        let results = run_preflight_checks(&config, false).await;
        assert_eq!(results.len(), 1);
        assert!(all_passed(&results));
    }

    #[test]
    fn test_all_passed() {
        let results = vec![
            CheckResult::ok("Pattern store", "ready"),
            CheckResult::fail("Ollama", "not running", "Start Ollama: ollama serve"),
        ];
        assert!(!all_passed(&results));
        assert!(all_passed(&results[..1]));
    }
}
