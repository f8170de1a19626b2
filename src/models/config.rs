//! Configuration model.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule parser configuration.
    pub parser: ParserConfig,
    /// AI fallback configuration.
    pub ai: AiConfig,
    /// Batch parsing configuration.
    pub batch: BatchConfig,
    /// Pattern store configuration.
    pub store: StoreConfig,
}

/// Rule parser configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Minimum confidence for a rule result to count as `success`.
    /// Anything below is reported as `needs_ai`.
    pub min_confidence: f32,
}

/// AI fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Whether low-confidence names are sent to the model.
    pub enabled: bool,
    /// Caller-imposed timeout for a single completion, in seconds.
    pub timeout_secs: u64,
}

/// Batch parsing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum filenames recognized concurrently.
    pub max_concurrent: usize,
}

/// Pattern store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database holding learned patterns.
    pub database: PathBuf,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 120,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: dirs_config_path().join("patterns.db"),
        }
    }
}

impl Config {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.parser.min_confidence) {
            return Err(crate::Error::validation(format!(
                "parser.min_confidence must be within [0, 1], got {}",
                self.parser.min_confidence
            )));
        }
        if self.batch.max_concurrent == 0 {
            return Err(crate::Error::validation("batch.max_concurrent must be at least 1"));
        }
        Ok(())
    }
}

/// Get the configuration directory path.
pub fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media_parser")
}

/// Load configuration from the default location, or defaults when absent.
pub fn load_config() -> crate::Result<Config> {
    load_config_from(&dirs_config_path().join("config.toml"))
}

/// Load configuration from a specific file, or defaults when it does not exist.
pub fn load_config_from(path: &Path) -> crate::Result<Config> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
    config.validate()?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.parser.min_confidence, 0.5);
        assert_eq!(config.batch.max_concurrent, 4);
        assert!(config.ai.enabled);
        assert!(config.store.database.ends_with("patterns.db"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[parser]\nmin_confidence = 0.7\n").unwrap();
        assert_eq!(config.parser.min_confidence, 0.7);
        assert_eq!(config.ai.timeout_secs, 120);
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut config = Config::default();
        config.parser.min_confidence = 1.5;
        assert!(matches!(config.validate(), Err(crate::Error::Validation(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[batch]\nmax_concurrent = 2\n[ai]\nenabled = false\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.batch.max_concurrent, 2);
        assert!(!config.ai.enabled);

        let missing = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(missing.batch.max_concurrent, 4);
    }
}
