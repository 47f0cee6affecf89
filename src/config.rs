use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::graph::Depth;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub graphscope: GraphscopeConfig,
    #[serde(default)]
    pub investigation: InvestigationConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

/// Graphscope-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphscopeConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Which traversal strategy to run against the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Native path query when the store supports it, frontier expansion otherwise
    #[default]
    Auto,
    PathQuery,
    Frontier,
}

/// Traversal limits and tuning
#[derive(Debug, Clone, Deserialize)]
pub struct InvestigationConfig {
    #[serde(default = "default_depth")]
    pub default_depth: i64,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub strategy: StrategyMode,
    /// Max concurrent adjacency queries per frontier round
    #[serde(default = "default_fanout")]
    pub fanout: usize,
}

impl Default for InvestigationConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            warning_threshold: default_warning_threshold(),
            timeout_ms: default_timeout_ms(),
            strategy: StrategyMode::default(),
            fanout: default_fanout(),
        }
    }
}

/// Tie-break between start-entity candidates of the same match kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    MostRecent,
    Oldest,
}

/// Start-entity resolution policy
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default = "default_true")]
    pub allow_partial_match: bool,
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            allow_partial_match: true,
            tie_break: TieBreak::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_depth() -> i64 {
    1
}

fn default_warning_threshold() -> usize {
    500
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_fanout() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in GRAPHSCOPE_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("GRAPHSCOPE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&config_str)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if Depth::new(self.investigation.default_depth).is_err() {
            anyhow::bail!(
                "investigation.default_depth must be between 1 and 3, got {}",
                self.investigation.default_depth
            );
        }

        if self.investigation.warning_threshold == 0 {
            anyhow::bail!("investigation.warning_threshold must be greater than 0");
        }

        if self.investigation.timeout_ms == 0 {
            anyhow::bail!("investigation.timeout_ms must be greater than 0");
        }

        if self.investigation.fanout == 0 {
            anyhow::bail!("investigation.fanout must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.graphscope.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[graphscope]
db_path = "./graph.db"
log_level = "debug"

[investigation]
default_depth = 2
warning_threshold = 250
timeout_ms = 3000
strategy = "frontier"
fanout = 4

[resolution]
allow_partial_match = false
tie_break = "oldest"
"#;

    #[test]
    fn test_config_parse_full() {
        let config = Config::from_toml(FULL_CONFIG).unwrap();
        assert_eq!(config.graphscope.log_level, "debug");
        assert_eq!(config.investigation.default_depth, 2);
        assert_eq!(config.investigation.warning_threshold, 250);
        assert_eq!(config.investigation.strategy, StrategyMode::Frontier);
        assert_eq!(config.investigation.fanout, 4);
        assert!(!config.resolution.allow_partial_match);
        assert_eq!(config.resolution.tie_break, TieBreak::Oldest);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_toml("[graphscope]\ndb_path = \"g.db\"\n").unwrap();
        assert_eq!(config.graphscope.log_level, "info");
        assert_eq!(config.investigation.default_depth, 1);
        assert_eq!(config.investigation.warning_threshold, 500);
        assert_eq!(config.investigation.strategy, StrategyMode::Auto);
        assert!(config.resolution.allow_partial_match);
        assert_eq!(config.resolution.tie_break, TieBreak::MostRecent);
    }

    #[test]
    fn test_config_rejects_bad_depth() {
        let err = Config::from_toml(
            "[graphscope]\ndb_path = \"g.db\"\n[investigation]\ndefault_depth = 4\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("default_depth"));
    }

    #[test]
    fn test_config_rejects_zero_fanout() {
        let result = Config::from_toml(
            "[graphscope]\ndb_path = \"g.db\"\n[investigation]\nfanout = 0\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();

        let original = std::env::var("GRAPHSCOPE_CONFIG").ok();
        std::env::set_var("GRAPHSCOPE_CONFIG", &config_path);
        let config = Config::load();
        std::env::remove_var("GRAPHSCOPE_CONFIG");
        if let Some(v) = original {
            std::env::set_var("GRAPHSCOPE_CONFIG", v);
        }

        let config = config.unwrap();
        assert_eq!(config.db_path(), Path::new("./graph.db"));
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("GRAPHSCOPE_CONFIG").ok();
        std::env::set_var("GRAPHSCOPE_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("GRAPHSCOPE_CONFIG");
        if let Some(v) = original {
            std::env::set_var("GRAPHSCOPE_CONFIG", v);
        }
    }
}
