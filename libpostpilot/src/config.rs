//! Configuration management for Postpilot

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Meta Graph API client settings
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Delay between media container status checks
    #[serde(default = "default_container_poll_interval_ms")]
    pub container_poll_interval_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_base: default_graph_api_base(),
            timeout_seconds: default_timeout_seconds(),
            container_poll_interval_ms: default_container_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            base_url: default_openai_base_url(),
            api_key: None,
        }
    }
}

impl GenerationConfig {
    /// Key from the config file, else `OPENAI_API_KEY`
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from)
    }
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_graph_api_base() -> String {
    DEFAULT_GRAPH_API_BASE.to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_container_poll_interval_ms() -> u64 {
    2000
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;

        if config.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        if config.scheduler.interval_seconds == 0 {
            return Err(ConfigError::MissingField(
                "scheduler.interval_seconds must be greater than zero".to_string(),
            )
            .into());
        }

        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/postpilot/postpilot.db".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            graph: GraphConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("POSTPILOT_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("postpilot").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PostpilotError;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [database]
            path = "/tmp/postpilot.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/tmp/postpilot.db");
        assert_eq!(config.scheduler.interval_seconds, 60);
        assert_eq!(config.graph.api_base, DEFAULT_GRAPH_API_BASE);
        assert_eq!(config.graph.timeout_seconds, 60);
        assert_eq!(config.graph.container_poll_interval_ms, 2000);
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert!(config.generation.api_key.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [database]
            path = "~/pp.db"

            [scheduler]
            interval_seconds = 15

            [graph]
            api_base = "http://localhost:9999"
            container_poll_interval_ms = 10

            [generation]
            model = "gpt-4o"
            api_key = "sk-test"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.interval(), Duration::from_secs(15));
        assert_eq!(config.graph.api_base, "http://localhost:9999");
        assert_eq!(config.graph.timeout_seconds, 60);
        assert_eq!(config.graph.container_poll_interval_ms, 10);
        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(
            config.generation.resolve_api_key().unwrap().expose_secret(),
            "sk-test"
        );
    }

    #[test]
    fn test_missing_database_section_is_parse_error() {
        let result = Config::from_toml("[scheduler]\ninterval_seconds = 5\n");
        match result {
            Err(PostpilotError::Config(ConfigError::ParseError(_))) => {}
            other => panic!("Expected ParseError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Config::from_toml(
            "[database]\npath = \"/tmp/x.db\"\n[scheduler]\ninterval_seconds = 0\n",
        );
        assert!(matches!(
            result,
            Err(PostpilotError::Config(ConfigError::MissingField(_)))
        ));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database]\npath = \"/tmp/from-file.db\"").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.database.path, "/tmp/from-file.db");
    }

    #[test]
    fn test_load_from_missing_path_is_read_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load_from_path(&dir.path().join("nope.toml"));
        assert!(matches!(
            result,
            Err(PostpilotError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_honours_env() {
        std::env::set_var("POSTPILOT_CONFIG", "/etc/postpilot/custom.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("POSTPILOT_CONFIG");

        assert_eq!(path, PathBuf::from("/etc/postpilot/custom.toml"));
    }

    #[test]
    #[serial]
    fn test_api_key_falls_back_to_env() {
        let generation = GenerationConfig::default();

        std::env::set_var("OPENAI_API_KEY", "sk-env");
        let key = generation.resolve_api_key();
        std::env::remove_var("OPENAI_API_KEY");

        assert_eq!(key.unwrap().expose_secret(), "sk-env");
        assert!(generation.resolve_api_key().is_none());
    }
}
