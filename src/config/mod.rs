//! Configuration management for the travel assistant
//!
//! Settings come from `config.toml` in the platform config directory and are
//! then overridden by the environment variables the deployment already uses
//! (`OLLAMA_BASE_URL`, `OLLAMA_MODEL`, `OPENWEATHER_KEY`, `HOST`, `PORT`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub weather: WeatherConfig,
    pub session: SessionConfig,
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

/// Model server settings (Ollama-compatible `/api/chat`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Offer the weather tool to the model instead of enriching the prompt up front
    pub use_tools: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3:latest".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1024,
            use_tools: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub units: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            units: "metric".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions older than this are removed by the sweeper
    pub max_age_secs: u64,
    pub sweep_interval_secs: u64,
    /// Turns kept when curating history before a model call
    pub history_window: usize,
    /// Turns returned by the session inspection endpoint
    pub history_view: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            history_window: 8,
            history_view: 10,
        }
    }
}

impl SessionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Tunables for the prompt/session pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Word-set Jaccard similarity at which a message counts as a repeat
    pub duplicate_threshold: f64,
    /// Fixed model-call timeout; `None` picks one from the query complexity
    pub request_timeout_secs: Option<u64>,
    /// Starting confidence for the response quality scanner
    pub quality_baseline: f64,
    /// Question/reply word overlap below which a reply is flagged off-topic
    pub off_topic_threshold: f64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.8,
            request_timeout_secs: None,
            quality_baseline: 0.5,
            off_topic_threshold: 0.3,
        }
    }
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            Self::read_file(&config_path)?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "travel-assistant") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup; split out so tests need not touch the process env
    pub(crate) fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("OLLAMA_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = non_empty("OLLAMA_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = non_empty("OPENWEATHER_KEY") {
            self.weather.api_key = Some(key);
        }
        if let Some(host) = non_empty("HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.model, "llama3:latest");
        assert_eq!(config.session.history_window, 8);
        assert_eq!(config.session.max_age(), Duration::from_secs(86_400));
        assert!((config.assistant.duplicate_threshold - 0.8).abs() < f64::EPSILON);
        assert!(config.weather.api_key.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[llm]
model = "mistral"

[session]
history_window = 10
"#,
        )
        .unwrap();

        let config = Config::read_file(&path).unwrap();
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.session.history_window, 10);
        assert_eq!(config.session.sweep_interval_secs, 3600);
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();
        assert!(Config::read_file(&path).is_err());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
            ("OLLAMA_MODEL", "llama3.1:8b"),
            ("OPENWEATHER_KEY", "secret"),
            ("PORT", "8080"),
            ("HOST", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.base_url, "http://gpu-box:11434");
        assert_eq!(config.llm.model, "llama3.1:8b");
        assert_eq!(config.weather.api_key.as_deref(), Some("secret"));
        assert_eq!(config.server.port, 8080);
        // Empty values are ignored
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 3001);
    }
}
