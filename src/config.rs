use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SquirrelConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub notes: NotesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Adds the `Secure` attribute to identity cookies. Enable behind HTTPS.
    pub cookie_secure: bool,
    pub session_ttl_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// `openai` (any OpenAI-compatible chat completions API) or `disabled`.
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotesConfig {
    pub max_note_chars: usize,
    /// How many of a topic's most recent points feed its summary.
    pub summary_max_points: usize,
    /// Anonymous users must register after this many notes.
    pub demo_max_points: usize,
    pub poll_timeout_secs: u64,
    pub demo_retention_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            log_level: "info".into(),
            cookie_secure: false,
            session_ttl_days: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_squirrel_dir()
            .join("notes.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            endpoint: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            timeout_secs: 60,
            temperature: 0.3,
        }
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            max_note_chars: 5000,
            summary_max_points: 30,
            demo_max_points: 20,
            poll_timeout_secs: 60,
            demo_retention_days: 30,
        }
    }
}

/// Returns `~/.squirrel-notes/`
pub fn default_squirrel_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".squirrel-notes")
}

/// Returns the default config file path: `~/.squirrel-notes/config.toml`
pub fn default_config_path() -> PathBuf {
    default_squirrel_dir().join("config.toml")
}

impl SquirrelConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            SquirrelConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SQUIRREL_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SQUIRREL_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("SQUIRREL_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(value = %val, "ignoring invalid SQUIRREL_PORT: {e}"),
            }
        }
        if let Ok(val) = std::env::var("SQUIRREL_LLM_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            self.llm.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("SQUIRREL_LLM_MODEL") {
            self.llm.model = val;
        }
        if let Ok(val) = std::env::var("SQUIRREL_LLM_ENDPOINT") {
            self.llm.endpoint = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
