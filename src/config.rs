use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::pr::RepoRef;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .review-relay.toml.
///
/// All fields are optional — the relay should run with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Chat-completion endpoint used for reviews
    #[serde(default)]
    pub llm: LlmConfig,

    /// Local HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// Repository polled by the PR list endpoint
    pub owner: String,
    pub repo: String,
    pub api_base: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: "octocat".to_string(),
            repo: "Hello-World".to_string(),
            api_base: "https://api.github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key. If None, falls back to GROQ_API_KEY env var.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API (without the /chat/completions suffix)
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.5,
            max_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults if the file doesn't exist,
    /// then apply environment overrides.
    ///
    /// Tokens from the file take precedence over GITHUB_TOKEN / GROQ_API_KEY.
    /// GITHUB_OWNER, GITHUB_REPO and PORT always override the file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.github.token.is_none() {
            self.github.token = var("GITHUB_TOKEN");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = var("GROQ_API_KEY");
        }
        if let Some(owner) = var("GITHUB_OWNER") {
            self.github.owner = owner;
        }
        if let Some(repo) = var("GITHUB_REPO") {
            self.github.repo = repo;
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// The repository the PR list endpoint polls.
    pub fn default_repo(&self) -> RepoRef {
        RepoRef {
            owner: self.github.owner.clone(),
            repo: self.github.repo.clone(),
        }
    }
}
