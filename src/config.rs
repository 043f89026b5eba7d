use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "mistral-large-latest";
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Main configuration structure for the support assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mistral: MistralConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MistralConfig {
    /// Explicit key. When unset the key is read from `api_key_env` on every call.
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request; 1 means no retry.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub min_bullets: u32,
    pub max_bullets: u32,
    /// Approximate token budget for the transcript; `None` sends everything.
    pub max_transcript_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub bearer_token: Option<String>,
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 200,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            min_bullets: 5,
            max_bullets: 7,
            max_transcript_tokens: Some(8000),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            bearer_token: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mistral: MistralConfig::default(),
            retry: RetryConfig::default(),
            summary: SummaryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = [".env", "../.env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("SUPPORT_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_yaml(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::debug!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        // Validate configuration - log warnings but don't fail
        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Apply environment variable overrides.
    ///
    /// The API key itself is never copied here; it is resolved when a request is made.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("SUPPORT_MODEL") {
            self.mistral.model = model;
        }
        if let Some(url) = lookup("MISTRAL_BASE_URL") {
            self.mistral.base_url = url;
        }

        if let Some(attempts) = lookup("SUPPORT_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.retry.max_attempts = n;
            }
        }

        if let Some(tokens) = lookup("SUPPORT_SUMMARY_MAX_TOKENS") {
            if tokens.eq_ignore_ascii_case("none") || tokens == "0" {
                self.summary.max_transcript_tokens = None;
            } else if let Ok(n) = tokens.parse() {
                self.summary.max_transcript_tokens = Some(n);
            }
        }

        if let Some(bind) = lookup("SUPPORT_HTTP_BIND") {
            self.server.bind = bind;
        }
        if let Some(token) = lookup("SUPPORT_BEARER_TOKEN") {
            if !token.is_empty() {
                self.server.bearer_token = Some(token);
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.mistral.model.trim().is_empty() {
            return Err("mistral.model cannot be empty".into());
        }
        if self.mistral.base_url.trim().is_empty() {
            return Err("mistral.base_url cannot be empty".into());
        }

        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".into());
        }
        if self.retry.jitter_factor < 0.0 || self.retry.jitter_factor > 1.0 {
            return Err("Retry jitter factor must be between 0.0 and 1.0".into());
        }

        if self.summary.min_bullets == 0 || self.summary.min_bullets > self.summary.max_bullets {
            return Err(format!(
                "summary bullets must satisfy 0 < min <= max (got {}..{})",
                self.summary.min_bullets, self.summary.max_bullets
            )
            .into());
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("server.bind '{}' is not host:port", self.server.bind).into());
        }

        Ok(())
    }

    /// Whether a Mistral key can be resolved right now.
    pub fn has_credential(&self) -> bool {
        self.mistral.resolve_api_key().is_some()
    }
}

impl MistralConfig {
    /// Explicit key first, then the environment. Only an empty value counts as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.is_empty())
            })
    }
}
