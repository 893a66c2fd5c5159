use crate::application_port::TokenConfig;
use crate::logger::{LogConfig, LogFormat};
use crate::retry::RetryPolicy;
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub auth: Auth,
    pub secrets: Secrets,
    pub invalid_tokens: InvalidTokens,
    pub user: User,
    #[serde(default)]
    pub retry: Retry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub address: String,
    /// TLS is enabled when both paths are set.
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default = "default_true")]
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Log {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            filter: self.filter.clone(),
            format: self.format,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    #[serde(default)]
    pub leeway_secs: u64,
    pub private_key_secret: String,
    pub public_key_secret: String,
    pub kid_secret: String,
    pub jwks_source: String, // "local" or "http"
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default = "default_jwks_timeout_ms")]
    pub jwks_timeout_ms: u64,
    #[serde(default = "default_jwks_refetch_secs")]
    pub jwks_refetch_secs: u64,
}

impl Auth {
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            access_ttl: Duration::from_secs(self.access_ttl_secs),
            refresh_ttl: Duration::from_secs(self.refresh_ttl_secs),
            leeway_secs: self.leeway_secs,
            jwks_refetch_interval: Duration::from_secs(self.jwks_refetch_secs),
            private_key_secret: self.private_key_secret.clone(),
            public_key_secret: self.public_key_secret.clone(),
            kid_secret: self.kid_secret.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Secrets {
    pub backend: String, // "file" or "env"
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvalidTokens {
    pub backend: String, // "redis" or "memory"
    #[serde(default)]
    pub dsn: Option<String>,
    #[serde(default = "default_invalid_token_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub backend: String, // "mysql" or "memory"
    #[serde(default)]
    pub dsn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retry {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub call_timeout_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Retry {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            call_timeout_ms: policy.call_timeout.as_millis() as u64,
        }
    }
}

impl Retry {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_jwks_timeout_ms() -> u64 {
    2000
}

fn default_jwks_refetch_secs() -> u64 {
    30
}

fn default_invalid_token_prefix() -> String {
    "invalid-tokens".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub const ENV_PREFIX: &str = "FINTRACK";

/// Loads the TOML file at `path` (or the build's default), then overlays
/// `FINTRACK__SECTION__KEY` environment variables.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
