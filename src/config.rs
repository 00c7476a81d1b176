//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name under which credentials are stored.
const KEYRING_SERVICE: &str = "agent-callroom";

/// Remote conversation provider connectivity settings.
///
/// The API key is loaded at runtime via OS keychain or environment
/// variables, never from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    /// Base URL of the provider's HTTP API (e.g. `http://127.0.0.1:8000`).
    pub base_url: String,
    /// Whole-request timeout applied to every provider call.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// TCP connect timeout for provider calls.
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    /// Bearer key sent to the provider (populated at runtime).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_connect_timeout_seconds() -> u64 {
    5
}

fn default_http_host() -> String {
    "127.0.0.1".into()
}

fn default_http_port() -> u16 {
    8080
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data").join("callroom.db")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Interface the HTTP API binds to.
    #[serde(default = "default_http_host")]
    pub http_host: String,
    /// Port the HTTP API binds to; 0 lets the OS choose.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Location of the `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Remote conversation provider settings.
    pub provider: ProviderConfig,
    /// Bearer token required on operator routes (populated at runtime).
    #[serde(skip)]
    pub operator_token: Option<String>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the provider API key and operator token from OS keychain with
    /// env-var fallback.
    ///
    /// Both credentials are optional: a missing provider key means the
    /// provider is called unauthenticated, and a missing operator token
    /// leaves operator routes open (suitable only for local deployments).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain lookup task panics.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.provider.api_key =
            load_credential("provider_api_key", "CALLROOM_PROVIDER_API_KEY").await?;
        self.operator_token = load_credential("operator_token", "CALLROOM_OPERATOR_TOKEN").await?;
        if self.operator_token.is_none() {
            warn!("no operator token configured; operator routes are unauthenticated");
        }
        Ok(())
    }

    /// Socket address string the HTTP API binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    fn validate(&mut self) -> Result<()> {
        let base_url = self.provider.base_url.trim().trim_end_matches('/').to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::Config(
                "provider.base_url must start with http:// or https://".into(),
            ));
        }
        self.provider.base_url = base_url;

        if self.provider.timeout_seconds == 0 {
            return Err(AppError::Config(
                "provider.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.provider.connect_timeout_seconds == 0 {
            return Err(AppError::Config(
                "provider.connect_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.http_host.trim().is_empty() {
            return Err(AppError::Config("http_host must not be empty".into()));
        }

        Ok(())
    }
}

/// Load a single optional credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(keyring::Error::NoEntry) => {}
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    Ok(env::var(env_key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty()))
}
