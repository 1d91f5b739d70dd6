//! Client configuration loaded from environment variables.

use thiserror::Error;

use crate::client::DEFAULT_BASE_URL;

pub const TOKEN_ENV: &str = "CHATWORK_API_TOKEN";
pub const BASE_URL_ENV: &str = "CHATWORK_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
}

/// Token and API root for a `ChatworkClient`.
#[derive(Clone)]
pub struct ClientConfig {
    /// Env: `CHATWORK_API_TOKEN` (required)
    pub token: String,

    /// Env: `CHATWORK_BASE_URL`
    /// Default: `https://api.chatwork.com/v2`
    pub base_url: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let token = value(TOKEN_ENV).ok_or(ConfigError::MissingVar(TOKEN_ENV))?;
        let base_url = value(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self { token, base_url })
    }
}
