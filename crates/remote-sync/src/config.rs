//! Startup configuration for the remote client.

use fieldmark_core::errors::{Error, Result};

const API_URL_ENV: &str = "FIELDMARK_API_URL";
const API_TOKEN_ENV: &str = "FIELDMARK_API_TOKEN";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the verification backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub access_token: String,
    pub timeout_secs: u64,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Reads the endpoint and credential from the environment. Fails fast at
    /// startup rather than surfacing as a remote error mid-cycle.
    pub fn from_env() -> Result<Self> {
        let base_url = require_env(API_URL_ENV)?;
        let access_token = require_env(API_TOKEN_ENV)?;
        Ok(Self::new(base_url, access_token))
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::configuration(format!("{} is not set", name)))
}
