use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::Error;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub webex: WebexConfig,
    pub geocode: GeocodeConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WebexConfig {
    pub token: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GeocodeConfig {
    pub api_key: String,
}

impl Config {
    /// Load `config.toml` if it exists, then let the environment
    /// (`WEBEX_TOKEN`, `OPENWEATHER_KEY`) override it. A missing file is
    /// fine; a present-but-broken file is not.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };
        config.apply_env(
            std::env::var("WEBEX_TOKEN").ok(),
            std::env::var("OPENWEATHER_KEY").ok(),
        );
        Ok(config)
    }

    fn apply_env(&mut self, webex_token: Option<String>, geocode_key: Option<String>) {
        if let Some(token) = webex_token {
            if !token.trim().is_empty() {
                self.webex.token = token.trim().to_string();
            }
        }
        if let Some(key) = geocode_key {
            if !key.trim().is_empty() {
                self.geocode.api_key = key.trim().to_string();
            }
        }
    }

    /// Geocoding is optional: an absent key degrades replies to a diagnostic
    /// place string instead of failing.
    pub fn geocode_key(&self) -> Option<&str> {
        let key = self.geocode.api_key.trim();
        (!key.is_empty()).then_some(key)
    }

    /// The Webex token is not optional; fail before any network call.
    pub fn require_webex_token(&self) -> crate::error::Result<&str> {
        let token = self.webex.token.trim();
        if token.is_empty() {
            return Err(Error::ConfigMissing("WEBEX_TOKEN"));
        }
        Ok(token)
    }
}
