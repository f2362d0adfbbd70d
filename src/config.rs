use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::services::theme::Theme;

pub const APP_ID: &str = "lmchat";
pub const APP_NAME: &str = "LM Chat";

pub const DEFAULT_API_BASE: &str = "http://localhost:8001/api";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 512;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Neither XDG_CONFIG_HOME nor HOME is set")]
    NoConfigDir,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: Url,
    pub temperature: f32,
    pub max_tokens: u32,
    pub default_theme: Theme,
    pub preferences_path: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = parse_http_url(
            "LMCHAT_API_BASE",
            &lookup("LMCHAT_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        )?;

        let temperature = match lookup("LMCHAT_TEMPERATURE") {
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|t| (0.0..=2.0).contains(t))
                .ok_or_else(|| ConfigError::Invalid {
                    key: "LMCHAT_TEMPERATURE",
                    reason: format!("expected a number between 0 and 2, got {:?}", raw),
                })?,
            None => DEFAULT_TEMPERATURE,
        };

        let max_tokens = match lookup("LMCHAT_MAX_TOKENS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "LMCHAT_MAX_TOKENS",
                    reason: format!("expected a positive integer, got {:?}", raw),
                })?,
            None => DEFAULT_MAX_TOKENS,
        };

        let default_theme = match lookup("LMCHAT_THEME") {
            Some(raw) => Theme::from_str(raw.trim()).ok_or_else(|| ConfigError::Invalid {
                key: "LMCHAT_THEME",
                reason: format!("expected \"light\" or \"dark\", got {:?}", raw),
            })?,
            None => Theme::Light,
        };

        let config_dir = lookup("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".config")))
            .ok_or(ConfigError::NoConfigDir)?;

        Ok(Self {
            api_base,
            temperature,
            max_tokens,
            default_theme,
            preferences_path: config_dir.join(APP_ID).join("preferences.json"),
        })
    }
}

/// Absolute http(s) URL, as the backend requires for its LM Studio address.
pub fn parse_http_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }
    Ok(url)
}
