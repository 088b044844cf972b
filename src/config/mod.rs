//! Process-wide configuration, read once at startup.
//!
//! Values come from the environment (optionally seeded from a `.env` file):
//!
//! | Variable              | Required | Default                     |
//! |-----------------------|----------|-----------------------------|
//! | `OPENAI_API_KEY`      | yes      |                             |
//! | `OPENAI_BASE_URL`     | no       | `https://api.openai.com/v1` |
//! | `OPENAI_MODEL`        | no       | `gpt-3.5-turbo`             |
//! | `OPENAI_TEMPERATURE`  | no       | `0.7`                       |
//! | `LANDING_FORGE_ADDR`  | no       | `127.0.0.1:8080`            |

use std::fmt;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Errors produced while loading [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Settings for the OpenAI client.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Immutable application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub addr: String,
    pub openai: OpenAiConfig,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `OPENAI_API_KEY` is unset or blank,
    /// and [`ConfigError::Invalid`] when the key holds whitespace, control or
    /// non-ASCII characters, or when `OPENAI_TEMPERATURE` is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        // Sent verbatim in the `Authorization` header.
        if !api_key.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(ConfigError::Invalid {
                name: "OPENAI_API_KEY",
                value: "<redacted>".to_owned(),
            });
        }

        let temperature = match var("OPENAI_TEMPERATURE") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "OPENAI_TEMPERATURE",
                value: raw,
            })?,
            None => DEFAULT_TEMPERATURE,
        };

        Ok(Self {
            addr: var("LANDING_FORGE_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_owned()),
            openai: OpenAiConfig {
                api_key,
                base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
                model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
                temperature,
            },
        })
    }
}
