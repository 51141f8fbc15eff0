//! Process configuration loaded from the environment.
//!
//! Credentials have no built-in defaults: `AISTUDIO_API_KEY` and
//! `AISTUDIO_BASE_URL` must be supplied externally (environment or `.env`).
//! Everything else falls back to the defaults below.

use crate::error::{Result, StoryError};
use crate::request::ValidationPolicy;
use std::time::Duration;

pub const API_KEY_ENV: &str = "AISTUDIO_API_KEY";
pub const BASE_URL_ENV: &str = "AISTUDIO_BASE_URL";
pub const MODEL_ENV: &str = "AISTUDIO_MODEL";
pub const TEMPERATURE_ENV: &str = "AISTUDIO_TEMPERATURE";
pub const READ_TIMEOUT_ENV: &str = "AISTUDIO_READ_TIMEOUT_SECS";
pub const VALIDATION_ENV: &str = "AISTUDIO_VALIDATION";
pub const MAX_BODY_ENV: &str = "AISTUDIO_MAX_BODY_BYTES";
pub const DEBUG_ENV: &str = "AISTUDIO_DEBUG";
/// Accepted in place of [`DEBUG_ENV`] for deployments that still set it.
pub const LEGACY_DEBUG_ENV: &str = "FLASK_DEBUG";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

pub const DEFAULT_MODEL: &str = "gemma3:27b";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Large enough for book-length continuation sources.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;

/// Resolved process settings.
#[derive(Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    /// Per-fragment read timeout; `None` disables it.
    pub read_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub validation: ValidationPolicy,
    /// Upper bound on a `/generate` request body.
    pub max_body_bytes: usize,
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            validation: ValidationPolicy::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debug: false,
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// Blank values count as unset. Values that fail to parse are
    /// [`StoryError::InvalidConfig`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Settings::default();

        let temperature = match get(TEMPERATURE_ENV) {
            Some(raw) => parse_value::<f64>(TEMPERATURE_ENV, &raw)?,
            None => defaults.temperature,
        };
        let read_timeout = match get(READ_TIMEOUT_ENV) {
            Some(raw) => match parse_value::<u64>(READ_TIMEOUT_ENV, &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => defaults.read_timeout,
        };
        let validation = match get(VALIDATION_ENV) {
            Some(raw) => raw.parse()?,
            None => defaults.validation,
        };
        let max_body_bytes = match get(MAX_BODY_ENV) {
            Some(raw) => parse_value::<usize>(MAX_BODY_ENV, &raw)?,
            None => defaults.max_body_bytes,
        };
        let port = match get(PORT_ENV) {
            Some(raw) => parse_value::<u16>(PORT_ENV, &raw)?,
            None => defaults.port,
        };
        let debug = get(DEBUG_ENV)
            .or_else(|| get(LEGACY_DEBUG_ENV))
            .is_some_and(|v| parse_flag(&v));

        let settings = Settings {
            api_key: get(API_KEY_ENV),
            base_url: get(BASE_URL_ENV),
            model: get(MODEL_ENV).unwrap_or(defaults.model),
            temperature,
            read_timeout,
            connect_timeout: defaults.connect_timeout,
            validation,
            max_body_bytes,
            host: get(HOST_ENV).unwrap_or(defaults.host),
            port,
            debug,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        check_temperature(self.temperature)?;
        if self.max_body_bytes == 0 {
            return Err(StoryError::InvalidConfig(format!(
                "{} must be greater than 0",
                MAX_BODY_ENV
            )));
        }
        Ok(())
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field(
                "api_key",
                &self.api_key.as_deref().map(crate::backend::openai::redact),
            )
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("read_timeout", &self.read_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("validation", &self.validation)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("debug", &self.debug)
            .finish()
    }
}

/// Temperatures outside `[0, 2]` are rejected.
pub fn check_temperature(temperature: f64) -> Result<()> {
    if (0.0..=2.0).contains(&temperature) {
        Ok(())
    } else {
        Err(StoryError::InvalidConfig(format!(
            "temperature must be within [0, 2], got {}",
            temperature
        )))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| StoryError::InvalidConfig(format!("{}='{}': {}", key, raw, e)))
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
