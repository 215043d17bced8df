//! Runtime configuration
//!
//! Built once at startup from the environment (optionally seeded from a
//! `.env` file) and shared read-only with every request.

use crate::{Error, Result};
use axum::http::HeaderValue;
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_IMAGE_TIMEOUT_MS: u64 = 30_000;
pub const MIN_IMAGE_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_PROMPT_MAX_LENGTH: usize = 2000;
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 10;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub gemini_api_key: Option<SecretString>,
    pub mock_ai: bool,
    pub production: bool,
    pub allowed_origins: Vec<String>,
    pub image_timeout: Duration,
    pub prompt_max_length: usize,
    pub image_model: String,
    pub gemini_base_url: String,
    pub static_dir: PathBuf,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gemini_api_key: None,
            mock_ai: false,
            production: false,
            allowed_origins: Vec::new(),
            image_timeout: Duration::from_millis(DEFAULT_IMAGE_TIMEOUT_MS),
            prompt_max_length: DEFAULT_PROMPT_MAX_LENGTH,
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            static_dir: PathBuf::from("dist"),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is applied first if present;
    /// variables already set in the environment win.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values behave like unset ones.
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_PORT,
        };

        let image_timeout_ms = match get("IMAGE_TIMEOUT_MS") {
            Some(raw) => parse_timeout_ms(&raw)?,
            None => DEFAULT_IMAGE_TIMEOUT_MS,
        };

        let production = get("APP_ENV")
            .or_else(|| get("NODE_ENV"))
            .is_some_and(|env| env.eq_ignore_ascii_case("production"));

        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => Vec::new(),
        };

        if production && allowed_origins.is_empty() {
            return Err(Error::Config(
                "ALLOWED_ORIGINS must be set in production (comma-separated list).".to_string(),
            ));
        }

        let prompt_max_length = match get("PROMPT_MAX_LENGTH") {
            Some(raw) => parse_positive("PROMPT_MAX_LENGTH", &raw)? as usize,
            None => DEFAULT_PROMPT_MAX_LENGTH,
        };

        let rate_limit_max = match get("RATE_LIMIT_MAX") {
            Some(raw) => u32::try_from(parse_positive("RATE_LIMIT_MAX", &raw)?).map_err(|_| {
                Error::Config(format!("Invalid RATE_LIMIT_MAX \"{}\". Value too large.", raw))
            })?,
            None => DEFAULT_RATE_LIMIT_MAX,
        };

        let rate_limit_window_secs = match get("RATE_LIMIT_WINDOW_SECS") {
            Some(raw) => parse_positive("RATE_LIMIT_WINDOW_SECS", &raw)?,
            None => DEFAULT_RATE_LIMIT_WINDOW_SECS,
        };

        Ok(Self {
            port,
            gemini_api_key: get("GEMINI_API_KEY").map(SecretString::new),
            mock_ai: get("MOCK_AI").is_some_and(|v| v == "true"),
            production,
            allowed_origins,
            image_timeout: Duration::from_millis(image_timeout_ms),
            prompt_max_length,
            image_model: get("IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("dist")),
            rate_limit_max,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
        })
    }

    /// Whether an origin may call the API cross-site.
    ///
    /// Outside production every origin is accepted.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        !self.production || self.allowed_origins.iter().any(|o| o == origin)
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.parse::<u16>().ok().filter(|p| *p >= 1).ok_or_else(|| {
        Error::Config(format!(
            "Invalid PORT \"{}\". Expected an integer between 1 and 65535.",
            raw
        ))
    })
}

fn parse_timeout_ms(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|ms| *ms >= MIN_IMAGE_TIMEOUT_MS)
        .ok_or_else(|| {
            Error::Config(format!(
                "Invalid IMAGE_TIMEOUT_MS \"{}\". Use an integer >= {}.",
                raw, MIN_IMAGE_TIMEOUT_MS
            ))
        })
}

fn parse_positive(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().ok().filter(|v| *v >= 1).ok_or_else(|| {
        Error::Config(format!(
            "Invalid {} \"{}\". Expected a positive integer.",
            name, raw
        ))
    })
}

/// Split a comma-separated origin list.
///
/// Every entry must be an exact origin usable as a header value; the
/// `*` wildcard is not accepted.
fn parse_origins(raw: &str) -> Result<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|origin| {
            if origin == "*" || HeaderValue::from_str(origin).is_err() {
                return Err(Error::Config(format!(
                    "Invalid ALLOWED_ORIGINS entry \"{}\". Expected an exact origin such as https://app.example.",
                    origin
                )));
            }
            Ok(origin.to_string())
        })
        .collect()
}
