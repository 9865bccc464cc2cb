//! Application configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Everything the server needs to reach the backend (endpoint, project,
//! database, bucket, and per-collection ids) is supplied externally. Parsing
//! goes through a lookup closure so tests can feed a map instead of mutating
//! the process environment.

use std::path::PathBuf;

pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_WEB_DIR: &str = "./web";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Collection ids inside the configured database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub wallpapers: String,
    pub likes: String,
    pub favorites: String,
    pub follows: String,
    pub downloads: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Connection settings for the backend-as-a-service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub bucket_id: String,
    pub collections: Collections,
    pub timeouts: BackendTimeouts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    /// Externally visible base URL, used for OAuth success/failure redirects.
    pub public_url: String,
    pub port: u16,
    pub cookie_secure: bool,
    pub web_dir: PathBuf,
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            lookup(var)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing { var })
        };

        let backend = BackendConfig {
            endpoint: required("BAAS_ENDPOINT")?.trim_end_matches('/').to_owned(),
            project_id: required("BAAS_PROJECT_ID")?,
            api_key: required("BAAS_API_KEY")?,
            database_id: required("BAAS_DATABASE_ID")?,
            bucket_id: required("BAAS_BUCKET_ID")?,
            collections: Collections {
                wallpapers: required("COLLECTION_WALLPAPERS_ID")?,
                likes: required("COLLECTION_LIKES_ID")?,
                favorites: required("COLLECTION_FAVORITES_ID")?,
                follows: required("COLLECTION_FOLLOWS_ID")?,
                downloads: required("COLLECTION_DOWNLOADS_ID")?,
            },
            timeouts: BackendTimeouts {
                request_secs: parse_or(&lookup, "BAAS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
                connect_secs: parse_or(&lookup, "BAAS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            },
        };

        let public_url = lookup("PUBLIC_URL")
            .map(|v| v.trim().trim_end_matches('/').to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_owned());

        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { var: "COOKIE_SECURE", value: raw })?,
            None => public_url.starts_with("https://"),
        };

        let web_dir = lookup("WEB_DIR")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_WEB_DIR), PathBuf::from);

        Ok(Self {
            backend,
            public_url,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            cookie_secure,
            web_dir,
        })
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
