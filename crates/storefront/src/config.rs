//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//! - `ROCKETSHOES_API_URL` - Product/stock API base URL (default: <http://localhost:3333>)
//! - `ROCKETSHOES_API_TOKEN` - Bearer token sent to the product/stock API
//! - `ROCKETSHOES_API_TIMEOUT_SECS` - Catalog request timeout in seconds (default: 10)
//! - `ROCKETSHOES_STORAGE_DIR` - Directory holding the persisted cart (default: .rocketshoes)
//! - `ROCKETSHOES_HOST` - Bind address (default: 127.0.0.1)
//! - `ROCKETSHOES_PORT` - Listen port (default: 3000)
//! - `ROCKETSHOES_LOG_FORMAT` - `text` or `json` (default: text)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:3333";
const DEFAULT_API_TIMEOUT_SECS: &str = "10";
const DEFAULT_STORAGE_DIR: &str = ".rocketshoes";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Directory where the cart is persisted
    pub storage_dir: PathBuf,
    /// Product/stock API configuration
    pub catalog: CatalogConfig,
    /// Log output format
    pub log_format: LogFormat,
}

/// Log line format for the `fmt` subscriber layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidEnvVar(
                "ROCKETSHOES_LOG_FORMAT".to_string(),
                format!("expected 'text' or 'json', got '{other}'"),
            )),
        }
    }
}

impl LogFormat {
    /// Read `ROCKETSHOES_LOG_FORMAT`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for values other than `text` or `json`.
    pub fn from_env() -> Result<Self, ConfigError> {
        get_env_or_default("ROCKETSHOES_LOG_FORMAT", "text").parse()
    }
}

/// Product/stock API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct CatalogConfig {
    /// Base URL; `/products/{id}` and `/stock/{id}` are resolved against it
    pub base_url: Url,
    /// Optional bearer token
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ROCKETSHOES_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ROCKETSHOES_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("ROCKETSHOES_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ROCKETSHOES_PORT".to_string(), e.to_string())
            })?;
        let storage_dir = PathBuf::from(get_env_or_default(
            "ROCKETSHOES_STORAGE_DIR",
            DEFAULT_STORAGE_DIR,
        ));

        Ok(Self {
            host,
            port,
            storage_dir,
            catalog: CatalogConfig::from_env()?,
            log_format: LogFormat::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CatalogConfig {
    /// Load only the catalog settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL or timeout cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(&get_env_or_default(
            "ROCKETSHOES_API_URL",
            DEFAULT_API_URL,
        ))?;
        let timeout_secs = get_env_or_default("ROCKETSHOES_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "ROCKETSHOES_API_TIMEOUT_SECS".to_string(),
                    e.to_string(),
                )
            })?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ROCKETSHOES_API_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_token: get_optional_env("ROCKETSHOES_API_TOKEN").map(SecretString::from),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Catalog settings pointing at `base_url` with defaults for the rest.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an http(s) URL.
    pub fn with_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_token: None,
            timeout: Duration::from_secs(10),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, forcing a trailing slash so relative joins keep
/// any path prefix (e.g. `https://host/api/`).
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidEnvVar("ROCKETSHOES_API_URL".to_string(), msg);

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
