//! Configuration management for the PDF annotator server

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub annotation: AnnotationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Deserialize)]
pub struct IdentityConfig {
    /// IdAM API base URL (serves `/details` and `/o/token`)
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Per-request timeout for identity calls
    pub timeout_secs: u64,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    /// Role a caller must hold to use the service (None = any authenticated user)
    pub required_role: Option<String>,
    pub max_upload_bytes: usize,
    pub max_output_bytes: usize,
    pub timeout_secs: u64,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 100 * 1024 * 1024;
const DEFAULT_ANNOTATE_TIMEOUT_SECS: u64 = 30;

impl Default for AnnotationConfig {
    fn default() -> Self {
        AnnotationConfig {
            required_role: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            timeout_secs: DEFAULT_ANNOTATE_TIMEOUT_SECS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
            },
            identity: IdentityConfig {
                base_url: "http://localhost:5000".to_string(),
                client_id: "npa".to_string(),
                client_secret: String::new(),
                redirect_uri: "/oauth2redirect".to_string(),
                timeout_secs: DEFAULT_IDENTITY_TIMEOUT_SECS,
            },
            annotation: AnnotationConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", DEFAULT_PORT)?,
            },
            identity: IdentityConfig {
                base_url: required("IDAM_API_BASE_URL")?,
                client_id: required("IDAM_CLIENT_ID")?,
                client_secret: required("IDAM_CLIENT_SECRET")?,
                redirect_uri: required("IDAM_REDIRECT_URI")?,
                timeout_secs: parse_var("IDAM_TIMEOUT_SECS", DEFAULT_IDENTITY_TIMEOUT_SECS)?,
            },
            annotation: AnnotationConfig {
                required_role: env::var("REQUIRED_ROLE").ok().filter(|r| !r.trim().is_empty()),
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
                max_output_bytes: parse_var("MAX_OUTPUT_BYTES", DEFAULT_MAX_OUTPUT_BYTES)?,
                timeout_secs: parse_var("ANNOTATE_TIMEOUT_SECS", DEFAULT_ANNOTATE_TIMEOUT_SECS)?,
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
