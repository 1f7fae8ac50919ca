//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FYDO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STORAGE_PUBLIC_BASE_URL` - Public URL prefix of the receipt image bucket
//!
//! ## Optional
//! - `FYDO_HOST` - Bind address (default: 127.0.0.1)
//! - `FYDO_PORT` - Listen port (default: 3000)
//! - `FYDO_AUTO_APPROVE_THRESHOLD` - Match score (0-100) that auto-approves a review (default: 80)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//!
//! ## Optional (AI review generation - enabled when `AI_REVIEW_URL` is set)
//! - `AI_REVIEW_URL` - Endpoint of the review generation function
//! - `AI_REVIEW_API_KEY` - Bearer key for that endpoint (required with the URL)
//! - `AI_REVIEW_TIMEOUT_SECS` - Abort the call after this many seconds (default: 30)
//! - `AI_REVIEW_SYSTEM_USER` - External id of the account AI reviews are attributed to (default: fydo-ai)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use fydo_core::matching::DEFAULT_AUTO_APPROVE_THRESHOLD;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AI_SYSTEM_USER: &str = "fydo-ai";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public URL prefix receipt storage paths are joined onto
    pub storage_public_base_url: Url,
    /// Match score from which reviews skip moderation
    pub auto_approve_threshold: u8,
    /// AI review generation (disabled when `None`)
    pub ai_review: Option<AiReviewConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name (e.g. production, staging)
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// External AI review generation function.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct AiReviewConfig {
    /// Endpoint URL
    pub url: Url,
    /// Bearer key
    pub api_key: SecretString,
    /// Upper bound for the whole call
    pub timeout: Duration,
    /// External id of the account AI reviews belong to
    pub system_user: String,
}

impl std::fmt::Debug for AiReviewConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiReviewConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("system_user", &self.system_user)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("FYDO_DATABASE_URL")?;
        let host = get_env_or_default("FYDO_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("FYDO_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("FYDO_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("FYDO_PORT".to_string(), e.to_string()))?;
        let storage_public_base_url =
            parse_base_url("STORAGE_PUBLIC_BASE_URL", &get_required_env("STORAGE_PUBLIC_BASE_URL")?)?;
        let auto_approve_threshold = parse_threshold(
            get_optional_env("FYDO_AUTO_APPROVE_THRESHOLD").as_deref(),
        )?;
        let ai_review = AiReviewConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            storage_public_base_url,
            auto_approve_threshold,
            ai_review,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AiReviewConfig {
    /// Load the AI section. Returns `Ok(None)` when `AI_REVIEW_URL` is unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is set but invalid, or the key is
    /// missing or fails validation.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(raw_url) = get_optional_env("AI_REVIEW_URL") else {
            return Ok(None);
        };

        let url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("AI_REVIEW_URL".to_string(), e.to_string()))?;
        let api_key = get_validated_secret("AI_REVIEW_API_KEY")?;
        let timeout_secs = match get_optional_env("AI_REVIEW_TIMEOUT_SECS") {
            Some(s) => s.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("AI_REVIEW_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            None => DEFAULT_AI_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "AI_REVIEW_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Some(Self {
            url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
            system_user: get_env_or_default("AI_REVIEW_SYSTEM_USER", DEFAULT_AI_SYSTEM_USER),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a base URL, making sure it ends with `/` so relative joins append.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Parse the auto-approve threshold (0-100).
fn parse_threshold(raw: Option<&str>) -> Result<u8, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_AUTO_APPROVE_THRESHOLD);
    };
    let invalid = |msg: String| ConfigError::InvalidEnvVar("FYDO_AUTO_APPROVE_THRESHOLD".to_string(), msg);
    let value = raw.trim().parse::<u8>().map_err(|e| invalid(e.to_string()))?;
    if value > 100 {
        return Err(invalid(format!("must be between 0 and 100 (got {value})")));
    }
    Ok(value)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "AI_REVIEW_API_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "AI_REVIEW_API_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "AI_REVIEW_API_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_base_url_appends_slash() {
        let url = parse_base_url("X", "https://cdn.fydo.app/receipts").unwrap();
        assert_eq!(url.as_str(), "https://cdn.fydo.app/receipts/");
        assert_eq!(
            url.join("42/ticket.jpg").unwrap().as_str(),
            "https://cdn.fydo.app/receipts/42/ticket.jpg"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_relative() {
        assert!(parse_base_url("X", "receipts/").is_err());
        assert!(parse_base_url("X", "mailto:ops@fydo.app").is_err());
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold(None).unwrap(), DEFAULT_AUTO_APPROVE_THRESHOLD);
        assert_eq!(parse_threshold(Some(" 65 ")).unwrap(), 65);
        assert!(parse_threshold(Some("101")).is_err());
        assert!(parse_threshold(Some("high")).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/fydo"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            storage_public_base_url: Url::parse("https://cdn.fydo.app/").unwrap(),
            auto_approve_threshold: 80,
            ai_review: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_ai_config_debug_redacts_key() {
        let config = AiReviewConfig {
            url: Url::parse("https://functions.fydo.app/generate-review").unwrap(),
            api_key: SecretString::from("sk_live_9fQ2xLp7"),
            timeout: Duration::from_secs(30),
            system_user: "fydo-ai".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("functions.fydo.app"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_live_9fQ2xLp7"));
    }
}
