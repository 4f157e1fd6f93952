//! Agent Configuration Module
//!
//! Configuration is loaded from environment variables with sensible
//! defaults for development. Job-specific settings live next to their jobs.

use secrecy::{ExposeSecret, SecretString};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use sweeper_core::{ConfigError, CoordinationConfig};

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PORT, DEV_APPLICATION_URL,
};

// ============================================================================
// ORCHESTRATOR TOKEN (TYPE-SAFE)
// ============================================================================

/// Bearer token for authenticated orchestrator calls.
///
/// Wrapped in `secrecy` so it never ends up in logs.
#[derive(Clone)]
pub struct OrchestratorToken(SecretString);

impl OrchestratorToken {
    pub fn new(token: String) -> Result<Self, ConfigError> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "orchestrator_token".to_string(),
            });
        }
        Ok(Self(SecretString::new(token.into())))
    }

    /// Expose the token (only when building the Authorization header).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for OrchestratorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrchestratorToken([REDACTED])")
    }
}

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

/// Process-wide agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Public base URL of this agent, used to build callback URLs.
    pub application_url: String,

    /// Orchestrator REST base URL (e.g. "https://orch.example.com/pnc-rest/v2").
    pub orchestrator_url: String,

    /// Log store base URL.
    pub log_store_url: String,

    /// Token for authenticated orchestrator calls (attribute and delete).
    pub orchestrator_token: Option<OrchestratorToken>,

    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,

    /// Retry ceiling, callback timeout and checksum batch size.
    pub coordination: CoordinationConfig,

    /// Host the callback server binds to.
    pub bind_host: String,

    /// Port the callback server binds to.
    pub port: u16,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            application_url: DEV_APPLICATION_URL.to_string(),
            orchestrator_url: String::new(),
            log_store_url: String::new(),
            orchestrator_token: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            coordination: CoordinationConfig::default(),
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            json_logs: true,
        }
    }
}

impl AgentConfig {
    /// Create AgentConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SWEEPER_APPLICATION_URL`: Base URL handed to the orchestrator for callbacks
    /// - `SWEEPER_ORCHESTRATOR_URL`: Orchestrator REST base URL (required)
    /// - `SWEEPER_LOG_STORE_URL`: Log store base URL (required)
    /// - `SWEEPER_ORCHESTRATOR_TOKEN`: Bearer token for mutations
    /// - `SWEEPER_HTTP_TIMEOUT_SECS`: Outbound request timeout (default: 30)
    /// - `SWEEPER_RETRY_CEILING`: Mismatches before a build is flagged bad (default: 3)
    /// - `SWEEPER_CALLBACK_TIMEOUT_SECS`: Delete callback wait (default: 600)
    /// - `SWEEPER_CHECKSUM_BATCH_SIZE`: Log store batch size (default: 10000)
    /// - `SWEEPER_BIND` / `PORT` or `SWEEPER_PORT`: Listen address (default: 0.0.0.0:8080)
    /// - `SWEEPER_JSON_LOGS`: "false" for plain text logs (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let orchestrator_token = match std::env::var("SWEEPER_ORCHESTRATOR_TOKEN") {
            Ok(token) => Some(OrchestratorToken::new(token)?),
            Err(_) => None,
        };

        let coordination = CoordinationConfig {
            retry_ceiling: env_parse("SWEEPER_RETRY_CEILING", defaults.coordination.retry_ceiling)?,
            callback_timeout: Duration::from_secs(env_parse(
                "SWEEPER_CALLBACK_TIMEOUT_SECS",
                defaults.coordination.callback_timeout.as_secs(),
            )?),
            checksum_batch_size: env_parse(
                "SWEEPER_CHECKSUM_BATCH_SIZE",
                defaults.coordination.checksum_batch_size,
            )?,
        };

        let port = match std::env::var("PORT") {
            Ok(_) => env_parse("PORT", defaults.port)?,
            Err(_) => env_parse("SWEEPER_PORT", defaults.port)?,
        };

        Ok(Self {
            application_url: std::env::var("SWEEPER_APPLICATION_URL")
                .unwrap_or(defaults.application_url),
            orchestrator_url: std::env::var("SWEEPER_ORCHESTRATOR_URL").unwrap_or_default(),
            log_store_url: std::env::var("SWEEPER_LOG_STORE_URL").unwrap_or_default(),
            orchestrator_token,
            http_timeout: Duration::from_secs(env_parse(
                "SWEEPER_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            coordination,
            bind_host: std::env::var("SWEEPER_BIND").unwrap_or(defaults.bind_host),
            port,
            json_logs: std::env::var("SWEEPER_JSON_LOGS")
                .ok()
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(defaults.json_logs),
        })
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("application_url", &self.application_url),
            ("orchestrator_url", &self.orchestrator_url),
            ("log_store_url", &self.log_store_url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: field.to_string(),
                });
            }
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                    reason: "must be an http(s) URL".to_string(),
                });
            }
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "http_timeout".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        self.coordination.validate()
    }

    /// Socket address the callback server listens on.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "bind_addr".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }
}

/// Parse an environment variable, falling back to `default` when unset.
/// A set-but-unparseable value is an error rather than a silent default.
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw,
            reason: "could not be parsed".to_string(),
        }),
        Err(_) => Ok(default),
    }
}
