//! Environment-backed configuration loading.
//!
//! # Design
//! - Every setting is optional; unset variables fall back to `defaults.rs`.
//! - Lookup is injected so tests never touch the process environment.

use tracing::debug;

use crate::error::ConfigResult;
use crate::model::ClientConfig;
use crate::validate::{parse_count, parse_principal, parse_seconds, parse_url};

/// API root override.
pub const ENV_API_ROOT: &str = "NOTEGRAPH_API_ROOT";
/// Principal path segment override.
pub const ENV_PRINCIPAL: &str = "NOTEGRAPH_PRINCIPAL";
/// HTTP timeout in seconds.
pub const ENV_HTTP_TIMEOUT_SECS: &str = "NOTEGRAPH_HTTP_TIMEOUT_SECS";
/// User agent override.
pub const ENV_USER_AGENT: &str = "NOTEGRAPH_USER_AGENT";
/// Operation poll budget.
pub const ENV_POLL_MAX_ATTEMPTS: &str = "NOTEGRAPH_POLL_MAX_ATTEMPTS";
/// Lower pause bound between polls, in seconds.
pub const ENV_POLL_MIN_DELAY_SECS: &str = "NOTEGRAPH_POLL_MIN_DELAY_SECS";
/// Upper bound of the first pause between polls, in seconds.
pub const ENV_POLL_BASE_MAX_DELAY_SECS: &str = "NOTEGRAPH_POLL_BASE_MAX_DELAY_SECS";
/// Per-attempt growth of the pause upper bound, in seconds.
pub const ENV_POLL_DELAY_STEP_SECS: &str = "NOTEGRAPH_POLL_DELAY_STEP_SECS";

impl ClientConfig {
    /// Load configuration from `NOTEGRAPH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but cannot be parsed, or when the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when a value cannot be parsed, or when the resulting
    /// configuration is inconsistent.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(ENV_API_ROOT) {
            config.api_root = parse_url("api_root", &raw)?;
        }
        if let Some(raw) = get(ENV_PRINCIPAL) {
            config.principal = parse_principal("principal", &raw)?;
        }
        if let Some(raw) = get(ENV_HTTP_TIMEOUT_SECS) {
            config.http_timeout = parse_seconds("http_timeout", &raw)?;
        }
        if let Some(raw) = get(ENV_USER_AGENT) {
            config.user_agent = raw.trim().to_string();
        }
        if let Some(raw) = get(ENV_POLL_MAX_ATTEMPTS) {
            config.poll.max_attempts = parse_count("poll.max_attempts", &raw)?;
        }
        if let Some(raw) = get(ENV_POLL_MIN_DELAY_SECS) {
            config.poll.min_delay = parse_seconds("poll.min_delay", &raw)?;
        }
        if let Some(raw) = get(ENV_POLL_BASE_MAX_DELAY_SECS) {
            config.poll.base_max_delay = parse_seconds("poll.base_max_delay", &raw)?;
        }
        if let Some(raw) = get(ENV_POLL_DELAY_STEP_SECS) {
            config.poll.delay_step = parse_seconds("poll.delay_step", &raw)?;
        }

        config.validate()?;
        debug!(
            api_root = %config.api_root,
            principal = %config.principal,
            poll_max_attempts = config.poll.max_attempts,
            "client configuration loaded"
        );
        Ok(config)
    }
}
