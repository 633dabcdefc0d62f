//! Typed configuration models.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Connection and workflow settings for the remote notes API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root including the version segment, e.g. `https://graph.microsoft.com/v1.0`.
    pub api_root: Url,
    /// Principal path segment (`me`, `users/{id}`, `groups/{id}`).
    pub principal: String,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// User agent sent on every request.
    pub user_agent: String,
    /// Polling policy for long-running copy operations.
    pub poll: PollPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_root: default_api_root(),
            principal: defaults::PRINCIPAL.to_string(),
            http_timeout: defaults::HTTP_TIMEOUT,
            user_agent: defaults::USER_AGENT.to_string(),
            poll: PollPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Build a configuration for the given API root with default policy values.
    #[must_use]
    pub fn with_api_root(api_root: Url) -> Self {
        Self {
            api_root,
            ..Self::default()
        }
    }

    /// Base URL every endpoint is resolved against: `{api_root}/{principal}/`.
    ///
    /// # Errors
    ///
    /// Returns an error when the principal cannot be joined onto the API root.
    pub fn principal_base(&self) -> ConfigResult<Url> {
        let root = self.resource_prefix();
        let principal = self.principal.trim_matches('/');
        Url::parse(&format!("{root}{principal}/"))
            .map_err(|_| ConfigError::invalid("principal", &self.principal, "not a valid path segment"))
    }

    /// API root rendered with a trailing slash. Embedded resource URLs in page HTML
    /// start with this prefix.
    #[must_use]
    pub fn resource_prefix(&self) -> String {
        let root = self.api_root.as_str();
        if root.ends_with('/') {
            root.to_string()
        } else {
            format!("{root}/")
        }
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns an error when the principal is blank, the timeout is zero, or the poll
    /// policy is inconsistent.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.principal.trim_matches('/').trim().is_empty() {
            return Err(ConfigError::invalid(
                "principal",
                &self.principal,
                "must not be empty",
            ));
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "http_timeout",
                "0",
                "must be greater than zero",
            ));
        }
        self.poll.validate()
    }
}

/// Retry and jitter parameters for operation polling.
///
/// Attempt `n` (zero-based) is followed by a random pause in
/// `[min_delay, base_max_delay + n * delay_step]`, except after the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Maximum number of status checks before giving up.
    pub max_attempts: u32,
    /// Lower bound of every pause.
    pub min_delay: Duration,
    /// Upper bound of the first pause.
    pub base_max_delay: Duration,
    /// Amount the upper bound grows with every attempt.
    pub delay_step: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::POLL_MAX_ATTEMPTS,
            min_delay: defaults::POLL_MIN_DELAY,
            base_max_delay: defaults::POLL_BASE_MAX_DELAY,
            delay_step: defaults::POLL_DELAY_STEP,
        }
    }
}

impl PollPolicy {
    /// Policy that polls without pausing; intended for tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_delay: Duration::ZERO,
            base_max_delay: Duration::ZERO,
            delay_step: Duration::ZERO,
        }
    }

    /// Inclusive pause bounds following the zero-based `attempt`.
    #[must_use]
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let upper = self
            .base_max_delay
            .saturating_add(self.delay_step.saturating_mul(attempt));
        if upper < self.min_delay {
            (self.min_delay, self.min_delay)
        } else {
            (self.min_delay, upper)
        }
    }

    /// Check policy invariants.
    ///
    /// # Errors
    ///
    /// Returns an error when no attempts are allowed or the delay bounds are inverted.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "poll.max_attempts",
                "0",
                "must allow at least one attempt",
            ));
        }
        if self.min_delay > self.base_max_delay {
            return Err(ConfigError::invalid(
                "poll.min_delay",
                format!("{}ms", self.min_delay.as_millis()),
                "must not exceed poll.base_max_delay",
            ));
        }
        Ok(())
    }
}

fn default_api_root() -> Url {
    Url::parse(defaults::API_ROOT).expect("default API root is a valid URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_api_root_is_the_documented_constant() {
        assert!(Url::parse(defaults::API_ROOT).is_ok());
        assert_eq!(
            ClientConfig::default().api_root.as_str().trim_end_matches('/'),
            defaults::API_ROOT
        );
    }

    #[test]
    fn defaults_match_documented_policy() {
        let config = ClientConfig::default();
        assert_eq!(config.poll.max_attempts, 30);
        assert_eq!(config.poll.min_delay, Duration::from_secs(1));
        assert_eq!(config.poll.base_max_delay, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn delay_bounds_widen_by_one_second_per_attempt() {
        let policy = PollPolicy::default();
        assert_eq!(
            policy.delay_bounds(0),
            (Duration::from_secs(1), Duration::from_secs(2))
        );
        assert_eq!(
            policy.delay_bounds(5),
            (Duration::from_secs(1), Duration::from_secs(7))
        );
    }

    #[test]
    fn immediate_policy_never_pauses() {
        let policy = PollPolicy::immediate(3);
        assert_eq!(policy.delay_bounds(0), (Duration::ZERO, Duration::ZERO));
        assert_eq!(policy.delay_bounds(29), (Duration::ZERO, Duration::ZERO));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn principal_base_joins_root_and_principal() -> ConfigResult<()> {
        let config = ClientConfig::default();
        assert_eq!(
            config.principal_base()?.as_str(),
            "https://graph.microsoft.com/v1.0/me/"
        );
        assert_eq!(config.resource_prefix(), "https://graph.microsoft.com/v1.0/");
        Ok(())
    }

    #[test]
    fn validate_rejects_zero_attempts_and_inverted_delays() {
        let mut config = ClientConfig::default();
        config.poll.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "poll.max_attempts",
                ..
            })
        ));

        let mut config = ClientConfig::default();
        config.poll.min_delay = Duration::from_secs(10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "poll.min_delay",
                ..
            })
        ));
    }

    #[test]
    fn config_round_trips_through_json() -> Result<(), serde_json::Error> {
        let config = ClientConfig::default();
        let value = serde_json::to_value(&config)?;
        assert_eq!(value["principal"], "me");
        let parsed: ClientConfig = serde_json::from_value(value)?;
        assert_eq!(parsed, config);
        Ok(())
    }
}
