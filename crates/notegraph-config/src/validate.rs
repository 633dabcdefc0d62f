//! Parsing helpers for raw configuration values.

use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Parse an absolute `http`/`https` URL.
pub(crate) fn parse_url(field: &'static str, raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| ConfigError::invalid(field, raw, "not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(field, raw, "scheme must be http or https"));
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::invalid(field, raw, "must be an absolute base URL"));
    }
    Ok(url)
}

/// Parse a strictly positive integer count.
pub(crate) fn parse_count(field: &'static str, raw: &str) -> ConfigResult<u32> {
    let value = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(field, raw, "must be a non-negative integer"))?;
    if value == 0 {
        return Err(ConfigError::invalid(field, raw, "must be greater than zero"));
    }
    Ok(value)
}

/// Parse a duration expressed in whole or fractional seconds.
pub(crate) fn parse_seconds(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    let secs = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::invalid(field, raw, "must be a number of seconds"))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::invalid(field, raw, "must be a finite, non-negative duration"))
}

/// Normalize a principal path segment such as `me` or `users/{id}`.
pub(crate) fn parse_principal(field: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(field, raw, "must not be empty"));
    }
    if trimmed.chars().any(|ch| ch.is_whitespace() || ch == '?' || ch == '#') {
        return Err(ConfigError::invalid(field, raw, "must be a plain path segment"));
    }
    Ok(trimmed.to_string())
}
