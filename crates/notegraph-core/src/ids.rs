//! Opaque identifier validation and extraction from service URLs.
//!
//! Identifiers assigned by the remote service are restricted to ASCII alphanumerics,
//! `-` and `!`. Anything else is rejected before it reaches a URL.

use regex::Regex;

use crate::error::{NoteError, NoteResult};

/// Longest identifier accepted by [`sanitize_id`].
pub const MAX_ID_LEN: usize = 100;

const RESOURCE_VALUE_PATTERN: &str = r"/resources/([A-Za-z0-9!-]+)/\$value(?:[?#].*)?$";
const PAGE_LOCATION_PATTERN: &str = r"/onenote/pages/([A-Za-z0-9!-]+)";
const SECTION_LOCATION_PATTERN: &str = r"/onenote/sections/([A-Za-z0-9!-]+)";

fn compile(pattern: &'static str) -> NoteResult<Regex> {
    Regex::new(pattern).map_err(|source| NoteError::Pattern { pattern, source })
}

fn first_capture<'h>(pattern: &'static str, haystack: &'h str) -> NoteResult<Option<&'h str>> {
    let regex = compile(pattern)?;
    Ok(regex
        .captures(haystack)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str()))
}

/// Validate and clean an opaque identifier.
///
/// Surrounding whitespace is trimmed; the remainder must be non-empty, at most
/// [`MAX_ID_LEN`] characters, and drawn from `[A-Za-z0-9!-]`.
///
/// # Errors
///
/// Returns [`NoteError::InvalidIdentifier`] naming `label` when the value is rejected.
pub fn sanitize_id(raw: &str, label: &'static str) -> NoteResult<String> {
    let trimmed = raw.trim();
    let reject = |reason| NoteError::InvalidIdentifier {
        label,
        value: raw.to_string(),
        reason,
    };

    if trimmed.is_empty() {
        return Err(reject("must not be empty"));
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(reject("exceeds 100 characters"));
    }
    if !trimmed.chars().all(is_id_char) {
        return Err(reject(
            "may only contain letters, digits, hyphens and exclamation marks",
        ));
    }
    Ok(trimmed.to_string())
}

const fn is_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '!'
}

/// Extract the resource identifier from a URL ending in `/resources/{id}/$value`.
///
/// A query string or fragment after `$value` is allowed; further path segments are not.
///
/// # Errors
///
/// Returns [`NoteError::Pattern`] if the extraction pattern fails to compile.
pub fn extract_page_item_id(url: &str) -> NoteResult<Option<&str>> {
    first_capture(RESOURCE_VALUE_PATTERN, url)
}

/// Entity collections whose identifiers appear in operation `resourceLocation` URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// `/onenote/pages/{id}`
    Page,
    /// `/onenote/sections/{id}`
    Section,
}

impl EntityKind {
    /// Label used in identifier validation errors.
    #[must_use]
    pub const fn id_label(self) -> &'static str {
        match self {
            Self::Page => "page ID",
            Self::Section => "section ID",
        }
    }

    const fn location_pattern(self) -> &'static str {
        match self {
            Self::Page => PAGE_LOCATION_PATTERN,
            Self::Section => SECTION_LOCATION_PATTERN,
        }
    }
}

/// Extract a new entity identifier from an operation's `resourceLocation` URL.
///
/// # Errors
///
/// Returns [`NoteError::Pattern`] if the extraction pattern fails to compile.
pub fn extract_location_id(location: &str, kind: EntityKind) -> NoteResult<Option<&str>> {
    first_capture(kind.location_pattern(), location)
}
