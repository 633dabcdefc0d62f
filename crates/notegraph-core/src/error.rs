//! # Design
//!
//! - One error enum covers validation, remote, timeout and transport failures.
//! - Variants carry operation context fields; callers branch on [`ErrorClass`].
//! - The table guardrail message is written for an automated caller to act on.

use std::error::Error;

use thiserror::Error;

/// Result alias for client operations.
pub type NoteResult<T> = Result<T, NoteError>;

/// Coarse classification of [`NoteError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Local input rejected before any network call.
    Validation,
    /// The remote API answered with an unexpected status or payload.
    Remote,
    /// The operation poll budget ran out.
    Timeout,
    /// The request never produced a response.
    Transport,
    /// No usable bearer token could be obtained.
    Auth,
}

/// Errors raised by the update and transfer pipelines.
#[derive(Debug, Error)]
pub enum NoteError {
    /// An opaque identifier failed sanitization.
    #[error("invalid {label}: {reason}")]
    InvalidIdentifier {
        /// Which identifier was rejected (`page ID`, `section ID`, ...).
        label: &'static str,
        /// Raw value supplied by the caller.
        value: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// An update was requested without any commands.
    #[error("at least one update command is required")]
    EmptyCommands,
    /// A single command is malformed.
    #[error("update command {index} is invalid: {reason}")]
    InvalidCommand {
        /// Zero-based position of the command in the list.
        index: usize,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// One or more commands address individual table cells or rows.
    #[error(
        "table sub-elements cannot be updated individually (offending targets: {}). \
         Replace the whole table instead: target the enclosing `table:` element with \
         action `replace` and send the complete updated <table> HTML.",
        .targets.join(", ")
    )]
    TableTargets {
        /// Every offending target, in command order.
        targets: Vec<String>,
    },
    /// The client configuration is inconsistent.
    #[error("invalid client configuration")]
    Config {
        /// Underlying configuration error.
        #[from]
        source: notegraph_config::ConfigError,
    },
    /// A built-in extraction pattern failed to compile.
    #[error("failed to compile pattern {pattern}")]
    Pattern {
        /// Regex pattern.
        pattern: &'static str,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// Serializing a request payload failed.
    #[error("failed to serialize {operation} payload")]
    Serialize {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// A request URL could not be built.
    #[error("failed to build URL for {operation}")]
    Url {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The HTTP request could not be completed.
    #[error("{operation} request failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The token source could not supply or refresh a bearer token.
    #[error("authentication failed during {operation}")]
    Auth {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying token source error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The remote API answered with a status the operation does not accept.
    #[error("{operation} failed with status {status}: {body}")]
    Remote {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },
    /// A success response did not carry the expected fields.
    #[error("{operation} returned a malformed response: {detail}")]
    MalformedResponse {
        /// Operation identifier.
        operation: &'static str,
        /// Static description of the missing or invalid field.
        detail: &'static str,
    },
    /// The remote long-running operation reported failure.
    #[error("remote operation {operation_id} failed")]
    OperationFailed {
        /// Remote operation identifier.
        operation_id: String,
        /// Error message reported by the service, when present.
        detail: Option<String>,
    },
    /// The operation did not reach a terminal state within the poll budget.
    #[error("remote operation {operation_id} did not finish after {attempts} status checks")]
    PollTimeout {
        /// Remote operation identifier.
        operation_id: String,
        /// Status checks performed.
        attempts: u32,
        /// How many of those checks were answered with 503.
        unavailable: u32,
    },
}

impl NoteError {
    /// Classify the error along the validation/remote/timeout/transport axes.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidIdentifier { .. }
            | Self::EmptyCommands
            | Self::InvalidCommand { .. }
            | Self::TableTargets { .. }
            | Self::Config { .. }
            | Self::Pattern { .. }
            | Self::Serialize { .. }
            | Self::Url { .. } => ErrorClass::Validation,
            Self::Remote { .. } | Self::MalformedResponse { .. } | Self::OperationFailed { .. } => {
                ErrorClass::Remote
            }
            Self::PollTimeout { .. } => ErrorClass::Timeout,
            Self::Transport { .. } => ErrorClass::Transport,
            Self::Auth { .. } => ErrorClass::Auth,
        }
    }

    pub(crate) fn remote(operation: &'static str, status: u16, body: &[u8]) -> Self {
        Self::Remote {
            operation,
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    pub(crate) fn auth(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Auth {
            operation,
            source: source.into(),
        }
    }
}
