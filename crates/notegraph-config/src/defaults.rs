//! Default endpoints and polling policy values.
//!
//! # Design
//! - Centralize defaults so the loader and the models agree.
//! - Keep the poll budget explicit for auditability.

use std::time::Duration;

/// Root of the remote REST API, including the version segment.
pub const API_ROOT: &str = "https://graph.microsoft.com/v1.0";
/// Principal path segment appended to the API root.
pub const PRINCIPAL: &str = "me";
/// Default per-request HTTP timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("notegraph/", env!("CARGO_PKG_VERSION"));
/// Maximum number of operation status checks per transfer.
pub const POLL_MAX_ATTEMPTS: u32 = 30;
/// Lower bound of the randomized delay between status checks.
pub const POLL_MIN_DELAY: Duration = Duration::from_secs(1);
/// Upper bound of the first delay.
pub const POLL_BASE_MAX_DELAY: Duration = Duration::from_secs(2);
/// Growth of the upper delay bound per attempt.
pub const POLL_DELAY_STEP: Duration = Duration::from_secs(1);
