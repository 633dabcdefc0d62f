#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Typed configuration for the notegraph client layer.
//!
//! Layout: `model.rs` (client and poll policy models), `validate.rs` (parsing helpers),
//! `loader.rs` (environment loading), `defaults.rs` (baseline values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{ClientConfig, PollPolicy};
