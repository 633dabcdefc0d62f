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

//! Content update and cross-section transfer pipeline for a remote notes API.
//!
//! Layout: `update.rs` composes `guardrail.rs`, `rewrite.rs` and `multipart.rs` into
//! the page PATCH; `transfer.rs` drives copy/move operations; `transport/` holds the
//! authenticated HTTP seam; `client.rs` wires everything behind [`NoteClient`].

pub mod client;
pub mod endpoints;
pub mod error;
pub mod guardrail;
pub mod ids;
pub mod model;
pub mod multipart;
pub mod resources;
pub mod rewrite;
pub mod transfer;
pub mod transport;
pub mod update;

pub use client::NoteClient;
pub use endpoints::Endpoints;
pub use error::{ErrorClass, NoteError, NoteResult};
pub use ids::{EntityKind, extract_location_id, extract_page_item_id, sanitize_id};
pub use model::{
    AsyncOperation, EmbedTag, MoveOutcome, OperationStatus, PageItemData, Position,
    ResourcePart, UpdateAction, UpdateCommand,
};
pub use multipart::MultipartPayload;
pub use resources::{GraphResourceFetcher, ResourceFetcher};
pub use rewrite::{ContentIdSequence, ResourceRewriter, Rewritten};
pub use transfer::{Sleeper, TokioSleeper, TransferEngine};
pub use transport::{ApiRequest, ApiResponse, GraphTransport, StaticToken, TokenSource, Transport};
pub use update::PageUpdater;
