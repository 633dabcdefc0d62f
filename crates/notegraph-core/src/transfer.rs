//! # Design
//!
//! - Copies are submitted, polled and resolved: `202` is the only accepted submit
//!   status, and the new identifier is read from the operation's `resourceLocation`.
//! - A 503 from the status endpoint is reported as a synthetic `Running` status and
//!   consumes one attempt from the same budget as real progress.
//! - Pauses between attempts go through [`Sleeper`] so callers and tests control time.
//! - Moves never compensate: a failed source delete is surfaced in [`MoveOutcome`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notegraph_config::PollPolicy;
use notegraph_telemetry::Metrics;
use rand::Rng;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::endpoints::Endpoints;
use crate::error::{NoteError, NoteResult};
use crate::ids::{EntityKind, extract_location_id, sanitize_id};
use crate::model::{AsyncOperation, MoveOutcome, OperationStatus};
use crate::transport::{ApiRequest, Transport};

const STATUS_ACCEPTED: u16 = 202;
const STATUS_UNAVAILABLE: u16 = 503;

/// Suspends the poll loop between status checks.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Random pause following zero-based `attempt`, drawn from the policy bounds.
#[must_use]
pub fn jitter(policy: &PollPolicy, attempt: u32) -> Duration {
    let (low, high) = policy.delay_bounds(attempt);
    if high <= low {
        return low;
    }
    rand::rng().random_range(low..=high)
}

#[derive(Serialize)]
struct CopyToSection<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct CopyToNotebook<'a> {
    id: &'a str,
    #[serde(rename = "renameAs", skip_serializing_if = "Option::is_none")]
    rename_as: Option<&'a str>,
}

#[derive(Deserialize)]
struct SubmitBody {
    status: Option<String>,
    id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationBody {
    status: Option<String>,
    resource_location: Option<String>,
    error: Option<OperationErrorBody>,
}

#[derive(Deserialize)]
struct OperationErrorBody {
    message: Option<String>,
}

/// Copy, move and delete workflows over long-running remote operations.
#[derive(Clone)]
pub struct TransferEngine {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
    metrics: Metrics,
}

impl TransferEngine {
    /// Compose an engine from its collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        policy: PollPolicy,
        sleeper: Arc<dyn Sleeper>,
        metrics: Metrics,
    ) -> Self {
        Self {
            transport,
            endpoints,
            policy,
            sleeper,
            metrics,
        }
    }

    /// Copy page `page_id` into section `section_id` and return the new page ID.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad identifiers, a remote error for a rejected
    /// submission or failed operation, or [`NoteError::PollTimeout`].
    #[instrument(name = "copy_page", skip(self))]
    pub async fn copy_page(&self, page_id: &str, section_id: &str) -> NoteResult<String> {
        let result = self.copy_page_inner(page_id, section_id).await;
        self.record("copy_page", result.is_ok());
        result
    }

    async fn copy_page_inner(&self, page_id: &str, section_id: &str) -> NoteResult<String> {
        let page_id = sanitize_id(page_id, "page ID")?;
        let section_id = sanitize_id(section_id, "section ID")?;
        let request = ApiRequest::new(
            "copy page",
            Method::POST,
            self.endpoints.page_copy(&page_id)?,
        )
        .with_json(&CopyToSection { id: &section_id })?;
        let operation_id = self.submit(request).await?;
        let new_id = self.await_location(&operation_id, EntityKind::Page).await?;
        info!(
            source = %page_id,
            section = %section_id,
            page = %new_id,
            "page copied"
        );
        Ok(new_id)
    }

    /// Copy section `section_id` into notebook `notebook_id`, optionally renaming it,
    /// and return the new section ID.
    ///
    /// # Errors
    ///
    /// Same as [`TransferEngine::copy_page`].
    #[instrument(name = "copy_section", skip(self))]
    pub async fn copy_section(
        &self,
        section_id: &str,
        notebook_id: &str,
        rename_as: Option<&str>,
    ) -> NoteResult<String> {
        let result = self
            .copy_section_inner(section_id, notebook_id, rename_as)
            .await;
        self.record("copy_section", result.is_ok());
        result
    }

    async fn copy_section_inner(
        &self,
        section_id: &str,
        notebook_id: &str,
        rename_as: Option<&str>,
    ) -> NoteResult<String> {
        let section_id = sanitize_id(section_id, "section ID")?;
        let notebook_id = sanitize_id(notebook_id, "notebook ID")?;
        let rename_as = rename_as.map(str::trim).filter(|name| !name.is_empty());
        let request = ApiRequest::new(
            "copy section",
            Method::POST,
            self.endpoints.section_copy(&section_id)?,
        )
        .with_json(&CopyToNotebook {
            id: &notebook_id,
            rename_as,
        })?;
        let operation_id = self.submit(request).await?;
        let new_id = self
            .await_location(&operation_id, EntityKind::Section)
            .await?;
        info!(
            source = %section_id,
            notebook = %notebook_id,
            section = %new_id,
            "section copied"
        );
        Ok(new_id)
    }

    /// Copy page `page_id` into section `section_id`, then delete the source.
    ///
    /// A failed delete does not fail the move; it is reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns any error from the copy step.
    #[instrument(name = "move_page", skip(self))]
    pub async fn move_page(&self, page_id: &str, section_id: &str) -> NoteResult<MoveOutcome> {
        let new_id = match self.copy_page_inner(page_id, section_id).await {
            Ok(new_id) => new_id,
            Err(err) => {
                self.record("move_page", false);
                return Err(err);
            }
        };

        match self.delete_page(page_id).await {
            Ok(()) => {
                self.metrics.inc_transfer("move_page", "succeeded");
                Ok(MoveOutcome {
                    page_id: new_id,
                    source_deleted: true,
                    warning: None,
                })
            }
            Err(err) => {
                warn!(
                    source = %page_id.trim(),
                    page = %new_id,
                    error = %err,
                    "page copied but source page could not be deleted"
                );
                self.metrics.inc_transfer("move_page", "partial");
                Ok(MoveOutcome {
                    warning: Some(format!(
                        "page was copied as {new_id} but the source page {} could not be deleted: {err}",
                        page_id.trim()
                    )),
                    page_id: new_id,
                    source_deleted: false,
                })
            }
        }
    }

    /// Delete page `page_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad identifier or [`NoteError::Remote`] for a
    /// non-2xx response.
    pub async fn delete_page(&self, page_id: &str) -> NoteResult<()> {
        let page_id = sanitize_id(page_id, "page ID")?;
        let request = ApiRequest::new("delete page", Method::DELETE, self.endpoints.page(&page_id)?);
        self.transport
            .send(request)
            .await?
            .require_success("delete page")?;
        debug!(page = %page_id, "page deleted");
        Ok(())
    }

    /// Fetch the current state of a long-running operation.
    ///
    /// A 503 is reported as a synthetic `Running` status carrying a note.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Remote`] for any other non-2xx response, or
    /// [`NoteError::MalformedResponse`] when the body has no status.
    pub async fn operation_status(&self, operation_id: &str) -> NoteResult<AsyncOperation> {
        let operation_id = sanitize_id(operation_id, "operation ID")?;
        let request = ApiRequest::new(
            "operation status",
            Method::GET,
            self.endpoints.operation(&operation_id)?,
        );
        let response = self.transport.send(request).await?;
        if response.status == STATUS_UNAVAILABLE {
            debug!(operation = %operation_id, "status endpoint unavailable; treating as running");
            return Ok(AsyncOperation::unavailable(&operation_id));
        }
        let body: OperationBody = response
            .require_success("operation status")?
            .json("operation status")?;
        let status = body
            .status
            .as_deref()
            .map(OperationStatus::parse)
            .ok_or(NoteError::MalformedResponse {
                operation: "operation status",
                detail: "missing status",
            })?;
        Ok(AsyncOperation {
            operation_id,
            status,
            resource_location: body.resource_location,
            error_message: body.error.and_then(|error| error.message),
            note: None,
        })
    }

    async fn submit(&self, request: ApiRequest) -> NoteResult<String> {
        let operation = request.operation;
        let response = self.transport.send(request).await?;
        if response.status != STATUS_ACCEPTED {
            return Err(NoteError::remote(operation, response.status, &response.body));
        }
        let body: SubmitBody = response.json(operation)?;
        let status = body
            .status
            .filter(|status| !status.trim().is_empty())
            .ok_or(NoteError::MalformedResponse {
                operation,
                detail: "missing operation status",
            })?;
        let id = body
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(NoteError::MalformedResponse {
                operation,
                detail: "missing operation id",
            })?;
        debug!(operation, operation_id = %id, status = %status, "operation submitted");
        Ok(id)
    }

    async fn await_location(&self, operation_id: &str, kind: EntityKind) -> NoteResult<String> {
        let attempts = self.policy.max_attempts;
        let mut unavailable = 0_u32;
        for attempt in 0..attempts {
            let operation = self.operation_status(operation_id).await?;
            let synthetic = operation.note.is_some();
            if synthetic {
                unavailable += 1;
            }
            self.metrics.inc_operation_poll(if synthetic {
                "unavailable"
            } else {
                operation.status.label()
            });
            debug!(
                operation_id,
                attempt = attempt + 1,
                status = %operation.status,
                "polled operation"
            );

            match operation.status {
                OperationStatus::Completed => return resolve_location(&operation, kind),
                OperationStatus::Failed => {
                    return Err(NoteError::OperationFailed {
                        operation_id: operation.operation_id,
                        detail: operation.error_message,
                    });
                }
                OperationStatus::NotStarted
                | OperationStatus::Running
                | OperationStatus::Unknown(_) => {}
            }

            if attempt + 1 < attempts {
                self.sleeper.sleep(jitter(&self.policy, attempt)).await;
            }
        }

        warn!(operation_id, attempts, unavailable, "operation poll budget exhausted");
        Err(NoteError::PollTimeout {
            operation_id: operation_id.to_string(),
            attempts,
            unavailable,
        })
    }

    fn record(&self, kind: &str, succeeded: bool) {
        self.metrics
            .inc_transfer(kind, if succeeded { "succeeded" } else { "failed" });
    }
}

fn resolve_location(operation: &AsyncOperation, kind: EntityKind) -> NoteResult<String> {
    let malformed = NoteError::MalformedResponse {
        operation: "operation status",
        detail: "completed operation has no usable resourceLocation",
    };
    let Some(location) = operation.resource_location.as_deref() else {
        return Err(malformed);
    };
    let Some(id) = extract_location_id(location, kind)? else {
        return Err(malformed);
    };
    sanitize_id(id, kind.id_label())
}
