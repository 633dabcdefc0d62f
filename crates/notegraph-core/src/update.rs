//! Page content updates: guardrail, resource rewrite, multipart assembly, PATCH.

use std::borrow::Cow;
use std::sync::Arc;

use notegraph_telemetry::Metrics;
use reqwest::Method;
use tracing::{info, instrument, warn};

use crate::endpoints::Endpoints;
use crate::error::{NoteError, NoteResult};
use crate::guardrail::check_table_targets;
use crate::ids::sanitize_id;
use crate::model::UpdateCommand;
use crate::multipart::assemble;
use crate::rewrite::{ContentIdSequence, ResourceRewriter};
use crate::transport::{ApiRequest, Transport};

/// Applies update command lists to pages.
#[derive(Clone)]
pub struct PageUpdater {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    rewriter: ResourceRewriter,
    metrics: Metrics,
}

impl PageUpdater {
    /// Compose an updater from its collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        rewriter: ResourceRewriter,
        metrics: Metrics,
    ) -> Self {
        Self {
            transport,
            endpoints,
            rewriter,
            metrics,
        }
    }

    /// Apply `commands` to page `page_id` in one multipart PATCH.
    ///
    /// Validation (identifier, empty list, table guardrail, command shape) completes
    /// before any network traffic. Embedded resources that cannot be downloaded stay
    /// as written.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or [`NoteError::Remote`] when the
    /// PATCH is answered with a non-2xx status.
    #[instrument(name = "update_page", skip(self, commands), fields(commands = commands.len()))]
    pub async fn update_page(&self, page_id: &str, commands: Vec<UpdateCommand>) -> NoteResult<()> {
        let page_id = sanitize_id(page_id, "page ID")?;
        if commands.is_empty() {
            return Err(NoteError::EmptyCommands);
        }
        if let Err(err) = check_table_targets(&commands) {
            self.metrics.inc_guardrail_violation();
            warn!(page_id = %page_id, "rejected table substructure update");
            return Err(err);
        }
        for (index, command) in commands.iter().enumerate() {
            command.validate(index)?;
        }

        let mut ids = ContentIdSequence::new();
        let mut parts = Vec::new();
        let mut rewritten = Vec::with_capacity(commands.len());
        for mut command in commands {
            let replacement = match command.content.as_deref() {
                Some(content) if !content.is_empty() => {
                    let output = self.rewriter.rewrite(content, &page_id, &mut ids).await;
                    parts.extend(output.parts);
                    match output.html {
                        Cow::Owned(html) => Some(html),
                        Cow::Borrowed(_) => None,
                    }
                }
                _ => None,
            };
            if replacement.is_some() {
                command.content = replacement;
            }
            rewritten.push(command);
        }

        let payload = assemble(&rewritten, &parts)?;
        let url = self.endpoints.page_content(&page_id)?;
        let request = ApiRequest::new("update page", Method::PATCH, url)
            .with_body(payload.content_type, payload.body);
        let result = self
            .transport
            .send(request)
            .await
            .and_then(|response| response.require_success("update page"));

        match result {
            Ok(_) => {
                self.metrics.inc_page_update("succeeded");
                info!(page_id = %page_id, resources = parts.len(), "page updated");
                Ok(())
            }
            Err(err) => {
                self.metrics.inc_page_update("failed");
                warn!(page_id = %page_id, error = %err, "page update failed");
                Err(err)
            }
        }
    }

    /// Replace the whole body of page `page_id` with `content`.
    ///
    /// # Errors
    ///
    /// Same as [`PageUpdater::update_page`].
    pub async fn update_page_simple(&self, page_id: &str, content: &str) -> NoteResult<()> {
        self.update_page(page_id, vec![UpdateCommand::replace_body(content)])
            .await
    }
}
