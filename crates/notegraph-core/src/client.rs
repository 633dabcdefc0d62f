//! Single entry point wiring transport, rewriter, updater and transfer engine.

use std::sync::Arc;

use notegraph_config::ClientConfig;
use notegraph_telemetry::Metrics;

use crate::endpoints::Endpoints;
use crate::error::NoteResult;
use crate::model::{AsyncOperation, MoveOutcome, PageItemData, UpdateCommand};
use crate::resources::{GraphResourceFetcher, ResourceFetcher};
use crate::rewrite::ResourceRewriter;
use crate::transfer::{Sleeper, TokioSleeper, TransferEngine};
use crate::transport::{GraphTransport, TokenSource, Transport};
use crate::update::PageUpdater;

/// Content update and transfer operations against the remote notes API.
#[derive(Clone)]
pub struct NoteClient {
    updater: PageUpdater,
    transfers: TransferEngine,
    resources: Arc<dyn ResourceFetcher>,
}

impl NoteClient {
    /// Build a client that talks HTTP with bearer tokens from `tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(
        config: &ClientConfig,
        tokens: Arc<dyn TokenSource>,
        metrics: Metrics,
    ) -> NoteResult<Self> {
        let transport = GraphTransport::new(config, tokens, metrics.clone())?;
        Self::with_transport(config, Arc::new(transport), Arc::new(TokioSleeper), metrics)
    }

    /// Build a client over an arbitrary transport and sleeper.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid.
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
        metrics: Metrics,
    ) -> NoteResult<Self> {
        config.validate()?;
        let endpoints = Endpoints::from_config(config)?;
        let resources: Arc<dyn ResourceFetcher> = Arc::new(GraphResourceFetcher::new(
            Arc::clone(&transport),
            endpoints.clone(),
        ));
        let rewriter = ResourceRewriter::new(
            Arc::clone(&resources),
            endpoints.resource_prefix(),
            metrics.clone(),
        );
        let updater = PageUpdater::new(
            Arc::clone(&transport),
            endpoints.clone(),
            rewriter,
            metrics.clone(),
        );
        let transfers = TransferEngine::new(transport, endpoints, config.poll, sleeper, metrics);
        Ok(Self {
            updater,
            transfers,
            resources,
        })
    }

    /// See [`PageUpdater::update_page`].
    ///
    /// # Errors
    ///
    /// Propagates validation, remote and transport errors.
    pub async fn update_page(&self, page_id: &str, commands: Vec<UpdateCommand>) -> NoteResult<()> {
        self.updater.update_page(page_id, commands).await
    }

    /// See [`PageUpdater::update_page_simple`].
    ///
    /// # Errors
    ///
    /// Propagates validation, remote and transport errors.
    pub async fn update_page_simple(&self, page_id: &str, content: &str) -> NoteResult<()> {
        self.updater.update_page_simple(page_id, content).await
    }

    /// See [`TransferEngine::copy_page`].
    ///
    /// # Errors
    ///
    /// Propagates validation, remote, timeout and transport errors.
    pub async fn copy_page(&self, page_id: &str, section_id: &str) -> NoteResult<String> {
        self.transfers.copy_page(page_id, section_id).await
    }

    /// See [`TransferEngine::move_page`].
    ///
    /// # Errors
    ///
    /// Propagates errors from the copy step only.
    pub async fn move_page(&self, page_id: &str, section_id: &str) -> NoteResult<MoveOutcome> {
        self.transfers.move_page(page_id, section_id).await
    }

    /// See [`TransferEngine::copy_section`].
    ///
    /// # Errors
    ///
    /// Propagates validation, remote, timeout and transport errors.
    pub async fn copy_section(
        &self,
        section_id: &str,
        notebook_id: &str,
        rename_as: Option<&str>,
    ) -> NoteResult<String> {
        self.transfers
            .copy_section(section_id, notebook_id, rename_as)
            .await
    }

    /// See [`TransferEngine::operation_status`].
    ///
    /// # Errors
    ///
    /// Propagates validation, remote and transport errors.
    pub async fn operation_status(&self, operation_id: &str) -> NoteResult<AsyncOperation> {
        self.transfers.operation_status(operation_id).await
    }

    /// See [`TransferEngine::delete_page`].
    ///
    /// # Errors
    ///
    /// Propagates validation, remote and transport errors.
    pub async fn delete_page(&self, page_id: &str) -> NoteResult<()> {
        self.transfers.delete_page(page_id).await
    }

    /// Download an embedded resource of page `page_id`.
    ///
    /// # Errors
    ///
    /// Propagates validation, remote and transport errors.
    pub async fn fetch_resource(&self, page_id: &str, resource_id: &str) -> NoteResult<PageItemData> {
        self.resources.fetch_resource(page_id, resource_id).await
    }
}
