//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes counters for the page update and transfer pipelines only.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Status labels recorded by [`Metrics::inc_operation_poll`].
pub const POLL_STATUS_LABELS: &[&str] = &[
    "not_started",
    "running",
    "unavailable",
    "completed",
    "failed",
    "unknown",
];

/// Prometheus-backed metrics registry shared by every client handle.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    page_updates_total: IntCounterVec,
    resource_rewrites_total: IntCounterVec,
    guardrail_violations_total: IntCounter,
    operation_polls_total: IntCounterVec,
    transfers_total: IntCounterVec,
    token_refreshes_total: IntCounter,
}

/// Snapshot of selected counters for health reporting and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Page updates that reached the remote API and succeeded.
    pub page_updates_succeeded: u64,
    /// Page updates rejected by the remote API or lost in transit.
    pub page_updates_failed: u64,
    /// Embedded resources rewritten into multipart parts.
    pub resources_rewritten: u64,
    /// Embedded resources left untouched after a failed extraction or download.
    pub resources_skipped: u64,
    /// Command lists rejected by the table guardrail.
    pub guardrail_violations_total: u64,
    /// Operation status checks across every transfer.
    pub operation_polls_total: u64,
    /// Token refreshes triggered by the transport.
    pub token_refreshes_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "notegraph_http_requests_total",
                "Requests sent to the remote notes API",
            ),
            &["method", "code"],
        )?;
        let page_updates_total = IntCounterVec::new(
            Opts::new("notegraph_page_updates_total", "Page content updates by outcome"),
            &["outcome"],
        )?;
        let resource_rewrites_total = IntCounterVec::new(
            Opts::new(
                "notegraph_resource_rewrites_total",
                "Embedded resource references processed by outcome",
            ),
            &["outcome"],
        )?;
        let guardrail_violations_total = IntCounter::with_opts(Opts::new(
            "notegraph_guardrail_violations_total",
            "Update command lists rejected for targeting table sub-elements",
        ))?;
        let operation_polls_total = IntCounterVec::new(
            Opts::new(
                "notegraph_operation_polls_total",
                "Operation status checks by observed status",
            ),
            &["status"],
        )?;
        let transfers_total = IntCounterVec::new(
            Opts::new("notegraph_transfers_total", "Copy and move workflows by outcome"),
            &["kind", "outcome"],
        )?;
        let token_refreshes_total = IntCounter::with_opts(Opts::new(
            "notegraph_token_refreshes_total",
            "Bearer token refreshes performed by the transport",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(page_updates_total.clone()))?;
        registry.register(Box::new(resource_rewrites_total.clone()))?;
        registry.register(Box::new(guardrail_violations_total.clone()))?;
        registry.register(Box::new(operation_polls_total.clone()))?;
        registry.register(Box::new(transfers_total.clone()))?;
        registry.register(Box::new(token_refreshes_total.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                page_updates_total,
                resource_rewrites_total,
                guardrail_violations_total,
                operation_polls_total,
                transfers_total,
                token_refreshes_total,
            }),
        })
    }

    /// Count a completed HTTP exchange.
    pub fn inc_http_request(&self, method: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
    }

    /// Count a page update outcome (`succeeded`, `failed`).
    pub fn inc_page_update(&self, outcome: &str) {
        self.inner
            .page_updates_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count an embedded resource outcome (`rewritten`, `skipped`).
    pub fn inc_resource_rewrite(&self, outcome: &str) {
        self.inner
            .resource_rewrites_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the table guardrail violation counter.
    pub fn inc_guardrail_violation(&self) {
        self.inner.guardrail_violations_total.inc();
    }

    /// Count one operation status check.
    pub fn inc_operation_poll(&self, status: &str) {
        self.inner
            .operation_polls_total
            .with_label_values(&[status])
            .inc();
    }

    /// Count a finished transfer workflow.
    pub fn inc_transfer(&self, kind: &str, outcome: &str) {
        self.inner
            .transfers_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Increment the token refresh counter.
    pub fn inc_token_refresh(&self) {
        self.inner.token_refreshes_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the pipeline counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        let labelled = |vec: &IntCounterVec, label: &str| vec.with_label_values(&[label]).get();
        MetricsSnapshot {
            page_updates_succeeded: labelled(&inner.page_updates_total, "succeeded"),
            page_updates_failed: labelled(&inner.page_updates_total, "failed"),
            resources_rewritten: labelled(&inner.resource_rewrites_total, "rewritten"),
            resources_skipped: labelled(&inner.resource_rewrites_total, "skipped"),
            guardrail_violations_total: inner.guardrail_violations_total.get(),
            operation_polls_total: POLL_STATUS_LABELS
                .iter()
                .map(|label| labelled(&inner.operation_polls_total, *label))
                .sum(),
            token_refreshes_total: inner.token_refreshes_total.get(),
        }
    }
}
