//! # Design
//!
//! - Pure transform over the HTML text: a scan pass records embedded references by
//!   element ordinal, downloads happen between passes, and a render pass rewrites only
//!   the chosen ordinals.
//! - Elements that cannot be resolved or fetched are left as written.
//! - HTML without rewritten references is returned borrowed and byte-identical.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use lol_html::html_content::Element;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use notegraph_telemetry::Metrics;
use tracing::{debug, warn};

use crate::ids::extract_page_item_id;
use crate::model::{EmbedTag, ResourcePart};
use crate::resources::ResourceFetcher;

/// Hands out `part1`, `part2`, ... for one update call.
#[derive(Debug, Default)]
pub struct ContentIdSequence {
    issued: usize,
}

impl ContentIdSequence {
    /// Start a fresh sequence at `part1`.
    #[must_use]
    pub const fn new() -> Self {
        Self { issued: 0 }
    }

    /// Issue the next identifier.
    pub fn next_id(&mut self) -> String {
        self.issued += 1;
        format!("part{}", self.issued)
    }

    /// Number of identifiers issued so far.
    #[must_use]
    pub const fn issued(&self) -> usize {
        self.issued
    }
}

/// HTML plus the resource parts its placeholders refer to.
#[derive(Debug)]
pub struct Rewritten<'h> {
    /// Possibly rewritten HTML.
    pub html: Cow<'h, str>,
    /// Parts referenced by `name:` placeholders in `html`, in document order.
    pub parts: Vec<ResourcePart>,
}

#[derive(Debug)]
struct EmbeddedReference {
    ordinal: usize,
    tag: EmbedTag,
    url: String,
}

/// Replaces embedded resource URLs with multipart placeholders.
#[derive(Clone)]
pub struct ResourceRewriter {
    fetcher: Arc<dyn ResourceFetcher>,
    resource_prefix: String,
    metrics: Metrics,
}

impl ResourceRewriter {
    /// Rewrite references that start with `resource_prefix`.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        resource_prefix: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self {
            fetcher,
            resource_prefix: resource_prefix.into(),
            metrics,
        }
    }

    /// Rewrite every resolvable `<img src>` and `<object data>` in `html`.
    ///
    /// Each rewritten element loses its other attributes and points at `name:{id}`,
    /// where `id` comes from `ids`.
    pub async fn rewrite<'h>(
        &self,
        html: &'h str,
        page_id: &str,
        ids: &mut ContentIdSequence,
    ) -> Rewritten<'h> {
        let references = match scan_references(html) {
            Ok(references) => references,
            Err(err) => {
                warn!(page_id, error = %err, "could not scan HTML for embedded resources");
                return unchanged(html);
            }
        };

        let mut placeholders = HashMap::new();
        let mut parts = Vec::new();
        for reference in references {
            if !reference.url.starts_with(&self.resource_prefix) {
                continue;
            }
            let resource_id = match extract_page_item_id(&reference.url) {
                Ok(Some(resource_id)) => resource_id,
                Ok(None) => {
                    warn!(page_id, url = %reference.url, "embedded resource URL has no identifier");
                    self.metrics.inc_resource_rewrite("skipped");
                    continue;
                }
                Err(err) => {
                    warn!(page_id, error = %err, "could not read embedded resource identifiers");
                    return unchanged(html);
                }
            };
            match self.fetcher.fetch_resource(page_id, resource_id).await {
                Ok(item) => {
                    let content_id = ids.next_id();
                    placeholders.insert(reference.ordinal, (reference.tag, content_id.clone()));
                    parts.push(item.into_part(content_id));
                }
                Err(err) => {
                    warn!(
                        page_id,
                        resource_id,
                        error = %err,
                        "leaving embedded resource in place after failed download"
                    );
                    self.metrics.inc_resource_rewrite("skipped");
                }
            }
        }

        if placeholders.is_empty() {
            return unchanged(html);
        }

        match render_placeholders(html, &placeholders) {
            Ok(rendered) => {
                for _ in &parts {
                    self.metrics.inc_resource_rewrite("rewritten");
                }
                debug!(page_id, rewritten = parts.len(), "embedded resources rewritten");
                Rewritten {
                    html: Cow::Owned(rendered),
                    parts,
                }
            }
            Err(err) => {
                warn!(page_id, error = %err, "could not render rewritten HTML");
                unchanged(html)
            }
        }
    }
}

const fn unchanged(html: &str) -> Rewritten<'_> {
    Rewritten {
        html: Cow::Borrowed(html),
        parts: Vec::new(),
    }
}

fn embed_tag(el: &Element<'_, '_>) -> Option<EmbedTag> {
    EmbedTag::from_tag_name(&el.tag_name())
}

fn scan_references(html: &str) -> Result<Vec<EmbeddedReference>, lol_html::errors::RewritingError> {
    let mut references = Vec::new();
    let mut ordinal = 0_usize;
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                let Some(tag) = embed_tag(el) else {
                    return Ok(());
                };
                if let Some(url) = el.get_attribute(tag.url_attribute()) {
                    references.push(EmbeddedReference {
                        ordinal,
                        tag,
                        url: url.trim().to_string(),
                    });
                }
                ordinal += 1;
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )?;
    Ok(references)
}

fn render_placeholders(
    html: &str,
    placeholders: &HashMap<usize, (EmbedTag, String)>,
) -> Result<String, lol_html::errors::RewritingError> {
    let mut ordinal = 0_usize;
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                if embed_tag(el).is_none() {
                    return Ok(());
                }
                let current = ordinal;
                ordinal += 1;
                let Some((tag, content_id)) = placeholders.get(&current) else {
                    return Ok(());
                };
                let names = el
                    .attributes()
                    .iter()
                    .map(lol_html::html_content::Attribute::name)
                    .collect::<Vec<_>>();
                for name in names {
                    el.remove_attribute(&name);
                }
                el.set_attribute(tag.url_attribute(), &format!("name:{content_id}"))?;
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NoteError, NoteResult};
    use crate::model::PageItemData;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    const PREFIX: &str = "https://graph.microsoft.com/v1.0/";

    #[derive(Default)]
    struct FakeFetcher {
        missing: Vec<&'static str>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResourceFetcher for FakeFetcher {
        async fn fetch_resource(
            &self,
            _page_id: &str,
            resource_id: &str,
        ) -> NoteResult<PageItemData> {
            if let Ok(mut requested) = self.requested.lock() {
                requested.push(resource_id.to_string());
            }
            if self.missing.iter().any(|missing| *missing == resource_id) {
                return Err(NoteError::remote("fetch resource", 404, b"missing"));
            }
            Ok(PageItemData {
                content_type: "image/png".into(),
                filename: format!("{resource_id}.png"),
                size: 1,
                content: vec![7],
                tag_name: EmbedTag::Img,
                attributes: BTreeMap::new(),
                original_url: String::new(),
            })
        }
    }

    fn rewriter(fetcher: Arc<FakeFetcher>) -> anyhow::Result<ResourceRewriter> {
        Ok(ResourceRewriter::new(fetcher, PREFIX, Metrics::new()?))
    }

    fn resource_url(id: &str) -> String {
        format!("{PREFIX}me/onenote/resources/{id}/$value")
    }

    #[tokio::test]
    async fn html_without_references_is_returned_unchanged() -> anyhow::Result<()> {
        let fetcher = Arc::new(FakeFetcher::default());
        let html = "<div data-id=\"x\"><p>Hello <b>world</b></p><img src=\"https://cdn.test/a.png\"></div>";

        let output = rewriter(fetcher.clone())?
            .rewrite(html, "p-1", &mut ContentIdSequence::new())
            .await;

        assert!(matches!(output.html, Cow::Borrowed(_)));
        assert_eq!(output.html, html);
        assert!(output.parts.is_empty());
        assert!(fetcher.requested.lock().map(|r| r.is_empty()).unwrap_or(false));
        Ok(())
    }

    #[tokio::test]
    async fn every_resolved_reference_gets_a_sequential_placeholder() -> anyhow::Result<()> {
        let fetcher = Arc::new(FakeFetcher::default());
        let html = format!(
            "<p>a</p><img src=\"{}\" alt=\"one\" width=\"10\"><object data=\"{}\" type=\"application/pdf\"></object><img src=\"{}\">",
            resource_url("r-1"),
            resource_url("r-2"),
            resource_url("r-3"),
        );

        let metrics = Metrics::new()?;
        let output = ResourceRewriter::new(fetcher.clone(), PREFIX, metrics.clone())
            .rewrite(&html, "p-1", &mut ContentIdSequence::new())
            .await;

        assert_eq!(
            output.html,
            "<p>a</p><img src=\"name:part1\"><object data=\"name:part2\"></object><img src=\"name:part3\">"
        );
        let ids = output
            .parts
            .iter()
            .map(|part| part.content_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["part1", "part2", "part3"]);
        assert_eq!(output.parts[1].filename, "r-2.png");
        assert_eq!(metrics.snapshot().resources_rewritten, 3);
        Ok(())
    }

    #[tokio::test]
    async fn unresolvable_and_failed_references_are_left_in_place() -> anyhow::Result<()> {
        let fetcher = Arc::new(FakeFetcher {
            missing: vec!["gone"],
            ..FakeFetcher::default()
        });
        let malformed = format!("{PREFIX}me/onenote/resources/abc");
        let html = format!(
            "<img src=\"{malformed}\" alt=\"m\"><img src=\"{}\" alt=\"g\"><img src=\"{}\" alt=\"ok\">",
            resource_url("gone"),
            resource_url("r-9"),
        );

        let output = rewriter(fetcher)?
            .rewrite(&html, "p-1", &mut ContentIdSequence::new())
            .await;

        assert_eq!(
            output.html,
            format!(
                "<img src=\"{malformed}\" alt=\"m\"><img src=\"{}\" alt=\"g\"><img src=\"name:part1\">",
                resource_url("gone")
            )
        );
        assert_eq!(output.parts.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn sequence_continues_across_fragments() -> anyhow::Result<()> {
        let rewriter = rewriter(Arc::new(FakeFetcher::default()))?;
        let mut ids = ContentIdSequence::new();
        let first = format!("<img src=\"{}\">", resource_url("a"));
        let second = format!("<img src=\"{}\">", resource_url("b"));

        let one = rewriter.rewrite(&first, "p-1", &mut ids).await;
        let two = rewriter.rewrite(&second, "p-1", &mut ids).await;

        assert_eq!(one.html, "<img src=\"name:part1\">");
        assert_eq!(two.html, "<img src=\"name:part2\">");
        assert_eq!(ids.issued(), 2);
        Ok(())
    }
}
