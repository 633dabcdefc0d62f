//! Download of embedded page resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use crate::endpoints::Endpoints;
use crate::error::NoteResult;
use crate::ids::sanitize_id;
use crate::model::{EmbedTag, PageItemData};
use crate::transport::{ApiRequest, Transport};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Retrieves the bytes and metadata of an embedded resource.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch resource `resource_id` referenced from page `page_id`.
    async fn fetch_resource(&self, page_id: &str, resource_id: &str) -> NoteResult<PageItemData>;
}

/// Fetches resources through the authenticated transport.
#[derive(Clone)]
pub struct GraphResourceFetcher {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl GraphResourceFetcher {
    /// Build a fetcher over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }
}

#[async_trait]
impl ResourceFetcher for GraphResourceFetcher {
    async fn fetch_resource(&self, page_id: &str, resource_id: &str) -> NoteResult<PageItemData> {
        let resource_id = sanitize_id(resource_id, "resource ID")?;
        let url = self.endpoints.resource_value(&resource_id)?;
        let original_url = url.to_string();
        let response = self
            .transport
            .send(ApiRequest::new("fetch resource", Method::GET, url))
            .await?
            .require_success("fetch resource")?;

        let content_type = response
            .header("content-type")
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let filename = response
            .header("content-disposition")
            .and_then(disposition_filename)
            .unwrap_or_else(|| derived_filename(&resource_id, &content_type));
        let tag_name = if mime_essence(&content_type).starts_with("image/") {
            EmbedTag::Img
        } else {
            EmbedTag::Object
        };

        let mut attributes = BTreeMap::new();
        attributes.insert(tag_name.url_attribute().to_string(), original_url.clone());
        match tag_name {
            EmbedTag::Img => {
                attributes.insert("alt".to_string(), filename.clone());
            }
            EmbedTag::Object => {
                attributes.insert("data-attachment".to_string(), filename.clone());
                attributes.insert("type".to_string(), mime_essence(&content_type).to_string());
            }
        }

        debug!(
            page_id,
            resource_id = %resource_id,
            content_type = %content_type,
            size = response.body.len(),
            "fetched embedded resource"
        );
        Ok(PageItemData {
            content_type,
            filename,
            size: response.body.len(),
            content: response.body,
            tag_name,
            attributes,
            original_url,
        })
    }
}

fn mime_essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

/// Pull `filename` out of a `Content-Disposition` header value.
fn disposition_filename(header: &str) -> Option<String> {
    header.split(';').find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn derived_filename(resource_id: &str, content_type: &str) -> String {
    let extension = match mime_essence(content_type).to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "bin",
    };
    format!("{resource_id}.{extension}")
}
