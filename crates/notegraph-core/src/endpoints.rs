//! Remote endpoint addresses resolved against the configured principal.

use notegraph_config::ClientConfig;
use url::Url;

use crate::error::{NoteError, NoteResult};

/// Resolves request URLs under `{api_root}/{principal}/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
    resource_prefix: String,
}

impl Endpoints {
    /// Build the resolver from client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Config`] when the configured principal cannot be joined
    /// onto the API root.
    pub fn from_config(config: &ClientConfig) -> NoteResult<Self> {
        Ok(Self {
            base: config.principal_base()?,
            resource_prefix: config.resource_prefix(),
        })
    }

    /// Prefix shared by every embedded resource download URL in page HTML.
    #[must_use]
    pub fn resource_prefix(&self) -> &str {
        &self.resource_prefix
    }

    /// `PATCH onenote/pages/{id}/content`
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Url`] when the joined URL is invalid.
    pub fn page_content(&self, page_id: &str) -> NoteResult<Url> {
        self.join("update page", &format!("onenote/pages/{page_id}/content"))
    }

    /// `POST onenote/pages/{id}/copyToSection`
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Url`] when the joined URL is invalid.
    pub fn page_copy(&self, page_id: &str) -> NoteResult<Url> {
        self.join("copy page", &format!("onenote/pages/{page_id}/copyToSection"))
    }

    /// `DELETE onenote/pages/{id}`
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Url`] when the joined URL is invalid.
    pub fn page(&self, page_id: &str) -> NoteResult<Url> {
        self.join("delete page", &format!("onenote/pages/{page_id}"))
    }

    /// `POST onenote/sections/{id}/copyToNotebook`
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Url`] when the joined URL is invalid.
    pub fn section_copy(&self, section_id: &str) -> NoteResult<Url> {
        self.join(
            "copy section",
            &format!("onenote/sections/{section_id}/copyToNotebook"),
        )
    }

    /// `GET onenote/operations/{id}`
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Url`] when the joined URL is invalid.
    pub fn operation(&self, operation_id: &str) -> NoteResult<Url> {
        self.join(
            "operation status",
            &format!("onenote/operations/{operation_id}"),
        )
    }

    /// `GET onenote/resources/{id}/$value`
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Url`] when the joined URL is invalid.
    pub fn resource_value(&self, resource_id: &str) -> NoteResult<Url> {
        self.join(
            "fetch resource",
            &format!("onenote/resources/{resource_id}/$value"),
        )
    }

    fn join(&self, operation: &'static str, path: &str) -> NoteResult<Url> {
        self.base
            .join(path)
            .map_err(|source| NoteError::Url { operation, source })
    }
}
