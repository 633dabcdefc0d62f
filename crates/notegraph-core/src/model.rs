//! Update commands, resource parts, page items and async operations.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{NoteError, NoteResult};

/// Action applied to an update target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    /// Add content as the last child of the target.
    Append,
    /// Add content as the first child of the target.
    Prepend,
    /// Add content as a sibling of the target.
    Insert,
    /// Replace the target with the content.
    Replace,
    /// Remove the target.
    Delete,
}

impl UpdateAction {
    /// Whether the remote API accepts a `position` for this action.
    #[must_use]
    pub const fn takes_position(self) -> bool {
        !matches!(self, Self::Append)
    }

    /// Whether the command must carry HTML content.
    #[must_use]
    pub const fn requires_content(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

/// Placement relative to the target for positioned actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Before the target.
    Before,
    /// After the target.
    #[default]
    After,
}

/// One entry of a page content PATCH.
///
/// Serialization uses two wire shapes selected by [`UpdateAction`]: `append` never
/// carries `position`, every other action always does (defaulting to `after`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateCommand {
    /// Selector: `body`, `title`, `#data-id`, or a generated id such as `p:{...}{n}`.
    pub target: String,
    /// Action to apply.
    pub action: UpdateAction,
    /// Placement for positioned actions.
    #[serde(default)]
    pub position: Option<Position>,
    /// HTML fragment; absent for `delete`.
    #[serde(default)]
    pub content: Option<String>,
}

impl UpdateCommand {
    /// Build a command from its parts.
    #[must_use]
    pub fn new(target: impl Into<String>, action: UpdateAction, content: Option<String>) -> Self {
        Self {
            target: target.into(),
            action,
            position: None,
            content,
        }
    }

    /// Replace the whole page body with `content`.
    #[must_use]
    pub fn replace_body(content: impl Into<String>) -> Self {
        Self::new("body", UpdateAction::Replace, Some(content.into()))
    }

    /// Set an explicit position.
    #[must_use]
    pub const fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Check the command's own shape. `index` is reported in the error.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::InvalidCommand`] for a blank target, or for an action that
    /// needs content but has none. Empty content is passed through as written.
    pub fn validate(&self, index: usize) -> NoteResult<()> {
        if self.target.trim().is_empty() {
            return Err(NoteError::InvalidCommand {
                index,
                reason: "target must not be empty",
            });
        }
        if self.action.requires_content() && self.content.is_none() {
            return Err(NoteError::InvalidCommand {
                index,
                reason: "content is required for every action except delete",
            });
        }
        Ok(())
    }

    fn wire(&self) -> WireCommand<'_> {
        let target = self.target.as_str();
        let content = self.content.as_deref();
        if self.action.takes_position() {
            WireCommand::Positioned {
                target,
                action: self.action,
                position: self.position.unwrap_or_default(),
                content,
            }
        } else {
            WireCommand::Unpositioned {
                target,
                action: self.action,
                content,
            }
        }
    }
}

impl Serialize for UpdateCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.wire().serialize(serializer)
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireCommand<'a> {
    Positioned {
        target: &'a str,
        action: UpdateAction,
        position: Position,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<&'a str>,
    },
    Unpositioned {
        target: &'a str,
        action: UpdateAction,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<&'a str>,
    },
}

/// Binary attachment carried alongside the command list.
#[derive(Clone, PartialEq, Eq)]
pub struct ResourcePart {
    /// Multipart field name, `part1`, `part2`, ... unique per update call.
    pub content_id: String,
    /// Raw bytes.
    pub content: Vec<u8>,
    /// MIME type of `content`.
    pub content_type: String,
    /// File name reported in `Content-Disposition`.
    pub filename: String,
}

impl fmt::Debug for ResourcePart {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResourcePart")
            .field("content_id", &self.content_id)
            .field("content_type", &self.content_type)
            .field("filename", &self.filename)
            .field("len", &self.content.len())
            .finish()
    }
}

/// HTML element kinds that can reference an embedded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedTag {
    /// `<img src=...>`
    Img,
    /// `<object data=...>`
    Object,
}

impl EmbedTag {
    /// Match an element name, ignoring ASCII case.
    #[must_use]
    pub fn from_tag_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("img") {
            Some(Self::Img)
        } else if name.eq_ignore_ascii_case("object") {
            Some(Self::Object)
        } else {
            None
        }
    }

    /// Element name as written in HTML.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Img => "img",
            Self::Object => "object",
        }
    }

    /// Attribute holding the resource URL.
    #[must_use]
    pub const fn url_attribute(self) -> &'static str {
        match self {
            Self::Img => "src",
            Self::Object => "data",
        }
    }
}

/// A downloaded embedded resource with enough metadata to regenerate its reference.
#[derive(Clone, PartialEq, Eq)]
pub struct PageItemData {
    /// MIME type reported by the service.
    pub content_type: String,
    /// File name reported by the service or derived from the identifier.
    pub filename: String,
    /// Size of `content` in bytes.
    pub size: usize,
    /// Raw bytes.
    pub content: Vec<u8>,
    /// Element kind that references this resource.
    pub tag_name: EmbedTag,
    /// Attributes for a regenerated reference, URL attribute included.
    pub attributes: BTreeMap<String, String>,
    /// Download URL the bytes were fetched from.
    pub original_url: String,
}

impl fmt::Debug for PageItemData {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PageItemData")
            .field("content_type", &self.content_type)
            .field("filename", &self.filename)
            .field("size", &self.size)
            .field("tag_name", &self.tag_name)
            .field("attributes", &self.attributes)
            .field("original_url", &self.original_url)
            .finish_non_exhaustive()
    }
}

impl PageItemData {
    /// Consume the item into a multipart resource part named `content_id`.
    #[must_use]
    pub fn into_part(self, content_id: String) -> ResourcePart {
        ResourcePart {
            content_id,
            content: self.content,
            content_type: self.content_type,
            filename: self.filename,
        }
    }

    /// Render an HTML element referencing the original download URL.
    #[must_use]
    pub fn html_reference(&self) -> String {
        let mut html = format!("<{}", self.tag_name.as_str());
        for (name, value) in &self.attributes {
            html.push(' ');
            html.push_str(name);
            html.push_str("=\"");
            html.push_str(&escape_attribute(value));
            html.push('"');
        }
        match self.tag_name {
            EmbedTag::Img => html.push_str(" />"),
            EmbedTag::Object => {
                html.push_str("></");
                html.push_str(self.tag_name.as_str());
                html.push('>');
            }
        }
        html
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Lifecycle of a remote long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Accepted but not yet picked up.
    NotStarted,
    /// In progress (also synthesized when the status endpoint answers 503).
    Running,
    /// Finished; `resourceLocation` names the new entity.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Any status string the client does not recognize.
    Unknown(String),
}

impl OperationStatus {
    /// Parse a status string, ignoring ASCII case.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "notstarted" => Self::NotStarted,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    /// Whether polling stops at this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Metric label for this status.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl Display for OperationStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => formatter.write_str(raw),
            other => formatter.write_str(other.label()),
        }
    }
}

/// Snapshot of a remote long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOperation {
    /// Remote operation identifier.
    pub operation_id: String,
    /// Last observed status.
    pub status: OperationStatus,
    /// URL of the created entity; present once completed.
    pub resource_location: Option<String>,
    /// Error message reported by the service for failed operations.
    pub error_message: Option<String>,
    /// Client-side annotation, set when the status was synthesized.
    pub note: Option<String>,
}

impl AsyncOperation {
    /// Synthetic in-progress snapshot used when the status endpoint is unavailable.
    #[must_use]
    pub fn unavailable(operation_id: &str) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            status: OperationStatus::Running,
            resource_location: None,
            error_message: None,
            note: Some(
                "status endpoint returned 503; the service reports this while long copies are in progress"
                    .to_string(),
            ),
        }
    }
}

/// Result of a move: the copy always exists, the source may survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Identifier of the page in the destination section.
    pub page_id: String,
    /// Whether the source page was deleted.
    pub source_deleted: bool,
    /// Explanation when the source could not be deleted.
    pub warning: Option<String>,
}

impl MoveOutcome {
    /// Whether the move left the source page behind.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        !self.source_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn wire(command: &UpdateCommand) -> Value {
        serde_json::to_value(command).unwrap_or(Value::Null)
    }

    #[test]
    fn append_never_serializes_position() {
        let command = UpdateCommand::new("body", UpdateAction::Append, Some("<p>x</p>".into()))
            .with_position(Position::Before);
        assert_eq!(
            wire(&command),
            json!({"target": "body", "action": "append", "content": "<p>x</p>"})
        );
    }

    #[test]
    fn other_actions_always_serialize_position() {
        for action in [
            UpdateAction::Prepend,
            UpdateAction::Insert,
            UpdateAction::Replace,
            UpdateAction::Delete,
        ] {
            let command = UpdateCommand::new("#intro", action, Some("<p>x</p>".into()));
            let value = wire(&command);
            assert_eq!(value["position"], "after", "{action:?}");
        }

        let before = UpdateCommand::new("#intro", UpdateAction::Insert, Some("<p/>".into()))
            .with_position(Position::Before);
        assert_eq!(wire(&before)["position"], "before");
    }

    #[test]
    fn delete_omits_absent_content() {
        let command = UpdateCommand::new("#gone", UpdateAction::Delete, None);
        assert_eq!(
            wire(&command),
            json!({"target": "#gone", "action": "delete", "position": "after"})
        );
    }

    #[test]
    fn commands_deserialize_from_caller_json() -> Result<(), serde_json::Error> {
        let parsed: Vec<UpdateCommand> = serde_json::from_value(json!([
            {"target": "body", "action": "append", "content": "<p>a</p>"},
            {"target": "#x", "action": "insert", "position": "before", "content": "<p>b</p>"},
            {"target": "#y", "action": "delete"}
        ]))?;
        assert_eq!(parsed[1].position, Some(Position::Before));
        assert_eq!(parsed[2].content, None);
        Ok(())
    }

    #[test]
    fn validate_rejects_blank_target_and_missing_content_only() {
        let blank = UpdateCommand::new("  ", UpdateAction::Append, Some("<p/>".into()));
        assert!(matches!(
            blank.validate(3),
            Err(NoteError::InvalidCommand { index: 3, .. })
        ));

        let missing = UpdateCommand::new("body", UpdateAction::Replace, None);
        assert!(missing.validate(0).is_err());

        let empty = UpdateCommand::new("body", UpdateAction::Replace, Some(String::new()));
        assert!(empty.validate(0).is_ok());
        let blank = UpdateCommand::new("body", UpdateAction::Append, Some("   ".into()));
        assert!(blank.validate(0).is_ok());

        let delete = UpdateCommand::new("#gone", UpdateAction::Delete, None);
        assert!(delete.validate(0).is_ok());
    }

    #[test]
    fn operation_status_parses_case_insensitively() {
        assert_eq!(OperationStatus::parse("notStarted"), OperationStatus::NotStarted);
        assert_eq!(OperationStatus::parse("Running"), OperationStatus::Running);
        assert_eq!(OperationStatus::parse("COMPLETED"), OperationStatus::Completed);
        assert_eq!(OperationStatus::parse("failed"), OperationStatus::Failed);
        assert_eq!(
            OperationStatus::parse("Paused"),
            OperationStatus::Unknown("Paused".into())
        );
        assert!(OperationStatus::Failed.is_terminal());
        assert!(!OperationStatus::Running.is_terminal());
    }

    #[test]
    fn html_reference_regenerates_element() {
        let mut attributes = BTreeMap::new();
        attributes.insert("src".to_string(), "https://x.test/resources/1/$value".to_string());
        attributes.insert("data-title".to_string(), "a \"b\"".to_string());
        let item = PageItemData {
            content_type: "image/png".into(),
            filename: "1.png".into(),
            size: 3,
            content: vec![1, 2, 3],
            tag_name: EmbedTag::Img,
            attributes,
            original_url: "https://x.test/resources/1/$value".into(),
        };
        assert_eq!(
            item.html_reference(),
            "<img data-title=\"a &quot;b&quot;\" src=\"https://x.test/resources/1/$value\" />"
        );

        let part = item.into_part("part4".into());
        assert_eq!(part.content_id, "part4");
        assert_eq!(part.filename, "1.png");
        assert_eq!(part.content, vec![1, 2, 3]);
    }
}
