//! `multipart/form-data` body for page content updates.
//!
//! The body is built in memory so the transport can replay it after a token refresh.
//! The `commands` part always comes first; resource parts follow in the order given.

use rand::{Rng, distr::Alphanumeric};
use tracing::warn;

use crate::error::{NoteError, NoteResult};
use crate::model::{ResourcePart, UpdateCommand};

const BOUNDARY_LEN: usize = 32;
const COMMANDS_FIELD: &str = "commands";
const COMMANDS_FILENAME: &str = "commands.json";

/// Serialized multipart body and the header announcing its boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPayload {
    /// Value for the `Content-Type` request header.
    pub content_type: String,
    /// Encoded body.
    pub body: Vec<u8>,
}

/// Assemble the update payload with a random boundary.
///
/// # Errors
///
/// Returns [`NoteError::Serialize`] when the command list cannot be encoded.
pub fn assemble(commands: &[UpdateCommand], parts: &[ResourcePart]) -> NoteResult<MultipartPayload> {
    let json = serde_json::to_vec(commands).map_err(|source| NoteError::Serialize {
        operation: "update page",
        source,
    })?;
    let mut boundary = random_boundary();
    while collides(&boundary, &json, parts) {
        boundary = random_boundary();
    }
    Ok(encode(&boundary, &json, parts))
}

/// Assemble the update payload with a caller-chosen boundary.
///
/// # Errors
///
/// Returns [`NoteError::Serialize`] when the command list cannot be encoded.
pub fn assemble_with_boundary(
    boundary: &str,
    commands: &[UpdateCommand],
    parts: &[ResourcePart],
) -> NoteResult<MultipartPayload> {
    let json = serde_json::to_vec(commands).map_err(|source| NoteError::Serialize {
        operation: "update page",
        source,
    })?;
    Ok(encode(boundary, &json, parts))
}

fn encode(boundary: &str, json: &[u8], parts: &[ResourcePart]) -> MultipartPayload {
    let mut body = Vec::with_capacity(json.len() + parts.iter().map(|p| p.content.len()).sum::<usize>());
    write_part(
        &mut body,
        boundary,
        COMMANDS_FIELD,
        COMMANDS_FILENAME,
        "application/json",
        json,
    );
    for part in parts {
        if let Err(reason) = check_part(part) {
            warn!(
                content_id = %part.content_id,
                filename = %part.filename,
                reason,
                "skipping resource part"
            );
            continue;
        }
        write_part(
            &mut body,
            boundary,
            &part.content_id,
            &part.filename,
            &part.content_type,
            &part.content,
        );
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    MultipartPayload {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        body,
    }
}

fn write_part(
    body: &mut Vec<u8>,
    boundary: &str,
    name: &str,
    filename: &str,
    content_type: &str,
    content: &[u8],
) {
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
}

fn check_part(part: &ResourcePart) -> Result<(), &'static str> {
    if part.content_id.is_empty() || !is_header_safe(&part.content_id) {
        return Err("content ID is not a valid field name");
    }
    if !is_header_safe(&part.filename) {
        return Err("filename contains characters not allowed in a header");
    }
    let essence = part.content_type.split(';').next().unwrap_or_default().trim();
    let valid_type = essence
        .split_once('/')
        .is_some_and(|(kind, subtype)| !kind.is_empty() && !subtype.is_empty());
    if !valid_type || !is_header_safe(&part.content_type) {
        return Err("content type is not a valid MIME type");
    }
    Ok(())
}

fn is_header_safe(value: &str) -> bool {
    !value.chars().any(|ch| ch == '"' || ch.is_control())
}

fn random_boundary() -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
        .take(BOUNDARY_LEN)
        .collect()
}

fn collides(boundary: &str, json: &[u8], parts: &[ResourcePart]) -> bool {
    let needle = boundary.as_bytes();
    std::iter::once(json)
        .chain(parts.iter().map(|part| part.content.as_slice()))
        .any(|haystack| haystack.windows(needle.len()).any(|window| window == needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UpdateAction;

    fn part(content_id: &str, content_type: &str) -> ResourcePart {
        ResourcePart {
            content_id: content_id.into(),
            content: vec![0xFF, 0x00, 0x10],
            content_type: content_type.into(),
            filename: format!("{content_id}.bin"),
        }
    }

    fn commands() -> Vec<UpdateCommand> {
        vec![UpdateCommand::new(
            "body",
            UpdateAction::Append,
            Some("<img src=\"name:part1\">".into()),
        )]
    }

    #[test]
    fn commands_part_comes_first_and_parts_follow_in_order() -> NoteResult<()> {
        let payload = assemble_with_boundary(
            "XYZ",
            &commands(),
            &[part("part1", "image/png"), part("part2", "application/pdf")],
        )?;

        assert_eq!(payload.content_type, "multipart/form-data; boundary=XYZ");
        let text = String::from_utf8_lossy(&payload.body);
        assert!(text.starts_with(
            "--XYZ\r\nContent-Disposition: form-data; name=\"commands\"; filename=\"commands.json\"\r\nContent-Type: application/json\r\n\r\n[{\"target\":\"body\",\"action\":\"append\""
        ));
        let first = text.find("name=\"part1\"").unwrap_or(usize::MAX);
        let second = text.find("name=\"part2\"").unwrap_or(usize::MAX);
        assert!(first < second && second < usize::MAX);
        assert!(text.contains("filename=\"part2.bin\"\r\nContent-Type: application/pdf\r\n\r\n"));
        assert!(text.ends_with("--XYZ--\r\n"));
        Ok(())
    }

    #[test]
    fn invalid_parts_are_skipped_not_fatal() -> NoteResult<()> {
        let mut injected = part("part2", "image/png");
        injected.filename = "evil\r\nX-Injected: 1".into();
        let payload = assemble_with_boundary(
            "B",
            &commands(),
            &[
                part("part1", "not-a-mime"),
                injected,
                part("part3", "image/gif"),
            ],
        )?;

        let text = String::from_utf8_lossy(&payload.body);
        assert!(!text.contains("name=\"part1\""));
        assert!(!text.contains("X-Injected"));
        assert!(text.contains("name=\"part3\""));
        assert_eq!(text.matches("--B\r\n").count(), 2);
        Ok(())
    }

    #[test]
    fn random_boundary_is_alphanumeric_and_absent_from_body() -> NoteResult<()> {
        let payload = assemble(&commands(), &[part("part1", "image/png")])?;
        let boundary = payload
            .content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap_or_default()
            .to_string();
        assert_eq!(boundary.len(), BOUNDARY_LEN);
        assert!(boundary.chars().all(|ch| ch.is_ascii_alphanumeric()));
        assert!(!collides(&boundary, b"[]", &[]));
        Ok(())
    }
}
