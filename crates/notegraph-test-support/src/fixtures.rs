//! Canned responses shaped like the remote notes API.

use notegraph_core::ApiResponse;
use serde_json::{Value, json};

/// API root used by fixture URLs and test configurations.
pub const API_ROOT: &str = "https://graph.microsoft.com/v1.0";

fn json_response(status: u16, body: &Value) -> ApiResponse {
    ApiResponse::new(status, body.to_string()).with_header("content-type", "application/json")
}

/// `202 Accepted` for a copy submission.
#[must_use]
pub fn copy_accepted(operation_id: &str) -> ApiResponse {
    json_response(202, &json!({"status": "notStarted", "id": operation_id}))
}

/// Operation status with no location or error.
#[must_use]
pub fn operation(operation_id: &str, status: &str) -> ApiResponse {
    json_response(200, &json!({"id": operation_id, "status": status}))
}

/// Completed operation pointing at `location`.
#[must_use]
pub fn operation_completed(operation_id: &str, location: &str) -> ApiResponse {
    json_response(
        200,
        &json!({
            "id": operation_id,
            "status": "Completed",
            "resourceLocation": location,
        }),
    )
}

/// Failed operation carrying a service error message.
#[must_use]
pub fn operation_failed(operation_id: &str, message: &str) -> ApiResponse {
    json_response(
        200,
        &json!({
            "id": operation_id,
            "status": "Failed",
            "error": {"code": "20102", "message": message},
        }),
    )
}

/// `503 Service Unavailable` from the status endpoint.
#[must_use]
pub fn unavailable() -> ApiResponse {
    ApiResponse::new(503, "Service Unavailable")
}

/// `204 No Content`.
#[must_use]
pub fn no_content() -> ApiResponse {
    ApiResponse::new(204, Vec::new())
}

/// Binary resource download.
#[must_use]
pub fn resource(content_type: &str, bytes: &[u8]) -> ApiResponse {
    ApiResponse::new(200, bytes.to_vec()).with_header("content-type", content_type)
}

/// `resourceLocation` URL of a page.
#[must_use]
pub fn page_location(page_id: &str) -> String {
    format!("{API_ROOT}/me/onenote/pages/{page_id}")
}

/// `resourceLocation` URL of a section.
#[must_use]
pub fn section_location(section_id: &str) -> String {
    format!("{API_ROOT}/me/onenote/sections/{section_id}")
}

/// Download URL of an embedded resource as it appears in page HTML.
#[must_use]
pub fn resource_url(resource_id: &str) -> String {
    format!("{API_ROOT}/me/onenote/resources/{resource_id}/$value")
}
