//! Attachment DTOs.

use serde::Serialize;
use utoipa::ToSchema;

/// Response after storing an attachment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttachmentResponse {
    /// Attachment id (object key in the store).
    pub id: String,
    /// URL to embed in result detail: `<img src="{url}">`.
    pub url: String,
}
