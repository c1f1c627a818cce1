//! Attachment upload and serving.
//!
//! Uploaded images get a server-generated id. Clients embed the returned URL
//! in result detail, which is how a job-case link comes to own an attachment.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{AttachmentResponse, MessageResponse};
use crate::services::{AttachmentService, Storage};

/// Upload limits shared with the handlers.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_upload_size: usize,
}

/// Check an uploaded file name and return its normalized extension.
fn accepted_extension(filename: &str) -> AppResult<String> {
    Storage::allowed_extension(filename).ok_or_else(|| {
        AppError::field(
            "file",
            format!(
                "'{}' is not an accepted image type (png, jpg, jpeg, gif, webp)",
                filename
            ),
        )
    })
}

fn check_size(size: usize, limits: &UploadLimits) -> AppResult<()> {
    if size > limits.max_upload_size {
        return Err(AppError::field(
            "file",
            format!("must be at most {} bytes", limits.max_upload_size),
        ));
    }
    Ok(())
}

/// Upload an image attachment.
///
/// Accepts multipart form data; the first part with a filename is stored.
#[utoipa::path(
    post,
    path = "/api/v1/attachments",
    tag = "Attachments",
    request_body(content_type = "multipart/form-data", description = "Image file"),
    responses(
        (status = 201, description = "Attachment stored; id and URL in `data`", body = AttachmentResponse),
        (status = 400, description = "Missing file, unsupported type or too large", body = crate::error::ErrorResponse),
    )
)]
pub async fn upload_attachment(
    storage: web::Data<Storage>,
    attachments: web::Data<AttachmentService>,
    limits: web::Data<UploadLimits>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;

        let Some(filename) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(String::from)
        else {
            continue;
        };

        let ext = accepted_extension(&filename)?;

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
            data.extend_from_slice(&chunk);
            check_size(data.len(), &limits)?;
        }

        let id = Storage::new_attachment_id(&ext);
        storage
            .put(
                &Storage::attachment_key(&id),
                data,
                Some(Storage::content_type_for_extension(&ext)),
            )
            .await?;

        info!(attachment = %id, original = %filename, "Attachment stored");

        let url = attachments.url_for(&id);
        return Ok(HttpResponse::Created().json(MessageResponse::new(
            "Attachment uploaded",
            AttachmentResponse { id, url },
        )));
    }

    Err(AppError::field("file", "is required"))
}

/// Serve an attachment.
#[utoipa::path(
    get,
    path = "/api/v1/attachments/{id}",
    tag = "Attachments",
    params(("id" = String, Path, description = "Attachment id")),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 400, description = "Unknown attachment", body = crate::error::ErrorResponse),
    )
)]
pub async fn serve_attachment(
    storage: web::Data<Storage>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    if !Storage::is_valid_attachment_id(&id) {
        return Err(AppError::NotFound(format!("Attachment {}", id)));
    }

    debug!("Serving attachment {}", id);

    let (data, content_type) = storage.get(&Storage::attachment_key(&id)).await?;
    let content_type = content_type.unwrap_or_else(|| {
        let ext = id.rsplit('.').next().unwrap_or("");
        Storage::content_type_for_extension(ext).to_string()
    });

    Ok(HttpResponse::Ok().content_type(content_type).body(data))
}

/// Configure attachment routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/attachments").route(web::post().to(upload_attachment)))
        .service(web::resource("/attachments/{id}").route(web::get().to(serve_attachment)));
}
