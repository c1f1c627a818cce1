//! Code table endpoint.

use actix_web::{HttpResponse, web};

use crate::error::{AppError, AppResult};
use crate::models::{CaseConstants, JobConstants, MessageResponse};

/// Get the code tables of a domain (`job` or `case`).
#[utoipa::path(
    get,
    path = "/api/v1/constants/{kind}",
    tag = "Constants",
    params(("kind" = String, Path, description = "`job` or `case`")),
    responses(
        (status = 200, description = "Job code tables", body = JobConstants),
        (status = 400, description = "Unknown kind", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_constants(path: web::Path<String>) -> AppResult<HttpResponse> {
    match path.as_str() {
        "job" => Ok(HttpResponse::Ok().json(MessageResponse::new("OK", JobConstants::new()))),
        "case" => Ok(HttpResponse::Ok().json(MessageResponse::new("OK", CaseConstants::new()))),
        other => Err(AppError::NotFound(format!("Constants '{}'", other))),
    }
}

/// Configure constants routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/constants/{kind}").route(web::get().to(get_constants)));
}
