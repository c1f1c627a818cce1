//! Test case API handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    CaseResponse, CreateCaseRequest, ListCasesQuery, MessageResponse, UpdateCaseRequest,
};

/// List active cases, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/cases",
    tag = "Cases",
    params(
        ("module_id" = Option<Uuid>, Query, description = "Filter by module"),
        ("priority" = Option<i16>, Query, description = "Filter by priority"),
        ("is_auto" = Option<bool>, Query, description = "Filter by automation flag"),
        ("author" = Option<String>, Query, description = "Filter by author"),
        ("name" = Option<String>, Query, description = "Substring of the name"),
        ("no" = Option<String>, Query, description = "Substring of the case number")
    ),
    responses(
        (status = 200, description = "Cases in `data`", body = Vec<CaseResponse>),
    )
)]
pub async fn list_cases(
    pool: web::Data<DbPool>,
    query: web::Query<ListCasesQuery>,
) -> AppResult<HttpResponse> {
    let cases = pool.list_cases(&query).await?;
    let data: Vec<CaseResponse> = cases.into_iter().map(CaseResponse::from).collect();
    Ok(HttpResponse::Ok().json(MessageResponse::new("OK", data)))
}

/// Get a case.
#[utoipa::path(
    get,
    path = "/api/v1/cases/{id}",
    tag = "Cases",
    params(("id" = Uuid, Path, description = "Case id")),
    responses(
        (status = 200, description = "Case in `data`", body = CaseResponse),
        (status = 400, description = "Case not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_case(pool: web::Data<DbPool>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let case = pool
        .get_case(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Case {}", id)))?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("OK", CaseResponse::from(case))))
}

/// Create a case.
#[utoipa::path(
    post,
    path = "/api/v1/cases",
    tag = "Cases",
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Case created", body = CaseResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_case(
    pool: web::Data<DbPool>,
    user: Option<CurrentUser>,
    body: web::Json<CreateCaseRequest>,
) -> AppResult<HttpResponse> {
    let case = pool
        .insert_case(body.into_inner(), user.map(|u| u.id))
        .await?;
    Ok(HttpResponse::Created().json(MessageResponse::new(
        "Case created",
        CaseResponse::from(case),
    )))
}

/// Partially update a case.
#[utoipa::path(
    put,
    path = "/api/v1/cases/{id}",
    tag = "Cases",
    params(("id" = Uuid, Path, description = "Case id")),
    request_body = UpdateCaseRequest,
    responses(
        (status = 200, description = "Case updated", body = CaseResponse),
        (status = 400, description = "Invalid request or unknown case", body = crate::error::ErrorResponse),
    )
)]
pub async fn update_case(
    pool: web::Data<DbPool>,
    user: Option<CurrentUser>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCaseRequest>,
) -> AppResult<HttpResponse> {
    let case = pool
        .update_case(path.into_inner(), body.into_inner(), user.map(|u| u.id))
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Case updated",
        CaseResponse::from(case),
    )))
}

/// Soft delete a case.
#[utoipa::path(
    delete,
    path = "/api/v1/cases/{id}",
    tag = "Cases",
    params(("id" = Uuid, Path, description = "Case id")),
    responses(
        (status = 200, description = "Case deleted"),
        (status = 400, description = "Case not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_case(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    pool.soft_delete_case(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::message("Case deleted")))
}

/// Configure case routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/cases")
            .route(web::get().to(list_cases))
            .route(web::post().to(create_case)),
    )
    .service(
        web::resource("/cases/{id}")
            .route(web::get().to(get_case))
            .route(web::put().to(update_case))
            .route(web::delete().to(delete_case)),
    );
}
