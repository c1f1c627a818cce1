//! Module (case folder) API handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::case::build_module_tree;
use crate::models::{
    CreateModuleRequest, ListCasesQuery, MessageResponse, ModuleNode, ModuleResponse,
    ModuleTreeQuery, UpdateModuleRequest,
};

/// List active modules by name.
#[utoipa::path(
    get,
    path = "/api/v1/modules",
    tag = "Modules",
    responses(
        (status = 200, description = "Modules in `data`", body = Vec<ModuleResponse>),
    )
)]
pub async fn list_modules(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let modules = pool.list_modules().await?;
    let data: Vec<ModuleResponse> = modules.into_iter().map(ModuleResponse::from).collect();
    Ok(HttpResponse::Ok().json(MessageResponse::new("OK", data)))
}

/// Active modules as a forest, optionally with their cases.
#[utoipa::path(
    get,
    path = "/api/v1/modules/tree",
    tag = "Modules",
    params(("with_cases" = Option<bool>, Query, description = "Attach cases to module nodes")),
    responses(
        (status = 200, description = "Module tree in `data`", body = Vec<ModuleNode>),
    )
)]
pub async fn module_tree(
    pool: web::Data<DbPool>,
    query: web::Query<ModuleTreeQuery>,
) -> AppResult<HttpResponse> {
    let modules = pool.list_modules().await?;
    let cases = if query.with_cases {
        pool.list_cases(&ListCasesQuery::default()).await?
    } else {
        Vec::new()
    };

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "OK",
        build_module_tree(modules, cases),
    )))
}

/// Create a module.
#[utoipa::path(
    post,
    path = "/api/v1/modules",
    tag = "Modules",
    request_body = CreateModuleRequest,
    responses(
        (status = 201, description = "Module created", body = ModuleResponse),
        (status = 400, description = "Invalid name or unknown parent", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_module(
    pool: web::Data<DbPool>,
    user: Option<CurrentUser>,
    body: web::Json<CreateModuleRequest>,
) -> AppResult<HttpResponse> {
    let module = pool
        .insert_module(body.into_inner(), user.map(|u| u.id))
        .await?;
    Ok(HttpResponse::Created().json(MessageResponse::new(
        "Module created",
        ModuleResponse::from(module),
    )))
}

/// Rename or move a module.
#[utoipa::path(
    put,
    path = "/api/v1/modules/{id}",
    tag = "Modules",
    params(("id" = Uuid, Path, description = "Module id")),
    request_body = UpdateModuleRequest,
    responses(
        (status = 200, description = "Module updated", body = ModuleResponse),
        (status = 400, description = "Unknown module, bad parent or cycle", body = crate::error::ErrorResponse),
    )
)]
pub async fn update_module(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateModuleRequest>,
) -> AppResult<HttpResponse> {
    let module = pool
        .update_module(path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Module updated",
        ModuleResponse::from(module),
    )))
}

/// Soft delete an empty module.
#[utoipa::path(
    delete,
    path = "/api/v1/modules/{id}",
    tag = "Modules",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module deleted"),
        (status = 400, description = "Unknown module or module not empty", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_module(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    pool.soft_delete_module(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::message("Module deleted")))
}

/// Configure module routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/modules")
            .route(web::get().to(list_modules))
            .route(web::post().to(create_module)),
    )
    .service(web::resource("/modules/tree").route(web::get().to(module_tree)))
    .service(
        web::resource("/modules/{id}")
            .route(web::put().to(update_module))
            .route(web::delete().to(delete_module)),
    );
}
