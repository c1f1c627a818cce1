//! User directory handlers.

use actix_web::{HttpResponse, web};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{CreateUserRequest, MessageResponse, UserResponse};

/// List active users.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    responses(
        (status = 200, description = "Users in `data`", body = Vec<UserResponse>),
    )
)]
pub async fn list_users(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let users = pool.list_users().await?;
    let data: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(MessageResponse::new("OK", data)))
}

/// Register a user.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid request or duplicate username", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_user(
    pool: web::Data<DbPool>,
    body: web::Json<CreateUserRequest>,
) -> AppResult<HttpResponse> {
    let user = pool.insert_user(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(MessageResponse::new(
        "User created",
        UserResponse::from(user),
    )))
}

/// Configure user routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/users")
            .route(web::get().to(list_users))
            .route(web::post().to(create_user)),
    );
}
