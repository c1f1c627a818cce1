//! Database operations for users.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::user::{self, ActiveModel, Entity as User};
use crate::error::{AppError, AppResult};
use crate::models::CreateUserRequest;

use super::DbPool;

impl DbPool {
    /// List active users ordered by username.
    pub async fn list_users(&self) -> AppResult<Vec<user::Model>> {
        let result = User::find()
            .filter(user::Column::IsActive.eq(true))
            .order_by_asc(user::Column::Username)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list users: {}", e)))?;

        Ok(result)
    }

    /// Register a user. Duplicate usernames are a conflict.
    pub async fn insert_user(&self, req: CreateUserRequest) -> AppResult<user::Model> {
        let errors = req.validate();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            username: Set(req.username.trim().to_string()),
            nickname: Set(req.nickname),
            email: Set(req.email),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model.insert(self.connection()).await?;

        Ok(result)
    }
}
