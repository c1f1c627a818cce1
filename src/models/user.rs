//! User models. Users are created here only so they can be assigned as testers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::user;
use crate::error::FieldError;

use super::case::{check_optional, check_required};

/// Request to register a user.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_required(&mut errors, "username", Some(&self.username), 150);
        check_optional(&mut errors, "nickname", self.nickname.as_deref(), 50);
        if let Some(ref email) = self.email
            && !email.contains('@')
        {
            errors.push(FieldError::new("email", "must be an email address"));
        }
        errors
    }
}

/// User representation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            nickname: u.nickname,
            email: u.email,
            created_at: u.created_at,
        }
    }
}
