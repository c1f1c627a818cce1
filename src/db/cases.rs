//! Database queries for test cases.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::case::{self, ActiveModel, Entity as Case};
use crate::error::{AppError, AppResult};
use crate::models::{CreateCaseRequest, DEFAULT_CASE_PRIORITY, ListCasesQuery, UpdateCaseRequest};

use super::{DbPool, like_pattern};

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl DbPool {
    /// Get an active case by id.
    pub async fn get_case(&self, id: Uuid) -> AppResult<Option<case::Model>> {
        let result = Case::find_by_id(id)
            .filter(case::Column::IsActive.eq(true))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get case: {}", e)))?;

        Ok(result)
    }

    /// List active cases matching the query, newest first.
    pub async fn list_cases(&self, query: &ListCasesQuery) -> AppResult<Vec<case::Model>> {
        let mut select = Case::find().filter(case::Column::IsActive.eq(true));

        if let Some(module_id) = query.module_id {
            select = select.filter(case::Column::ModuleId.eq(module_id));
        }
        if let Some(priority) = query.priority {
            select = select.filter(case::Column::Priority.eq(priority));
        }
        if let Some(is_auto) = query.is_auto {
            select = select.filter(case::Column::IsAuto.eq(is_auto));
        }
        if let Some(ref author) = query.author
            && !author.is_empty()
        {
            select = select.filter(case::Column::Author.eq(author.clone()));
        }
        if let Some(ref name) = query.name
            && !name.is_empty()
        {
            select = select.filter(Expr::cust_with_values(
                "cases.name ILIKE $1",
                [like_pattern(name)],
            ));
        }
        if let Some(ref no) = query.no
            && !no.is_empty()
        {
            select = select.filter(Expr::cust_with_values(
                "cases.no ILIKE $1",
                [like_pattern(no)],
            ));
        }

        let result = select
            .order_by_desc(case::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list cases: {}", e)))?;

        Ok(result)
    }

    /// Create a case in an existing module.
    pub async fn insert_case(
        &self,
        req: CreateCaseRequest,
        creator_id: Option<Uuid>,
    ) -> AppResult<case::Model> {
        let errors = req.validate();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let module_id = req
            .module_id
            .ok_or_else(|| AppError::field("module_id", "is required"))?;
        if self.get_module(module_id).await?.is_none() {
            return Err(AppError::field("module_id", "does not exist"));
        }

        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            no: Set(trimmed(req.no).unwrap_or_default()),
            name: Set(trimmed(req.name).unwrap_or_default()),
            priority: Set(req.priority.unwrap_or(DEFAULT_CASE_PRIORITY)),
            is_active: Set(true),
            is_auto: Set(req.is_auto),
            version: Set(req.version),
            code_time: Set(req.code_time),
            case_type: Set(req.case_type),
            author: Set(trimmed(req.author).unwrap_or_default()),
            module_id: Set(module_id),
            creator_id: Set(creator_id),
            reviser_id: Set(None),
            description: Set(req.description),
            step: Set(req.step),
            expectation: Set(req.expectation),
            path: Set(req.path),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Duplicate case numbers surface as Conflict
        let result = model.insert(self.connection()).await?;

        Ok(result)
    }

    /// Partially update a case, recording who revised it.
    pub async fn update_case(
        &self,
        id: Uuid,
        req: UpdateCaseRequest,
        reviser_id: Option<Uuid>,
    ) -> AppResult<case::Model> {
        let errors = req.validate();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let existing = self
            .get_case(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case {}", id)))?;

        if let Some(module_id) = req.module_id
            && self.get_module(module_id).await?.is_none()
        {
            return Err(AppError::field("module_id", "does not exist"));
        }

        let mut active: ActiveModel = existing.into();
        if let Some(v) = trimmed(req.name) {
            active.name = Set(v);
        }
        if let Some(v) = req.priority {
            active.priority = Set(v);
        }
        if let Some(v) = req.is_auto {
            active.is_auto = Set(v);
        }
        if let Some(v) = req.version {
            active.version = Set(Some(v));
        }
        if let Some(v) = req.code_time {
            active.code_time = Set(Some(v));
        }
        if let Some(v) = req.case_type {
            active.case_type = Set(Some(v));
        }
        if let Some(v) = trimmed(req.author) {
            active.author = Set(v);
        }
        if let Some(v) = req.module_id {
            active.module_id = Set(v);
        }
        if let Some(v) = req.description {
            active.description = Set(Some(v));
        }
        if let Some(v) = req.step {
            active.step = Set(Some(v));
        }
        if let Some(v) = req.expectation {
            active.expectation = Set(Some(v));
        }
        if let Some(v) = req.path {
            active.path = Set(Some(v));
        }
        if reviser_id.is_some() {
            active.reviser_id = Set(reviser_id);
        }
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update case: {}", e)))?;

        Ok(result)
    }

    /// Soft delete a case. Existing job links keep referencing it.
    pub async fn soft_delete_case(&self, id: Uuid) -> AppResult<()> {
        let existing = self
            .get_case(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case {}", id)))?;

        let mut active: ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete case: {}", e)))?;

        Ok(())
    }
}
