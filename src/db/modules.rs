//! Database queries for case modules.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::case;
use crate::entity::module::{self, ActiveModel, Entity as Module};
use crate::error::{AppError, AppResult};
use crate::models::{CreateModuleRequest, UpdateModuleRequest};

use super::DbPool;

/// True when `ancestor` is `start` or one of its parents.
fn is_ancestor_or_self(parents: &HashMap<Uuid, Option<Uuid>>, ancestor: Uuid, start: Uuid) -> bool {
    let mut current = Some(start);
    let mut hops = 0;
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        // Guards against cycles already present in stored data
        hops += 1;
        if hops > parents.len() {
            return false;
        }
        current = parents.get(&id).copied().flatten();
    }
    false
}

impl DbPool {
    /// Get an active module by id.
    pub async fn get_module(&self, id: Uuid) -> AppResult<Option<module::Model>> {
        let result = Module::find_by_id(id)
            .filter(module::Column::IsActive.eq(true))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get module: {}", e)))?;

        Ok(result)
    }

    /// List active modules ordered by name.
    pub async fn list_modules(&self) -> AppResult<Vec<module::Model>> {
        let result = Module::find()
            .filter(module::Column::IsActive.eq(true))
            .order_by_asc(module::Column::Name)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list modules: {}", e)))?;

        Ok(result)
    }

    /// Create a module under an optional existing parent.
    pub async fn insert_module(
        &self,
        req: CreateModuleRequest,
        creator_id: Option<Uuid>,
    ) -> AppResult<module::Model> {
        let errors = req.validate();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        if let Some(parent_id) = req.parent_id
            && self.get_module(parent_id).await?.is_none()
        {
            return Err(AppError::field("parent_id", "does not exist"));
        }

        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(req.name.trim().to_string()),
            parent_id: Set(req.parent_id),
            creator_id: Set(creator_id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert module: {}", e)))?;

        Ok(result)
    }

    /// Rename and/or re-parent a module.
    pub async fn update_module(
        &self,
        id: Uuid,
        req: UpdateModuleRequest,
    ) -> AppResult<module::Model> {
        let existing = self
            .get_module(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Module {}", id)))?;

        let mut active: ActiveModel = existing.into();

        if let Some(ref name) = req.name {
            let mut errors = Vec::new();
            crate::models::case::check_required(&mut errors, "name", Some(name), 20);
            if !errors.is_empty() {
                return Err(AppError::Validation(errors));
            }
            active.name = Set(name.trim().to_string());
        }

        match req.parent_id {
            None => {}
            Some(None) => active.parent_id = Set(None),
            Some(Some(parent_id)) => {
                let modules = self.list_modules().await?;
                let parents: HashMap<Uuid, Option<Uuid>> =
                    modules.iter().map(|m| (m.id, m.parent_id)).collect();
                if !parents.contains_key(&parent_id) {
                    return Err(AppError::field("parent_id", "does not exist"));
                }
                if is_ancestor_or_self(&parents, id, parent_id) {
                    return Err(AppError::field(
                        "parent_id",
                        "a module cannot be moved under itself",
                    ));
                }
                active.parent_id = Set(Some(parent_id));
            }
        }

        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update module: {}", e)))?;

        Ok(result)
    }

    /// Soft delete a module that no longer holds active cases or sub-modules.
    pub async fn soft_delete_module(&self, id: Uuid) -> AppResult<()> {
        let existing = self
            .get_module(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Module {}", id)))?;

        let cases = case::Entity::find()
            .filter(case::Column::ModuleId.eq(id))
            .filter(case::Column::IsActive.eq(true))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count module cases: {}", e)))?;

        let children = Module::find()
            .filter(module::Column::ParentId.eq(id))
            .filter(module::Column::IsActive.eq(true))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count sub-modules: {}", e)))?;

        if cases > 0 || children > 0 {
            return Err(AppError::InvalidInput(format!(
                "Module {} still has {} active case(s) and {} sub-module(s)",
                id, cases, children
            )));
        }

        let mut active: ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete module: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cannot_move_module_under_descendant() {
        let root = Uuid::now_v7();
        let child = Uuid::now_v7();
        let grandchild = Uuid::now_v7();
        let other = Uuid::now_v7();
        let parents = HashMap::from([
            (root, None),
            (child, Some(root)),
            (grandchild, Some(child)),
            (other, None),
        ]);

        assert!(is_ancestor_or_self(&parents, root, grandchild));
        assert!(is_ancestor_or_self(&parents, child, child));
        assert!(!is_ancestor_or_self(&parents, grandchild, root));
        assert!(!is_ancestor_or_self(&parents, root, other));
    }

    #[test]
    fn test_ancestor_walk_stops_on_stored_cycle() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let parents = HashMap::from([(a, Some(b)), (b, Some(a))]);
        assert!(!is_ancestor_or_self(&parents, Uuid::now_v7(), a));
    }
}
