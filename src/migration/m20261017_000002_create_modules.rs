//! Migration: Create modules table.
//!
//! Modules form a tree that groups test cases.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE modules (
                    id UUID PRIMARY KEY,
                    name VARCHAR(20) NOT NULL CHECK (length(trim(name)) > 0),
                    parent_id UUID REFERENCES modules(id) ON DELETE SET NULL,
                    creator_id UUID REFERENCES users(id) ON DELETE SET NULL,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                    CHECK (parent_id IS NULL OR parent_id <> id)
                );

                CREATE INDEX idx_modules_parent_active
                    ON modules(parent_id)
                    WHERE is_active = TRUE;

                CREATE TRIGGER update_modules_updated_at
                    BEFORE UPDATE ON modules
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TRIGGER IF EXISTS update_modules_updated_at ON modules;
                DROP TABLE IF EXISTS modules CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
