//! Migration: Create cases table.
//!
//! A case carries its definition and detail fields (description, steps,
//! expectation, automation path) in one row.

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
                CREATE TABLE cases (
                    id UUID PRIMARY KEY,
                    no VARCHAR(120) NOT NULL,
                    name VARCHAR(60) NOT NULL,
                    priority SMALLINT NOT NULL DEFAULT 2
                        CHECK (priority IN (1, 2, 3)),
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    is_auto BOOLEAN NOT NULL DEFAULT FALSE,
                    version VARCHAR(10),
                    code_time VARCHAR(24),
                    case_type VARCHAR(20),
                    author VARCHAR(20) NOT NULL,
                    module_id UUID NOT NULL REFERENCES modules(id) ON DELETE RESTRICT,
                    creator_id UUID REFERENCES users(id) ON DELETE SET NULL,
                    reviser_id UUID REFERENCES users(id) ON DELETE SET NULL,
                    description VARCHAR(100),
                    step VARCHAR(250),
                    expectation VARCHAR(100),
                    path VARCHAR(200),

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE UNIQUE INDEX idx_cases_no ON cases(no);

                CREATE INDEX idx_cases_module_active
                    ON cases(module_id)
                    WHERE is_active = TRUE;

                CREATE TRIGGER update_cases_updated_at
                    BEFORE UPDATE ON cases
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
                DROP TRIGGER IF EXISTS update_cases_updated_at ON cases;
                DROP TABLE IF EXISTS cases CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
