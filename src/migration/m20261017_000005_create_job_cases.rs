//! Migration: Create job_cases table.
//!
//! One row per (job, case) holding the recorded result and the ids of the
//! attachments it owns.

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
                CREATE TABLE job_cases (
                    id UUID PRIMARY KEY,
                    job_id UUID NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                    case_id UUID NOT NULL REFERENCES cases(id) ON DELETE CASCADE,
                    case_status SMALLINT NOT NULL DEFAULT 0
                        CHECK (case_status BETWEEN 0 AND 4),
                    test_detail VARCHAR(2000),
                    attachments JSONB NOT NULL DEFAULT '[]'::jsonb
                        CHECK (jsonb_typeof(attachments) = 'array'),

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                    UNIQUE (job_id, case_id)
                );

                -- Close checks count unresolved results per job
                CREATE INDEX idx_job_cases_unresolved
                    ON job_cases(job_id)
                    WHERE case_status IN (0, 2, 3);

                CREATE TRIGGER update_job_cases_updated_at
                    BEFORE UPDATE ON job_cases
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
                DROP TRIGGER IF EXISTS update_job_cases_updated_at ON job_cases;
                DROP TABLE IF EXISTS job_cases CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
