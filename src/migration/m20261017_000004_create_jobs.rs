//! Migration: Create jobs table.
//!
//! Status codes: 0 new, 1 ready, 2 assigned, 3 in progress, 4 closed, 5 other.

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
                CREATE TABLE jobs (
                    id UUID PRIMARY KEY,
                    task_no BIGINT NOT NULL CHECK (task_no > 0),
                    task_name VARCHAR(100) NOT NULL,
                    task_detail VARCHAR(500),
                    status SMALLINT NOT NULL DEFAULT 0
                        CHECK (status BETWEEN 0 AND 5),
                    level SMALLINT NOT NULL CHECK (level BETWEEN 1 AND 4),
                    type SMALLINT NOT NULL CHECK (type BETWEEN 1 AND 4),
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    create_user_id UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
                    product VARCHAR(10),
                    frontend VARCHAR(20),
                    backend VARCHAR(20),
                    prd_no VARCHAR(80),
                    expect_end_time TIMESTAMPTZ NOT NULL,
                    actual_end_time TIMESTAMPTZ,
                    is_delay BOOLEAN NOT NULL DEFAULT FALSE,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                    -- Closure is the only place actual_end_time is set
                    CHECK (status = 4 OR actual_end_time IS NULL)
                );

                CREATE UNIQUE INDEX idx_jobs_task_no ON jobs(task_no);

                CREATE INDEX idx_jobs_active_expect
                    ON jobs(expect_end_time)
                    WHERE is_active = TRUE;

                CREATE INDEX idx_jobs_status_active
                    ON jobs(status)
                    WHERE is_active = TRUE;

                CREATE TRIGGER update_jobs_updated_at
                    BEFORE UPDATE ON jobs
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
                DROP TRIGGER IF EXISTS update_jobs_updated_at ON jobs;
                DROP TABLE IF EXISTS jobs CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
