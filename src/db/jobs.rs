//! PostgreSQL implementation of the job store.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::entity::job::{self, ActiveModel, Entity as Job};
use crate::entity::job_case::{self, Entity as JobCase};
use crate::entity::job_tester::{self, Entity as JobTester};
use crate::entity::{case, user};
use crate::error::{AppError, AppResult};
use crate::models::{CaseStatus, JobFieldFilter, JobFilter, JobQuery, JobStatus};

use super::{DbPool, like_pattern};
use super::job_store::{JobChanges, JobStore, LinkChanges, NewJob};

fn apply_filter(mut select: Select<Job>, filter: &JobFilter) -> Select<Job> {
    if let Some(ref no) = filter.task_no {
        select = select.filter(Expr::cust_with_values(
            "CAST(jobs.task_no AS TEXT) ILIKE $1",
            [like_pattern(no)],
        ));
    }
    if let Some(ref name) = filter.task_name {
        select = select.filter(Expr::cust_with_values(
            "jobs.task_name ILIKE $1",
            [like_pattern(name)],
        ));
    }
    for field in &filter.equals {
        select = match field {
            JobFieldFilter::Status(v) => select.filter(job::Column::Status.eq(*v)),
            JobFieldFilter::Level(v) => select.filter(job::Column::Level.eq(*v)),
            JobFieldFilter::JobType(v) => select.filter(job::Column::JobType.eq(*v)),
            JobFieldFilter::IsDelay(v) => select.filter(job::Column::IsDelay.eq(*v)),
            JobFieldFilter::Creator(v) => select.filter(job::Column::CreateUserId.eq(*v)),
            JobFieldFilter::Product(v) => select.filter(job::Column::Product.eq(v.clone())),
            JobFieldFilter::Frontend(v) => select.filter(job::Column::Frontend.eq(v.clone())),
            JobFieldFilter::Backend(v) => select.filter(job::Column::Backend.eq(v.clone())),
            JobFieldFilter::PrdNo(v) => select.filter(job::Column::PrdNo.eq(v.clone())),
        };
    }
    select
}

fn new_job_case(job_id: Uuid, case_id: Uuid) -> job_case::ActiveModel {
    let now = Utc::now();
    job_case::ActiveModel {
        id: Set(Uuid::now_v7()),
        job_id: Set(job_id),
        case_id: Set(case_id),
        case_status: Set(CaseStatus::Pending.code()),
        test_detail: Set(None),
        attachments: Set(serde_json::json!([])),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

fn new_job_tester(job_id: Uuid, tester_id: Uuid) -> job_tester::ActiveModel {
    job_tester::ActiveModel {
        id: Set(Uuid::now_v7()),
        job_id: Set(job_id),
        tester_id: Set(tester_id),
        created_at: Set(Utc::now()),
    }
}

/// Load a job row with `FOR UPDATE`.
async fn lock_job<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Option<job::Model>> {
    Job::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to lock job: {}", e)))
}

async fn write_job<C: ConnectionTrait>(
    conn: &C,
    job: job::Model,
    changes: JobChanges,
) -> AppResult<job::Model> {
    let mut active: ActiveModel = job.into();
    if let Some(v) = changes.status {
        active.status = Set(v.code());
    }
    if let Some(v) = changes.level {
        active.level = Set(v);
    }
    if let Some(v) = changes.job_type {
        active.job_type = Set(v);
    }
    if let Some(v) = changes.task_name {
        active.task_name = Set(v);
    }
    if let Some(v) = changes.task_detail {
        active.task_detail = Set(Some(v));
    }
    if let Some(v) = changes.product {
        active.product = Set(Some(v));
    }
    if let Some(v) = changes.frontend {
        active.frontend = Set(Some(v));
    }
    if let Some(v) = changes.backend {
        active.backend = Set(Some(v));
    }
    if let Some(v) = changes.prd_no {
        active.prd_no = Set(Some(v));
    }
    if let Some(v) = changes.expect_end_time {
        active.expect_end_time = Set(v);
    }
    if let Some(v) = changes.actual_end_time {
        active.actual_end_time = Set(Some(v));
    }
    if let Some(v) = changes.is_delay {
        active.is_delay = Set(v);
    }
    if let Some(v) = changes.is_active {
        active.is_active = Set(v);
    }
    active.updated_at = Set(Utc::now());

    active
        .update(conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to update job: {}", e)))
}

async fn write_link<C: ConnectionTrait>(
    conn: &C,
    link: job_case::Model,
    changes: LinkChanges,
) -> AppResult<job_case::Model> {
    let mut active: job_case::ActiveModel = link.into();
    if let Some(v) = changes.case_status {
        active.case_status = Set(v);
    }
    if let Some(v) = changes.test_detail {
        active.test_detail = Set(Some(v));
    }
    if let Some(ids) = changes.attachments {
        active.attachments = Set(serde_json::json!(ids));
    }
    active.updated_at = Set(Utc::now());

    active
        .update(conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to update job case: {}", e)))
}

#[async_trait]
impl JobStore for DbPool {
    async fn insert_job(
        &self,
        new_job: NewJob,
        tester_ids: &[Uuid],
        case_ids: &[Uuid],
    ) -> AppResult<job::Model> {
        let now = Utc::now();
        let id = Uuid::now_v7();

        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let model = ActiveModel {
            id: Set(id),
            task_no: Set(new_job.task_no),
            task_name: Set(new_job.task_name),
            task_detail: Set(new_job.task_detail),
            status: Set(new_job.status.code()),
            level: Set(new_job.level),
            job_type: Set(new_job.job_type),
            is_active: Set(true),
            create_user_id: Set(new_job.create_user_id),
            product: Set(new_job.product),
            frontend: Set(new_job.frontend),
            backend: Set(new_job.backend),
            prd_no: Set(new_job.prd_no),
            expect_end_time: Set(new_job.expect_end_time),
            actual_end_time: Set(None),
            is_delay: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Unique violations on task_no surface as Conflict
        let inserted = model.insert(&txn).await.map_err(AppError::from)?;

        for tester_id in tester_ids {
            new_job_tester(id, *tester_id)
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(format!("Failed to link tester: {}", e)))?;
        }

        for case_id in case_ids {
            new_job_case(id, *case_id)
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(format!("Failed to link case: {}", e)))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit job: {}", e)))?;

        Ok(inserted)
    }

    async fn get_job(&self, id: Uuid) -> AppResult<Option<job::Model>> {
        let result = Job::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job: {}", e)))?;

        Ok(result)
    }

    async fn update_job(&self, id: Uuid, changes: JobChanges) -> AppResult<job::Model> {
        let job = self
            .get_job(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;

        write_job(self.connection(), job, changes).await
    }

    async fn close_job(&self, id: Uuid, changes: JobChanges) -> AppResult<job::Model> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let job = lock_job(&txn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;

        let unresolved = JobCase::find()
            .filter(job_case::Column::JobId.eq(id))
            .filter(job_case::Column::CaseStatus.is_in(CaseStatus::unresolved_codes()))
            .count(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to count unresolved cases: {}", e)))?;
        if unresolved > 0 {
            // Dropping the transaction rolls it back
            return Err(AppError::IncompleteJob {
                job_id: id,
                unresolved,
            });
        }

        let closed = write_job(&txn, job, changes).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit close: {}", e)))?;

        Ok(closed)
    }

    async fn find_jobs(&self, ids: &[Uuid]) -> AppResult<Vec<job::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let result = Job::find()
            .filter(job::Column::Id.is_in(ids.to_vec()))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to find jobs: {}", e)))?;

        Ok(result)
    }

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let result = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.to_vec()))
            .filter(user::Column::IsActive.eq(true))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to find users: {}", e)))?;

        Ok(result)
    }

    async fn find_cases(&self, ids: &[Uuid]) -> AppResult<Vec<case::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let result = case::Entity::find()
            .filter(case::Column::Id.is_in(ids.to_vec()))
            .filter(case::Column::IsActive.eq(true))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to find cases: {}", e)))?;

        Ok(result)
    }

    async fn assign_testers(&self, job_ids: &[Uuid], tester_ids: &[Uuid]) -> AppResult<()> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        Job::update_many()
            .col_expr(job::Column::Status, Expr::value(JobStatus::Assigned.code()))
            .col_expr(job::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(job::Column::Id.is_in(job_ids.to_vec()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to mark jobs assigned: {}", e)))?;

        let existing: HashSet<(Uuid, Uuid)> = JobTester::find()
            .filter(job_tester::Column::JobId.is_in(job_ids.to_vec()))
            .filter(job_tester::Column::TesterId.is_in(tester_ids.to_vec()))
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to load job testers: {}", e)))?
            .into_iter()
            .map(|t| (t.job_id, t.tester_id))
            .collect();

        for job_id in job_ids {
            for tester_id in tester_ids {
                if existing.contains(&(*job_id, *tester_id)) {
                    continue;
                }
                new_job_tester(*job_id, *tester_id)
                    .insert(&txn)
                    .await
                    .map_err(|e| AppError::Database(format!("Failed to link tester: {}", e)))?;
            }
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit dispatch: {}", e)))?;

        Ok(())
    }

    async fn list_jobs(
        &self,
        query: &JobQuery,
        user_id: Option<Uuid>,
    ) -> AppResult<Vec<job::Model>> {
        let select = Job::find().filter(job::Column::IsActive.eq(true));

        let select = match (query, user_id) {
            (JobQuery::Unfinished, Some(user_id)) => {
                let codes: Vec<i16> = JobStatus::unfinished().iter().map(|s| s.code()).collect();
                select
                    .inner_join(JobTester)
                    .filter(job_tester::Column::TesterId.eq(user_id))
                    .filter(job::Column::Status.is_in(codes))
                    .order_by_asc(job::Column::ExpectEndTime)
            }
            (JobQuery::Finished, Some(user_id)) => select
                .inner_join(JobTester)
                .filter(job_tester::Column::TesterId.eq(user_id))
                .filter(job::Column::Status.eq(JobStatus::Closed.code()))
                .order_by_desc(job::Column::ActualEndTime),
            (JobQuery::Unfinished | JobQuery::Finished, None) => return Ok(Vec::new()),
            (JobQuery::Filter(filter), _) => {
                apply_filter(select, filter).order_by_asc(job::Column::ExpectEndTime)
            }
        };

        let result = select
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list jobs: {}", e)))?;

        Ok(result)
    }

    async fn get_tester_ids(&self, job_id: Uuid) -> AppResult<Vec<Uuid>> {
        let result = JobTester::find()
            .filter(job_tester::Column::JobId.eq(job_id))
            .order_by_asc(job_tester::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job testers: {}", e)))?;

        Ok(result.into_iter().map(|t| t.tester_id).collect())
    }

    async fn list_job_cases(&self, job_id: Uuid) -> AppResult<Vec<job_case::Model>> {
        let result = JobCase::find()
            .filter(job_case::Column::JobId.eq(job_id))
            .order_by_asc(job_case::Column::Id) // UUIDv7 is time-ordered
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list job cases: {}", e)))?;

        Ok(result)
    }

    async fn add_job_cases(
        &self,
        job_id: Uuid,
        case_ids: &[Uuid],
    ) -> AppResult<Vec<job_case::Model>> {
        let linked: HashSet<Uuid> = JobCase::find()
            .select_only()
            .column(job_case::Column::CaseId)
            .filter(job_case::Column::JobId.eq(job_id))
            .into_tuple::<Uuid>()
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to load linked cases: {}", e)))?
            .into_iter()
            .collect();

        let mut added = Vec::new();
        for case_id in case_ids.iter().filter(|id| !linked.contains(id)) {
            let link = new_job_case(job_id, *case_id)
                .insert(self.connection())
                .await
                .map_err(|e| AppError::Database(format!("Failed to link case: {}", e)))?;
            added.push(link);
        }

        Ok(added)
    }

    async fn get_job_case(&self, id: Uuid) -> AppResult<Option<job_case::Model>> {
        let result = JobCase::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job case: {}", e)))?;

        Ok(result)
    }

    async fn record_link_result(
        &self,
        id: Uuid,
        changes: LinkChanges,
    ) -> AppResult<(job_case::Model, bool)> {
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let link = JobCase::find_by_id(id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job case: {}", e)))?
            .ok_or(AppError::NoSuchLink(id))?;

        let mut advanced = false;
        if let Some(job) = lock_job(&txn, link.job_id).await?
            && job.status == JobStatus::Assigned.code()
        {
            write_job(&txn, job, JobChanges::status(JobStatus::InProgress)).await?;
            advanced = true;
        }

        let updated = write_link(&txn, link, changes).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit result: {}", e)))?;

        Ok((updated, advanced))
    }

    async fn delete_job_case(&self, id: Uuid) -> AppResult<Option<job_case::Model>> {
        let Some(link) = self.get_job_case(id).await? else {
            return Ok(None);
        };

        JobCase::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete job case: {}", e)))?;

        Ok(Some(link))
    }
}
