//! Storage seam for jobs and their case/tester links.
//!
//! The job lifecycle rules live in `services::jobs` and only talk to storage
//! through this trait; `DbPool` is the PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entity::{case, job, job_case, user};
use crate::error::AppResult;
use crate::models::{JobQuery, JobStatus};

/// A job row ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub task_no: i64,
    pub task_name: String,
    pub task_detail: Option<String>,
    pub status: JobStatus,
    pub level: i16,
    pub job_type: i16,
    pub create_user_id: Uuid,
    pub product: Option<String>,
    pub frontend: Option<String>,
    pub backend: Option<String>,
    pub prd_no: Option<String>,
    pub expect_end_time: DateTime<Utc>,
}

/// Partial update of a job row; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobChanges {
    pub status: Option<JobStatus>,
    pub level: Option<i16>,
    pub job_type: Option<i16>,
    pub task_name: Option<String>,
    pub task_detail: Option<String>,
    pub product: Option<String>,
    pub frontend: Option<String>,
    pub backend: Option<String>,
    pub prd_no: Option<String>,
    pub expect_end_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub is_delay: Option<bool>,
    pub is_active: Option<bool>,
}

impl JobChanges {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Apply the changes to an in-memory model.
    pub fn apply(self, job: &mut job::Model) {
        if let Some(v) = self.status {
            job.status = v.code();
        }
        if let Some(v) = self.level {
            job.level = v;
        }
        if let Some(v) = self.job_type {
            job.job_type = v;
        }
        if let Some(v) = self.task_name {
            job.task_name = v;
        }
        if let Some(v) = self.task_detail {
            job.task_detail = Some(v);
        }
        if let Some(v) = self.product {
            job.product = Some(v);
        }
        if let Some(v) = self.frontend {
            job.frontend = Some(v);
        }
        if let Some(v) = self.backend {
            job.backend = Some(v);
        }
        if let Some(v) = self.prd_no {
            job.prd_no = Some(v);
        }
        if let Some(v) = self.expect_end_time {
            job.expect_end_time = v;
        }
        if let Some(v) = self.actual_end_time {
            job.actual_end_time = Some(v);
        }
        if let Some(v) = self.is_delay {
            job.is_delay = v;
        }
        if let Some(v) = self.is_active {
            job.is_active = v;
        }
    }
}

/// Partial update of a job-to-case link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkChanges {
    pub case_status: Option<i16>,
    pub test_detail: Option<String>,
    pub attachments: Option<Vec<String>>,
}

/// Persistence operations the job controller relies on.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job with its tester and case links in one transaction.
    async fn insert_job(
        &self,
        job: NewJob,
        tester_ids: &[Uuid],
        case_ids: &[Uuid],
    ) -> AppResult<job::Model>;

    async fn get_job(&self, id: Uuid) -> AppResult<Option<job::Model>>;

    /// Apply a partial update. Fails with `NotFound` if the job is gone.
    async fn update_job(&self, id: Uuid, changes: JobChanges) -> AppResult<job::Model>;

    /// Close a job in one transaction: fail with `IncompleteJob` if any link
    /// is still unresolved, otherwise apply `changes`.
    async fn close_job(&self, id: Uuid, changes: JobChanges) -> AppResult<job::Model>;

    async fn find_jobs(&self, ids: &[Uuid]) -> AppResult<Vec<job::Model>>;

    /// Active users among `ids`.
    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<user::Model>>;

    /// Active cases among `ids`.
    async fn find_cases(&self, ids: &[Uuid]) -> AppResult<Vec<case::Model>>;

    /// Mark jobs assigned and add every tester to every job, in one transaction.
    /// Existing tester links are kept as they are.
    async fn assign_testers(&self, job_ids: &[Uuid], tester_ids: &[Uuid]) -> AppResult<()>;

    /// Active jobs matching the query. The named views need `user_id`.
    async fn list_jobs(&self, query: &JobQuery, user_id: Option<Uuid>)
    -> AppResult<Vec<job::Model>>;

    async fn get_tester_ids(&self, job_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn list_job_cases(&self, job_id: Uuid) -> AppResult<Vec<job_case::Model>>;

    /// Link cases that are not linked yet; returns the new links.
    async fn add_job_cases(
        &self,
        job_id: Uuid,
        case_ids: &[Uuid],
    ) -> AppResult<Vec<job_case::Model>>;

    async fn get_job_case(&self, id: Uuid) -> AppResult<Option<job_case::Model>>;

    /// Patch a link and move its job from assigned to in-progress, in one
    /// transaction. Returns the link and whether the job moved.
    async fn record_link_result(
        &self,
        id: Uuid,
        changes: LinkChanges,
    ) -> AppResult<(job_case::Model, bool)>;

    /// Delete a link and return the removed row.
    async fn delete_job_case(&self, id: Uuid) -> AppResult<Option<job_case::Model>>;
}
