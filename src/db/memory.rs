//! In-memory job store for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::entity::{case, job, job_case, job_tester, user};
use crate::error::{AppError, AppResult};
use crate::models::{CaseStatus, JobFieldFilter, JobFilter, JobQuery, JobStatus};

use super::job_store::{JobChanges, JobStore, LinkChanges, NewJob};

#[derive(Default)]
struct Tables {
    users: Vec<user::Model>,
    cases: Vec<case::Model>,
    jobs: Vec<job::Model>,
    testers: Vec<job_tester::Model>,
    links: Vec<job_case::Model>,
}

/// Job store backed by vectors. Counts writes so tests can assert none happened.
///
/// Mirrors the `jobs` CHECK constraint: a job with `actual_end_time` set
/// must stay closed.
#[derive(Default)]
pub struct MemoryJobStore {
    tables: Mutex<Tables>,
    writes: AtomicUsize,
    fail_link_writes: AtomicBool,
}

fn check_job_row(job: &job::Model) -> AppResult<()> {
    if job.status != JobStatus::Closed.code() && job.actual_end_time.is_some() {
        return Err(AppError::Database(format!(
            "new row for job {} violates check constraint \"jobs_check\"",
            job.id
        )));
    }
    Ok(())
}

fn field_matches(field: &JobFieldFilter, job: &job::Model) -> bool {
    match field {
        JobFieldFilter::Status(v) => job.status == *v,
        JobFieldFilter::Level(v) => job.level == *v,
        JobFieldFilter::JobType(v) => job.job_type == *v,
        JobFieldFilter::IsDelay(v) => job.is_delay == *v,
        JobFieldFilter::Creator(v) => job.create_user_id == *v,
        JobFieldFilter::Product(v) => job.product.as_deref() == Some(v.as_str()),
        JobFieldFilter::Frontend(v) => job.frontend.as_deref() == Some(v.as_str()),
        JobFieldFilter::Backend(v) => job.backend.as_deref() == Some(v.as_str()),
        JobFieldFilter::PrdNo(v) => job.prd_no.as_deref() == Some(v.as_str()),
    }
}

/// Same semantics as the ILIKE and equality clauses of the SQL filter.
fn filter_matches(filter: &JobFilter, job: &job::Model) -> bool {
    let contains = |haystack: &str, needle: &str| {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    };
    if let Some(ref no) = filter.task_no
        && !contains(&job.task_no.to_string(), no)
    {
        return false;
    }
    if let Some(ref name) = filter.task_name
        && !contains(&job.task_name, name)
    {
        return false;
    }
    filter.equals.iter().all(|f| field_matches(f, job))
}

fn apply_link_changes(link: &mut job_case::Model, changes: LinkChanges) {
    if let Some(v) = changes.case_status {
        link.case_status = v;
    }
    if let Some(v) = changes.test_detail {
        link.test_detail = Some(v);
    }
    if let Some(ids) = changes.attachments {
        link.attachments = serde_json::json!(ids);
    }
    link.updated_at = Utc::now();
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every later link write fail as a database error would.
    pub fn fail_link_writes(&self) {
        self.fail_link_writes.store(true, Ordering::SeqCst);
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_user(&self, username: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::now_v7();
        self.tables.lock().unwrap().users.push(user::Model {
            id,
            username: username.to_string(),
            nickname: None,
            email: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn add_case(&self, no: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::now_v7();
        self.tables.lock().unwrap().cases.push(case::Model {
            id,
            no: no.to_string(),
            name: format!("case {}", no),
            priority: 2,
            is_active: true,
            is_auto: false,
            version: None,
            code_time: None,
            case_type: None,
            author: "qa".to_string(),
            module_id: Uuid::now_v7(),
            creator_id: None,
            reviser_id: None,
            description: None,
            step: None,
            expectation: None,
            path: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn job(&self, id: Uuid) -> Option<job::Model> {
        let tables = self.tables.lock().unwrap();
        tables.jobs.iter().find(|j| j.id == id).cloned()
    }

    pub fn link(&self, id: Uuid) -> Option<job_case::Model> {
        let tables = self.tables.lock().unwrap();
        tables.links.iter().find(|l| l.id == id).cloned()
    }

    pub fn links_of(&self, job_id: Uuid) -> Vec<job_case::Model> {
        let tables = self.tables.lock().unwrap();
        tables.links.iter().filter(|l| l.job_id == job_id).cloned().collect()
    }

    /// Overwrite a link directly, bypassing the controller.
    pub fn set_link(&self, link: job_case::Model) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables.links.iter_mut().find(|l| l.id == link.id) {
            *existing = link;
        }
    }

    fn new_link(job_id: Uuid, case_id: Uuid) -> job_case::Model {
        let now = Utc::now();
        job_case::Model {
            id: Uuid::now_v7(),
            job_id,
            case_id,
            case_status: CaseStatus::Pending.code(),
            test_detail: None,
            attachments: serde_json::json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    fn new_tester(job_id: Uuid, tester_id: Uuid) -> job_tester::Model {
        job_tester::Model {
            id: Uuid::now_v7(),
            job_id,
            tester_id,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_job(
        &self,
        new_job: NewJob,
        tester_ids: &[Uuid],
        case_ids: &[Uuid],
    ) -> AppResult<job::Model> {
        let mut tables = self.tables.lock().unwrap();
        if tables.jobs.iter().any(|j| j.task_no == new_job.task_no) {
            return Err(AppError::Conflict(format!(
                "task_no {} already exists",
                new_job.task_no
            )));
        }

        let now = Utc::now();
        let model = job::Model {
            id: Uuid::now_v7(),
            task_no: new_job.task_no,
            task_name: new_job.task_name,
            task_detail: new_job.task_detail,
            status: new_job.status.code(),
            level: new_job.level,
            job_type: new_job.job_type,
            is_active: true,
            create_user_id: new_job.create_user_id,
            product: new_job.product,
            frontend: new_job.frontend,
            backend: new_job.backend,
            prd_no: new_job.prd_no,
            expect_end_time: new_job.expect_end_time,
            actual_end_time: None,
            is_delay: false,
            created_at: now,
            updated_at: now,
        };

        tables.jobs.push(model.clone());
        for tester_id in tester_ids {
            tables.testers.push(Self::new_tester(model.id, *tester_id));
        }
        for case_id in case_ids {
            tables.links.push(Self::new_link(model.id, *case_id));
        }
        self.wrote();

        Ok(model)
    }

    async fn get_job(&self, id: Uuid) -> AppResult<Option<job::Model>> {
        Ok(self.job(id))
    }

    async fn update_job(&self, id: Uuid, changes: JobChanges) -> AppResult<job::Model> {
        let mut tables = self.tables.lock().unwrap();
        let job = tables
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;
        let mut staged = job.clone();
        changes.apply(&mut staged);
        staged.updated_at = Utc::now();
        check_job_row(&staged)?;
        *job = staged.clone();
        self.wrote();
        Ok(staged)
    }

    async fn close_job(&self, id: Uuid, changes: JobChanges) -> AppResult<job::Model> {
        let unresolved_codes = CaseStatus::unresolved_codes();
        let mut tables = self.tables.lock().unwrap();
        let unresolved = tables
            .links
            .iter()
            .filter(|l| l.job_id == id && unresolved_codes.contains(&l.case_status))
            .count() as u64;
        let job = tables
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;
        if unresolved > 0 {
            return Err(AppError::IncompleteJob {
                job_id: id,
                unresolved,
            });
        }
        let mut staged = job.clone();
        changes.apply(&mut staged);
        staged.updated_at = Utc::now();
        check_job_row(&staged)?;
        *job = staged.clone();
        self.wrote();
        Ok(staged)
    }

    async fn find_jobs(&self, ids: &[Uuid]) -> AppResult<Vec<job::Model>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.jobs.iter().filter(|j| ids.contains(&j.id)).cloned().collect())
    }

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<user::Model>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .filter(|u| u.is_active && ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_cases(&self, ids: &[Uuid]) -> AppResult<Vec<case::Model>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .cases
            .iter()
            .filter(|c| c.is_active && ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn assign_testers(&self, job_ids: &[Uuid], tester_ids: &[Uuid]) -> AppResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let mut staged: Vec<job::Model> = tables
            .jobs
            .iter()
            .filter(|j| job_ids.contains(&j.id))
            .cloned()
            .collect();
        for job in &mut staged {
            job.status = JobStatus::Assigned.code();
            job.updated_at = Utc::now();
            check_job_row(job)?;
        }
        for job in staged {
            if let Some(existing) = tables.jobs.iter_mut().find(|j| j.id == job.id) {
                *existing = job;
            }
        }
        for job_id in job_ids {
            for tester_id in tester_ids {
                let exists = tables
                    .testers
                    .iter()
                    .any(|t| t.job_id == *job_id && t.tester_id == *tester_id);
                if !exists {
                    tables.testers.push(Self::new_tester(*job_id, *tester_id));
                }
            }
        }
        self.wrote();
        Ok(())
    }

    async fn list_jobs(
        &self,
        query: &JobQuery,
        user_id: Option<Uuid>,
    ) -> AppResult<Vec<job::Model>> {
        let tables = self.tables.lock().unwrap();
        let is_tester = |job_id: Uuid| {
            user_id.is_some_and(|u| {
                tables
                    .testers
                    .iter()
                    .any(|t| t.job_id == job_id && t.tester_id == u)
            })
        };

        let mut jobs: Vec<job::Model> = tables
            .jobs
            .iter()
            .filter(|j| j.is_active)
            .filter(|j| match query {
                JobQuery::Unfinished => {
                    is_tester(j.id)
                        && JobStatus::unfinished().iter().any(|s| s.code() == j.status)
                }
                JobQuery::Finished => is_tester(j.id) && j.status == JobStatus::Closed.code(),
                JobQuery::Filter(filter) => filter_matches(filter, j),
            })
            .cloned()
            .collect();

        match query {
            JobQuery::Finished => jobs.sort_by(|a, b| b.actual_end_time.cmp(&a.actual_end_time)),
            _ => jobs.sort_by_key(|j| j.expect_end_time),
        }

        Ok(jobs)
    }

    async fn get_tester_ids(&self, job_id: Uuid) -> AppResult<Vec<Uuid>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .testers
            .iter()
            .filter(|t| t.job_id == job_id)
            .map(|t| t.tester_id)
            .collect())
    }

    async fn list_job_cases(&self, job_id: Uuid) -> AppResult<Vec<job_case::Model>> {
        Ok(self.links_of(job_id))
    }

    async fn add_job_cases(
        &self,
        job_id: Uuid,
        case_ids: &[Uuid],
    ) -> AppResult<Vec<job_case::Model>> {
        let mut tables = self.tables.lock().unwrap();
        let mut added = Vec::new();
        for case_id in case_ids {
            let linked = tables
                .links
                .iter()
                .any(|l| l.job_id == job_id && l.case_id == *case_id);
            if !linked {
                let link = Self::new_link(job_id, *case_id);
                tables.links.push(link.clone());
                added.push(link);
            }
        }
        self.wrote();
        Ok(added)
    }

    async fn get_job_case(&self, id: Uuid) -> AppResult<Option<job_case::Model>> {
        Ok(self.link(id))
    }

    async fn record_link_result(
        &self,
        id: Uuid,
        changes: LinkChanges,
    ) -> AppResult<(job_case::Model, bool)> {
        let mut tables = self.tables.lock().unwrap();
        let mut link = tables
            .links
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(AppError::NoSuchLink(id))?;

        let mut advanced_job = tables
            .jobs
            .iter()
            .find(|j| j.id == link.job_id && j.status == JobStatus::Assigned.code())
            .cloned();
        if let Some(ref mut job) = advanced_job {
            job.status = JobStatus::InProgress.code();
            job.updated_at = Utc::now();
            check_job_row(job)?;
        }

        if self.fail_link_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(format!("Failed to update job case {}", id)));
        }
        apply_link_changes(&mut link, changes);

        let advanced = advanced_job.is_some();
        if let Some(job) = advanced_job
            && let Some(existing) = tables.jobs.iter_mut().find(|j| j.id == job.id)
        {
            *existing = job;
        }
        if let Some(existing) = tables.links.iter_mut().find(|l| l.id == id) {
            *existing = link.clone();
        }
        self.wrote();
        Ok((link, advanced))
    }

    async fn delete_job_case(&self, id: Uuid) -> AppResult<Option<job_case::Model>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(pos) = tables.links.iter().position(|l| l.id == id) else {
            return Ok(None);
        };
        self.wrote();
        Ok(Some(tables.links.remove(pos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(task_no: i64, task_name: &str) -> job::Model {
        let now = Utc::now();
        job::Model {
            id: Uuid::now_v7(),
            task_no,
            task_name: task_name.to_string(),
            task_detail: None,
            status: JobStatus::New.code(),
            level: 2,
            job_type: 1,
            is_active: true,
            create_user_id: Uuid::now_v7(),
            product: Some("web".to_string()),
            frontend: None,
            backend: None,
            prd_no: None,
            expect_end_time: now,
            actual_end_time: None,
            is_delay: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_substring_is_case_insensitive() {
        let filter = JobFilter {
            task_no: Some("0417".to_string()),
            task_name: Some("LOGIN".to_string()),
            equals: vec![JobFieldFilter::Product("web".to_string())],
        };
        assert!(filter_matches(&filter, &sample_job(202404170001, "Login regression")));
        assert!(!filter_matches(&filter, &sample_job(202404180001, "Login regression")));
        assert!(!filter_matches(&filter, &sample_job(202404170001, "Checkout")));
    }

    #[test]
    fn test_row_check_keeps_ended_jobs_closed() {
        let mut job = sample_job(1, "closed");
        job.status = JobStatus::Closed.code();
        job.actual_end_time = Some(Utc::now());
        assert!(check_job_row(&job).is_ok());

        job.status = JobStatus::Assigned.code();
        assert!(matches!(check_job_row(&job), Err(AppError::Database(_))));
    }

    #[actix_rt::test]
    async fn test_ended_job_rejects_other_status_writes() {
        let store = MemoryJobStore::new();
        let creator = store.add_user("lead");
        let job = store
            .insert_job(
                NewJob {
                    task_no: 1,
                    task_name: "closed".to_string(),
                    task_detail: None,
                    status: JobStatus::New,
                    level: 2,
                    job_type: 1,
                    create_user_id: creator,
                    product: None,
                    frontend: None,
                    backend: None,
                    prd_no: None,
                    expect_end_time: Utc::now(),
                },
                &[],
                &[],
            )
            .await
            .unwrap();
        store
            .close_job(
                job.id,
                JobChanges {
                    status: Some(JobStatus::Closed),
                    actual_end_time: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let tester = store.add_user("alice");
        assert!(matches!(
            store.assign_testers(&[job.id], &[tester]).await,
            Err(AppError::Database(_))
        ));
        assert!(matches!(
            store
                .update_job(job.id, JobChanges::status(JobStatus::InProgress))
                .await,
            Err(AppError::Database(_))
        ));
        assert_eq!(store.job(job.id).unwrap().status, JobStatus::Closed.code());
        assert!(store.get_tester_ids(job.id).await.unwrap().is_empty());
    }
}
