//! Job lifecycle rules.
//!
//! Status flow: `0 -> 2` on create-with-testers or dispatch, `2 -> 3` on the
//! first recorded result, `{2,3,5} -> 4` only once no linked case is
//! pending, blocked or failed. A closed job stays closed: it cannot be
//! dispatched or moved to another status. `is_active` (soft delete) is
//! independent of the status.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{JobChanges, JobStore, LinkChanges, NewJob};
use crate::entity::{job, job_case};
use crate::error::{AppError, AppResult, FieldError};
use crate::models::case::{check_optional, check_required};
use crate::models::job::{is_valid_level, is_valid_type};
use crate::models::{
    CaseStatus, CreateJobRequest, JobQuery, JobStatus, RecordResultRequest, UpdateJobRequest,
};

use super::attachments::{AttachmentService, stale_ids};
use super::storage::Storage;

/// Maximum length of a link's result detail.
const MAX_TEST_DETAIL: usize = 2000;

/// Job number derived from a timestamp: `YYYYMMDDhhmmssSSS`.
pub fn task_no_for(now: DateTime<Utc>) -> i64 {
    let date = i64::from(now.year()) * 10_000 + i64::from(now.month()) * 100 + i64::from(now.day());
    let time = i64::from(now.hour()) * 10_000 + i64::from(now.minute()) * 100 + i64::from(now.second());
    let millis = i64::from(now.timestamp_subsec_millis().min(999));
    (date * 1_000_000 + time) * 1_000 + millis
}

/// Remove duplicates, keeping first occurrences.
fn distinct(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Ids from `wanted` that are missing in `found`, rendered for an error message.
fn unresolved(wanted: &[Uuid], found: &HashSet<Uuid>) -> Option<String> {
    let missing: Vec<String> = wanted
        .iter()
        .filter(|id| !found.contains(id))
        .map(Uuid::to_string)
        .collect();
    (!missing.is_empty()).then(|| format!("unknown id(s): {}", missing.join(", ")))
}

fn check_level_and_type(errors: &mut Vec<FieldError>, level: Option<i16>, job_type: Option<i16>) {
    if let Some(level) = level
        && !is_valid_level(level)
    {
        errors.push(FieldError::new("level", "must be one of 1, 2, 3, 4"));
    }
    if let Some(job_type) = job_type
        && !is_valid_type(job_type)
    {
        errors.push(FieldError::new("type", "must be one of 1, 2, 3, 4"));
    }
}

fn check_descriptive_fields(
    errors: &mut Vec<FieldError>,
    product: Option<&str>,
    frontend: Option<&str>,
    backend: Option<&str>,
    prd_no: Option<&str>,
) {
    check_optional(errors, "product", product, 10);
    check_optional(errors, "frontend", frontend, 20);
    check_optional(errors, "backend", backend, 20);
    check_optional(errors, "prd_no", prd_no, 80);
}

/// Orchestrates job mutations and result recording.
pub struct JobService {
    store: Arc<dyn JobStore>,
    attachments: Arc<AttachmentService>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, attachments: Arc<AttachmentService>) -> Self {
        Self { store, attachments }
    }

    /// Create a job, linking testers and cases in the same transaction.
    ///
    /// A non-empty tester list puts the job straight into `assigned`.
    pub async fn create(
        &self,
        req: CreateJobRequest,
        creator: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<job::Model> {
        let mut errors = Vec::new();
        check_required(&mut errors, "task_name", req.task_name.as_deref(), 100);
        check_optional(&mut errors, "task_detail", req.task_detail.as_deref(), 500);
        if req.level.is_none() {
            errors.push(FieldError::new("level", "is required"));
        }
        if req.job_type.is_none() {
            errors.push(FieldError::new("type", "is required"));
        }
        check_level_and_type(&mut errors, req.level, req.job_type);
        if req.expect_end_time.is_none() {
            errors.push(FieldError::new("expect_end_time", "is required"));
        }
        if creator.is_none() {
            errors.push(FieldError::new("create_user", "is required"));
        }
        if let Some(no) = req.task_no
            && no <= 0
        {
            errors.push(FieldError::new("task_no", "must be a positive number"));
        }
        check_descriptive_fields(
            &mut errors,
            req.product.as_deref(),
            req.frontend.as_deref(),
            req.backend.as_deref(),
            req.prd_no.as_deref(),
        );

        let (
            Some(task_name),
            Some(level),
            Some(job_type),
            Some(expect_end_time),
            Some(creator),
            true,
        ) = (
            req.task_name,
            req.level,
            req.job_type,
            req.expect_end_time,
            creator,
            errors.is_empty(),
        )
        else {
            return Err(AppError::Validation(errors));
        };

        let testers = distinct(&req.executor);
        let cases = distinct(&req.case_ids);

        let mut users_wanted = testers.clone();
        if !users_wanted.contains(&creator) {
            users_wanted.push(creator);
        }
        let found_users: HashSet<Uuid> = self
            .store
            .find_users(&users_wanted)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        let found_cases: HashSet<Uuid> = self
            .store
            .find_cases(&cases)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        if !found_users.contains(&creator) {
            errors.push(FieldError::new("create_user", "does not exist"));
        }
        if let Some(message) = unresolved(&testers, &found_users) {
            errors.push(FieldError::new("executor", message));
        }
        if let Some(message) = unresolved(&cases, &found_cases) {
            errors.push(FieldError::new("case_ids", message));
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let status = if testers.is_empty() {
            JobStatus::New
        } else {
            JobStatus::Assigned
        };

        let new_job = NewJob {
            task_no: req.task_no.unwrap_or_else(|| task_no_for(now)),
            task_name: task_name.trim().to_string(),
            task_detail: req.task_detail,
            status,
            level,
            job_type,
            create_user_id: creator,
            product: req.product,
            frontend: req.frontend,
            backend: req.backend,
            prd_no: req.prd_no,
            expect_end_time,
        };

        let job = self.store.insert_job(new_job, &testers, &cases).await?;

        info!(
            job_id = %job.id,
            task_no = job.task_no,
            status = %status,
            testers = testers.len(),
            cases = cases.len(),
            "Job created"
        );

        Ok(job)
    }

    /// Apply a partial update. Returns the job and whether this update closed it.
    pub async fn update(
        &self,
        req: UpdateJobRequest,
        now: DateTime<Utc>,
    ) -> AppResult<(job::Model, bool)> {
        let mut errors = Vec::new();
        let status = match req.status {
            None => None,
            Some(code) => match JobStatus::from_code(code) {
                Some(status) => Some(status),
                None => {
                    errors.push(FieldError::new("status", "must be one of 0, 1, 2, 3, 4, 5"));
                    None
                }
            },
        };
        check_level_and_type(&mut errors, req.level, req.job_type);
        if req.task_name.is_some() {
            check_required(&mut errors, "task_name", req.task_name.as_deref(), 100);
        }
        check_optional(&mut errors, "task_detail", req.task_detail.as_deref(), 500);
        check_descriptive_fields(
            &mut errors,
            req.product.as_deref(),
            req.frontend.as_deref(),
            req.backend.as_deref(),
            req.prd_no.as_deref(),
        );
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let job = self
            .store
            .get_job(req.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", req.id)))?;

        let mut changes = JobChanges {
            status,
            level: req.level,
            job_type: req.job_type,
            task_name: req.task_name.map(|n| n.trim().to_string()),
            task_detail: req.task_detail,
            product: req.product,
            frontend: req.frontend,
            backend: req.backend,
            prd_no: req.prd_no,
            expect_end_time: req.expect_end_time,
            ..Default::default()
        };

        let already_closed = job.status == JobStatus::Closed.code();
        match status {
            Some(next) if already_closed && next != JobStatus::Closed => {
                warn!(job_id = %job.id, status = %next, "Rejected status change of closed job");
                return Err(AppError::field("status", "job is closed"));
            }
            // Keep the original closure time and delay flag
            Some(JobStatus::Closed) if already_closed => changes.status = None,
            _ => {}
        }

        let closing = changes.status == Some(JobStatus::Closed);
        let updated = if closing {
            changes.is_delay = Some(now > job.expect_end_time);
            changes.actual_end_time = Some(now);
            match self.store.close_job(job.id, changes).await {
                Err(AppError::IncompleteJob { job_id, unresolved }) => {
                    warn!(job_id = %job_id, unresolved, "Rejected close of job with unresolved cases");
                    return Err(AppError::IncompleteJob { job_id, unresolved });
                }
                result => result?,
            }
        } else {
            self.store.update_job(job.id, changes).await?
        };

        if closing {
            info!(job_id = %updated.id, is_delay = updated.is_delay, "Job closed");
        } else {
            info!(job_id = %updated.id, "Job updated");
        }

        Ok((updated, closing))
    }

    /// Mark a job inactive. Links and attachments are left in place.
    pub async fn soft_delete(&self, id: Uuid) -> AppResult<()> {
        if self.store.get_job(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Job {}", id)));
        }

        self.store
            .update_job(
                id,
                JobChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?;

        info!(job_id = %id, "Job deleted");
        Ok(())
    }

    /// Assign every resolved user to every resolved job.
    ///
    /// Closed jobs reject the whole batch. Returns the number of jobs and
    /// users that matched.
    pub async fn dispatch(&self, job_ids: &[Uuid], user_ids: &[Uuid]) -> AppResult<(usize, usize)> {
        let jobs = self.store.find_jobs(&distinct(job_ids)).await?;
        if jobs.is_empty() {
            warn!(requested = job_ids.len(), "Dispatch matched no jobs");
            return Err(AppError::NoSuchJobs);
        }

        let closed: Vec<String> = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Closed.code())
            .map(|j| j.id.to_string())
            .collect();
        if !closed.is_empty() {
            warn!(closed = closed.len(), "Rejected dispatch of closed jobs");
            return Err(AppError::field(
                "job_ids",
                format!("closed jobs cannot be dispatched: {}", closed.join(", ")),
            ));
        }

        let users = self.store.find_users(&distinct(user_ids)).await?;
        if users.is_empty() {
            warn!(requested = user_ids.len(), "Dispatch matched no users");
            return Err(AppError::NoSuchUsers);
        }

        let job_ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
        let user_ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        self.store.assign_testers(&job_ids, &user_ids).await?;

        info!(jobs = job_ids.len(), testers = user_ids.len(), "Jobs dispatched");
        Ok((job_ids.len(), user_ids.len()))
    }

    /// List jobs for the `conditions` parameter.
    pub async fn list(
        &self,
        conditions: Option<&str>,
        user: Option<Uuid>,
    ) -> AppResult<Vec<job::Model>> {
        let query = JobQuery::parse(conditions)?;
        if matches!(query, JobQuery::Unfinished | JobQuery::Finished) && user.is_none() {
            return Err(AppError::Unauthorized(
                "the unfinish/finish views need the requesting user".to_string(),
            ));
        }
        self.store.list_jobs(&query, user).await
    }

    /// A job together with its tester ids.
    pub async fn get(&self, id: Uuid) -> AppResult<(job::Model, Vec<Uuid>)> {
        let job = self
            .store
            .get_job(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;
        let testers = self.store.get_tester_ids(id).await?;
        Ok((job, testers))
    }

    pub async fn job_cases(&self, job_id: Uuid) -> AppResult<Vec<job_case::Model>> {
        if self.store.get_job(job_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Job {}", job_id)));
        }
        self.store.list_job_cases(job_id).await
    }

    /// Link more cases to a job; cases already linked are left alone.
    pub async fn add_cases(
        &self,
        job_id: Uuid,
        case_ids: &[Uuid],
    ) -> AppResult<Vec<job_case::Model>> {
        if self.store.get_job(job_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Job {}", job_id)));
        }

        let cases = distinct(case_ids);
        let found: HashSet<Uuid> = self
            .store
            .find_cases(&cases)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if let Some(message) = unresolved(&cases, &found) {
            return Err(AppError::field("case_ids", message));
        }

        let added = self.store.add_job_cases(job_id, &cases).await?;
        info!(job_id = %job_id, added = added.len(), "Cases added to job");
        Ok(added)
    }

    /// Delete a job-case link and purge the attachments it owned.
    pub async fn remove_case(&self, link_id: Uuid) -> AppResult<job_case::Model> {
        let link = self
            .store
            .delete_job_case(link_id)
            .await?
            .ok_or(AppError::NoSuchLink(link_id))?;

        self.attachments.purge_link(&link).await;

        info!(link_id = %link.id, job_id = %link.job_id, "Case removed from job");
        Ok(link)
    }

    /// Record a tester's result on a job-case link.
    ///
    /// Attachments the link no longer references are deleted, and the first
    /// result on an assigned job moves it to in-progress.
    pub async fn record_result(&self, req: RecordResultRequest) -> AppResult<job_case::Model> {
        let mut errors = Vec::new();
        if let Some(code) = req.case_status
            && CaseStatus::from_code(code).is_none()
        {
            errors.push(FieldError::new("case_status", "must be one of 0, 1, 2, 3, 4"));
        }
        check_optional(
            &mut errors,
            "test_detail",
            req.test_detail.as_deref(),
            MAX_TEST_DETAIL,
        );
        if let Some(ref explicit) = req.attachments {
            let malformed: Vec<&str> = explicit
                .iter()
                .filter(|id| !Storage::is_valid_attachment_id(id))
                .map(String::as_str)
                .collect();
            if !malformed.is_empty() {
                errors.push(FieldError::new(
                    "attachments",
                    format!("malformed attachment ids: {}", malformed.join(", ")),
                ));
            }
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let link = self
            .store
            .get_job_case(req.id)
            .await?
            .ok_or(AppError::NoSuchLink(req.id))?;

        let (attachments, stale) = if req.test_detail.is_some() || req.attachments.is_some() {
            let new_ids = match req.attachments {
                Some(ref explicit) => {
                    let mut ids: Vec<String> = Vec::new();
                    for id in explicit {
                        if !ids.contains(id) {
                            ids.push(id.clone());
                        }
                    }
                    ids
                }
                None => self
                    .attachments
                    .embedded_ids(req.test_detail.as_deref().unwrap_or_default()),
            };
            let stale = stale_ids(&self.attachments.owned_ids(&link), &new_ids);
            (Some(new_ids), stale)
        } else {
            (None, Vec::new())
        };

        let (updated, advanced) = self
            .store
            .record_link_result(
                link.id,
                LinkChanges {
                    case_status: req.case_status,
                    test_detail: req.test_detail,
                    attachments,
                },
            )
            .await?;
        if advanced {
            info!(job_id = %updated.job_id, "Job moved to in progress");
        }

        // Blobs go only once the link no longer references them
        if !stale.is_empty() {
            let calls = self.attachments.purge(&stale).await;
            info!(link_id = %updated.id, attachments = calls, "Purged replaced attachments");
        }

        info!(link_id = %updated.id, case_status = updated.case_status, "Result recorded");
        Ok(updated)
    }
}
