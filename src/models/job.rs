//! Job domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{job, job_case};
use crate::error::{AppError, AppResult, FieldError};

/// Job lifecycle status, stored as a small integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Created, nobody assigned yet.
    New,
    /// Prepared but not assigned.
    Ready,
    /// Testers assigned, waiting for the first result.
    Assigned,
    /// At least one result recorded.
    InProgress,
    /// All linked cases resolved and the job was closed.
    Closed,
    Other,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        Self::New,
        Self::Ready,
        Self::Assigned,
        Self::InProgress,
        Self::Closed,
        Self::Other,
    ];

    pub fn code(&self) -> i16 {
        match self {
            Self::New => 0,
            Self::Ready => 1,
            Self::Assigned => 2,
            Self::InProgress => 3,
            Self::Closed => 4,
            Self::Other => 5,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Ready => "ready",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
            Self::Other => "other",
        }
    }

    /// Statuses listed under the "unfinish" view.
    pub fn unfinished() -> [JobStatus; 3] {
        [Self::Assigned, Self::InProgress, Self::Other]
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result status of a single case within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseStatus {
    Pending,
    Passed,
    Blocked,
    Failed,
    Skipped,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 5] = [
        Self::Pending,
        Self::Passed,
        Self::Blocked,
        Self::Failed,
        Self::Skipped,
    ];

    pub fn code(&self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Passed => 1,
            Self::Blocked => 2,
            Self::Failed => 3,
            Self::Skipped => 4,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// A job cannot be closed while any of its cases is in one of these states.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Pending | Self::Blocked | Self::Failed)
    }

    pub fn unresolved_codes() -> Vec<i16> {
        Self::ALL
            .into_iter()
            .filter(CaseStatus::is_unresolved)
            .map(|s| s.code())
            .collect()
    }
}

/// Job priority levels (1 = most urgent).
pub const JOB_LEVELS: [(i16, &str); 4] = [(1, "urgent"), (2, "high"), (3, "medium"), (4, "low")];

/// Job categories.
pub const JOB_TYPES: [(i16, &str); 4] = [
    (1, "feature"),
    (2, "regression"),
    (3, "hotfix"),
    (4, "other"),
];

pub fn is_valid_level(code: i16) -> bool {
    JOB_LEVELS.iter().any(|(c, _)| *c == code)
}

pub fn is_valid_type(code: i16) -> bool {
    JOB_TYPES.iter().any(|(c, _)| *c == code)
}

/// Request to create a job.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateJobRequest {
    /// Human-readable job number; generated when omitted.
    #[serde(default)]
    pub task_no: Option<i64>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub task_detail: Option<String>,
    #[serde(default)]
    pub level: Option<i16>,
    #[serde(default, rename = "type")]
    pub job_type: Option<i16>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub frontend: Option<String>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub prd_no: Option<String>,
    #[serde(default)]
    pub expect_end_time: Option<DateTime<Utc>>,
    /// Testers to assign at creation; a non-empty list makes the job "assigned".
    #[serde(default)]
    pub executor: Vec<Uuid>,
    /// Cases to link to the job.
    #[serde(default)]
    pub case_ids: Vec<Uuid>,
}

/// Partial update of a job. Setting `status` to 4 closes the job.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateJobRequest {
    pub id: Uuid,
    #[serde(default)]
    pub status: Option<i16>,
    #[serde(default)]
    pub level: Option<i16>,
    #[serde(default, rename = "type")]
    pub job_type: Option<i16>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub task_detail: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub frontend: Option<String>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub prd_no: Option<String>,
    #[serde(default)]
    pub expect_end_time: Option<DateTime<Utc>>,
}

/// Request body carrying only a record id.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IdRequest {
    pub id: Uuid,
}

/// Bulk assignment of testers to jobs.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DispatchRequest {
    /// User ids to add as testers.
    #[serde(default)]
    pub ids: Vec<Uuid>,
    #[serde(default)]
    pub job_ids: Vec<Uuid>,
}

/// Outcome of a dispatch: how many jobs and testers matched.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DispatchResponse {
    pub jobs: usize,
    pub testers: usize,
}

/// Query string of the job list endpoint.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListJobsQuery {
    /// `unfinish`, `finish`, or a JSON object of field filters.
    #[serde(default)]
    pub conditions: Option<String>,
}

/// Recording a result on a job-to-case link.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RecordResultRequest {
    /// Link id.
    pub id: Uuid,
    #[serde(default)]
    pub case_status: Option<i16>,
    /// HTML detail; may embed `<img src="{base}{attachment id}">`.
    #[serde(default)]
    pub test_detail: Option<String>,
    /// Explicit attachment id list; derived from `test_detail` when omitted.
    #[serde(default)]
    pub attachments: Option<Vec<String>>,
}

/// Cases to add to an existing job.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddCasesRequest {
    pub case_ids: Vec<Uuid>,
}

/// Job representation returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub task_no: i64,
    pub task_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_detail: Option<String>,
    pub status: i16,
    pub level: i16,
    #[serde(rename = "type")]
    pub job_type: i16,
    pub is_active: bool,
    pub create_user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prd_no: Option<String>,
    pub expect_end_time: DateTime<Utc>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub is_delay: bool,
    /// Tester user ids; only filled on single-job responses.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub executor: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<job::Model> for JobResponse {
    fn from(j: job::Model) -> Self {
        Self {
            id: j.id,
            task_no: j.task_no,
            task_name: j.task_name,
            task_detail: j.task_detail,
            status: j.status,
            level: j.level,
            job_type: j.job_type,
            is_active: j.is_active,
            create_user_id: j.create_user_id,
            product: j.product,
            frontend: j.frontend,
            backend: j.backend,
            prd_no: j.prd_no,
            expect_end_time: j.expect_end_time,
            actual_end_time: j.actual_end_time,
            is_delay: j.is_delay,
            executor: Vec::new(),
            created_at: j.created_at,
            updated_at: j.updated_at,
        }
    }
}

impl JobResponse {
    pub fn with_testers(mut self, testers: Vec<Uuid>) -> Self {
        self.executor = testers;
        self
    }
}

/// Job-to-case link representation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobCaseResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    pub case_id: Uuid,
    pub case_status: i16,
    pub test_detail: Option<String>,
    pub attachments: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<job_case::Model> for JobCaseResponse {
    fn from(link: job_case::Model) -> Self {
        let attachments = link.attachment_ids();
        Self {
            id: link.id,
            job_id: link.job_id,
            case_id: link.case_id,
            case_status: link.case_status,
            test_detail: link.test_detail,
            attachments,
            updated_at: link.updated_at,
        }
    }
}

// ============================================================================
// List filters
// ============================================================================

/// Equality filter on one whitelisted job column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFieldFilter {
    Status(i16),
    Level(i16),
    JobType(i16),
    IsDelay(bool),
    Creator(Uuid),
    Product(String),
    Frontend(String),
    Backend(String),
    PrdNo(String),
}

/// Field filters of the JSON condition mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Case-insensitive substring of the job number.
    pub task_no: Option<String>,
    /// Case-insensitive substring of the job name.
    pub task_name: Option<String>,
    pub equals: Vec<JobFieldFilter>,
}

/// Parsed `conditions` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobQuery {
    /// Jobs assigned to the requesting user that still need work.
    Unfinished,
    /// Jobs assigned to the requesting user that are closed.
    Finished,
    Filter(JobFilter),
}

impl JobQuery {
    /// Parse the `conditions` parameter. A missing or blank value lists every active job.
    pub fn parse(conditions: Option<&str>) -> AppResult<Self> {
        let raw = match conditions.map(str::trim) {
            None | Some("") => return Ok(Self::Filter(JobFilter::default())),
            Some("unfinish") => return Ok(Self::Unfinished),
            Some("finish") => return Ok(Self::Finished),
            Some(raw) => raw,
        };

        let value: JsonValue = serde_json::from_str(raw)?;
        let JsonValue::Object(map) = value else {
            return Err(AppError::InvalidInput(
                "conditions must be 'unfinish', 'finish' or a JSON object".to_string(),
            ));
        };

        let mut filter = JobFilter::default();
        let mut errors = Vec::new();

        for (key, value) in map {
            // Blank values would over-constrain the query
            if value.is_null() || value.as_str() == Some("") {
                continue;
            }

            let parsed = match key.as_str() {
                "task_no" => scalar_text(&value).map(|v| {
                    filter.task_no = Some(v);
                    None
                }),
                "task_name" => scalar_text(&value).map(|v| {
                    filter.task_name = Some(v);
                    None
                }),
                "status" => small_int(&value).map(|v| Some(JobFieldFilter::Status(v))),
                "level" => small_int(&value).map(|v| Some(JobFieldFilter::Level(v))),
                "type" => small_int(&value).map(|v| Some(JobFieldFilter::JobType(v))),
                "is_delay" => boolean(&value).map(|v| Some(JobFieldFilter::IsDelay(v))),
                "create_user" | "create_user_id" => {
                    uuid_value(&value).map(|v| Some(JobFieldFilter::Creator(v)))
                }
                "product" => text(&value).map(|v| Some(JobFieldFilter::Product(v))),
                "frontend" => text(&value).map(|v| Some(JobFieldFilter::Frontend(v))),
                "backend" => text(&value).map(|v| Some(JobFieldFilter::Backend(v))),
                "prd_no" => text(&value).map(|v| Some(JobFieldFilter::PrdNo(v))),
                _ => Err("is not a filterable field"),
            };

            match parsed {
                Ok(Some(f)) => filter.equals.push(f),
                Ok(None) => {}
                Err(message) => errors.push(FieldError::new(key, message)),
            }
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(Self::Filter(filter))
    }
}

fn scalar_text(value: &JsonValue) -> Result<String, &'static str> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        _ => Err("must be a string or number"),
    }
}

fn text(value: &JsonValue) -> Result<String, &'static str> {
    value
        .as_str()
        .map(String::from)
        .ok_or("must be a string")
}

fn small_int(value: &JsonValue) -> Result<i16, &'static str> {
    let n = match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    n.and_then(|n| i16::try_from(n).ok())
        .ok_or("must be an integer code")
}

fn boolean(value: &JsonValue) -> Result<bool, &'static str> {
    match value {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err("must be a boolean"),
    }
}

fn uuid_value(value: &JsonValue) -> Result<Uuid, &'static str> {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or("must be a UUID")
}
