//! Domain models and DTOs for the test platform.

use serde::Serialize;

pub mod attachment;
pub mod case;
pub mod constants;
pub mod job;
pub mod user;

// Re-export commonly used types
pub use attachment::AttachmentResponse;
pub use case::{
    CaseResponse, CaseSummary, CreateCaseRequest, CreateModuleRequest, DEFAULT_CASE_PRIORITY,
    ListCasesQuery, ModuleNode, ModuleResponse, ModuleTreeQuery, UpdateCaseRequest,
    UpdateModuleRequest,
};
pub use constants::{CaseConstants, ConstantItem, JobConstants};
pub use job::{
    AddCasesRequest, CaseStatus, CreateJobRequest, DispatchRequest, DispatchResponse, IdRequest,
    JobCaseResponse, JobFieldFilter, JobFilter, JobQuery, JobResponse, JobStatus, ListJobsQuery,
    RecordResultRequest, UpdateJobRequest,
};
pub use user::{CreateUserRequest, UserResponse};

/// Envelope for successful responses: a human-readable message plus the payload.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> MessageResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

impl MessageResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}
