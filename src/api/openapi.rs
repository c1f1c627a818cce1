//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Test Platform Server",
        version = "0.1.0",
        description = "Test management API: case library, test jobs with tester assignment, per-case results and result attachments"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Job endpoints
        api::jobs::create_job,
        api::jobs::update_job,
        api::jobs::delete_job,
        api::jobs::list_jobs,
        api::jobs::get_job,
        api::jobs::dispatch_jobs,
        api::jobs::list_job_cases,
        api::jobs::add_job_cases,
        api::jobs::remove_job_case,
        api::jobs::record_result,
        // Module endpoints
        api::modules::list_modules,
        api::modules::module_tree,
        api::modules::create_module,
        api::modules::update_module,
        api::modules::delete_module,
        // Case endpoints
        api::cases::list_cases,
        api::cases::get_case,
        api::cases::create_case,
        api::cases::update_case,
        api::cases::delete_case,
        // User endpoints
        api::users::list_users,
        api::users::create_user,
        // Attachment endpoints
        api::attachments::upload_attachment,
        api::attachments::serve_attachment,
        // Constants
        api::constants::get_constants,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            error::FieldError,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Jobs
            models::CreateJobRequest,
            models::UpdateJobRequest,
            models::IdRequest,
            models::DispatchRequest,
            models::DispatchResponse,
            models::ListJobsQuery,
            models::AddCasesRequest,
            models::RecordResultRequest,
            models::JobResponse,
            models::JobCaseResponse,
            // Modules and cases
            models::CreateModuleRequest,
            models::UpdateModuleRequest,
            models::ModuleResponse,
            models::ModuleNode,
            models::ModuleTreeQuery,
            models::CreateCaseRequest,
            models::UpdateCaseRequest,
            models::ListCasesQuery,
            models::CaseSummary,
            models::CaseResponse,
            // Users
            models::CreateUserRequest,
            models::UserResponse,
            // Attachments
            models::AttachmentResponse,
            // Constants
            models::ConstantItem,
            models::JobConstants,
            models::CaseConstants,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Jobs", description = "Test jobs, tester assignment and per-case results"),
        (name = "Modules", description = "Case folders"),
        (name = "Cases", description = "Test case library"),
        (name = "Users", description = "User directory"),
        (name = "Attachments", description = "Result screenshots"),
        (name = "Constants", description = "Code tables for clients")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add the requesting-user header scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new(
                            crate::config::USER_ID_HEADER,
                        ),
                    ),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_job_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/jobs"));
        assert!(doc.paths.paths.contains_key("/api/v1/jobs/dispatch"));
        assert!(doc.paths.paths.contains_key("/api/v1/jobs/result"));
    }
}
