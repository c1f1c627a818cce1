//! Job API handlers.
//!
//! Successful responses use the `{message, data}` envelope.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::models::{
    AddCasesRequest, CreateJobRequest, DispatchRequest, DispatchResponse, IdRequest,
    JobCaseResponse, JobResponse, ListJobsQuery, MessageResponse, RecordResultRequest,
    UpdateJobRequest,
};
use crate::services::JobService;

/// Create a job.
///
/// Testers listed in `executor` are assigned immediately, which puts the job
/// in status 2; otherwise it starts at 0.
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "Jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created; the job is in `data`", body = JobResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
    ),
    security(
        ("user_id" = [])
    )
)]
pub async fn create_job(
    service: web::Data<JobService>,
    user: Option<CurrentUser>,
    body: web::Json<CreateJobRequest>,
) -> AppResult<HttpResponse> {
    let job = service
        .create(body.into_inner(), user.map(|u| u.id), Utc::now())
        .await?;
    let testers = service.get(job.id).await?.1;

    Ok(HttpResponse::Created().json(MessageResponse::new(
        "Job created",
        JobResponse::from(job).with_testers(testers),
    )))
}

/// Partially update a job. Setting `status` to 4 closes it.
#[utoipa::path(
    put,
    path = "/api/v1/jobs",
    tag = "Jobs",
    request_body = UpdateJobRequest,
    responses(
        (status = 200, description = "Job updated or closed", body = JobResponse),
        (status = 400, description = "Unknown job, invalid codes or unresolved cases", body = crate::error::ErrorResponse),
    )
)]
pub async fn update_job(
    service: web::Data<JobService>,
    body: web::Json<UpdateJobRequest>,
) -> AppResult<HttpResponse> {
    let (job, closed) = service.update(body.into_inner(), Utc::now()).await?;
    let message = if closed { "Job closed" } else { "Job updated" };

    Ok(HttpResponse::Ok().json(MessageResponse::new(message, JobResponse::from(job))))
}

/// Soft delete a job.
#[utoipa::path(
    delete,
    path = "/api/v1/jobs",
    tag = "Jobs",
    request_body = IdRequest,
    responses(
        (status = 200, description = "Job deleted"),
        (status = 400, description = "Job not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_job(
    service: web::Data<JobService>,
    body: web::Json<IdRequest>,
) -> AppResult<HttpResponse> {
    service.soft_delete(body.id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::message("Job deleted")))
}

/// List jobs.
///
/// `conditions=unfinish` and `conditions=finish` list the caller's own open
/// and closed jobs. Any other value is a JSON object of field filters.
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "Jobs",
    params(
        ("conditions" = Option<String>, Query, description = "`unfinish`, `finish` or a JSON filter object")
    ),
    responses(
        (status = 200, description = "Matching jobs in `data`", body = Vec<JobResponse>),
        (status = 400, description = "Malformed filter", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing user for a personal view", body = crate::error::ErrorResponse),
    ),
    security(
        (),
        ("user_id" = [])
    )
)]
pub async fn list_jobs(
    service: web::Data<JobService>,
    user: Option<CurrentUser>,
    query: web::Query<ListJobsQuery>,
) -> AppResult<HttpResponse> {
    let jobs = service
        .list(query.conditions.as_deref(), user.map(|u| u.id))
        .await?;
    let data: Vec<JobResponse> = jobs.into_iter().map(JobResponse::from).collect();

    Ok(HttpResponse::Ok().json(MessageResponse::new("OK", data)))
}

/// Get a job with its testers.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job in `data`", body = JobResponse),
        (status = 400, description = "Job not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_job(
    service: web::Data<JobService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let (job, testers) = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "OK",
        JobResponse::from(job).with_testers(testers),
    )))
}

/// Assign users to jobs.
#[utoipa::path(
    put,
    path = "/api/v1/jobs/dispatch",
    tag = "Jobs",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Jobs dispatched", body = DispatchResponse),
        (status = 400, description = "No matching jobs or users", body = crate::error::ErrorResponse),
    )
)]
pub async fn dispatch_jobs(
    service: web::Data<JobService>,
    body: web::Json<DispatchRequest>,
) -> AppResult<HttpResponse> {
    let (jobs, testers) = service.dispatch(&body.job_ids, &body.ids).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Jobs dispatched",
        DispatchResponse { jobs, testers },
    )))
}

/// List the case links of a job.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/cases",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Links in `data`", body = Vec<JobCaseResponse>),
        (status = 400, description = "Job not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_job_cases(
    service: web::Data<JobService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let links = service.job_cases(path.into_inner()).await?;
    let data: Vec<JobCaseResponse> = links.into_iter().map(JobCaseResponse::from).collect();
    Ok(HttpResponse::Ok().json(MessageResponse::new("OK", data)))
}

/// Link more cases to a job.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/cases",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    request_body = AddCasesRequest,
    responses(
        (status = 201, description = "New links in `data`", body = Vec<JobCaseResponse>),
        (status = 400, description = "Unknown job or cases", body = crate::error::ErrorResponse),
    )
)]
pub async fn add_job_cases(
    service: web::Data<JobService>,
    path: web::Path<Uuid>,
    body: web::Json<AddCasesRequest>,
) -> AppResult<HttpResponse> {
    let added = service.add_cases(path.into_inner(), &body.case_ids).await?;
    let data: Vec<JobCaseResponse> = added.into_iter().map(JobCaseResponse::from).collect();
    Ok(HttpResponse::Created().json(MessageResponse::new("Cases added", data)))
}

/// Remove a case from a job. Attachments owned by the link are deleted.
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/cases",
    tag = "Jobs",
    request_body = IdRequest,
    responses(
        (status = 200, description = "Link removed"),
        (status = 400, description = "Link not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn remove_job_case(
    service: web::Data<JobService>,
    body: web::Json<IdRequest>,
) -> AppResult<HttpResponse> {
    service.remove_case(body.id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::message("Case removed from job")))
}

/// Record a result on a job-case link.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/result",
    tag = "Jobs",
    request_body = RecordResultRequest,
    responses(
        (status = 200, description = "Updated link in `data`", body = JobCaseResponse),
        (status = 400, description = "Link not found or invalid status", body = crate::error::ErrorResponse),
    )
)]
pub async fn record_result(
    service: web::Data<JobService>,
    body: web::Json<RecordResultRequest>,
) -> AppResult<HttpResponse> {
    let link = service.record_result(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Result recorded",
        JobCaseResponse::from(link),
    )))
}

/// Configure job routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Fixed segments must be registered before `/jobs/{id}`
    cfg.service(
        web::resource("/jobs")
            .route(web::get().to(list_jobs))
            .route(web::post().to(create_job))
            .route(web::put().to(update_job))
            .route(web::delete().to(delete_job)),
    )
    .service(web::resource("/jobs/dispatch").route(web::put().to(dispatch_jobs)))
    .service(web::resource("/jobs/result").route(web::post().to(record_result)))
    .service(web::resource("/jobs/cases").route(web::delete().to(remove_job_case)))
    .service(web::resource("/jobs/{id}").route(web::get().to(get_job)))
    .service(
        web::resource("/jobs/{id}/cases")
            .route(web::get().to(list_job_cases))
            .route(web::post().to(add_job_cases)),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use serde_json::{Value, json};

    use super::*;
    use crate::config::USER_ID_HEADER;
    use crate::db::memory::MemoryJobStore;
    use crate::services::AttachmentService;
    use crate::services::attachments::testing::RecordingStore;

    const BASE: &str = "http://localhost:8080/api/v1/attachments/";

    struct Harness {
        store: Arc<MemoryJobStore>,
        blobs: Arc<RecordingStore>,
        service: web::Data<JobService>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryJobStore::new());
        let blobs = Arc::new(RecordingStore::default());
        let attachments = Arc::new(AttachmentService::new(blobs.clone(), BASE).unwrap());
        let service = web::Data::new(JobService::new(store.clone(), attachments));
        Harness {
            store,
            blobs,
            service,
        }
    }

    macro_rules! app {
        ($h:expr) => {
            test::init_service(
                App::new()
                    .app_data($h.service.clone())
                    .service(web::scope("/api/v1").configure(crate::api::configure_routes)),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_create_job_returns_201_with_envelope() {
        let h = harness();
        let creator = h.store.add_user("lead");
        let tester = h.store.add_user("alice");
        let app = app!(h);

        let req = test::TestRequest::post()
            .uri("/api/v1/jobs")
            .insert_header((USER_ID_HEADER, creator.to_string()))
            .set_json(json!({
                "task_name": "Smoke",
                "level": 1,
                "type": 3,
                "expect_end_time": "2026-10-18T09:00:00Z",
                "executor": [tester],
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 201);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Job created");
        assert_eq!(body["data"]["status"], 2);
        assert_eq!(body["data"]["type"], 3);
        assert_eq!(body["data"]["executor"][0], tester.to_string());
    }

    #[actix_rt::test]
    async fn test_create_job_validation_details() {
        let h = harness();
        let app = app!(h);

        let req = test::TestRequest::post()
            .uri("/api/v1/jobs")
            .set_json(json!({ "task_name": "No creator" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "VALIDATION_ERROR");
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"create_user"));
        assert!(fields.contains(&"expect_end_time"));
    }

    #[actix_rt::test]
    async fn test_close_with_pending_case_is_rejected() {
        let h = harness();
        let creator = h.store.add_user("lead");
        let case_id = h.store.add_case("TC-1");
        let app = app!(h);

        let req = test::TestRequest::post()
            .uri("/api/v1/jobs")
            .insert_header((USER_ID_HEADER, creator.to_string()))
            .set_json(json!({
                "task_name": "Close me",
                "level": 2,
                "type": 1,
                "expect_end_time": "2026-10-18T09:00:00Z",
                "case_ids": [case_id],
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let job_id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri("/api/v1/jobs")
            .set_json(json!({ "id": job_id, "status": 4 }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "INCOMPLETE_JOB");
    }

    #[actix_rt::test]
    async fn test_dispatch_unknown_jobs() {
        let h = harness();
        let user = h.store.add_user("alice");
        let app = app!(h);

        let req = test::TestRequest::put()
            .uri("/api/v1/jobs/dispatch")
            .set_json(json!({ "ids": [user], "job_ids": [Uuid::now_v7()] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "NO_SUCH_JOBS");
        assert_eq!(h.store.writes(), 0);
    }

    #[actix_rt::test]
    async fn test_closed_job_stays_closed() {
        let h = harness();
        let creator = h.store.add_user("lead");
        let tester = h.store.add_user("alice");
        let app = app!(h);

        let req = test::TestRequest::post()
            .uri("/api/v1/jobs")
            .insert_header((USER_ID_HEADER, creator.to_string()))
            .set_json(json!({
                "task_name": "Done",
                "level": 2,
                "type": 1,
                "expect_end_time": "2026-10-18T09:00:00Z",
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let job_id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri("/api/v1/jobs")
            .set_json(json!({ "id": job_id, "status": 4 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::put()
            .uri("/api/v1/jobs/dispatch")
            .set_json(json!({ "ids": [tester], "job_ids": [job_id] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert_eq!(body["details"][0]["field"], "job_ids");

        let req = test::TestRequest::put()
            .uri("/api/v1/jobs")
            .set_json(json!({ "id": job_id, "status": 3 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["details"][0]["field"], "status");
    }

    #[actix_rt::test]
    async fn test_unfinish_view_requires_user() {
        let h = harness();
        let app = app!(h);

        let req = test::TestRequest::get()
            .uri("/api/v1/jobs?conditions=unfinish")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);

        let req = test::TestRequest::get()
            .uri("/api/v1/jobs?conditions=unfinish")
            .insert_header((USER_ID_HEADER, Uuid::now_v7().to_string()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"], json!([]));
    }

    #[actix_rt::test]
    async fn test_unknown_filter_key_is_rejected() {
        let h = harness();
        let app = app!(h);

        let req = test::TestRequest::get()
            .uri("/api/v1/jobs?conditions=%7B%22owner%22%3A%22x%22%7D")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["details"][0]["field"], "owner");
    }

    #[actix_rt::test]
    async fn test_remove_case_purges_attachments() {
        let h = harness();
        let creator = h.store.add_user("lead");
        let case_id = h.store.add_case("TC-1");
        let app = app!(h);

        let req = test::TestRequest::post()
            .uri("/api/v1/jobs")
            .insert_header((USER_ID_HEADER, creator.to_string()))
            .set_json(json!({
                "task_name": "With images",
                "level": 2,
                "type": 1,
                "expect_end_time": "2026-10-18T09:00:00Z",
                "case_ids": [case_id],
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let job_id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/jobs/{}/cases", job_id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let link_id = body["data"][0]["id"].as_str().unwrap().to_string();

        let detail = format!(r#"<img src="{0}a.png"><img src="{0}b.png">"#, BASE);
        let req = test::TestRequest::post()
            .uri("/api/v1/jobs/result")
            .set_json(json!({ "id": link_id, "case_status": 1, "test_detail": detail }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["attachments"], json!(["a.png", "b.png"]));

        let req = test::TestRequest::delete()
            .uri("/api/v1/jobs/cases")
            .set_json(json!({ "id": link_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 200);
        assert_eq!(h.blobs.calls(), vec!["a.png", "b.png"]);
    }

    #[actix_rt::test]
    async fn test_malformed_path_and_body_use_error_envelope() {
        let h = harness();
        let app = app!(h);

        let req = test::TestRequest::get().uri("/api/v1/jobs/not-a-uuid").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "INVALID_INPUT");

        let req = test::TestRequest::post()
            .uri("/api/v1/jobs/result")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "INVALID_INPUT");
    }
}
