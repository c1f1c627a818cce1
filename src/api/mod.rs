//! API endpoint modules.

use actix_web::web;

use crate::error::AppError;

pub mod attachments;
pub mod cases;
pub mod constants;
pub mod health;
pub mod jobs;
pub mod modules;
pub mod openapi;
pub mod users;

pub use attachments::UploadLimits;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;

/// JSON body extractor config that reports failures in the error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into())
}

/// Query string extractor config that reports failures in the error envelope.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into())
}

/// Path extractor config that reports failures in the error envelope.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into())
}

/// Register every resource route under the API scope.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .configure(configure_health_routes)
        .configure(jobs::configure_routes)
        .configure(modules::configure_routes)
        .configure(cases::configure_routes)
        .configure(users::configure_routes)
        .configure(attachments::configure_routes)
        .configure(constants::configure_routes);
}
