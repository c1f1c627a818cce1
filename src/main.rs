//! Test Platform Server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use testplat_lib::api::{self, ApiDoc, UploadLimits};
use testplat_lib::config::Config;
use testplat_lib::db::DbPool;
use testplat_lib::middleware;
use testplat_lib::services::{AttachmentService, JobService, Storage};

/// Perform health check (for Docker healthcheck).
fn health_check() -> bool {
    // Simple check - just verify we can load config
    Config::from_env().is_ok()
}

fn cors(is_development: bool) -> Cors {
    let user_id = header::HeaderName::from_static("x-user-id");
    let cors = if is_development {
        Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
    } else {
        // Same-origin only
        Cors::default()
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
            user_id,
        ])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Check for --health-check flag (used by Docker HEALTHCHECK)
    if std::env::args().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL and S3 credentials must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Test Platform Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for DATABASE_URL and S3 credentials");
    }

    let pool = match DbPool::new(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = pool.run_migrations().await {
        error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    let storage = match Storage::new(&config.storage).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to initialize attachment storage: {}", e);
            std::process::exit(1);
        }
    };

    let attachments = match AttachmentService::new(
        Arc::new(storage.clone()),
        &config.attachment_base_url,
    ) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Invalid attachment base URL: {}", e);
            std::process::exit(1);
        }
    };
    let jobs = web::Data::new(JobService::new(
        Arc::new(pool.clone()),
        attachments.clone(),
    ));
    let attachments = web::Data::from(attachments);

    // Prepare shared state
    let bind_address = config.bind_address();
    let limits = UploadLimits {
        max_upload_size: config.max_upload_size,
    };
    let is_development = config.is_development();

    info!(
        "Upload limit: {}MB per attachment, served from {}",
        limits.max_upload_size / 1024 / 1024,
        config.attachment_base_url
    );

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    // Start HTTP server
    let server = HttpServer::new(move || {
        App::new()
            // Add CORS middleware (must be before other middleware)
            .wrap(cors(is_development))
            // Add request logging middleware
            .wrap(middleware::RequestLogger)
            // Add shared state
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(limits))
            .app_data(attachments.clone())
            .app_data(jobs.clone())
            // Multipart overhead on top of the largest accepted attachment
            .app_data(web::PayloadConfig::new(limits.max_upload_size * 2))
            .service(web::scope("/api/v1").configure(api::configure_routes))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    });

    // Set worker count
    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
