#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for solar site suitability analysis.
//!
//! Accepts an area of interest at `POST /perform_analysis`, runs the
//! suitability pipeline against the remote raster compute service and
//! returns tile URLs, per-class areas, terrain statistics, yield estimates
//! and map framing. The raster backend is initialised once at startup;
//! if that fails the server still starts and every analysis fails fast.

mod handlers;
pub mod interactive;

use std::path::Path;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpResponse, HttpServer, error, middleware, web};
use solar_siting_raster::catalog::Catalog;
use solar_siting_raster::http::{HttpBackend, HttpBackendSettings};
use solar_siting_server_models::ApiError;
use solar_siting_suitability::BackendHandle;
use solar_siting_suitability::config::PipelineConfig;
use solar_siting_suitability::pipeline::SuitabilityPipeline;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default directory for the static frontend.
pub const DEFAULT_STATIC_DIR: &str = "app/dist";

/// Shared application state.
pub struct AppState {
    /// Raster backend initialised at startup.
    pub backend: BackendHandle,
    /// Configured suitability pipeline.
    pub pipeline: SuitabilityPipeline,
}

/// Registers the API routes.
pub fn routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        log::warn!("Rejected request body: {message}");
        error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(ApiError { error: message }),
        )
        .into()
    });

    cfg.app_data(json_config)
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .route("/classes", web::get().to(handlers::classes)),
        )
        .route(
            "/perform_analysis",
            web::post().to(handlers::perform_analysis),
        );
}

/// Connects to the raster compute service configured in the environment.
///
/// Never fails: a connection error is logged and recorded in the returned
/// handle so the server can report it per request.
pub async fn init_backend() -> BackendHandle {
    let catalog = match Catalog::load() {
        Ok(catalog) => catalog,
        Err(e) => {
            log::error!("Raster backend initialisation failed: {e}");
            return BackendHandle::unavailable(e.to_string());
        }
    };

    let connected = match HttpBackendSettings::from_env() {
        Ok(settings) => HttpBackend::connect(settings, catalog).await,
        Err(e) => Err(e),
    };

    match connected {
        Ok(backend) => BackendHandle::ready(backend),
        Err(e) => {
            log::error!("Raster backend initialisation failed: {e}");
            BackendHandle::unavailable(e.to_string())
        }
    }
}

/// Starts the solar siting API server.
///
/// Loads the pipeline configuration, initialises the raster backend and
/// starts the Actix-Web HTTP server. The caller provides the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the configuration cannot be
/// loaded, or the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Loading pipeline configuration...");
    let config = PipelineConfig::load().map_err(std::io::Error::other)?;

    log::info!("Initialising raster backend...");
    let backend = init_backend().await;

    let state = web::Data::new(AppState {
        backend,
        pipeline: SuitabilityPipeline::new(config),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let static_dir =
        std::env::var("STATIC_DIR").unwrap_or_else(|_| DEFAULT_STATIC_DIR.to_string());

    if !Path::new(&static_dir).is_dir() {
        log::warn!("Static directory {static_dir} not found; serving the API only");
    }

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();
        let static_dir = static_dir.clone();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(routes)
            // Serve frontend static files (production)
            .configure(move |cfg| {
                if Path::new(&static_dir).is_dir() {
                    cfg.service(Files::new("/", &static_dir).index_file("index.html"));
                }
            })
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
