use std::sync::{Arc, PoisonError};

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use tokio_util::sync::CancellationToken;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use gigreach_client::ChromiumSessionManager;
use gigreach_core::checkpoint::CheckpointStore;
use gigreach_core::pipeline::Pipeline;
use gigreach_core::status::Phase;

use crate::auth::require_api_key;
use crate::dto::{
    CleanupResponse, ConfigResponse, ErrorResponse, HealthResponse, StartRunResponse,
    StatusResponse, UpdateConfigRequest,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/runs", post(start_run))
        .route("/v1/runs/status", get(run_status))
        .route("/v1/runs/results", get(download_results))
        .route("/v1/runs/cleanup", post(cleanup))
        .route("/v1/config", get(get_config))
        .route("/v1/config", put(update_config))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/runs",
    responses(
        (status = 202, description = "Scraping started", body = StartRunResponse),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 409, description = "A run is already in progress", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn start_run(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    if state.status.is_running() {
        let body = ErrorResponse {
            error: "conflict".to_string(),
            message: "Scraping is already running".to_string(),
        };
        return Ok((StatusCode::CONFLICT, axum::Json(body)).into_response());
    }

    let config = state
        .config
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    config.validate()?;

    // A new run starts from a clean results file; links + history survive.
    if config.results_file.exists() {
        std::fs::remove_file(&config.results_file).map_err(gigreach_core::AppError::from)?;
    }

    let cancel = CancellationToken::new();
    *state.cancel.lock().await = Some(cancel.clone());

    // Mark running before the task is spawned so a racing second start
    // sees the conflict.
    state.status.reset();
    state
        .status
        .begin_phase(Phase::Discovery, 0, "Starting Phase 1");

    let status = state.status.clone();
    tokio::spawn(async move {
        let manager = ChromiumSessionManager::new(config.headless);
        let pipeline = Pipeline::new(manager, config, status);
        // Failures are already reflected in the status handle.
        let _ = pipeline.run(cancel).await;
    });

    tracing::info!("Scraping process started");
    let body = StartRunResponse {
        message: "Scraping started successfully".to_string(),
        status: "running".to_string(),
    };
    Ok((StatusCode::ACCEPTED, axum::Json(body)).into_response())
}

#[utoipa::path(
    get,
    path = "/v1/runs/status",
    responses(
        (status = 200, description = "Current scraping status", body = StatusResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn run_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(StatusResponse::from(state.status.snapshot()))
}

#[utoipa::path(
    get,
    path = "/v1/runs/results",
    responses(
        (status = 200, description = "Results CSV", content_type = "text/csv"),
        (status = 404, description = "No results yet", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn download_results(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let results_file = state
        .config
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .results_file
        .clone();

    if !results_file.exists() {
        let body = ErrorResponse {
            error: "not_found".to_string(),
            message: "No results found. Please run the scraper first.".to_string(),
        };
        return Ok((StatusCode::NOT_FOUND, axum::Json(body)).into_response());
    }

    let bytes = std::fs::read(&results_file).map_err(gigreach_core::AppError::from)?;
    let headers = [
        (header::CONTENT_TYPE, "text/csv"),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"results.csv\"",
        ),
    ];
    Ok((StatusCode::OK, headers, bytes).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/runs/cleanup",
    responses(
        (status = 200, description = "Cleanup completed", body = CleanupResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn cleanup(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    // Stop an active run; the pipeline notices between listings/URLs.
    if let Some(cancel) = state.cancel.lock().await.take() {
        cancel.cancel();
    }

    let (links_file, results_file) = {
        let config = state.config.read().unwrap_or_else(PoisonError::into_inner);
        (config.links_file.clone(), config.results_file.clone())
    };
    CheckpointStore::new(links_file, results_file).clear()?;

    state.status.reset();
    tracing::info!("Cleanup completed");
    Ok(axum::Json(CleanupResponse {
        message: "Cleanup completed successfully".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/config",
    responses(
        (status = 200, description = "Current configuration", body = ConfigResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "config"
)]
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state
        .config
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    axum::Json(ConfigResponse::from(config))
}

#[utoipa::path(
    put,
    path = "/v1/config",
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "config"
)]
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<UpdateConfigRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate a candidate before touching shared state.
    let updated = {
        let mut config = state.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = config.clone();
        body.apply(&mut candidate);
        candidate.validate()?;
        *config = candidate.clone();
        candidate
    };
    updated.save(&state.config_path)?;

    tracing::info!("Configuration updated");
    Ok(axum::Json(ConfigResponse::from(updated)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health() -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        service: "gigreach",
    })
}
