use std::{net::SocketAddr, sync::Arc, time::Instant};

use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use server_api::{compute, history, ApiContext};
use shared::{
    domain::Operation,
    error::{ApiError, ErrorCode},
    protocol::{ComputeResponse, HistoryQuery, HistoryResponse, OperandsQuery},
};
use storage::{MemoryHistory, Storage};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod metrics;

use app_state::AppState;
use config::{load_settings, prepare_database_url, HistoryBackend};
use metrics::Metrics;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let api = match settings.history_backend {
        HistoryBackend::Sqlite => {
            let database_url = prepare_database_url(&settings.database_url)?;
            let storage = Storage::new(&database_url).await.map_err(|error| {
                error!(
                    %database_url,
                    %error,
                    "failed to open SQLite database; verify parent directory exists and permissions are correct"
                );
                error
            })?;
            info!(%database_url, "history backed by sqlite");
            ApiContext::new(storage)
        }
        HistoryBackend::Memory => {
            warn!("history kept in memory; it will be lost on restart");
            ApiContext::new(MemoryHistory::new())
        }
    };
    let metrics = Metrics::new(&settings.metrics_prefix).context("invalid metrics prefix")?;
    let cors = build_cors_layer(&settings.cors_allow_origin)?;

    let state = AppState { api, metrics };
    let app = build_router(Arc::new(state), cors);

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown requested");
}

fn build_cors_layer(allow_origin: &str) -> anyhow::Result<CorsLayer> {
    let origins: Vec<&str> = allow_origin
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if origins.is_empty() || origins.contains(&"*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .into_iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{o}'")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(http_metrics))
        .route("/calculator/history", get(http_history))
        .route("/calculator/:operation", get(http_compute))
        .layer(cors)
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidQuery
        | ErrorCode::InvalidOperand
        | ErrorCode::NonFiniteResult
        | ErrorCode::DivisionByZero => StatusCode::BAD_REQUEST,
        ErrorCode::UnknownOperation => StatusCode::NOT_FOUND,
        ErrorCode::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(err))
}

fn invalid_query(rejection: QueryRejection) -> ApiError {
    let message = rejection.body_text();
    warn!(%message, "malformed query string");
    ApiError::new(ErrorCode::InvalidQuery, message)
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.api.history.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
    }
}

async fn http_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(error) => {
            error!(%error, "failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                String::new(),
            )
        }
    }
}

async fn http_compute(
    State(state): State<Arc<AppState>>,
    Path(operation): Path<String>,
    query: Result<Query<OperandsQuery>, QueryRejection>,
) -> ApiResult<Json<ComputeResponse>> {
    let started = Instant::now();
    let outcome = match query {
        Ok(Query(query)) => compute(&state.api, &operation, &query).await,
        Err(rejection) => match operation.parse::<Operation>() {
            Ok(_) => Err(invalid_query(rejection)),
            Err(err) => Err(ApiError::from(err)),
        },
    };

    // Unknown tokens share one label so arbitrary paths cannot grow the registry.
    let label = operation
        .parse::<Operation>()
        .map(Operation::as_str)
        .unwrap_or("unknown");
    state
        .metrics
        .observe(label, outcome.is_ok(), started.elapsed());

    outcome.map(Json).map_err(reject)
}

async fn http_history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<HistoryResponse>> {
    let started = Instant::now();
    let outcome = match query {
        Ok(Query(query)) => history(&state.api, query.limit).await,
        Err(rejection) => Err(invalid_query(rejection)),
    };
    state
        .metrics
        .observe("history", outcome.is_ok(), started.elapsed());

    let history = outcome.map_err(reject)?;
    Ok(Json(HistoryResponse { history }))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
