use crate::actors::CoordinatorMessage;
use crate::error::LiveStarsError;
use crate::models::{FeedStats, RepositoryRow};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use ractor::{ActorRef, RpcReplyPort};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<FeedStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub coordinator: CheckResult,
    pub directory: CheckResult,
    pub subscriptions: CheckResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    fn with(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarCountResponse {
    pub id: u64,
    pub star_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Application state for the status server
#[derive(Clone)]
pub struct AppState {
    pub coordinator: ActorRef<CoordinatorMessage>,
    pub start_time: std::time::Instant,
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/livez", get(liveness_check))
        .route("/readyz", get(readiness_check))
        .route("/stats", get(stats))
        .route("/repositories", get(repositories))
        .route("/repositories/:id", get(repository_star_count))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the status API on an already bound listener
pub async fn serve(listener: TcpListener, app_state: AppState) -> std::io::Result<()> {
    info!("Status server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(app_state)).await
}

pub async fn start_status_server(app_state: AppState, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    serve(listener, app_state).await
}

async fn call<T, F>(coordinator: &ActorRef<CoordinatorMessage>, build: F) -> Result<T, LiveStarsError>
where
    T: Send + 'static,
    F: FnOnce(RpcReplyPort<T>) -> CoordinatorMessage,
{
    match coordinator.call(build, Some(CALL_TIMEOUT)).await {
        Ok(ractor::rpc::CallResult::Success(reply)) => Ok(reply),
        Ok(ractor::rpc::CallResult::Timeout) => Err(LiveStarsError::ActorError("Coordinator timed out".to_string())),
        Ok(ractor::rpc::CallResult::SenderError) => Err(LiveStarsError::ActorError(
            "Coordinator dropped the request".to_string(),
        )),
        Err(e) => Err(LiveStarsError::ActorError(format!("Failed to contact coordinator: {}", e))),
    }
}

fn unavailable(error: LiveStarsError) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();

    let (coordinator_check, stats) = match call(&state.coordinator, CoordinatorMessage::GetStats).await {
        Ok(stats) => (CheckResult::healthy(), Some(stats)),
        Err(e) => (CheckResult::with(HealthStatus::Unhealthy, e.to_string()), None),
    };

    let directory_check = match &stats {
        Some(stats) if stats.last_refresh_error.is_some() => CheckResult::with(
            HealthStatus::Degraded,
            format!(
                "Last refresh failed: {}",
                stats.last_refresh_error.as_deref().unwrap_or_default()
            ),
        ),
        Some(stats) if stats.refreshes_succeeded == 0 => {
            CheckResult::with(HealthStatus::Degraded, "Directory not loaded yet")
        }
        Some(_) => CheckResult::healthy(),
        None => CheckResult::with(HealthStatus::Unhealthy, "Unable to get feed statistics"),
    };

    let subscriptions_check = match &stats {
        Some(stats) if stats.failed_subscriptions > 0 => CheckResult::with(
            HealthStatus::Degraded,
            format!("{} repositories have no live feed", stats.failed_subscriptions),
        ),
        Some(_) => CheckResult::healthy(),
        None => CheckResult::with(HealthStatus::Unhealthy, "Unable to get feed statistics"),
    };

    let checks = [&coordinator_check, &directory_check, &subscriptions_check];
    let overall_status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let status_code = match overall_status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    let response = HealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        checks: HealthChecks {
            coordinator: coordinator_check,
            directory: directory_check,
            subscriptions: subscriptions_check,
        },
        stats,
    };

    (status_code, Json(response))
}

async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(LivenessResponse {
            status: "alive".to_string(),
        }),
    )
}

/// Ready once the first directory has been loaded
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let (ready, message) = match call(&state.coordinator, CoordinatorMessage::GetStats).await {
        Ok(stats) if stats.refreshes_succeeded > 0 => (true, None),
        Ok(_) => (false, Some("Not ready - directory not loaded".to_string())),
        Err(e) => (false, Some(format!("Not ready - {}", e))),
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(ReadinessResponse { ready, message }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<FeedStats>, ApiError> {
    call(&state.coordinator, CoordinatorMessage::GetStats)
        .await
        .map(Json)
        .map_err(unavailable)
}

async fn repositories(State(state): State<AppState>) -> Result<Json<Vec<RepositoryRow>>, ApiError> {
    call(&state.coordinator, CoordinatorMessage::Snapshot)
        .await
        .map(Json)
        .map_err(unavailable)
}

async fn repository_star_count(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<StarCountResponse>, ApiError> {
    let result = call(&state.coordinator, |reply| CoordinatorMessage::CurrentStarCount(id, reply))
        .await
        .map_err(unavailable)?;

    match result {
        Ok(star_count) => Ok(Json(StarCountResponse { id, star_count })),
        Err(e @ LiveStarsError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: e.to_string() }),
        )),
        Err(e) => Err(unavailable(e)),
    }
}
