//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::{GameError, PlayerReport};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::Snapshot;

/// Upper bound on a single HTTP request, including the game task round trip
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let cors = match &state.config.client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            CorsLayer::new().allow_origin(allowed_origins)
        }
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/game", get(state_handler))
        .route("/game/report", get(report_handler))
        .route("/game/start", post(start_handler))
        .route("/game/stop", post(stop_handler))
        .route("/game/rate", get(get_rate_handler).post(set_rate_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    started: bool,
    players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let snapshot = state.game.state().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        started: snapshot.started,
        players: snapshot.players.len(),
    }))
}

// ============================================================================
// Game control endpoints
// ============================================================================

async fn state_handler(State(state): State<AppState>) -> Result<Json<Snapshot>, AppError> {
    Ok(Json(state.game.state().await?))
}

async fn report_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlayerReport>>, AppError> {
    Ok(Json(state.game.report().await?))
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

async fn start_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    state.game.start().await?;
    Ok(Json(StatusResponse { status: "started" }))
}

async fn stop_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    state.game.stop().await?;
    Ok(Json(StatusResponse { status: "stopped" }))
}

#[derive(Serialize, Deserialize)]
struct RateBody {
    rate: f64,
}

async fn get_rate_handler(State(state): State<AppState>) -> Result<Json<RateBody>, AppError> {
    let rate = state.game.rate().await?;
    Ok(Json(RateBody { rate }))
}

async fn set_rate_handler(
    State(state): State<AppState>,
    Json(body): Json<RateBody>,
) -> Result<Json<RateBody>, AppError> {
    state.game.set_rate(body.rate).await?;
    Ok(Json(body))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Game(#[from] GameError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Game(GameError::NoSuchPlayer(_)) => StatusCode::NOT_FOUND,
            AppError::Game(GameError::InvalidMessage(_)) => StatusCode::BAD_REQUEST,
            AppError::Game(GameError::ServerClosed) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Game(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let AppError::Game(error) = &self;
        let body = serde_json::json!({
            "error": error.to_string(),
            "code": error.code(),
        });

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_errors_map_to_conflict() {
        assert_eq!(AppError::from(GameError::AlreadyStarted).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(GameError::NotStarted).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(GameError::InvalidMessage("rate".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(GameError::ServerClosed).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
