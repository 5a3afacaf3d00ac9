//! HTTP adapter over the point service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use pointledger_common::{PointError, UserId};
use pointledger_ledger::{PointHistory, UserPoint};

use crate::service::PointService;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Error wrapper mapping `PointError` onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(PointError);

impl From<PointError> for ApiError {
    fn from(e: PointError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            PointError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            PointError::InsufficientFunds { .. } => StatusCode::CONFLICT,
            PointError::Overflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PointError::LockTimeout { .. } | PointError::Cancelled { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            PointError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            code: self.0.error_code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the router.
pub fn router(service: Arc<PointService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/point/:id", get(point))
        .route("/point/:id/histories", get(history))
        .route("/point/:id/charge", patch(charge))
        .route("/point/:id/use", patch(use_points))
        .with_state(service)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn metrics(State(service): State<Arc<PointService>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.metrics().to_prometheus(),
    )
}

async fn point(
    State(service): State<Arc<PointService>>,
    Path(id): Path<i64>,
) -> ApiResult<UserPoint> {
    info!(user_id = id, "Point lookup requested");
    Ok(Json(service.get_user_point(UserId::new(id)).await?))
}

async fn history(
    State(service): State<Arc<PointService>>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<PointHistory>> {
    info!(user_id = id, "Point history requested");
    Ok(Json(service.get_point_history(UserId::new(id)).await?))
}

async fn charge(
    State(service): State<Arc<PointService>>,
    Path(id): Path<i64>,
    Json(amount): Json<i64>,
) -> ApiResult<UserPoint> {
    info!(user_id = id, amount, "Point charge requested");
    Ok(Json(service.charge_point(UserId::new(id), amount).await?))
}

async fn use_points(
    State(service): State<Arc<PointService>>,
    Path(id): Path<i64>,
    Json(amount): Json<i64>,
) -> ApiResult<UserPoint> {
    info!(user_id = id, amount, "Point use requested");
    Ok(Json(service.use_point(UserId::new(id), amount).await?))
}
