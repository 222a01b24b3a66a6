use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::accounts::AccountError;
use crate::lifecycle::{LifecycleError, SellRequestStatus};
use crate::state::AppState;

mod accounts;
mod chain;
mod sell_requests;

#[cfg(test)]
mod tests;

pub fn router(state: AppState) -> Router {
    // Configure CORS for the marketplace front end
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .merge(sell_requests::router())
        .merge(accounts::router())
        .merge(chain::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state.requests.ping().await.map_err(|err| {
        HttpError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
    })?;

    // The chain node is optional for serving the lifecycle; report, don't fail.
    let chain_head = match state.rpc.fetch_latest_block_number().await {
        Ok(block) => Some(block),
        Err(err) => {
            info!("Chain head unavailable during readiness check: {err:#}");
            None
        }
    };

    let rpc_timeout_ms = u64::try_from(state.rpc.timeout().as_millis()).unwrap_or(u64::MAX);

    let response = ReadyResponse {
        status: "ready",
        chain_head,
        rpc_timeout_ms,
        cached_accounts: state.accounts.cached_entries(),
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    chain_head: Option<u64>,
    rpc_timeout_ms: u64,
    cached_accounts: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    field: Option<&'static str>,
    current_status: Option<SellRequestStatus>,
    existing_id: Option<i64>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self {
            status,
            message,
            field: None,
            current_status: None,
            existing_id: None,
        }
    }

    fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    fn with_current_status(mut self, status: SellRequestStatus) -> Self {
        self.current_status = Some(status);
        self
    }

    fn with_existing_id(mut self, id: Option<i64>) -> Self {
        self.existing_id = id;
        self
    }
}

impl From<LifecycleError> for HttpError {
    fn from(err: LifecycleError) -> Self {
        let message = err.to_string();
        match err {
            LifecycleError::Validation { field, .. } => {
                HttpError::new(StatusCode::UNPROCESSABLE_ENTITY, message).with_field(field)
            }
            LifecycleError::NotFound { .. } => HttpError::new(StatusCode::NOT_FOUND, message),
            LifecycleError::InvalidState { current, .. } => {
                HttpError::new(StatusCode::CONFLICT, message).with_current_status(current)
            }
            LifecycleError::Forbidden { .. } => HttpError::new(StatusCode::FORBIDDEN, message),
            LifecycleError::Conflict { existing_id } => {
                HttpError::new(StatusCode::CONFLICT, message).with_existing_id(existing_id)
            }
            LifecycleError::Store(store_err) => {
                error!("Sell request store failure: {store_err}");
                HttpError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal storage error".to_string(),
                )
            }
        }
    }
}

impl From<AccountError> for HttpError {
    fn from(err: AccountError) -> Self {
        let message = err.to_string();
        match err {
            AccountError::Validation { field, .. } => {
                HttpError::new(StatusCode::UNPROCESSABLE_ENTITY, message).with_field(field)
            }
            AccountError::NotFound { .. } => HttpError::new(StatusCode::NOT_FOUND, message),
            AccountError::DuplicateEmail { .. } => {
                HttpError::new(StatusCode::CONFLICT, message).with_field("email")
            }
            AccountError::Store(store_err) => {
                error!("Account store failure: {store_err}");
                HttpError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal storage error".to_string(),
                )
            }
        }
    }
}

/// Extractor rejections keep axum's status but use the JSON error body.
macro_rules! rejection_into_http_error {
    ($($rejection:ty),+) => {
        $(impl From<$rejection> for HttpError {
            fn from(rejection: $rejection) -> Self {
                HttpError::new(rejection.status(), rejection.body_text())
            }
        })+
    };
}

rejection_into_http_error!(JsonRejection, QueryRejection, PathRejection);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
            field: self.field,
            current_status: self.current_status,
            existing_id: self.existing_id,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_status: Option<SellRequestStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    existing_id: Option<i64>,
}
