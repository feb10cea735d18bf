//! HTTP transport for the reminder service.
//!
//! ## Endpoints
//!
//! - `GET /health`: liveness probe
//! - `POST /reminders`: create a reminder
//! - `GET /reminders/{ids}`: fetch reminders by comma-separated IDs
//! - `PATCH /reminders/{id}`: edit a reminder
//! - `DELETE /reminders/{ids}`: delete reminders by comma-separated IDs
//!
//! Errors are returned as `{"message": "..."}`.

use crate::error::{ReminderError, Result};
use crate::model::Reminder;
use crate::service::{DeletionReport, NewReminder, ReminderEdit, ReminderService};
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable reason.
    pub message: String,
}

/// An error ready to be sent back to the client.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ReminderError> for ApiError {
    fn from(err: ReminderError) -> Self {
        let status = match &err {
            ReminderError::Validation(_) => StatusCode::BAD_REQUEST,
            ReminderError::NotFound { .. } => StatusCode::NOT_FOUND,
            ReminderError::StorageUnavailable(_) | ReminderError::NotifierUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ReminderError::Config(_) | ReminderError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("invalid json: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the router over `service`.
pub fn router(service: Arc<ReminderService>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/reminders", axum::routing::post(handle_create))
        .route(
            "/reminders/{ids}",
            get(handle_fetch)
                .patch(handle_edit)
                .delete(handle_delete),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(service)
}

/// Running HTTP server.
pub struct ReminderServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReminderServer {
    /// Bind `bind_addr` and start serving.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::Io`] if the address cannot be bound.
    pub async fn start(service: Arc<ReminderService>, bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let addr = listener.local_addr()?;
        info!("reminder server listening on http://{addr}");

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let app = router(service);
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = serve.await {
                tracing::error!("reminder server error: {e}");
            }
        });

        Ok(Self {
            addr,
            cancel,
            handle,
        })
    }

    /// Address actually bound.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-progress requests.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("reminder server task failed: {e}");
        }
        info!("reminder server stopped");
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Parse `"1,2,3"` into IDs, keeping request order.
fn parse_ids(raw: &str) -> ApiResult<Vec<u64>> {
    raw.split(',').map(parse_id).collect()
}

fn parse_id(raw: &str) -> ApiResult<u64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| ApiError::bad_request(format!("invalid reminder id: {trimmed:?}")))
}

async fn handle_health() -> StatusCode {
    StatusCode::OK
}

async fn handle_create(
    State(service): State<Arc<ReminderService>>,
    body: std::result::Result<Json<NewReminder>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Reminder>)> {
    let Json(body) = body?;
    // Issuing an ID writes the counter file; keep that off the async workers.
    let reminder = tokio::task::spawn_blocking(move || service.create(body))
        .await
        .map_err(|e| ReminderError::StorageUnavailable(format!("create task failed: {e}")))??;
    Ok((StatusCode::CREATED, Json(reminder)))
}

async fn handle_fetch(
    State(service): State<Arc<ReminderService>>,
    Path(ids): Path<String>,
) -> ApiResult<Json<Vec<Reminder>>> {
    let ids = parse_ids(&ids)?;
    Ok(Json(service.fetch(&ids)?))
}

async fn handle_edit(
    State(service): State<Arc<ReminderService>>,
    Path(id): Path<String>,
    body: std::result::Result<Json<ReminderEdit>, JsonRejection>,
) -> ApiResult<Json<Reminder>> {
    let id = parse_id(&id)?;
    let Json(edit) = body?;
    Ok(Json(service.edit(id, edit)?))
}

async fn handle_delete(
    State(service): State<Arc<ReminderService>>,
    Path(ids): Path<String>,
) -> ApiResult<Json<DeletionReport>> {
    let ids = parse_ids(&ids)?;
    Ok(Json(service.delete(&ids)))
}
