//! Ingress handlers.
//!
//! `POST /webhook` checks the signature over the raw bytes, then parses,
//! then hands the event to the reconciler. Every response carries the
//! agent mode so the control plane can tell a sandboxed agent apart.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chr_core::{AgentMode, LifecycleEvent};
use chr_reconciler::{Outcome, ReconcileError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ApiState;
use crate::signature::SIGNATURE_HEADER;

/// Body of every `/webhook` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub ok: bool,
    pub status: AgentMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Seconds since the agent started.
    pub uptime: f64,
    pub status: AgentMode,
}

/// Why a webhook request was not applied.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid json")]
    InvalidJson(#[source] serde_json::Error),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("event handling aborted: {0}")]
    Aborted(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            WebhookError::Reconcile(_) | WebhookError::Aborted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the control plane should expect redelivery to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WebhookError::Reconcile(e) => e.is_retryable(),
            WebhookError::Aborted(_) => true,
            WebhookError::InvalidSignature | WebhookError::InvalidJson(_) => false,
        }
    }

    /// Error details are returned verbatim; the control plane is the only caller.
    pub fn to_response(&self, mode: AgentMode) -> Response {
        (
            self.status_code(),
            Json(WebhookResponse {
                ok: false,
                status: mode,
                error: Some(self.to_string()),
            }),
        )
            .into_response()
    }
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        uptime: state.started_at.elapsed().as_secs_f64(),
        status: state.mode,
    })
}

/// POST /webhook
pub async fn webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process(&state, &headers, body).await {
        Ok(outcome) => {
            debug!(?outcome, "webhook applied");
            (
                StatusCode::OK,
                Json(WebhookResponse {
                    ok: true,
                    status: state.mode,
                    error: None,
                }),
            )
                .into_response()
        }
        Err(e) => {
            match &e {
                WebhookError::InvalidSignature => warn!("rejected webhook: bad signature"),
                WebhookError::InvalidJson(cause) => warn!(error = %cause, "rejected webhook: invalid json"),
                other => error!(error = %other, retryable = other.is_retryable(), "webhook failed"),
            }
            e.to_response(state.mode)
        }
    }
}

async fn process(
    state: &ApiState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Outcome, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if !state.verifier.verify(&body, signature) {
        return Err(WebhookError::InvalidSignature);
    }

    let event: LifecycleEvent =
        serde_json::from_slice(&body).map_err(WebhookError::InvalidJson)?;
    info!(event = %event.kind(), domain = event.domain(), "webhook accepted");

    // Detached so a dropped connection cannot stop an event halfway.
    let reconciler = state.reconciler.clone();
    let task = tokio::spawn(async move { reconciler.handle(&event).await });
    match task.await {
        Ok(result) => Ok(result?),
        Err(join) => Err(WebhookError::Aborted(join.to_string())),
    }
}

/// Fallback for every other method and path.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found" })),
    )
}
