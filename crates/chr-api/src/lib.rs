//! chr-api — HTTP ingress for the agent.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness, uptime and mode |
//! | POST | `/webhook` | Signed lifecycle event from the control plane |
//!
//! Anything else answers `404 {"error":"not found"}`, including `HEAD`
//! on `/health`.

pub mod handlers;
pub mod signature;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use chr_core::AgentMode;
use chr_reconciler::Reconciler;

pub use handlers::{HealthResponse, WebhookError, WebhookResponse};
pub use signature::{SIGNATURE_HEADER, SignatureError, SignatureVerifier};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub reconciler: Arc<Reconciler>,
    pub verifier: SignatureVerifier,
    pub mode: AgentMode,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(reconciler: Arc<Reconciler>, verifier: SignatureVerifier, mode: AgentMode) -> Self {
        Self {
            reconciler,
            verifier,
            mode,
            started_at: Instant::now(),
        }
    }
}

/// Build the agent router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/health",
            get(handlers::health)
                .head(handlers::not_found)
                .fallback(handlers::not_found),
        )
        .route("/webhook", post(handlers::webhook).fallback(handlers::not_found))
        .fallback(handlers::not_found)
        .with_state(state)
}
