//! Web server module.
//!
//! This module provides the HTTP surface:
//! - Receives provider webhooks and feeds them to the reconciler
//! - Proxies applicant and workflow run calls to the provider
//! - Serves merged run views and accumulated webhook records

pub mod cors;
pub mod error;
pub mod handlers;
pub mod signature;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use cors::CorsPolicy;
pub use error::ApiError;
pub use handlers::{
    create_applicant, create_workflow_run, get_applicant, get_webhook_run, get_workflow_run,
    health, onfido_webhook, webhook_run_summary, AppState, CreateApplicantRequest,
    MAX_WEBHOOK_BYTES,
};
pub use signature::{verify_signature, HmacVerifier, SignatureVerifier, SIGNATURE_HEADER};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let policy = Arc::new(CorsPolicy::from_config(&state.config));

    Router::new()
        .route("/healthz", get(health))
        .route("/webhook/onfido", post(onfido_webhook))
        .route("/api/webhook_runs", get(webhook_run_summary))
        .route("/api/webhook_runs/:id", get(get_webhook_run))
        .route("/api/applicants", post(create_applicant))
        .route("/api/applicants/:id", get(get_applicant))
        .route("/api/workflow_runs", post(create_workflow_run))
        .route("/api/workflow_runs/:id", get(get_workflow_run))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(policy, cors::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
