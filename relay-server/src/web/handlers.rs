//! HTTP endpoint handlers.
//!
//! The webhook handler always answers 200 so the provider never redelivers.
//! The proxy endpoints surface provider errors with the upstream status.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::aggregate::{RunAggregator, RunView};
use crate::provider::ProviderApi;
use crate::reconcile::{DiscardReason, IngestOutcome, Reconciler};
use crate::store::{RunRecord, RunStore};
use crate::web::error::ApiError;
use crate::web::signature::{HmacVerifier, SignatureVerifier, SIGNATURE_HEADER};
use crate::Config;

/// Longest identifier accepted in a path segment.
const MAX_ID_LENGTH: usize = 128;

/// Largest webhook body read into memory. Bigger deliveries are acknowledged
/// and discarded.
pub const MAX_WEBHOOK_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn ProviderApi>,
    pub store: Arc<dyn RunStore>,
    pub reconciler: Reconciler,
    pub aggregator: RunAggregator,
    pub verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn ProviderApi>, store: Arc<dyn RunStore>) -> Self {
        let verifier = config
            .webhook_token
            .as_ref()
            .map(|token| Arc::new(HmacVerifier::new(token.clone())) as Arc<dyn SignatureVerifier>);
        let reconciler = Reconciler::new(Arc::clone(&store));
        let aggregator =
            RunAggregator::new(Arc::clone(&provider), Arc::clone(&store), config.merge_precedence);

        Self {
            config: Arc::new(config),
            provider,
            store,
            reconciler,
            aggregator,
            verifier,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

pub async fn health() -> &'static str {
    "ok"
}

// =============================================================================
// Webhook
// =============================================================================

/// Provider webhook endpoint. Always answers 200 "ok".
///
/// The body is read here rather than through the `Bytes` extractor, whose
/// default limit would reject large deliveries with 413.
pub async fn onfido_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> (StatusCode, &'static str) {
    let body = match to_bytes(body, MAX_WEBHOOK_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                error = %e,
                limit = MAX_WEBHOOK_BYTES,
                reason = DiscardReason::BodyTooLarge.as_str(),
                "webhook_discarded"
            );
            return (StatusCode::OK, "ok");
        }
    };
    info!(body_length = body.len(), "webhook_received");

    if let Some(verifier) = &state.verifier {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !verifier.verify(&body, signature) {
            warn!(
                reason = DiscardReason::InvalidSignature.as_str(),
                "webhook_discarded"
            );
            return (StatusCode::OK, "ok");
        }
    }

    if let IngestOutcome::Discarded(reason) = state.reconciler.ingest(&body) {
        info!(reason = reason.as_str(), "webhook_discarded");
    }

    (StatusCode::OK, "ok")
}

/// Accumulated webhook record for one run.
pub async fn get_webhook_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunRecord>, ApiError> {
    state.store.get(&run_id).map(Json).ok_or(ApiError::NotFound)
}

#[derive(Debug, Serialize)]
pub struct WebhookRunSummary {
    pub count: usize,
}

pub async fn webhook_run_summary(State(state): State<AppState>) -> Json<WebhookRunSummary> {
    Json(WebhookRunSummary {
        count: state.store.len(),
    })
}

// =============================================================================
// Provider Proxy
// =============================================================================

/// Applicant creation request.
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateApplicantRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl CreateApplicantRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let missing: Vec<&str> = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::BadRequest(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

pub async fn create_applicant(
    State(state): State<AppState>,
    Json(request): Json<CreateApplicantRequest>,
) -> Result<Json<Value>, ApiError> {
    request.validate()?;
    let body = json!(request);
    let applicant = state.provider.create_applicant(&body).await?;
    let applicant_id = applicant.get("id").and_then(Value::as_str);
    info!(applicant_id = ?applicant_id, "applicant_created");
    Ok(Json(applicant))
}

pub async fn create_workflow_run(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if !body.is_object() {
        return Err(ApiError::BadRequest("body must be a JSON object".into()));
    }
    let run = state.provider.create_workflow_run(&body).await?;
    let run_id = run.get("id").and_then(Value::as_str);
    info!(
        run_id = ?run_id,
        has_sdk_token = run.get("sdk_token").is_some(),
        "workflow_run_created"
    );
    Ok(Json(run))
}

pub async fn get_applicant(
    State(state): State<AppState>,
    Path(applicant_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    validate_id(&applicant_id)?;
    Ok(Json(state.provider.get_applicant(&applicant_id).await?))
}

/// Merged run view.
pub async fn get_workflow_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunView>, ApiError> {
    validate_id(&run_id)?;
    Ok(Json(state.aggregator.get_run_view(&run_id).await?))
}

/// Fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Provider identifiers are opaque but never contain path syntax.
fn validate_id(id: &str) -> Result<(), ApiError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid identifier: {}", id)))
    }
}
