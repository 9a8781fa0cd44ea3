//! Webhook reconciliation.
//!
//! Deliveries are partial, repeated and out of order. Each one is merged into
//! the run's accumulated [`RunRecord`] so that the record converges no matter
//! how deliveries interleave:
//!
//! ```text
//! raw bytes → parse → run id → store.upsert(merge) → RunRecord
//! ```

pub mod event;

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::store::{RunRecord, RunStore};

pub use event::{classify_breakdown, BreakdownKind, WebhookEvent, DOCUMENT_TASK_KEY};

/// Why a delivery was acknowledged without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    InvalidJson,
    MissingRunId,
    InvalidSignature,
    BodyTooLarge,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::InvalidJson => "invalid_json",
            DiscardReason::MissingRunId => "missing_run_id",
            DiscardReason::InvalidSignature => "invalid_signature",
            DiscardReason::BodyTooLarge => "body_too_large",
        }
    }
}

/// Result of ingesting one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Merged(RunRecord),
    Discarded(DiscardReason),
}

/// Merges webhook deliveries into the run store.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RunStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Ingest one raw delivery. Never fails: unusable input is discarded.
    pub fn ingest(&self, raw: &[u8]) -> IngestOutcome {
        let root: Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    error = %e,
                    body_length = raw.len(),
                    body_preview = %String::from_utf8_lossy(&raw[..raw.len().min(200)]),
                    "webhook_parse_failed"
                );
                return IngestOutcome::Discarded(DiscardReason::InvalidJson);
            }
        };

        let event = WebhookEvent::new(&root);
        let Some(run_id) = event.run_id() else {
            let action = root.pointer("/payload/action").and_then(Value::as_str);
            warn!(action = ?action, "webhook_missing_run_id");
            return IngestOutcome::Discarded(DiscardReason::MissingRunId);
        };

        let record = self
            .store
            .upsert(run_id, &mut |record| merge_event(record, &event));

        info!(
            run_id = %record.workflow_run_id,
            status = ?record.status,
            result = ?record.result,
            field_count = record.raw_output.len(),
            breakdown_count = record.breakdowns.len(),
            "webhook_merged"
        );

        IngestOutcome::Merged(record)
    }
}

/// Fold one delivery into `record`.
fn merge_event(record: &mut RunRecord, event: &WebhookEvent<'_>) {
    record.merge_output(event.output_fields());

    if let Some(breakdown) = event.breakdown() {
        record
            .breakdowns
            .insert(event.task_key().to_string(), breakdown.clone());
        match classify_breakdown(breakdown) {
            BreakdownKind::Document => record.document_breakdown = Some(breakdown.clone()),
            BreakdownKind::Device => record.device_breakdown = Some(breakdown.clone()),
            BreakdownKind::Generic => {
                if record.breakdown.is_none() {
                    record.breakdown = Some(breakdown.clone());
                }
            }
        }
    }
    record.resolve_breakdown(DOCUMENT_TASK_KEY);

    record.apply_status(event.status());
    record.apply_result(event.result(), event.sub_result());

    if let Some(applicant_id) = event.applicant_id() {
        record.applicant_id = Some(applicant_id.to_string());
    }

    record.received_at = Utc::now();
}
