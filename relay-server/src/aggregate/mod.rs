//! Run status aggregation.
//!
//! A run view is built at read time from three sources:
//! 1. The live workflow run fetched from the provider (errors propagate)
//! 2. The accumulated webhook record, if any
//! 3. An applicant lookup, only when no name is known yet (errors are logged)

pub mod fields;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::MergePrecedence;
use crate::provider::{ProviderApi, ProviderError};
use crate::store::{is_processing, RunStore};

use fields::{document_number, field_str, format_address, full_name, merge_outputs};

/// Caller-facing combination of live and webhook data for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunView {
    pub workflow_run_id: String,
    pub status: Option<String>,
    pub result: Option<String>,
    pub applicant_id: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub date_expiry: Option<String>,
    pub gender: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub address: Option<Value>,
    pub address_formatted: String,
    pub dashboard_url: Option<String>,
    pub breakdown: Option<Value>,
    pub has_webhook_data: bool,
    pub raw_output: Map<String, Value>,
}

/// Builds [`RunView`]s from the provider and the run store.
#[derive(Clone)]
pub struct RunAggregator {
    provider: Arc<dyn ProviderApi>,
    store: Arc<dyn RunStore>,
    precedence: MergePrecedence,
}

impl RunAggregator {
    pub fn new(
        provider: Arc<dyn ProviderApi>,
        store: Arc<dyn RunStore>,
        precedence: MergePrecedence,
    ) -> Self {
        Self {
            provider,
            store,
            precedence,
        }
    }

    pub async fn get_run_view(&self, run_id: &str) -> Result<RunView, ProviderError> {
        let live = self.provider.get_workflow_run(run_id).await?;
        let record = self.store.get(run_id);

        let empty = Map::new();
        let live_output = live
            .get("output")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let webhook_output = record.as_ref().map(|r| &r.raw_output).unwrap_or(&empty);
        let merged = merge_outputs(live_output, webhook_output, self.precedence);

        let status = pick_status(
            str_field(&live, "status"),
            record.as_ref().and_then(|r| r.status.as_deref()),
            self.precedence,
        );
        let applicant_id = str_field(&live, "applicant_id")
            .map(str::to_string)
            .or_else(|| record.as_ref().and_then(|r| r.applicant_id.clone()));

        let mut first_name = field_str(&merged, &["first_name"]);
        let mut last_name = field_str(&merged, &["last_name"]);
        if first_name.is_none() && last_name.is_none() {
            if let Some(applicant_id) = applicant_id.as_deref() {
                match self.provider.get_applicant(applicant_id).await {
                    Ok(applicant) => {
                        first_name = str_field(&applicant, "first_name").map(str::to_string);
                        last_name = str_field(&applicant, "last_name").map(str::to_string);
                    }
                    Err(e) => {
                        warn!(
                            run_id = %run_id,
                            applicant_id = %applicant_id,
                            error = %e,
                            "applicant_name_fallback_failed"
                        );
                    }
                }
            }
        }

        let full_name = full_name(
            field_str(&merged, &["full_name"]).as_deref(),
            first_name.as_deref(),
            last_name.as_deref(),
        );
        let address = merged.get("address").filter(|a| !a.is_null()).cloned();
        let address_formatted = format_address(address.as_ref());

        let dashboard_url = str_field(&live, "dashboard_url")
            .or_else(|| live.pointer("/link/url").and_then(Value::as_str))
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        let view = RunView {
            workflow_run_id: str_field(&live, "id").unwrap_or(run_id).to_string(),
            status,
            result: record.as_ref().and_then(|r| r.result.clone()),
            applicant_id,
            document_type: field_str(&merged, &["document_type"]),
            document_number: document_number(&merged),
            date_of_birth: field_str(&merged, &["date_of_birth", "dob"]),
            date_expiry: field_str(&merged, &["date_expiry", "expiry_date", "document_expiry"]),
            gender: field_str(&merged, &["gender"]),
            first_name,
            last_name,
            full_name,
            address,
            address_formatted,
            dashboard_url,
            breakdown: record.as_ref().and_then(|r| r.breakdown.clone()),
            has_webhook_data: record.is_some(),
            raw_output: merged,
        };

        info!(
            run_id = %view.workflow_run_id,
            status = ?view.status,
            has_webhook_data = view.has_webhook_data,
            field_count = view.raw_output.len(),
            "run_view_built"
        );

        Ok(view)
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Prefer the side named by `precedence`, unless it is still processing and
/// the other side has settled.
fn pick_status(
    live: Option<&str>,
    webhook: Option<&str>,
    precedence: MergePrecedence,
) -> Option<String> {
    let (preferred, other) = match precedence {
        MergePrecedence::Webhook => (webhook, live),
        MergePrecedence::Live => (live, webhook),
    };
    let status = match (preferred, other) {
        (Some(p), Some(o)) if is_processing(p) && !is_processing(o) => o,
        (Some(p), _) => p,
        (None, o) => o?,
    };
    Some(status.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_status_prefers_settled() {
        assert_eq!(
            pick_status(Some("approved"), Some("processing"), MergePrecedence::Webhook),
            Some("approved".to_string())
        );
        assert_eq!(
            pick_status(Some("processing"), Some("declined"), MergePrecedence::Live),
            Some("declined".to_string())
        );
    }

    #[test]
    fn test_pick_status_precedence_breaks_ties() {
        assert_eq!(
            pick_status(Some("review"), Some("approved"), MergePrecedence::Webhook),
            Some("approved".to_string())
        );
        assert_eq!(
            pick_status(Some("review"), Some("approved"), MergePrecedence::Live),
            Some("review".to_string())
        );
    }

    #[test]
    fn test_pick_status_missing() {
        assert_eq!(pick_status(None, None, MergePrecedence::Webhook), None);
        assert_eq!(
            pick_status(Some("processing"), None, MergePrecedence::Webhook),
            Some("processing".to_string())
        );
    }
}
