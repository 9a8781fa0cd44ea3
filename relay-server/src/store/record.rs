//! Accumulated webhook state for one workflow run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status value the provider uses while a run is still in flight.
pub const PROCESSING_STATUS: &str = "processing";

/// One entry per workflow run, built up across webhook deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub workflow_run_id: String,
    pub status: Option<String>,
    pub result: Option<String>,
    pub sub_result: Option<String>,
    /// Most relevant sub-check breakdown, see [`RunRecord::resolve_breakdown`].
    pub breakdown: Option<Value>,
    /// Breakdowns keyed by the task that produced them.
    #[serde(default)]
    pub breakdowns: BTreeMap<String, Value>,
    pub document_breakdown: Option<Value>,
    pub device_breakdown: Option<Value>,
    /// Union of every output field seen for this run.
    #[serde(default)]
    pub raw_output: Map<String, Value>,
    pub applicant_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(workflow_run_id: impl Into<String>) -> Self {
        Self {
            workflow_run_id: workflow_run_id.into(),
            status: None,
            result: None,
            sub_result: None,
            breakdown: None,
            breakdowns: BTreeMap::new(),
            document_breakdown: None,
            device_breakdown: None,
            raw_output: Map::new(),
            applicant_id: None,
            received_at: Utc::now(),
        }
    }

    /// Overlay `fields` onto `raw_output`. Null values never erase.
    pub fn merge_output<'a, I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        for (key, value) in fields {
            if !value.is_null() {
                self.raw_output.insert(key.clone(), value.clone());
            }
        }
    }

    /// Accept `incoming` unless it would regress a settled status back to
    /// processing. The first non-null status is always accepted.
    pub fn apply_status(&mut self, incoming: Option<&str>) {
        let Some(incoming) = incoming.filter(|s| !s.is_empty()) else {
            return;
        };
        if self.status.is_none() || !is_processing(incoming) {
            self.status = Some(incoming.to_string());
        }
    }

    /// `sub_result` wins over `result`; neither erases a stored value.
    pub fn apply_result(&mut self, result: Option<&str>, sub_result: Option<&str>) {
        if let Some(sub) = sub_result {
            self.sub_result = Some(sub.to_string());
        }
        if let Some(value) = sub_result.or(result) {
            self.result = Some(value.to_string());
        }
    }

    /// Recompute the visible breakdown: document slot, then the well-known
    /// task key, then whatever was already there.
    pub fn resolve_breakdown(&mut self, well_known_key: &str) {
        let resolved = self
            .document_breakdown
            .clone()
            .or_else(|| self.breakdowns.get(well_known_key).cloned())
            .or_else(|| self.breakdown.take());
        self.breakdown = resolved;
    }
}

/// Whether `status` is the in-flight sentinel.
pub fn is_processing(status: &str) -> bool {
    status.eq_ignore_ascii_case(PROCESSING_STATUS)
}
