//! Field extraction from provider webhook payloads.
//!
//! Deliveries arrive either wrapped as `{"payload": {...}}` or bare. Inside,
//! `resource` carries the run or task that changed and `object` is a short
//! reference to it.

use serde_json::{Map, Value};

/// Resource type naming a workflow run.
pub const WORKFLOW_RUN_TYPE: &str = "workflow_run";

/// Task key whose breakdown is preferred after the document slot.
pub const DOCUMENT_TASK_KEY: &str = "document_check";

/// Marker key identifying a document check breakdown.
const DOCUMENT_MARKER: &str = "visual_authenticity";

/// Marker keys identifying a device check breakdown.
const DEVICE_MARKERS: &[&str] = &["device", "device_integrity"];

/// Borrowed view over the interesting parts of one delivery.
#[derive(Debug)]
pub struct WebhookEvent<'a> {
    payload: &'a Value,
    resource: Option<&'a Value>,
}

impl<'a> WebhookEvent<'a> {
    pub fn new(root: &'a Value) -> Self {
        let payload = root
            .get("payload")
            .filter(|p| p.is_object())
            .unwrap_or(root);
        let resource = payload.get("resource").filter(|r| r.is_object());
        Self { payload, resource }
    }

    fn resource_str(&self, key: &str) -> Option<&'a str> {
        self.resource.and_then(|r| non_empty_str(r.get(key)))
    }

    fn object_str(&self, key: &str) -> Option<&'a str> {
        non_empty_str(self.payload.get("object").and_then(|o| o.get(key)))
    }

    fn resource_type(&self) -> Option<&'a str> {
        non_empty_str(self.payload.get("resource_type"))
            .or_else(|| self.resource_str("resource_type"))
    }

    /// Whether the resource itself is a workflow run (rather than a task).
    pub fn is_workflow_run(&self) -> bool {
        self.resource_type() == Some(WORKFLOW_RUN_TYPE)
    }

    /// Run identifier: `resource.workflow_run_id`, then `resource.id` for
    /// workflow run resources, then `object.id`.
    pub fn run_id(&self) -> Option<&'a str> {
        self.resource_str("workflow_run_id")
            .or_else(|| {
                if self.is_workflow_run() {
                    self.resource_str("id")
                } else {
                    None
                }
            })
            .or_else(|| self.object_str("id"))
    }

    pub fn status(&self) -> Option<&'a str> {
        self.resource_str("status").or_else(|| self.object_str("status"))
    }

    pub fn applicant_id(&self) -> Option<&'a str> {
        self.resource_str("applicant_id")
            .or_else(|| non_empty_str(self.output().and_then(|o| o.get("applicant_id"))))
    }

    /// The resource's `output` mapping.
    pub fn output(&self) -> Option<&'a Map<String, Value>> {
        self.resource
            .and_then(|r| r.get("output"))
            .and_then(Value::as_object)
    }

    /// Output fields flattened with `output.properties`, excluding the
    /// `properties` and `breakdown` containers themselves.
    pub fn output_fields(&self) -> Vec<(&'a String, &'a Value)> {
        let Some(output) = self.output() else {
            return Vec::new();
        };
        let mut fields: Vec<_> = output
            .iter()
            .filter(|(k, _)| k.as_str() != "properties" && k.as_str() != "breakdown")
            .collect();
        if let Some(properties) = output.get("properties").and_then(Value::as_object) {
            fields.extend(properties.iter());
        }
        fields
    }

    pub fn result(&self) -> Option<&'a str> {
        non_empty_str(self.output().and_then(|o| o.get("result")))
            .or_else(|| self.resource_str("result"))
    }

    pub fn sub_result(&self) -> Option<&'a str> {
        non_empty_str(self.output().and_then(|o| o.get("sub_result")))
            .or_else(|| self.resource_str("sub_result"))
    }

    pub fn breakdown(&self) -> Option<&'a Value> {
        self.output()
            .and_then(|o| o.get("breakdown"))
            .filter(|b| b.is_object())
    }

    /// Key under which this delivery's breakdown is stored.
    pub fn task_key(&self) -> &'a str {
        self.resource_str("task_def_id")
            .or_else(|| self.resource_str("task_id"))
            .or_else(|| {
                if self.is_workflow_run() {
                    None
                } else {
                    self.resource_str("id")
                }
            })
            .unwrap_or(WORKFLOW_RUN_TYPE)
    }
}

/// Breakdown kind, judged by marker fields at the top level or one level down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownKind {
    Document,
    Device,
    Generic,
}

pub fn classify_breakdown(breakdown: &Value) -> BreakdownKind {
    if has_marker(breakdown, &[DOCUMENT_MARKER]) {
        BreakdownKind::Document
    } else if has_marker(breakdown, DEVICE_MARKERS) {
        BreakdownKind::Device
    } else {
        BreakdownKind::Generic
    }
}

fn has_marker(value: &Value, markers: &[&str]) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    markers.iter().any(|m| map.contains_key(*m))
        || map
            .values()
            .filter_map(Value::as_object)
            .any(|child| markers.iter().any(|m| child.contains_key(*m)))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
