//! Field lookup and formatting helpers for run views.

use serde_json::{Map, Value};

use crate::config::MergePrecedence;

/// Address parts in output order. Each slot lists accepted aliases.
const ADDRESS_PARTS: &[&[&str]] = &[
    &["line1"],
    &["line2"],
    &["line3"],
    &["town", "city"],
    &["state", "region"],
    &["postcode", "postal_code"],
    &["country"],
];

/// First alias holding a non-empty string (or a number, rendered).
pub fn field_str(map: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| scalar_string(map.get(*key)?))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lift `properties` into the top level. Nested values win over top-level
/// ones, null values are dropped.
pub fn flatten_output(output: &Map<String, Value>) -> Map<String, Value> {
    let mut flat: Map<String, Value> = output
        .iter()
        .filter(|(k, v)| k.as_str() != "properties" && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if let Some(properties) = output.get("properties").and_then(Value::as_object) {
        overlay(&mut flat, properties);
    }
    flat
}

/// Copy every non-null field of `top` onto `base`.
pub fn overlay(base: &mut Map<String, Value>, top: &Map<String, Value>) {
    for (key, value) in top {
        if !value.is_null() {
            base.insert(key.clone(), value.clone());
        }
    }
}

/// Merge live and webhook output; the side named by `precedence` wins.
pub fn merge_outputs(
    live: &Map<String, Value>,
    webhook: &Map<String, Value>,
    precedence: MergePrecedence,
) -> Map<String, Value> {
    let live = flatten_output(live);
    let (mut base, top) = match precedence {
        MergePrecedence::Webhook => (live, webhook.clone()),
        MergePrecedence::Live => (flatten_output(webhook), live),
    };
    overlay(&mut base, &top);
    base
}

/// Document number, either flat or from the first `document_numbers` entry.
pub fn document_number(map: &Map<String, Value>) -> Option<String> {
    field_str(map, &["document_number"]).or_else(|| {
        map.get("document_numbers")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(|first| first.get("value"))
            .and_then(scalar_string)
    })
}

/// Explicit `full_name`, else first and last name joined by one space.
pub fn full_name(
    explicit: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> String {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    [first_name, last_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render an address: strings verbatim, objects as comma-joined parts.
pub fn format_address(address: Option<&Value>) -> String {
    match address {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => ADDRESS_PARTS
            .iter()
            .filter_map(|aliases| field_str(map, aliases))
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_format_address_object() {
        let address = json!({"line1": "Str. X", "town": "Cluj", "country": "RO"});
        assert_eq!(format_address(Some(&address)), "Str. X, Cluj, RO");
    }

    #[test]
    fn test_format_address_full_order_and_aliases() {
        let address = json!({
            "country": "GBR",
            "postal_code": "SW1A 1AA",
            "region": "London",
            "city": "Westminster",
            "line2": "",
            "line1": "10 Downing St"
        });
        assert_eq!(
            format_address(Some(&address)),
            "10 Downing St, Westminster, London, SW1A 1AA, GBR"
        );
    }

    #[test]
    fn test_format_address_string_and_absent() {
        assert_eq!(
            format_address(Some(&json!("1 Main St, Springfield"))),
            "1 Main St, Springfield"
        );
        assert_eq!(format_address(None), "");
        assert_eq!(format_address(Some(&json!(null))), "");
        assert_eq!(format_address(Some(&json!({}))), "");
    }

    #[test]
    fn test_full_name() {
        assert_eq!(full_name(Some("Ana Maria Pop"), Some("Ana"), Some("Pop")), "Ana Maria Pop");
        assert_eq!(full_name(None, Some("Ana"), Some("Pop")), "Ana Pop");
        assert_eq!(full_name(Some("  "), None, Some("Pop")), "Pop");
        assert_eq!(full_name(None, None, None), "");
    }

    #[test]
    fn test_field_str_aliases() {
        let m = map(json!({"dob": "1990-01-01", "age": 34, "empty": ""}));
        assert_eq!(
            field_str(&m, &["date_of_birth", "dob"]),
            Some("1990-01-01".to_string())
        );
        assert_eq!(field_str(&m, &["age"]), Some("34".to_string()));
        assert_eq!(field_str(&m, &["empty"]), None);
    }

    #[test]
    fn test_document_number_from_list() {
        let m = map(json!({"document_numbers": [{"type": "document_number", "value": "AB123"}]}));
        assert_eq!(document_number(&m), Some("AB123".to_string()));
    }

    #[test]
    fn test_merge_outputs_webhook_precedence() {
        let live = map(json!({"first_name": "Live", "gender": "F", "properties": {"document_type": "passport"}}));
        let webhook = map(json!({"first_name": "Hook", "last_name": null}));
        let merged = merge_outputs(&live, &webhook, MergePrecedence::Webhook);

        assert_eq!(merged.get("first_name"), Some(&json!("Hook")));
        assert_eq!(merged.get("gender"), Some(&json!("F")));
        assert_eq!(merged.get("document_type"), Some(&json!("passport")));
        assert!(!merged.contains_key("last_name"));
    }

    #[test]
    fn test_merge_outputs_live_precedence() {
        let live = map(json!({"first_name": "Live", "last_name": null}));
        let webhook = map(json!({"first_name": "Hook", "last_name": "Pop"}));
        let merged = merge_outputs(&live, &webhook, MergePrecedence::Live);

        assert_eq!(merged.get("first_name"), Some(&json!("Live")));
        assert_eq!(merged.get("last_name"), Some(&json!("Pop")));
    }
}
