//! Schema-tolerant response normalization.
//!
//! The model service returns structured answers in one of three envelope
//! shapes for the same logical schema request:
//!
//! 1. direct: `{"route": "billing"}`
//! 2. schema-wrapped: `{"type": "object", "properties": {"route": "billing"}}`
//! 3. double-nested array: the array lives at `properties.<field>.<field>`
//!
//! Probes run in fixed priority order as pure functions over the parsed JSON
//! value; once normalized, downstream code addresses fields by logical name
//! only and never sees the envelope shape.

use serde_json::Value;
use weave_core::{FieldMap, WeaveError};

/// Parses a raw schema-call body. A parse failure is an [`WeaveError::InvalidJson`].
pub fn parse_json(raw: &str) -> Result<Value, WeaveError> {
    serde_json::from_str(raw).map_err(|e| WeaveError::InvalidJson(format!("{e}; body: {raw}")))
}

/// Extracts a single field, trying the direct path first and the wrapped
/// `properties.<field>` path second. The first non-null value wins; direct
/// form is the common case and skips the wrapped probe entirely.
pub fn extract_field(value: &Value, field: &str) -> Result<String, WeaveError> {
    lookup_field(value, field)
        .map(value_to_string)
        .ok_or_else(|| WeaveError::MissingFields(vec![field.to_string()]))
}

fn lookup_field<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    value
        .get(field)
        .filter(|v| !v.is_null())
        .or_else(|| {
            value
                .get("properties")
                .and_then(|p| p.get(field))
                .filter(|v| !v.is_null())
        })
}

/// Extracts an item list, probing in order: direct `<field>`, double-nested
/// `properties.<field>.<field>`, single-nested `properties.<field>`. The
/// first probe that exists and is an array is accepted; a probe that exists
/// but is not an array never yields a partial list. If nothing matches, the
/// raw body is carried in the error for diagnosis.
pub fn extract_items(value: &Value, field: &str) -> Result<Vec<FieldMap>, WeaveError> {
    let probes = [
        value.get(field),
        value
            .get("properties")
            .and_then(|p| p.get(field))
            .and_then(|v| v.get(field)),
        value.get("properties").and_then(|p| p.get(field)),
    ];

    for probe in probes {
        if let Some(Value::Array(items)) = probe {
            return Ok(items.iter().map(item_to_field_map).collect());
        }
    }

    Err(WeaveError::NoArrayFound(value.to_string()))
}

fn item_to_field_map(item: &Value) -> FieldMap {
    match item {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
        other => {
            // Scalar array elements keep a single logical slot.
            let mut map = FieldMap::new();
            map.insert("value", value_to_string(other));
            map
        }
    }
}

/// Checks that every named field resolves via direct-or-wrapped lookup.
/// Schema-wrapped mode is detected by the simultaneous presence of top-level
/// `type` and `properties` keys. All missing names are collected, not just
/// the first.
pub fn validate_required_fields(value: &Value, fields: &[&str]) -> Result<(), WeaveError> {
    let wrapped = value.get("type").is_some() && value.get("properties").is_some();

    let missing: Vec<String> = fields
        .iter()
        .filter(|field| {
            let direct = value.get(**field).filter(|v| !v.is_null()).is_some();
            let via_wrapper = wrapped
                && value
                    .get("properties")
                    .and_then(|p| p.get(**field))
                    .filter(|v| !v.is_null())
                    .is_some();
            !direct && !via_wrapper
        })
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(WeaveError::MissingFields(missing))
    }
}

/// Strings come through verbatim; any other JSON value is compact-serialized.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
