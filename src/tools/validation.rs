//! Check tool call parameters against the tool's declared JSON Schema.

use serde_json::{Map, Value};

/// Validate call parameters against a tool's parameter schema.
///
/// Top-level only: required keys, declared property types and string enums.
/// Undeclared keys are accepted. Returns a description of the first violation.
pub fn validate_arguments(args: &Map<String, Value>, schema: &Value) -> Result<(), String> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        if let Some(name) = required
            .iter()
            .filter_map(Value::as_str)
            .find(|name| !args.contains_key(*name))
        {
            return Err(format!("missing required parameter '{name}'"));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in args {
        let Some(prop_schema) = properties.get(key) else {
            continue;
        };
        if let Some(expected) = prop_schema.get("type").and_then(Value::as_str) {
            if !value_matches_type(value, expected) {
                return Err(format!(
                    "parameter '{key}' expected type '{expected}', got {}",
                    json_type_name(value)
                ));
            }
        }
        if let Some(allowed) = prop_schema.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(format!("parameter '{key}' must be one of {}", Value::Array(allowed.clone())));
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
