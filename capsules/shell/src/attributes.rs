//! Deploy-time narrowing of the untyped runtime attribute bag.
//!
//! The bag is inspected exactly once, here. Everything downstream consumes the
//! immutable [`ShellRuntimeConfig`].

use crate::error::ConfigurationError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Untyped attribute bag as it arrives from the function configuration.
pub type RuntimeAttributes = Map<String, Value>;

pub const ARGUMENTS_ATTRIBUTE: &str = "arguments";
pub const RESPONSE_HEADERS_ATTRIBUTE: &str = "responseHeaders";

/// Typed shell runtime configuration, fixed for the lifetime of a deployed function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellRuntimeConfig {
    static_arguments: String,
    response_headers: BTreeMap<String, String>,
}

impl ShellRuntimeConfig {
    pub fn static_arguments(&self) -> &str {
        &self.static_arguments
    }

    pub fn response_headers(&self) -> &BTreeMap<String, String> {
        &self.response_headers
    }
}

/// Validate raw runtime attributes into a [`ShellRuntimeConfig`].
///
/// Absent and `null` keys take their empty defaults. A recognized key holding
/// any other shape fails with the field name plus the expected and actual shapes.
pub fn validate(raw: &RuntimeAttributes) -> Result<ShellRuntimeConfig, ConfigurationError> {
    let static_arguments = match present(raw, ARGUMENTS_ATTRIBUTE) {
        None => String::new(),
        Some(Value::String(arguments)) => arguments.clone(),
        Some(other) => {
            return Err(invalid(ARGUMENTS_ATTRIBUTE.to_string(), "a string", other));
        }
    };

    let response_headers = match present(raw, RESPONSE_HEADERS_ATTRIBUTE) {
        None => BTreeMap::new(),
        Some(Value::Object(headers)) => string_map(RESPONSE_HEADERS_ATTRIBUTE, headers)?,
        Some(other) => {
            return Err(invalid(
                RESPONSE_HEADERS_ATTRIBUTE.to_string(),
                "a map",
                other,
            ));
        }
    };

    for key in raw.keys() {
        if key != ARGUMENTS_ATTRIBUTE && key != RESPONSE_HEADERS_ATTRIBUTE {
            debug!(attribute = %key, "ignoring unrecognized shell runtime attribute");
        }
    }

    Ok(ShellRuntimeConfig {
        static_arguments,
        response_headers,
    })
}

fn present<'a>(raw: &'a RuntimeAttributes, key: &str) -> Option<&'a Value> {
    raw.get(key).filter(|value| !value.is_null())
}

fn string_map(
    field: &str,
    entries: &Map<String, Value>,
) -> Result<BTreeMap<String, String>, ConfigurationError> {
    entries
        .iter()
        .map(|(name, value)| match value {
            Value::String(value) => Ok((name.clone(), value.clone())),
            other => Err(invalid(format!("{}.{}", field, name), "a string", other)),
        })
        .collect()
}

fn invalid(field: String, expected: &'static str, actual: &Value) -> ConfigurationError {
    ConfigurationError::InvalidAttribute {
        field,
        expected,
        actual: shape_name(actual),
    }
}

/// Name of a JSON value's shape as reported in validation errors.
pub fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}
