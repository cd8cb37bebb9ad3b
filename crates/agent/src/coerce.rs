//! Parameter coercion.
//!
//! Restores the types that were lost when the model wrote its arguments as
//! text, using only the target tool's declared [`ParamType`]s. No required or
//! range checks happen here; tools validate their own input.

use std::collections::BTreeMap;

use forgeloop_core::protocol::RawParam;
use forgeloop_core::tool::{ParamType, ParameterSchema, ToolArgs};
use serde_json::{Number, Value};

/// Coerce every raw parameter against `schema`. Parameters the schema does
/// not declare pass through as strings.
pub fn coerce_params(raw: &BTreeMap<String, RawParam>, schema: &ParameterSchema) -> ToolArgs {
    raw.iter()
        .map(|(name, value)| {
            let typed = match schema.get(name) {
                Some(spec) => coerce_value(value, &spec.ty),
                None => passthrough(value),
            };
            (name.clone(), typed)
        })
        .collect()
}

/// Coerce one raw value to `ty`. `Optional` coerces as its inner type.
pub fn coerce_value(raw: &RawParam, ty: &ParamType) -> Value {
    let ty = ty.unwrap_optional();
    match (ty, raw) {
        (ParamType::Array(inner), RawParam::Text(text)) => match parse_array_literal(text) {
            Some(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| coerce_json_item(item, inner))
                    .collect(),
            ),
            None => Value::Array(vec![coerce_text(text, inner)]),
        },
        (ParamType::Array(inner), RawParam::List(items)) => {
            Value::Array(items.iter().map(|item| coerce_text(item, inner)).collect())
        }
        (_, RawParam::Text(text)) => coerce_text(text, ty),
        (_, RawParam::List(items)) => {
            Value::Array(items.iter().map(|item| coerce_text(item, ty)).collect())
        }
    }
}

fn coerce_text(text: &str, ty: &ParamType) -> Value {
    match ty.unwrap_optional() {
        ParamType::Number => parse_number(text).unwrap_or_else(|| Value::String(text.to_string())),
        ParamType::Boolean => Value::Bool(parse_bool(text)),
        array @ ParamType::Array(_) => coerce_value(&RawParam::Text(text.to_string()), array),
        _ => Value::String(text.to_string()),
    }
}

/// Elements of a parsed array literal: strings get coerced, anything already
/// typed by the literal is kept.
fn coerce_json_item(item: Value, inner: &ParamType) -> Value {
    match item {
        Value::String(text) => coerce_text(&text, inner),
        other => other,
    }
}

fn passthrough(raw: &RawParam) -> Value {
    match raw {
        RawParam::Text(text) => Value::String(text.clone()),
        RawParam::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn parse_bool(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.eq_ignore_ascii_case("true") || trimmed == "1"
}

fn parse_array_literal(text: &str) -> Option<Vec<Value>> {
    let trimmed = text.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}
