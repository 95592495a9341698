//! Argument binding and response normalization for proxied tool calls.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::mcp::{ContentBlock, McpError, ToolResponse};

use super::schema::{Parameter, PrimitiveKind, SchemaType};

/// Errors raised while invoking a proxied tool.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{name}' expects {expected}, got {got}")]
    InvalidArgument {
        name: String,
        expected: String,
        got: &'static str,
    },

    #[error(transparent)]
    Server(#[from] McpError),
}

/// Binds caller arguments to the synthesized parameter list.
///
/// Missing optional arguments take their declared default. Without one, a
/// list becomes `[]` and anything else is left out.
/// Supplied values are coerced to the parameter type; a `null` list becomes
/// `[]`. Arguments the schema does not name pass through untouched.
pub fn bind_arguments(
    parameters: &[Parameter],
    mut arguments: Map<String, Value>,
) -> Result<Map<String, Value>, InvocationError> {
    for param in parameters {
        match arguments.remove(&param.name) {
            Some(value) => {
                let value = coerce(&param.name, value, &param.ty)?;
                arguments.insert(param.name.clone(), value);
            }
            None if param.required => {
                return Err(InvocationError::MissingArgument(param.name.clone()));
            }
            None => match &param.default {
                Some(default) => {
                    let value = coerce(&param.name, default.clone(), &param.ty)?;
                    arguments.insert(param.name.clone(), value);
                }
                // An omitted list means "no filter", which the server expects as `[]`.
                None if param.ty.is_list() => {
                    arguments.insert(param.name.clone(), Value::Array(Vec::new()));
                }
                None => {}
            },
        }
    }
    Ok(arguments)
}

/// Lax coercion of one value to a semantic type.
pub fn coerce(name: &str, value: Value, ty: &SchemaType) -> Result<Value, InvocationError> {
    let invalid = |value: &Value| InvocationError::InvalidArgument {
        name: name.to_string(),
        expected: ty.to_string(),
        got: kind_of(value),
    };

    match (ty, value) {
        (SchemaType::Array(_), Value::Null) => Ok(Value::Array(Vec::new())),
        (_, Value::Null) => Ok(Value::Null),
        (SchemaType::Unknown, value) => Ok(value),
        (SchemaType::Array(item), Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| coerce(&format!("{name}[{i}]"), v, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (SchemaType::Primitive(kind), value) => match (kind, value) {
            (PrimitiveKind::String, v @ Value::String(_)) => Ok(v),
            (PrimitiveKind::Integer, Value::Number(n)) => integer_from(&n)
                .map(Value::Number)
                .ok_or_else(|| invalid(&Value::Number(n))),
            (PrimitiveKind::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid(&Value::String(s))),
            (PrimitiveKind::Number, v @ Value::Number(_)) => Ok(v),
            (PrimitiveKind::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(&Value::String(s))),
            (PrimitiveKind::Boolean, v @ Value::Bool(_)) => Ok(v),
            (PrimitiveKind::Boolean, Value::String(s)) => {
                let parsed = match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                };
                parsed
                    .map(Value::Bool)
                    .ok_or_else(|| invalid(&Value::String(s)))
            }
            (PrimitiveKind::Object, v @ Value::Object(_)) => Ok(v),
            (_, other) => Err(invalid(&other)),
        },
        (_, other) => Err(invalid(&other)),
    }
}

/// 2^63, the first float above the `i64` range.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn integer_from(n: &Number) -> Option<Number> {
    if n.is_i64() || n.is_u64() {
        return Some(n.clone());
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < I64_UPPER_BOUND)
        .then(|| Number::from(f as i64))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turns a tool response into the value handed back to the agent.
///
/// Structured lists and maps pass through. Content whose first block has
/// text yields that text parsed as JSON, or the text itself when it is not
/// JSON. Everything else is stringified.
pub fn normalize_response(response: ToolResponse) -> Value {
    match response {
        ToolResponse::Structured(value) if value.is_array() || value.is_object() => value,
        ToolResponse::Content(blocks) => match blocks.first().and_then(|b| b.text.as_deref()) {
            Some(text) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
            }
            None => Value::String(stringify_blocks(&blocks)),
        },
        ToolResponse::Structured(value) | ToolResponse::Raw(value) => match value {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        },
    }
}

fn stringify_blocks(blocks: &[ContentBlock]) -> String {
    serde_json::to_string(blocks).unwrap_or_else(|_| format!("{blocks:?}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn list_of(kind: PrimitiveKind) -> SchemaType {
        SchemaType::Array(Box::new(SchemaType::Primitive(kind)))
    }

    fn param(name: &str, ty: SchemaType, required: bool, default: Option<Value>) -> Parameter {
        Parameter {
            name: name.into(),
            ty,
            required,
            default,
            description: None,
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn null_list_argument_becomes_empty_list() {
        let params = [param("schemas", list_of(PrimitiveKind::String), false, Some(json!([])))];
        let bound = bind_arguments(&params, args(json!({ "schemas": null }))).unwrap();
        assert_eq!(bound["schemas"], json!([]));
    }

    #[test]
    fn missing_required_argument_is_an_error() {
        let params = [param("query", SchemaType::Primitive(PrimitiveKind::String), true, None)];
        let err = bind_arguments(&params, Map::new()).unwrap_err();
        assert!(matches!(err, InvocationError::MissingArgument(name) if name == "query"));
    }

    #[test]
    fn missing_optional_arguments_take_defaults_or_are_omitted() {
        let params = [
            param("limit", SchemaType::Primitive(PrimitiveKind::Integer), false, Some(json!(3))),
            param("service", SchemaType::Primitive(PrimitiveKind::String), false, None),
        ];
        let bound = bind_arguments(&params, Map::new()).unwrap();
        assert_eq!(bound.get("limit"), Some(&json!(3)));
        assert!(!bound.contains_key("service"));
    }

    #[test]
    fn unknown_arguments_pass_through() {
        let bound = bind_arguments(&[], args(json!({ "extra": 1 }))).unwrap();
        assert_eq!(bound["extra"], json!(1));
    }

    #[test]
    fn null_for_scalar_parameter_is_kept() {
        let params = [param("service", SchemaType::Primitive(PrimitiveKind::String), false, None)];
        let bound = bind_arguments(&params, args(json!({ "service": null }))).unwrap();
        assert_eq!(bound["service"], Value::Null);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let int = SchemaType::Primitive(PrimitiveKind::Integer);
        let num = SchemaType::Primitive(PrimitiveKind::Number);
        assert_eq!(coerce("n", json!("42"), &int).unwrap(), json!(42));
        assert_eq!(coerce("n", json!(7.0), &int).unwrap(), json!(7));
        assert_eq!(coerce("n", json!("2.5"), &num).unwrap(), json!(2.5));
        assert!(coerce("n", json!(7.5), &int).is_err());
        assert!(coerce("n", json!("seven"), &int).is_err());
    }

    #[test]
    fn integers_outside_i64_are_kept_or_rejected_exactly() {
        let int = SchemaType::Primitive(PrimitiveKind::Integer);
        assert_eq!(
            coerce("n", json!(10_000_000_000_000_000_000u64), &int).unwrap(),
            json!(10_000_000_000_000_000_000u64)
        );
        assert_eq!(coerce("n", json!(-9.0), &int).unwrap(), json!(-9));
        assert!(coerce("n", json!(9_223_372_036_854_775_808.0f64), &int).is_err());
        assert!(coerce("n", json!(1e300), &int).is_err());
    }

    #[test]
    fn omitted_optional_list_without_default_becomes_empty() {
        let params = [
            param("services", list_of(PrimitiveKind::String), false, None),
            param("service", SchemaType::Primitive(PrimitiveKind::String), false, None),
        ];
        let bound = bind_arguments(&params, Map::new()).unwrap();
        assert_eq!(bound, args(json!({ "services": [] })));
    }

    #[test]
    fn boolean_strings_are_coerced() {
        let ty = SchemaType::Primitive(PrimitiveKind::Boolean);
        assert_eq!(coerce("b", json!("TRUE"), &ty).unwrap(), json!(true));
        assert_eq!(coerce("b", json!("false"), &ty).unwrap(), json!(false));
        assert!(coerce("b", json!("yes"), &ty).is_err());
    }

    #[test]
    fn list_items_are_coerced_with_indexed_names() {
        let ty = SchemaType::Array(Box::new(list_of(PrimitiveKind::Integer)));
        assert_eq!(
            coerce("grid", json!([["1", 2], []]), &ty).unwrap(),
            json!([[1, 2], []])
        );
        let err = coerce("grid", json!([["x"]]), &ty).unwrap_err();
        assert!(err.to_string().contains("grid[0][0]"), "{err}");
    }

    #[test]
    fn mismatched_types_are_rejected() {
        let err = coerce("filter", json!("a"), &SchemaType::Primitive(PrimitiveKind::Object))
            .unwrap_err();
        assert_eq!(err.to_string(), "argument 'filter' expects object, got string");
        assert!(coerce("xs", json!("a"), &list_of(PrimitiveKind::String)).is_err());
    }

    #[test]
    fn unknown_type_accepts_anything() {
        assert_eq!(
            coerce("x", json!({ "a": [1] }), &SchemaType::Unknown).unwrap(),
            json!({ "a": [1] })
        );
    }

    #[test]
    fn json_text_content_is_parsed() {
        let response = ToolResponse::from_value(json!({ "content": [{ "text": "{\"a\":1}" }] }));
        assert_eq!(normalize_response(response), json!({ "a": 1 }));
    }

    #[test]
    fn plain_text_content_is_returned_verbatim() {
        let response = ToolResponse::from_value(json!({ "content": [{ "text": "plain" }] }));
        assert_eq!(normalize_response(response), json!("plain"));
    }

    #[test]
    fn only_the_first_block_is_used() {
        let response = ToolResponse::Content(vec![
            ContentBlock::text("[1,2]"),
            ContentBlock::text("ignored"),
        ]);
        assert_eq!(normalize_response(response), json!([1, 2]));
    }

    #[test]
    fn structured_responses_pass_through() {
        let rows = json!([{ "id": 1 }, { "id": 2 }]);
        assert_eq!(normalize_response(ToolResponse::Structured(rows.clone())), rows);
    }

    #[test]
    fn content_without_text_is_stringified() {
        let response = ToolResponse::Content(vec![ContentBlock::non_text("image")]);
        assert_eq!(normalize_response(response), json!("[{\"type\":\"image\"}]"));
    }

    #[test]
    fn raw_scalars_are_stringified() {
        assert_eq!(normalize_response(ToolResponse::Raw(json!(5))), json!("5"));
        assert_eq!(normalize_response(ToolResponse::Raw(json!("ok"))), json!("ok"));
    }
}
