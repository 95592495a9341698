//! JSON-Schema to typed parameter synthesis.
//!
//! A tool's `inputSchema` is walked once at build time and turned into an
//! ordered list of [`Parameter`]s. The walk is a pure function of the schema,
//! so the same descriptor always yields the same parameter list.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value, json};
use thiserror::Error;

/// Tool whose schema under-specifies its optional `schemas` filter.
pub const LIST_TABLES: &str = "list_tables";

/// Name of the filter parameter injected into [`LIST_TABLES`].
pub const SCHEMAS_PARAM: &str = "schemas";

/// Errors raised while turning one descriptor into a callable.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Tool '{0}' has a parameter schema that is not a JSON object")]
    SchemaNotObject(String),

    #[error("Tool '{0}' has a 'properties' entry that is not a JSON object")]
    PropertiesNotObject(String),

    #[error("Tool '{tool}' describes parameter '{param}' with a non-object schema")]
    ParameterNotObject { tool: String, param: String },
}

/// Scalar JSON-Schema types with a direct semantic counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
}

impl PrimitiveKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }
}

/// Semantic type of a synthesized parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaType {
    Primitive(PrimitiveKind),
    Array(Box<SchemaType>),
    Unknown,
}

impl SchemaType {
    /// Resolves the semantic type of a schema node.
    ///
    /// `"array"`, or any union that contains it, becomes a list of the
    /// resolved `items` type. Other unions and unrecognised names resolve to
    /// [`SchemaType::Unknown`].
    pub fn from_node(node: &Value) -> Self {
        let items = || {
            let item = node
                .get("items")
                .map(Self::from_node)
                .unwrap_or(Self::Unknown);
            Self::Array(Box::new(item))
        };

        match node.get("type") {
            Some(Value::String(name)) if name == "array" => items(),
            Some(Value::String(name)) => PrimitiveKind::from_name(name)
                .map(Self::Primitive)
                .unwrap_or(Self::Unknown),
            Some(Value::Array(union)) if union.iter().any(|t| t.as_str() == Some("array")) => {
                items()
            }
            _ => Self::Unknown,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// JSON-Schema fragment describing this type to a function-calling layer.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::Primitive(kind) => json!({ "type": kind.as_str() }),
            Self::Array(item) => json!({ "type": "array", "items": item.to_json_schema() }),
            Self::Unknown => json!({}),
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => f.write_str(kind.as_str()),
            Self::Array(item) => write!(f, "list<{item}>"),
            Self::Unknown => f.write_str("any"),
        }
    }
}

/// One named parameter of a synthesized calling convention.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: SchemaType,
    pub required: bool,
    /// Declared default. `None` means the argument is simply left out.
    pub default: Option<Value>,
    pub description: Option<String>,
}

/// Applies per-tool schema corrections before synthesis.
///
/// [`LIST_TABLES`] gains an optional, nullable `schemas` list of strings
/// defaulting to `[]`, and `schemas` is never required.
pub fn patch_schema(tool_name: &str, schema: &mut Map<String, Value>) -> Result<(), BuildError> {
    if tool_name != LIST_TABLES {
        return Ok(());
    }

    let properties = schema
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| BuildError::PropertiesNotObject(tool_name.to_string()))?;

    properties.insert(
        SCHEMAS_PARAM.to_string(),
        json!({
            "type": ["array", "null"],
            "items": { "type": "string" },
            "default": [],
        }),
    );

    if let Some(Value::Array(required)) = schema.get_mut("required") {
        required.retain(|name| name.as_str() != Some(SCHEMAS_PARAM));
    }

    Ok(())
}

/// Synthesizes the parameter list for `tool_name` from its input schema.
///
/// A parameter is required when the schema lists it as required and gives no
/// default. Parameters are ordered by name.
pub fn synthesize(tool_name: &str, schema: &Value) -> Result<Vec<Parameter>, BuildError> {
    let mut schema = schema
        .as_object()
        .cloned()
        .ok_or_else(|| BuildError::SchemaNotObject(tool_name.to_string()))?;

    patch_schema(tool_name, &mut schema)?;

    let properties = match schema.get("properties") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(properties)) => properties,
        Some(_) => return Err(BuildError::PropertiesNotObject(tool_name.to_string())),
    };

    let required: BTreeSet<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut parameters = properties
        .iter()
        .map(|(name, node)| {
            if !node.is_object() {
                return Err(BuildError::ParameterNotObject {
                    tool: tool_name.to_string(),
                    param: name.clone(),
                });
            }
            let default = node.get("default").cloned();
            Ok(Parameter {
                name: name.clone(),
                ty: SchemaType::from_node(node),
                required: required.contains(name.as_str()) && default.is_none(),
                default,
                description: node
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    parameters.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(parameters)
}
