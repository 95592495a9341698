//! Tool Server client.
//!
//! The [`ToolServer`] trait is the seam between the adapter and whatever
//! process hosts the remote tools. [`stdio::StdioToolServer`] implements it
//! over MCP with a spawned child process.

pub mod stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Tool Server errors.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Tool call failed: {0}")]
    CallFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

/// A remote tool as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        rename = "inputSchema",
        alias = "parameter_schema",
        default = "empty_object"
    )]
    pub parameter_schema: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// One block of a tool call's `content` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: Some(text.into()),
        }
    }

    pub fn non_text(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: None,
        }
    }
}

/// Shape of a `tools/call` response.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    /// Already structured: a list or a map.
    Structured(Value),
    /// Content blocks, the first of which usually carries a text payload.
    Content(Vec<ContentBlock>),
    /// Anything else, kept verbatim.
    Raw(Value),
}

#[cfg(test)]
impl ToolResponse {
    /// Classifies a plain JSON response, as a fake server would send it.
    ///
    /// A map whose `content` field is a list of blocks, at least one with
    /// text, is read as content. Other lists and maps are structured.
    pub(crate) fn from_value(value: Value) -> Self {
        if let Some(Value::Array(blocks)) = value.get("content")
            && blocks.iter().all(Value::is_object)
            && blocks.iter().any(|b| b.get("text").is_some_and(Value::is_string))
        {
            return Self::Content(
                blocks
                    .iter()
                    .map(|block| ContentBlock {
                        kind: block
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or("text")
                            .to_string(),
                        text: block.get("text").and_then(Value::as_str).map(str::to_string),
                    })
                    .collect(),
            );
        }

        match value {
            Value::Array(_) | Value::Object(_) => Self::Structured(value),
            other => Self::Raw(other),
        }
    }
}

/// Remote tool discovery and invocation.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Enumerates every tool the server exposes.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError>;

    /// Invokes `name`. `arguments` is `None` when there is nothing to send.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolResponse, McpError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn content_map_is_read_as_content() {
        let response = ToolResponse::from_value(json!({
            "content": [{ "type": "text", "text": "hello" }, { "type": "image" }],
        }));
        assert_eq!(
            response,
            ToolResponse::Content(vec![ContentBlock::text("hello"), ContentBlock::non_text("image")])
        );
    }

    #[test]
    fn content_block_without_type_defaults_to_text() {
        let response = ToolResponse::from_value(json!({ "content": [{ "text": "x" }] }));
        assert_eq!(response, ToolResponse::Content(vec![ContentBlock::text("x")]));
    }

    #[test]
    fn lists_and_plain_maps_are_structured() {
        assert!(matches!(
            ToolResponse::from_value(json!([1, 2])),
            ToolResponse::Structured(_)
        ));
        assert!(matches!(
            ToolResponse::from_value(json!({ "content": "not blocks" })),
            ToolResponse::Structured(_)
        ));
    }

    #[test]
    fn content_without_any_text_stays_structured() {
        let rows = json!({ "content": [{ "id": 1 }] });
        assert_eq!(
            ToolResponse::from_value(rows.clone()),
            ToolResponse::Structured(rows)
        );
        let empty = json!({ "content": [] });
        assert_eq!(
            ToolResponse::from_value(empty.clone()),
            ToolResponse::Structured(empty)
        );
    }

    #[test]
    fn scalars_are_raw() {
        assert_eq!(ToolResponse::from_value(json!(7)), ToolResponse::Raw(json!(7)));
    }

    #[test]
    fn descriptor_reads_mcp_field_names() {
        let descriptor: ToolDescriptor = serde_json::from_value(json!({
            "name": "list_tables",
            "inputSchema": { "type": "object" },
        }))
        .unwrap();
        assert_eq!(descriptor.name, "list_tables");
        assert_eq!(descriptor.description, "");
        assert_eq!(descriptor.parameter_schema, json!({ "type": "object" }));
    }

    #[test]
    fn descriptor_without_schema_gets_empty_object() {
        let descriptor: ToolDescriptor =
            serde_json::from_value(json!({ "name": "ping", "description": "Ping" })).unwrap();
        assert_eq!(descriptor.parameter_schema, json!({}));
    }
}
