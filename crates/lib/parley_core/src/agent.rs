//! Agent-facing tool surface.
//!
//! Every tool the assistant can call implements [`AgentTool`]. Its
//! [`ToolSpec`] is what a function-calling runtime sees: name, description
//! and a parameter list generated ahead of time from the tool's schema.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::adapter::schema::Parameter;

/// Routing instructions for the tool-using assistant.
pub const ASSISTANT_INSTRUCTIONS: &str = "You are a helpful personal assistant with access to both web search and personal database. \
IMPORTANT ROUTING RULES:\n\
- For personal data (tasks, notes, contacts, expenses, books, etc.) → Use Supabase database tools\n\
- For current events, news, general information, weather, etc. → Use firecrawl_search\n\
- If user asks about 'my tasks' or 'my data' → Always check the database first\n\
- If user asks about current events or external facts → Use web search\n\
- Always be specific about which source you're using (database vs web)\n\
- When querying the database, start with list_tables to see what data is available\n\
- If a tool fails, explain the issue clearly and suggest alternatives";

/// Instructions for the tool-less realtime assistant.
pub const REALTIME_INSTRUCTIONS: &str = "You are a helpful voice assistant.";

const GREETING_FULL: &str = "Hello! I'm your personal assistant. I can help you with your personal data from the database or search the web for current information. What can I help you with?";
const GREETING_WEB_ONLY: &str = "Hello! I'm your assistant. I can search the web for information. Note: Database access is currently unavailable. What can I help you with?";
const GREETING_PLAIN: &str = "Hello! I'm your voice assistant. What can I help you with?";

/// Registration record for one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
}

impl ToolSpec {
    /// Human-readable calling convention, e.g.
    /// `firecrawl_search(limit: integer = 3, query: string)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                if p.required {
                    format!("{}: {}", p.name, p.ty)
                } else {
                    let default = match &p.default {
                        Some(default) => default.to_string(),
                        None if p.ty.is_list() => "[]".into(),
                        None => "null".into(),
                    };
                    format!("{}: {} = {default}", p.name, p.ty)
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// JSON-Schema object for the synthesized parameters.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.parameters {
            let mut node = p.ty.to_json_schema();
            if let Some(obj) = node.as_object_mut() {
                if let Some(description) = &p.description {
                    obj.insert("description".into(), Value::String(description.clone()));
                }
                if let Some(default) = &p.default {
                    obj.insert("default".into(), default.clone());
                }
            }
            properties.insert(p.name.clone(), node);
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Function declaration as consumed by function-calling runtimes.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters_schema(),
        })
    }
}

/// A callable the agent runtime can invoke by name.
///
/// `invoke` never fails: errors come back as a descriptive string value.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    async fn invoke(&self, arguments: Map<String, Value>) -> Value;
}

/// Ordered set of tools, unique by name.
#[derive(Default, Clone)]
pub struct Toolset {
    tools: Vec<Arc<dyn AgentTool>>,
}

impl Toolset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tool`. Returns `false` and keeps the existing entry on a name clash.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) -> bool {
        let name = &tool.spec().name;
        if self.get(name).is_some() {
            warn!(tool = %name, "Duplicate tool name, keeping the first registration");
            return false;
        }
        self.tools.push(tool);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentTool>> {
        self.tools.iter().find(|t| t.spec().name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter().map(|t| t.spec())
    }

    /// Invokes `name`, answering with a sentence when no such tool exists.
    pub async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> Value {
        match self.get(name) {
            Some(tool) => tool.invoke(arguments).await,
            None => Value::String(format!("Tool '{name}' is not available.")),
        }
    }
}

/// The assistant handed to a conversation runtime.
#[derive(Clone)]
pub struct Agent {
    pub instructions: String,
    pub tools: Toolset,
}

impl Agent {
    pub fn new(instructions: impl Into<String>, tools: Toolset) -> Self {
        Self {
            instructions: instructions.into(),
            tools,
        }
    }

    /// Opening line, chosen by which tools made it into the session.
    pub fn greeting(&self) -> &'static str {
        match self.tools.len() {
            0 => GREETING_PLAIN,
            1 => GREETING_WEB_ONLY,
            _ => GREETING_FULL,
        }
    }
}
