//! Schema-to-callable adapter.
//!
//! Turns each tool discovered on a [`ToolServer`] into a [`ProxyTool`]: a
//! typed callable with a synthesized parameter list that forwards to the
//! server and always answers with a value the assistant can use.

pub mod invoke;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::agent::{AgentTool, ToolSpec};
use crate::failure::ToolSource;
use crate::mcp::{ToolDescriptor, ToolServer};

use invoke::{InvocationError, bind_arguments, normalize_response};
use schema::{BuildError, synthesize};

/// Tools that are never exposed to the assistant.
pub const DENIED_TOOLS: &[&str] = &["deploy_edge_function"];

pub fn is_denied(name: &str) -> bool {
    DENIED_TOOLS.contains(&name)
}

/// Builds the registration record for a database tool.
pub fn adapt(descriptor: &ToolDescriptor) -> Result<ToolSpec, BuildError> {
    let parameters = synthesize(&descriptor.name, &descriptor.parameter_schema)?;
    let summary = if descriptor.description.trim().is_empty() {
        descriptor.name.as_str()
    } else {
        descriptor.description.as_str()
    };

    Ok(ToolSpec {
        name: descriptor.name.clone(),
        description: format!(
            "Database tool: {summary}. Use this for personal data, tasks, notes, or any information stored in the database."
        ),
        parameters,
    })
}

/// Local stand-in for one remote tool.
pub struct ProxyTool {
    descriptor: ToolDescriptor,
    spec: ToolSpec,
    server: Arc<dyn ToolServer>,
}

impl ProxyTool {
    pub fn build(
        descriptor: ToolDescriptor,
        server: Arc<dyn ToolServer>,
    ) -> Result<Self, BuildError> {
        let spec = adapt(&descriptor)?;
        Ok(Self {
            descriptor,
            spec,
            server,
        })
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Binds, forwards and normalizes one call, surfacing errors.
    pub async fn call(&self, arguments: Map<String, Value>) -> Result<Value, InvocationError> {
        let arguments = bind_arguments(&self.spec.parameters, arguments)?;
        info!(
            tool = %self.descriptor.name,
            args = ?arguments,
            "Using Supabase tool"
        );

        let arguments = (!arguments.is_empty()).then_some(arguments);
        let response = self
            .server
            .call_tool(&self.descriptor.name, arguments)
            .await?;
        Ok(normalize_response(response))
    }
}

#[async_trait]
impl AgentTool for ProxyTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Value {
        match self.call(arguments).await {
            Ok(value) => value,
            Err(e) => {
                error!(tool = %self.descriptor.name, "Supabase tool failed: {e}");
                Value::String(ToolSource::Database.describe(&e.to_string()))
            }
        }
    }
}

/// Discovers the server's tools and wraps each allowed one.
///
/// A failed discovery yields no tools. A tool whose schema cannot be adapted
/// is skipped without affecting the others.
pub async fn build_tools(server: Arc<dyn ToolServer>) -> Vec<ProxyTool> {
    let descriptors = match server.list_tools().await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            error!("Failed to list MCP tools: {e}");
            return Vec::new();
        }
    };
    info!(count = descriptors.len(), "Found MCP tools");

    descriptors
        .into_iter()
        .filter_map(|descriptor| {
            if is_denied(&descriptor.name) {
                warn!(tool = %descriptor.name, "Skipping denied tool");
                return None;
            }
            let name = descriptor.name.clone();
            match ProxyTool::build(descriptor, Arc::clone(&server)) {
                Ok(tool) => Some(tool),
                Err(e) => {
                    warn!(tool = %name, "Skipping tool: {e}");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests;
