//! MCP client over a spawned stdio server process.
//!
//! One connection per session: opened with [`StdioToolServer::connect`],
//! closed with [`StdioToolServer::close`] or on drop, whichever comes first.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParams, CallToolResult, RawContent, Tool};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};

use super::{ContentBlock, McpError, ToolDescriptor, ToolResponse, ToolServer};

/// Timeout for a single tool call.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for spawning and initializing the server. `npx` may need to
/// download the package first.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Flag whose following argument is a secret.
const ACCESS_TOKEN_FLAG: &str = "--access-token";

/// How to launch a stdio MCP server.
#[derive(Clone)]
pub struct StdioServerConfig {
    /// Label used in logs.
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl StdioServerConfig {
    /// The Supabase MCP server, launched through the configured package runner.
    pub fn supabase(config: &Config) -> Result<Self, ConfigError> {
        let token = config.supabase_access_token()?;
        Ok(Self {
            name: "supabase".into(),
            command: config.mcp_command.clone(),
            args: vec![
                "-y".into(),
                config.mcp_package.clone(),
                ACCESS_TOKEN_FLAG.into(),
                token.to_string(),
            ],
            env: Vec::new(),
        })
    }

    /// Command line with secret arguments masked, for logging.
    pub fn redacted_command(&self) -> String {
        let mut parts = vec![self.command.clone()];
        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                parts.push("<redacted>".into());
                mask_next = false;
            } else {
                mask_next = arg == ACCESS_TOKEN_FLAG;
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// A live MCP session with a child-process server.
pub struct StdioToolServer {
    name: String,
    service: RunningService<RoleClient, ()>,
    closed: AtomicBool,
}

impl StdioToolServer {
    /// Spawns the server process and performs the MCP handshake.
    pub async fn connect(config: &StdioServerConfig) -> Result<Self, McpError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args).stderr(std::process::Stdio::inherit());
        for (k, v) in &config.env {
            cmd.env(k, v);
        }

        debug!(command = %config.redacted_command(), "spawning MCP server");

        let transport = TokioChildProcess::new(cmd).map_err(|e| {
            McpError::ConnectionFailed(format!(
                "Failed to spawn stdio process '{}': {e}",
                config.command
            ))
        })?;

        let service: RunningService<RoleClient, ()> =
            tokio::time::timeout(CONNECT_TIMEOUT, ().serve(transport))
                .await
                .map_err(|_| {
                    McpError::Timeout(format!(
                        "Stdio server '{}' did not respond within {}s",
                        config.name,
                        CONNECT_TIMEOUT.as_secs()
                    ))
                })?
                .map_err(|e| {
                    McpError::ConnectionFailed(format!(
                        "Failed to initialize stdio MCP server {}: {e}",
                        config.name
                    ))
                })?;

        if let Some(info) = service.peer_info() {
            info!(
                server_name = %info.server_info.name,
                server_version = %info.server_info.version,
                "Stdio MCP server connected"
            );
        }

        Ok(Self {
            name: config.name.clone(),
            service,
            closed: AtomicBool::new(false),
        })
    }

    /// Cancels the session. The child process exits once its stdin closes.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.service.cancellation_token().cancel();
        info!(server = %self.name, "MCP server connection closed");
    }
}

impl Drop for StdioToolServer {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl ToolServer for StdioToolServer {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let tools = self
            .service
            .peer()
            .list_all_tools()
            .await
            .map_err(|e| McpError::Discovery(format!("tools/list failed: {e}")))?;
        Ok(tools.into_iter().map(descriptor_from_tool).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolResponse, McpError> {
        let params = CallToolRequestParams {
            meta: None,
            name: Cow::Owned(name.to_string()),
            arguments,
            task: None,
        };

        let result = tokio::time::timeout(CALL_TIMEOUT, self.service.peer().call_tool(params))
            .await
            .map_err(|_| {
                McpError::Timeout(format!(
                    "Tool execution timed out ({}s)",
                    CALL_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| McpError::CallFailed(e.to_string()))?;

        if result.is_error.unwrap_or(false) {
            warn!(tool = name, "MCP server flagged the tool result as an error");
        }

        Ok(response_from_result(result))
    }
}

fn descriptor_from_tool(tool: Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or("").to_string(),
        parameter_schema: Value::Object((*tool.input_schema).clone()),
    }
}

/// Maps an rmcp result onto the adapter's response shapes.
fn response_from_result(result: CallToolResult) -> ToolResponse {
    if let Some(structured) = &result.structured_content
        && (structured.is_array() || structured.is_object())
    {
        return ToolResponse::Structured(structured.clone());
    }

    if result.content.is_empty() {
        return ToolResponse::Raw(serde_json::to_value(&result).unwrap_or(Value::Null));
    }

    ToolResponse::Content(
        result
            .content
            .iter()
            .map(|c| match &c.raw {
                RawContent::Text(text) => ContentBlock::text(text.text.clone()),
                RawContent::Image(_) => ContentBlock::non_text("image"),
                RawContent::Audio(_) => ContentBlock::non_text("audio"),
                RawContent::Resource(_) => ContentBlock::non_text("resource"),
                RawContent::ResourceLink(_) => ContentBlock::non_text("resource_link"),
            })
            .collect(),
    )
}
