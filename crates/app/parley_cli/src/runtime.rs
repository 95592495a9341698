//! JSON-lines conversation runtime over a byte stream.
//!
//! The host announces the session and its tools, then answers tool requests
//! from the external runtime process until the input closes or the session
//! is cancelled.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_core::agent::Agent;
use parley_core::session::{ConversationRuntime, SessionError, SessionOptions};

/// One tool request from the runtime process.
#[derive(Debug, Deserialize)]
struct ToolRequest {
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

pub struct StdioRuntime<R, W> {
    lines: Lines<R>,
    writer: W,
}

impl<R, W> StdioRuntime<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    async fn emit(&mut self, message: &Value) -> Result<(), SessionError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn handle_line(&mut self, agent: &Agent, line: &str) -> Result<(), SessionError> {
        let request: ToolRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Ignoring malformed runtime message: {e}");
                return self
                    .emit(&json!({ "id": Value::Null, "error": format!("invalid request: {e}") }))
                    .await;
            }
        };

        debug!(id = %request.id, tool = %request.tool, "Tool request");
        let result = agent.tools.invoke(&request.tool, request.arguments).await;
        self.emit(&json!({ "id": request.id, "result": result })).await
    }
}

#[async_trait]
impl<R, W> ConversationRuntime for StdioRuntime<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn start(&mut self, agent: &Agent, options: &SessionOptions) -> Result<(), SessionError> {
        let tools: Vec<Value> = agent.tools.specs().map(|spec| spec.to_json()).collect();
        self.emit(&json!({
            "event": "start",
            "instructions": agent.instructions,
            "options": options,
            "tools": tools,
        }))
        .await
    }

    async fn generate_reply(&mut self, instructions: &str) -> Result<(), SessionError> {
        self.emit(&json!({ "event": "say", "text": instructions })).await
    }

    async fn serve(&mut self, agent: &Agent, cancel: CancellationToken) -> Result<(), SessionError> {
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Session cancelled");
                    return Ok(());
                }
                line = self.lines.next_line() => line?,
            };

            let Some(line) = line else {
                info!("Runtime closed the conversation");
                return Ok(());
            };
            if line.trim().is_empty() {
                continue;
            }
            self.handle_line(agent, &line).await?;
        }
    }
}
