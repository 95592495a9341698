//! Session variants and the conversation runtime seam.
//!
//! A session assembles an [`Agent`] for its [`Variant`], hands it to a
//! [`ConversationRuntime`], speaks the greeting and serves until cancelled.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::build_tools;
use crate::adapter::schema::BuildError;
use crate::agent::{ASSISTANT_INSTRUCTIONS, Agent, AgentTool, REALTIME_INSTRUCTIONS, Toolset};
use crate::mcp::ToolServer;
use crate::search::{SearchContract, SearchTool, WebSearch};

/// Conversation runtime errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which assistant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Web search and database tools; rich search responses.
    #[default]
    Assistant,
    /// Web search and database tools; bare or crawl-style search responses.
    Legacy,
    /// Realtime voice model, no tools.
    Realtime,
}

impl Variant {
    pub const ALL: &[Variant] = &[Variant::Assistant, Variant::Legacy, Variant::Realtime];

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Assistant => "assistant",
            Variant::Legacy => "legacy",
            Variant::Realtime => "realtime",
        }
    }

    pub fn uses_tools(self) -> bool {
        !matches!(self, Variant::Realtime)
    }

    /// Whether missing transport credentials are fatal for this variant.
    pub fn requires_transport(self) -> bool {
        matches!(self, Variant::Realtime)
    }

    pub fn search_contract(self) -> Option<SearchContract> {
        match self {
            Variant::Assistant => Some(SearchContract::Rich),
            Variant::Legacy => Some(SearchContract::Legacy),
            Variant::Realtime => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown variant '{s}' (expected assistant, legacy or realtime)"))
    }
}

/// Model choices passed to the conversation runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum SessionOptions {
    /// Separate speech-to-text, LLM and text-to-speech stages.
    #[serde(rename_all = "camelCase")]
    Pipeline {
        stt: String,
        llm: String,
        tts_voice: String,
    },
    /// A single realtime speech model.
    Realtime { model: String, voice: String },
}

impl SessionOptions {
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Assistant | Variant::Legacy => Self::Pipeline {
                stt: "assemblyai".into(),
                llm: "gpt-4o".into(),
                tts_voice: "ash".into(),
            },
            Variant::Realtime => Self::Realtime {
                model: "gpt-4o-realtime-preview".into(),
                voice: "coral".into(),
            },
        }
    }
}

/// The speech/LLM runtime that drives a conversation.
#[async_trait]
pub trait ConversationRuntime: Send {
    /// Starts the conversation with `agent`'s instructions and tools.
    async fn start(&mut self, agent: &Agent, options: &SessionOptions) -> Result<(), SessionError>;

    /// Asks the runtime to say something following `instructions`.
    async fn generate_reply(&mut self, instructions: &str) -> Result<(), SessionError>;

    /// Runs the conversation until it ends or `cancel` fires.
    async fn serve(&mut self, agent: &Agent, cancel: CancellationToken)
    -> Result<(), SessionError>;
}

/// Assembles the agent for `variant`.
///
/// The search tool is registered first. Database tools are added when a
/// tool server is available; without one the agent runs with search only.
pub async fn prepare_agent(
    variant: Variant,
    search: Option<Arc<dyn WebSearch>>,
    tool_server: Option<Arc<dyn ToolServer>>,
) -> Result<Agent, BuildError> {
    let Some(contract) = variant.search_contract() else {
        return Ok(Agent::new(REALTIME_INSTRUCTIONS, Toolset::new()));
    };

    let mut tools = Toolset::new();
    if let Some(client) = search {
        tools.register(Arc::new(SearchTool::new(client, contract)?));
    }

    match tool_server {
        Some(server) => {
            let database_tools = build_tools(server).await;
            let count = database_tools.len();
            for tool in database_tools {
                tools.register(Arc::new(tool) as Arc<dyn AgentTool>);
            }
            info!(
                total = tools.len(),
                database = count,
                "Loaded tools"
            );
        }
        None => warn!("Running with only Firecrawl search (Supabase unavailable)"),
    }

    Ok(Agent::new(ASSISTANT_INSTRUCTIONS, tools))
}

/// Starts `agent` on `runtime`, greets, and serves until the conversation
/// ends or `cancel` fires.
pub async fn run_session<R: ConversationRuntime + ?Sized>(
    runtime: &mut R,
    agent: &Agent,
    options: &SessionOptions,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    info!(tools = agent.tools.len(), "Starting agent session");
    runtime.start(agent, options).await?;
    runtime.generate_reply(agent.greeting()).await?;
    runtime.serve(agent, cancel).await
}
